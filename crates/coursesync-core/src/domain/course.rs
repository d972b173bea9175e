//! Course domain entities
//!
//! A [`Course`] owns its modules, folders and a flattened list of files.
//! Files are stored flat under the course so they can be looked up by their
//! resolved [`CoursePath`], regardless of whether a module or a folder
//! listed them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::{CoursePath, Endpoint, RemoteId};

// ============================================================================
// Module
// ============================================================================

/// A named, ordered grouping of items within a course
///
/// Modules are rebuilt wholesale on every crawl; only the files they list
/// take part in reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Sanitized module name
    pub name: String,
    /// `course/module`
    pub path: CoursePath,
    /// Remote listing of the module's items
    pub items_endpoint: Endpoint,
    /// Item count reported by the remote
    pub items_count: u32,
}

// ============================================================================
// Folder
// ============================================================================

/// A node of the course's file tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: RemoteId,
    /// Sanitized folder name
    pub name: String,
    /// Sanitized join of the full ancestor chain, course name first
    pub path: CoursePath,
    /// Number of direct sub-folders reported by the remote
    pub folders_count: u32,
    pub folders_endpoint: Option<Endpoint>,
    /// Number of direct files reported by the remote
    pub files_count: u32,
    pub files_endpoint: Option<Endpoint>,
    /// Last modification on the remote side
    pub remote_updated_at: Option<DateTime<Utc>>,
    /// Whether the user wants this folder mirrored
    pub sync: bool,
}

// ============================================================================
// File
// ============================================================================

/// Which listing produced a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOrigin {
    /// Listed as an item of a module
    Module,
    /// Listed by a folder (or the course root folder)
    Folder,
}

/// A remote file and its local bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: RemoteId,
    /// Sanitized display name
    pub name: String,
    /// Fully qualified path within the course, name last
    pub path: CoursePath,
    /// Remote content URL
    pub url: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification on the remote side
    pub remote_updated_at: Option<DateTime<Utc>>,
    /// When the content was last written locally
    ///
    /// Never carried by the remote; preserved across merges.
    pub last_synced: Option<DateTime<Utc>>,
    /// Whether the user wants this file mirrored
    pub sync: bool,
    pub origin: FileOrigin,
}

impl File {
    /// Returns true when the local copy is missing or older than the remote
    pub fn needs_download(&self) -> bool {
        if !self.sync {
            return false;
        }
        match (self.last_synced, self.remote_updated_at) {
            (None, _) => true,
            (Some(local), Some(remote)) => remote > local,
            (Some(_), None) => false,
        }
    }
}

// ============================================================================
// Course
// ============================================================================

/// Top-level remote content container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: RemoteId,
    /// Sanitized course name, used as the first path segment
    pub name: String,
    pub has_modules_tab: bool,
    pub has_files_tab: bool,
    /// Whether the user wants this course mirrored
    pub sync: bool,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub folders: Vec<Folder>,
    /// File listing of the course root folder
    pub files_endpoint: Option<Endpoint>,
    /// Sub-folder listing of the course root folder
    pub folders_endpoint: Option<Endpoint>,
    /// When the first full crawl completed
    pub built_at: Option<DateTime<Utc>>,
    /// Start of the last run that synced this course without failed branches
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl Course {
    /// Creates a course with no content, enabled for sync
    pub fn new(id: RemoteId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            has_modules_tab: false,
            has_files_tab: false,
            sync: true,
            modules: Vec::new(),
            files: Vec::new(),
            folders: Vec::new(),
            files_endpoint: None,
            folders_endpoint: None,
            built_at: None,
            synced_at: None,
        }
    }

    /// Path of the course itself (its sanitized name)
    ///
    /// # Errors
    /// Returns error if the name is not a valid path segment
    pub fn root_path(&self) -> Result<CoursePath, DomainError> {
        CoursePath::course_root(&self.name)
    }

    /// Returns true once a full crawl has been merged
    pub fn is_built(&self) -> bool {
        self.built_at.is_some()
    }

    /// Point in time the next diff of this course starts from
    ///
    /// `None` until a full crawl has been merged. Courses that sat disabled
    /// keep their own older watermark, so re-enabling one diffs it over the
    /// whole time it was off.
    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.built_at
            .map(|built| self.synced_at.map_or(built, |synced| synced.max(built)))
    }

    /// Looks up a file by its resolved path
    pub fn file_at(&self, path: &CoursePath) -> Option<&File> {
        self.files.iter().find(|f| &f.path == path)
    }

    /// Looks up a folder by its resolved path
    pub fn folder_at(&self, path: &CoursePath) -> Option<&Folder> {
        self.folders.iter().find(|f| &f.path == path)
    }

    /// Files whose local copy is missing or outdated
    pub fn pending_downloads(&self) -> impl Iterator<Item = &File> {
        self.files.iter().filter(|f| f.needs_download())
    }

    /// Stamps the local-last-synchronized time of the file at `path`
    ///
    /// # Errors
    /// Returns error if no file exists at `path`
    pub fn mark_downloaded(
        &mut self,
        path: &CoursePath,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let file = self
            .files
            .iter_mut()
            .find(|f| &f.path == path)
            .ok_or_else(|| DomainError::InvalidPath(format!("No file at {path}")))?;
        file.last_synced = Some(at);
        Ok(())
    }
}
