//! Run reporting
//!
//! Branch failures, truncated listings and path fallbacks are values
//! collected while a course is processed, so a retry can be scoped to the
//! branches that actually failed.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use coursesync_core::domain::{Conflict, CoursePath, Endpoint, RemoteId};
use coursesync_core::ports::FetchError;
use coursesync_reconcile::StaleUpdate;

// ============================================================================
// Branches
// ============================================================================

/// Which part of the remote tree a failure belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum BranchScope {
    /// Listing the viewer's courses
    Catalog,
    /// Tabs or root folder of one course during discovery
    Course { course_id: RemoteId },
    /// Root folder record used to resolve listing endpoints
    RootFolder { course_id: RemoteId },
    /// Sub-folder listing of one folder
    FolderListing { path: CoursePath },
    /// File listing of one folder
    FolderFiles { path: CoursePath },
    /// File listing of the course root folder
    RootFiles { course_id: RemoteId },
    /// Module listing of one course
    ModuleListing { course_id: RemoteId },
    /// Item listing of one module
    Module { path: CoursePath },
    /// Metadata of one file listed by a module
    ModuleFile { module: CoursePath, item_id: RemoteId },
    /// Course-wide folder listing used by incremental diffs
    FolderDiff { course_id: RemoteId },
    /// Content transfer of one file
    Download { path: CoursePath },
}

impl fmt::Display for BranchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchScope::Catalog => write!(f, "course catalog"),
            BranchScope::Course { course_id } => write!(f, "course {course_id}"),
            BranchScope::RootFolder { course_id } => write!(f, "root folder of course {course_id}"),
            BranchScope::FolderListing { path } => write!(f, "sub-folders of {path}"),
            BranchScope::FolderFiles { path } => write!(f, "files of {path}"),
            BranchScope::RootFiles { course_id } => write!(f, "root files of course {course_id}"),
            BranchScope::ModuleListing { course_id } => write!(f, "modules of course {course_id}"),
            BranchScope::Module { path } => write!(f, "module {path}"),
            BranchScope::ModuleFile { module, item_id } => {
                write!(f, "item {item_id} of module {module}")
            }
            BranchScope::FolderDiff { course_id } => write!(f, "folder diff of course {course_id}"),
            BranchScope::Download { path } => write!(f, "download of {path}"),
        }
    }
}

/// A branch that contributed nothing because its fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBranch {
    #[serde(flatten)]
    pub scope: BranchScope,
    pub error: String,
}

/// Isolates a branch result
///
/// Fatal errors are returned as `Err` so the caller can abort; any other
/// failure is logged and turned into a [`FailedBranch`] value.
pub(crate) fn isolate<T>(
    scope: BranchScope,
    result: Result<T, FetchError>,
) -> Result<Result<T, FailedBranch>, FetchError> {
    match result {
        Ok(value) => Ok(Ok(value)),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!(branch = %scope, error = %err, "Branch failed, skipping");
            Ok(Err(FailedBranch {
                scope,
                error: err.to_string(),
            }))
        }
    }
}

/// A listing that returned a full page and was not followed further
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TruncatedListing {
    pub endpoint: Endpoint,
    pub per_page: u32,
}

/// A folder whose full path did not start with the expected root label
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathWarning {
    pub folder_id: RemoteId,
    pub raw_path: String,
    pub expected_prefix: String,
}

/// Non-fatal findings collected while processing one course
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BranchLog {
    pub failed_branches: Vec<FailedBranch>,
    pub truncated_listings: Vec<TruncatedListing>,
    pub path_warnings: Vec<PathWarning>,
}

impl BranchLog {
    pub fn absorb(&mut self, other: BranchLog) {
        self.failed_branches.extend(other.failed_branches);
        self.truncated_listings.extend(other.truncated_listings);
        self.path_warnings.extend(other.path_warnings);
    }

    pub fn fail(&mut self, branch: FailedBranch) {
        self.failed_branches.push(branch);
    }

    pub fn truncated(&mut self, listing: Option<TruncatedListing>) {
        self.truncated_listings.extend(listing);
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_branches.is_empty()
    }
}

// ============================================================================
// Course and run reports
// ============================================================================

/// How a course was processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Full crawl of a course that was never built
    ColdBuild,
    /// Diff against the last watermark, then merge
    Incremental,
}

/// Outcome for one course
#[derive(Debug, Clone, Serialize)]
pub struct CourseReport {
    pub course_id: RemoteId,
    pub course_name: String,
    pub mode: SyncMode,
    pub added: usize,
    pub updated: usize,
    pub conflicts: Vec<Conflict>,
    pub stale: Vec<StaleUpdate>,
    #[serde(flatten)]
    pub branches: BranchLog,
    pub downloaded: usize,
    /// Files whose content could not be fetched or written
    pub download_failures: Vec<FailedBranch>,
}

impl CourseReport {
    pub fn new(course_id: RemoteId, course_name: impl Into<String>, mode: SyncMode) -> Self {
        Self {
            course_id,
            course_name: course_name.into(),
            mode,
            added: 0,
            updated: 0,
            conflicts: Vec::new(),
            stale: Vec::new(),
            branches: BranchLog::default(),
            downloaded: 0,
            download_failures: Vec::new(),
        }
    }

    /// Returns true if any remote branch failed
    ///
    /// Download failures are not counted: each file keeps its own
    /// local-sync stamp and is retried independently.
    pub fn has_failures(&self) -> bool {
        self.branches.has_failures()
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub courses: Vec<CourseReport>,
    /// Failures while refreshing the course catalog
    pub catalog_failures: Vec<FailedBranch>,
    /// Whether `last_synced` moved to `started_at`
    pub watermark_advanced: bool,
    pub last_synced: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.catalog_failures.is_empty() || self.courses.iter().any(CourseReport::has_failures)
    }

    pub fn failed_branches(&self) -> impl Iterator<Item = &FailedBranch> {
        self.catalog_failures
            .iter()
            .chain(self.courses.iter().flat_map(|c| {
                c.branches
                    .failed_branches
                    .iter()
                    .chain(c.download_failures.iter())
            }))
    }

    pub fn total_added(&self) -> usize {
        self.courses.iter().map(|c| c.added).sum()
    }

    pub fn total_updated(&self) -> usize {
        self.courses.iter().map(|c| c.updated).sum()
    }

    pub fn total_conflicts(&self) -> usize {
        self.courses.iter().map(|c| c.conflicts.len()).sum()
    }
}
