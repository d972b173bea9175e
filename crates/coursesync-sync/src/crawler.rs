//! Recursive discovery of a course's folder tree and file listings
//!
//! Discovery runs breadth-first: every level of the tree is fetched with a
//! bounded fan-out, and a sub-folder is only visited when the remote
//! reports a non-zero child-folder count for it. Files are listed in a
//! separate pass once all folders are known, one branch per folder with a
//! non-zero file count.
//!
//! A failed listing only loses its own branch. Only an invalid access
//! credential aborts the crawl.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use coursesync_core::domain::{
    Course, CoursePath, DomainError, Endpoint, File, FileOrigin, Folder,
};
use coursesync_core::ports::{FetchError, RawFile, RawFolder, SortOrder};
use coursesync_core::NameSanitizer;

use crate::fanout::try_fan_out;
use crate::report::{isolate, BranchLog, BranchScope, TruncatedListing};
use crate::source::RemoteSource;

// ============================================================================
// Record conversion
// ============================================================================

/// Turns a domain validation failure into a malformed-record fetch error
pub(crate) fn malformed(kind: &'static str) -> impl Fn(DomainError) -> FetchError {
    move |err| FetchError::MalformedRecord {
        kind,
        reason: err.to_string(),
    }
}

pub(crate) fn optional_endpoint(url: &Option<String>) -> Result<Option<Endpoint>, FetchError> {
    url.as_ref()
        .filter(|u| !u.trim().is_empty())
        .map(|u| Endpoint::new(u.clone()))
        .transpose()
        .map_err(malformed("folder"))
}

/// Builds a folder at `path` from its remote record
pub(crate) fn folder_from_raw(
    raw: &RawFolder,
    name: String,
    path: CoursePath,
) -> Result<Folder, FetchError> {
    Ok(Folder {
        id: raw.id.clone(),
        name,
        path,
        folders_count: raw.folders_count,
        folders_endpoint: optional_endpoint(&raw.folders_url)?,
        files_count: raw.files_count,
        files_endpoint: optional_endpoint(&raw.files_url)?,
        remote_updated_at: raw.updated_at,
        sync: true,
    })
}

/// Builds a file named `name` under `parent` from its remote record
pub(crate) fn file_from_raw(
    raw: &RawFile,
    name: String,
    parent: &CoursePath,
    origin: FileOrigin,
) -> Result<File, FetchError> {
    let path = parent.join(&name).map_err(malformed("file"))?;
    Ok(File {
        id: raw.id.clone(),
        name,
        path,
        url: raw.url.clone(),
        size: raw.size,
        remote_updated_at: raw.updated_at,
        last_synced: None,
        sync: true,
        origin,
    })
}

// ============================================================================
// Results
// ============================================================================

/// Folders and files discovered for one course
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub folders: Vec<Folder>,
    pub files: Vec<File>,
    pub branches: BranchLog,
}

/// One file-listing branch
#[derive(Debug, Clone)]
pub struct FileTarget {
    pub scope: BranchScope,
    /// Path the listed files are placed under
    pub parent: CoursePath,
    pub endpoint: Endpoint,
    /// Keep every file regardless of the watermark
    pub include_all: bool,
}

impl FileTarget {
    /// File listing of the course root folder, if its endpoint is known
    pub fn root(course: &Course) -> Result<Option<Self>, FetchError> {
        let Some(endpoint) = course.files_endpoint.clone() else {
            return Ok(None);
        };
        Ok(Some(Self {
            scope: BranchScope::RootFiles {
                course_id: course.id.clone(),
            },
            parent: course.root_path().map_err(malformed("course"))?,
            endpoint,
            include_all: false,
        }))
    }

    /// File listing of a folder, if its endpoint is known
    pub fn folder(folder: &Folder) -> Option<Self> {
        folder.files_endpoint.clone().map(|endpoint| Self {
            scope: BranchScope::FolderFiles {
                path: folder.path.clone(),
            },
            parent: folder.path.clone(),
            endpoint,
            include_all: false,
        })
    }
}

// ============================================================================
// TreeCrawler
// ============================================================================

/// Walks a course's folder tree
pub struct TreeCrawler {
    source: Arc<RemoteSource>,
    sanitizer: NameSanitizer,
}

impl TreeCrawler {
    pub fn new(source: Arc<RemoteSource>, sanitizer: NameSanitizer) -> Self {
        Self { source, sanitizer }
    }

    /// Discovers every folder of `course`, then lists files of the root
    /// folder and of every folder reporting files
    ///
    /// # Errors
    /// Returns [`FetchError::AuthInvalid`] as soon as any listing rejects
    /// the credential, and [`FetchError::MalformedRecord`] if the course
    /// name cannot become a path. A failed folder listing only drops that
    /// folder's subtree and is recorded in [`CrawlResult::branches`].
    #[instrument(skip(self, course), fields(course_id = %course.id))]
    pub async fn crawl(&self, course: &Course) -> Result<CrawlResult, FetchError> {
        let mut result = self.discover_folders(course).await?;

        let targets: Vec<FileTarget> = FileTarget::root(course)?
            .into_iter()
            .chain(
                result
                    .folders
                    .iter()
                    .filter(|f| f.files_count > 0)
                    .filter_map(FileTarget::folder),
            )
            .collect();

        let listed = self.list_files(targets, None).await?;
        result.files = listed.files;
        result.branches.absorb(listed.branches);

        info!(
            folders = result.folders.len(),
            files = result.files.len(),
            failed = result.branches.failed_branches.len(),
            "Crawl complete"
        );
        Ok(result)
    }

    /// Breadth-first discovery of the folder tree below the course root
    ///
    /// # Errors
    /// Same as [`TreeCrawler::crawl`].
    pub async fn discover_folders(&self, course: &Course) -> Result<CrawlResult, FetchError> {
        let mut result = CrawlResult::default();
        let Some(root_endpoint) = course.folders_endpoint.clone() else {
            debug!("Course has no folder listing");
            return Ok(result);
        };

        let root = course.root_path().map_err(malformed("course"))?;
        let mut frontier = vec![(root, root_endpoint)];
        let width = self.source.settings().width();
        let per_page = self.source.settings().folder_page_size;

        while !frontier.is_empty() {
            debug!(branches = frontier.len(), "Listing folder level");

            let level = try_fan_out(width, frontier, |(parent, endpoint)| async move {
                let scope = BranchScope::FolderListing {
                    path: parent.clone(),
                };
                let branch = self.list_sub_folders(&parent, &endpoint, per_page).await;
                isolate(scope, branch)
            })
            .await?;

            let mut next = Vec::new();
            for branch in level {
                match branch {
                    Ok((folders, truncated)) => {
                        result.branches.truncated(truncated);
                        for folder in folders {
                            if folder.folders_count > 0 {
                                if let Some(endpoint) = folder.folders_endpoint.clone() {
                                    next.push((folder.path.clone(), endpoint));
                                }
                            }
                            result.folders.push(folder);
                        }
                    }
                    Err(failed) => result.branches.fail(failed),
                }
            }
            frontier = next;
        }

        Ok(result)
    }

    /// One page-bounded sub-folder listing, converted in discovery order
    async fn list_sub_folders(
        &self,
        parent: &CoursePath,
        endpoint: &Endpoint,
        per_page: u32,
    ) -> Result<(Vec<Folder>, Option<TruncatedListing>), FetchError> {
        let listing = self
            .source
            .list::<RawFolder>("folder", endpoint, per_page, None)
            .await?;
        let folders = listing
            .items
            .iter()
            .map(|raw| {
                let name = self.sanitizer.sanitize(&raw.name);
                let path = parent.join(&name).map_err(malformed("folder"))?;
                folder_from_raw(raw, name, path)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((folders, listing.truncated))
    }

    /// Lists files for each target
    ///
    /// With `since`, listings are ordered most recent first and only files
    /// updated strictly after it are kept (unless the target includes all).
    /// Files the viewer cannot access are skipped.
    ///
    /// # Errors
    /// Returns [`FetchError::AuthInvalid`] if any listing rejects the
    /// credential; other failures only drop their target.
    pub async fn list_files(
        &self,
        targets: Vec<FileTarget>,
        since: Option<DateTime<Utc>>,
    ) -> Result<CrawlResult, FetchError> {
        let width = self.source.settings().width();

        let listed = try_fan_out(width, targets, |target| async move {
            let branch = self.list_target(&target, since).await;
            isolate(target.scope, branch)
        })
        .await?;

        let mut result = CrawlResult::default();
        for branch in listed {
            match branch {
                Ok((files, truncated)) => {
                    result.branches.truncated(truncated);
                    result.files.extend(files);
                }
                Err(failed) => result.branches.fail(failed),
            }
        }

        Ok(result)
    }

    async fn list_target(
        &self,
        target: &FileTarget,
        since: Option<DateTime<Utc>>,
    ) -> Result<(Vec<File>, Option<TruncatedListing>), FetchError> {
        let per_page = self.source.settings().file_page_size;
        let sort = since.map(|_| SortOrder::UpdatedAtDesc);
        let cutoff = since.filter(|_| !target.include_all);

        let listing = self
            .source
            .list_until::<RawFile, _>("file", &target.endpoint, per_page, sort, |page| {
                reaches_past(cutoff, page)
            })
            .await?;

        let mut files = Vec::new();
        for raw in &listing.items {
            if raw.locked_for_user || !is_newer(raw.updated_at, cutoff) {
                continue;
            }
            let name = self.sanitizer.sanitize(&raw.display_name);
            files.push(file_from_raw(raw, name, &target.parent, FileOrigin::Folder)?);
        }
        Ok((files, listing.truncated))
    }
}

/// True if `updated_at` is strictly after `cutoff` (always true without one)
pub(crate) fn is_newer(updated_at: Option<DateTime<Utc>>, cutoff: Option<DateTime<Utc>>) -> bool {
    match (cutoff, updated_at) {
        (None, _) => true,
        (Some(cutoff), Some(at)) => at > cutoff,
        (Some(_), None) => false,
    }
}

/// True once a most-recent-first page contains a record at or before `cutoff`
fn reaches_past(cutoff: Option<DateTime<Utc>>, page: &[RawFile]) -> bool {
    cutoff.is_some_and(|cutoff| page.iter().any(|f| !is_newer(f.updated_at, Some(cutoff))))
}
