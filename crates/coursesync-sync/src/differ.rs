//! Warm-sync diff against a watermark
//!
//! Instead of walking the folder tree again, the differ reads the
//! course-wide folder listing most recently updated first and stops at the
//! first page reaching past the watermark. Remote folders report their
//! full path prefixed with a root label (`course files/Week 1/Labs`); the
//! label is stripped before the path is sanitized.
//!
//! File listings of the root folder and of every known folder are read the
//! same way. Module files are always collected in full.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use coursesync_core::domain::{Course, CoursePath, Endpoint, File, Folder, Module};
use coursesync_core::ports::{FetchError, PageQuery, RawFile, RawFolder, SortOrder};
use coursesync_core::NameSanitizer;

use crate::course_map::CourseMapBuilder;
use crate::crawler::{folder_from_raw, is_newer, malformed, FileTarget, TreeCrawler};
use crate::report::{isolate, BranchLog, BranchScope, PathWarning};
use crate::source::RemoteSource;

/// Separator of the remote's full folder paths
const REMOTE_SEPARATOR: char = '/';

/// Entities changed since a watermark
#[derive(Debug, Clone, Default)]
pub struct DiffResult {
    /// New or updated files, including every module file
    pub files: Vec<File>,
    /// Folders created or updated after the watermark
    pub new_folders: Vec<Folder>,
    /// Complete module list, `None` when not listed
    pub modules: Option<Vec<Module>>,
    pub branches: BranchLog,
}

/// Computes what changed in a course since the last run
pub struct IncrementalDiffer {
    source: Arc<RemoteSource>,
    crawler: Arc<TreeCrawler>,
    builder: Arc<CourseMapBuilder>,
    sanitizer: NameSanitizer,
}

impl IncrementalDiffer {
    pub fn new(
        source: Arc<RemoteSource>,
        crawler: Arc<TreeCrawler>,
        builder: Arc<CourseMapBuilder>,
        sanitizer: NameSanitizer,
    ) -> Self {
        Self {
            source,
            crawler,
            builder,
            sanitizer,
        }
    }

    /// Lists folders and files updated strictly after `since`
    ///
    /// A failed folder diff still lets known folders be checked for new
    /// files; a failed file listing only loses that folder.
    ///
    /// # Errors
    /// Returns [`FetchError::AuthInvalid`] if any listing rejects the
    /// credential, and [`FetchError::MalformedRecord`] if the course or one
    /// of its known folders has no valid path. Failures of single listings
    /// are recorded in [`DiffResult::branches`] instead.
    #[instrument(skip(self, course), fields(course_id = %course.id, course = %course.name))]
    pub async fn diff(
        &self,
        course: &Course,
        since: DateTime<Utc>,
    ) -> Result<DiffResult, FetchError> {
        let mut result = DiffResult::default();

        if course.has_files_tab {
            let scope = BranchScope::FolderDiff {
                course_id: course.id.clone(),
            };
            match isolate(scope, self.changed_folders(course, since).await)? {
                Ok((folders, log)) => {
                    result.new_folders = folders;
                    result.branches.absorb(log);
                }
                Err(failed) => result.branches.fail(failed),
            }

            let targets = file_targets(course, &result.new_folders)?;
            let listed = self.crawler.list_files(targets, Some(since)).await?;
            result.files = listed.files;
            result.branches.absorb(listed.branches);
        }

        if course.has_modules_tab {
            let harvest = self.builder.collect_modules(course).await?;
            result.modules = harvest.modules;
            result.files.extend(harvest.files);
            result.branches.absorb(harvest.branches);
        }

        info!(
            files = result.files.len(),
            folders = result.new_folders.len(),
            failed = result.branches.failed_branches.len(),
            "Course diffed"
        );
        Ok(result)
    }

    /// Folders updated after `since`, with their resolved paths
    async fn changed_folders(
        &self,
        course: &Course,
        since: DateTime<Utc>,
    ) -> Result<(Vec<Folder>, BranchLog), FetchError> {
        let root = course.root_path().map_err(malformed("course"))?;
        let settings = self.source.settings();
        let listing = self
            .source
            .list_until::<RawFolder, _>(
                "folder",
                &Endpoint::course_folders(&course.id),
                settings.folder_page_size,
                Some(SortOrder::UpdatedAtDesc),
                |page| page.iter().any(|f| !is_newer(f.updated_at, Some(since))),
            )
            .await?;

        let mut log = BranchLog::default();
        log.truncated(listing.truncated);

        let mut folders = Vec::new();
        for raw in &listing.items {
            if !is_newer(raw.updated_at, Some(since)) {
                continue;
            }
            let Some((path, warning)) =
                resolve_folder_path(&self.sanitizer, &settings.remote_root_label, &root, raw)?
            else {
                continue;
            };
            if let Some(warning) = warning {
                log.path_warnings.push(warning);
            }
            let name = self.sanitizer.sanitize(&raw.name);
            folders.push(folder_from_raw(raw, name, path)?);
        }

        debug!(changed = folders.len(), listed = listing.items.len(), "Folders diffed");
        Ok((folders, log))
    }

    /// Returns true if the most recently updated course file is newer than
    /// `since`
    ///
    /// Only a rejected credential is returned as an error; any other
    /// failure reads as "nothing new".
    pub async fn has_new_files(
        &self,
        course: &Course,
        since: DateTime<Utc>,
    ) -> Result<bool, FetchError> {
        let latest = self
            .source
            .peek::<RawFile>(
                "file",
                &Endpoint::course_files(&course.id),
                PageQuery::first(1).recent_first(),
            )
            .await;

        match latest {
            Ok(latest) => Ok(latest
                .first()
                .is_some_and(|file| is_newer(file.updated_at, Some(since)))),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(course_id = %course.id, error = %err, "Change check failed");
                Ok(false)
            }
        }
    }
}

/// Resolves the local path of a folder from its remote full path
///
/// Returns `None` for the root folder itself. A full path without the
/// expected label is used as is, with a warning.
pub(crate) fn resolve_folder_path(
    sanitizer: &NameSanitizer,
    label: &str,
    root: &CoursePath,
    raw: &RawFolder,
) -> Result<Option<(CoursePath, Option<PathWarning>)>, FetchError> {
    if raw.is_root() || raw.full_name == label {
        return Ok(None);
    }

    let prefix = format!("{label}{REMOTE_SEPARATOR}");
    let (relative, warning) = match raw.full_name.strip_prefix(&prefix) {
        Some(relative) => (relative, None),
        None => {
            warn!(
                folder_id = %raw.id,
                full_name = %raw.full_name,
                expected = %prefix,
                "Folder path does not start with the root label, using it unprefixed"
            );
            let warning = PathWarning {
                folder_id: raw.id.clone(),
                raw_path: raw.full_name.clone(),
                expected_prefix: prefix.clone(),
            };
            (raw.full_name.as_str(), Some(warning))
        }
    };

    let segments = sanitizer.sanitize_segments(relative, REMOTE_SEPARATOR);
    if segments.is_empty() {
        return Ok(None);
    }
    let path = root.join_all(segments).map_err(malformed("folder"))?;
    Ok(Some((path, warning)))
}

/// File listings to diff: the root folder, every known folder, and every
/// folder first seen in this diff
///
/// Files of a folder first seen now are all kept, since they may predate
/// the watermark.
fn file_targets(course: &Course, changed: &[Folder]) -> Result<Vec<FileTarget>, FetchError> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    let known = course.folders.iter().filter_map(FileTarget::folder);
    let fresh = changed
        .iter()
        .filter(|f| course.folder_at(&f.path).is_none())
        .filter_map(FileTarget::folder)
        .map(|target| FileTarget {
            include_all: true,
            ..target
        });

    for target in FileTarget::root(course)?.into_iter().chain(fresh).chain(known) {
        if seen.insert(target.endpoint.as_str().to_string()) {
            targets.push(target);
        }
    }
    Ok(targets)
}
