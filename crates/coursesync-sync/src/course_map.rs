//! Cold-start assembly of a complete course
//!
//! The two capability branches of a course are independent and optional:
//!
//! - **modules**: list modules, then per module list its items, keep file
//!   items, fetch each file's metadata and drop files locked for the viewer
//! - **files**: crawl the folder tree, then list files of the root folder
//!   and of every folder reporting files
//!
//! The result is merged into the course with the reconciliation merger, so
//! path collisions found during a cold start become conflicts too.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use coursesync_core::domain::{
    Conflict, ConflictLedger, Course, CoursePath, Endpoint, File, FileOrigin, Module,
};
use coursesync_core::ports::{FetchError, RawFile, RawFolder, RawModule, RawModuleItem};
use coursesync_core::NameSanitizer;
use coursesync_reconcile::{EntityBatch, ReconciliationMerger, StaleUpdate};

use crate::crawler::{file_from_raw, malformed, TreeCrawler};
use crate::fanout::try_fan_out;
use crate::report::{isolate, BranchLog, BranchScope, FailedBranch, TruncatedListing};
use crate::source::RemoteSource;

// ============================================================================
// Results
// ============================================================================

/// A course assembled from a full crawl
#[derive(Debug, Clone)]
pub struct CourseBuild {
    /// The course with every discovered entity merged in
    pub course: Course,
    pub conflicts: Vec<Conflict>,
    pub added: usize,
    pub updated: usize,
    pub stale: Vec<StaleUpdate>,
    pub branches: BranchLog,
}

/// Modules of a course and the files they list
#[derive(Debug, Clone, Default)]
pub struct ModuleHarvest {
    /// `None` when the module listing itself failed
    pub modules: Option<Vec<Module>>,
    pub files: Vec<File>,
    pub branches: BranchLog,
}

// ============================================================================
// CourseMapBuilder
// ============================================================================

/// Builds complete course maps
pub struct CourseMapBuilder {
    source: Arc<RemoteSource>,
    crawler: Arc<TreeCrawler>,
    sanitizer: NameSanitizer,
}

impl CourseMapBuilder {
    pub fn new(source: Arc<RemoteSource>, crawler: Arc<TreeCrawler>, sanitizer: NameSanitizer) -> Self {
        Self {
            source,
            crawler,
            sanitizer,
        }
    }

    /// Crawls every capability of `course` and merges the result into it
    ///
    /// Per-module and per-folder failures are reported in the build's
    /// branch log. `built_at` is only stamped when no branch failed, so an
    /// incomplete build is repeated in full on the next run. Paths with an
    /// unresolved conflict in `open` keep their current occupant.
    ///
    /// # Errors
    /// Returns [`FetchError::AuthInvalid`] if the credential is rejected
    /// anywhere in the crawl, and [`FetchError::MalformedRecord`] if the
    /// course name cannot become a path. Every other failure is isolated to
    /// its branch and shows up in [`CourseBuild::branches`].
    #[instrument(skip(self, course, open), fields(course_id = %course.id, course = %course.name))]
    pub async fn build(
        &self,
        course: &Course,
        open: &ConflictLedger,
    ) -> Result<CourseBuild, FetchError> {
        let started_at = Utc::now();
        let mut base = course.clone();
        let mut branches = BranchLog::default();
        let mut batch = EntityBatch::default();

        if base.has_modules_tab {
            let harvest = self.collect_modules(&base).await?;
            batch.modules = harvest.modules;
            batch.files.extend(harvest.files);
            branches.absorb(harvest.branches);
        } else {
            debug!("Course has no modules tab");
        }

        if base.has_files_tab {
            if let Err(failed) = self.resolve_root_endpoints(&mut base).await? {
                branches.fail(failed);
            }
            let crawl = self.crawler.crawl(&base).await?;
            batch.folders = crawl.folders;
            batch.files.extend(crawl.files);
            branches.absorb(crawl.branches);
        } else {
            debug!("Course has no files tab");
        }

        let outcome = ReconciliationMerger::merge(&base, batch, open);
        let mut built = outcome.course;
        if !branches.has_failures() {
            built.built_at = Some(started_at);
        }

        info!(
            files = built.files.len(),
            folders = built.folders.len(),
            modules = built.modules.len(),
            failed = branches.failed_branches.len(),
            "Course map built"
        );

        Ok(CourseBuild {
            course: built,
            conflicts: outcome.conflicts,
            added: outcome.added,
            updated: outcome.updated,
            stale: outcome.stale,
            branches,
        })
    }

    /// Fills in the root folder's listing endpoints when they are unknown
    async fn resolve_root_endpoints(
        &self,
        course: &mut Course,
    ) -> Result<Result<(), FailedBranch>, FetchError> {
        if course.files_endpoint.is_some() && course.folders_endpoint.is_some() {
            return Ok(Ok(()));
        }

        let endpoint = Endpoint::course_root_folder(&course.id);
        let fetched = self.source.fetch::<RawFolder>("folder", &endpoint).await;
        let scope = BranchScope::RootFolder {
            course_id: course.id.clone(),
        };

        let root = match isolate(scope.clone(), fetched)? {
            Ok(root) => root,
            Err(failed) => return Ok(Err(failed)),
        };

        let endpoints = (
            root.files_url.map(Endpoint::new).transpose(),
            root.folders_url.map(Endpoint::new).transpose(),
        );
        match endpoints {
            (Ok(files), Ok(folders)) => {
                course.files_endpoint = course.files_endpoint.take().or(files);
                course.folders_endpoint = course.folders_endpoint.take().or(folders);
                Ok(Ok(()))
            }
            (Err(e), _) | (_, Err(e)) => isolate(scope, Err(malformed("folder")(e))),
        }
    }

    /// Lists modules and every file they reference
    ///
    /// Module files are always fetched in full; they are not diffed.
    ///
    /// # Errors
    /// Returns [`FetchError::AuthInvalid`] if the credential is rejected. A
    /// failed module listing leaves [`ModuleHarvest::modules`] as `None`.
    pub async fn collect_modules(&self, course: &Course) -> Result<ModuleHarvest, FetchError> {
        let mut harvest = ModuleHarvest::default();
        let settings = self.source.settings();

        let listed = self.list_modules(course, settings.module_page_size).await;
        let scope = BranchScope::ModuleListing {
            course_id: course.id.clone(),
        };
        let modules = match isolate(scope, listed)? {
            Ok((modules, truncated)) => {
                harvest.branches.truncated(truncated);
                modules
            }
            Err(failed) => {
                harvest.branches.fail(failed);
                return Ok(harvest);
            }
        };

        let per_module = try_fan_out(settings.width(), modules.iter(), |module| async move {
            let items = self.module_file_items(module).await;
            let scope = BranchScope::Module {
                path: module.path.clone(),
            };
            match isolate(scope, items) {
                Ok(Ok(items)) => self.module_files(module, items).await,
                Ok(Err(failed)) => {
                    let mut log = BranchLog::default();
                    log.fail(failed);
                    Ok((Vec::new(), log))
                }
                Err(fatal) => Err(fatal),
            }
        })
        .await?;

        for (files, log) in per_module {
            harvest.files.extend(files);
            harvest.branches.absorb(log);
        }

        debug!(
            modules = modules.len(),
            files = harvest.files.len(),
            "Modules collected"
        );
        harvest.modules = Some(modules);
        Ok(harvest)
    }

    async fn list_modules(
        &self,
        course: &Course,
        per_page: u32,
    ) -> Result<(Vec<Module>, Option<TruncatedListing>), FetchError> {
        let root = course.root_path().map_err(malformed("course"))?;
        let listing = self
            .source
            .list::<RawModule>("module", &Endpoint::course_modules(&course.id), per_page, None)
            .await?;

        let modules = listing
            .items
            .into_iter()
            .map(|raw| {
                let name = self.sanitizer.sanitize(&raw.name);
                Ok::<_, FetchError>(Module {
                    path: root.join(&name).map_err(malformed("module"))?,
                    name,
                    items_endpoint: Endpoint::new(raw.items_url).map_err(malformed("module"))?,
                    items_count: raw.items_count,
                })
            })
            .collect::<Result<Vec<_>, FetchError>>()?;
        Ok((modules, listing.truncated))
    }

    /// File items of one module with their metadata endpoints
    async fn module_file_items(
        &self,
        module: &Module,
    ) -> Result<Vec<(RawModuleItem, Endpoint)>, FetchError> {
        let per_page = self.source.settings().module_page_size;
        let listing = self
            .source
            .list::<RawModuleItem>("module item", &module.items_endpoint, per_page, None)
            .await?;

        listing
            .items
            .into_iter()
            .filter(RawModuleItem::is_file)
            .filter_map(|item| {
                let url = item.url.clone()?;
                Some(
                    Endpoint::new(url)
                        .map(|endpoint| (item, endpoint))
                        .map_err(malformed("module item")),
                )
            })
            .collect()
    }

    /// Fetches metadata of every file item, one isolated branch per file
    async fn module_files(
        &self,
        module: &Module,
        items: Vec<(RawModuleItem, Endpoint)>,
    ) -> Result<(Vec<File>, BranchLog), FetchError> {
        let width = self.source.settings().width();
        let fetched = try_fan_out(width, items, |(item, endpoint)| async move {
            let scope = BranchScope::ModuleFile {
                module: module.path.clone(),
                item_id: item.id.clone(),
            };
            let file = self.module_file(&module.path, &endpoint).await;
            isolate(scope, file)
        })
        .await?;

        let mut files = Vec::new();
        let mut log = BranchLog::default();
        for branch in fetched {
            match branch {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {}
                Err(failed) => log.fail(failed),
            }
        }
        Ok((files, log))
    }

    /// Metadata of one module file, `None` when locked for the viewer
    async fn module_file(
        &self,
        module_path: &CoursePath,
        endpoint: &Endpoint,
    ) -> Result<Option<File>, FetchError> {
        let raw = self.source.fetch::<RawFile>("file", endpoint).await?;
        if raw.locked_for_user {
            debug!(file_id = %raw.id, "Skipping file locked for user");
            return Ok(None);
        }
        let name = match raw.filename.as_deref() {
            Some(encoded) if !encoded.trim().is_empty() => self.sanitizer.sanitize_encoded(encoded),
            _ => self.sanitizer.sanitize(&raw.display_name),
        };
        file_from_raw(&raw, name, module_path, FileOrigin::Module).map(Some)
    }
}
