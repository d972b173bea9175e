//! Run orchestration
//!
//! One run loads the persisted state once, processes every syncable course
//! and saves once:
//!
//! 1. Courses never built completely get a cold build
//! 2. Every other course is diffed against its own watermark and the diff
//!    is merged into it; paths with open conflicts stay with their occupant
//! 3. Conflicts go to the ledger; new content is optionally mirrored
//! 4. A course's watermark moves to the run's start time when none of its
//!    branches failed; the run-wide `last_synced` moves only when no branch
//!    of any course failed
//!
//! A rejected credential aborts the run before anything is saved.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use coursesync_core::domain::{ConflictLedger, Course, RemoteId, SyncState};
use coursesync_core::ports::{FetchError, IPagedFetcher, IStateStore};
use coursesync_core::NameSanitizer;
use coursesync_reconcile::{EntityBatch, ReconciliationMerger};

use crate::catalog::{merge_discovered, CatalogRefresh, CourseCatalog};
use crate::course_map::CourseMapBuilder;
use crate::crawler::TreeCrawler;
use crate::differ::IncrementalDiffer;
use crate::mirror::LocalMirror;
use crate::report::{isolate, BranchScope, CourseReport, FailedBranch, RunReport, SyncMode};
use crate::settings::SyncSettings;
use crate::source::RemoteSource;
use crate::SyncError;

/// What a run covers
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Only this course; the run-wide watermark is left untouched
    pub course: Option<RemoteId>,
    /// Mirror new and updated files locally
    pub download: bool,
    /// Rediscover courses before syncing
    pub refresh_catalog: bool,
}

/// Drives builds, diffs and merges against the persisted state
pub struct SyncEngine {
    catalog: CourseCatalog,
    builder: Arc<CourseMapBuilder>,
    differ: IncrementalDiffer,
    store: Arc<dyn IStateStore>,
    mirror: Option<LocalMirror>,
}

impl SyncEngine {
    pub fn new(
        fetcher: Arc<dyn IPagedFetcher>,
        store: Arc<dyn IStateStore>,
        settings: SyncSettings,
    ) -> Self {
        let sanitizer = NameSanitizer::new();
        let source = Arc::new(RemoteSource::new(fetcher, settings));
        let crawler = Arc::new(TreeCrawler::new(Arc::clone(&source), sanitizer.clone()));
        let builder = Arc::new(CourseMapBuilder::new(
            Arc::clone(&source),
            Arc::clone(&crawler),
            sanitizer.clone(),
        ));
        let differ = IncrementalDiffer::new(
            Arc::clone(&source),
            crawler,
            Arc::clone(&builder),
            sanitizer.clone(),
        );

        Self {
            catalog: CourseCatalog::new(source, sanitizer),
            builder,
            differ,
            store,
            mirror: None,
        }
    }

    /// Enables downloads into `mirror`
    #[must_use]
    pub fn with_mirror(mut self, mirror: LocalMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn differ(&self) -> &IncrementalDiffer {
        &self.differ
    }

    /// Rediscovers the viewer's courses and saves them
    ///
    /// # Errors
    /// Returns [`SyncError::AuthInvalid`] if the credential is rejected and
    /// [`SyncError::Store`] if the state cannot be loaded or saved.
    #[instrument(skip(self))]
    pub async fn refresh_catalog(&self) -> Result<CatalogRefresh, SyncError> {
        let mut state = self.store.load().await.map_err(SyncError::Store)?;
        let refresh = self.discover_into(&mut state).await?;
        self.store.save(&state).await.map_err(SyncError::Store)?;
        Ok(refresh)
    }

    /// Discovers every course and builds it from scratch
    pub async fn connect(&self) -> Result<RunReport, SyncError> {
        self.run(RunOptions {
            refresh_catalog: true,
            ..RunOptions::default()
        })
        .await
    }

    /// Runs one synchronization pass
    ///
    /// # Errors
    /// Returns [`SyncError::AuthInvalid`] as soon as the credential is
    /// rejected; nothing is saved in that case. Returns
    /// [`SyncError::UnknownCourse`] if `options.course` is not in the state
    /// and [`SyncError::Store`] if the state cannot be loaded or saved.
    #[instrument(skip(self))]
    pub async fn run(&self, options: RunOptions) -> Result<RunReport, SyncError> {
        let started_at = Utc::now();
        let mut state = self.store.load().await.map_err(SyncError::Store)?;

        let mut catalog_failures = Vec::new();
        if options.refresh_catalog {
            let refresh = self.discover_into(&mut state).await?;
            catalog_failures = refresh.failures;
        }

        let targets: Vec<RemoteId> = match &options.course {
            Some(id) if state.course(id).is_none() => {
                return Err(SyncError::UnknownCourse(id.clone()));
            }
            Some(id) => vec![id.clone()],
            None => state.syncable_courses().map(|c| c.id.clone()).collect(),
        };

        info!(
            courses = targets.len(),
            since = ?state.last_synced,
            "Starting sync run"
        );

        let mut courses = Vec::new();
        for id in targets {
            let Some(course) = state.course(&id).cloned() else {
                continue;
            };

            let synced = self.sync_course(course, &state.conflicts).await;
            let (mut course, mut report) = match synced {
                Ok(synced) => synced,
                Err(err) => {
                    error!(course_id = %id, error = %err, "Sync run aborted");
                    return Err(err.into());
                }
            };

            if !report.has_failures() {
                course.synced_at = Some(started_at);
            } else {
                debug!(course_id = %id, "Course watermark not advanced");
            }

            if options.download {
                if let Some(mirror) = &self.mirror {
                    let (written, log) = mirror.download_pending(&mut course).await;
                    report.downloaded = written;
                    report.download_failures = log.failed_branches;
                }
            }

            state.conflicts.record(report.conflicts.iter().cloned());
            state.upsert_course(course);
            courses.push(report);
        }

        let mut report = RunReport {
            started_at,
            finished_at: started_at,
            courses,
            catalog_failures,
            watermark_advanced: false,
            last_synced: state.last_synced,
        };

        if options.course.is_none() && !report.has_failures() {
            state.last_synced = Some(started_at);
            report.watermark_advanced = true;
            report.last_synced = state.last_synced;
        } else if report.has_failures() {
            warn!(
                failed = report.failed_branches().count(),
                "Some branches failed, watermark not advanced"
            );
        }

        self.store.save(&state).await.map_err(SyncError::Store)?;
        report.finished_at = Utc::now();

        info!(
            added = report.total_added(),
            updated = report.total_updated(),
            conflicts = report.total_conflicts(),
            watermark_advanced = report.watermark_advanced,
            "Sync run complete"
        );
        Ok(report)
    }

    async fn discover_into(&self, state: &mut SyncState) -> Result<CatalogRefresh, SyncError> {
        let discovery = self.catalog.discover().await?;
        let refresh = merge_discovered(state, discovery);
        info!(
            added = refresh.added,
            refreshed = refresh.refreshed,
            "Course catalog refreshed"
        );
        Ok(refresh)
    }

    /// Builds or diffs one course
    ///
    /// Any non-fatal error escaping the build or diff loses the whole
    /// course for this run and leaves it unchanged.
    async fn sync_course(
        &self,
        course: Course,
        open: &ConflictLedger,
    ) -> Result<(Course, CourseReport), FetchError> {
        let scope = BranchScope::Course {
            course_id: course.id.clone(),
        };

        match course.watermark() {
            None => {
                let mut report =
                    CourseReport::new(course.id.clone(), &course.name, SyncMode::ColdBuild);
                match isolate(scope, self.builder.build(&course, open).await)? {
                    Ok(build) => {
                        report.added = build.added;
                        report.updated = build.updated;
                        report.conflicts = build.conflicts;
                        report.stale = build.stale;
                        report.branches = build.branches;
                        Ok((build.course, report))
                    }
                    Err(failed) => Ok(failed_course(course, report, failed)),
                }
            }
            Some(since) => {
                let mut report =
                    CourseReport::new(course.id.clone(), &course.name, SyncMode::Incremental);
                match isolate(scope, self.differ.diff(&course, since).await)? {
                    Ok(diff) => {
                        let batch = EntityBatch {
                            files: diff.files,
                            folders: diff.new_folders,
                            modules: diff.modules,
                        };
                        let outcome = ReconciliationMerger::merge(&course, batch, open);
                        report.added = outcome.added;
                        report.updated = outcome.updated;
                        report.conflicts = outcome.conflicts;
                        report.stale = outcome.stale;
                        report.branches = diff.branches;
                        Ok((outcome.course, report))
                    }
                    Err(failed) => Ok(failed_course(course, report, failed)),
                }
            }
        }
    }
}

fn failed_course(
    course: Course,
    mut report: CourseReport,
    failed: FailedBranch,
) -> (Course, CourseReport) {
    report.branches.fail(failed);
    (course, report)
}
