//! Discovery of the viewer's active courses
//!
//! Each course's navigation tabs decide which capability branches exist.
//! For courses with a files tab the root folder record is fetched once, so
//! its listing endpoints are known before the first crawl.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use coursesync_core::domain::{Course, Endpoint, SyncState};
use coursesync_core::ports::records::decode;
use coursesync_core::ports::{FetchError, RawCourse, RawFolder, RawTab};
use coursesync_core::NameSanitizer;

use crate::crawler::optional_endpoint;
use crate::fanout::try_fan_out;
use crate::report::{isolate, BranchScope, FailedBranch, TruncatedListing};
use crate::source::RemoteSource;

const COURSE_PAGE_SIZE: u32 = 100;
const TAB_PAGE_SIZE: u32 = 100;

const MODULES_TAB: &str = "modules";
const FILES_TAB: &str = "files";

/// Courses found by one discovery pass
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub courses: Vec<Course>,
    /// Courses that could not be read, or the listing itself
    pub failures: Vec<FailedBranch>,
    pub truncated: Option<TruncatedListing>,
}

/// Outcome of merging a discovery into the persisted state
#[derive(Debug, Clone, Default)]
pub struct CatalogRefresh {
    /// Courses seen for the first time
    pub added: usize,
    /// Known courses whose capabilities or endpoints were refreshed
    pub refreshed: usize,
    pub failures: Vec<FailedBranch>,
}

/// Lists the courses the viewer is actively enrolled in
pub struct CourseCatalog {
    source: Arc<RemoteSource>,
    sanitizer: NameSanitizer,
}

impl CourseCatalog {
    pub fn new(source: Arc<RemoteSource>, sanitizer: NameSanitizer) -> Self {
        Self { source, sanitizer }
    }

    /// Lists active courses with their capabilities
    ///
    /// A course whose tabs or root folder cannot be read is reported and
    /// left out.
    ///
    /// # Errors
    /// Returns [`FetchError::AuthInvalid`] if the credential is rejected.
    /// A failed course listing is not an error: it yields an empty
    /// [`Discovery`] carrying the failure.
    #[instrument(skip(self))]
    pub async fn discover(&self) -> Result<Discovery, FetchError> {
        let mut discovery = Discovery::default();

        let listed = self
            .source
            .list::<Value>("course", &Endpoint::active_courses(), COURSE_PAGE_SIZE, None)
            .await;
        let listing = match isolate(BranchScope::Catalog, listed)? {
            Ok(listing) => listing,
            Err(failed) => {
                discovery.failures.push(failed);
                return Ok(discovery);
            }
        };
        discovery.truncated = listing.truncated;

        let mut raw_courses = Vec::new();
        for value in listing.items {
            match isolate(BranchScope::Catalog, decode::<RawCourse>("course", value))? {
                Ok(raw) => raw_courses.push(raw),
                Err(failed) => discovery.failures.push(failed),
            }
        }

        let width = self.source.settings().width();
        let described = try_fan_out(width, raw_courses, |raw| async move {
            let scope = BranchScope::Course {
                course_id: raw.id.clone(),
            };
            isolate(scope, self.describe(raw).await)
        })
        .await?;

        for course in described {
            match course {
                Ok(course) => discovery.courses.push(course),
                Err(failed) => discovery.failures.push(failed),
            }
        }

        info!(
            courses = discovery.courses.len(),
            failed = discovery.failures.len(),
            "Course discovery complete"
        );
        Ok(discovery)
    }

    /// Reads the tabs and root folder of one course
    async fn describe(&self, raw: RawCourse) -> Result<Course, FetchError> {
        let mut course = Course::new(raw.id, self.sanitizer.sanitize(&raw.name));

        let tabs = self
            .source
            .list::<RawTab>("tab", &Endpoint::course_tabs(&course.id), TAB_PAGE_SIZE, None)
            .await?;
        course.has_modules_tab = tabs.items.iter().any(|t| t.id == MODULES_TAB);
        course.has_files_tab = tabs.items.iter().any(|t| t.id == FILES_TAB);

        if course.has_files_tab {
            let root = self
                .source
                .fetch::<RawFolder>("folder", &Endpoint::course_root_folder(&course.id))
                .await?;
            course.files_endpoint = optional_endpoint(&root.files_url)?;
            course.folders_endpoint = optional_endpoint(&root.folders_url)?;
        }

        debug!(
            course_id = %course.id,
            modules = course.has_modules_tab,
            files = course.has_files_tab,
            "Course described"
        );
        Ok(course)
    }
}

/// Merges discovered courses into `state`
///
/// Known courses keep their name, content and sync flag; only their
/// capabilities and root endpoints are refreshed. New courses are appended
/// and flag the state.
pub fn merge_discovered(state: &mut SyncState, discovery: Discovery) -> CatalogRefresh {
    let mut refresh = CatalogRefresh {
        failures: discovery.failures,
        ..CatalogRefresh::default()
    };

    for found in discovery.courses {
        match state.course_mut(&found.id) {
            Some(known) => {
                known.has_modules_tab = found.has_modules_tab;
                known.has_files_tab = found.has_files_tab;
                known.files_endpoint = found.files_endpoint.or(known.files_endpoint.take());
                known.folders_endpoint = found.folders_endpoint.or(known.folders_endpoint.take());
                refresh.refreshed += 1;
            }
            None => {
                state.upsert_course(found);
                refresh.added += 1;
            }
        }
    }

    if refresh.added > 0 {
        state.has_new_courses = true;
    }
    refresh
}
