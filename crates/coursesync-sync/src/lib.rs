//! CourseSync Sync - Remote tree discovery and incremental synchronization
//!
//! Provides:
//! - Recursive folder discovery over a page-capped remote API
//! - Cold-start course maps and warm incremental diffs
//! - Bounded request fan-out with per-branch failure isolation
//! - Run orchestration against a persisted state store
//!
//! ## Modules
//!
//! - [`crawler`] - `TreeCrawler`: folder discovery and per-folder file listing
//! - [`course_map`] - `CourseMapBuilder`: full course assembly (modules and files)
//! - [`differ`] - `IncrementalDiffer`: entities changed since a watermark
//! - [`catalog`] - `CourseCatalog`: discovery of the viewer's courses
//! - [`engine`] - `SyncEngine`: load, build or diff, merge, save
//! - [`mirror`] - `LocalMirror`: atomic writes of downloaded content

pub mod catalog;
pub mod course_map;
pub mod crawler;
pub mod differ;
pub mod engine;
pub mod fanout;
pub mod mirror;
pub mod report;
pub mod settings;
pub mod source;

pub use catalog::{merge_discovered, CatalogRefresh, CourseCatalog, Discovery};
pub use course_map::{CourseBuild, CourseMapBuilder, ModuleHarvest};
pub use crawler::{CrawlResult, TreeCrawler};
pub use differ::{DiffResult, IncrementalDiffer};
pub use engine::{RunOptions, SyncEngine};
pub use mirror::LocalMirror;
pub use report::{
    BranchLog, BranchScope, CourseReport, FailedBranch, PathWarning, RunReport, SyncMode,
    TruncatedListing,
};
pub use settings::SyncSettings;
pub use source::RemoteSource;

use coursesync_core::domain::{DomainError, RemoteId};
use coursesync_core::ports::FetchError;
use thiserror::Error;

/// Errors that abort a synchronization run
///
/// Branch-level failures never surface here; they are collected in the
/// run report instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote rejected the access credential
    #[error("Access token rejected: {0}")]
    AuthInvalid(String),

    /// A remote fetch failed outside of any isolated branch
    #[error("Remote fetch failed: {0}")]
    Remote(FetchError),

    /// Loading or saving the persisted state failed
    #[error("State store error: {0:#}")]
    Store(anyhow::Error),

    /// The requested course is not known locally
    #[error("Unknown course: {0}")]
    UnknownCourse(RemoteId),

    /// An I/O error occurred while writing the local mirror
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A domain-level error propagated from coursesync-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl From<FetchError> for SyncError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::AuthInvalid(msg) => SyncError::AuthInvalid(msg),
            other => SyncError::Remote(other),
        }
    }
}
