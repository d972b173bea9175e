//! Port definitions (hexagonal architecture interfaces)
//!
//! The engine depends on these traits; their implementations live in
//! adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IPagedFetcher`] - Paged JSON listings from the remote content store
//! - [`IContentDownloader`] - Byte transfer of file contents
//! - [`IStateStore`] - Loading and saving the persisted [`SyncState`](crate::domain::SyncState)
//!
//! [`records`] holds the typed shapes that raw JSON records are validated
//! against before they reach the engine.

pub mod content_downloader;
pub mod paged_fetcher;
pub mod records;
pub mod state_store;

pub use content_downloader::IContentDownloader;
pub use paged_fetcher::{FetchError, IPagedFetcher, PageQuery, SortOrder};
pub use records::{RawCourse, RawFile, RawFolder, RawModule, RawModuleItem, RawTab};
pub use state_store::IStateStore;
