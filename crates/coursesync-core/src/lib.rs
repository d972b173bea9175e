//! CourseSync Core - Domain model and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Course`, `Module`, `Folder`, `File`, `Conflict`, `SyncState`
//! - **Name sanitization** - `NameSanitizer` for cross-platform path segments
//! - **Port definitions** - Traits for adapters: `IPagedFetcher`, `IContentDownloader`, `IStateStore`
//! - **Remote records** - Typed Canvas records validated at the fetch boundary
//!
//! # Architecture
//!
//! The domain module is pure data and invariants with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`coursesync-canvas` for the remote API, `coursesync-cache` for state).
//! The sync engine in `coursesync-sync` composes them.

pub mod config;
pub mod domain;
pub mod ports;
pub mod sanitize;

pub use sanitize::NameSanitizer;
