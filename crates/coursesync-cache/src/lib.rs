//! CourseSync Cache - Local state persistence
//!
//! SQLite-based store for the state the engine keeps between runs:
//! - Known courses and their mapped content
//! - The conflict ledger
//! - The `last_synced` watermark and the new-courses flag
//!
//! ## Architecture
//!
//! This crate implements the `IStateStore` port from `coursesync-core`
//! using SQLite as the storage backend. The engine loads the state once
//! before a run and saves it once after, so a save replaces the stored
//! state inside a single transaction.
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use coursesync_cache::{DatabasePool, SqliteStateStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/coursesync/state.db")).await?;
//! let store = SqliteStateStore::new(pool.pool().clone());
//! // Use store as IStateStore...
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod store;

pub use pool::{DatabasePool, SCHEMA_VERSION};
pub use store::SqliteStateStore;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Serialization or deserialization of domain types failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::SerializationError(e.to_string())
    }
}
