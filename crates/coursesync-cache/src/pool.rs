//! State database lifecycle
//!
//! The schema version lives in SQLite's `user_version` header field. Opening
//! a database stamped by a newer release fails instead of silently reading
//! a layout this build does not understand; an older or blank database is
//! brought up to [`SCHEMA_VERSION`].

use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::CacheError;

/// Layout version written by `migrations/20260301_initial.sql`
pub const SCHEMA_VERSION: i64 = 1;

/// A run holds one connection for its load and its save; the second serves
/// read-only commands started meanwhile.
const MAX_CONNECTIONS: u32 = 2;

/// Another process saving the whole state may hold the write lock this long
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection pool over the CourseSync state database
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the state database at `db_path`
    ///
    /// The database runs in WAL mode with `synchronous = NORMAL`: a crash
    /// may lose the last save but never leaves a half-written state behind.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the database cannot be opened,
    /// or `CacheError::MigrationFailed` if its schema is newer than
    /// [`SCHEMA_VERSION`] or cannot be applied.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!(
                    "Failed to open state database at {}: {}",
                    db_path.display(),
                    e
                ))
            })?;

        let version = Self::migrate(&pool).await?;
        tracing::info!(path = %db_path.display(), version, "State database opened");

        Ok(Self { pool })
    }

    /// Creates an in-memory state database
    ///
    /// Every SQLite in-memory connection is its own database, so the pool
    /// is capped at one connection.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ConnectionFailed` if the connection cannot be established,
    /// or `CacheError::MigrationFailed` if the schema cannot be applied.
    pub async fn in_memory() -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| {
                CacheError::ConnectionFailed(format!("Failed to create in-memory database: {}", e))
            })?;

        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Schema version recorded in the database header
    ///
    /// # Errors
    ///
    /// Returns `CacheError::QueryFailed` if the header cannot be read.
    pub async fn schema_version(&self) -> Result<i64, CacheError> {
        read_version(&self.pool).await
    }

    /// Brings the schema up to [`SCHEMA_VERSION`], returning the version found
    async fn migrate(pool: &SqlitePool) -> Result<i64, CacheError> {
        let found = read_version(pool).await?;

        if found > SCHEMA_VERSION {
            return Err(CacheError::MigrationFailed(format!(
                "State database has schema version {found}, this build supports up to \
                 {SCHEMA_VERSION}"
            )));
        }

        if found < SCHEMA_VERSION {
            sqlx::raw_sql(include_str!("migrations/20260301_initial.sql"))
                .execute(pool)
                .await
                .map_err(|e| {
                    CacheError::MigrationFailed(format!(
                        "Failed to migrate state schema from version {found}: {e}"
                    ))
                })?;
            tracing::debug!(from = found, to = SCHEMA_VERSION, "State schema migrated");
        }

        Ok(found)
    }
}

async fn read_version(pool: &SqlitePool) -> Result<i64, CacheError> {
    let version: i64 = sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await?;
    Ok(version)
}
