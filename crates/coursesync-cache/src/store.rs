//! SQLite implementation of IStateStore
//!
//! ## Type Mapping
//!
//! | Domain Type        | SQL Type | Strategy                                   |
//! |--------------------|----------|--------------------------------------------|
//! | Course             | TEXT     | serde_json payload, keyed by `RemoteId`    |
//! | Conflict           | TEXT     | serde_json payload, keyed by `ConflictId`  |
//! | DateTime<Utc>      | TEXT     | ISO 8601 via `to_rfc3339()`                |
//! | bool               | TEXT     | `"true"` / `"false"` in `sync_meta`        |
//!
//! Row order is kept in a `position` column so a load returns courses and
//! conflicts in the order they were saved.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use coursesync_core::domain::{Conflict, ConflictLedger, Course, SyncState};
use coursesync_core::ports::IStateStore;

use crate::CacheError;

const META_LAST_SYNCED: &str = "last_synced";
const META_HAS_NEW_COURSES: &str = "has_new_courses";

/// SQLite-based implementation of the state store port
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_courses(&self) -> Result<Vec<Course>, CacheError> {
        let rows = sqlx::query("SELECT id, payload FROM courses ORDER BY position ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(course_from_row).collect()
    }

    async fn load_conflicts(&self) -> Result<ConflictLedger, CacheError> {
        let rows = sqlx::query("SELECT id, payload FROM conflicts ORDER BY position ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(conflict_from_row).collect()
    }

    async fn load_meta(&self, key: &str) -> Result<Option<String>, CacheError> {
        let value: Option<Option<String>> =
            sqlx::query_scalar("SELECT value FROM sync_meta WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(value.flatten())
    }
}

// ============================================================================
// Row conversion
// ============================================================================

fn course_from_row(row: &SqliteRow) -> Result<Course, CacheError> {
    let id: String = row.try_get("id")?;
    let payload: String = row.try_get("payload")?;
    serde_json::from_str(&payload)
        .map_err(|e| CacheError::SerializationError(format!("course {}: {}", id, e)))
}

fn conflict_from_row(row: &SqliteRow) -> Result<Conflict, CacheError> {
    let id: String = row.try_get("id")?;
    let payload: String = row.try_get("payload")?;
    serde_json::from_str(&payload)
        .map_err(|e| CacheError::SerializationError(format!("conflict {}: {}", id, e)))
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::SerializationError(format!("timestamp {}: {}", value, e)))
}

async fn put_meta(
    tx: &mut Transaction<'_, Sqlite>,
    key: &str,
    value: Option<String>,
) -> Result<(), CacheError> {
    sqlx::query("INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// ============================================================================
// IStateStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IStateStore for SqliteStateStore {
    async fn load(&self) -> anyhow::Result<SyncState> {
        let courses = self.load_courses().await?;
        let conflicts = self.load_conflicts().await?;
        let last_synced = self
            .load_meta(META_LAST_SYNCED)
            .await?
            .map(|v| parse_timestamp(&v))
            .transpose()?;
        let has_new_courses = self
            .load_meta(META_HAS_NEW_COURSES)
            .await?
            .is_some_and(|v| v == "true");

        tracing::debug!(
            courses = courses.len(),
            conflicts = conflicts.len(),
            "Loaded sync state"
        );

        Ok(SyncState {
            courses,
            conflicts,
            last_synced,
            has_new_courses,
        })
    }

    async fn save(&self, state: &SyncState) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM courses").execute(&mut *tx).await?;
        for (position, course) in state.courses.iter().enumerate() {
            let payload = serde_json::to_string(course)
                .map_err(|e| anyhow::anyhow!("Failed to serialize course {}: {}", course.id, e))?;
            sqlx::query(
                "INSERT INTO courses (id, position, name, sync, built_at, payload) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(course.id.as_str())
            .bind(position as i64)
            .bind(&course.name)
            .bind(course.sync)
            .bind(course.built_at.map(|dt| dt.to_rfc3339()))
            .bind(&payload)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM conflicts").execute(&mut *tx).await?;
        for (position, conflict) in state.conflicts.iter().enumerate() {
            let payload = serde_json::to_string(conflict).map_err(|e| {
                anyhow::anyhow!("Failed to serialize conflict {}: {}", conflict.id(), e)
            })?;
            sqlx::query(
                "INSERT INTO conflicts (id, position, course_id, path, payload) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(conflict.id().to_string())
            .bind(position as i64)
            .bind(conflict.course_id().as_str())
            .bind(conflict.path().as_str())
            .bind(&payload)
            .execute(&mut *tx)
            .await?;
        }

        put_meta(
            &mut tx,
            META_LAST_SYNCED,
            state.last_synced.map(|dt| dt.to_rfc3339()),
        )
        .await?;
        put_meta(
            &mut tx,
            META_HAS_NEW_COURSES,
            Some(state.has_new_courses.to_string()),
        )
        .await?;

        tx.commit().await?;

        tracing::debug!(
            courses = state.courses.len(),
            conflicts = state.conflicts.len(),
            "Saved sync state"
        );
        Ok(())
    }
}
