//! Typed remote records
//!
//! Raw JSON coming back from the fetcher is validated against these shapes
//! at the boundary with [`decode`]. A record that does not fit fails with
//! [`FetchError::MalformedRecord`] instead of leaking missing fields into
//! the engine.
//!
//! Field names follow the Canvas LMS REST API (snake_case). Identifiers are
//! accepted as JSON numbers or strings.
//!
//! See: <https://canvas.instructure.com/doc/api/>

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::paged_fetcher::FetchError;
use crate::domain::newtypes::RemoteId;

/// Validates a raw JSON record against `T`
///
/// `kind` names the record type in the resulting error.
pub fn decode<T: DeserializeOwned>(kind: &'static str, value: Value) -> Result<T, FetchError> {
    serde_json::from_value(value).map_err(|e| FetchError::MalformedRecord {
        kind,
        reason: e.to_string(),
    })
}

/// Validates every record of a page, failing on the first malformed one
pub fn decode_all<T: DeserializeOwned>(
    kind: &'static str,
    values: Vec<Value>,
) -> Result<Vec<T>, FetchError> {
    values.into_iter().map(|v| decode(kind, v)).collect()
}

// ============================================================================
// Canvas API response types (JSON deserialization)
// ============================================================================

/// `GET /api/v1/users/self/courses`
#[derive(Debug, Clone, Deserialize)]
pub struct RawCourse {
    #[serde(deserialize_with = "remote_id")]
    pub id: RemoteId,
    pub name: String,
}

/// `GET /api/v1/courses/:id/tabs`
#[derive(Debug, Clone, Deserialize)]
pub struct RawTab {
    /// Tab identifier such as `"modules"` or `"files"`
    pub id: String,
}

/// `GET /api/v1/folders/:id` and folder listings
#[derive(Debug, Clone, Deserialize)]
pub struct RawFolder {
    #[serde(deserialize_with = "remote_id")]
    pub id: RemoteId,
    pub name: String,
    /// Full path including the root label, e.g. `course files/Week 1`
    pub full_name: String,
    /// `None` for the course root folder
    #[serde(default, deserialize_with = "optional_remote_id")]
    pub parent_folder_id: Option<RemoteId>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub folders_count: u32,
    #[serde(default)]
    pub files_count: u32,
    pub folders_url: Option<String>,
    pub files_url: Option<String>,
}

impl RawFolder {
    /// Returns true for the course root folder
    pub fn is_root(&self) -> bool {
        self.parent_folder_id.is_none()
    }
}

/// `GET /api/v1/files/:id` and file listings
#[derive(Debug, Clone, Deserialize)]
pub struct RawFile {
    #[serde(deserialize_with = "remote_id")]
    pub id: RemoteId,
    pub display_name: String,
    /// Storage name, URL-encoded
    #[serde(default)]
    pub filename: Option<String>,
    /// Download URL; empty for files the viewer cannot access
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub size: u64,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locked_for_user: bool,
}

/// `GET /api/v1/courses/:id/modules`
#[derive(Debug, Clone, Deserialize)]
pub struct RawModule {
    #[serde(deserialize_with = "remote_id")]
    pub id: RemoteId,
    pub name: String,
    #[serde(default)]
    pub items_count: u32,
    pub items_url: String,
}

/// `GET /api/v1/courses/:id/modules/:id/items`
#[derive(Debug, Clone, Deserialize)]
pub struct RawModuleItem {
    #[serde(deserialize_with = "remote_id")]
    pub id: RemoteId,
    #[serde(default)]
    pub title: String,
    /// `File`, `Page`, `Assignment`, ...
    #[serde(rename = "type")]
    pub kind: String,
    /// API URL of the underlying content
    pub url: Option<String>,
}

impl RawModuleItem {
    /// Returns true if the item points at a file
    pub fn is_file(&self) -> bool {
        self.kind == "File"
    }
}

// ============================================================================
// Identifier helpers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    String(String),
}

fn into_remote_id<E: serde::de::Error>(raw: NumberOrString) -> Result<RemoteId, E> {
    match raw {
        NumberOrString::Number(n) => Ok(RemoteId::from(n)),
        NumberOrString::String(s) => RemoteId::new(s).map_err(E::custom),
    }
}

fn remote_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RemoteId, D::Error> {
    into_remote_id(NumberOrString::deserialize(deserializer)?)
}

fn optional_remote_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<RemoteId>, D::Error> {
    Option::<NumberOrString>::deserialize(deserializer)?
        .map(into_remote_id)
        .transpose()
}
