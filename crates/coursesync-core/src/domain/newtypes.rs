//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Remote identifiers
// ============================================================================

/// Opaque identifier assigned by the remote content store
///
/// Canvas uses numeric IDs, but sharded instances may hand out global IDs
/// such as `"10000~42"`, so the value is kept as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the ID is empty or contains whitespace/control characters
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be empty".to_string(),
            ));
        }

        if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(DomainError::InvalidRemoteId(format!(
                "Remote ID contains invalid characters: {id:?}"
            )));
        }

        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}

impl From<u64> for RemoteId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Reference to a remote collection or record
///
/// Either an absolute URL handed out by the remote (`folders_url`,
/// `items_url`, ...) or a path relative to the API root such as
/// `courses/42/modules`. Resolution against the instance base URL is the
/// fetcher adapter's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint(String);

impl Endpoint {
    /// Create a new Endpoint
    ///
    /// # Errors
    /// Returns error if the reference is empty or contains whitespace
    pub fn new(reference: String) -> Result<Self, DomainError> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(DomainError::InvalidEndpoint(
                "Endpoint cannot be empty".to_string(),
            ));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidEndpoint(format!(
                "Endpoint contains whitespace: {reference}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Active courses of the authenticated user
    #[must_use]
    pub fn active_courses() -> Self {
        Self("users/self/courses?enrollment_state=active".to_string())
    }

    /// Navigation tabs of a course
    #[must_use]
    pub fn course_tabs(course_id: &RemoteId) -> Self {
        Self(format!("courses/{course_id}/tabs"))
    }

    /// Root folder record of a course's file area
    #[must_use]
    pub fn course_root_folder(course_id: &RemoteId) -> Self {
        Self(format!("courses/{course_id}/folders/root"))
    }

    /// Every folder of a course, flattened
    #[must_use]
    pub fn course_folders(course_id: &RemoteId) -> Self {
        Self(format!("courses/{course_id}/folders"))
    }

    /// Every file of a course, flattened
    #[must_use]
    pub fn course_files(course_id: &RemoteId) -> Self {
        Self(format!("courses/{course_id}/files"))
    }

    /// Modules of a course
    #[must_use]
    pub fn course_modules(course_id: &RemoteId) -> Self {
        Self(format!("courses/{course_id}/modules"))
    }

    /// Returns true when the reference is an absolute URL
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Endpoint {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for Endpoint {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.0
    }
}

// ============================================================================
// Course-relative paths
// ============================================================================

/// A path inside the local mirror, relative to the sync root folder
///
/// The first segment is the course name, followed by module or folder
/// segments and finally the file name, e.g. `Bio 101/Week 1/notes.pdf`.
/// Segments are stored joined with `/` regardless of platform so persisted
/// state is portable; [`CoursePath::to_local`] renders the platform path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CoursePath(String);

impl CoursePath {
    /// Separator used in the stored form
    pub const SEPARATOR: char = '/';

    /// Create a new CoursePath from its stored form
    ///
    /// # Errors
    /// Returns error if the path is absolute, empty, contains empty segments,
    /// or contains `.`/`..` segments
    pub fn new(path: String) -> Result<Self, DomainError> {
        if path.is_empty() {
            return Err(DomainError::InvalidPath("Path cannot be empty".to_string()));
        }
        if path.starts_with(Self::SEPARATOR) {
            return Err(DomainError::InvalidPath(format!(
                "Path must be relative: {path}"
            )));
        }
        for segment in path.split(Self::SEPARATOR) {
            Self::validate_segment(segment).map_err(|_| {
                DomainError::InvalidPath(format!("Invalid segment {segment:?} in path: {path}"))
            })?;
        }
        Ok(Self(path))
    }

    /// Create the path of a course root from its (sanitized) name
    ///
    /// # Errors
    /// Returns error if the name is not a valid single segment
    pub fn course_root(course_name: &str) -> Result<Self, DomainError> {
        Self::validate_segment(course_name)?;
        Ok(Self(course_name.to_string()))
    }

    /// Join a single segment
    ///
    /// # Errors
    /// Returns error if the segment is empty, contains a separator, or is `.`/`..`
    pub fn join(&self, segment: &str) -> Result<Self, DomainError> {
        Self::validate_segment(segment)?;
        Ok(Self(format!("{}{}{segment}", self.0, Self::SEPARATOR)))
    }

    /// Join several segments in order
    ///
    /// # Errors
    /// Returns error on the first invalid segment
    pub fn join_all<I, S>(&self, segments: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        segments
            .into_iter()
            .try_fold(self.clone(), |acc, seg| acc.join(seg.as_ref()))
    }

    fn validate_segment(segment: &str) -> Result<(), DomainError> {
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.contains(Self::SEPARATOR)
            || segment.contains('\\')
        {
            return Err(DomainError::InvalidPath(format!(
                "Invalid path segment: {segment:?}"
            )));
        }
        Ok(())
    }

    /// Iterate over the path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(Self::SEPARATOR)
    }

    /// Get the last segment
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit(Self::SEPARATOR).next().unwrap_or(&self.0)
    }

    /// Get the parent path, or `None` for a single-segment path
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rfind(Self::SEPARATOR)
            .map(|idx| Self(self.0[..idx].to_string()))
    }

    /// Returns true if `self` equals `prefix` or lies beneath it
    #[must_use]
    pub fn starts_with(&self, prefix: &CoursePath) -> bool {
        self.0 == prefix.0
            || (self.0.starts_with(&prefix.0)
                && self.0[prefix.0.len()..].starts_with(Self::SEPARATOR))
    }

    /// Render the path under a local root using the platform separator
    #[must_use]
    pub fn to_local(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.segments() {
            path.push(segment);
        }
        path
    }

    /// Get the stored form
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CoursePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CoursePath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for CoursePath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<CoursePath> for String {
    fn from(path: CoursePath) -> Self {
        path.0
    }
}

// ============================================================================
// Conflict identifiers
// ============================================================================

/// Namespace for name-based conflict IDs
const CONFLICT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_93d4_4a0f_8e51_c05e_5e5e_a001);

/// Identifier for Conflict entities
///
/// Derived deterministically from the colliding path and the rejected
/// remote entity, so detecting the same collision twice yields the same ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Derive the ID of the conflict raised when `rejected` claims `path`
    #[must_use]
    pub fn derive(course_id: &RemoteId, path: &CoursePath, rejected: &RemoteId) -> Self {
        let name = format!("{course_id}\u{1f}{path}\u{1f}{rejected}");
        Self(Uuid::new_v5(&CONFLICT_NAMESPACE, name.as_bytes()))
    }

    /// Create a ConflictId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for ConflictId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConflictId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid ConflictId: {e}")))
    }
}
