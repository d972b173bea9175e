//! Conflict domain entities
//!
//! A conflict is recorded when two distinct remote entities resolve to the
//! same local path. Conflicts are only detected and recorded here; picking a
//! winner is left to a human.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ConflictId, CoursePath, RemoteId};

/// Kind of entity involved in a path collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    File,
    Folder,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::File => write!(f, "file"),
            EntityKind::Folder => write!(f, "folder"),
        }
    }
}

/// One of the two remote entities competing for a path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictSide {
    /// Remote identifier
    pub id: RemoteId,
    /// Remote content URL, files only
    pub url: Option<String>,
    /// Last modification on the remote side
    pub remote_updated_at: Option<DateTime<Utc>>,
}

/// A path collision between two distinct remote entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    id: ConflictId,
    kind: EntityKind,
    course_id: RemoteId,
    path: CoursePath,
    /// Entity that currently occupies the path
    kept: ConflictSide,
    /// Entity that was not applied
    rejected: ConflictSide,
}

impl Conflict {
    /// Creates a new conflict
    ///
    /// The identifier is derived from the course, the path and the rejected
    /// entity, so detecting the same collision twice yields equal values.
    pub fn new(
        kind: EntityKind,
        course_id: RemoteId,
        path: CoursePath,
        kept: ConflictSide,
        rejected: ConflictSide,
    ) -> Self {
        Self {
            id: ConflictId::derive(&course_id, &path, &rejected.id),
            kind,
            course_id,
            path,
            kept,
            rejected,
        }
    }

    pub fn id(&self) -> &ConflictId {
        &self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn course_id(&self) -> &RemoteId {
        &self.course_id
    }

    pub fn path(&self) -> &CoursePath {
        &self.path
    }

    pub fn kept(&self) -> &ConflictSide {
        &self.kept
    }

    pub fn rejected(&self) -> &ConflictSide {
        &self.rejected
    }
}

// ============================================================================
// ConflictLedger
// ============================================================================

/// Persisted list of unresolved conflicts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictLedger {
    entries: Vec<Conflict>,
}

impl ConflictLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records conflicts, replacing older entries with the same ID
    ///
    /// Returns the number of conflicts that were not known before.
    pub fn record<I>(&mut self, conflicts: I) -> usize
    where
        I: IntoIterator<Item = Conflict>,
    {
        let mut added = 0;
        for conflict in conflicts {
            match self.entries.iter_mut().find(|c| c.id == conflict.id) {
                Some(existing) => *existing = conflict,
                None => {
                    self.entries.push(conflict);
                    added += 1;
                }
            }
        }
        added
    }

    /// Removes every conflict recorded at `path`
    ///
    /// Returns the number of removed entries.
    pub fn dismiss(&mut self, path: &CoursePath) -> usize {
        let before = self.entries.len();
        self.entries.retain(|c| &c.path != path);
        before - self.entries.len()
    }

    /// Conflicts belonging to one course
    pub fn for_course<'a>(&'a self, course_id: &'a RemoteId) -> impl Iterator<Item = &'a Conflict> {
        self.entries.iter().filter(move |c| &c.course_id == course_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<Conflict> for ConflictLedger {
    fn from_iter<T: IntoIterator<Item = Conflict>>(iter: T) -> Self {
        let mut ledger = Self::new();
        ledger.record(iter);
        ledger
    }
}
