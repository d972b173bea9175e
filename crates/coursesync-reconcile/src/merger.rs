//! Reconciliation of freshly observed entities into a persisted course
//!
//! Entities are keyed by their resolved [`CoursePath`], never by arrival
//! order. For every path touched by a batch:
//!
//! - one claimant, nothing stored: the entity is appended
//! - one claimant, something stored: it replaces the stored entity in
//!   place unless its remote timestamp is strictly older, in which case it
//!   is reported as a [`StaleUpdate`] and dropped
//! - several distinct claimants: the stored entity (or, if none, the first
//!   claimant) occupies the path and every other claimant becomes a
//!   [`Conflict`]
//! - one claimant at a path with an open conflict in the ledger: unless it
//!   is the occupant itself it becomes a [`Conflict`] again and the occupant
//!   stays put until the conflict is dismissed
//!
//! Local bookkeeping the remote does not carry (download timestamps, sync
//! flags) survives replacement. Merging the same batch twice yields the
//! same course and the same conflicts.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use coursesync_core::domain::{
    Conflict, ConflictLedger, ConflictSide, Course, CoursePath, EntityKind, File, Folder, Module,
    RemoteId,
};

// ============================================================================
// Inputs and outputs
// ============================================================================

/// Entities observed remotely during one build or diff
#[derive(Debug, Clone, Default)]
pub struct EntityBatch {
    pub files: Vec<File>,
    pub folders: Vec<Folder>,
    /// Replaces the course's modules wholesale when present
    pub modules: Option<Vec<Module>>,
}

impl EntityBatch {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty() && self.modules.is_none()
    }
}

/// An incoming entity that was older than the stored one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleUpdate {
    pub kind: EntityKind,
    pub path: CoursePath,
    pub incoming_id: RemoteId,
    pub incoming_updated_at: DateTime<Utc>,
    pub stored_updated_at: DateTime<Utc>,
}

/// Result of [`ReconciliationMerger::merge`]
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub course: Course,
    pub conflicts: Vec<Conflict>,
    /// Entities appended at a previously unused path
    pub added: usize,
    /// Stored entities replaced with different data
    pub updated: usize,
    pub stale: Vec<StaleUpdate>,
}

// ============================================================================
// Reconcilable entities
// ============================================================================

/// Common view over files and folders for path-keyed merging
trait Reconcilable: Clone + PartialEq {
    const KIND: EntityKind;

    fn path(&self) -> &CoursePath;
    fn remote_id(&self) -> &RemoteId;
    fn remote_updated_at(&self) -> Option<DateTime<Utc>>;
    fn side(&self) -> ConflictSide;
    /// Copies local-only metadata from the stored entity
    fn carry_local(&mut self, stored: &Self);
}

impl Reconcilable for File {
    const KIND: EntityKind = EntityKind::File;

    fn path(&self) -> &CoursePath {
        &self.path
    }

    fn remote_id(&self) -> &RemoteId {
        &self.id
    }

    fn remote_updated_at(&self) -> Option<DateTime<Utc>> {
        self.remote_updated_at
    }

    fn side(&self) -> ConflictSide {
        ConflictSide {
            id: self.id.clone(),
            url: Some(self.url.clone()),
            remote_updated_at: self.remote_updated_at,
        }
    }

    fn carry_local(&mut self, stored: &Self) {
        self.last_synced = stored.last_synced.max(self.last_synced);
        self.sync = stored.sync;
    }
}

impl Reconcilable for Folder {
    const KIND: EntityKind = EntityKind::Folder;

    fn path(&self) -> &CoursePath {
        &self.path
    }

    fn remote_id(&self) -> &RemoteId {
        &self.id
    }

    fn remote_updated_at(&self) -> Option<DateTime<Utc>> {
        self.remote_updated_at
    }

    fn side(&self) -> ConflictSide {
        ConflictSide {
            id: self.id.clone(),
            url: None,
            remote_updated_at: self.remote_updated_at,
        }
    }

    fn carry_local(&mut self, stored: &Self) {
        self.sync = stored.sync;
    }
}

/// Per-collection merge counters
#[derive(Default)]
struct Tally {
    added: usize,
    updated: usize,
    conflicts: Vec<Conflict>,
    stale: Vec<StaleUpdate>,
}

// ============================================================================
// ReconciliationMerger
// ============================================================================

/// Merges entity batches into course state
pub struct ReconciliationMerger;

impl ReconciliationMerger {
    /// Merges `batch` into a copy of `existing`
    ///
    /// Entities of `existing` that the batch does not mention are kept as
    /// they are. Paths with an unresolved conflict of this course in `open`
    /// are never handed to a different remote entity.
    pub fn merge(existing: &Course, batch: EntityBatch, open: &ConflictLedger) -> MergeOutcome {
        let mut course = existing.clone();
        let held = HeldPaths::from_ledger(open, &existing.id);

        let folders = merge_collection(&course.id, &mut course.folders, batch.folders, &held);
        let files = merge_collection(&course.id, &mut course.files, batch.files, &held);

        if let Some(modules) = batch.modules {
            course.modules = modules;
        }

        let mut conflicts = folders.conflicts;
        conflicts.extend(files.conflicts);
        let mut stale = folders.stale;
        stale.extend(files.stale);

        let outcome = MergeOutcome {
            course,
            conflicts,
            added: folders.added + files.added,
            updated: folders.updated + files.updated,
            stale,
        };

        info!(
            course_id = %existing.id,
            added = outcome.added,
            updated = outcome.updated,
            conflicts = outcome.conflicts.len(),
            stale = outcome.stale.len(),
            "Merged batch into course"
        );

        outcome
    }
}

/// Paths held by unresolved conflicts of one course
struct HeldPaths {
    paths: HashSet<(EntityKind, CoursePath)>,
}

impl HeldPaths {
    fn from_ledger(ledger: &ConflictLedger, course_id: &RemoteId) -> Self {
        Self {
            paths: ledger
                .for_course(course_id)
                .map(|c| (c.kind(), c.path().clone()))
                .collect(),
        }
    }

    fn contains(&self, kind: EntityKind, path: &CoursePath) -> bool {
        self.paths.contains(&(kind, path.clone()))
    }
}

/// Groups incoming entities by path, keeping first-seen order and dropping
/// repeated sightings of the same remote ID at one path
fn group_by_path<T: Reconcilable>(incoming: Vec<T>) -> Vec<(CoursePath, Vec<T>)> {
    let mut groups: Vec<(CoursePath, Vec<T>)> = Vec::new();
    let mut index: HashMap<CoursePath, usize> = HashMap::new();

    for entity in incoming {
        match index.get(entity.path()) {
            Some(&i) => {
                let claimants = &mut groups[i].1;
                if !claimants.iter().any(|c| c.remote_id() == entity.remote_id()) {
                    claimants.push(entity);
                }
            }
            None => {
                index.insert(entity.path().clone(), groups.len());
                groups.push((entity.path().clone(), vec![entity]));
            }
        }
    }

    groups
}

fn merge_collection<T: Reconcilable>(
    course_id: &RemoteId,
    stored: &mut Vec<T>,
    incoming: Vec<T>,
    held: &HeldPaths,
) -> Tally {
    let mut tally = Tally::default();

    for (path, mut claimants) in group_by_path(incoming) {
        let position = stored.iter().position(|s| s.path() == &path);

        if claimants.len() > 1 {
            // Collision within the batch: the occupant stays put
            let occupant = match position {
                Some(i) => stored[i].clone(),
                None => {
                    let first = claimants.remove(0);
                    stored.push(first.clone());
                    tally.added += 1;
                    first
                }
            };

            for rejected in claimants
                .into_iter()
                .filter(|c| c.remote_id() != occupant.remote_id())
            {
                debug!(
                    kind = %T::KIND,
                    path = %path,
                    kept = %occupant.remote_id(),
                    rejected = %rejected.remote_id(),
                    "Path collision recorded as conflict"
                );
                tally.conflicts.push(Conflict::new(
                    T::KIND,
                    course_id.clone(),
                    path.clone(),
                    occupant.side(),
                    rejected.side(),
                ));
            }
            continue;
        }

        let Some(mut entity) = claimants.pop() else {
            continue;
        };

        match position {
            None => {
                stored.push(entity);
                tally.added += 1;
            }
            Some(i) => {
                let current = &stored[i];

                if entity.remote_id() != current.remote_id() && held.contains(T::KIND, &path) {
                    debug!(
                        kind = %T::KIND,
                        path = %path,
                        kept = %current.remote_id(),
                        rejected = %entity.remote_id(),
                        "Path held by an open conflict"
                    );
                    tally.conflicts.push(Conflict::new(
                        T::KIND,
                        course_id.clone(),
                        path,
                        current.side(),
                        entity.side(),
                    ));
                    continue;
                }

                if let (Some(incoming_at), Some(stored_at)) =
                    (entity.remote_updated_at(), current.remote_updated_at())
                {
                    if incoming_at < stored_at {
                        warn!(
                            kind = %T::KIND,
                            path = %path,
                            incoming = %incoming_at,
                            stored = %stored_at,
                            "Rejected stale remote data"
                        );
                        tally.stale.push(StaleUpdate {
                            kind: T::KIND,
                            path,
                            incoming_id: entity.remote_id().clone(),
                            incoming_updated_at: incoming_at,
                            stored_updated_at: stored_at,
                        });
                        continue;
                    }
                }

                entity.carry_local(current);
                if &entity != current {
                    if entity.remote_id() != current.remote_id() {
                        debug!(
                            kind = %T::KIND,
                            path = %path,
                            previous = %current.remote_id(),
                            replacement = %entity.remote_id(),
                            "Remote entity replaced at path"
                        );
                    }
                    stored[i] = entity;
                    tally.updated += 1;
                }
            }
        }
    }

    tally
}
