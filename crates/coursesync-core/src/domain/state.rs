//! Persisted synchronization state
//!
//! [`SyncState`] is the explicit handle loaded before a run and saved after
//! it. Nothing mutates it concurrently; the engine owns it for the duration
//! of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conflict::ConflictLedger;
use super::course::Course;
use super::newtypes::RemoteId;

/// Everything the engine remembers between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub conflicts: ConflictLedger,
    /// Start of the last full run that completed without failed branches
    ///
    /// Diffs start from each course's own [`Course::watermark`].
    pub last_synced: Option<DateTime<Utc>>,
    /// Set when discovery found courses that were not known before
    #[serde(default)]
    pub has_new_courses: bool,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Courses the user wants mirrored
    pub fn syncable_courses(&self) -> impl Iterator<Item = &Course> {
        self.courses.iter().filter(|c| c.sync)
    }

    pub fn course(&self, id: &RemoteId) -> Option<&Course> {
        self.courses.iter().find(|c| &c.id == id)
    }

    pub fn course_mut(&mut self, id: &RemoteId) -> Option<&mut Course> {
        self.courses.iter_mut().find(|c| &c.id == id)
    }

    /// Replaces the course with the same ID, or appends it
    ///
    /// Returns true if the course was not known before.
    pub fn upsert_course(&mut self, course: Course) -> bool {
        match self.course_mut(&course.id) {
            Some(existing) => {
                *existing = course;
                false
            }
            None => {
                self.courses.push(course);
                true
            }
        }
    }

    /// Flips the sync flag of a course
    ///
    /// A re-enabled course resumes from its own watermark, not from
    /// `last_synced`. Returns the new flag, or `None` if the course is
    /// unknown.
    pub fn toggle_course_sync(&mut self, id: &RemoteId) -> Option<bool> {
        self.course_mut(id).map(|course| {
            course.sync = !course.sync;
            course.sync
        })
    }
}
