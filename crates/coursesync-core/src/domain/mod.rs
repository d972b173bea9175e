//! Domain entities and business logic
//!
//! This module contains the core domain types for CourseSync:
//! - Newtypes for remote identifiers, endpoints and course-relative paths
//! - The course tree: courses, modules, folders and files
//! - Conflicts between remote entities resolving to one local path
//! - The persisted sync state
//! - Domain-specific error types

pub mod conflict;
pub mod course;
pub mod errors;
pub mod newtypes;
pub mod state;

// Re-export commonly used types
pub use conflict::{Conflict, ConflictLedger, ConflictSide, EntityKind};
pub use course::{Course, File, FileOrigin, Folder, Module};
pub use errors::DomainError;
pub use newtypes::*;
pub use state::SyncState;
