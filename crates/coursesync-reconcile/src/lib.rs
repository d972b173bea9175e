//! CourseSync Reconcile - Merging remote observations into course state
//!
//! Provides:
//! - Path-keyed merge of files and folders into an existing course
//! - Same-batch path collision detection (recorded as conflicts, never applied)
//! - Paths held by open ledger conflicts keep their occupant across runs
//! - Monotonic timestamps: strictly older remote data is rejected and reported
//! - Idempotent replay of the same batch

pub mod merger;

pub use merger::{EntityBatch, MergeOutcome, ReconciliationMerger, StaleUpdate};
