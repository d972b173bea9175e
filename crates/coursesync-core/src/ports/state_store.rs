//! State store port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Used only at the boundaries of a run: `load` before, `save` after.
//!   Nothing is persisted mid-reconciliation.
//! - Uses `anyhow::Result` because storage errors are adapter-specific.

use crate::domain::SyncState;

/// Port trait for persisting the engine state between runs
#[async_trait::async_trait]
pub trait IStateStore: Send + Sync {
    /// Loads the persisted state, or an empty state on first use
    async fn load(&self) -> anyhow::Result<SyncState>;

    /// Replaces the persisted state
    async fn save(&self, state: &SyncState) -> anyhow::Result<()>;
}
