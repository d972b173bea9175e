//! Toggle command - Enable or disable mirroring of a course

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use coursesync_core::domain::RemoteId;
use coursesync_core::ports::IStateStore;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ToggleCommand {
    /// Course ID as shown by 'coursesync courses'
    pub course_id: String,
}

impl ToggleCommand {
    pub async fn execute(&self, context: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let id: RemoteId = self.course_id.parse().context("Invalid course ID")?;

        let store = context.open_store().await?;
        let mut state = store.load().await.context("Failed to load state")?;

        let Some(enabled) = state.toggle_course_sync(&id) else {
            formatter.error(&format!(
                "Unknown course {id}. Run 'coursesync courses' to discover courses."
            ));
            return Ok(());
        };
        store.save(&state).await.context("Failed to save state")?;
        info!(course_id = %id, enabled, "Toggled course sync");

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "course_id": id.as_str(),
                "sync": enabled,
            }));
        } else {
            let name = state.course(&id).map(|c| c.name.as_str()).unwrap_or_default();
            formatter.success(&format!(
                "Sync {} for {} ({})",
                if enabled { "enabled" } else { "disabled" },
                name,
                id
            ));
        }
        Ok(())
    }
}
