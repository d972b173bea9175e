//! Conflicts command - Manage recorded path conflicts
//!
//! A conflict is recorded when two remote entities of a course resolve to
//! the same local path. The CLI only lists them and dismisses them once the
//! user has dealt with the collision.

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use coursesync_core::domain::{Conflict, CoursePath};
use coursesync_core::ports::IStateStore;

use crate::context::AppContext;
use crate::output::{counted, get_formatter, OutputFormat, Table};

#[derive(Debug, Subcommand)]
pub enum ConflictsCommand {
    /// List recorded conflicts
    List,
    /// Forget every conflict recorded at a path
    Dismiss {
        /// Course-relative path, e.g. "Biology/Week 1/Syllabus.pdf"
        path: String,
    },
}

impl ConflictsCommand {
    pub async fn execute(&self, context: &AppContext, format: OutputFormat) -> Result<()> {
        match self {
            ConflictsCommand::List => self.execute_list(context, format).await,
            ConflictsCommand::Dismiss { path } => {
                self.execute_dismiss(context, path, format).await
            }
        }
    }

    async fn execute_list(&self, context: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let store = context.open_store().await?;
        let state = store.load().await.context("Failed to load state")?;
        let conflicts: Vec<&Conflict> = state.conflicts.iter().collect();

        info!(count = conflicts.len(), "Retrieved recorded conflicts");

        if format.is_json() {
            let json = serde_json::json!({
                "count": conflicts.len(),
                "conflicts": conflicts.iter().map(|c| conflict_json(c)).collect::<Vec<_>>(),
            });
            formatter.print_json(&json);
            return Ok(());
        }

        if conflicts.is_empty() {
            formatter.success("No conflicts");
            return Ok(());
        }

        formatter.success(&counted(conflicts.len(), "conflict"));
        formatter.info("");
        let mut table = Table::new(["Kind", "Kept", "Rejected", "Path"]);
        for conflict in &conflicts {
            table.row([
                conflict.kind().to_string(),
                conflict.kept().id.to_string(),
                conflict.rejected().id.to_string(),
                conflict.path().to_string(),
            ]);
        }
        formatter.table(&table);
        formatter.info("");
        formatter.info("Use 'coursesync conflicts dismiss <path>' once a collision is handled.");

        Ok(())
    }

    async fn execute_dismiss(
        &self,
        context: &AppContext,
        path: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let path: CoursePath = path.parse().context("Invalid path")?;

        let store = context.open_store().await?;
        let mut state = store.load().await.context("Failed to load state")?;
        let removed = state.conflicts.dismiss(&path);
        if removed > 0 {
            store.save(&state).await.context("Failed to save state")?;
        }

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "path": path.as_str(),
                "dismissed": removed,
            }));
        } else if removed == 0 {
            formatter.warn(&format!("No conflict recorded at {path}"));
        } else {
            formatter.success(&format!(
                "Dismissed {} at {}",
                counted(removed, "conflict"),
                path
            ));
        }
        Ok(())
    }
}

fn conflict_json(conflict: &Conflict) -> serde_json::Value {
    let side = |s: &coursesync_core::domain::ConflictSide| {
        serde_json::json!({
            "id": s.id.as_str(),
            "url": s.url,
            "remote_updated_at": s.remote_updated_at.map(|at| at.to_rfc3339()),
        })
    };
    serde_json::json!({
        "id": conflict.id().to_string(),
        "kind": conflict.kind().to_string(),
        "course_id": conflict.course_id().as_str(),
        "path": conflict.path().as_str(),
        "kept": side(conflict.kept()),
        "rejected": side(conflict.rejected()),
    })
}
