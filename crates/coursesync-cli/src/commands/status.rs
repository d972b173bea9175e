//! Status command - Display synchronization status
//!
//! Shows the watermark, every known course with its mapped content and
//! pending downloads, and the number of recorded conflicts. With `--check`
//! each built, enabled course is checked for files newer than its watermark.

use anyhow::{Context, Result};
use clap::Args;

use coursesync_core::domain::SyncState;
use coursesync_core::ports::IStateStore;

use crate::context::AppContext;
use crate::output::{counted, get_formatter, sync_flag, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Ask Canvas whether enabled courses have files newer than the last sync
    #[arg(long)]
    pub check: bool,
}

impl StatusCommand {
    pub async fn execute(&self, context: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let store = context.open_store().await?;
        let state = store.load().await.context("Failed to load state")?;

        let changed = if self.check {
            check_changes(context, &state).await?
        } else {
            Vec::new()
        };

        if format.is_json() {
            let mut json = status_json(&state);
            if self.check {
                json["courses_with_changes"] = serde_json::json!(changed);
            }
            formatter.print_json(&json);
            return Ok(());
        }

        match state.last_synced {
            Some(at) => formatter.success(&format!(
                "Last synced: {}",
                at.format("%Y-%m-%d %H:%M:%S UTC")
            )),
            None => formatter.success("Never synced"),
        }
        if state.has_new_courses {
            formatter.info("New courses were discovered. Run 'coursesync courses' to review them.");
        }

        let enabled = state.syncable_courses().count();
        formatter.info(&format!(
            "Courses: {} ({} enabled)",
            state.courses.len(),
            enabled
        ));
        for course in &state.courses {
            let pending = course.pending_downloads().count();
            formatter.info(&format!(
                "  {} [{}] {}, {} pending{}{}",
                course.name,
                sync_flag(course.sync),
                counted(course.files.len(), "file"),
                pending,
                if course.is_built() { "" } else { ", not built" },
                if changed.iter().any(|id| id == course.id.as_str()) {
                    ", changes on Canvas"
                } else {
                    ""
                }
            ));
        }

        if !state.conflicts.is_empty() {
            formatter.warn(&format!(
                "{} unresolved. Run 'coursesync conflicts list'.",
                counted(state.conflicts.len(), "conflict")
            ));
        }
        Ok(())
    }
}

/// IDs of enabled, built courses with files newer than their watermark
async fn check_changes(context: &AppContext, state: &SyncState) -> Result<Vec<String>> {
    let engine = context.engine(false).await?;

    let mut changed = Vec::new();
    for course in state.syncable_courses() {
        let Some(since) = course.watermark() else {
            continue;
        };
        if engine
            .differ()
            .has_new_files(course, since)
            .await
            .context("Change check failed")?
        {
            changed.push(course.id.as_str().to_string());
        }
    }
    Ok(changed)
}

fn status_json(state: &SyncState) -> serde_json::Value {
    serde_json::json!({
        "last_synced": state.last_synced.map(|at| at.to_rfc3339()),
        "has_new_courses": state.has_new_courses,
        "conflicts": state.conflicts.len(),
        "courses": state.courses.iter().map(super::course_json).collect::<Vec<_>>(),
    })
}
