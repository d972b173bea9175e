//! Courses command - Discover and list courses
//!
//! Refreshes the course catalog from Canvas (unless `--cached`), lists
//! every known course with its sync flag and clears the new-courses flag.

use anyhow::{Context, Result};
use clap::Args;

use coursesync_core::ports::IStateStore;

use crate::context::AppContext;
use crate::output::{counted, get_formatter, sync_flag, OutputFormat, Table};

#[derive(Debug, Args)]
pub struct CoursesCommand {
    /// List the stored courses without contacting Canvas
    #[arg(long)]
    pub cached: bool,
}

impl CoursesCommand {
    pub async fn execute(&self, context: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let refresh = if self.cached {
            None
        } else {
            let engine = context.engine(false).await?;
            Some(
                engine
                    .refresh_catalog()
                    .await
                    .context("Course discovery failed")?,
            )
        };

        let store = context.open_store().await?;
        let mut state = store.load().await.context("Failed to load state")?;
        let had_new_courses = state.has_new_courses;
        if had_new_courses {
            state.has_new_courses = false;
            store.save(&state).await.context("Failed to save state")?;
        }

        if format.is_json() {
            let courses: Vec<serde_json::Value> =
                state.courses.iter().map(super::course_json).collect();
            let json = serde_json::json!({
                "count": courses.len(),
                "new_courses": had_new_courses,
                "courses": courses,
                "discovery_failures": refresh.as_ref().map(|r| &r.failures),
            });
            formatter.print_json(&json);
            return Ok(());
        }

        if let Some(refresh) = &refresh {
            if refresh.added > 0 {
                formatter.success(&format!("Found {} new", counted(refresh.added, "course")));
            }
            for failure in &refresh.failures {
                formatter.warn(&format!("{} failed: {}", failure.scope, failure.error));
            }
        }

        if state.courses.is_empty() {
            formatter.success("No courses found");
            return Ok(());
        }

        formatter.success(&counted(state.courses.len(), "course"));
        formatter.info("");
        let mut table = Table::new(["Sync", "ID", "Files", "Name"]);
        for course in &state.courses {
            table.row([
                sync_flag(course.sync).to_string(),
                course.id.as_str().to_string(),
                course.files.len().to_string(),
                course.name.clone(),
            ]);
        }
        formatter.table(&table);
        formatter.info("");
        formatter.info("Use 'coursesync toggle <id>' to enable or disable a course.");

        Ok(())
    }
}
