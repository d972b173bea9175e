//! Sync command - Run one synchronization pass
//!
//! Courses that were never built completely get a full build; every other
//! course is diffed against the last watermark. With `--download` new and
//! updated files are written below `sync.root_folder`.

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use coursesync_core::domain::RemoteId;
use coursesync_sync::RunOptions;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Only synchronize this course (leaves the watermark untouched)
    #[arg(long)]
    pub course: Option<String>,

    /// Download new and updated files into the local mirror
    #[arg(long)]
    pub download: bool,

    /// Rediscover courses before synchronizing
    #[arg(long)]
    pub refresh: bool,
}

impl SyncCommand {
    pub async fn execute(&self, context: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let course = self
            .course
            .as_deref()
            .map(str::parse::<RemoteId>)
            .transpose()
            .context("Invalid course ID")?;

        let engine = context.engine(self.download).await?;
        if self.download {
            info!(root = %context.config().sync.root_folder.display(), "Downloads enabled");
        }

        formatter.info("Starting synchronization...");
        let report = engine
            .run(RunOptions {
                course,
                download: self.download,
                refresh_catalog: self.refresh,
            })
            .await
            .context("Sync failed")?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&report)?);
        } else if report.courses.is_empty() {
            formatter.success("No courses selected for sync. Run 'coursesync courses' first.");
        } else {
            super::print_run_report(&report, &*formatter);
        }
        Ok(())
    }
}
