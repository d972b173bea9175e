//! Connect command - Discover courses and build them from scratch

use anyhow::{Context, Result};
use clap::Args;

use crate::context::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ConnectCommand {}

impl ConnectCommand {
    pub async fn execute(&self, context: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let engine = context.engine(false).await?;

        formatter.info("Discovering courses...");
        let report = engine.connect().await.context("Connect failed")?;

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&report)?);
        } else {
            super::print_run_report(&report, &*formatter);
        }
        Ok(())
    }
}
