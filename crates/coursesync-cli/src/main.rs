//! CourseSync CLI - Command-line interface for CourseSync
//!
//! Provides commands for:
//! - Discovering the courses of the configured Canvas account
//! - Building and incrementally synchronizing course maps
//! - Viewing sync status and recorded path conflicts
//! - Choosing which courses are mirrored

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    conflicts::ConflictsCommand, connect::ConnectCommand, courses::CoursesCommand,
    status::StatusCommand, sync::SyncCommand, toggle::ToggleCommand,
};
use context::AppContext;
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "coursesync", version, about = "Mirror Canvas course content locally")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Discover and list your active courses
    Courses(CoursesCommand),
    /// Discover courses and build every course map from scratch
    Connect(ConnectCommand),
    /// Run one synchronization pass
    Sync(SyncCommand),
    /// Show synchronization status
    Status(StatusCommand),
    /// Manage recorded path conflicts
    #[command(subcommand)]
    Conflicts(ConflictsCommand),
    /// Enable or disable mirroring of a course
    Toggle(ToggleCommand),
}

/// Default filter directive for the configured level and `-v` count
fn filter_directive(configured: &str, verbose: u8) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = AppContext::load(cli.config.as_deref())?;

    let directive = filter_directive(&context.config().logging.level, cli.verbose);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from_flag(cli.json);

    match cli.command {
        Commands::Courses(cmd) => cmd.execute(&context, format).await,
        Commands::Connect(cmd) => cmd.execute(&context, format).await,
        Commands::Sync(cmd) => cmd.execute(&context, format).await,
        Commands::Status(cmd) => cmd.execute(&context, format).await,
        Commands::Conflicts(cmd) => cmd.execute(&context, format).await,
        Commands::Toggle(cmd) => cmd.execute(&context, format).await,
    }
}
