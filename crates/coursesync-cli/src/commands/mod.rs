//! CLI subcommands
//!
//! `connect` and `sync` both print a [`RunReport`]; the rendering lives here.

pub mod conflicts;
pub mod connect;
pub mod courses;
pub mod status;
pub mod sync;
pub mod toggle;

use coursesync_core::domain::Course;
use coursesync_sync::{RunReport, SyncMode};

use crate::output::{counted, OutputFormatter};

/// JSON summary of one known course
pub(crate) fn course_json(course: &Course) -> serde_json::Value {
    serde_json::json!({
        "id": course.id.as_str(),
        "name": course.name,
        "sync": course.sync,
        "has_modules_tab": course.has_modules_tab,
        "has_files_tab": course.has_files_tab,
        "modules": course.modules.len(),
        "folders": course.folders.len(),
        "files": course.files.len(),
        "pending_downloads": course.pending_downloads().count(),
        "built_at": course.built_at.map(|at| at.to_rfc3339()),
        "synced_at": course.synced_at.map(|at| at.to_rfc3339()),
    })
}

/// Renders a run report in human form
pub(crate) fn print_run_report(report: &RunReport, formatter: &dyn OutputFormatter) {
    let duration = report.finished_at - report.started_at;
    formatter.success(&format!(
        "Synchronized {} in {:.1}s",
        counted(report.courses.len(), "course"),
        duration.num_milliseconds() as f64 / 1000.0
    ));

    for course in &report.courses {
        let mode = match course.mode {
            SyncMode::ColdBuild => "built",
            SyncMode::Incremental => "updated",
        };
        formatter.info(&format!(
            "{} ({}): {}, +{} new, {} changed, {}",
            course.course_name,
            course.course_id,
            mode,
            course.added,
            course.updated,
            counted(course.conflicts.len(), "conflict")
        ));
        if course.downloaded > 0 {
            formatter.info(&format!("    downloaded {}", counted(course.downloaded, "file")));
        }
        for listing in &course.branches.truncated_listings {
            formatter.warn(&format!(
                "{} returned a full page of {} and was not read further",
                listing.endpoint, listing.per_page
            ));
        }
    }

    for branch in report.failed_branches() {
        formatter.warn(&format!("{} failed: {}", branch.scope, branch.error));
    }

    if report.watermark_advanced {
        if let Some(at) = report.last_synced {
            formatter.info(&format!("Last synced: {}", at.format("%Y-%m-%d %H:%M:%S")));
        }
    } else if report.has_failures() {
        formatter.warn("Some branches failed; the next run will revisit them");
    }
}
