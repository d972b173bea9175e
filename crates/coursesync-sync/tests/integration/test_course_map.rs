//! Cold-start course assembly

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use coursesync_core::domain::{ConflictLedger, Course, FileOrigin, RemoteId};
use coursesync_core::ports::FetchError;
use coursesync_core::NameSanitizer;
use coursesync_sync::{BranchScope, CourseMapBuilder, TreeCrawler};

use crate::common::{self, ScriptedFetcher};

fn builder(fetcher: &Arc<ScriptedFetcher>) -> CourseMapBuilder {
    let source = common::source(Arc::clone(fetcher), common::settings(4));
    let crawler = Arc::new(TreeCrawler::new(Arc::clone(&source), NameSanitizer::new()));
    CourseMapBuilder::new(source, crawler, NameSanitizer::new())
}

fn modules_course() -> Course {
    let mut course = Course::new(RemoteId::from(common::COURSE_ID), "Biology");
    course.has_modules_tab = true;
    course
}

/// Scripts the module listing and returns each module's item listing
fn script_modules(fetcher: &ScriptedFetcher, modules: &[(u64, &str)]) -> Vec<String> {
    let items_urls: Vec<String> = modules
        .iter()
        .map(|(id, _)| format!("modules/{id}/items"))
        .collect();
    fetcher.collection(
        "courses/42/modules",
        modules
            .iter()
            .zip(&items_urls)
            .map(|((id, name), items_url)| {
                json!({
                    "id": id,
                    "name": name,
                    "items_count": 3,
                    "items_url": items_url
                })
            })
            .collect(),
    );
    items_urls
}

fn script_module(fetcher: &ScriptedFetcher, id: u64, name: &str) -> String {
    script_modules(fetcher, &[(id, name)]).remove(0)
}

fn no_conflicts() -> ConflictLedger {
    ConflictLedger::new()
}

#[tokio::test]
async fn test_module_files_are_collected() {
    let fetcher = ScriptedFetcher::new();
    let items_url = script_module(&fetcher, 1, "Week 1: Cells");
    fetcher.collection(
        &items_url,
        vec![
            json!({ "id": 11, "title": "Lab", "type": "File", "url": "files/11" }),
            json!({ "id": 12, "title": "Quiz", "type": "Quiz", "url": "quizzes/12" }),
            json!({ "id": 13, "title": "Key", "type": "File", "url": "files/13" }),
            json!({ "id": 14, "title": "Header", "type": "SubHeader" }),
        ],
    );
    fetcher.record(
        "files/11",
        json!({
            "id": 11,
            "display_name": "Lab one",
            "filename": "Lab%201+notes.pdf",
            "url": "https://canvas.example.edu/files/11/download",
            "size": 10,
            "updated_at": Utc::now().to_rfc3339()
        }),
    );
    fetcher.record(
        "files/13",
        json!({
            "id": 13,
            "display_name": "Answer key.pdf",
            "locked_for_user": true
        }),
    );

    let build = builder(&fetcher)
        .build(&modules_course(), &no_conflicts())
        .await
        .expect("build failed");

    let course = build.course;
    assert_eq!(course.modules.len(), 1);
    assert_eq!(course.modules[0].path.as_str(), "Biology/Week 1- Cells");
    assert_eq!(course.files.len(), 1);
    assert_eq!(
        course.files[0].path.as_str(),
        "Biology/Week 1- Cells/Lab 1 notes.pdf"
    );
    assert_eq!(course.files[0].origin, FileOrigin::Module);
    assert!(course.is_built());
    assert_eq!(build.added, 1);
    assert!(!fetcher.requested("quizzes/12"));
}

#[tokio::test]
async fn test_course_without_capabilities_is_empty() {
    let fetcher = ScriptedFetcher::new();
    let course = Course::new(RemoteId::from(common::COURSE_ID), "Seminar");

    let build = builder(&fetcher).build(&course, &no_conflicts()).await.expect("build failed");

    assert!(build.course.files.is_empty());
    assert!(build.course.folders.is_empty());
    assert!(build.course.modules.is_empty());
    assert!(build.course.is_built());
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn test_failed_branch_leaves_course_unbuilt() {
    let fetcher = ScriptedFetcher::new();
    let items_url = script_module(&fetcher, 1, "Week 1");
    fetcher.fail(&items_url, FetchError::Transport("connection reset".into()));

    let build = builder(&fetcher)
        .build(&modules_course(), &no_conflicts())
        .await
        .expect("build failed");

    assert!(!build.course.is_built());
    assert_eq!(build.course.modules.len(), 1);
    assert_eq!(build.branches.failed_branches.len(), 1);
    assert!(matches!(
        build.branches.failed_branches[0].scope,
        BranchScope::Module { .. }
    ));
}

#[tokio::test]
async fn test_failed_module_leaves_sibling_modules_intact() {
    let fetcher = ScriptedFetcher::new();
    let items = script_modules(&fetcher, &[(1, "Week 1"), (2, "Week 2")]);
    fetcher.fail(&items[0], FetchError::Transport("connection reset".into()));
    fetcher.collection(
        &items[1],
        vec![json!({ "id": 21, "title": "Handout", "type": "File", "url": "files/21" })],
    );
    fetcher.record(
        "files/21",
        json!({
            "id": 21,
            "display_name": "Handout.pdf",
            "filename": "Handout.pdf",
            "url": "https://canvas.example.edu/files/21/download",
            "size": 20,
            "updated_at": Utc::now().to_rfc3339()
        }),
    );

    let build = builder(&fetcher)
        .build(&modules_course(), &no_conflicts())
        .await
        .expect("build failed");

    let course = &build.course;
    assert_eq!(course.modules.len(), 2);
    assert_eq!(course.files.len(), 1);
    assert_eq!(course.files[0].path.as_str(), "Biology/Week 2/Handout.pdf");
    assert_eq!(course.files[0].origin, FileOrigin::Module);
    assert_eq!(build.added, 1);
    assert!(!course.is_built());

    assert_eq!(build.branches.failed_branches.len(), 1);
    match &build.branches.failed_branches[0].scope {
        BranchScope::Module { path } => assert_eq!(path.as_str(), "Biology/Week 1"),
        other => panic!("unexpected scope: {other:?}"),
    }
}

#[tokio::test]
async fn test_rebuild_keeps_paths_held_by_open_conflicts() {
    let fetcher = ScriptedFetcher::new();
    let before = Utc::now() - Duration::hours(1);
    fetcher.collection(&common::folders_url(common::ROOT_FOLDER_ID), Vec::new());
    fetcher.collection(
        &common::files_url(common::ROOT_FOLDER_ID),
        vec![
            common::file_json(1, "Notes | week 1", before),
            common::file_json(2, "Notes | week 2", before),
        ],
    );
    let builder = builder(&fetcher);
    let first = builder
        .build(&common::files_course(), &no_conflicts())
        .await
        .expect("first build failed");
    let open: ConflictLedger = first.conflicts.iter().cloned().collect();

    fetcher.collection(
        &common::files_url(common::ROOT_FOLDER_ID),
        vec![common::file_json(2, "Notes | week 2", Utc::now())],
    );
    let second = builder
        .build(&first.course, &open)
        .await
        .expect("second build failed");

    assert_eq!(second.course.files, first.course.files);
    assert_eq!(second.updated, 0);
    assert_eq!(second.conflicts.len(), 1);
    assert_eq!(second.conflicts[0].id(), first.conflicts[0].id());
}

#[tokio::test]
async fn test_names_colliding_after_sanitizing_become_conflicts() {
    let fetcher = ScriptedFetcher::new();
    let at = Utc::now();
    fetcher.collection(&common::folders_url(common::ROOT_FOLDER_ID), Vec::new());
    fetcher.collection(
        &common::files_url(common::ROOT_FOLDER_ID),
        vec![
            common::file_json(1, "Notes | week 1", at),
            common::file_json(2, "Notes | week 2", at),
        ],
    );

    let build = builder(&fetcher)
        .build(&common::files_course(), &no_conflicts())
        .await
        .expect("build failed");

    assert_eq!(build.course.files.len(), 1);
    assert_eq!(build.course.files[0].id, RemoteId::from(1_u64));
    assert_eq!(build.conflicts.len(), 1);
    let conflict = &build.conflicts[0];
    assert_eq!(conflict.path().as_str(), "Biology/Notes");
    assert_eq!(conflict.kept().id, RemoteId::from(1_u64));
    assert_eq!(conflict.rejected().id, RemoteId::from(2_u64));
}

#[tokio::test]
async fn test_root_endpoints_are_resolved_when_unknown() {
    let fetcher = ScriptedFetcher::new();
    let at = Utc::now();
    fetcher.record("courses/42/folders/root", common::root_folder_json());
    fetcher.collection(&common::folders_url(common::ROOT_FOLDER_ID), Vec::new());
    fetcher.collection(
        &common::files_url(common::ROOT_FOLDER_ID),
        vec![common::file_json(5, "syllabus.pdf", at)],
    );

    let mut course = Course::new(RemoteId::from(common::COURSE_ID), "Biology");
    course.has_files_tab = true;

    let build = builder(&fetcher).build(&course, &no_conflicts()).await.expect("build failed");

    assert!(build.course.files_endpoint.is_some());
    assert_eq!(build.course.files.len(), 1);
    assert_eq!(build.course.files[0].path.as_str(), "Biology/syllabus.pdf");
}
