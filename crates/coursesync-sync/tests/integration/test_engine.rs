//! Orchestrated runs against an in-memory state store

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;

use coursesync_core::domain::{RemoteId, SyncState};
use coursesync_core::ports::{FetchError, IStateStore};
use coursesync_sync::report::SyncMode;
use coursesync_sync::{RunOptions, SyncEngine, SyncError};

use crate::common::{self, MemoryStore, ScriptedFetcher};

fn engine(fetcher: &Arc<ScriptedFetcher>, store: &Arc<MemoryStore>) -> SyncEngine {
    SyncEngine::new(fetcher.clone(), store.clone(), common::settings(4))
}

fn state_with_course() -> SyncState {
    let mut state = SyncState::new();
    state.upsert_course(common::files_course());
    state
}

/// A course whose files all sit in the root folder
fn script_root_files(fetcher: &ScriptedFetcher, files: Vec<serde_json::Value>) {
    fetcher.collection(&common::folders_url(common::ROOT_FOLDER_ID), Vec::new());
    fetcher.collection("courses/42/folders", Vec::new());
    fetcher.collection(&common::files_url(common::ROOT_FOLDER_ID), files);
}

async fn toggle_course(store: &MemoryStore) {
    let mut state = store.state();
    state.toggle_course_sync(&RemoteId::from(common::COURSE_ID));
    store.save(&state).await.expect("save failed");
}

async fn tick() {
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
}

#[tokio::test]
async fn test_first_run_builds_and_advances_the_watermark() {
    let fetcher = ScriptedFetcher::new();
    common::script_three_by_two(&fetcher, Utc::now() - Duration::hours(1));
    let store = MemoryStore::with_state(state_with_course());

    let report = engine(&fetcher, &store)
        .run(RunOptions::default())
        .await
        .expect("run failed");

    assert_eq!(report.courses.len(), 1);
    assert_eq!(report.courses[0].mode, SyncMode::ColdBuild);
    assert!(report.watermark_advanced);
    assert_eq!(store.saves(), 1);

    let state = store.state();
    assert_eq!(state.last_synced, Some(report.started_at));
    assert_eq!(state.courses[0].files.len(), 6);
    assert!(state.courses[0].is_built());
    assert_eq!(state.courses[0].synced_at, Some(report.started_at));
}

#[tokio::test]
async fn test_second_run_is_incremental() {
    let fetcher = ScriptedFetcher::new();
    common::script_three_by_two(&fetcher, Utc::now() - Duration::hours(1));
    fetcher.collection("courses/42/folders", Vec::new());
    let store = MemoryStore::with_state(state_with_course());
    let engine = engine(&fetcher, &store);

    engine.run(RunOptions::default()).await.expect("first run failed");
    let report = engine.run(RunOptions::default()).await.expect("second run failed");

    assert_eq!(report.courses[0].mode, SyncMode::Incremental);
    assert_eq!(report.total_added(), 0);
    assert!(report.watermark_advanced);
    assert_eq!(store.state().courses[0].files.len(), 6);
    assert!(fetcher.requested("courses/42/folders"));
}

#[tokio::test]
async fn test_failed_branch_keeps_the_watermark() {
    let fetcher = ScriptedFetcher::new();
    common::script_three_by_two(&fetcher, Utc::now() - Duration::hours(1));
    fetcher.fail(&common::files_url(12), FetchError::NotFound("gone".into()));
    let store = MemoryStore::with_state(state_with_course());

    let report = engine(&fetcher, &store)
        .run(RunOptions::default())
        .await
        .expect("run failed");

    assert!(!report.watermark_advanced);
    assert!(report.has_failures());
    assert_eq!(report.failed_branches().count(), 1);

    let state = store.state();
    assert_eq!(store.saves(), 1);
    assert!(state.last_synced.is_none());
    assert_eq!(state.courses[0].files.len(), 4);
    assert!(!state.courses[0].is_built());
    assert!(state.courses[0].synced_at.is_none());
}

#[tokio::test]
async fn test_rejected_credential_aborts_without_saving() {
    let fetcher = ScriptedFetcher::new();
    common::script_three_by_two(&fetcher, Utc::now());
    fetcher.fail(&common::files_url(13), FetchError::AuthInvalid("expired".into()));
    let store = MemoryStore::with_state(state_with_course());

    let err = engine(&fetcher, &store)
        .run(RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::AuthInvalid(_)));
    assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn test_unknown_course_is_rejected() {
    let fetcher = ScriptedFetcher::new();
    let store = MemoryStore::with_state(state_with_course());

    let err = engine(&fetcher, &store)
        .run(RunOptions {
            course: Some(RemoteId::from(999_u64)),
            ..RunOptions::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::UnknownCourse(_)));
}

#[tokio::test]
async fn test_single_course_run_leaves_the_watermark() {
    let fetcher = ScriptedFetcher::new();
    common::script_three_by_two(&fetcher, Utc::now());
    let store = MemoryStore::with_state(state_with_course());

    let report = engine(&fetcher, &store)
        .run(RunOptions {
            course: Some(RemoteId::from(common::COURSE_ID)),
            ..RunOptions::default()
        })
        .await
        .expect("run failed");

    assert!(!report.watermark_advanced);
    let state = store.state();
    assert!(state.last_synced.is_none());
    assert_eq!(state.courses[0].files.len(), 6);
    assert_eq!(state.courses[0].synced_at, Some(report.started_at));
}

#[tokio::test]
async fn test_conflicts_are_recorded_in_the_ledger() {
    let fetcher = ScriptedFetcher::new();
    let at = Utc::now();
    fetcher.collection(&common::folders_url(common::ROOT_FOLDER_ID), Vec::new());
    fetcher.collection(
        &common::files_url(common::ROOT_FOLDER_ID),
        vec![
            common::file_json(1, "Syllabus", at),
            common::file_json(2, "Syllabus | Fall", at),
        ],
    );
    let store = MemoryStore::with_state(state_with_course());

    let report = engine(&fetcher, &store)
        .run(RunOptions::default())
        .await
        .expect("run failed");

    assert_eq!(report.total_conflicts(), 1);
    let state = store.state();
    assert_eq!(state.conflicts.len(), 1);
    assert_eq!(
        state.conflicts.iter().next().unwrap().path().as_str(),
        "Biology/Syllabus"
    );
}

#[tokio::test]
async fn test_open_conflict_keeps_its_occupant_on_later_runs() {
    let fetcher = ScriptedFetcher::new();
    let before = Utc::now() - Duration::hours(2);
    script_root_files(
        &fetcher,
        vec![
            common::file_json(500, "Syllabus", before),
            common::file_json(501, "Syllabus | Fall", before),
        ],
    );
    let store = MemoryStore::with_state(state_with_course());
    let engine = engine(&fetcher, &store);

    let first = engine.run(RunOptions::default()).await.expect("first run failed");
    assert_eq!(first.total_conflicts(), 1);

    // Only the rejected file changes on the remote
    script_root_files(
        &fetcher,
        vec![
            common::file_json(501, "Syllabus | Fall", Utc::now() + Duration::minutes(1)),
            common::file_json(500, "Syllabus", before),
        ],
    );
    let second = engine.run(RunOptions::default()).await.expect("second run failed");

    assert_eq!(second.courses[0].mode, SyncMode::Incremental);
    assert_eq!(second.total_updated(), 0);
    assert_eq!(second.total_conflicts(), 1);

    let state = store.state();
    let files = &state.courses[0].files;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path.as_str(), "Biology/Syllabus");
    assert_eq!(files[0].id.as_str(), "500");

    assert_eq!(state.conflicts.len(), 1);
    let conflict = state.conflicts.iter().next().unwrap();
    assert_eq!(conflict.kept().id.as_str(), "500");
    assert_eq!(conflict.rejected().id.as_str(), "501");
}

#[tokio::test]
async fn test_dismissed_conflict_releases_the_path() {
    let fetcher = ScriptedFetcher::new();
    let before = Utc::now() - Duration::hours(2);
    script_root_files(
        &fetcher,
        vec![
            common::file_json(500, "Syllabus", before),
            common::file_json(501, "Syllabus | Fall", before),
        ],
    );
    let store = MemoryStore::with_state(state_with_course());
    let engine = engine(&fetcher, &store);
    engine.run(RunOptions::default()).await.expect("first run failed");

    let mut state = store.state();
    let path = state.courses[0].files[0].path.clone();
    assert_eq!(state.conflicts.dismiss(&path), 1);
    store.save(&state).await.expect("save failed");

    script_root_files(
        &fetcher,
        vec![common::file_json(501, "Syllabus | Fall", Utc::now() + Duration::minutes(1))],
    );
    let report = engine.run(RunOptions::default()).await.expect("second run failed");

    assert_eq!(report.total_conflicts(), 0);
    assert_eq!(report.total_updated(), 1);
    let state = store.state();
    assert!(state.conflicts.is_empty());
    assert_eq!(state.courses[0].files[0].id.as_str(), "501");
}

#[tokio::test]
async fn test_reenabled_course_catches_up_from_its_own_watermark() {
    let fetcher = ScriptedFetcher::new();
    let before = Utc::now() - Duration::hours(2);
    script_root_files(&fetcher, vec![common::file_json(600, "a.pdf", before)]);
    let store = MemoryStore::with_state(state_with_course());
    let engine = engine(&fetcher, &store);

    let first = engine.run(RunOptions::default()).await.expect("first run failed");
    assert_eq!(first.courses[0].mode, SyncMode::ColdBuild);
    toggle_course(&store).await;

    // Uploaded while the course is switched off
    tick().await;
    let uploaded = Utc::now();
    tick().await;
    script_root_files(
        &fetcher,
        vec![
            common::file_json(601, "b.pdf", uploaded),
            common::file_json(600, "a.pdf", before),
        ],
    );

    let idle = engine.run(RunOptions::default()).await.expect("second run failed");
    assert!(idle.courses.is_empty());
    assert!(idle.watermark_advanced);
    assert!(store.state().last_synced > Some(uploaded));
    assert_eq!(store.state().courses[0].synced_at, Some(first.started_at));

    toggle_course(&store).await;
    let third = engine.run(RunOptions::default()).await.expect("third run failed");

    assert_eq!(third.courses[0].mode, SyncMode::Incremental);
    assert_eq!(third.total_added(), 1);
    let state = store.state();
    let paths: Vec<&str> = state.courses[0].files.iter().map(|f| f.path.as_str()).collect();
    assert_eq!(paths, vec!["Biology/a.pdf", "Biology/b.pdf"]);
    assert_eq!(state.courses[0].synced_at, Some(third.started_at));
}

#[tokio::test]
async fn test_connect_discovers_courses() {
    let fetcher = ScriptedFetcher::new();
    common::script_three_by_two(&fetcher, Utc::now() - Duration::hours(1));
    fetcher.collection(
        "users/self/courses?enrollment_state=active",
        vec![
            json!({ "id": 42, "name": "Biology" }),
            json!({ "id": 43, "name": "Chemistry" }),
            json!({ "name": "missing id" }),
        ],
    );
    fetcher.collection(
        "courses/42/tabs",
        vec![json!({ "id": "home" }), json!({ "id": "files" })],
    );
    fetcher.fail("courses/43/tabs", FetchError::Transport("503".into()));
    fetcher.record("courses/42/folders/root", common::root_folder_json());
    let store = MemoryStore::with_state(SyncState::new());

    let report = engine(&fetcher, &store).connect().await.expect("connect failed");

    assert_eq!(report.catalog_failures.len(), 2);
    assert!(!report.watermark_advanced);

    let state = store.state();
    assert!(state.has_new_courses);
    assert_eq!(state.courses.len(), 1);
    let course = &state.courses[0];
    assert!(course.has_files_tab);
    assert!(!course.has_modules_tab);
    assert_eq!(course.files.len(), 6);
}
