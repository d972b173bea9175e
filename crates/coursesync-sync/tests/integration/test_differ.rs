//! Warm-sync diffs against a watermark

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use coursesync_core::domain::{Course, CoursePath};
use coursesync_core::ports::FetchError;
use coursesync_core::NameSanitizer;
use coursesync_sync::{BranchScope, CourseMapBuilder, IncrementalDiffer, TreeCrawler};

use crate::common::{self, ScriptedFetcher};

fn differ(fetcher: &Arc<ScriptedFetcher>) -> IncrementalDiffer {
    let source = common::source(Arc::clone(fetcher), common::settings(4));
    let crawler = Arc::new(TreeCrawler::new(Arc::clone(&source), NameSanitizer::new()));
    let builder = Arc::new(CourseMapBuilder::new(
        Arc::clone(&source),
        Arc::clone(&crawler),
        NameSanitizer::new(),
    ));
    IncrementalDiffer::new(source, crawler, builder, NameSanitizer::new())
}

/// A built course that already knows folder `A`
fn known_course(since: DateTime<Utc>) -> Course {
    let mut course = common::files_course();
    let raw = common::folder_json(10, "course files/A", 1, 0, 1, since);
    let folder_path = CoursePath::new("Biology/A".into()).unwrap();
    course.folders.push(coursesync_core::domain::Folder {
        id: 10_u64.into(),
        name: "A".into(),
        path: folder_path,
        folders_count: 0,
        folders_endpoint: None,
        files_count: 1,
        files_endpoint: Some(raw["files_url"].as_str().unwrap().parse().unwrap()),
        remote_updated_at: Some(since),
        sync: true,
    });
    course.built_at = Some(since);
    course
}

#[tokio::test]
async fn test_only_entities_newer_than_the_watermark_are_returned() {
    let fetcher = ScriptedFetcher::new();
    let since = Utc::now() - Duration::hours(1);
    let before = since - Duration::seconds(1);
    let after = since + Duration::seconds(1);

    fetcher.collection(
        "courses/42/folders",
        vec![
            common::folder_json(20, "course files/B", 1, 0, 1, after),
            common::folder_json(10, "course files/A", 1, 0, 1, before),
        ],
    );
    fetcher.collection(
        &common::files_url(common::ROOT_FOLDER_ID),
        vec![
            common::file_json(1, "new.pdf", after),
            common::file_json(2, "old.pdf", before),
        ],
    );
    fetcher.collection(&common::files_url(10), vec![common::file_json(3, "a-old.pdf", before)]);
    // Files of a folder first seen now are kept even when older
    fetcher.collection(
        &common::files_url(20),
        vec![common::file_json(4, "b.pdf", since - Duration::days(3))],
    );

    let diff = differ(&fetcher)
        .diff(&known_course(since), since)
        .await
        .expect("diff failed");

    assert_eq!(diff.new_folders.len(), 1);
    assert_eq!(diff.new_folders[0].path.as_str(), "Biology/B");

    let mut paths: Vec<&str> = diff.files.iter().map(|f| f.path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(paths, vec!["Biology/B/b.pdf", "Biology/new.pdf"]);
    assert!(diff.branches.failed_branches.is_empty());
    assert!(diff.modules.is_none());
}

#[tokio::test]
async fn test_unexpected_root_label_is_reported() {
    let fetcher = ScriptedFetcher::new();
    let since = Utc::now() - Duration::hours(1);
    let after = since + Duration::minutes(5);

    fetcher.collection(
        "courses/42/folders",
        vec![common::folder_json(30, "Unfiled/C", 1, 0, 0, after)],
    );
    fetcher.collection(&common::files_url(common::ROOT_FOLDER_ID), Vec::new());
    fetcher.collection(&common::files_url(10), Vec::new());
    fetcher.collection(&common::files_url(30), Vec::new());

    let diff = differ(&fetcher)
        .diff(&known_course(since), since)
        .await
        .expect("diff failed");

    assert_eq!(diff.new_folders[0].path.as_str(), "Biology/Unfiled/C");
    assert_eq!(diff.branches.path_warnings.len(), 1);
    assert_eq!(diff.branches.path_warnings[0].raw_path, "Unfiled/C");
}

#[tokio::test]
async fn test_failed_folder_diff_still_checks_known_folders() {
    let fetcher = ScriptedFetcher::new();
    let since = Utc::now() - Duration::hours(1);
    let after = since + Duration::seconds(1);

    fetcher.fail("courses/42/folders", FetchError::Transport("502".into()));
    fetcher.collection(&common::files_url(common::ROOT_FOLDER_ID), Vec::new());
    fetcher.collection(&common::files_url(10), vec![common::file_json(3, "a-new.pdf", after)]);

    let diff = differ(&fetcher)
        .diff(&known_course(since), since)
        .await
        .expect("diff failed");

    assert_eq!(diff.files.len(), 1);
    assert_eq!(diff.files[0].path.as_str(), "Biology/A/a-new.pdf");
    assert_eq!(diff.branches.failed_branches.len(), 1);
    assert!(matches!(
        diff.branches.failed_branches[0].scope,
        BranchScope::FolderDiff { .. }
    ));
}

#[tokio::test]
async fn test_rejected_credential_aborts_the_diff() {
    let fetcher = ScriptedFetcher::new();
    let since = Utc::now();
    fetcher.fail("courses/42/folders", FetchError::AuthInvalid("revoked".into()));

    let err = differ(&fetcher)
        .diff(&known_course(since), since)
        .await
        .unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_has_new_files_checks_latest_file() {
    let fetcher = ScriptedFetcher::new();
    let since = Utc::now() - Duration::hours(1);
    fetcher.collection(
        "courses/42/files",
        vec![common::file_json(9, "fresh.pdf", since + Duration::seconds(1))],
    );
    let differ = differ(&fetcher);
    let course = known_course(since);

    assert!(differ.has_new_files(&course, since).await.unwrap());
    assert!(!differ
        .has_new_files(&course, since + Duration::minutes(1))
        .await
        .unwrap());

    fetcher.fail("courses/42/files", FetchError::Transport("timeout".into()));
    assert!(!differ.has_new_files(&course, since).await.unwrap());

    fetcher.fail("courses/42/files", FetchError::AuthInvalid("revoked".into()));
    assert!(differ.has_new_files(&course, since).await.is_err());
}
