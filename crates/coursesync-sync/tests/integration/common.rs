//! Shared helpers for sync engine integration tests
//!
//! [`ScriptedFetcher`] serves canned records keyed by endpoint, sliced into
//! pages the way the remote API pages them, and records how many requests
//! were in flight at once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use coursesync_core::domain::{Course, Endpoint, RemoteId, SyncState};
use coursesync_core::ports::{FetchError, IPagedFetcher, IStateStore, PageQuery};
use coursesync_sync::{RemoteSource, SyncSettings};

// ============================================================================
// ScriptedFetcher
// ============================================================================

#[derive(Default)]
pub struct ScriptedFetcher {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    records: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, FetchError>>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[allow(dead_code)]
impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serves `items` as a collection at `endpoint`
    pub fn collection(&self, endpoint: &str, items: Vec<Value>) {
        self.collections
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), items);
    }

    /// Serves `record` as a single record at `endpoint`
    pub fn record(&self, endpoint: &str, record: Value) {
        self.records
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), record);
    }

    /// Makes every request to `endpoint` fail
    pub fn fail(&self, endpoint: &str, err: FetchError) {
        self.failures
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), err);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested(&self, endpoint: &str) -> bool {
        self.requests().iter().any(|r| r == endpoint)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn serve<T>(
        &self,
        endpoint: &Endpoint,
        body: impl FnOnce() -> Option<T>,
    ) -> Result<T, FetchError> {
        self.requests
            .lock()
            .unwrap()
            .push(endpoint.as_str().to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(err) = self.failures.lock().unwrap().get(endpoint.as_str()) {
            return Err(err.clone());
        }
        body().ok_or_else(|| FetchError::NotFound(endpoint.as_str().to_string()))
    }
}

#[async_trait::async_trait]
impl IPagedFetcher for ScriptedFetcher {
    async fn fetch_page(
        &self,
        endpoint: &Endpoint,
        query: &PageQuery,
    ) -> Result<Vec<Value>, FetchError> {
        self.serve(endpoint, || {
            let collections = self.collections.lock().unwrap();
            let items = collections.get(endpoint.as_str())?;
            let per_page = query.per_page as usize;
            let start = (query.page as usize - 1) * per_page;
            Some(items.iter().skip(start).take(per_page).cloned().collect())
        })
        .await
    }

    async fn fetch_one(&self, endpoint: &Endpoint) -> Result<Value, FetchError> {
        self.serve(endpoint, || {
            self.records.lock().unwrap().get(endpoint.as_str()).cloned()
        })
        .await
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<SyncState>,
    saves: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn with_state(state: SyncState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            saves: AtomicUsize::new(0),
        })
    }

    pub fn state(&self) -> SyncState {
        self.state.lock().unwrap().clone()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IStateStore for MemoryStore {
    async fn load(&self) -> anyhow::Result<SyncState> {
        Ok(self.state())
    }

    async fn save(&self, state: &SyncState) -> anyhow::Result<()> {
        *self.state.lock().unwrap() = state.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const COURSE_ID: u64 = 42;
pub const ROOT_FOLDER_ID: u64 = 1;

pub fn settings(width: usize) -> SyncSettings {
    SyncSettings {
        max_concurrent_requests: width,
        ..SyncSettings::default()
    }
}

pub fn source(fetcher: Arc<ScriptedFetcher>, settings: SyncSettings) -> Arc<RemoteSource> {
    Arc::new(RemoteSource::new(fetcher, settings))
}

pub fn folders_url(id: u64) -> String {
    format!("folders/{id}/folders")
}

pub fn files_url(id: u64) -> String {
    format!("folders/{id}/files")
}

/// A course with a files tab whose root folder endpoints are known
pub fn files_course() -> Course {
    let mut course = Course::new(RemoteId::from(COURSE_ID), "Biology");
    course.has_files_tab = true;
    course.files_endpoint = Some(files_url(ROOT_FOLDER_ID).parse().unwrap());
    course.folders_endpoint = Some(folders_url(ROOT_FOLDER_ID).parse().unwrap());
    course
}

pub fn root_folder_json() -> Value {
    json!({
        "id": ROOT_FOLDER_ID,
        "name": "course files",
        "full_name": "course files",
        "parent_folder_id": null,
        "folders_count": 0,
        "files_count": 0,
        "folders_url": folders_url(ROOT_FOLDER_ID),
        "files_url": files_url(ROOT_FOLDER_ID)
    })
}

pub fn folder_json(
    id: u64,
    full_name: &str,
    parent: u64,
    folders_count: u32,
    files_count: u32,
    updated_at: DateTime<Utc>,
) -> Value {
    let name = full_name.rsplit('/').next().unwrap_or(full_name);
    json!({
        "id": id,
        "name": name,
        "full_name": full_name,
        "parent_folder_id": parent,
        "updated_at": updated_at.to_rfc3339(),
        "folders_count": folders_count,
        "files_count": files_count,
        "folders_url": folders_url(id),
        "files_url": files_url(id)
    })
}

pub fn file_json(id: u64, name: &str, updated_at: DateTime<Utc>) -> Value {
    json!({
        "id": id,
        "display_name": name,
        "filename": name,
        "url": format!("https://canvas.example.edu/files/{id}/download"),
        "size": 1024,
        "updated_at": updated_at.to_rfc3339(),
        "locked_for_user": false
    })
}

/// Scripts folder `A` with three sub-folders of two files each
pub fn script_three_by_two(fetcher: &ScriptedFetcher, at: DateTime<Utc>) {
    fetcher.collection(
        &folders_url(ROOT_FOLDER_ID),
        vec![folder_json(10, "course files/A", ROOT_FOLDER_ID, 3, 0, at)],
    );
    fetcher.collection(&files_url(ROOT_FOLDER_ID), Vec::new());

    let subs: Vec<Value> = (0..3_u64)
        .map(|i| folder_json(11 + i, &format!("course files/A/Sub{i}"), 10, 0, 2, at))
        .collect();
    fetcher.collection(&folders_url(10), subs);
    fetcher.collection(&files_url(10), Vec::new());

    for i in 0..3_u64 {
        let folder = 11 + i;
        fetcher.collection(
            &files_url(folder),
            vec![
                file_json(100 + folder * 10, &format!("notes-{i}.pdf"), at),
                file_json(101 + folder * 10, &format!("slides-{i}.pdf"), at),
            ],
        );
    }
}
