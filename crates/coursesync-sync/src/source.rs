//! Typed, gated access to the remote content store
//!
//! [`RemoteSource`] wraps an [`IPagedFetcher`] with:
//!
//! - a global request ceiling (a semaphore permit per request), shared by
//!   every branch of every fan-out
//! - record validation at the boundary (raw JSON into typed records)
//! - paging: one bounded page by default, or every page until a short one
//!   when exhaustive paging is enabled

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use coursesync_core::domain::Endpoint;
use coursesync_core::ports::records::{decode, decode_all};
use coursesync_core::ports::{FetchError, IPagedFetcher, PageQuery, SortOrder};

use crate::report::TruncatedListing;
use crate::settings::SyncSettings;

/// Hard stop for exhaustive paging against a misbehaving remote
const MAX_PAGES: u32 = 500;

/// Records gathered from one listing
#[derive(Debug, Clone)]
pub struct Listing<T> {
    pub items: Vec<T>,
    /// Set when a full page was returned and not followed
    pub truncated: Option<TruncatedListing>,
}

/// Shared entry point for every remote read of a run
pub struct RemoteSource {
    fetcher: Arc<dyn IPagedFetcher>,
    gate: Semaphore,
    settings: SyncSettings,
}

impl RemoteSource {
    pub fn new(fetcher: Arc<dyn IPagedFetcher>, settings: SyncSettings) -> Self {
        Self {
            fetcher,
            gate: Semaphore::new(settings.width()),
            settings,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    async fn page(&self, endpoint: &Endpoint, query: &PageQuery) -> Result<Vec<Value>, FetchError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| FetchError::Transport("request gate closed".to_string()))?;
        debug!(endpoint = %endpoint, page = query.page, per_page = query.per_page, "Fetching page");
        self.fetcher.fetch_page(endpoint, query).await
    }

    /// Fetches and validates a single record
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        endpoint: &Endpoint,
    ) -> Result<T, FetchError> {
        let raw = {
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| FetchError::Transport("request gate closed".to_string()))?;
            debug!(endpoint = %endpoint, "Fetching record");
            self.fetcher.fetch_one(endpoint).await?
        };
        decode(kind, raw)
    }

    /// Reads only the first page of a collection, without truncation
    /// reporting
    pub async fn peek<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        endpoint: &Endpoint,
        query: PageQuery,
    ) -> Result<Vec<T>, FetchError> {
        let raw = self.page(endpoint, &query).await?;
        decode_all(kind, raw)
    }

    /// Lists a collection
    pub async fn list<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        endpoint: &Endpoint,
        per_page: u32,
        sort: Option<SortOrder>,
    ) -> Result<Listing<T>, FetchError> {
        self.list_until(kind, endpoint, per_page, sort, |_| false)
            .await
    }

    /// Lists a collection, not following further pages once `done` returns
    /// true for the page just read
    ///
    /// Used with most-recent-first listings to stop at the first page that
    /// reaches past a watermark.
    pub async fn list_until<T, P>(
        &self,
        kind: &'static str,
        endpoint: &Endpoint,
        per_page: u32,
        sort: Option<SortOrder>,
        done: P,
    ) -> Result<Listing<T>, FetchError>
    where
        T: DeserializeOwned,
        P: Fn(&[T]) -> bool,
    {
        let mut query = PageQuery::first(per_page);
        query.sort = sort;

        let mut items = Vec::new();
        loop {
            let raw = self.page(endpoint, &query).await?;
            let full = raw.len() >= per_page as usize;
            let records: Vec<T> = decode_all(kind, raw)?;
            let reached = done(&records);
            items.extend(records);

            if !full || reached {
                return Ok(Listing {
                    items,
                    truncated: None,
                });
            }

            if !self.settings.exhaustive_paging || query.page >= MAX_PAGES {
                warn!(
                    endpoint = %endpoint,
                    per_page,
                    pages = query.page,
                    "Listing returned a full page; remaining records were not fetched"
                );
                return Ok(Listing {
                    items,
                    truncated: Some(TruncatedListing {
                        endpoint: endpoint.clone(),
                        per_page,
                    }),
                });
            }

            query = query.next_page();
        }
    }
}
