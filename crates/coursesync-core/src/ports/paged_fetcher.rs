//! Paged fetcher port (driven/secondary port)
//!
//! Yields pages of raw JSON records for a remote collection endpoint.
//!
//! ## Design Notes
//!
//! - Unlike the other ports this one returns a classified [`FetchError`]:
//!   the engine aborts a whole run on [`FetchError::AuthInvalid`] and
//!   isolates every other failure to the branch that produced it.
//! - Timeouts are the adapter's concern and surface as
//!   [`FetchError::Transport`].

use serde_json::Value;
use thiserror::Error;

use crate::domain::newtypes::Endpoint;

// ============================================================================
// Errors
// ============================================================================

/// Failure of a single remote fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The access credential was rejected
    #[error("Access token rejected: {0}")]
    AuthInvalid(String),

    /// The endpoint does not exist or is not visible to the viewer
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other network or protocol failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// A record did not match the expected shape
    #[error("Malformed {kind} record: {reason}")]
    MalformedRecord { kind: &'static str, reason: String },
}

impl FetchError {
    /// Returns true if the failure must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::AuthInvalid(_))
    }
}

// ============================================================================
// Page queries
// ============================================================================

/// Server-side ordering of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Most recently updated first
    UpdatedAtDesc,
}

/// Which slice of a collection to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageQuery {
    /// Upper bound on records per page
    pub per_page: u32,
    /// 1-based page number
    pub page: u32,
    pub sort: Option<SortOrder>,
}

impl PageQuery {
    /// First page of `per_page` records, remote default order
    pub fn first(per_page: u32) -> Self {
        Self {
            per_page,
            page: 1,
            sort: None,
        }
    }

    /// Orders the listing by most recent update first
    pub fn recent_first(mut self) -> Self {
        self.sort = Some(SortOrder::UpdatedAtDesc);
        self
    }

    /// The page after this one
    pub fn next_page(self) -> Self {
        Self {
            page: self.page + 1,
            ..self
        }
    }
}

// ============================================================================
// IPagedFetcher trait
// ============================================================================

/// Port trait for reading the remote content store
#[async_trait::async_trait]
pub trait IPagedFetcher: Send + Sync {
    /// Fetches one bounded page of records from a collection endpoint
    ///
    /// A page shorter than `query.per_page` is the last one.
    async fn fetch_page(&self, endpoint: &Endpoint, query: &PageQuery)
        -> Result<Vec<Value>, FetchError>;

    /// Fetches a single record
    async fn fetch_one(&self, endpoint: &Endpoint) -> Result<Value, FetchError>;
}
