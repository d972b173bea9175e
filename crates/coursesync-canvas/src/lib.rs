//! CourseSync Canvas - Canvas LMS REST API client
//!
//! Provides:
//! - An authenticated HTTP client for `<instance>/api/v1`
//! - Paged collection reads with `per_page`, `page` and update ordering
//! - Automatic backoff on throttled requests
//! - [`CanvasProvider`], the fetcher and downloader ports over that client
//!
//! ## Modules
//!
//! - [`client`] - Canvas HTTP client
//! - [`provider`] - Port implementations for the sync engine

pub mod client;
pub mod provider;

pub use client::CanvasClient;
pub use provider::CanvasProvider;

use std::time::Duration;

use coursesync_core::ports::FetchError;
use thiserror::Error;

/// Errors that can occur when talking to a Canvas instance
#[derive(Debug, Error)]
pub enum CanvasError {
    /// The access token is missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The resource does not exist or is hidden from the viewer
    #[error("Not found: {0}")]
    NotFound(String),

    /// Throttled and still throttled after every retry
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Last wait the server asked for
        retry_after: Duration,
    },

    /// Any other non-success status
    #[error("HTTP {status}: {url}")]
    Status {
        status: u16,
        url: String,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The instance URL or an endpoint could not be turned into a URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The response body was not what the endpoint returns
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl From<CanvasError> for FetchError {
    fn from(err: CanvasError) -> Self {
        match err {
            CanvasError::Unauthorized(msg) => FetchError::AuthInvalid(msg),
            CanvasError::NotFound(msg) => FetchError::NotFound(msg),
            CanvasError::UnexpectedResponse(reason) => FetchError::MalformedRecord {
                kind: "response",
                reason,
            },
            other => FetchError::Transport(other.to_string()),
        }
    }
}
