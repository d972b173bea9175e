//! Canvas LMS HTTP client
//!
//! Wraps `reqwest::Client` with bearer authentication, endpoint resolution
//! against `<instance>/api/v1/` and status classification.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use coursesync_canvas::client::CanvasClient;
//! use coursesync_core::domain::Endpoint;
//!
//! # async fn example() -> Result<(), coursesync_canvas::CanvasError> {
//! let client = CanvasClient::new("https://school.instructure.com", "token")?;
//! let url = client.resolve(&Endpoint::active_courses())?;
//! let courses = client.get_json(url).await?;
//! println!("{courses}");
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use coursesync_core::domain::Endpoint;
use coursesync_core::ports::{PageQuery, SortOrder};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::CanvasError;

/// Path of the REST API below the instance root
const API_PREFIX: &str = "api/v1/";

/// Default retry-after duration when the header is missing
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Maximum number of retries for throttled requests
const DEFAULT_MAX_RETRIES: u32 = 5;

/// Longest wait accepted from an HTTP-date `Retry-After`
const MAX_RETRY_AFTER_SECS: u64 = 3600;

// ============================================================================
// CanvasClient
// ============================================================================

/// HTTP client for one Canvas instance
pub struct CanvasClient {
    client: Client,
    /// `<instance>/api/v1/`
    api_root: Url,
    access_token: String,
    max_retries: u32,
    default_retry_after: Duration,
}

impl CanvasClient {
    /// Creates a client for the instance at `base_url`
    ///
    /// # Errors
    /// Returns [`CanvasError::InvalidUrl`] if `base_url` is not an absolute URL
    pub fn new(base_url: &str, access_token: impl Into<String>) -> Result<Self, CanvasError> {
        let mut root = Url::parse(base_url.trim())
            .map_err(|e| CanvasError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let api_root = root
            .join(API_PREFIX)
            .map_err(|e| CanvasError::InvalidUrl(format!("{base_url}: {e}")))?;

        Ok(Self {
            client: Client::new(),
            api_root,
            access_token: access_token.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            default_retry_after: DEFAULT_RETRY_AFTER,
        })
    }

    /// Sets how many times a throttled request is retried
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the wait used when a throttled response has no `Retry-After`
    #[must_use]
    pub fn with_default_retry_after(mut self, retry_after: Duration) -> Self {
        self.default_retry_after = retry_after;
        self
    }

    /// Returns the REST API root, `<instance>/api/v1/`
    pub fn api_root(&self) -> &Url {
        &self.api_root
    }

    /// Turns an endpoint into a request URL
    ///
    /// Absolute URLs (as returned inside Canvas records) are used as is;
    /// relative references are resolved against the API root.
    pub fn resolve(&self, endpoint: &Endpoint) -> Result<Url, CanvasError> {
        let parsed = if endpoint.is_absolute() {
            Url::parse(endpoint.as_str())
        } else {
            self.api_root
                .join(endpoint.as_str().trim_start_matches('/'))
        };
        parsed.map_err(|e| CanvasError::InvalidUrl(format!("{endpoint}: {e}")))
    }

    /// URL of one page of a collection
    pub fn page_url(&self, endpoint: &Endpoint, query: &PageQuery) -> Result<Url, CanvasError> {
        let mut url = self.resolve(endpoint)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("per_page", &query.per_page.to_string());
            pairs.append_pair("page", &query.page.to_string());
            if let Some(SortOrder::UpdatedAtDesc) = query.sort {
                pairs.append_pair("sort", "updated_at");
                pairs.append_pair("order", "desc");
            }
        }
        Ok(url)
    }

    /// GETs `url` and parses the JSON body
    pub async fn get_json(&self, url: Url) -> Result<Value, CanvasError> {
        let response = self.execute_with_retry(url).await?;
        let value = response.json::<Value>().await?;
        Ok(value)
    }

    /// GETs `url` and returns the raw body
    pub async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, CanvasError> {
        let response = self.execute_with_retry(url).await?;
        let bytes = response.bytes().await?;
        debug!(bytes = bytes.len(), "Downloaded content");
        Ok(bytes.to_vec())
    }

    // ========================================================================
    // 429 response handling
    // ========================================================================

    /// Sends an authenticated GET, backing off while the server throttles
    ///
    /// On HTTP 429 the `Retry-After` header is honoured and the request is
    /// retried up to the configured limit. Other statuses are classified
    /// into [`CanvasError`] variants.
    pub async fn execute_with_retry(&self, url: Url) -> Result<Response, CanvasError> {
        let mut retry_after = self.default_retry_after;

        for attempt in 0..=self.max_retries {
            debug!(url = %url, attempt, "GET");
            let response = self
                .client
                .get(url.clone())
                .bearer_auth(&self.access_token)
                .send()
                .await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                if attempt > 0 {
                    info!(url = %url, attempt, "Request succeeded after retry");
                }
                return check_status(response);
            }

            retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(|v| parse_retry_after(v, self.default_retry_after))
                .unwrap_or(self.default_retry_after);

            if attempt >= self.max_retries {
                break;
            }

            info!(
                url = %url,
                attempt,
                retry_after_ms = retry_after.as_millis(),
                "Received 429, backing off"
            );
            tokio::time::sleep(retry_after).await;
        }

        warn!(url = %url, attempts = self.max_retries + 1, "429 retry limit exhausted");
        Err(CanvasError::TooManyRequests { retry_after })
    }
}

/// Maps non-success statuses to errors
fn check_status(response: Response) -> Result<Response, CanvasError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    match status {
        StatusCode::UNAUTHORIZED => Err(CanvasError::Unauthorized(url)),
        StatusCode::NOT_FOUND => Err(CanvasError::NotFound(url)),
        _ => Err(CanvasError::Status {
            status: status.as_u16(),
            url,
        }),
    }
}

/// Parses a `Retry-After` header value
///
/// Accepts delta-seconds or an HTTP-date; anything else, or a date more
/// than an hour away, yields `default`.
pub fn parse_retry_after(value: &str, default: Duration) -> Duration {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Duration::from_secs(seconds);
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(value.trim()) {
        let now = chrono::Utc::now();
        let target = date.with_timezone(&chrono::Utc);
        if target > now {
            if let Some(secs) = (target - now)
                .num_seconds()
                .try_into()
                .ok()
                .filter(|&s: &u64| s <= MAX_RETRY_AFTER_SECS)
            {
                return Duration::from_secs(secs);
            }
        }
    }

    warn!(value, "Could not parse Retry-After header, using default");
    default
}
