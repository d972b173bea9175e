//! CanvasProvider - fetcher and downloader ports for a Canvas instance
//!
//! Listing endpoints answer with a JSON array per page; record endpoints
//! answer with a single JSON object. Anything else is reported as a
//! malformed response rather than passed on.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};
use url::Url;

use coursesync_core::domain::Endpoint;
use coursesync_core::ports::{FetchError, IContentDownloader, IPagedFetcher, PageQuery};

use crate::client::CanvasClient;
use crate::CanvasError;

/// Port adapter over a [`CanvasClient`]
pub struct CanvasProvider {
    client: CanvasClient,
}

impl CanvasProvider {
    pub fn new(client: CanvasClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &CanvasClient {
        &self.client
    }
}

#[async_trait]
impl IPagedFetcher for CanvasProvider {
    #[instrument(skip(self), fields(endpoint = %endpoint, page = query.page))]
    async fn fetch_page(
        &self,
        endpoint: &Endpoint,
        query: &PageQuery,
    ) -> Result<Vec<Value>, FetchError> {
        let url = self.client.page_url(endpoint, query)?;
        match self.client.get_json(url).await? {
            Value::Array(records) => {
                debug!(records = records.len(), "Page fetched");
                Ok(records)
            }
            other => Err(CanvasError::UnexpectedResponse(format!(
                "expected a JSON array from {endpoint}, got {}",
                kind_of(&other)
            ))
            .into()),
        }
    }

    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn fetch_one(&self, endpoint: &Endpoint) -> Result<Value, FetchError> {
        let url = self.client.resolve(endpoint)?;
        match self.client.get_json(url).await? {
            record @ Value::Object(_) => Ok(record),
            other => Err(CanvasError::UnexpectedResponse(format!(
                "expected a JSON object from {endpoint}, got {}",
                kind_of(&other)
            ))
            .into()),
        }
    }
}

#[async_trait]
impl IContentDownloader for CanvasProvider {
    #[instrument(skip(self))]
    async fn download(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        let url = Url::parse(url).map_err(|e| CanvasError::InvalidUrl(format!("{url}: {e}")))?;
        Ok(self.client.get_bytes(url).await?)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
