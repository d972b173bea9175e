//! Content downloader port
//!
//! Fetches the bytes behind a file's remote content URL. Uses
//! `anyhow::Result` because transfer failures are only logged and counted,
//! never classified.

/// Port trait for file content transfer
#[async_trait::async_trait]
pub trait IContentDownloader: Send + Sync {
    /// Downloads the full content behind `url`
    async fn download(&self, url: &str) -> anyhow::Result<Vec<u8>>;
}
