//! Local mirror of downloaded course content
//!
//! Files land under `<root>/<course path>`; parent directories are created
//! on demand. Writes go to a temporary sibling first and are renamed into
//! place, so a crash never leaves a partially written file behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use coursesync_core::domain::{Course, CoursePath};
use coursesync_core::ports::IContentDownloader;

use crate::fanout::fan_out;
use crate::report::{BranchLog, BranchScope, FailedBranch};

/// Writes downloaded file content below a local root
pub struct LocalMirror {
    root: PathBuf,
    downloader: Arc<dyn IContentDownloader>,
    width: usize,
}

impl LocalMirror {
    pub fn new(root: impl Into<PathBuf>, downloader: Arc<dyn IContentDownloader>) -> Self {
        Self {
            root: root.into(),
            downloader,
            width: 4,
        }
    }

    /// Number of downloads run at once
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local location of a course path
    pub fn local_path(&self, path: &CoursePath) -> PathBuf {
        path.to_local(&self.root)
    }

    /// Atomically writes `data` at `path`, returning the local file written
    ///
    /// The data is staged next to the target and renamed over it. The staged
    /// file is removed again if either step fails.
    ///
    /// # Errors
    /// Returns the I/O error of creating the parent folders, writing the
    /// staged file or renaming it into place.
    #[instrument(skip(self, data), fields(path = %path, bytes = data.len()))]
    pub async fn write(&self, path: &CoursePath, data: &[u8]) -> std::io::Result<PathBuf> {
        let target = self.local_path(path);

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };

        debug!(?tmp_path, "Writing to temporary file");
        let staged = match tokio::fs::write(&tmp_path, data).await {
            Ok(()) => tokio::fs::rename(&tmp_path, &target).await,
            Err(err) => Err(err),
        };

        if let Err(err) = staged {
            match tokio::fs::remove_file(&tmp_path).await {
                Ok(()) => debug!(?tmp_path, "Removed temporary file"),
                Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                Err(cleanup) => {
                    warn!(?tmp_path, error = %cleanup, "Failed to remove temporary file")
                }
            }
            return Err(err);
        }

        Ok(target)
    }

    /// Downloads every file of `course` whose local copy is missing or
    /// outdated, stamping each one written
    ///
    /// Returns the number of files written and one failed branch per file
    /// that could not be fetched or written.
    #[instrument(skip(self, course), fields(course_id = %course.id))]
    pub async fn download_pending(&self, course: &mut Course) -> (usize, BranchLog) {
        let pending: Vec<(CoursePath, String)> = course
            .pending_downloads()
            .map(|f| (f.path.clone(), f.url.clone()))
            .collect();

        let results = fan_out(self.width, pending, |(path, url)| async move {
            match self.transfer(&path, &url).await {
                Ok(()) => Ok(path),
                Err(err) => {
                    warn!(path = %path, error = %format!("{err:#}"), "Download failed, skipping");
                    Err(FailedBranch {
                        scope: BranchScope::Download { path },
                        error: format!("{err:#}"),
                    })
                }
            }
        })
        .await;

        let mut log = BranchLog::default();
        let mut written = 0;
        for result in results {
            match result {
                Ok(path) => {
                    if let Err(err) = course.mark_downloaded(&path, Utc::now()) {
                        warn!(path = %path, error = %err, "Downloaded file no longer in course");
                    }
                    written += 1;
                }
                Err(failed) => log.fail(failed),
            }
        }

        info!(written, failed = log.failed_branches.len(), "Downloads complete");
        (written, log)
    }

    async fn transfer(&self, path: &CoursePath, url: &str) -> anyhow::Result<()> {
        if url.trim().is_empty() {
            anyhow::bail!("File has no download URL");
        }
        let data = self.downloader.download(url).await?;
        self.write(path, &data).await?;
        Ok(())
    }
}
