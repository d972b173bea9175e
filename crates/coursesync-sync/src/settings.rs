//! Engine tuning derived from the `sync` configuration section

use coursesync_core::config::SyncConfig;

/// Paging and fan-out settings shared by the crawler, builder and differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Ceiling on concurrent requests against the remote API
    pub max_concurrent_requests: usize,
    pub folder_page_size: u32,
    pub file_page_size: u32,
    pub module_page_size: u32,
    /// Follow further pages until a short page is returned
    pub exhaustive_paging: bool,
    /// Label the remote prepends to every folder's full path
    pub remote_root_label: String,
}

impl SyncSettings {
    /// Fan-out width, never zero
    pub fn width(&self) -> usize {
        self.max_concurrent_requests.max(1)
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_concurrent_requests: config.max_concurrent_requests as usize,
            folder_page_size: config.folder_page_size,
            file_page_size: config.file_page_size,
            module_page_size: config.module_page_size,
            exhaustive_paging: config.exhaustive_paging,
            remote_root_label: config.remote_root_label.clone(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}
