//! Configuration module for CourseSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable that overrides `canvas.access_token`.
pub const TOKEN_ENV_VAR: &str = "COURSESYNC_TOKEN";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for CourseSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub canvas: CanvasConfig,
    pub sync: SyncConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Remote instance settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Instance root, e.g. `https://school.instructure.com`.
    pub base_url: String,
    /// Personal access token. [`TOKEN_ENV_VAR`] takes precedence.
    pub access_token: Option<String>,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Root directory of the local mirror.
    pub root_folder: PathBuf,
    /// Ceiling on concurrent requests against the remote API.
    pub max_concurrent_requests: u32,
    /// Page size for sub-folder listings.
    pub folder_page_size: u32,
    /// Page size for file listings.
    pub file_page_size: u32,
    /// Page size for module and module item listings.
    pub module_page_size: u32,
    /// Follow further pages until a short page is returned.
    ///
    /// When `false` only the first page of each listing is read and full
    /// pages are reported as truncated.
    pub exhaustive_paging: bool,
    /// Label the remote prepends to every folder's full path.
    pub remote_root_label: String,
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding the sync state.
    pub database_path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/coursesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("coursesync")
            .join("config.yaml")
    }

    /// Access token from [`TOKEN_ENV_VAR`], falling back to the file value.
    pub fn access_token(&self) -> Option<String> {
        Self::pick_token(
            std::env::var(TOKEN_ENV_VAR).ok(),
            self.canvas.access_token.clone(),
        )
    }

    fn pick_token(env: Option<String>, file: Option<String>) -> Option<String> {
        env.filter(|t| !t.trim().is_empty())
            .or_else(|| file.filter(|t| !t.trim().is_empty()))
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root_folder: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Canvas"),
            max_concurrent_requests: 8,
            folder_page_size: 200,
            file_page_size: 200,
            module_page_size: 100,
            exhaustive_paging: false,
            remote_root_label: "course files".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("coursesync")
                .join("state.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.file_page_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Bounds for `sync.max_concurrent_requests`.
const CONCURRENCY_RANGE: std::ops::RangeInclusive<u32> = 1..=64;

/// Bounds for page sizes.
const PAGE_SIZE_RANGE: std::ops::RangeInclusive<u32> = 1..=1000;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- canvas ---
        if self.canvas.base_url.trim().is_empty() {
            errors.push(ValidationError {
                field: "canvas.base_url".into(),
                message: "must be set".into(),
            });
        } else {
            match url::Url::parse(&self.canvas.base_url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => errors.push(ValidationError {
                    field: "canvas.base_url".into(),
                    message: format!("unsupported scheme '{}'", parsed.scheme()),
                }),
                Err(e) => errors.push(ValidationError {
                    field: "canvas.base_url".into(),
                    message: format!("invalid URL: {e}"),
                }),
            }
        }

        // --- sync ---
        if !CONCURRENCY_RANGE.contains(&self.sync.max_concurrent_requests) {
            errors.push(ValidationError {
                field: "sync.max_concurrent_requests".into(),
                message: format!(
                    "must be between {} and {}",
                    CONCURRENCY_RANGE.start(),
                    CONCURRENCY_RANGE.end()
                ),
            });
        }
        for (field, value) in [
            ("sync.folder_page_size", self.sync.folder_page_size),
            ("sync.file_page_size", self.sync.file_page_size),
            ("sync.module_page_size", self.sync.module_page_size),
        ] {
            if !PAGE_SIZE_RANGE.contains(&value) {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!(
                        "must be between {} and {}",
                        PAGE_SIZE_RANGE.start(),
                        PAGE_SIZE_RANGE.end()
                    ),
                });
            }
        }
        if self.sync.remote_root_label.trim().is_empty() {
            errors.push(ValidationError {
                field: "sync.remote_root_label".into(),
                message: "must not be empty".into(),
            });
        }
        if self.sync.root_folder.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.root_folder".into(),
                message: "must not be empty".into(),
            });
        }

        // --- storage ---
        if self.storage.database_path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "storage.database_path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and lets callers override individual fields.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder pre-populated with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- canvas ---

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.canvas.base_url = url.into();
        self
    }

    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.config.canvas.access_token = Some(token.into());
        self
    }

    // --- sync ---

    pub fn root_folder(mut self, root: PathBuf) -> Self {
        self.config.sync.root_folder = root;
        self
    }

    pub fn max_concurrent_requests(mut self, n: u32) -> Self {
        self.config.sync.max_concurrent_requests = n;
        self
    }

    pub fn folder_page_size(mut self, n: u32) -> Self {
        self.config.sync.folder_page_size = n;
        self
    }

    pub fn file_page_size(mut self, n: u32) -> Self {
        self.config.sync.file_page_size = n;
        self
    }

    pub fn module_page_size(mut self, n: u32) -> Self {
        self.config.sync.module_page_size = n;
        self
    }

    pub fn exhaustive_paging(mut self, enabled: bool) -> Self {
        self.config.sync.exhaustive_paging = enabled;
        self
    }

    pub fn remote_root_label(mut self, label: impl Into<String>) -> Self {
        self.config.sync.remote_root_label = label.into();
        self
    }

    // --- storage ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.storage.database_path = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
