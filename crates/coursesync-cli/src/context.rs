//! Shared wiring for commands
//!
//! Loads the configuration once and builds the adapters a command needs:
//! the SQLite state store, the Canvas provider and the sync engine.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;

use coursesync_cache::{DatabasePool, SqliteStateStore};
use coursesync_canvas::{CanvasClient, CanvasProvider};
use coursesync_core::config::{Config, TOKEN_ENV_VAR};
use coursesync_sync::{LocalMirror, SyncEngine, SyncSettings};

pub struct AppContext {
    config: Config,
}

impl AppContext {
    /// Loads `path`, or the default configuration file when none is given
    ///
    /// A missing default file yields the default configuration; an explicit
    /// path must exist and parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Config::load_or_default(&Config::default_path()),
        };
        Ok(Self { config })
    }

    #[cfg(test)]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens (creating if needed) the state database
    pub async fn open_store(&self) -> Result<Arc<SqliteStateStore>> {
        let db_path = &self.config.storage.database_path;
        let pool = DatabasePool::new(db_path)
            .await
            .context("Failed to open database")?;
        Ok(Arc::new(SqliteStateStore::new(pool.pool().clone())))
    }

    /// Builds the Canvas provider from the validated configuration
    pub fn provider(&self) -> Result<Arc<CanvasProvider>> {
        let errors = self.config.validate();
        if !errors.is_empty() {
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Invalid configuration: {}", details.join("; "));
        }

        let Some(token) = self.config.access_token() else {
            bail!(
                "No access token configured. Set canvas.access_token or {}",
                TOKEN_ENV_VAR
            );
        };

        let client = CanvasClient::new(&self.config.canvas.base_url, token)
            .context("Failed to create Canvas client")?;
        info!(api_root = %client.api_root(), "Canvas client ready");
        Ok(Arc::new(CanvasProvider::new(client)))
    }

    /// Wires the sync engine, with a local mirror when `download` is set
    pub async fn engine(&self, download: bool) -> Result<SyncEngine> {
        let provider = self.provider()?;
        let store = self.open_store().await?;
        let settings = SyncSettings::from(&self.config.sync);

        let mut engine = SyncEngine::new(provider.clone(), store, settings.clone());
        if download {
            let mirror = LocalMirror::new(&self.config.sync.root_folder, provider)
                .with_width(settings.width());
            engine = engine.with_mirror(mirror);
        }
        Ok(engine)
    }
}
