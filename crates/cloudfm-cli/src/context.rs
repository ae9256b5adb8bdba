//! Application wiring
//!
//! Loads the configuration and registers one provider per enabled section,
//! in the order dialogs show their tabs: Local Storage, Local File, Google
//! Drive, URL.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};

use cloudfm_core::config::Config;
use cloudfm_core::ports::ICloudProvider;
use cloudfm_core::usecases::{CloudFileManager, FileManagerOptions, ProviderRegistry};
use cloudfm_gdrive::{discovery, GoogleDriveProvider};
use cloudfm_local::{LocalFileProvider, LocalStorageProvider, SqliteKeyValueStore, UrlProvider};

use crate::host::TerminalHost;

pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub host: Arc<TerminalHost>,
    pub registry: Arc<ProviderRegistry>,
    pub local_file: Option<Arc<LocalFileProvider>>,
    pub google_drive: Option<Arc<GoogleDriveProvider>>,
}

/// Reads the config at `path`, or the defaults when no file exists there
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
    } else {
        debug!(path = %path.display(), "No config file, using defaults");
        Ok(Config::default())
    }
}

impl AppContext {
    /// Loads the config file and builds every enabled provider
    pub async fn load(config_path: Option<&Path>, assume_yes: bool) -> Result<Self> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(Config::default_path);
        let config = load_config(&config_path)?;
        let host = Arc::new(TerminalHost::new(
            config.providers.local_file.download_dir.clone(),
            assume_yes,
        ));
        Self::from_config(config, config_path, host).await
    }

    pub async fn from_config(
        config: Config,
        config_path: PathBuf,
        host: Arc<TerminalHost>,
    ) -> Result<Self> {
        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            bail!(
                "Invalid configuration ({}): {}",
                config_path.display(),
                messages.join("; ")
            );
        }

        let providers = &config.providers;
        let mut registry = ProviderRegistry::new();
        let mut local_file = None;
        let mut google_drive = None;

        if providers.local_storage.enabled {
            let db_path = &providers.local_storage.db_path;
            let store = SqliteKeyValueStore::open(db_path, providers.local_storage.quota_bytes)
                .await
                .with_context(|| format!("Failed to open {}", db_path.display()))?;
            let store = Arc::new(store);
            registry.register(Arc::new(LocalStorageProvider::from_config(
                &providers.local_storage,
                store,
            )))?;
        }

        if providers.local_file.enabled {
            let provider = Arc::new(
                LocalFileProvider::from_config(&providers.local_file, host.clone())
                    .with_default_extension(config.app.default_extension.clone()),
            );
            registry.register(provider.clone())?;
            local_file = Some(provider);
        }

        if providers.google_drive.enabled {
            let provider = Arc::new(
                GoogleDriveProvider::from_config(&providers.google_drive, discovery::new_loader())
                    .context("Failed to configure Google Drive")?,
            );
            registry.register(provider.clone())?;
            google_drive = Some(provider);
        }

        if providers.url.enabled {
            registry.register(Arc::new(UrlProvider::from_config(&providers.url, host.clone())))?;
        }

        info!(providers = registry.len(), "Providers registered");
        Ok(Self {
            config,
            config_path,
            host,
            registry: Arc::new(registry),
            local_file,
            google_drive,
        })
    }

    /// A file manager with no current document
    pub fn manager(&self) -> CloudFileManager {
        CloudFileManager::new(
            self.registry.clone(),
            self.host.clone(),
            FileManagerOptions::from_app_config(&self.config.app, self.config.envelope()),
        )
    }

    pub fn provider(&self, name: &str) -> Result<Arc<dyn ICloudProvider>> {
        self.registry.by_str(name).ok_or_else(|| {
            anyhow!("Unknown provider '{name}'. Run 'cloudfm providers' to list them.")
        })
    }

    pub fn google_drive(&self) -> Result<&Arc<GoogleDriveProvider>> {
        self.google_drive.as_ref().ok_or_else(|| {
            anyhow!("Google Drive is not enabled. Set providers.google_drive.enabled in the config.")
        })
    }
}
