//! Configuration module for the cloud file manager.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::{CapabilityOverrides, EnvelopeMetadata};

/// Version written into the `cfmVersion` envelope field.
pub const CFM_VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub providers: ProvidersConfig,
    pub logging: LoggingConfig,
}

/// Settings describing the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name written into document envelopes.
    pub name: String,
    /// Application version written into document envelopes.
    pub version: Option<String>,
    /// Application build number written into document envelopes.
    pub build_num: Option<String>,
    /// Extension appended to saved filenames when the provider stores files.
    pub default_extension: String,
    /// Extensions offered in open dialogs. Empty accepts everything.
    pub readable_extensions: Vec<String>,
    /// Whether saved documents are wrapped in an envelope.
    pub wrap_file_content: bool,
}

/// Per-provider settings. A provider is registered only when `enabled`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub local_storage: LocalStorageConfig,
    pub local_file: LocalFileConfig,
    pub google_drive: GoogleDriveConfig,
    pub url: UrlConfig,
}

/// Local Storage provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStorageConfig {
    pub enabled: bool,
    pub display_name: String,
    pub url_display_name: Option<String>,
    /// SQLite database holding the key/value store.
    pub db_path: PathBuf,
    /// Total bytes the store may hold (keys plus values).
    pub quota_bytes: u64,
    pub capabilities: CapabilityOverrides,
}

/// Local File provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalFileConfig {
    pub enabled: bool,
    pub display_name: String,
    /// Directory that receives "downloaded" files when no browser is involved.
    pub download_dir: PathBuf,
    pub capabilities: CapabilityOverrides,
}

/// Google Drive provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleDriveConfig {
    pub enabled: bool,
    pub display_name: String,
    pub url_display_name: Option<String>,
    /// OAuth client id. Required when the provider is enabled.
    pub client_id: Option<String>,
    /// OAuth scopes requested during authorization.
    pub scopes: Vec<String>,
    /// MIME type given to newly created files.
    pub mime_type: String,
    pub capabilities: CapabilityOverrides,
}

/// URL import provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlConfig {
    pub enabled: bool,
    pub display_name: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/cloudfm/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cloudfm")
            .join("config.yaml")
    }

    /// Envelope metadata stamped on documents this application writes.
    pub fn envelope(&self) -> EnvelopeMetadata {
        EnvelopeMetadata {
            cfm_version: CFM_VERSION.to_string(),
            app_name: Some(self.app.name.clone()),
            app_version: self.app.version.clone(),
            app_build_num: self.app.build_num.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("cloudfm")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "cloudfm".to_string(),
            version: None,
            build_num: None,
            default_extension: "txt".to_string(),
            readable_extensions: vec!["txt".to_string(), "json".to_string()],
            wrap_file_content: true,
        }
    }
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            display_name: "Local Storage".to_string(),
            url_display_name: None,
            db_path: data_dir().join("local_storage.db"),
            quota_bytes: 5 * 1024 * 1024,
            capabilities: CapabilityOverrides::new(),
        }
    }
}

impl Default for LocalFileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            display_name: "Local File".to_string(),
            download_dir: dirs::download_dir()
                .unwrap_or_else(|| PathBuf::from("~/Downloads")),
            capabilities: CapabilityOverrides::new(),
        }
    }
}

impl Default for GoogleDriveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            display_name: "Google Drive".to_string(),
            url_display_name: None,
            client_id: None,
            scopes: vec![
                "https://www.googleapis.com/auth/drive".to_string(),
                "https://www.googleapis.com/auth/userinfo.profile".to_string(),
            ],
            mime_type: "text/plain".to_string(),
            capabilities: CapabilityOverrides::new(),
        }
    }
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            display_name: "URL".to_string(),
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
    /// Dotted path to the offending field, e.g. `"providers.google_drive.client_id"`.
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

fn require_non_empty(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError {
            field: field.into(),
            message: "must not be empty".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- app ---
        require_non_empty(&mut errors, "app.name", &self.app.name);
        if self.app.default_extension.contains('/') {
            errors.push(ValidationError {
                field: "app.default_extension".into(),
                message: "must not contain '/'".into(),
            });
        }

        // --- providers.local_storage ---
        let local_storage = &self.providers.local_storage;
        if local_storage.enabled {
            require_non_empty(
                &mut errors,
                "providers.local_storage.display_name",
                &local_storage.display_name,
            );
            if local_storage.quota_bytes == 0 {
                errors.push(ValidationError {
                    field: "providers.local_storage.quota_bytes".into(),
                    message: "must be greater than 0".into(),
                });
            }
        }

        // --- providers.local_file ---
        if self.providers.local_file.enabled {
            require_non_empty(
                &mut errors,
                "providers.local_file.display_name",
                &self.providers.local_file.display_name,
            );
        }

        // --- providers.google_drive ---
        let drive = &self.providers.google_drive;
        if drive.enabled {
            require_non_empty(
                &mut errors,
                "providers.google_drive.display_name",
                &drive.display_name,
            );
            if drive.client_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
                errors.push(ValidationError {
                    field: "providers.google_drive.client_id".into(),
                    message: "is required when Google Drive is enabled".into(),
                });
            }
            if drive.scopes.is_empty() {
                errors.push(ValidationError {
                    field: "providers.google_drive.scopes".into(),
                    message: "must list at least one scope".into(),
                });
            }
            if !drive.mime_type.contains('/') {
                errors.push(ValidationError {
                    field: "providers.google_drive.mime_type".into(),
                    message: format!("invalid MIME type '{}'", drive.mime_type),
                });
            }
        }

        // --- providers.url ---
        if self.providers.url.enabled {
            require_non_empty(
                &mut errors,
                "providers.url.display_name",
                &self.providers.url.display_name,
            );
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
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
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use cloudfm_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .app_name("Sketchpad")
///     .google_drive_client_id("1234.apps.googleusercontent.com")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- app ---

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app.name = name.into();
        self
    }

    pub fn app_version(mut self, version: impl Into<String>) -> Self {
        self.config.app.version = Some(version.into());
        self
    }

    pub fn app_build_num(mut self, build_num: impl Into<String>) -> Self {
        self.config.app.build_num = Some(build_num.into());
        self
    }

    pub fn default_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.app.default_extension = extension.into();
        self
    }

    pub fn readable_extensions(mut self, extensions: Vec<String>) -> Self {
        self.config.app.readable_extensions = extensions;
        self
    }

    pub fn wrap_file_content(mut self, wrap: bool) -> Self {
        self.config.app.wrap_file_content = wrap;
        self
    }

    // --- providers ---

    pub fn local_storage_db_path(mut self, path: PathBuf) -> Self {
        self.config.providers.local_storage.db_path = path;
        self
    }

    pub fn local_storage_quota_bytes(mut self, bytes: u64) -> Self {
        self.config.providers.local_storage.quota_bytes = bytes;
        self
    }

    pub fn local_file_download_dir(mut self, dir: PathBuf) -> Self {
        self.config.providers.local_file.download_dir = dir;
        self
    }

    /// Sets the client id and enables Google Drive.
    pub fn google_drive_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.config.providers.google_drive.client_id = Some(client_id.into());
        self.config.providers.google_drive.enabled = true;
        self
    }

    pub fn google_drive_scopes(mut self, scopes: Vec<String>) -> Self {
        self.config.providers.google_drive.scopes = scopes;
        self
    }

    pub fn google_drive_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.config.providers.google_drive.mime_type = mime_type.into();
        self
    }

    pub fn url_enabled(mut self, enabled: bool) -> Self {
        self.config.providers.url.enabled = enabled;
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
