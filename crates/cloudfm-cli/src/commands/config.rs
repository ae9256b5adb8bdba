//! Config command - View and manage cloudfm configuration
//!
//! Provides the `cloudfm config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::info;

use cloudfm_core::config::Config;
use cloudfm_core::domain::Capability;

use crate::context::load_config;
use crate::output::{OutputFormat, OutputFormatter};

const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("app.name", "Application name shown in titles"),
    ("app.version", "Version written into saved envelopes"),
    ("app.build_num", "Build number written into saved envelopes"),
    ("app.default_extension", "Extension added to downloaded files"),
    ("app.readable_extensions", "Comma separated, empty for all"),
    ("app.wrap_file_content", "true|false"),
    ("providers.<p>.enabled", "true|false"),
    ("providers.<p>.display_name", "Tab label"),
    ("providers.<p>.capabilities.<cap>", "true|false|default"),
    ("providers.local_storage.db_path", "SQLite database path"),
    ("providers.local_storage.quota_bytes", "Storage quota"),
    ("providers.local_file.download_dir", "Where saved files land"),
    ("providers.google_drive.client_id", "OAuth client id (none to clear)"),
    ("providers.google_drive.scopes", "Comma separated OAuth scopes"),
    ("providers.google_drive.mime_type", "MIME type of uploaded files"),
    ("logging.level", "trace|debug|info|warn|error"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "providers.google_drive.client_id")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(
        &self,
        config_path: &Path,
        format: OutputFormat,
        fmt: &dyn OutputFormatter,
    ) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format, fmt),
            ConfigCommand::Set { key, value } => execute_set(config_path, key, value, format, fmt),
            ConfigCommand::Validate => execute_validate(config_path, format, fmt),
            ConfigCommand::Path => {
                if format == OutputFormat::Json {
                    fmt.print_json(&serde_json::json!({
                        "config_path": config_path.display().to_string(),
                        "exists": config_path.exists(),
                    }));
                } else {
                    println!("{}", config_path.display());
                }
                Ok(())
            }
        }
    }
}

fn execute_show(config_path: &Path, format: OutputFormat, fmt: &dyn OutputFormatter) -> Result<()> {
    let config = load_config(config_path)?;
    info!(config_path = %config_path.display(), "Showing configuration");

    if format == OutputFormat::Json {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        fmt.print_json(&json);
    } else {
        fmt.success(&format!("Configuration ({})", config_path.display()));
        fmt.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            fmt.info(line);
        }
    }
    Ok(())
}

fn execute_set(
    config_path: &Path,
    key: &str,
    value: &str,
    format: OutputFormat,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    info!(key = %key, value = %value, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut config, key, value) {
        if format == OutputFormat::Json {
            fmt.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "error": e.to_string(),
            }));
        } else {
            fmt.error(&format!("Failed to set '{key}': {e}"));
            fmt.info("");
            fmt.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                fmt.info(&format!("  {name:<40} - {help}"));
            }
        }
        return Ok(());
    }

    let errors: Vec<String> = config.validate().iter().map(|e| e.to_string()).collect();
    if !errors.is_empty() {
        if format == OutputFormat::Json {
            fmt.print_json(&serde_json::json!({
                "success": false,
                "key": key,
                "value": value,
                "errors": errors,
            }));
        } else {
            fmt.error(&format!("Invalid value for '{key}': {}", errors.join("; ")));
        }
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
    std::fs::write(config_path, yaml).context("Failed to write configuration file")?;

    if format == OutputFormat::Json {
        fmt.print_json(&serde_json::json!({
            "success": true,
            "key": key,
            "value": value,
            "config_path": config_path.display().to_string(),
        }));
    } else {
        fmt.success(&format!("Set {key} = {value}"));
        fmt.info(&format!("Saved to {}", config_path.display()));
    }
    Ok(())
}

fn execute_validate(
    config_path: &Path,
    format: OutputFormat,
    fmt: &dyn OutputFormatter,
) -> Result<()> {
    if !config_path.exists() {
        if format == OutputFormat::Json {
            fmt.print_json(&serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "errors": [],
                "defaults": true,
            }));
        } else {
            fmt.info(&format!("Configuration file not found at {}", config_path.display()));
            fmt.info("Using default configuration. Run 'cloudfm config set <key> <value>' to create one.");
        }
        return Ok(());
    }

    let config = match Config::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            if format == OutputFormat::Json {
                fmt.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [format!("Failed to parse configuration: {e:#}")],
                }));
            } else {
                fmt.error(&format!("Failed to parse configuration: {e:#}"));
                fmt.info(&format!("File: {}", config_path.display()));
            }
            return Ok(());
        }
    };

    info!(config_path = %config_path.display(), "Validating configuration");
    let errors = config.validate();

    if format == OutputFormat::Json {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        fmt.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        fmt.success("Configuration is valid");
        fmt.info(&format!("File: {}", config_path.display()));
    } else {
        fmt.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        fmt.info(&format!("File: {}", config_path.display()));
        fmt.info("");
        for error in &errors {
            fmt.info(&format!("  {} - {}", error.field, error.message));
        }
    }
    Ok(())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .with_context(|| format!("Expected true or false for {key}"))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Applies `providers.<p>.capabilities.<cap>`; `default` drops the override
fn apply_capability(
    overrides: &mut cloudfm_core::domain::CapabilityOverrides,
    key: &str,
    capability: &str,
    value: &str,
) -> Result<()> {
    let Some(capability) = Capability::ALL.iter().copied().find(|c| c.name() == capability) else {
        bail!("Unknown capability '{capability}'");
    };
    if value == "default" {
        overrides.remove(&capability);
    } else {
        overrides.insert(capability, parse_bool(key, value)?);
    }
    Ok(())
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let providers = &mut config.providers;
    match key.split('.').collect::<Vec<_>>().as_slice() {
        // --- app ---
        ["app", "name"] => config.app.name = value.to_string(),
        ["app", "version"] => config.app.version = optional(value),
        ["app", "build_num"] => config.app.build_num = optional(value),
        ["app", "default_extension"] => config.app.default_extension = value.to_string(),
        ["app", "readable_extensions"] => config.app.readable_extensions = parse_list(value),
        ["app", "wrap_file_content"] => config.app.wrap_file_content = parse_bool(key, value)?,

        // --- providers ---
        ["providers", "local_storage", "enabled"] => {
            providers.local_storage.enabled = parse_bool(key, value)?
        }
        ["providers", "local_storage", "display_name"] => {
            providers.local_storage.display_name = value.to_string()
        }
        ["providers", "local_storage", "db_path"] => {
            providers.local_storage.db_path = PathBuf::from(value)
        }
        ["providers", "local_storage", "quota_bytes"] => {
            providers.local_storage.quota_bytes = value
                .parse::<u64>()
                .context("Expected a positive integer")?
        }
        ["providers", "local_file", "enabled"] => {
            providers.local_file.enabled = parse_bool(key, value)?
        }
        ["providers", "local_file", "display_name"] => {
            providers.local_file.display_name = value.to_string()
        }
        ["providers", "local_file", "download_dir"] => {
            providers.local_file.download_dir = PathBuf::from(value)
        }
        ["providers", "google_drive", "enabled"] => {
            providers.google_drive.enabled = parse_bool(key, value)?
        }
        ["providers", "google_drive", "display_name"] => {
            providers.google_drive.display_name = value.to_string()
        }
        ["providers", "google_drive", "client_id"] => {
            providers.google_drive.client_id = optional(value)
        }
        ["providers", "google_drive", "scopes"] => {
            providers.google_drive.scopes = parse_list(value)
        }
        ["providers", "google_drive", "mime_type"] => {
            providers.google_drive.mime_type = value.to_string()
        }
        ["providers", "url", "enabled"] => providers.url.enabled = parse_bool(key, value)?,
        ["providers", "url", "display_name"] => providers.url.display_name = value.to_string(),

        ["providers", provider, "capabilities", capability] => {
            let overrides = match *provider {
                "local_storage" => &mut providers.local_storage.capabilities,
                "local_file" => &mut providers.local_file.capabilities,
                "google_drive" => &mut providers.google_drive.capabilities,
                _ => bail!("Provider '{provider}' has no capability overrides"),
            };
            apply_capability(overrides, key, capability, value)?;
        }

        // --- logging ---
        ["logging", "level"] => config.logging.level = value.to_string(),

        _ => bail!("Unknown configuration key: '{key}'"),
    }
    Ok(())
}
