//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. Config file (~/.respawn/respawn.yaml, or $RESPAWN_CONFIG_DIR/respawn.yaml)
//! 3. Environment variables (RESPAWN_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::{parse_upstream_url, RuntimeConfig, UpstreamConfig};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

/// Name of the user configuration file inside the config directory
const CONFIG_FILE: &str = "respawn.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a new hierarchical config loader
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    /// Get the standard config directory ($RESPAWN_CONFIG_DIR or ~/.respawn)
    fn get_config_dir() -> Result<Utf8PathBuf> {
        if let Ok(dir) = env::var("RESPAWN_CONFIG_DIR") {
            return Ok(Utf8PathBuf::from(dir));
        }

        let home = dirs::home_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|p| Error::invalid_config(format!("Non UTF-8 home directory: {:?}", p)))?;

        Ok(home.join(".respawn"))
    }

    /// Load runtime configuration with hierarchical precedence
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        // Start with embedded defaults
        let mut config = Self::load_embedded_config::<RuntimeConfig>("runtime-defaults.yaml")?;

        let config_path = self.config_dir.join(CONFIG_FILE);
        if config_path.exists() {
            debug!("Loading configuration from {}", config_path);
            let file_config = self.load_yaml_file::<RuntimeConfig>(&config_path)?;
            config = Self::merge_runtime_config(config, file_config);
        }

        config = self.apply_env_overrides(config)?;
        config.validate()?;

        Ok(config)
    }

    /// Load an embedded configuration file
    fn load_embedded_config<T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        let config: T = serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })?;

        Ok(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let config: T = serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))?;
        Ok(config)
    }

    /// Merge two runtime configs (base is overridden by overlay)
    fn merge_runtime_config(base: RuntimeConfig, overlay: RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            upstream: UpstreamConfig {
                url: overlay.upstream.url.or(base.upstream.url),
                ..overlay.upstream
            },
            polling: overlay.polling,
            archive: overlay.archive,
            restart: overlay.restart,
        }
    }

    /// Apply environment variable overrides to runtime config
    fn apply_env_overrides(&self, mut config: RuntimeConfig) -> Result<RuntimeConfig> {
        if let Ok(val) = env::var("RESPAWN_UPSTREAM_URL") {
            parse_upstream_url(&val)?;
            config.upstream.url = Some(val);
        }

        if let Ok(val) = env::var("RESPAWN_HTTP_TIMEOUT_SECS") {
            config.upstream.timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("RESPAWN_HTTP_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("RESPAWN_POLL_INTERVAL_SECS") {
            config.polling.interval_secs = val.parse().map_err(|_| {
                Error::invalid_config("RESPAWN_POLL_INTERVAL_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("RESPAWN_CHANNEL_CAPACITY") {
            config.polling.channel_capacity = val.parse().map_err(|_| {
                Error::invalid_config("RESPAWN_CHANNEL_CAPACITY must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("RESPAWN_BACKPRESSURE") {
            config.polling.backpressure = val.parse()?;
        }

        if let Ok(val) = env::var("RESPAWN_PROMOTION") {
            config.restart.promotion = val.parse()?;
        }

        if let Ok(val) = env::var("RESPAWN_READY_TIMEOUT_SECS") {
            config.restart.ready_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("RESPAWN_READY_TIMEOUT_SECS must be a valid number")
            })?;
        }

        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
