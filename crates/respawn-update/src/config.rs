//! Frozen per-updater configuration
//!
//! `UpdateConfig` is built once (from explicit values or from a loaded
//! [`RuntimeConfig`]), validated, and then owned by a single `Updater`.

use respawn_core::types::{parse_upstream_url, MAX_DURATION_SECS};
use respawn_core::{Backpressure, Error as ConfigError, PromotionMode, RuntimeConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Result, UpdateError};

/// Validated configuration for one updater instance
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    upstream: Url,
    interval: Duration,
    executable: PathBuf,
    http_timeout: Duration,
    user_agent: String,
    channel_capacity: usize,
    backpressure: Backpressure,
    metadata_entry: String,
    binary_entry: String,
    promotion: PromotionMode,
    ready_timeout: Option<Duration>,
    bundle_dir: PathBuf,
}

impl UpdateConfig {
    /// Create a configuration with default settings for everything except
    /// the upstream location, poll interval and executable path
    pub fn new(upstream: &str, interval: Duration, executable: impl Into<PathBuf>) -> Result<Self> {
        let mut runtime = RuntimeConfig::default();
        runtime.upstream.url = Some(upstream.to_string());
        Self::from_runtime(&runtime, executable)?.with_interval(interval)
    }

    /// Freeze a loaded runtime configuration for the given executable
    pub fn from_runtime(runtime: &RuntimeConfig, executable: impl Into<PathBuf>) -> Result<Self> {
        let upstream = runtime.upstream.parse_url()?;

        let config = Self {
            upstream,
            interval: runtime.polling.interval(),
            executable: executable.into(),
            http_timeout: runtime.upstream.timeout(),
            user_agent: runtime.upstream.user_agent.clone(),
            channel_capacity: runtime.polling.channel_capacity,
            backpressure: runtime.polling.backpressure,
            metadata_entry: runtime.archive.metadata_entry.clone(),
            binary_entry: runtime.archive.binary_entry.clone(),
            promotion: runtime.restart.promotion,
            ready_timeout: runtime.restart.ready_timeout(),
            bundle_dir: std::env::temp_dir(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Set the upstream location
    pub fn with_upstream(mut self, upstream: &str) -> Result<Self> {
        self.upstream = parse_upstream_url(upstream)?;
        Ok(self)
    }

    /// Set the poll interval
    pub fn with_interval(mut self, interval: Duration) -> Result<Self> {
        self.interval = interval;
        self.validate()?;
        Ok(self)
    }

    /// Set the capacity of the poll event channel
    pub fn with_channel_capacity(mut self, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(invalid("channel capacity must be at least 1"));
        }
        self.channel_capacity = capacity;
        Ok(self)
    }

    /// Set the backpressure policy of the poll event channel
    pub fn with_backpressure(mut self, backpressure: Backpressure) -> Self {
        self.backpressure = backpressure;
        self
    }

    /// Set when staged binaries are promoted
    pub fn with_promotion(mut self, promotion: PromotionMode) -> Self {
        self.promotion = promotion;
        self
    }

    /// Set the HTTP request timeout
    pub fn with_http_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.http_timeout = timeout;
        self.validate()?;
        Ok(self)
    }

    /// Set the readiness handshake timeout (`None` disables the handshake)
    pub fn with_ready_timeout(mut self, timeout: Option<Duration>) -> Result<Self> {
        self.ready_timeout = timeout.filter(|t| !t.is_zero());
        self.validate()?;
        Ok(self)
    }

    /// Set the directory downloaded bundles are written to
    pub fn with_bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundle_dir = dir.into();
        self
    }

    /// Set the archive entry names for metadata and binary
    pub fn with_entries(
        mut self,
        metadata_entry: impl Into<String>,
        binary_entry: impl Into<String>,
    ) -> Result<Self> {
        self.metadata_entry = metadata_entry.into();
        self.binary_entry = binary_entry.into();
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        check_duration("poll interval", self.interval)?;
        check_duration("HTTP timeout", self.http_timeout)?;
        if let Some(timeout) = self.ready_timeout {
            check_duration("readiness timeout", timeout)?;
        }
        if self.channel_capacity == 0 {
            return Err(invalid("channel capacity must be at least 1"));
        }
        if self.metadata_entry.is_empty() || self.binary_entry.is_empty() {
            return Err(invalid("archive entry names must not be empty"));
        }
        if self.metadata_entry == self.binary_entry {
            return Err(invalid(format!(
                "metadata and binary entries must differ (both '{}')",
                self.metadata_entry
            )));
        }
        if self.executable.file_name().is_none() {
            return Err(invalid(format!(
                "executable path {} has no file name",
                self.executable.display()
            )));
        }
        Ok(())
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    pub fn backpressure(&self) -> Backpressure {
        self.backpressure
    }

    pub fn metadata_entry(&self) -> &str {
        &self.metadata_entry
    }

    pub fn binary_entry(&self) -> &str {
        &self.binary_entry
    }

    pub fn promotion(&self) -> PromotionMode {
        self.promotion
    }

    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout
    }

    pub fn bundle_dir(&self) -> &Path {
        &self.bundle_dir
    }
}

/// Waits must be non-zero and no longer than [`MAX_DURATION_SECS`], so
/// deadlines computed from them cannot overflow
fn check_duration(what: &str, value: Duration) -> Result<()> {
    if value.is_zero() {
        return Err(invalid(format!("{} must be greater than zero", what)));
    }
    if value > Duration::from_secs(MAX_DURATION_SECS) {
        return Err(invalid(format!(
            "{} of {:?} exceeds the {}s limit",
            what, value, MAX_DURATION_SECS
        )));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> UpdateError {
    UpdateError::Config(ConfigError::invalid_config(message))
}
