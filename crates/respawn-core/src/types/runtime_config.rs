//! Runtime configuration types for the self-update pipeline
//!
//! These types control where updates come from, how often the poller runs,
//! how update bundles are laid out, and how a restart hands over to the new
//! build.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

/// Upper bound for every configured wait (one year)
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    /// Upstream location and HTTP settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Poll scheduling
    #[serde(default)]
    pub polling: PollingConfig,

    /// Entry names inside update bundles
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Promotion and restart behaviour
    #[serde(default)]
    pub restart: RestartConfig,
}

impl RuntimeConfig {
    /// Check the numeric settings, leaving the upstream URL to construction time
    pub fn validate(&self) -> Result<()> {
        check_secs("polling.interval-secs", self.polling.interval_secs, 1)?;
        check_secs("upstream.timeout-secs", self.upstream.timeout_secs, 1)?;
        check_secs("restart.ready-timeout-secs", self.restart.ready_timeout_secs, 0)?;
        if self.polling.channel_capacity == 0 {
            return Err(Error::invalid_config(
                "polling.channel-capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

fn check_secs(field: &str, value: u64, min: u64) -> Result<()> {
    if (min..=MAX_DURATION_SECS).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid_config(format!(
            "{} must be between {} and {} (got {})",
            field, min, MAX_DURATION_SECS, value
        )))
    }
}

/// Upstream location and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct UpstreamConfig {
    /// URL serving the latest update bundle
    #[serde(default)]
    pub url: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl UpstreamConfig {
    /// Parse the configured URL, accepting only http and https
    pub fn parse_url(&self) -> Result<Url> {
        let raw = self
            .url
            .as_deref()
            .ok_or_else(|| Error::missing_field("upstream.url"))?;
        parse_upstream_url(raw)
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Parse an upstream URL, accepting only http and https
pub fn parse_upstream_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::invalid_config(format!("upstream url '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::invalid_config(format!(
            "upstream url '{}': unsupported scheme '{}'",
            raw, other
        ))),
    }
}

fn default_timeout() -> u64 {
    300 // 5 minutes
}
fn default_user_agent() -> String {
    format!(
        "respawn/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Poll scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct PollingConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Number of events the output channel holds before backpressure applies
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// What the poller does when the consumer falls behind
    #[serde(default)]
    pub backpressure: Backpressure,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            channel_capacity: default_channel_capacity(),
            backpressure: Backpressure::default(),
        }
    }
}

impl PollingConfig {
    /// Interval between cycles as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval() -> u64 {
    3600 // 1 hour
}
fn default_channel_capacity() -> usize {
    1
}

/// Behaviour of the poller when the event channel is full
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Backpressure {
    /// Wait for the consumer, delaying the next tick
    #[default]
    Block,
    /// Drop the event and keep the tick cadence
    Skip,
}

impl FromStr for Backpressure {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "skip" => Ok(Self::Skip),
            _ => Err(Error::invalid_config(format!(
                "unknown backpressure policy '{}' (expected block or skip)",
                s
            ))),
        }
    }
}

impl fmt::Display for Backpressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => write!(f, "block"),
            Self::Skip => write!(f, "skip"),
        }
    }
}

/// Entry names inside an update bundle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ArchiveConfig {
    /// Entry holding the JSON release metadata
    #[serde(default = "default_metadata_entry")]
    pub metadata_entry: String,

    /// Entry holding the new executable
    #[serde(default = "default_binary_entry")]
    pub binary_entry: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            metadata_entry: default_metadata_entry(),
            binary_entry: default_binary_entry(),
        }
    }
}

fn default_metadata_entry() -> String {
    "info.json".to_string()
}
fn default_binary_entry() -> String {
    "binary".to_string()
}

/// Promotion and restart configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct RestartConfig {
    /// When the staged binary is moved onto the live executable path
    #[serde(default)]
    pub promotion: PromotionMode,

    /// Seconds to wait for the new process to report readiness (0 disables)
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            promotion: PromotionMode::default(),
            ready_timeout_secs: default_ready_timeout(),
        }
    }
}

impl RestartConfig {
    /// Readiness timeout, `None` when the handshake is disabled
    pub fn ready_timeout(&self) -> Option<Duration> {
        (self.ready_timeout_secs > 0).then(|| Duration::from_secs(self.ready_timeout_secs))
    }
}

fn default_ready_timeout() -> u64 {
    10
}

/// When a staged binary is promoted onto the live executable path
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PromotionMode {
    /// Promote as the first step of restart-and-update
    #[default]
    OnRestart,
    /// Promote immediately after every successful poll cycle
    AfterCycle,
    /// Only promote when the caller asks for it
    Manual,
}

impl FromStr for PromotionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "on-restart" => Ok(Self::OnRestart),
            "after-cycle" => Ok(Self::AfterCycle),
            "manual" => Ok(Self::Manual),
            _ => Err(Error::invalid_config(format!(
                "unknown promotion mode '{}' (expected on-restart, after-cycle or manual)",
                s
            ))),
        }
    }
}

impl fmt::Display for PromotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OnRestart => write!(f, "on-restart"),
            Self::AfterCycle => write!(f, "after-cycle"),
            Self::Manual => write!(f, "manual"),
        }
    }
}
