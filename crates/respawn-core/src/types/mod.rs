//! Shared type definitions

mod release;
mod runtime_config;

pub use release::ReleaseMetadata;
pub use runtime_config::{
    parse_upstream_url, ArchiveConfig, Backpressure, PollingConfig, PromotionMode, RestartConfig,
    RuntimeConfig, UpstreamConfig, MAX_DURATION_SECS,
};
