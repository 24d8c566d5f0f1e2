//! # respawn-core
//!
//! Core library for respawn providing:
//! - Runtime configuration types (upstream, polling, archive layout, restart)
//! - Hierarchical configuration loading (embedded defaults, file, environment)
//! - Release metadata shipped inside update bundles

pub mod config;
pub mod error;
pub mod types;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use types::{
    ArchiveConfig, Backpressure, PollingConfig, PromotionMode, ReleaseMetadata, RestartConfig,
    RuntimeConfig, UpstreamConfig,
};
