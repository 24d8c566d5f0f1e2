//! CLI command implementations

pub mod apply;
pub mod check;
pub mod promote;
pub mod version;
pub mod watch;

use anyhow::{Context, Result};
use camino::Utf8Path;
use respawn_core::{HierarchicalConfigLoader, RuntimeConfig};
use respawn_update::Updater;

use crate::cli::UpstreamArgs;

/// Load runtime configuration and apply command-line overrides
pub(crate) fn load_runtime(
    config_dir: Option<&Utf8Path>,
    upstream: &UpstreamArgs,
) -> Result<RuntimeConfig> {
    let loader = match config_dir {
        Some(dir) => HierarchicalConfigLoader::with_dir(dir.to_path_buf()),
        None => HierarchicalConfigLoader::new()?,
    };

    let mut runtime = loader
        .load_runtime_config()
        .with_context(|| format!("Failed to load configuration from {}", loader.config_dir()))?;

    if let Some(url) = &upstream.upstream {
        runtime.upstream.url = Some(url.clone());
    }

    Ok(runtime)
}

/// Build an updater for the running executable
pub(crate) fn build_updater(runtime: &RuntimeConfig) -> Result<Updater> {
    Updater::from_runtime(runtime).context("Failed to set up the updater")
}
