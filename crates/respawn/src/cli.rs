//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use respawn_core::types::MAX_DURATION_SECS;
use std::ffi::OsString;

/// respawn - self-updating service shell
#[derive(Parser, Debug)]
#[command(name = "respawn")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding respawn.yaml (default: ~/.respawn)
    #[arg(short, long, global = true, env = "RESPAWN_CONFIG_DIR")]
    pub config_dir: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version and update state
    Version(VersionArgs),

    /// Run one poll cycle now and stage the result
    Check(CheckArgs),

    /// Poll for updates until interrupted
    Watch(WatchArgs),

    /// Restart into the staged or promoted build
    Apply(ApplyArgs),

    /// Move the staged build onto the live executable path
    Promote(PromoteArgs),
}

// Version command
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Overrides for the upstream location
#[derive(Args, Debug, Clone, Default)]
pub struct UpstreamArgs {
    /// URL of the update bundle (overrides upstream.url)
    #[arg(long, value_name = "URL")]
    pub upstream: Option<String>,
}

// Check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub upstream: UpstreamArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// Watch command
#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub upstream: UpstreamArgs,

    /// Seconds between poll cycles (overrides polling.interval-secs)
    #[arg(
        long,
        value_name = "SECS",
        value_parser = clap::value_parser!(u64).range(1..=MAX_DURATION_SECS)
    )]
    pub interval: Option<u64>,

    /// Restart into each newly staged build
    #[arg(long)]
    pub apply: bool,
}

// Apply command
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Arguments for the restarted process (default: watch)
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<OsString>,
}

// Promote command
#[derive(Args, Debug)]
pub struct PromoteArgs {
    /// Delete the staged build instead of promoting it
    #[arg(long)]
    pub discard: bool,
}
