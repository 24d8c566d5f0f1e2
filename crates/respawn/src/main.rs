//! respawn - self-updating service shell
//!
//! Polls an upstream update bundle, stages new builds next to the running
//! executable, and restarts in place.

mod cli;
mod commands;
mod output;
mod version;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    // Tell a restarting parent that this build came up.
    match respawn_update::handshake::notify_ready() {
        Ok(true) => debug!("Readiness reported to previous process"),
        Ok(false) => {}
        Err(e) => warn!("Could not report readiness: {}", e),
    }

    let config_dir = cli.config_dir.as_deref();
    match cli.command {
        Commands::Version(args) => commands::version::run(args),
        Commands::Check(args) => commands::check::run(args, config_dir).await,
        Commands::Watch(args) => commands::watch::run(args, config_dir).await,
        Commands::Apply(args) => commands::apply::run(args, config_dir),
        Commands::Promote(args) => commands::promote::run(args),
    }
}

/// Initialize tracing with appropriate verbosity
///
/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
