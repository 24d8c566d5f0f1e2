//! Self-update pipeline for long-running service binaries
//!
//! Provides:
//! - Single-shot download of the upstream update bundle into a scoped temp file
//! - Zip bundle unpacking into release metadata and a staged `<exe>.new` binary
//! - A cancellable background poller that reports every cycle's outcome
//! - Explicit promotion of the staged binary with a `<exe>.old` backup
//! - In-place process replacement with a readiness handshake and auto-recovery
//!
//! # Example
//!
//! ```no_run
//! use respawn_update::Updater;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     respawn_update::handshake::notify_ready()?;
//!
//!     let updater = Updater::new("https://updates.example.com/svc.zip", Duration::from_secs(600))?;
//!     let cancel = CancellationToken::new();
//!     let mut poller = updater.start_polling(cancel.clone());
//!
//!     while let Some(event) = poller.recv().await {
//!         if let Some(metadata) = event.metadata() {
//!             println!("staged {}", metadata);
//!             updater.restart_and_update()?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod handshake;
pub mod promote;
pub mod replacer;
pub mod scheduler;
pub mod updater;

pub use archive::{Unpacked, Unpacker};
pub use config::UpdateConfig;
pub use error::{Result, UpdateError};
pub use fetch::{ArchiveBundle, Fetcher};
pub use promote::{backup_path, staged_path, Promoter, Promotion};
pub use replacer::{ProcessReplacer, Replacement};
pub use respawn_core::ReleaseMetadata;
pub use scheduler::{CycleReport, PollEvent, PollOutcome, Poller};
pub use updater::Updater;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
