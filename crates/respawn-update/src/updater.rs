//! Updater facade
//!
//! Owns the frozen [`UpdateConfig`] and wires the stages together:
//! fetch -> unpack -> (optional) promote for each poll cycle, and
//! promote -> spawn -> handshake -> exit for a restart.

use respawn_core::{PromotionMode, RuntimeConfig};
use std::convert::Infallible;
use std::ffi::OsString;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::Unpacker;
use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::fetch::Fetcher;
use crate::promote::{Promoter, Promotion};
use crate::replacer::{ProcessReplacer, Replacement};
use crate::scheduler::{spawn_poller, CycleReport, Poller};

/// One fetch-then-unpack cycle and its collaborators
#[derive(Debug, Clone)]
struct Pipeline {
    fetcher: Fetcher,
    unpacker: Unpacker,
    promoter: Promoter,
    promotion: PromotionMode,

    /// Held for the whole cycle so bundles never coexist
    cycle_lock: Arc<Mutex<()>>,
}

impl Pipeline {
    async fn run_cycle(&self) -> Result<CycleReport> {
        let _guard = self.cycle_lock.lock().await;

        let bundle = self.fetcher.fetch().await?;

        let unpacker = self.unpacker.clone();
        let archive_path = bundle.path().to_path_buf();
        let executable = self.promoter.executable().to_path_buf();
        let unpacked =
            tokio::task::spawn_blocking(move || unpacker.unpack(&archive_path, &executable))
                .await?;

        if let Err(e) = bundle.close() {
            warn!("Failed to remove downloaded bundle: {}", e);
        }
        let unpacked = unpacked?;

        let promotion = match self.promotion {
            PromotionMode::AfterCycle => Some(self.promoter.promote()?),
            PromotionMode::OnRestart | PromotionMode::Manual => None,
        };

        Ok(CycleReport {
            metadata: unpacked.metadata,
            staged_path: unpacked.staged_path,
            staged_size: unpacked.staged_size,
            promotion,
        })
    }
}

/// Self-updater for one executable
#[derive(Debug)]
pub struct Updater {
    config: UpdateConfig,
    pipeline: Pipeline,
    replacer: ProcessReplacer,
}

impl Updater {
    /// Create an updater for the running executable with default settings
    pub fn new(upstream: &str, interval: Duration) -> Result<Self> {
        let executable = current_exe()?;
        Self::from_config(UpdateConfig::new(upstream, interval, executable)?)
    }

    /// Create an updater for the running executable from loaded configuration
    pub fn from_runtime(runtime: &RuntimeConfig) -> Result<Self> {
        let executable = current_exe()?;
        Self::from_config(UpdateConfig::from_runtime(runtime, executable)?)
    }

    /// Create an updater from a frozen configuration
    pub fn from_config(config: UpdateConfig) -> Result<Self> {
        let fetcher = Fetcher::new(
            config.upstream().clone(),
            config.http_timeout(),
            config.user_agent(),
        )?
        .with_bundle_dir(config.bundle_dir());

        let pipeline = Pipeline {
            fetcher,
            unpacker: Unpacker::new(config.metadata_entry(), config.binary_entry()),
            promoter: Promoter::new(config.executable()),
            promotion: config.promotion(),
            cycle_lock: Arc::new(Mutex::new(())),
        };

        let replacer = ProcessReplacer::new(
            config.executable(),
            config.promotion(),
            config.ready_timeout(),
        );

        debug!(
            "Updater initialized: upstream={}, executable={:?}, promotion={}",
            config.upstream(),
            config.executable(),
            config.promotion()
        );

        Ok(Self {
            config,
            pipeline,
            replacer,
        })
    }

    /// Restart with `args` (including argv\[0\]) instead of this process's arguments
    pub fn with_restart_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.replacer = self.replacer.with_args(args);
        self
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Run one poll cycle now
    pub async fn poll_once(&self) -> Result<CycleReport> {
        self.pipeline.run_cycle().await
    }

    /// Start the background poll loop
    ///
    /// Must be called from within a Tokio runtime. The loop stops when
    /// `cancel` fires or the returned [`Poller`] is dropped.
    pub fn start_polling(&self, cancel: CancellationToken) -> Poller {
        let pipeline = self.pipeline.clone();
        spawn_poller(
            self.config.interval(),
            self.config.channel_capacity(),
            self.config.backpressure(),
            cancel,
            move || {
                let pipeline = pipeline.clone();
                async move { pipeline.run_cycle().await }
            },
        )
    }

    /// Whether a staged binary is waiting at `<exe>.new`
    pub fn has_staged(&self) -> bool {
        self.pipeline.promoter.has_staged()
    }

    /// Move the staged binary onto the live path now
    pub fn promote(&self) -> Result<Promotion> {
        self.pipeline.promoter.promote()
    }

    /// Start the replacement process without exiting this one
    pub fn replace_process(&self) -> Result<Replacement> {
        self.replacer.replace()
    }

    /// Replace the running process with the updated build
    ///
    /// Only returns on failure; see [`ProcessReplacer`] for the steps.
    pub fn restart_and_update(&self) -> Result<Infallible> {
        info!("Restarting {:?}", self.config.executable());
        self.replacer.restart_and_update()
    }
}

fn current_exe() -> Result<std::path::PathBuf> {
    std::env::current_exe().map_err(|e| UpdateError::process_io("cannot locate current executable", e))
}
