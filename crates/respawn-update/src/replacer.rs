//! In-place process replacement
//!
//! Restarting runs these steps in order:
//! 1. promote the staged binary onto the live path (`OnRestart` mode only),
//!    moving the current executable to `<exe>.old`
//! 2. spawn the live executable with this process's arguments, environment
//!    and standard streams, in the executable's directory
//! 3. wait for the child to report readiness (when a timeout is configured)
//! 4. exit the current process
//!
//! If step 1 fails nothing has changed. If step 2 or 3 fails the child is
//! killed and a promotion made by this call is rolled back, so the previous
//! build is back on the live path and the staged build is back at `.new`.

use respawn_core::PromotionMode;
use std::convert::Infallible;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::{Result, UpdateError};
use crate::handshake::{ReadyListener, READY_ADDR_ENV, READY_TOKEN_ENV};
use crate::promote::{Promoter, Promotion};

/// A successfully started replacement process
#[derive(Debug)]
pub struct Replacement {
    /// Handle of the new process
    pub child: Child,

    /// Promotion performed as part of the restart, if any
    pub promotion: Option<Promotion>,

    /// Whether the child confirmed readiness
    pub handshake: bool,
}

impl Replacement {
    /// Process id of the new process
    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

/// Replaces the running process with the build on the live executable path
#[derive(Debug, Clone)]
pub struct ProcessReplacer {
    promoter: Promoter,
    promotion: PromotionMode,
    ready_timeout: Option<Duration>,
    args: Vec<OsString>,
}

impl ProcessReplacer {
    /// Create a replacer that restarts `executable` with this process's arguments
    pub fn new(
        executable: impl Into<PathBuf>,
        promotion: PromotionMode,
        ready_timeout: Option<Duration>,
    ) -> Self {
        Self {
            promoter: Promoter::new(executable),
            promotion,
            ready_timeout: ready_timeout.filter(|t| !t.is_zero()),
            args: env::args_os().collect(),
        }
    }

    /// Use `args` (including argv\[0\]) instead of this process's arguments
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Live executable path
    pub fn executable(&self) -> &Path {
        self.promoter.executable()
    }

    /// Start the replacement process without exiting
    ///
    /// On error, the live path and the process set are as they were before
    /// the call.
    pub fn replace(&self) -> Result<Replacement> {
        let promotion = match self.promotion {
            PromotionMode::OnRestart => Some(self.promoter.promote()?),
            PromotionMode::AfterCycle | PromotionMode::Manual => {
                debug!("Promotion is {}; restarting the live build", self.promotion);
                None
            }
        };

        match self.start() {
            Ok((child, handshake)) => {
                info!(
                    "Replacement process {} started from {:?}",
                    child.id(),
                    self.executable()
                );
                Ok(Replacement {
                    child,
                    promotion,
                    handshake,
                })
            }
            Err(e) => {
                error!("Restart failed: {}", e);
                if promotion.as_ref().is_some_and(|p| p.backup.is_some()) {
                    if let Err(rollback_err) = self.promoter.rollback() {
                        error!("Failed to restore previous build: {}", rollback_err);
                    }
                }
                Err(e)
            }
        }
    }

    /// Start the replacement process and exit this one
    ///
    /// Only returns on failure.
    pub fn restart_and_update(&self) -> Result<Infallible> {
        let replacement = self.replace()?;
        info!(
            "Handing over to process {}; exiting {}",
            replacement.pid(),
            std::process::id()
        );
        std::process::exit(0)
    }

    fn start(&self) -> Result<(Child, bool)> {
        let listener = self.ready_timeout.map(|_| ReadyListener::bind()).transpose()?;
        let mut child = self.spawn(listener.as_ref())?;

        let (Some(listener), Some(timeout)) = (listener, self.ready_timeout) else {
            return Ok((child, false));
        };

        if let Err(e) = listener.wait(&mut child, timeout) {
            warn!("Killing replacement process {}", child.id());
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
        Ok((child, true))
    }

    fn spawn(&self, listener: Option<&ReadyListener>) -> Result<Child> {
        let executable = self.executable();
        let mut command = Command::new(executable);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if let Some(argv0) = self.args.first() {
                command.arg0(argv0);
            }
        }

        command
            .args(self.args.iter().skip(1))
            .current_dir(working_dir(executable))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .env_remove(READY_ADDR_ENV)
            .env_remove(READY_TOKEN_ENV);

        if let Some(listener) = listener {
            command.envs(listener.env());
        }

        debug!("Spawning {:?} with {} argument(s)", executable, self.args.len().saturating_sub(1));
        command.spawn().map_err(|e| {
            UpdateError::process_io(format!("failed to spawn {}", executable.display()), e)
        })
    }
}

fn working_dir(executable: &Path) -> &Path {
    executable
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}
