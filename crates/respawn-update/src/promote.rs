//! Promotion of a staged binary onto the live executable path
//!
//! Layout, all siblings of the live executable:
//! - `<exe>.new` staged binary written by the unpacker
//! - `<exe>.old` backup of the previous executable, kept after a swap
//!
//! Promotion is two renames: live -> backup, then staged -> live. If the
//! second rename fails the first is undone, so the live path is never left
//! empty by a failed promotion.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::error::{Result, UpdateError};

/// Suffix of the staged binary
pub const STAGED_SUFFIX: &str = ".new";

/// Suffix of the backup of the previous executable
pub const BACKUP_SUFFIX: &str = ".old";

/// `<exe>.new`
pub fn staged_path(executable: &Path) -> PathBuf {
    with_suffix(executable, STAGED_SUFFIX)
}

/// `<exe>.old`
pub fn backup_path(executable: &Path) -> PathBuf {
    with_suffix(executable, BACKUP_SUFFIX)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Outcome of a promotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    /// Live executable path, now holding the promoted build
    pub live: PathBuf,

    /// Where the previous executable was moved, if there was one
    pub backup: Option<PathBuf>,
}

/// Moves staged binaries onto the live executable path
#[derive(Debug, Clone)]
pub struct Promoter {
    executable: PathBuf,
}

impl Promoter {
    /// Create a promoter for `executable`
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Live executable path
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Staged binary path
    pub fn staged_path(&self) -> PathBuf {
        staged_path(&self.executable)
    }

    /// Backup path
    pub fn backup_path(&self) -> PathBuf {
        backup_path(&self.executable)
    }

    /// Whether a staged binary is waiting to be promoted
    pub fn has_staged(&self) -> bool {
        self.staged_path().is_file()
    }

    /// Move the staged binary onto the live path, backing up the current one
    pub fn promote(&self) -> Result<Promotion> {
        let staged = self.staged_path();
        if !staged.is_file() {
            return Err(UpdateError::filesystem(
                &staged,
                io::Error::new(io::ErrorKind::NotFound, "no staged binary to promote"),
            ));
        }

        let backup = if self.executable.exists() {
            let backup = self.backup_path();
            self.move_file(&self.executable, &backup)?;
            debug!("Backed up {:?} to {:?}", self.executable, backup);
            Some(backup)
        } else {
            warn!(
                "Live executable {:?} is missing; promoting without a backup",
                self.executable
            );
            None
        };

        if let Err(e) = self.move_file(&staged, &self.executable) {
            error!("Failed to promote {:?}: {}", staged, e);
            if let Some(backup) = &backup {
                if let Err(restore_err) = self.move_file(backup, &self.executable) {
                    error!(
                        "Failed to restore {:?} from {:?}: {}",
                        self.executable, backup, restore_err
                    );
                }
            }
            return Err(e);
        }

        info!("Promoted {:?} to {:?}", staged, self.executable);
        Ok(Promotion {
            live: self.executable.clone(),
            backup,
        })
    }

    /// Undo a promotion: the live build goes back to `.new`, the backup back to live
    pub fn rollback(&self) -> Result<()> {
        let backup = self.backup_path();
        warn!("Rolling back {:?} from {:?}", self.executable, backup);

        if !backup.is_file() {
            return Err(UpdateError::filesystem(
                &backup,
                io::Error::new(io::ErrorKind::NotFound, "backup does not exist"),
            ));
        }

        if self.executable.exists() {
            self.move_file(&self.executable, &self.staged_path())?;
        }
        self.move_file(&backup, &self.executable)?;

        info!("Rollback completed successfully");
        Ok(())
    }

    /// Remove a staged binary that will not be promoted
    pub fn discard_staged(&self) -> Result<bool> {
        let staged = self.staged_path();
        match fs::remove_file(&staged) {
            Ok(()) => {
                info!("Discarded staged binary {:?}", staged);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(UpdateError::filesystem(&staged, e)),
        }
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        // Windows refuses to rename over an existing file.
        #[cfg(windows)]
        {
            if to.exists() {
                fs::remove_file(to).map_err(|e| UpdateError::filesystem(to, e))?;
            }
        }

        fs::rename(from, to).map_err(|e| UpdateError::filesystem(from, e))
    }
}
