//! Version and update state of the running executable

use respawn_update::{backup_path, staged_path};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Version information plus what is waiting next to the executable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    /// Package version of this build
    pub version: String,

    /// Version of the update library
    pub library: String,

    /// Target operating system and architecture
    pub target: String,

    /// Path of the running executable
    pub executable: Option<String>,

    /// Whether a staged build (`.new`) is present
    pub staged: bool,

    /// Whether a backup (`.old`) is present
    pub backup: bool,
}

impl VersionInfo {
    /// Version info for the running process
    pub fn current() -> Self {
        let executable = std::env::current_exe().ok();
        Self::for_executable(executable.as_deref())
    }

    /// Version info with update state for `executable`
    pub fn for_executable(executable: Option<&Path>) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            library: respawn_update::VERSION.to_string(),
            target: format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS),
            executable: executable.map(|p| p.display().to_string()),
            staged: executable.is_some_and(|p| staged_path(p).is_file()),
            backup: executable.is_some_and(|p| backup_path(p).is_file()),
        }
    }

    /// One-line summary
    pub fn display(&self) -> String {
        format!("respawn {} ({})", self.version, self.target)
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
