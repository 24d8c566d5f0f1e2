//! Error types for the update pipeline

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using respawn-update's error type
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Errors produced by the fetch, unpack, promote and restart stages
#[derive(Error, Debug)]
pub enum UpdateError {
    /// Network or HTTP-layer failure while fetching the bundle
    #[error("Failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Missing or unreadable archive entries
    #[error("Archive error: {message}")]
    Archive {
        message: String,
        #[source]
        source: Option<zip::result::ZipError>,
    },

    /// Release metadata entry is not valid JSON of the expected shape
    #[error("Failed to decode release metadata from '{entry}': {source}")]
    Decode {
        entry: String,
        #[source]
        source: serde_json::Error,
    },

    /// File create, rename or copy failure
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Spawn, handshake or termination failure
    #[error("Process error: {message}")]
    Process {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] respawn_core::Error),

    /// A background task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl UpdateError {
    /// Create a transport error for a URL
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Create an archive error without an underlying cause
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive {
            message: message.into(),
            source: None,
        }
    }

    /// Create an archive error wrapping a zip error
    pub fn archive_with(message: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Create an archive error for a missing entry
    pub fn missing_entry(entry: &str) -> Self {
        Self::archive(format!("entry '{}' not found in archive", entry))
    }

    /// Create a decode error for a metadata entry
    pub fn decode(entry: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            entry: entry.into(),
            source,
        }
    }

    /// Create a filesystem error for a path
    pub fn filesystem(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a process error without an underlying cause
    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
            source: None,
        }
    }

    /// Create a process error wrapping an io error
    pub fn process_io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Process {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Short, stable name of the error kind (used in logs and events)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Archive { .. } => "archive",
            Self::Decode { .. } => "decode",
            Self::Filesystem { .. } => "filesystem",
            Self::Process { .. } => "process",
            Self::Config(_) => "config",
            Self::Task(_) => "task",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_error_display_includes_path() {
        let err = UpdateError::filesystem(
            "/opt/svc/bin/svc.new",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/opt/svc/bin/svc.new"));
        assert!(msg.contains("denied"));
        assert_eq!(err.kind(), "filesystem");
    }

    #[test]
    fn test_missing_entry_is_archive_error() {
        let err = UpdateError::missing_entry("info.json");
        assert!(matches!(err, UpdateError::Archive { source: None, .. }));
        assert!(err.to_string().contains("'info.json' not found"));
    }

    #[test]
    fn test_decode_error_kind() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = UpdateError::decode("info.json", source);
        assert_eq!(err.kind(), "decode");
        assert!(err.to_string().contains("info.json"));
    }
}
