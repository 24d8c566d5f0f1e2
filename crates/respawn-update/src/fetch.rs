//! Single-shot retrieval of the upstream update bundle
//!
//! The fetcher performs exactly one GET per call and streams the body into a
//! scoped temporary file ([`ArchiveBundle`]). It does not retry and does not
//! treat a non-success status code as an error: the body is written either
//! way and the unpacker decides whether it is a usable archive.
//!
//! # Example
//!
//! ```no_run
//! use respawn_update::Fetcher;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> respawn_update::Result<()> {
//!     let url = "https://updates.example.com/svc.zip".parse().unwrap();
//!     let fetcher = Fetcher::new(url, Duration::from_secs(30), "svc-updater")?;
//!     let bundle = fetcher.fetch().await?;
//!     println!("{} bytes at {:?}", bundle.size(), bundle.path());
//!     Ok(())
//! }
//! ```

use futures_util::StreamExt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, UpdateError};

/// Prefix of bundle temp files, used to find leftovers
pub const BUNDLE_PREFIX: &str = "respawn-bundle-";

/// A downloaded update bundle living in a temporary file
///
/// The file is deleted when the bundle is dropped or closed, so every exit
/// path of a poll cycle cleans it up.
#[derive(Debug)]
pub struct ArchiveBundle {
    file: NamedTempFile,
    size: u64,
}

impl ArchiveBundle {
    /// Path of the temporary file
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of bytes written
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the temporary file, reporting removal failures
    pub fn close(self) -> io::Result<()> {
        self.file.close()
    }
}

/// HTTP fetcher bound to one upstream location
#[derive(Debug, Clone)]
pub struct Fetcher {
    /// HTTP client
    client: reqwest::Client,

    /// Upstream bundle location
    url: Url,

    /// Directory bundle temp files are created in
    bundle_dir: PathBuf,
}

impl Fetcher {
    /// Create a fetcher for `url`
    pub fn new(url: Url, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| UpdateError::transport(url.as_str(), e))?;

        Ok(Self {
            client,
            url,
            bundle_dir: std::env::temp_dir(),
        })
    }

    /// Write bundles into `dir` instead of the system temp directory
    pub fn with_bundle_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.bundle_dir = dir.into();
        self
    }

    /// Upstream location
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Download the bundle into a fresh temporary file
    pub async fn fetch(&self) -> Result<ArchiveBundle> {
        debug!("Fetching update bundle from {}", self.url);

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| UpdateError::transport(self.url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                "Upstream {} answered with status {}; keeping body for unpack",
                self.url, status
            );
        }

        fs::create_dir_all(&self.bundle_dir)
            .map_err(|e| UpdateError::filesystem(&self.bundle_dir, e))?;
        let mut file = tempfile::Builder::new()
            .prefix(BUNDLE_PREFIX)
            .suffix(".zip")
            .tempfile_in(&self.bundle_dir)
            .map_err(|e| UpdateError::filesystem(&self.bundle_dir, e))?;

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk: bytes::Bytes =
                chunk_result.map_err(|e| UpdateError::transport(self.url.as_str(), e))?;
            file.write_all(&chunk)
                .map_err(|e| UpdateError::filesystem(file.path(), e))?;
            written += chunk.len() as u64;
        }

        file.as_file_mut()
            .sync_all()
            .map_err(|e| UpdateError::filesystem(file.path(), e))?;

        info!(
            "Downloaded update bundle ({}) to {:?}",
            human_readable_size(written),
            file.path()
        );

        Ok(ArchiveBundle {
            file,
            size: written,
        })
    }
}

/// Convert bytes to human-readable size
pub(crate) fn human_readable_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}
