//! Helpers for updater and process replacement testing
//!
//! Fake executables are bash scripts. A ready script records its working
//! directory and arguments, then completes the readiness handshake with
//! bash's `/dev/tcp`.

use respawn_core::PromotionMode;
use respawn_update::fetch::BUNDLE_PREFIX;
use respawn_update::{UpdateConfig, Updater};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::constants::*;

/// Route library logs to the test output (`RUST_LOG` controls the level)
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a fake binary file with the given content
pub fn create_fake_binary(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(content)?;

    #[cfg(unix)]
    make_executable(path)?;

    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}

fn write_script(path: &Path, body: &str) -> std::io::Result<()> {
    create_fake_binary(path, format!("#!/bin/bash\n{}", body).as_bytes())
}

/// Script that records cwd and arguments to `record`, then reports ready
pub fn ready_script(record: &Path) -> String {
    format!(
        r#"{{ echo "cwd=$(pwd)"; for a in "$@"; do echo "arg=$a"; done; }} > "{record}"
if [ -n "$RESPAWN_READY_ADDR" ]; then
    exec 3<>"/dev/tcp/${{RESPAWN_READY_ADDR%:*}}/${{RESPAWN_READY_ADDR##*:}}"
    printf '%s\n' "$RESPAWN_READY_TOKEN" >&3
    exec 3>&-
fi
sleep 0.2
"#,
        record = record.display()
    )
}

/// Write a ready script to `path`
pub fn create_ready_script(path: &Path, record: &Path) -> std::io::Result<()> {
    write_script(path, &ready_script(record))
}

/// Script that never reports readiness
pub fn create_silent_script(path: &Path) -> std::io::Result<()> {
    write_script(path, "sleep 30\n")
}

/// Script that exits immediately with a failure
pub fn create_crashing_script(path: &Path) -> std::io::Result<()> {
    write_script(path, "exit 3\n")
}

/// Lines written by a ready script
pub fn read_record(record: &Path) -> Vec<String> {
    fs::read_to_string(record)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Downloaded bundles still present in `dir`
pub fn bundle_leftovers(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(BUNDLE_PREFIX))
        .map(|e| e.path())
        .collect()
}

/// Paths used by an updater test: live executable and bundle directory
pub struct TestLayout {
    pub executable: PathBuf,
    pub bundle_dir: PathBuf,
}

impl TestLayout {
    pub fn new(root: &Path) -> Self {
        let bin_dir = root.join("bin");
        fs::create_dir_all(&bin_dir).unwrap();
        Self {
            executable: bin_dir.join("svc"),
            bundle_dir: root.join("bundles"),
        }
    }

    pub fn staged(&self) -> PathBuf {
        respawn_update::staged_path(&self.executable)
    }

    pub fn backup(&self) -> PathBuf {
        respawn_update::backup_path(&self.executable)
    }
}

/// Updater against `url` polling every `interval`
pub fn test_updater(
    url: &str,
    layout: &TestLayout,
    interval: Duration,
    promotion: PromotionMode,
) -> Updater {
    let config = UpdateConfig::new(url, interval, &layout.executable)
        .unwrap()
        .with_promotion(promotion)
        .with_bundle_dir(&layout.bundle_dir)
        .with_ready_timeout(None)
        .unwrap();
    Updater::from_config(config).unwrap()
}

/// Updater with a short poll interval
pub fn fast_updater(url: &str, layout: &TestLayout) -> Updater {
    test_updater(
        url,
        layout,
        Duration::from_millis(FAST_INTERVAL_MS),
        PromotionMode::OnRestart,
    )
}
