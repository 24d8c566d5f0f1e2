//! Update bundle unpacking
//!
//! An update bundle is a zip archive with two relevant entries: a JSON
//! metadata entry (default `info.json`) and the new executable (default
//! `binary`). Both must be present before anything is decoded or written.
//! The executable is copied into a temp file next to the live executable
//! and renamed to `<exe>.new` only once it is complete.

use respawn_core::{ArchiveConfig, ReleaseMetadata};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::{Result, UpdateError};
use crate::fetch::human_readable_size;
use crate::promote::staged_path;

/// Copy buffer size (64KB)
const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Largest metadata entry accepted (64KB)
pub const MAX_METADATA_BYTES: u64 = 64 * 1024;

/// Result of a successful unpack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpacked {
    /// Decoded release metadata
    pub metadata: ReleaseMetadata,

    /// Path of the staged binary (`<exe>.new`)
    pub staged_path: PathBuf,

    /// Size of the staged binary in bytes
    pub staged_size: u64,
}

/// Extracts metadata and the staged binary from update bundles
#[derive(Debug, Clone)]
pub struct Unpacker {
    metadata_entry: String,
    binary_entry: String,
}

impl Default for Unpacker {
    fn default() -> Self {
        Self::from_config(&ArchiveConfig::default())
    }
}

impl Unpacker {
    /// Create an unpacker for the given entry names
    pub fn new(metadata_entry: impl Into<String>, binary_entry: impl Into<String>) -> Self {
        Self {
            metadata_entry: metadata_entry.into(),
            binary_entry: binary_entry.into(),
        }
    }

    /// Create an unpacker from archive configuration
    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self::new(&config.metadata_entry, &config.binary_entry)
    }

    /// Unpack `archive_path`, staging the binary next to `executable`
    pub fn unpack(&self, archive_path: &Path, executable: &Path) -> Result<Unpacked> {
        debug!("Unpacking {:?} for {:?}", archive_path, executable);

        let file = File::open(archive_path)
            .map_err(|e| UpdateError::filesystem(archive_path, e))?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| UpdateError::archive_with("failed to open update bundle", e))?;

        debug!("Bundle has {} entries", archive.len());

        let metadata_index = archive
            .index_for_name(&self.metadata_entry)
            .ok_or_else(|| UpdateError::missing_entry(&self.metadata_entry))?;
        let binary_index = archive
            .index_for_name(&self.binary_entry)
            .ok_or_else(|| UpdateError::missing_entry(&self.binary_entry))?;

        let metadata = self.read_metadata(&mut archive, metadata_index)?;

        let staged_path = staged_path(executable);
        let staged_size = self.stage_binary(&mut archive, binary_index, &staged_path)?;

        info!(
            "Staged {} ({}) at {:?}",
            metadata,
            human_readable_size(staged_size),
            staged_path
        );

        Ok(Unpacked {
            metadata,
            staged_path,
            staged_size,
        })
    }

    fn read_metadata<R: Read + std::io::Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        index: usize,
    ) -> Result<ReleaseMetadata> {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| UpdateError::archive_with(format!("cannot open '{}'", self.metadata_entry), e))?;

        // The declared size comes from the bundle, so it only gates the read.
        if entry.size() > MAX_METADATA_BYTES {
            return Err(self.oversized_metadata(entry.size()));
        }

        let mut raw = Vec::new();
        entry
            .by_ref()
            .take(MAX_METADATA_BYTES + 1)
            .read_to_end(&mut raw)
            .map_err(|e| {
                UpdateError::archive_with(format!("cannot read '{}'", self.metadata_entry), e.into())
            })?;
        if raw.len() as u64 > MAX_METADATA_BYTES {
            return Err(self.oversized_metadata(raw.len() as u64));
        }

        ReleaseMetadata::from_json_slice(&raw)
            .map_err(|e| UpdateError::decode(&self.metadata_entry, e))
    }

    fn oversized_metadata(&self, size: u64) -> UpdateError {
        UpdateError::archive(format!(
            "'{}' is {} bytes, larger than the {} byte limit",
            self.metadata_entry, size, MAX_METADATA_BYTES
        ))
    }

    fn stage_binary<R: Read + std::io::Seek>(
        &self,
        archive: &mut ZipArchive<R>,
        index: usize,
        staged_path: &Path,
    ) -> Result<u64> {
        let staging_dir = staged_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        // Dropped (and deleted) on every early return below.
        let mut partial = tempfile::Builder::new()
            .prefix(".respawn-staging-")
            .tempfile_in(staging_dir)
            .map_err(|e| UpdateError::filesystem(staging_dir, e))?;

        let mut entry = archive
            .by_index(index)
            .map_err(|e| UpdateError::archive_with(format!("cannot open '{}'", self.binary_entry), e))?;

        let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
        let mut copied: u64 = 0;
        loop {
            let read = entry.read(&mut buffer).map_err(|e| {
                UpdateError::archive_with(format!("cannot read '{}'", self.binary_entry), e.into())
            })?;
            if read == 0 {
                break;
            }
            partial
                .write_all(&buffer[..read])
                .map_err(|e| UpdateError::filesystem(partial.path(), e))?;
            copied += read as u64;
        }
        drop(entry);

        partial
            .as_file()
            .sync_all()
            .map_err(|e| UpdateError::filesystem(partial.path(), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(partial.path(), std::fs::Permissions::from_mode(0o755))
                .map_err(|e| UpdateError::filesystem(partial.path(), e))?;
        }

        partial
            .persist(staged_path)
            .map_err(|e| UpdateError::filesystem(staged_path, e.error))?;

        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const INFO_JSON: &[u8] = br#"{"name":"svc","version":"1.2.3","description":"x"}"#;
    const NEW_BUILD: &[u8] = b"\x7fELF new build";

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn test_unpack_stages_binary_and_metadata() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bundle.zip");
        let exe = dir.path().join("svc");
        write_zip(
            &archive,
            &[("info.json", INFO_JSON), ("binary", NEW_BUILD)],
        );

        let unpacked = Unpacker::default().unpack(&archive, &exe).unwrap();
        assert_eq!(unpacked.metadata.version, "1.2.3");
        assert_eq!(unpacked.staged_path, dir.path().join("svc.new"));
        assert_eq!(unpacked.staged_size, NEW_BUILD.len() as u64);
        assert_eq!(std::fs::read(&unpacked.staged_path).unwrap(), NEW_BUILD);
    }

    #[test]
    fn test_custom_entry_names() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bundle.zip");
        let exe = dir.path().join("svc");
        let info: &[u8] = br#"{"name":"svc","version":"2","description":""}"#;
        write_zip(&archive, &[("meta/release.json", info), ("bin/svc", NEW_BUILD)]);

        let unpacker = Unpacker::new("meta/release.json", "bin/svc");
        let unpacked = unpacker.unpack(&archive, &exe).unwrap();
        assert_eq!(unpacked.metadata.version, "2");
        assert_eq!(std::fs::read(dir.path().join("svc.new")).unwrap(), NEW_BUILD);
    }

    #[test]
    fn test_not_a_zip_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bundle.zip");
        std::fs::write(&archive, b"<html>502 Bad Gateway</html>").unwrap();

        let err = Unpacker::default()
            .unpack(&archive, &dir.path().join("svc"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::Archive { source: Some(_), .. }));
        assert!(!dir.path().join("svc.new").exists());
    }

    #[test]
    fn test_missing_archive_file_is_filesystem_error() {
        let dir = TempDir::new().unwrap();
        let err = Unpacker::default()
            .unpack(&dir.path().join("absent.zip"), &dir.path().join("svc"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::Filesystem { .. }));
    }

    #[test]
    fn test_no_staging_leftovers_on_failure() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bundle.zip");
        let broken: &[u8] = b"{broken";
        write_zip(&archive, &[("info.json", broken), ("binary", NEW_BUILD)]);

        let result = Unpacker::default().unpack(&archive, &dir.path().join("svc"));
        assert!(matches!(result, Err(UpdateError::Decode { .. })));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".respawn-staging-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    /// Hand-built stored zip whose central directory claims `declared`
    /// uncompressed bytes for `info.json` through a zip64 extra field
    fn zip_with_declared_metadata_size(declared: u64) -> Vec<u8> {
        fn u16le(buf: &mut Vec<u8>, v: u16) {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        fn u32le(buf: &mut Vec<u8>, v: u32) {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        let entries: [(&str, &[u8], bool); 2] =
            [("info.json", INFO_JSON, true), ("binary", NEW_BUILD, false)];
        let mut out = Vec::new();
        let mut offsets = Vec::new();

        for (name, data, _) in &entries {
            offsets.push(out.len() as u32);
            u32le(&mut out, 0x0403_4b50);
            u16le(&mut out, 20); // version needed
            u16le(&mut out, 0); // flags
            u16le(&mut out, 0); // stored
            u16le(&mut out, 0); // time
            u16le(&mut out, 0x0021); // date
            u32le(&mut out, 0); // crc
            u32le(&mut out, data.len() as u32);
            u32le(&mut out, data.len() as u32);
            u16le(&mut out, name.len() as u16);
            u16le(&mut out, 0);
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(data);
        }

        let central_start = out.len() as u32;
        for ((name, data, zip64), offset) in entries.iter().zip(&offsets) {
            u32le(&mut out, 0x0201_4b50);
            u16le(&mut out, 45); // made by
            u16le(&mut out, 45); // version needed
            u16le(&mut out, 0);
            u16le(&mut out, 0);
            u16le(&mut out, 0);
            u16le(&mut out, 0x0021);
            u32le(&mut out, 0);
            u32le(&mut out, data.len() as u32);
            u32le(&mut out, if *zip64 { u32::MAX } else { data.len() as u32 });
            u16le(&mut out, name.len() as u16);
            u16le(&mut out, if *zip64 { 12 } else { 0 });
            u16le(&mut out, 0); // comment
            u16le(&mut out, 0); // disk
            u16le(&mut out, 0); // internal attrs
            u32le(&mut out, 0); // external attrs
            u32le(&mut out, *offset);
            out.extend_from_slice(name.as_bytes());
            if *zip64 {
                u16le(&mut out, 0x0001);
                u16le(&mut out, 8);
                out.extend_from_slice(&declared.to_le_bytes());
            }
        }
        let central_size = out.len() as u32 - central_start;

        u32le(&mut out, 0x0605_4b50);
        u16le(&mut out, 0);
        u16le(&mut out, 0);
        u16le(&mut out, entries.len() as u16);
        u16le(&mut out, entries.len() as u16);
        u32le(&mut out, central_size);
        u32le(&mut out, central_start);
        u16le(&mut out, 0);
        out
    }

    #[test]
    fn test_inflated_declared_metadata_size_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bundle.zip");
        std::fs::write(&archive, zip_with_declared_metadata_size(1 << 50)).unwrap();

        let err = Unpacker::default()
            .unpack(&archive, &dir.path().join("svc"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::Archive { .. }));
        assert!(!dir.path().join("svc.new").exists());
    }

    #[test]
    fn test_oversized_metadata_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("bundle.zip");
        let padding = "x".repeat(MAX_METADATA_BYTES as usize);
        let info = format!(
            r#"{{"name":"svc","version":"1.2.3","description":"{}"}}"#,
            padding
        );
        write_zip(&archive, &[("info.json", info.as_bytes()), ("binary", NEW_BUILD)]);

        let err = Unpacker::default()
            .unpack(&archive, &dir.path().join("svc"))
            .unwrap_err();
        assert!(matches!(err, UpdateError::Archive { source: None, .. }));
        assert!(err.to_string().contains("byte limit"));
        assert!(!dir.path().join("svc.new").exists());
    }

    #[test]
    fn test_in_memory_archive_lookup() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = ZipWriter::new(&mut buf);
            zip.start_file("info.json", SimpleFileOptions::default()).unwrap();
            zip.write_all(INFO_JSON).unwrap();
            zip.finish().unwrap();
        }
        let mut archive = ZipArchive::new(Cursor::new(buf.into_inner())).unwrap();
        let index = archive.index_for_name("info.json").unwrap();
        let metadata = Unpacker::default().read_metadata(&mut archive, index).unwrap();
        assert_eq!(metadata.name, "svc");
    }
}
