//! Fluent builder for zip update bundles

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::constants::*;

/// Builder for in-memory update bundles
///
/// # Example
///
/// ```ignore
/// let bytes = BundleBuilder::new()
///     .metadata(INFO_JSON)
///     .binary(NEW_BINARY_CONTENT)
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct BundleBuilder {
    entries: Vec<(String, Vec<u8>)>,
    compression: Option<CompressionMethod>,
}

impl BundleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bundle with the standard metadata and binary entries
    pub fn standard() -> Self {
        Self::new().metadata(INFO_JSON).binary(NEW_BINARY_CONTENT)
    }

    /// Add the metadata entry under its default name
    pub fn metadata(self, json: &str) -> Self {
        self.entry(METADATA_ENTRY, json.as_bytes())
    }

    /// Add the binary entry under its default name
    pub fn binary(self, content: &[u8]) -> Self {
        self.entry(BINARY_ENTRY, content)
    }

    /// Add an arbitrary entry
    pub fn entry(mut self, name: &str, content: &[u8]) -> Self {
        self.entries.push((name.to_string(), content.to_vec()));
        self
    }

    /// Store entries without compression
    pub fn stored(mut self) -> Self {
        self.compression = Some(CompressionMethod::Stored);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(self.compression.unwrap_or(CompressionMethod::Deflated));

        for (name, content) in &self.entries {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(content).unwrap();
        }

        zip.finish().unwrap().into_inner()
    }
}
