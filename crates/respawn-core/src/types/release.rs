//! Release metadata carried inside update bundles

use serde::{Deserialize, Serialize};
use std::fmt;

/// Description of the build contained in an update bundle
///
/// Decoded from the bundle's JSON metadata entry. All three fields are
/// required; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetadata {
    /// Service name
    pub name: String,

    /// Version string as published upstream (never interpreted)
    pub version: String,

    /// Free-form release description
    pub description: String,
}

impl ReleaseMetadata {
    /// Decode metadata from raw JSON bytes
    pub fn from_json_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl fmt::Display for ReleaseMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
