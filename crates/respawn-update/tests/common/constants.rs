//! Shared constants for test infrastructure

// Release metadata
pub const RELEASE_NAME: &str = "svc";
pub const RELEASE_VERSION: &str = "1.2.3";
pub const RELEASE_DESCRIPTION: &str = "x";
pub const INFO_JSON: &str = r#"{"name":"svc","version":"1.2.3","description":"x"}"#;
pub const INFO_JSON_EXTRA_FIELDS: &str =
    r#"{"name":"svc","version":"1.2.4","description":"x","channel":"beta","build":42}"#;
pub const INFO_JSON_MISSING_VERSION: &str = r#"{"name":"svc","description":"x"}"#;
pub const INFO_JSON_MALFORMED: &str = r#"{"name":"svc","version":"#;

// Entry names
pub const METADATA_ENTRY: &str = "info.json";
pub const BINARY_ENTRY: &str = "binary";

// Binary payloads
pub const NEW_BINARY_CONTENT: &[u8] = b"\x7fELF\x02\x01\x01 new build payload";
pub const ORIGINAL_CONTENT: &[u8] = b"original build";

// Upstream
pub const BUNDLE_PATH: &str = "/releases/svc.zip";
pub const NOT_A_ZIP: &[u8] = b"<html><body>502 Bad Gateway</body></html>";

// Timing
pub const FAST_INTERVAL_MS: u64 = 50;
