//! Common test infrastructure for respawn-update tests
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```
//!
//! # Modules
//!
//! - `constants`: release metadata, binary payloads, entry names
//! - `builders`: fluent builder for zip update bundles
//! - `mock_server`: wiremock setup helpers for the upstream endpoint
//! - `updater_helpers`: fake executables, bundle-dir inspection, updater setup

// Not every test binary uses every helper.
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod builders;
pub mod constants;
pub mod mock_server;
pub mod updater_helpers;

pub use builders::*;
pub use constants::*;
pub use mock_server::*;
pub use updater_helpers::*;
