//! Data Hub Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the data hub workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`HubError`] and the [`Result`] alias
//! - **Types**: flow type, data format and plugin format enums shared by the
//!   engine and the CLI
//! - **Checksums**: content digests used to detect unchanged documents
//! - **Logging**: centralized `tracing` subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use hub_common::checksum::content_checksum;
//! use hub_common::types::DataFormat;
//!
//! let format: DataFormat = "json".parse().unwrap();
//! let digest = content_checksum(br#"{"id": 1}"#);
//! println!("{format} document {digest}");
//! ```

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{HubError, Result};
pub use types::{DataFormat, FlowType, PluginFormat};
