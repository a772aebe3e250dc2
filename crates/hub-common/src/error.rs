//! Error types shared across the data hub crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, HubError>;

/// Error parsing the shared enums
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Invalid flow type: {0}")]
    InvalidFlowType(String),

    #[error("Invalid data format: {0}")]
    InvalidDataFormat(String),

    #[error("Invalid plugin format: {0}")]
    InvalidPluginFormat(String),
}
