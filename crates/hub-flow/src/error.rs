//! Error types for flow resolution and execution
//!
//! Only [`FlowError`] ever reaches a caller as control flow. Per-document
//! problems ([`StageError`], and [`StoreError`] raised while reading or writing
//! one document) are recorded in the job status instead.

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors surfaced to the submitter of a flow or to a waiter on its completion
#[derive(Error, Debug)]
pub enum FlowError {
    /// Invalid job parameters or an unrunnable flow; raised before the job starts
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Flow not found: {entity}/{flow_type}/{flow}")]
    FlowNotFound {
        entity: String,
        flow_type: String,
        flow: String,
    },

    /// The job could not continue because a store stayed unreachable
    #[error("Store unavailable, job {job_id} failed: {message}")]
    StoreUnavailable { job_id: Uuid, message: String },

    #[error("Timed out after {0:?} waiting for the job to finish")]
    Timeout(Duration),

    #[error("Invalid flow metadata in {path}: {message}")]
    InvalidMetadata { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] hub_common::HubError),
}

impl FlowError {
    pub fn config(message: impl Into<String>) -> Self {
        FlowError::Configuration(message.into())
    }

    /// True for errors that are a `NotFound` outcome of flow resolution
    pub fn is_not_found(&self) -> bool {
        matches!(self, FlowError::EntityNotFound(_) | FlowError::FlowNotFound { .. })
    }
}

/// Failure of a single stage invocation for one document
#[derive(Error, Debug, Clone)]
pub enum StageError {
    /// The stage rejected the document
    #[error("{0}")]
    Failed(String),

    #[error("Script error: {0}")]
    Script(String),

    /// Document content could not be decoded for the stage's data format
    #[error("Invalid content for {format}: {message}")]
    InvalidContent { format: String, message: String },

    #[error("Stage panicked: {0}")]
    Panicked(String),
}

impl StageError {
    pub fn failed(message: impl Into<String>) -> Self {
        StageError::Failed(message.into())
    }
}

/// Errors raised by document sources and stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    /// The backing store could not be reached; counts toward job failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid document URI: {0}")]
    InvalidUri(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Error returned by a listener callback. Logged by the engine, never propagated.
#[derive(Error, Debug)]
#[error("Listener error: {0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        ListenerError(message.into())
    }
}
