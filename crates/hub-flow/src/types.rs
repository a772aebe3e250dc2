//! Core types shared by the engine, stores and listeners

use chrono::{DateTime, Utc};
use hub_common::checksum::content_checksum;
use hub_common::types::{DataFormat, FlowType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::StageError;

/// A document flowing through a pipeline. Content is an opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub uri: String,
    pub content: Vec<u8>,
    pub format: DataFormat,
    #[serde(default)]
    pub collections: Vec<String>,
}

impl Document {
    pub fn new(uri: impl Into<String>, content: impl Into<Vec<u8>>, format: DataFormat) -> Self {
        Self {
            uri: uri.into(),
            content: content.into(),
            format,
            collections: Vec::new(),
        }
    }

    /// Build a JSON document from a value
    pub fn from_json(uri: impl Into<String>, value: &serde_json::Value) -> serde_json::Result<Self> {
        Ok(Self::new(uri, serde_json::to_vec(value)?, DataFormat::Json))
    }

    pub fn with_collections<I, S>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections = collections.into_iter().map(Into::into).collect();
        self
    }

    pub fn in_collection(&self, collection: &str) -> bool {
        self.collections.iter().any(|c| c == collection)
    }

    /// Parse the content as JSON
    pub fn as_json(&self) -> Result<serde_json::Value, StageError> {
        serde_json::from_slice(&self.content).map_err(|e| StageError::InvalidContent {
            format: self.format.to_string(),
            message: e.to_string(),
        })
    }

    /// View the content as UTF-8 text
    pub fn as_text(&self) -> Result<&str, StageError> {
        std::str::from_utf8(&self.content).map_err(|e| StageError::InvalidContent {
            format: self.format.to_string(),
            message: e.to_string(),
        })
    }

    /// SHA-256 of the content, hex encoded
    pub fn checksum(&self) -> String {
        content_checksum(&self.content)
    }
}

/// Lifecycle state of a batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Stopped)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where in the per-document path a failure happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Reading the source document
    Read,
    /// A pipeline stage
    Stage,
    /// Writing the result to the destination
    Write,
}

/// Error detail recorded against a document URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub kind: FailureKind,
    /// Stage that failed, for `FailureKind::Stage`
    pub stage: Option<String>,
    pub message: String,
}

impl std::fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.stage) {
            (FailureKind::Stage, Some(stage)) => write!(f, "stage '{}': {}", stage, self.message),
            (FailureKind::Read, _) => write!(f, "read: {}", self.message),
            (FailureKind::Write, _) => write!(f, "write: {}", self.message),
            (FailureKind::Stage, None) => write!(f, "stage: {}", self.message),
        }
    }
}

/// Snapshot of a job's progress, as seen by listeners and pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: Uuid,
    pub flow_name: String,
    pub entity_name: String,
    pub flow_type: FlowType,
    pub state: JobState,
    pub total_dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub errors_by_uri: BTreeMap<String, DocumentFailure>,
    pub finished: bool,
    /// Reason the job reached `Failed`
    pub fatal_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobStatus {
    pub fn new(job_id: Uuid, flow_name: &str, entity_name: &str, flow_type: FlowType) -> Self {
        Self {
            job_id,
            flow_name: flow_name.to_string(),
            entity_name: entity_name.to_string(),
            flow_type,
            state: JobState::Created,
            total_dispatched: 0,
            succeeded: 0,
            failed: 0,
            errors_by_uri: BTreeMap::new(),
            finished: false,
            fatal_error: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Documents that have reported an outcome
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Documents dispatched but not yet reported
    pub fn in_flight(&self) -> u64 {
        self.total_dispatched.saturating_sub(self.processed())
    }

    /// Wall-clock duration of the job, once it has started
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        let start = self.started_at?;
        Some(self.finished_at.unwrap_or_else(Utc::now) - start)
    }
}
