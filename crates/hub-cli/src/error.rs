//! Error types for the hub CLI
//!
//! Messages are user-facing and say what to check next.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check hub.toml and HUB_* environment variables.")]
    Config(String),

    /// hub.toml could not be parsed
    #[error("Invalid hub.toml: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Entity '{0}' not found. Run 'hub entities' to list the entities in this project.")]
    EntityNotFound(String),

    #[error("Flow '{flow}' ({flow_type}) not found for entity '{entity}'. Run 'hub flows {entity}' to list its flows.")]
    FlowNotFound {
        entity: String,
        flow_type: String,
        flow: String,
    },

    /// The job ended in the failed state
    #[error("Flow job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Timed out after {0} seconds waiting for the flow to finish")]
    Timeout(u64),

    #[error(transparent)]
    Flow(hub_flow::FlowError),

    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<hub_flow::FlowError> for CliError {
    fn from(err: hub_flow::FlowError) -> Self {
        use hub_flow::FlowError;

        match err {
            FlowError::EntityNotFound(entity) => CliError::EntityNotFound(entity),
            FlowError::FlowNotFound {
                entity,
                flow_type,
                flow,
            } => CliError::FlowNotFound {
                entity,
                flow_type,
                flow,
            },
            FlowError::StoreUnavailable { job_id, message } => CliError::JobFailed {
                job_id: job_id.to_string(),
                message,
            },
            FlowError::Timeout(elapsed) => CliError::Timeout(elapsed.as_secs()),
            other => CliError::Flow(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_flow::FlowError;

    #[test]
    fn test_not_found_maps_to_actionable_message() {
        let err: CliError = FlowError::EntityNotFound("customer".into()).into();
        assert!(err.to_string().contains("hub entities"));

        let err: CliError = FlowError::Timeout(std::time::Duration::from_secs(30)).into();
        assert!(matches!(err, CliError::Timeout(30)));
    }
}
