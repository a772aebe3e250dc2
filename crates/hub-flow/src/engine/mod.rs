//! Flow execution engine

pub mod coordinator;
pub mod status;
pub mod worker;

use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{FlowError, Result};
use crate::listener::finished_outcome;
use crate::types::{JobState, JobStatus};

pub use coordinator::FlowCoordinator;
pub use status::StatusTracker;

/// Handle to a submitted job
#[derive(Clone)]
pub struct JobHandle {
    pub(crate) job_id: Uuid,
    pub(crate) tracker: Arc<StatusTracker>,
    pub(crate) stop: CancellationToken,
    pub(crate) done: watch::Receiver<Option<JobStatus>>,
}

impl JobHandle {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Current status snapshot
    pub fn status(&self) -> JobStatus {
        self.tracker.snapshot()
    }

    pub fn state(&self) -> JobState {
        self.tracker.state()
    }

    /// Stop fetching and dispatching. Documents already in flight complete,
    /// then the job finishes as `Stopped`.
    pub fn stop(&self) {
        if !self.stop.is_cancelled() {
            tracing::info!(job_id = %self.job_id, "Stop requested");
        }
        self.stop.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.done.borrow().is_some()
    }

    /// Wait for the final status. A failed job is returned as
    /// [`FlowError::StoreUnavailable`].
    pub async fn wait(&self) -> Result<JobStatus> {
        let mut done = self.done.clone();
        let status = done
            .wait_for(Option::is_some)
            .await
            .map_err(|_| FlowError::config("job task ended without reporting"))?
            .clone()
            .ok_or_else(|| FlowError::config("job finished without a status"))?;
        finished_outcome(status)
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("job_id", &self.job_id)
            .field("state", &self.state())
            .finish()
    }
}
