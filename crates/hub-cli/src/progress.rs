//! Progress reporting for flow jobs

use hub_flow::{JobListener, JobState, JobStatus, ListenerError};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner counting processed documents. The total is unknown while
/// the source is still being paged.
pub fn create_job_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg} {pos} documents ({per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Job listener that drives a progress spinner
pub struct ProgressListener {
    bar: ProgressBar,
}

impl ProgressListener {
    pub fn new(flow_name: &str) -> Self {
        Self {
            bar: create_job_spinner(flow_name),
        }
    }

    /// Listener around an existing bar
    pub fn with_bar(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

/// One-line summary of a status, e.g. `12 succeeded, 1 failed`
pub fn summary(status: &JobStatus) -> String {
    format!("{} succeeded, {} failed", status.succeeded, status.failed)
}

impl JobListener for ProgressListener {
    fn on_status_changed(&self, status: &JobStatus) -> Result<(), ListenerError> {
        self.bar.set_position(status.processed());
        if status.failed > 0 {
            self.bar.set_message(format!("{} ({} failed)", status.flow_name, status.failed));
        }
        Ok(())
    }

    fn on_finished(&self, status: &JobStatus) -> Result<(), ListenerError> {
        self.bar.set_position(status.processed());
        let verb = match status.state {
            JobState::Completed => "completed",
            JobState::Stopped => "stopped",
            JobState::Failed => "failed",
            JobState::Created | JobState::Running => "ended",
        };
        self.bar
            .finish_with_message(format!("{} {}: {}", status.flow_name, verb, summary(status)));
        Ok(())
    }
}
