//! Job status aggregation and listener notification

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::listener::{guarded, JobListener};
use crate::types::{DocumentFailure, JobState, JobStatus};

struct Tracked {
    status: JobStatus,
    consecutive_unavailable: u32,
}

/// Single owner of a job's mutable status. Every counter update happens under
/// one lock, and callers receive a snapshot taken under that same lock.
pub struct StatusTracker {
    inner: Mutex<Tracked>,
    unavailable_threshold: u32,
}

/// Result of recording a document failure
pub struct FailureRecorded {
    pub snapshot: JobStatus,
    /// The consecutive store-unavailable threshold was reached
    pub threshold_reached: bool,
}

impl StatusTracker {
    pub fn new(status: JobStatus, unavailable_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Tracked {
                status,
                consecutive_unavailable: 0,
            }),
            unavailable_threshold,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Tracked> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> JobStatus {
        self.lock().status.clone()
    }

    pub fn state(&self) -> JobState {
        self.lock().status.state
    }

    /// Count a dispatched document. Returns true on the transition to `Running`.
    pub fn mark_dispatched(&self) -> bool {
        let mut tracked = self.lock();
        tracked.status.total_dispatched += 1;
        if tracked.status.state == JobState::Created {
            tracked.status.state = JobState::Running;
            tracked.status.started_at = Some(Utc::now());
            return true;
        }
        false
    }

    pub fn record_success(&self) -> JobStatus {
        let mut tracked = self.lock();
        tracked.status.succeeded += 1;
        tracked.consecutive_unavailable = 0;
        tracked.status.clone()
    }

    pub fn record_failure(&self, uri: &str, failure: DocumentFailure, store_unavailable: bool) -> FailureRecorded {
        let mut tracked = self.lock();
        tracked.status.failed += 1;
        tracked.status.errors_by_uri.insert(uri.to_string(), failure);

        if store_unavailable {
            tracked.consecutive_unavailable += 1;
        } else {
            tracked.consecutive_unavailable = 0;
        }

        FailureRecorded {
            snapshot: tracked.status.clone(),
            threshold_reached: store_unavailable
                && tracked.consecutive_unavailable >= self.unavailable_threshold,
        }
    }

    /// Record the reason the job cannot continue. The first reason wins.
    pub fn fail(&self, reason: impl Into<String>) {
        let mut tracked = self.lock();
        if tracked.status.fatal_error.is_none() && !tracked.status.finished {
            tracked.status.fatal_error = Some(reason.into());
        }
    }

    /// Move the job to its terminal state. Only the first call has an effect.
    pub fn finish(&self, stopped: bool) -> JobStatus {
        let mut tracked = self.lock();
        if !tracked.status.finished {
            tracked.status.state = if tracked.status.fatal_error.is_some() {
                JobState::Failed
            } else if stopped {
                JobState::Stopped
            } else {
                JobState::Completed
            };
            tracked.status.finished = true;
            tracked.status.finished_at = Some(Utc::now());
        }
        tracked.status.clone()
    }
}

/// Delivers snapshots to the job's listener without letting it affect the job
#[derive(Clone)]
pub struct Notifier {
    listener: Arc<dyn JobListener>,
    warn_after: Duration,
}

impl Notifier {
    pub fn new(listener: Arc<dyn JobListener>, warn_after: Duration) -> Self {
        Self {
            listener,
            warn_after,
        }
    }

    pub fn status_changed(&self, status: &JobStatus) {
        self.deliver("on_status_changed", || self.listener.on_status_changed(status));
    }

    pub fn finished(&self, status: &JobStatus) {
        self.deliver("on_finished", || self.listener.on_finished(status));
    }

    fn deliver<F>(&self, callback: &'static str, notify: F)
    where
        F: FnOnce() -> Result<(), crate::error::ListenerError>,
    {
        let started = Instant::now();
        if let Err(e) = guarded(notify) {
            tracing::warn!(callback, error = %e, "Listener callback failed");
        }

        let elapsed = started.elapsed();
        if elapsed > self.warn_after {
            tracing::warn!(
                callback,
                elapsed_ms = elapsed.as_millis() as u64,
                budget_ms = self.warn_after.as_millis() as u64,
                "Slow listener callback"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::FailureKind;
    use hub_common::types::FlowType;
    use uuid::Uuid;

    fn tracker(threshold: u32) -> StatusTracker {
        StatusTracker::new(JobStatus::new(Uuid::new_v4(), "f", "e", FlowType::Harmonize), threshold)
    }

    fn write_failure() -> DocumentFailure {
        DocumentFailure {
            kind: FailureKind::Write,
            stage: None,
            message: "down".to_string(),
        }
    }

    #[test]
    fn test_first_dispatch_starts_job() {
        let tracker = tracker(3);
        assert!(tracker.mark_dispatched());
        assert!(!tracker.mark_dispatched());
        let status = tracker.snapshot();
        assert_eq!(status.state, JobState::Running);
        assert_eq!(status.total_dispatched, 2);
        assert!(status.started_at.is_some());
    }

    #[test]
    fn test_consecutive_unavailable_reset_by_success() {
        let tracker = tracker(2);
        assert!(!tracker.record_failure("/a", write_failure(), true).threshold_reached);
        tracker.record_success();
        assert!(!tracker.record_failure("/b", write_failure(), true).threshold_reached);
        assert!(tracker.record_failure("/c", write_failure(), true).threshold_reached);
    }

    #[test]
    fn test_finish_is_applied_once() {
        let tracker = tracker(1);
        tracker.mark_dispatched();
        let first = tracker.finish(true);
        assert_eq!(first.state, JobState::Stopped);
        assert!(first.finished);

        tracker.fail("late");
        let second = tracker.finish(false);
        assert_eq!(second.state, JobState::Stopped);
        assert_eq!(second.fatal_error, None);
        assert_eq!(second.finished_at, first.finished_at);
    }

    #[test]
    fn test_fatal_error_wins_over_stop() {
        let tracker = tracker(1);
        tracker.fail("paging failed");
        tracker.fail("second reason");
        let status = tracker.finish(true);
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.fatal_error.as_deref(), Some("paging failed"));
    }
}
