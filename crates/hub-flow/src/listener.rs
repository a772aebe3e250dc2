//! Job listeners
//!
//! The engine reports progress through [`JobListener`]. Status updates arrive
//! concurrently from workers and must return quickly. `on_finished` is the
//! last call a listener receives for a job and happens exactly once.
//!
//! Listener failures never affect the job: errors are logged and panics are
//! caught.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{FlowError, ListenerError, Result};
use crate::pipeline::panic_message;
use crate::types::{JobState, JobStatus};

/// Receives status notifications for a job
pub trait JobListener: Send + Sync {
    /// Called once when the listener is bound to a job, before the job starts
    fn attach(&self, _job_id: Uuid) -> Result<()> {
        Ok(())
    }

    fn on_status_changed(&self, status: &JobStatus) -> std::result::Result<(), ListenerError>;

    fn on_finished(&self, status: &JobStatus) -> std::result::Result<(), ListenerError>;
}

/// Run a listener callback, turning a panic into an error
pub(crate) fn guarded<F>(callback: F) -> std::result::Result<(), ListenerError>
where
    F: FnOnce() -> std::result::Result<(), ListenerError>,
{
    match std::panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(result) => result,
        Err(payload) => Err(ListenerError::new(format!(
            "listener panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

/// Map a terminal status to the outcome reported to waiters
pub(crate) fn finished_outcome(status: JobStatus) -> Result<JobStatus> {
    if status.state == JobState::Failed {
        return Err(FlowError::StoreUnavailable {
            job_id: status.job_id,
            message: status
                .fatal_error
                .unwrap_or_else(|| "job failed".to_string()),
        });
    }
    Ok(status)
}

#[derive(Default)]
struct Binding {
    job_id: Option<Uuid>,
    finished: Option<JobStatus>,
}

/// Listener that lets callers wait for a job to finish
pub struct JobFinishedListener {
    binding: Mutex<Binding>,
    finished_cv: Condvar,
    finished_tx: watch::Sender<Option<JobStatus>>,
}

impl Default for JobFinishedListener {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFinishedListener {
    pub fn new() -> Self {
        let (finished_tx, _) = watch::channel(None);
        Self {
            binding: Mutex::new(Binding::default()),
            finished_cv: Condvar::new(),
            finished_tx,
        }
    }

    pub fn job_id(&self) -> Option<Uuid> {
        self.lock().job_id
    }

    /// Final status if the job has finished, without waiting
    pub fn final_status(&self) -> Option<JobStatus> {
        self.lock().finished.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished.is_some()
    }

    /// Wait until the job finishes.
    ///
    /// Returns [`FlowError::Timeout`] when `timeout` elapses first and
    /// [`FlowError::StoreUnavailable`] when the job failed. Dropping the
    /// future abandons the wait; the job keeps running.
    pub async fn wait_for_finish(&self, timeout: Option<Duration>) -> Result<JobStatus> {
        let mut rx = self.finished_tx.subscribe();
        let wait = async move {
            rx.wait_for(Option::is_some)
                .await
                .map(|status| status.clone())
                .map_err(|_| FlowError::config("listener channel closed"))
        };

        let status = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| FlowError::Timeout(limit))??,
            None => wait.await?,
        };

        let status = status.ok_or_else(|| FlowError::config("job finished without a status"))?;
        finished_outcome(status)
    }

    /// Blocking form of [`wait_for_finish`](Self::wait_for_finish) for
    /// synchronous callers. Must not be called from a runtime worker thread.
    pub fn wait_for_finish_blocking(&self, timeout: Option<Duration>) -> Result<JobStatus> {
        let guard = self.lock();
        let guard = match timeout {
            Some(limit) => {
                let (guard, result) = self
                    .finished_cv
                    .wait_timeout_while(guard, limit, |b| b.finished.is_none())
                    .unwrap_or_else(|e| e.into_inner());
                if result.timed_out() && guard.finished.is_none() {
                    return Err(FlowError::Timeout(limit));
                }
                guard
            }
            None => self
                .finished_cv
                .wait_while(guard, |b| b.finished.is_none())
                .unwrap_or_else(|e| e.into_inner()),
        };

        let status = guard
            .finished
            .clone()
            .ok_or_else(|| FlowError::config("job finished without a status"))?;
        finished_outcome(status)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Binding> {
        self.binding.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl JobListener for JobFinishedListener {
    fn attach(&self, job_id: Uuid) -> Result<()> {
        let mut binding = self.lock();
        match binding.job_id {
            Some(bound) if bound != job_id => Err(FlowError::config(format!(
                "listener is already bound to job {bound}"
            ))),
            _ => {
                binding.job_id = Some(job_id);
                Ok(())
            }
        }
    }

    fn on_status_changed(&self, _status: &JobStatus) -> std::result::Result<(), ListenerError> {
        Ok(())
    }

    fn on_finished(&self, status: &JobStatus) -> std::result::Result<(), ListenerError> {
        {
            let mut binding = self.lock();
            binding.finished = Some(status.clone());
        }
        self.finished_cv.notify_all();
        self.finished_tx.send_replace(Some(status.clone()));
        Ok(())
    }
}

/// Listener that writes job progress to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl JobListener for LoggingListener {
    fn on_status_changed(&self, status: &JobStatus) -> std::result::Result<(), ListenerError> {
        debug!(
            job_id = %status.job_id,
            state = %status.state,
            succeeded = status.succeeded,
            failed = status.failed,
            in_flight = status.in_flight(),
            "Job progress"
        );
        Ok(())
    }

    fn on_finished(&self, status: &JobStatus) -> std::result::Result<(), ListenerError> {
        let elapsed_ms = status.elapsed().map(|d| d.num_milliseconds()).unwrap_or(0);
        if status.state == JobState::Failed {
            warn!(
                job_id = %status.job_id,
                flow = %status.flow_name,
                error = status.fatal_error.as_deref().unwrap_or("unknown"),
                succeeded = status.succeeded,
                failed = status.failed,
                "Job failed"
            );
        } else {
            info!(
                job_id = %status.job_id,
                flow = %status.flow_name,
                state = %status.state,
                succeeded = status.succeeded,
                failed = status.failed,
                elapsed_ms,
                "Job finished"
            );
        }
        Ok(())
    }
}

/// Fans notifications out to several listeners in order
#[derive(Default, Clone)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn JobListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: Arc<dyn JobListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn push(&mut self, listener: Arc<dyn JobListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    fn each<F>(&self, notify: F) -> std::result::Result<(), ListenerError>
    where
        F: Fn(&dyn JobListener) -> std::result::Result<(), ListenerError>,
    {
        let errors: Vec<String> = self
            .listeners
            .iter()
            .filter_map(|l| guarded(|| notify(l.as_ref())).err())
            .map(|e| e.0)
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ListenerError::new(errors.join("; ")))
        }
    }
}

impl JobListener for ListenerSet {
    fn attach(&self, job_id: Uuid) -> Result<()> {
        self.listeners.iter().try_for_each(|l| l.attach(job_id))
    }

    fn on_status_changed(&self, status: &JobStatus) -> std::result::Result<(), ListenerError> {
        self.each(|l| l.on_status_changed(status))
    }

    fn on_finished(&self, status: &JobStatus) -> std::result::Result<(), ListenerError> {
        self.each(|l| l.on_finished(status))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use hub_common::types::FlowType;

    fn finished(state: JobState) -> JobStatus {
        let mut status = JobStatus::new(Uuid::new_v4(), "f", "e", FlowType::Harmonize);
        status.state = state;
        status.finished = true;
        status
    }

    #[test]
    fn test_second_job_is_refused() {
        let listener = JobFinishedListener::new();
        let job = Uuid::new_v4();
        listener.attach(job).unwrap();
        listener.attach(job).unwrap();
        assert!(matches!(
            listener.attach(Uuid::new_v4()),
            Err(FlowError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_wait_returns_after_finish() {
        let listener = Arc::new(JobFinishedListener::new());
        let notifier = Arc::clone(&listener);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            notifier.on_finished(&finished(JobState::Completed)).unwrap();
        });

        let status = listener.wait_for_finish(Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert!(listener.final_status().is_some());
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let listener = JobFinishedListener::new();
        let result = listener.wait_for_finish(Some(Duration::from_millis(20))).await;
        assert!(matches!(result, Err(FlowError::Timeout(_))));
    }

    #[test]
    fn test_blocking_wait_reports_failure() {
        let listener = Arc::new(JobFinishedListener::new());
        let notifier = Arc::clone(&listener);
        let handle = std::thread::spawn(move || {
            let mut status = finished(JobState::Failed);
            status.fatal_error = Some("store down".to_string());
            notifier.on_finished(&status).unwrap();
        });

        let result = listener.wait_for_finish_blocking(Some(Duration::from_secs(5)));
        handle.join().unwrap();
        assert!(matches!(result, Err(FlowError::StoreUnavailable { ref message, .. }) if message == "store down"));
    }

    struct Panicking;

    impl JobListener for Panicking {
        fn on_status_changed(&self, _: &JobStatus) -> std::result::Result<(), ListenerError> {
            panic!("listener bug")
        }

        fn on_finished(&self, _: &JobStatus) -> std::result::Result<(), ListenerError> {
            Ok(())
        }
    }

    #[test]
    fn test_set_isolates_panicking_member() {
        let waiter = Arc::new(JobFinishedListener::new());
        let set = ListenerSet::new()
            .with(Arc::new(Panicking))
            .with(Arc::new(LoggingListener))
            .with(waiter.clone());

        let err = set.on_status_changed(&finished(JobState::Running)).unwrap_err();
        assert!(err.0.contains("listener bug"));

        set.on_finished(&finished(JobState::Completed)).unwrap();
        assert!(waiter.is_finished());
    }
}
