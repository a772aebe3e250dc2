//! Flow job coordinator
//!
//! Drives a batch job:
//! 1. Page the document source, `batch_size` URIs at a time
//! 2. Dispatch each URI to a worker task, at most `thread_count` in flight
//! 3. Drain in-flight documents, settle the terminal state, notify the listener

use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::status::{Notifier, StatusTracker};
use super::worker::DocumentWorker;
use super::JobHandle;
use crate::config::{BatchConfig, EngineConfig};
use crate::error::{FlowError, Result};
use crate::flow::Flow;
use crate::listener::JobListener;
use crate::pipeline::Pipeline;
use crate::plugin::{StageContext, StagePluginStore};
use crate::store::{Cursor, DocumentSource, DocumentStore, SelectedSource};
use crate::types::JobStatus;

/// Submits flows as batch jobs on the current tokio runtime
pub struct FlowCoordinator {
    source_store: Arc<dyn DocumentStore>,
    destination: Arc<dyn DocumentStore>,
    plugins: Arc<dyn StagePluginStore>,
    config: EngineConfig,
}

impl FlowCoordinator {
    pub fn new(
        source_store: Arc<dyn DocumentStore>,
        destination: Arc<dyn DocumentStore>,
        plugins: Arc<dyn StagePluginStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            source_store,
            destination,
            plugins,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a flow over the documents its selector picks from the source store
    pub fn run_flow(
        &self,
        flow: impl Into<Arc<Flow>>,
        batch_size: usize,
        thread_count: usize,
        listener: Arc<dyn JobListener>,
    ) -> Result<JobHandle> {
        let flow = flow.into();
        let source = Arc::new(SelectedSource::new(
            Arc::clone(&self.source_store),
            flow.selector.clone(),
        ));
        self.run_flow_with_source(flow, source, batch_size, thread_count, listener)
    }

    /// Run a flow over an explicit document source.
    ///
    /// Returns once the job is submitted. Invalid parameters, unrunnable
    /// stages and a refusing listener are reported here, before any document
    /// is dispatched.
    pub fn run_flow_with_source(
        &self,
        flow: impl Into<Arc<Flow>>,
        source: Arc<dyn DocumentSource>,
        batch_size: usize,
        thread_count: usize,
        listener: Arc<dyn JobListener>,
    ) -> Result<JobHandle> {
        let flow = flow.into();
        let batch = BatchConfig::new(batch_size, thread_count)?;
        self.config.validate()?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| FlowError::config("flows must be submitted from within a tokio runtime"))?;

        let pipeline = Pipeline::bind(&flow, Arc::clone(&self.plugins))?;

        let job_id = Uuid::new_v4();
        listener.attach(job_id)?;

        let tracker = Arc::new(StatusTracker::new(
            JobStatus::new(job_id, &flow.name, &flow.entity_name, flow.flow_type),
            self.config.write_failure_threshold,
        ));
        let notifier = Notifier::new(listener, self.config.listener_warn_after());
        let stop = CancellationToken::new();
        let halt = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(None);

        let worker = Arc::new(DocumentWorker {
            flow_type: flow.flow_type,
            source: Arc::clone(&source),
            destination: Arc::clone(&self.destination),
            pipeline,
            context: StageContext {
                job_id,
                entity_name: flow.entity_name.clone(),
                flow_name: flow.name.clone(),
                flow_type: flow.flow_type,
                data_format: flow.data_format,
                stage_name: String::new(),
                options: Arc::new(flow.options.clone()),
            },
            tracker: Arc::clone(&tracker),
            notifier: notifier.clone(),
            halt: halt.clone(),
        });

        let job = BatchJob {
            batch,
            source,
            worker,
            tracker: Arc::clone(&tracker),
            notifier,
            stop: stop.clone(),
            halt,
        };

        let span = tracing::info_span!(
            "flow_job",
            job_id = %job_id,
            flow = %flow.name,
            entity = %flow.entity_name,
            flow_type = %flow.flow_type,
        );
        runtime.spawn(
            async move {
                let status = job.drive().await;
                done_tx.send_replace(Some(status));
            }
            .instrument(span),
        );

        tracing::info!(
            job_id = %job_id,
            flow = %flow.qualified_name(),
            batch_size,
            thread_count,
            "Flow job submitted"
        );

        Ok(JobHandle {
            job_id,
            tracker,
            stop,
            done: done_rx,
        })
    }
}

/// State owned by the dispatch loop of one job
struct BatchJob {
    batch: BatchConfig,
    source: Arc<dyn DocumentSource>,
    worker: Arc<DocumentWorker>,
    tracker: Arc<StatusTracker>,
    notifier: Notifier,
    stop: CancellationToken,
    halt: CancellationToken,
}

impl BatchJob {
    async fn drive(self) -> JobStatus {
        tracing::info!(
            batch_size = self.batch.batch_size,
            thread_count = self.batch.thread_count,
            stages = ?self.worker.pipeline.describe(),
            "Starting flow job"
        );

        let stopped = self.dispatch_all().await;

        let status = self.tracker.finish(stopped);
        self.notifier.status_changed(&status);
        self.notifier.finished(&status);

        match status.fatal_error.as_deref() {
            Some(reason) => tracing::error!(
                state = %status.state,
                succeeded = status.succeeded,
                failed = status.failed,
                error = reason,
                "Flow job failed"
            ),
            None => tracing::info!(
                state = %status.state,
                succeeded = status.succeeded,
                failed = status.failed,
                "Flow job finished"
            ),
        }
        status
    }

    /// Page and dispatch until the source is exhausted, the job is stopped, or
    /// it is halted. Waits for every dispatched document. Returns whether the
    /// caller's stop cut the job short.
    async fn dispatch_all(&self) -> bool {
        let semaphore = Arc::new(Semaphore::new(self.batch.thread_count));
        let mut tasks = JoinSet::new();
        let mut cursor = Cursor::start();
        let mut stopped = false;

        'paging: loop {
            if self.stop.is_cancelled() {
                stopped = true;
                break;
            }
            if self.halt.is_cancelled() {
                break;
            }

            let page = match self.source.next_page(cursor, self.batch.batch_size).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(offset = cursor.offset, error = %e, "Source paging failed");
                    self.tracker.fail(format!("source paging failed at offset {}: {}", cursor.offset, e));
                    break;
                }
            };
            tracing::debug!(offset = cursor.offset, uris = page.uris.len(), "Fetched page");

            for uri in page.uris {
                let permit = tokio::select! {
                    biased;
                    _ = self.stop.cancelled() => {
                        stopped = true;
                        break 'paging;
                    }
                    _ = self.halt.cancelled() => break 'paging,
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break 'paging,
                    },
                };

                if self.tracker.mark_dispatched() {
                    tracing::info!("Flow job running");
                }

                let worker = Arc::clone(&self.worker);
                tasks.spawn(
                    async move {
                        let _permit = permit;
                        worker.process(uri).await;
                    }
                    .in_current_span(),
                );

                while let Some(joined) = tasks.try_join_next() {
                    log_join_error(joined);
                }
            }

            if !page.has_more {
                break;
            }
            cursor = page.next_cursor;
        }

        if stopped {
            tracing::info!(in_flight = tasks.len(), "Stop requested, draining in-flight documents");
        }
        while let Some(joined) = tasks.join_next().await {
            log_join_error(joined);
        }
        stopped
    }
}

fn log_join_error(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Document task did not complete");
    }
}
