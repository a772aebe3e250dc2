//! Per-document processing
//!
//! A worker reads one document from the source, runs the pipeline over it,
//! writes the result to the destination and reports the outcome. Every
//! failure stays local to the document.

use futures::FutureExt;
use hub_common::types::FlowType;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::status::{Notifier, StatusTracker};
use crate::pipeline::{panic_message, Pipeline};
use crate::plugin::StageContext;
use crate::store::{DocumentSource, DocumentStore, StoreResult};
use crate::types::{DocumentFailure, FailureKind};

/// Failure of one document, and whether the store was unreachable
struct Failed {
    failure: DocumentFailure,
    store_unavailable: bool,
}

impl Failed {
    fn store(kind: FailureKind, message: String, store_unavailable: bool) -> Self {
        Self {
            failure: DocumentFailure {
                kind,
                stage: None,
                message,
            },
            store_unavailable,
        }
    }
}

/// Shared by every document task of one job
pub struct DocumentWorker {
    pub(super) flow_type: FlowType,
    pub(super) source: Arc<dyn DocumentSource>,
    pub(super) destination: Arc<dyn DocumentStore>,
    pub(super) pipeline: Pipeline,
    pub(super) context: StageContext,
    pub(super) tracker: Arc<StatusTracker>,
    pub(super) notifier: Notifier,
    /// Cancelled when the job can no longer continue
    pub(super) halt: CancellationToken,
}

impl DocumentWorker {
    /// Process one document and report its outcome
    pub async fn process(&self, uri: String) {
        let snapshot = match self.run_document(&uri).await {
            Ok(target) => {
                tracing::debug!(uri = %uri, target = %target, "Document processed");
                self.tracker.record_success()
            }
            Err(failed) => {
                tracing::warn!(
                    uri = %uri,
                    kind = ?failed.failure.kind,
                    stage = failed.failure.stage.as_deref().unwrap_or("-"),
                    error = %failed.failure.message,
                    "Document failed"
                );
                let message = failed.failure.to_string();
                let recorded = self
                    .tracker
                    .record_failure(&uri, failed.failure, failed.store_unavailable);

                if recorded.threshold_reached {
                    tracing::error!(
                        uri = %uri,
                        error = %message,
                        "Store unavailable for too many consecutive documents, failing job"
                    );
                    self.tracker.fail(format!(
                        "too many consecutive store-unavailable errors, last on {uri}: {message}"
                    ));
                    self.halt.cancel();
                }
                recorded.snapshot
            }
        };

        self.notifier.status_changed(&snapshot);
    }

    /// Returns the URI the result was written to
    async fn run_document(&self, uri: &str) -> Result<String, Failed> {
        let doc = store_call(async { self.source.fetch(uri).await })
            .await
            .map_err(|(message, unavailable)| Failed::store(FailureKind::Read, message, unavailable))?;

        let output = self
            .pipeline
            .run(doc, &self.context)
            .await
            .map_err(|failure| Failed {
                failure: DocumentFailure {
                    kind: FailureKind::Stage,
                    stage: Some(failure.stage),
                    message: failure.error.to_string(),
                },
                store_unavailable: false,
            })?;

        let target = match self.flow_type {
            FlowType::Harmonize => uri.to_string(),
            FlowType::Input => output.uri.clone(),
        };

        store_call(async { self.destination.write(&target, &output).await })
            .await
            .map_err(|(message, unavailable)| Failed::store(FailureKind::Write, message, unavailable))?;

        Ok(target)
    }
}

/// Await a store call, catching a panic as a plain failure. Callers pass
/// an `async` block so a panic raised while building the future is caught too.
async fn store_call<T, F>(call: F) -> Result<T, (String, bool)>
where
    F: Future<Output = StoreResult<T>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err((e.to_string(), e.is_unavailable())),
        Err(payload) => Err((format!("store panicked: {}", panic_message(payload.as_ref())), false)),
    }
}
