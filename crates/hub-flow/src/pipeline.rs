//! Bound stage pipeline
//!
//! Stages are resolved once, when a job is submitted, so an unrunnable stage
//! module is reported before any document is touched.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

use crate::error::{FlowError, Result, StageError};
use crate::flow::Flow;
use crate::plugin::{Invocable, StageContext, StageKey, StagePluginStore};
use crate::types::Document;

/// A stage failure together with the name of the stage that raised it
#[derive(Debug, Clone)]
pub struct PipelineFailure {
    pub stage: String,
    pub error: StageError,
}

/// The ordered, resolved stages of one flow
pub struct Pipeline {
    stages: Vec<(String, Invocable)>,
    plugins: Arc<dyn StagePluginStore>,
}

impl Pipeline {
    /// Resolve every stage of a flow against a plugin store
    pub fn bind(flow: &Flow, plugins: Arc<dyn StagePluginStore>) -> Result<Self> {
        let mut stages = Vec::with_capacity(flow.stages.len());

        for stage in &flow.stages {
            let key = StageKey {
                entity: &flow.entity_name,
                flow_type: flow.flow_type,
                flow: &flow.name,
                stage: &stage.name,
            };
            let invocable = plugins
                .resolve(key)
                .map_err(|e| match e {
                    e @ FlowError::Configuration(_) => e,
                    other => FlowError::config(format!("cannot resolve stage {key}: {other}")),
                })?
                .unwrap_or(Invocable::Identity);

            debug!(stage = %stage.name, kind = invocable.kind(), "Bound stage");
            stages.push((stage.name.clone(), invocable));
        }

        Ok(Self { stages, plugins })
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Names and kinds of the bound stages, in order
    pub fn describe(&self) -> Vec<(&str, &'static str)> {
        self.stages
            .iter()
            .map(|(name, invocable)| (name.as_str(), invocable.kind()))
            .collect()
    }

    /// Thread a document through every stage in declared order
    pub async fn run(
        &self,
        mut doc: Document,
        ctx: &StageContext,
    ) -> std::result::Result<Document, PipelineFailure> {
        for (name, invocable) in &self.stages {
            if invocable.is_identity() {
                continue;
            }

            let stage_ctx = ctx.for_stage(name);
            let outcome = AssertUnwindSafe(self.plugins.invoke(invocable, doc, &stage_ctx))
                .catch_unwind()
                .await;

            doc = match outcome {
                Ok(Ok(next)) => next,
                Ok(Err(error)) => {
                    return Err(PipelineFailure {
                        stage: name.clone(),
                        error,
                    })
                }
                Err(payload) => {
                    return Err(PipelineFailure {
                        stage: name.clone(),
                        error: StageError::Panicked(panic_message(payload.as_ref())),
                    })
                }
            };
        }
        Ok(doc)
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
