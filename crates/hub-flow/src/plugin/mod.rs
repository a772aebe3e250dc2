//! Stage plugins
//!
//! A stage is resolved by entity, flow and stage name through a
//! [`StagePluginStore`]. Resolution yields an [`Invocable`]: a compiled
//! [`Stage`], a Rhai [`ScriptStage`], or [`Invocable::Identity`] when nothing
//! implements the stage. A missing stage is a deliberate no-op, not an error.

pub mod fs;
pub mod registry;
pub mod script;

use async_trait::async_trait;
use hub_common::types::{DataFormat, FlowType};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{FlowError, StageError};
use crate::types::Document;

pub use fs::FsPluginStore;
pub use registry::StageRegistry;
pub use script::ScriptStage;

/// Run-scoped context passed explicitly to every stage invocation
#[derive(Debug, Clone, Serialize)]
pub struct StageContext {
    pub job_id: Uuid,
    pub entity_name: String,
    pub flow_name: String,
    pub flow_type: FlowType,
    pub data_format: DataFormat,
    /// Name of the stage being invoked
    pub stage_name: String,
    pub options: Arc<serde_json::Map<String, serde_json::Value>>,
}

impl StageContext {
    /// Same context, addressed to another stage
    pub fn for_stage(&self, stage_name: &str) -> Self {
        Self {
            stage_name: stage_name.to_string(),
            ..self.clone()
        }
    }
}

/// Identifies one stage of one flow for resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageKey<'a> {
    pub entity: &'a str,
    pub flow_type: FlowType,
    pub flow: &'a str,
    pub stage: &'a str,
}

impl std::fmt::Display for StageKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}/{}", self.entity, self.flow_type, self.flow, self.stage)
    }
}

/// A compiled pipeline stage
#[async_trait]
pub trait Stage: Send + Sync {
    async fn run(&self, doc: Document, ctx: &StageContext) -> Result<Document, StageError>;
}

/// Adapts a synchronous closure into a [`Stage`]
pub struct FnStage<F>(F);

/// Wrap a closure as a stage
///
/// ```
/// use hub_flow::plugin::{stage_fn, StageContext};
/// use hub_flow::{Document, StageError};
///
/// let upper = stage_fn(|mut doc: Document, _ctx: &StageContext| {
///     doc.content = doc.as_text()?.to_uppercase().into_bytes();
///     Ok::<_, StageError>(doc)
/// });
/// # let _ = upper;
/// ```
pub fn stage_fn<F>(f: F) -> FnStage<F>
where
    F: Fn(Document, &StageContext) -> Result<Document, StageError> + Send + Sync,
{
    FnStage(f)
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(Document, &StageContext) -> Result<Document, StageError> + Send + Sync,
{
    async fn run(&self, doc: Document, ctx: &StageContext) -> Result<Document, StageError> {
        (self.0)(doc, ctx)
    }
}

/// Resolved implementation of a stage, one variant per supported plugin kind
#[derive(Clone)]
pub enum Invocable {
    /// No implementation; the document passes through unchanged
    Identity,
    Native(Arc<dyn Stage>),
    Script(Arc<ScriptStage>),
}

impl Invocable {
    pub async fn invoke(&self, doc: Document, ctx: &StageContext) -> Result<Document, StageError> {
        match self {
            Invocable::Identity => Ok(doc),
            Invocable::Native(stage) => stage.run(doc, ctx).await,
            Invocable::Script(script) => Arc::clone(script).run(doc, ctx.clone()).await,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Invocable::Identity => "identity",
            Invocable::Native(_) => "native",
            Invocable::Script(_) => "script",
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Invocable::Identity)
    }
}

impl std::fmt::Debug for Invocable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Invocable::Script(script) => write!(f, "Script({})", script.path().display()),
            other => f.write_str(other.kind()),
        }
    }
}

/// Source of stage implementations
#[async_trait]
pub trait StagePluginStore: Send + Sync {
    /// Look up the implementation of a stage. `Ok(None)` means the stage is
    /// not implemented and acts as identity; `Err` means the stage exists but
    /// cannot be run.
    fn resolve(&self, key: StageKey<'_>) -> Result<Option<Invocable>, FlowError>;

    /// Invoke a resolved stage on one document
    async fn invoke(
        &self,
        stage: &Invocable,
        doc: Document,
        ctx: &StageContext,
    ) -> Result<Document, StageError> {
        stage.invoke(doc, ctx).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn context(stage: &str) -> StageContext {
        StageContext {
            job_id: Uuid::new_v4(),
            entity_name: "customer".to_string(),
            flow_name: "harmonize-customers".to_string(),
            flow_type: FlowType::Harmonize,
            data_format: DataFormat::Json,
            stage_name: stage.to_string(),
            options: Arc::new(serde_json::Map::new()),
        }
    }

    #[tokio::test]
    async fn test_identity_passes_document_through() {
        let doc = Document::new("/a.xml", "<a/>", DataFormat::Xml);
        let out = Invocable::Identity.invoke(doc.clone(), &context("content")).await.unwrap();
        assert_eq!(out, doc);
    }

    #[tokio::test]
    async fn test_fn_stage_sees_context() {
        let stage = stage_fn(|mut doc: Document, ctx: &StageContext| {
            doc.collections.push(format!("{}:{}", ctx.flow_name, ctx.stage_name));
            Ok(doc)
        });
        let invocable = Invocable::Native(Arc::new(stage));

        let doc = Document::new("/a.json", "{}", DataFormat::Json);
        let out = invocable.invoke(doc, &context("headers")).await.unwrap();
        assert_eq!(out.collections, vec!["harmonize-customers:headers"]);
        assert_eq!(invocable.kind(), "native");
    }
}
