//! Flow definitions
//!
//! A [`Flow`] binds an ordered list of named stages to an entity, a flow type
//! and a data format. Flows are immutable once loaded and are shared with the
//! running job as `Arc<Flow>`.

use hub_common::types::{DataFormat, FlowType, PluginFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stage names used when a flow does not list its own
pub const DEFAULT_STAGES: [&str; 3] = ["content", "headers", "triples"];

/// Which documents a flow acts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceSelector {
    /// Every document in the source store
    #[default]
    All,
    /// Documents belonging to a collection
    Collection(String),
    /// Documents whose URI starts with a prefix
    UriPrefix(String),
    /// An explicit list of URIs, processed in the given order
    Uris(Vec<String>),
}

impl SourceSelector {
    /// Whether a stored document is selected
    pub fn matches(&self, uri: &str, collections: &[String]) -> bool {
        match self {
            SourceSelector::All => true,
            SourceSelector::Collection(name) => collections.iter().any(|c| c == name),
            SourceSelector::UriPrefix(prefix) => uri.starts_with(prefix.as_str()),
            SourceSelector::Uris(uris) => uris.iter().any(|u| u == uri),
        }
    }
}

impl std::fmt::Display for SourceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceSelector::All => write!(f, "all documents"),
            SourceSelector::Collection(name) => write!(f, "collection '{name}'"),
            SourceSelector::UriPrefix(prefix) => write!(f, "uris under '{prefix}'"),
            SourceSelector::Uris(uris) => write!(f, "{} explicit uris", uris.len()),
        }
    }
}

/// Where a stage's implementation was found when the flow was resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageLocation {
    /// A module file in the project's plugin tree
    Module { path: PathBuf, format: PluginFormat },
}

/// A named stage of a flow. No location means the stage is an identity no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRef {
    pub name: String,
    pub location: Option<StageLocation>,
}

impl StageRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.location.is_none()
    }
}

/// A named, typed pipeline binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    pub entity_name: String,
    pub flow_type: FlowType,
    pub data_format: DataFormat,
    pub plugin_format: PluginFormat,
    pub stages: Vec<StageRef>,
    pub selector: SourceSelector,
    /// Free-form options handed to every stage invocation
    pub options: serde_json::Map<String, serde_json::Value>,
}

impl Flow {
    pub fn builder(
        entity_name: impl Into<String>,
        name: impl Into<String>,
        flow_type: FlowType,
    ) -> FlowBuilder {
        FlowBuilder {
            flow: Flow {
                name: name.into(),
                entity_name: entity_name.into(),
                flow_type,
                data_format: DataFormat::default(),
                plugin_format: PluginFormat::default(),
                stages: Vec::new(),
                selector: SourceSelector::default(),
                options: serde_json::Map::new(),
            },
        }
    }

    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }

    /// "entity/type/name", used in logs
    pub fn qualified_name(&self) -> String {
        format!("{}/{}/{}", self.entity_name, self.flow_type, self.name)
    }
}

/// Builder for flows defined in code rather than on disk
pub struct FlowBuilder {
    flow: Flow,
}

impl FlowBuilder {
    pub fn data_format(mut self, format: DataFormat) -> Self {
        self.flow.data_format = format;
        self
    }

    pub fn plugin_format(mut self, format: PluginFormat) -> Self {
        self.flow.plugin_format = format;
        self
    }

    pub fn stage(mut self, name: impl Into<String>) -> Self {
        self.flow.stages.push(StageRef::new(name));
        self
    }

    pub fn stages<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flow.stages.extend(names.into_iter().map(StageRef::new));
        self
    }

    pub fn stage_ref(mut self, stage: StageRef) -> Self {
        self.flow.stages.push(stage);
        self
    }

    pub fn selector(mut self, selector: SourceSelector) -> Self {
        self.flow.selector = selector;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.flow.options.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Flow {
        self.flow
    }
}
