//! Flow resolution from a project directory
//!
//! Every call reads the project tree afresh; nothing is cached.

use hub_common::types::{DataFormat, FlowType, PluginFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FlowError, Result};
use crate::flow::{Flow, SourceSelector, StageLocation, StageRef, DEFAULT_STAGES};
use crate::layout::{subdirectories, ProjectLayout};

/// An entity and the flows defined for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub name: String,
    pub input_flows: Vec<Flow>,
    pub harmonize_flows: Vec<Flow>,
}

impl Entity {
    pub fn flows(&self, flow_type: FlowType) -> &[Flow] {
        match flow_type {
            FlowType::Input => &self.input_flows,
            FlowType::Harmonize => &self.harmonize_flows,
        }
    }
}

/// Contents of `flow.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FlowMetadata {
    data_format: Option<DataFormat>,
    plugin_format: Option<PluginFormat>,
    stages: Option<Vec<String>>,
    source: Option<SourceMetadata>,
    #[serde(default)]
    options: toml::Table,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceMetadata {
    collection: Option<String>,
    uri_prefix: Option<String>,
    uris: Option<Vec<String>>,
}

impl SourceMetadata {
    fn into_selector(self) -> std::result::Result<SourceSelector, String> {
        match (self.collection, self.uri_prefix, self.uris) {
            (None, None, None) => Ok(SourceSelector::All),
            (Some(collection), None, None) => Ok(SourceSelector::Collection(collection)),
            (None, Some(prefix), None) => Ok(SourceSelector::UriPrefix(prefix)),
            (None, None, Some(uris)) => Ok(SourceSelector::Uris(uris)),
            _ => Err("[source] takes only one of collection, uri_prefix or uris".to_string()),
        }
    }
}

/// Locates entities and flows by naming convention under a project directory
#[derive(Debug, Clone)]
pub struct FlowResolver {
    layout: ProjectLayout,
}

impl FlowResolver {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: ProjectLayout::new(project_dir),
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Sorted entity names
    pub fn list_entities(&self) -> Result<Vec<String>> {
        Ok(subdirectories(&self.layout.entities_dir())?)
    }

    pub fn get_entity(&self, name: &str) -> Result<Entity> {
        self.require_entity(name)?;
        Ok(Entity {
            name: name.to_string(),
            input_flows: self.list_flows(name, FlowType::Input)?,
            harmonize_flows: self.list_flows(name, FlowType::Harmonize)?,
        })
    }

    /// Flows of one type for an entity, sorted by name
    pub fn list_flows(&self, entity: &str, flow_type: FlowType) -> Result<Vec<Flow>> {
        self.require_entity(entity)?;
        subdirectories(&self.layout.flow_type_dir(entity, flow_type))?
            .into_iter()
            .map(|name| self.load_flow(entity, &name, flow_type))
            .collect()
    }

    pub fn get_flow(&self, entity: &str, name: &str, flow_type: FlowType) -> Result<Flow> {
        self.require_entity(entity)?;
        if !is_plain_name(name) || !self.layout.flow_dir(entity, flow_type, name).is_dir() {
            return Err(FlowError::FlowNotFound {
                entity: entity.to_string(),
                flow_type: flow_type.to_string(),
                flow: name.to_string(),
            });
        }
        self.load_flow(entity, name, flow_type)
    }

    fn require_entity(&self, entity: &str) -> Result<()> {
        if is_plain_name(entity) && self.layout.entity_dir(entity).is_dir() {
            Ok(())
        } else {
            Err(FlowError::EntityNotFound(entity.to_string()))
        }
    }

    fn load_flow(&self, entity: &str, name: &str, flow_type: FlowType) -> Result<Flow> {
        let metadata_path = self.layout.flow_metadata(entity, flow_type, name);
        let metadata = read_metadata(&metadata_path)?;
        let invalid = |message: String| FlowError::InvalidMetadata {
            path: metadata_path.display().to_string(),
            message,
        };

        let stage_names = match metadata.stages {
            Some(stages) if stages.is_empty() => return Err(invalid("stages must not be empty".to_string())),
            Some(stages) => stages,
            None => DEFAULT_STAGES.iter().map(|s| s.to_string()).collect(),
        };
        if let Some(stage) = stage_names.iter().find(|stage| !is_plain_name(stage)) {
            return Err(invalid(format!("invalid stage name '{stage}'")));
        }

        let stages: Vec<StageRef> = stage_names
            .into_iter()
            .map(|stage| {
                let location = self
                    .layout
                    .find_stage_module(entity, flow_type, name, &stage)
                    .map(|(path, format)| StageLocation::Module { path, format });
                StageRef {
                    name: stage,
                    location,
                }
            })
            .collect();

        let plugin_format = metadata.plugin_format.unwrap_or_else(|| {
            stages
                .iter()
                .find_map(|s| match &s.location {
                    Some(StageLocation::Module { format, .. }) => Some(*format),
                    _ => None,
                })
                .unwrap_or_default()
        });

        let selector = metadata
            .source
            .map(SourceMetadata::into_selector)
            .transpose()
            .map_err(invalid)?
            .unwrap_or_default();

        let options = match serde_json::to_value(&metadata.options) {
            Ok(serde_json::Value::Object(map)) => map,
            Ok(_) => serde_json::Map::new(),
            Err(e) => return Err(invalid(format!("options: {e}"))),
        };

        Ok(Flow {
            name: name.to_string(),
            entity_name: entity.to_string(),
            flow_type,
            data_format: metadata.data_format.unwrap_or_default(),
            plugin_format,
            stages,
            selector,
            options,
        })
    }
}

fn read_metadata(path: &Path) -> Result<FlowMetadata> {
    if !path.is_file() {
        return Ok(FlowMetadata::default());
    }
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|e| FlowError::InvalidMetadata {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// A single directory name, not a path
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_source_metadata_is_exclusive() {
        let both = SourceMetadata {
            collection: Some("a".into()),
            uri_prefix: Some("/a/".into()),
            uris: None,
        };
        assert!(both.into_selector().is_err());
        assert_eq!(SourceMetadata::default().into_selector().unwrap(), SourceSelector::All);
    }

    #[test]
    fn test_plain_names() {
        assert!(is_plain_name("customer"));
        assert!(!is_plain_name(".."));
        assert!(!is_plain_name("a/b"));
        assert!(!is_plain_name(""));
    }
}
