//! Project directory layout
//!
//! ```text
//! <project>/plugins/entities/<entity>/<input|harmonize>/<flow>/flow.toml
//! <project>/plugins/entities/<entity>/<input|harmonize>/<flow>/<stage>/<stage>.<xqy|sjs|rhai>
//! ```

use hub_common::types::{FlowType, PluginFormat};
use std::path::{Path, PathBuf};

/// File holding a flow's metadata, inside the flow directory
pub const FLOW_METADATA_FILE: &str = "flow.toml";

/// Paths of a hub project on disk
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entities_dir(&self) -> PathBuf {
        self.root.join("plugins").join("entities")
    }

    pub fn entity_dir(&self, entity: &str) -> PathBuf {
        self.entities_dir().join(entity)
    }

    pub fn flow_type_dir(&self, entity: &str, flow_type: FlowType) -> PathBuf {
        self.entity_dir(entity).join(flow_type.as_str())
    }

    pub fn flow_dir(&self, entity: &str, flow_type: FlowType, flow: &str) -> PathBuf {
        self.flow_type_dir(entity, flow_type).join(flow)
    }

    pub fn flow_metadata(&self, entity: &str, flow_type: FlowType, flow: &str) -> PathBuf {
        self.flow_dir(entity, flow_type, flow).join(FLOW_METADATA_FILE)
    }

    pub fn stage_module(
        &self,
        entity: &str,
        flow_type: FlowType,
        flow: &str,
        stage: &str,
        format: PluginFormat,
    ) -> PathBuf {
        self.flow_dir(entity, flow_type, flow)
            .join(stage)
            .join(format!("{}.{}", stage, format.extension()))
    }

    /// First stage module present on disk, checking formats in
    /// [`PluginFormat::ALL`] order
    pub fn find_stage_module(
        &self,
        entity: &str,
        flow_type: FlowType,
        flow: &str,
        stage: &str,
    ) -> Option<(PathBuf, PluginFormat)> {
        PluginFormat::ALL.iter().find_map(|format| {
            let path = self.stage_module(entity, flow_type, flow, stage, *format);
            path.is_file().then_some((path, *format))
        })
    }
}

/// Sorted names of the subdirectories of `dir`; empty when `dir` is missing
pub(crate) fn subdirectories(dir: &Path) -> std::io::Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
    }
    names.sort();
    Ok(names)
}
