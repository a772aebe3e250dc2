//! Common types used across the data hub

use serde::{Deserialize, Serialize};

use crate::error::HubError;

/// Kind of flow: ingestion into staging, or harmonization into final form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    /// Loads raw documents into the staging store
    Input,
    /// Converts staged documents into canonical form
    Harmonize,
}

impl FlowType {
    /// All flow types, in project layout order
    pub const ALL: [FlowType; 2] = [FlowType::Input, FlowType::Harmonize];

    /// Directory name used for this flow type in a project layout
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Input => "input",
            FlowType::Harmonize => "harmonize",
        }
    }
}

impl std::fmt::Display for FlowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FlowType {
    type Err = HubError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "input" => Ok(FlowType::Input),
            "harmonize" | "harmonise" => Ok(FlowType::Harmonize),
            _ => Err(HubError::InvalidFlowType(s.to_string())),
        }
    }
}

/// Payload format of the documents a flow handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Xml,
    #[default]
    Json,
    Text,
    Binary,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Xml => "xml",
            DataFormat::Json => "json",
            DataFormat::Text => "text",
            DataFormat::Binary => "binary",
        }
    }

    /// Guess the format from a file extension. Unknown extensions are binary.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "xml" => DataFormat::Xml,
            "json" => DataFormat::Json,
            "txt" | "text" | "csv" => DataFormat::Text,
            _ => DataFormat::Binary,
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataFormat {
    type Err = HubError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xml" | "application/xml" => Ok(DataFormat::Xml),
            "json" | "application/json" => Ok(DataFormat::Json),
            "text" | "txt" | "text/plain" => Ok(DataFormat::Text),
            "binary" | "application/octet-stream" => Ok(DataFormat::Binary),
            _ => Err(HubError::InvalidDataFormat(s.to_string())),
        }
    }
}

/// Format in which a flow's stage modules are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PluginFormat {
    Xquery,
    Javascript,
    /// Rhai scripts, executed in-process by the engine
    #[default]
    Rhai,
}

impl PluginFormat {
    /// All plugin formats, in module lookup order
    pub const ALL: [PluginFormat; 3] =
        [PluginFormat::Rhai, PluginFormat::Xquery, PluginFormat::Javascript];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginFormat::Xquery => "xquery",
            PluginFormat::Javascript => "javascript",
            PluginFormat::Rhai => "rhai",
        }
    }

    /// File extension of stage modules in this format
    pub fn extension(&self) -> &'static str {
        match self {
            PluginFormat::Xquery => "xqy",
            PluginFormat::Javascript => "sjs",
            PluginFormat::Rhai => "rhai",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "xqy" => Some(PluginFormat::Xquery),
            "sjs" => Some(PluginFormat::Javascript),
            "rhai" => Some(PluginFormat::Rhai),
            _ => None,
        }
    }

    /// Whether the engine can run modules of this format without a native binding
    pub fn is_executable(&self) -> bool {
        matches!(self, PluginFormat::Rhai)
    }
}

impl std::fmt::Display for PluginFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PluginFormat {
    type Err = HubError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xquery" | "xqy" => Ok(PluginFormat::Xquery),
            "javascript" | "sjs" | "js" => Ok(PluginFormat::Javascript),
            "rhai" => Ok(PluginFormat::Rhai),
            _ => Err(HubError::InvalidPluginFormat(s.to_string())),
        }
    }
}
