//! Rhai script stages
//!
//! A script stage runs with two variables in scope:
//!
//! - `doc`: a map with `uri`, `content`, `format` and `collections`
//! - `ctx`: the [`StageContext`] as a map
//!
//! The script mutates `doc` in place. JSON content is exposed as native Rhai
//! maps and arrays, XML and text as a string, binary as a blob. Throwing fails
//! the document.
//!
//! ```rhai
//! doc.content.status = "harmonized";
//! doc.content.source = ctx.options.source;
//! doc.collections.push(ctx.flow_name);
//! ```

use rhai::{Dynamic, Engine, Scope, AST};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hub_common::types::DataFormat;

use super::StageContext;
use crate::error::{FlowError, StageError};
use crate::pipeline::panic_message;
use crate::types::Document;

/// A compiled Rhai stage module
pub struct ScriptStage {
    path: PathBuf,
    engine: Engine,
    ast: AST,
}

impl ScriptStage {
    /// Read and compile a script module
    pub fn load(path: &Path, max_operations: u64) -> Result<Self, FlowError> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            FlowError::config(format!("cannot read stage module {}: {}", path.display(), e))
        })?;
        Self::compile(path, &source, max_operations)
    }

    /// Compile a script from source. `path` is used only for reporting.
    pub fn compile(path: &Path, source: &str, max_operations: u64) -> Result<Self, FlowError> {
        let engine = script_engine(path, max_operations);
        let ast = engine.compile(source).map_err(|e| {
            FlowError::config(format!("stage module {} does not compile: {}", path.display(), e))
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            engine,
            ast,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run the script on a blocking thread
    pub async fn run(self: Arc<Self>, doc: Document, ctx: StageContext) -> Result<Document, StageError> {
        tokio::task::spawn_blocking(move || self.execute(doc, &ctx))
            .await
            .map_err(|e| {
                if e.is_panic() {
                    StageError::Panicked(panic_message(e.into_panic().as_ref()))
                } else {
                    StageError::failed("script task was cancelled")
                }
            })?
    }

    /// Run the script on the current thread
    pub fn execute(&self, doc: Document, ctx: &StageContext) -> Result<Document, StageError> {
        let ctx_value = rhai::serde::to_dynamic(ctx).map_err(script_error)?;
        let fallback_format = doc.format;

        let mut scope = Scope::new();
        scope.push("doc", document_to_dynamic(doc)?);
        scope.push("ctx", ctx_value);

        self.engine
            .run_ast_with_scope(&mut scope, &self.ast)
            .map_err(script_error)?;

        let doc = scope
            .get_value::<Dynamic>("doc")
            .ok_or_else(|| StageError::Script("script removed `doc` from scope".to_string()))?;
        document_from_dynamic(doc, fallback_format)
    }
}

fn script_engine(path: &Path, max_operations: u64) -> Engine {
    let mut engine = Engine::new();
    engine.set_max_operations(max_operations);

    let module = path.display().to_string();
    engine.on_print(move |text| tracing::info!(module = %module, "{}", text));
    let module = path.display().to_string();
    engine.on_debug(move |text, _source, pos| {
        tracing::debug!(module = %module, position = %pos, "{}", text)
    });
    engine
}

fn script_error(e: Box<rhai::EvalAltResult>) -> StageError {
    StageError::Script(e.to_string())
}

fn document_to_dynamic(doc: Document) -> Result<Dynamic, StageError> {
    let content = match doc.format {
        DataFormat::Json => rhai::serde::to_dynamic(doc.as_json()?).map_err(script_error)?,
        DataFormat::Xml | DataFormat::Text => Dynamic::from(doc.as_text()?.to_string()),
        DataFormat::Binary => Dynamic::from_blob(doc.content),
    };

    let collections: rhai::Array = doc.collections.into_iter().map(Dynamic::from).collect();

    let mut map = rhai::Map::new();
    map.insert("uri".into(), Dynamic::from(doc.uri));
    map.insert("content".into(), content);
    map.insert("format".into(), Dynamic::from(doc.format.as_str().to_string()));
    map.insert("collections".into(), Dynamic::from_array(collections));
    Ok(Dynamic::from_map(map))
}

fn document_from_dynamic(value: Dynamic, fallback_format: DataFormat) -> Result<Document, StageError> {
    let type_name = value.type_name();
    let mut map = value
        .try_cast::<rhai::Map>()
        .ok_or_else(|| StageError::Script(format!("`doc` must stay a map, found {type_name}")))?;

    let uri = map
        .remove("uri")
        .ok_or_else(|| StageError::Script("`doc.uri` is missing".to_string()))?
        .into_string()
        .map_err(|found| StageError::Script(format!("`doc.uri` must be a string, found {found}")))?;

    let format = match map.remove("format") {
        Some(format) => format
            .into_string()
            .map_err(|found| StageError::Script(format!("`doc.format` must be a string, found {found}")))?
            .parse::<DataFormat>()
            .map_err(|e| StageError::Script(e.to_string()))?,
        None => fallback_format,
    };

    let content = match map.remove("content") {
        Some(content) => content_bytes(content, format)?,
        None => Vec::new(),
    };

    let collections = match map.remove("collections") {
        Some(collections) => collections
            .into_array()
            .map_err(|found| {
                StageError::Script(format!("`doc.collections` must be an array, found {found}"))
            })?
            .into_iter()
            .map(|c| c.into_string().map_err(|found| {
                StageError::Script(format!("collection names must be strings, found {found}"))
            }))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(Document {
        uri,
        content,
        format,
        collections,
    })
}

fn content_bytes(content: Dynamic, format: DataFormat) -> Result<Vec<u8>, StageError> {
    let invalid = |message: String| StageError::InvalidContent {
        format: format.to_string(),
        message,
    };

    match format {
        DataFormat::Json => {
            let value: serde_json::Value = rhai::serde::from_dynamic(&content).map_err(script_error)?;
            serde_json::to_vec(&value).map_err(|e| invalid(e.to_string()))
        }
        DataFormat::Xml | DataFormat::Text => content
            .into_string()
            .map(String::into_bytes)
            .map_err(|found| invalid(format!("expected a string, found {found}"))),
        DataFormat::Binary => content
            .into_blob()
            .map_err(|found| invalid(format!("expected a blob, found {found}"))),
    }
}
