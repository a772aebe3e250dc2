//! Plugin store backed by a project's plugin tree

use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::{Invocable, ScriptStage, StageKey, StagePluginStore, StageRegistry};
use crate::config::DEFAULT_SCRIPT_MAX_OPERATIONS;
use crate::error::FlowError;
use crate::layout::ProjectLayout;

/// Resolves stages from compiled bindings first, then from module files.
///
/// Rhai modules are compiled on resolution. XQuery and JavaScript modules can
/// only run through a registered binding; finding one without a binding is a
/// configuration error.
pub struct FsPluginStore {
    layout: ProjectLayout,
    registry: Arc<StageRegistry>,
    max_operations: u64,
}

impl FsPluginStore {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: ProjectLayout::new(project_dir),
            registry: Arc::new(StageRegistry::new()),
            max_operations: DEFAULT_SCRIPT_MAX_OPERATIONS,
        }
    }

    pub fn with_registry(mut self, registry: Arc<StageRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_max_operations(mut self, max_operations: u64) -> Self {
        self.max_operations = max_operations;
        self
    }

    pub fn registry(&self) -> &Arc<StageRegistry> {
        &self.registry
    }
}

impl StagePluginStore for FsPluginStore {
    fn resolve(&self, key: StageKey<'_>) -> Result<Option<Invocable>, FlowError> {
        if let Some(native) = self.registry.resolve(key)? {
            return Ok(Some(native));
        }

        let Some((path, format)) =
            self.layout
                .find_stage_module(key.entity, key.flow_type, key.flow, key.stage)
        else {
            return Ok(None);
        };

        if !format.is_executable() {
            return Err(FlowError::config(format!(
                "stage {} is a {} module ({}) with no registered binding",
                key,
                format,
                path.display()
            )));
        }

        debug!(stage = %key, module = %path.display(), "Compiling stage module");
        let script = ScriptStage::load(&path, self.max_operations)?;
        Ok(Some(Invocable::Script(Arc::new(script))))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::plugin::stage_fn;
    use hub_common::types::{FlowType, PluginFormat};
    use tempfile::TempDir;

    fn write_module(dir: &TempDir, stage: &str, format: PluginFormat, body: &str) {
        let path = ProjectLayout::new(dir.path()).stage_module(
            "customer",
            FlowType::Input,
            "load-customers",
            stage,
            format,
        );
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    fn key(stage: &str) -> StageKey<'_> {
        StageKey {
            entity: "customer",
            flow_type: FlowType::Input,
            flow: "load-customers",
            stage,
        }
    }

    #[test]
    fn test_resolution_order() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "content", PluginFormat::Rhai, "doc.content = doc.content;");
        write_module(&dir, "headers", PluginFormat::Xquery, "xquery version '1.0-ml';");

        let registry = Arc::new(StageRegistry::new());
        registry.register("customer", "load-customers", "headers", stage_fn(|doc, _ctx| Ok(doc)));
        let store = FsPluginStore::new(dir.path()).with_registry(registry);

        assert!(matches!(store.resolve(key("content")).unwrap(), Some(Invocable::Script(_))));
        assert!(matches!(store.resolve(key("headers")).unwrap(), Some(Invocable::Native(_))));
        assert!(store.resolve(key("triples")).unwrap().is_none());
    }

    #[test]
    fn test_unbound_xquery_module_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        write_module(&dir, "triples", PluginFormat::Xquery, "()");

        let store = FsPluginStore::new(dir.path());
        let err = store.resolve(key("triples")).unwrap_err();
        assert!(matches!(err, FlowError::Configuration(ref m) if m.contains("xquery")));
    }
}
