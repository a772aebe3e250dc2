//! In-process registry of compiled stages

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Invocable, Stage, StageKey, StagePluginStore};
use crate::error::FlowError;

type RegistryKey = (String, String, String);

/// Compiled stages keyed by (entity, flow, stage).
///
/// Registrations apply to a flow name regardless of its flow type. Stages not
/// registered resolve to identity.
#[derive(Default)]
pub struct StageRegistry {
    stages: RwLock<HashMap<RegistryKey, Arc<dyn Stage>>>,
}

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage, replacing any previous registration for the same key
    pub fn register<S>(&self, entity: &str, flow: &str, stage: &str, implementation: S)
    where
        S: Stage + 'static,
    {
        self.register_arc(entity, flow, stage, Arc::new(implementation));
    }

    pub fn register_arc(&self, entity: &str, flow: &str, stage: &str, implementation: Arc<dyn Stage>) {
        let mut stages = self.stages.write().unwrap_or_else(|e| e.into_inner());
        stages.insert(key(entity, flow, stage), implementation);
    }

    /// Chainable form of [`register`](Self::register)
    pub fn with<S>(self, entity: &str, flow: &str, stage: &str, implementation: S) -> Self
    where
        S: Stage + 'static,
    {
        self.register(entity, flow, stage, implementation);
        self
    }

    pub fn unregister(&self, entity: &str, flow: &str, stage: &str) -> bool {
        let mut stages = self.stages.write().unwrap_or_else(|e| e.into_inner());
        stages.remove(&key(entity, flow, stage)).is_some()
    }

    pub fn get(&self, entity: &str, flow: &str, stage: &str) -> Option<Arc<dyn Stage>> {
        let stages = self.stages.read().unwrap_or_else(|e| e.into_inner());
        stages.get(&key(entity, flow, stage)).cloned()
    }

    pub fn len(&self) -> usize {
        self.stages.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key(entity: &str, flow: &str, stage: &str) -> RegistryKey {
    (entity.to_string(), flow.to_string(), stage.to_string())
}

impl StagePluginStore for StageRegistry {
    fn resolve(&self, key: StageKey<'_>) -> Result<Option<Invocable>, FlowError> {
        Ok(self
            .get(key.entity, key.flow, key.stage)
            .map(Invocable::Native))
    }
}
