use super::Capability;
use crate::error::CapabilityError;
use crate::model::ToolSpec;
use std::collections::HashMap;
use std::sync::Arc;

/// Capabilities by stable name
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability, replacing any with the same name
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities
            .insert(capability.name().to_string(), capability);
    }

    pub fn with(mut self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Capability>, CapabilityError> {
        self.capabilities
            .get(name)
            .cloned()
            .ok_or_else(|| CapabilityError::UnknownCapability(name.to_string()))
    }

    pub fn is_mutating(&self, name: &str) -> bool {
        self.capabilities
            .get(name)
            .map(|c| c.is_mutating())
            .unwrap_or(false)
    }

    pub fn is_terminal(&self, name: &str) -> bool {
        self.capabilities
            .get(name)
            .map(|c| c.is_terminal())
            .unwrap_or(false)
    }

    /// Sorted by name so prompts are stable
    pub fn specs(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.capabilities.values().map(|c| c.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.capabilities.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
