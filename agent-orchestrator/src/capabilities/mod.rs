//! Capability registry and capability implementations
//!
//! - **stub**: canned action/input/output tables, used for demos and tests
//! - **role**: the dedicated role capability for role-scoped executions
//! - **generation**: HTTP-backed content generation handler
//!
//! Every lookup is total: an id nobody registered resolves to
//! [`FallbackCapability`], so an execution never aborts because a
//! capability is unknown.

pub mod generation;
pub mod role;
pub mod stub;

use agent_orchestrator_sdk::{async_trait, Capability, CapabilityError, ROLE_CAPABILITY};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::GenerationSettings;

pub use generation::GenerationCapability;
pub use role::RoleCapability;
pub use stub::{StubCapability, STUB_CAPABILITY_IDS};

/// Action recorded for unregistered capabilities and for steps whose
/// action could not be derived
pub const FALLBACK_ACTION: &str = "process";

/// Capability id -> implementation
///
/// Immutable once handed to the orchestrator; shared across executions via `Arc`.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a stub for every well-known capability and a role
    /// capability backed by the stub generator
    pub fn with_stubs() -> Self {
        let mut registry = Self::new();
        for id in STUB_CAPABILITY_IDS {
            registry.register(Arc::new(StubCapability::new(*id)));
        }
        registry.register(Arc::new(RoleCapability::new(Arc::new(StubCapability::new(
            "ai_generation_tool",
        )))));
        registry
    }

    /// Stubs, with generation (and the role capability) routed to an HTTP
    /// backend when one is configured
    pub fn from_settings(generation: Option<&GenerationSettings>) -> Self {
        let mut registry = Self::with_stubs();
        if let Some(settings) = generation {
            let generator: Arc<dyn Capability> =
                Arc::new(GenerationCapability::from_settings("ai_generation_tool", settings));
            registry.register(generator.clone());
            registry.register(Arc::new(RoleCapability::new(generator)));
        }
        registry
    }

    /// Register a capability, returning the one it replaced
    pub fn register(&mut self, capability: Arc<dyn Capability>) -> Option<Arc<dyn Capability>> {
        self.capabilities
            .insert(capability.id().to_string(), capability)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.capabilities.contains_key(id)
    }

    /// Registered implementation, or the fallback for unknown ids
    pub fn get(&self, id: &str) -> Arc<dyn Capability> {
        match self.capabilities.get(id) {
            Some(capability) => capability.clone(),
            None => Arc::new(FallbackCapability::new(id)),
        }
    }

    pub fn resolve_action(&self, id: &str, task: &str) -> String {
        self.get(id).resolve_action(task)
    }

    pub fn build_input(&self, id: &str, task: &str) -> Value {
        self.get(id).build_input(task)
    }

    pub async fn invoke(&self, id: &str, input: Value) -> Result<Value, CapabilityError> {
        self.get(id).invoke(input).await
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.capabilities.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn has_role_capability(&self) -> bool {
        self.contains(ROLE_CAPABILITY)
    }
}

/// Default behaviour for capability ids without a registered handler
pub struct FallbackCapability {
    id: String,
}

impl FallbackCapability {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Capability for FallbackCapability {
    fn id(&self) -> &str {
        &self.id
    }

    fn resolve_action(&self, _task: &str) -> String {
        FALLBACK_ACTION.to_string()
    }

    fn build_input(&self, task: &str) -> Value {
        json!({ "task": task })
    }

    async fn invoke(&self, _input: Value) -> Result<Value, CapabilityError> {
        Ok(json!({
            "capability": self.id,
            "status": "processed",
            "note": "no handler registered",
        }))
    }
}
