//! Role capability: answers a task in the voice of a named role

use agent_orchestrator_sdk::{
    async_trait, split_role_annotation, Capability, CapabilityError, ROLE_CAPABILITY,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Wraps a generation capability and frames every prompt with the role
pub struct RoleCapability {
    generator: Arc<dyn Capability>,
}

impl RoleCapability {
    pub fn new(generator: Arc<dyn Capability>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Capability for RoleCapability {
    fn id(&self) -> &str {
        ROLE_CAPABILITY
    }

    fn resolve_action(&self, task: &str) -> String {
        match split_role_annotation(task) {
            (Some(role), _) => format!("act_as_{}", role.to_lowercase()),
            (None, _) => "respond".to_string(),
        }
    }

    fn build_input(&self, task: &str) -> Value {
        let (role, task) = split_role_annotation(task);
        let role = role.unwrap_or("assistant");
        let mut input = self
            .generator
            .build_input(&format!("You are acting as {}. {}", role, task));
        if let Some(fields) = input.as_object_mut() {
            fields.insert("role".to_string(), json!(role));
            fields.insert("task".to_string(), json!(task));
        }
        input
    }

    async fn invoke(&self, input: Value) -> Result<Value, CapabilityError> {
        let role = input["role"].clone();
        let response = self.generator.invoke(input).await?;
        Ok(json!({ "role": role, "response": response }))
    }
}
