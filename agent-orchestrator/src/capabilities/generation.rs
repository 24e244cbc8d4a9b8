//! HTTP-backed content generation capability

use agent_orchestrator_sdk::{async_trait, Capability, CapabilityError};
use serde_json::{json, Value};

use crate::config::GenerationSettings;

const GENERATE_ACTION: &str = "generate_content";

/// Posts `{"capability", "action", "input"}` to a generation backend and returns its JSON body
pub struct GenerationCapability {
    id: String,
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: Option<String>,
}

impl GenerationCapability {
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            model: None,
        }
    }

    pub fn from_settings(id: impl Into<String>, settings: &GenerationSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            ..Self::new(id, settings.endpoint.clone())
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Request body sent for one invocation
    pub fn request_body(&self, input: Value) -> Value {
        let action = input["action"]
            .as_str()
            .unwrap_or(GENERATE_ACTION)
            .to_string();
        json!({
            "capability": self.id,
            "action": action,
            "input": input,
        })
    }
}

#[async_trait]
impl Capability for GenerationCapability {
    fn id(&self) -> &str {
        &self.id
    }

    fn resolve_action(&self, _task: &str) -> String {
        GENERATE_ACTION.to_string()
    }

    fn build_input(&self, task: &str) -> Value {
        let mut input = json!({
            "action": GENERATE_ACTION,
            "prompt": task,
        });
        if let Some(model) = &self.model {
            input["model"] = json!(model);
        }
        input
    }

    async fn invoke(&self, input: Value) -> Result<Value, CapabilityError> {
        let mut request = self.client.post(&self.endpoint).json(&self.request_body(input));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CapabilityError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Failed(format!(
                "generation backend returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CapabilityError::InvalidResponse(e.to_string()))
    }
}
