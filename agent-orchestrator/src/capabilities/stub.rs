//! Canned capability implementation
//!
//! Action, input and output come from static tables keyed by capability id.
//! Nothing here talks to a real backend.

use agent_orchestrator_sdk::{async_trait, Capability, CapabilityError};
use serde_json::{json, Value};
use std::time::Duration;

/// Capability ids with canned tables
pub const STUB_CAPABILITY_IDS: &[&str] = &[
    "text_processor",
    "ai_generation_tool",
    "code_analyzer",
    "data_analyzer",
    "web_researcher",
    "workflow_automation",
];

#[derive(Debug, Clone)]
enum StubBehavior {
    Canned,
    Fail(String),
    Panic(String),
}

/// Stub capability returning canned outputs
#[derive(Debug, Clone)]
pub struct StubCapability {
    id: String,
    behavior: StubBehavior,
    delay: Option<Duration>,
}

impl StubCapability {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            behavior: StubBehavior::Canned,
            delay: None,
        }
    }

    /// Stub whose handler always reports `message` as failure
    pub fn failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            behavior: StubBehavior::Fail(message.into()),
            ..Self::new(id)
        }
    }

    /// Stub whose handler panics with `message`
    pub fn panicking(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            behavior: StubBehavior::Panic(message.into()),
            ..Self::new(id)
        }
    }

    /// Sleep for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Capability for StubCapability {
    fn id(&self) -> &str {
        &self.id
    }

    fn resolve_action(&self, task: &str) -> String {
        canned_action(&self.id, task).to_string()
    }

    fn build_input(&self, task: &str) -> Value {
        let action = canned_action(&self.id, task);
        canned_input(&self.id, action, task)
    }

    async fn invoke(&self, input: Value) -> Result<Value, CapabilityError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            StubBehavior::Canned => Ok(canned_output(&self.id, &input)),
            StubBehavior::Fail(message) => Err(CapabilityError::failed(message.clone())),
            StubBehavior::Panic(message) => panic!("{}", message),
        }
    }
}

fn canned_action(id: &str, task: &str) -> &'static str {
    let task = task.to_lowercase();
    match id {
        "text_processor" => {
            if task.contains("summar") {
                "summarize"
            } else if task.contains("translat") {
                "translate"
            } else {
                "analyze_text"
            }
        }
        "ai_generation_tool" => "generate_content",
        "code_analyzer" => {
            if task.contains("review") {
                "review_code"
            } else if task.contains("explain") {
                "explain_code"
            } else {
                "analyze_code"
            }
        }
        "data_analyzer" => "analyze_dataset",
        "web_researcher" => "search_web",
        "workflow_automation" => "automate_workflow",
        _ => "process",
    }
}

fn canned_input(id: &str, action: &str, task: &str) -> Value {
    match id {
        "text_processor" => json!({ "action": action, "text": task }),
        "ai_generation_tool" => json!({ "action": action, "prompt": task, "max_tokens": 512 }),
        "code_analyzer" => json!({ "action": action, "source": task }),
        "data_analyzer" => json!({ "action": action, "query": task }),
        "web_researcher" => json!({ "action": action, "query": task, "max_results": 5 }),
        "workflow_automation" => json!({ "action": action, "workflow": task }),
        _ => json!({ "action": action, "task": task }),
    }
}

fn canned_output(id: &str, input: &Value) -> Value {
    let action = input["action"].as_str().unwrap_or("process");
    match id {
        "text_processor" => {
            let text = input["text"].as_str().unwrap_or_default();
            let words = text.split_whitespace().count();
            json!({
                "action": action,
                "result": format!("Processed text ({} words)", words),
                "word_count": words,
            })
        }
        "ai_generation_tool" => {
            let prompt = input["prompt"].as_str().unwrap_or_default();
            json!({
                "action": action,
                "generated": format!("Generated response for: {}", prompt),
            })
        }
        "code_analyzer" => json!({
            "action": action,
            "findings": ["No blocking issues found", "Consider adding tests for edge cases"],
            "complexity": "moderate",
        }),
        "data_analyzer" => json!({
            "action": action,
            "summary": "Dataset analyzed",
            "anomalies": 0,
        }),
        "web_researcher" => json!({
            "action": action,
            "results": [],
            "query": input["query"].clone(),
        }),
        "workflow_automation" => json!({
            "action": action,
            "triggered": true,
        }),
        _ => json!({ "action": action, "status": "processed" }),
    }
}
