//! Common test utilities for orchestrator tests

use agent_orchestrator::{CapabilityRegistry, ExecutionStore, Orchestrator, OrchestratorSettings};
use agent_orchestrator_sdk::{Agent, EventSink, ExecutionEvent};
use std::sync::{Arc, Mutex};

/// Agent with `[text_processor, ai_generation_tool]`
pub fn summarizer_agent() -> Agent {
    Agent::new("summarizer", "Summarizer")
        .with_capabilities(["text_processor", "ai_generation_tool"])
        .with_tags(["summarization"])
}

/// Agent that supports role-scoped execution
pub fn role_agent() -> Agent {
    Agent::new("explainer", "Code Explainer")
        .with_capabilities(["code_analyzer", "text_processor"])
        .with_tags(["documentation"])
        .with_role_support()
}

/// Agent declaring more capabilities than the default plan width
pub fn wide_agent() -> Agent {
    Agent::new("wide", "Wide Agent").with_capabilities([
        "web_researcher",
        "data_analyzer",
        "text_processor",
        "ai_generation_tool",
        "workflow_automation",
        "code_analyzer",
    ])
}

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        step_timeout_secs: 5,
        ..OrchestratorSettings::default()
    }
}

/// Orchestrator over `registry` with the sample agents
pub fn orchestrator_with(registry: CapabilityRegistry) -> Orchestrator {
    Orchestrator::new(settings(), registry, Arc::new(ExecutionStore::new())).with_agents(vec![
        summarizer_agent(),
        role_agent(),
        wide_agent(),
    ])
}

/// Orchestrator with the stub registry
pub fn stub_orchestrator() -> Orchestrator {
    orchestrator_with(CapabilityRegistry::with_stubs())
}

/// Sink that keeps every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &ExecutionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
