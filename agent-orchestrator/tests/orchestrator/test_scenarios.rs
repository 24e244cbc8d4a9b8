//! End-to-end execution scenarios

use super::common::*;
use agent_orchestrator::capabilities::StubCapability;
use agent_orchestrator::CapabilityRegistry;
use agent_orchestrator_sdk::{
    async_trait, Capability, CapabilityError, ExecutionStatus, FailureKind, OrchestratorError,
    OrchestratorRuntime, StartRequest, StepStatus, ROLE_CAPABILITY,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Scenario A: two-step success
// ============================================================================

#[tokio::test]
async fn test_two_step_success() {
    let orchestrator = stub_orchestrator();
    let handle = orchestrator
        .start(StartRequest::new("summarizer", "summarize quarterly update"))
        .await
        .unwrap();

    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();

    assert_eq!(execution.status(), ExecutionStatus::Completed);
    assert_eq!(execution.task, "summarize quarterly update");

    let capabilities: Vec<&str> = execution
        .steps()
        .iter()
        .map(|s| s.capability.as_str())
        .collect();
    assert_eq!(capabilities, vec!["text_processor", "ai_generation_tool"]);
    assert!(execution
        .steps()
        .iter()
        .all(|s| s.status() == StepStatus::Completed));

    let result = execution.result().unwrap();
    assert_eq!(
        result.capabilities_used,
        vec!["text_processor", "ai_generation_tool"]
    );
    assert_eq!(result.success_rate, 100.0);
    assert!(result.failure.is_none());
    assert!(result.summary.contains("Summarizer"));
    assert!(result.summary.contains("summarize quarterly update"));

    let durations: u64 = execution.steps().iter().filter_map(|s| s.duration_ms()).sum();
    assert_eq!(result.elapsed_ms, durations);
}

// ============================================================================
// Scenario B: second step fails
// ============================================================================

#[tokio::test]
async fn test_second_step_failure_halts_execution() {
    let mut registry = CapabilityRegistry::with_stubs();
    registry.register(Arc::new(StubCapability::failing(
        "ai_generation_tool",
        "generation backend unavailable",
    )));
    let orchestrator = orchestrator_with(registry);

    let handle = orchestrator
        .start(StartRequest::new("summarizer", "summarize quarterly update"))
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();

    assert_eq!(execution.status(), ExecutionStatus::Failed);
    assert_eq!(execution.steps().len(), 2);
    assert_eq!(execution.steps()[0].status(), StepStatus::Completed);
    assert_eq!(execution.steps()[1].status(), StepStatus::Failed);
    assert!(execution.step("step-3").is_none());

    let result = execution.result().unwrap();
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::CapabilityError);
    assert_eq!(failure.reason, "generation backend unavailable");
    assert_eq!(failure.step_id.as_deref(), Some("step-2"));
    assert_eq!(result.capabilities_used, vec!["text_processor"]);
    assert_eq!(result.success_rate, 50.0);
}

#[tokio::test]
async fn test_first_step_failure_skips_remaining_steps() {
    let mut registry = CapabilityRegistry::with_stubs();
    registry.register(Arc::new(StubCapability::failing("web_researcher", "rate limited")));
    let orchestrator = orchestrator_with(registry);

    let handle = orchestrator
        .start(StartRequest::new("wide", "find sources"))
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();

    assert_eq!(execution.status(), ExecutionStatus::Failed);
    assert_eq!(execution.steps().len(), 1);
    assert_eq!(execution.result().unwrap().success_rate, 0.0);
}

// ============================================================================
// Scenario C: role-scoped execution
// ============================================================================

#[tokio::test]
async fn test_role_scoped_single_step() {
    let orchestrator = stub_orchestrator();
    let handle = orchestrator
        .start(StartRequest::new("explainer", "explain this function").with_role("Code_Explainer"))
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();

    assert_eq!(execution.status(), ExecutionStatus::Completed);
    assert_eq!(execution.task, "[role: Code_Explainer] explain this function");
    assert_eq!(execution.steps().len(), 1);

    let step = &execution.steps()[0];
    assert_eq!(step.capability, ROLE_CAPABILITY);
    assert_eq!(step.input["role"], "Code_Explainer");
    assert_eq!(step.input["task"], "explain this function");

    let result = execution.result().unwrap();
    assert_eq!(result.capabilities_used, vec![ROLE_CAPABILITY]);
    assert!(result.summary.contains("explain this function"));
    assert!(result.insights.iter().any(|i| i.contains("Code_Explainer")));
}

#[tokio::test]
async fn test_role_with_bracket_is_rejected() {
    let orchestrator = stub_orchestrator();
    let err = orchestrator
        .start(StartRequest::new("explainer", "explain this").with_role("a] b"))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidRole(_)));
    assert!(orchestrator.list_recent(10).await.is_empty());
}

#[tokio::test]
async fn test_plain_task_resembling_annotation_is_kept() {
    let orchestrator = stub_orchestrator();
    let handle = orchestrator
        .start(StartRequest::new("summarizer", "[role: x] keep this prefix"))
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();

    assert_eq!(execution.task, "[role: x] keep this prefix");
    let result = execution.result().unwrap();
    assert!(result.summary.contains("[role: x] keep this prefix"));
}

#[tokio::test]
async fn test_role_without_support_uses_capabilities() {
    let orchestrator = stub_orchestrator();
    let handle = orchestrator
        .start(StartRequest::new("summarizer", "summarize").with_role("Editor"))
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();

    assert_eq!(execution.steps().len(), 2);
    assert_eq!(execution.task, "summarize");
}

// ============================================================================
// Scenario D: recent listing
// ============================================================================

#[tokio::test]
async fn test_list_recent_returns_newest_first() {
    let orchestrator = stub_orchestrator();
    let mut ids = Vec::new();
    for task in ["first", "second", "third"] {
        let handle = orchestrator
            .start(StartRequest::new("summarizer", task))
            .await
            .unwrap();
        ids.push(handle.id);
    }

    let recent = orchestrator.list_recent(2).await;
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, ids[2]);
    assert_eq!(recent[1].id, ids[1]);
    assert_eq!(recent[0].task, "third");

    for id in &ids {
        orchestrator.wait_for_completion(id).await.unwrap();
    }
}

// ============================================================================
// Failure modes of handlers
// ============================================================================

#[tokio::test]
async fn test_step_timeout_fails_execution() {
    let mut registry = CapabilityRegistry::with_stubs();
    registry.register(Arc::new(
        StubCapability::new("text_processor").with_delay(Duration::from_secs(3)),
    ));
    let orchestrator = agent_orchestrator::Orchestrator::new(
        agent_orchestrator::OrchestratorSettings {
            step_timeout_secs: 1,
            ..settings()
        },
        registry,
        Arc::new(agent_orchestrator::ExecutionStore::new()),
    )
    .with_agents(vec![summarizer_agent()]);

    let handle = orchestrator
        .start(StartRequest::new("summarizer", "slow task"))
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();

    assert_eq!(execution.status(), ExecutionStatus::Failed);
    assert_eq!(execution.steps().len(), 1);
    let failure = execution.result().unwrap().failure.clone().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn test_panicking_handler_fails_execution() {
    let mut registry = CapabilityRegistry::with_stubs();
    registry.register(Arc::new(StubCapability::panicking(
        "ai_generation_tool",
        "unexpected token",
    )));
    let orchestrator = orchestrator_with(registry);

    let handle = orchestrator
        .start(StartRequest::new("summarizer", "task"))
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();

    assert_eq!(execution.status(), ExecutionStatus::Failed);
    let failure = execution.result().unwrap().failure.clone().unwrap();
    assert_eq!(failure.kind, FailureKind::Panicked);
    assert!(failure.reason.contains("unexpected token"));

    // The engine keeps serving new executions
    let handle = orchestrator
        .start(StartRequest::new("explainer", "task"))
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();
    assert_eq!(execution.status(), ExecutionStatus::Completed);
}

/// Handler whose input template panics before any invocation
struct BrokenTemplate;

#[async_trait]
impl Capability for BrokenTemplate {
    fn id(&self) -> &str {
        "text_processor"
    }

    fn resolve_action(&self, _task: &str) -> String {
        "analyze".to_string()
    }

    fn build_input(&self, _task: &str) -> Value {
        panic!("template not loaded")
    }

    async fn invoke(&self, _input: Value) -> Result<Value, CapabilityError> {
        Ok(json!({}))
    }
}

#[tokio::test]
async fn test_panicking_input_builder_fails_execution() {
    let mut registry = CapabilityRegistry::with_stubs();
    registry.register(Arc::new(BrokenTemplate));
    let orchestrator = orchestrator_with(registry);

    let handle = orchestrator
        .start(StartRequest::new("summarizer", "summarize"))
        .await
        .unwrap();
    let execution = tokio::time::timeout(
        Duration::from_secs(2),
        orchestrator.wait_for_completion(handle.id()),
    )
    .await
    .expect("execution never settled")
    .unwrap();

    assert_eq!(execution.status(), ExecutionStatus::Failed);
    assert_eq!(execution.steps().len(), 1);
    assert_eq!(execution.steps()[0].status(), StepStatus::Failed);
    let failure = execution.result().unwrap().failure.clone().unwrap();
    assert_eq!(failure.kind, FailureKind::Panicked);
    assert!(failure.reason.contains("template not loaded"));

    orchestrator.shutdown().await;
    assert_eq!(orchestrator.active_executions().await, 0);
}

#[tokio::test]
async fn test_unregistered_capability_uses_fallback() {
    let orchestrator = stub_orchestrator();
    let agent = agent_orchestrator_sdk::Agent::new("future", "Future Agent")
        .with_capabilities(["text_processor", "hologram_renderer"]);

    let handle = orchestrator
        .start_with_agent(agent, "render the logo", None, None)
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();

    assert_eq!(execution.status(), ExecutionStatus::Completed);
    let fallback = &execution.steps()[1];
    assert_eq!(fallback.action, "process");
    assert_eq!(fallback.output().unwrap()["status"], "processed");
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_lets_running_step_finish() {
    let mut registry = CapabilityRegistry::with_stubs();
    registry.register(Arc::new(
        StubCapability::new("text_processor").with_delay(Duration::from_millis(300)),
    ));
    let orchestrator = orchestrator_with(registry);

    let handle = orchestrator
        .start(StartRequest::new("summarizer", "summarize"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    orchestrator.cancel(handle.id()).await.unwrap();

    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();
    assert_eq!(execution.status(), ExecutionStatus::Failed);
    assert_eq!(execution.steps().len(), 1);
    assert_eq!(execution.steps()[0].status(), StepStatus::Completed);

    let failure = execution.result().unwrap().failure.clone().unwrap();
    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert!(failure.reason.contains("step 2"));
}

#[tokio::test]
async fn test_cancel_finished_execution_is_noop() {
    let orchestrator = stub_orchestrator();
    let handle = orchestrator
        .start(StartRequest::new("summarizer", "task"))
        .await
        .unwrap();
    let before = orchestrator.wait_for_completion(handle.id()).await.unwrap();

    orchestrator.cancel(handle.id()).await.unwrap();
    let after = orchestrator.get_execution(handle.id()).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after.status(), ExecutionStatus::Completed);
}

#[tokio::test]
async fn test_cancel_while_waiting_for_worker() {
    let mut registry = CapabilityRegistry::with_stubs();
    registry.register(Arc::new(
        StubCapability::new("text_processor").with_delay(Duration::from_millis(300)),
    ));
    let orchestrator = agent_orchestrator::Orchestrator::new(
        agent_orchestrator::OrchestratorSettings {
            max_concurrent_executions: 1,
            ..settings()
        },
        registry,
        Arc::new(agent_orchestrator::ExecutionStore::new()),
    )
    .with_agents(vec![summarizer_agent()]);

    let busy = orchestrator
        .start(StartRequest::new("summarizer", "occupies the only worker"))
        .await
        .unwrap();
    // Let the first execution take the worker
    tokio::time::sleep(Duration::from_millis(50)).await;
    let queued = orchestrator
        .start(StartRequest::new("summarizer", "waits for a worker"))
        .await
        .unwrap();

    orchestrator.cancel(queued.id()).await.unwrap();
    let cancelled = orchestrator.wait_for_completion(queued.id()).await.unwrap();
    assert_eq!(cancelled.status(), ExecutionStatus::Failed);
    assert!(cancelled.steps().is_empty());

    let finished = orchestrator.wait_for_completion(busy.id()).await.unwrap();
    assert_eq!(finished.status(), ExecutionStatus::Completed);
}
