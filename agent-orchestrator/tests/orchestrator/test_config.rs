//! Loading configuration files and building orchestrators from them

use agent_orchestrator::{Config, Orchestrator};
use agent_orchestrator_sdk::{ExecutionStatus, OrchestratorRuntime, StartRequest};
use std::fs;
use tempfile::TempDir;

const CONFIG: &str = r#"---
orchestrator:
  max_plan_width: 2
  step_timeout_secs: 5
  store_capacity: 10
agents:
  - id: reviewer
    name: Reviewer
    capabilities: [code_analyzer, text_processor, ai_generation_tool]
    tags: [code_review]
  - id: tutor
    name: Tutor
    capabilities: [ai_generation_tool]
    supports_roles: true
"#;

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, CONFIG).unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.agents.len(), 2);
    assert_eq!(config.orchestrator.max_plan_width, 2);
    assert_eq!(config.orchestrator.store_capacity, Some(10));
    // Unset fields keep their defaults
    assert_eq!(config.orchestrator.max_concurrent_executions, 8);
    assert!(config.agent("tutor").unwrap().supports_roles);
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = Config::load(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.to_string().contains("absent.yaml"));
}

#[test]
fn test_resolve_explicit_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.yaml");
    fs::write(&path, CONFIG).unwrap();

    let config = Config::resolve(Some(&path)).unwrap();
    assert!(config.agent("reviewer").is_some());
}

#[test]
fn test_duplicate_agent_ids_rejected() {
    let yaml = r#"
agents:
  - id: twin
    name: First
    capabilities: [text_processor]
  - id: twin
    name: Second
    capabilities: [text_processor]
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(format!("{:#}", err).contains("duplicate agent id 'twin'"));
}

#[test]
fn test_invalid_limits_rejected() {
    let yaml = "orchestrator:\n  max_concurrent_executions: 0\n";
    assert!(Config::from_yaml(yaml).is_err());
}

#[tokio::test]
async fn test_orchestrator_from_loaded_config() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, CONFIG).unwrap();
    let config = Config::load(&path).unwrap();

    let orchestrator = Orchestrator::from_config(&config).unwrap();
    assert_eq!(orchestrator.store().capacity(), Some(10));

    let ids: Vec<String> = orchestrator.list_agents().into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["reviewer", "tutor"]);

    let handle = orchestrator
        .start(StartRequest::new("reviewer", "review the parser"))
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();
    assert_eq!(execution.status(), ExecutionStatus::Completed);
    // Plan width comes from the file
    assert_eq!(execution.steps().len(), 2);

    let handle = orchestrator
        .start(StartRequest::new("tutor", "explain ownership").with_role("Mentor"))
        .await
        .unwrap();
    let execution = orchestrator.wait_for_completion(handle.id()).await.unwrap();
    assert_eq!(execution.steps()[0].action, "act_as_mentor");
}
