//! Orchestrator and agent configuration
//!
//! Configuration is a YAML document with two sections:
//!
//! ```yaml
//! orchestrator:
//!   max_plan_width: 4
//!   max_concurrent_executions: 8
//!   step_timeout_secs: 30
//!   store_capacity: 500
//! agents:
//!   - id: content_writer
//!     name: Content Writer
//!     capabilities: [text_processor, ai_generation_tool]
//!     tags: [writing, summarization]
//! ```
//!
//! Every orchestrator field has a default; agents are validated on load.

use agent_orchestrator_sdk::{Agent, OrchestratorError, OrchestratorResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "ORCHESTRATOR_CONFIG";
pub const GENERATION_URL_ENV: &str = "GENERATION_API_URL";
pub const GENERATION_KEY_ENV: &str = "GENERATION_API_KEY";
pub const GENERATION_MODEL_ENV: &str = "GENERATION_MODEL";

const BUILTIN_CONFIG: &str = r#"
orchestrator:
  max_plan_width: 4
  max_concurrent_executions: 8
  step_timeout_secs: 30
agents:
  - id: content_writer
    name: Content Writer
    description: Drafts and condenses written material
    capabilities: [text_processor, ai_generation_tool]
    tags: [writing, summarization]
    personality: concise
  - id: code_assistant
    name: Code Assistant
    description: Reviews and explains source code
    capabilities: [code_analyzer, text_processor, ai_generation_tool]
    tags: [code_review, documentation]
    supports_roles: true
  - id: research_analyst
    name: Research Analyst
    description: Gathers sources and analyses data
    capabilities: [web_researcher, data_analyzer, text_processor, ai_generation_tool, workflow_automation]
    tags: [research, data_analysis, automation]
    personality: thorough
"#;

/// Settings of the generation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Engine limits and tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Maximum number of steps in a plan
    pub max_plan_width: usize,
    /// Size of the worker pool shared by all executions
    pub max_concurrent_executions: usize,
    /// Per-step handler timeout
    pub step_timeout_secs: u64,
    /// Bound on stored executions; unbounded when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_capacity: Option<usize>,
    /// Capacity of the telemetry broadcast channel
    pub event_buffer: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<GenerationSettings>,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_plan_width: 4,
            max_concurrent_executions: 8,
            step_timeout_secs: 30,
            store_capacity: None,
            event_buffer: 1000,
            generation: None,
        }
    }
}

impl OrchestratorSettings {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.max_plan_width == 0 {
            return Err(OrchestratorError::Config(
                "max_plan_width must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_executions == 0 {
            return Err(OrchestratorError::Config(
                "max_concurrent_executions must be at least 1".to_string(),
            ));
        }
        if self.step_timeout_secs == 0 {
            return Err(OrchestratorError::Config(
                "step_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(OrchestratorError::Config(
                "event_buffer must be at least 1".to_string(),
            ));
        }
        if self.store_capacity == Some(0) {
            return Err(OrchestratorError::Config(
                "store_capacity must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub agents: Vec<Agent>,
}

impl Config {
    /// Parse and validate a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let yaml = yaml.trim_start_matches("---").trim();
        let config: Config = serde_yaml::from_str(yaml).context("Failed to parse config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Demo agents with default settings
    pub fn builtin() -> Self {
        serde_yaml::from_str(BUILTIN_CONFIG).unwrap_or_default()
    }

    /// `~/.agent-orchestrator/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".agent-orchestrator").join("config.yaml"))
    }

    /// Resolve the config file: explicit path, then `ORCHESTRATOR_CONFIG`,
    /// then the default path; falls back to the built-in demo config
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Self::load(Path::new(&path));
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::builtin()),
        }
    }

    /// Apply `GENERATION_API_URL`, `GENERATION_API_KEY` and `GENERATION_MODEL`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var(GENERATION_URL_ENV) {
            if !endpoint.trim().is_empty() {
                let generation =
                    self.orchestrator
                        .generation
                        .get_or_insert_with(|| GenerationSettings {
                            endpoint: String::new(),
                            api_key: None,
                            model: None,
                        });
                generation.endpoint = endpoint;
            }
        }
        if let Some(generation) = self.orchestrator.generation.as_mut() {
            if let Ok(key) = std::env::var(GENERATION_KEY_ENV) {
                generation.api_key = Some(key);
            }
            if let Ok(model) = std::env::var(GENERATION_MODEL_ENV) {
                generation.model = Some(model);
            }
        }
    }

    pub fn validate(&self) -> OrchestratorResult<()> {
        self.orchestrator.validate()?;

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err(OrchestratorError::Config(format!(
                    "agent '{}' has an empty id",
                    agent.name
                )));
            }
            if !seen.insert(agent.id.as_str()) {
                return Err(OrchestratorError::Config(format!(
                    "duplicate agent id '{}'",
                    agent.id
                )));
            }
        }

        if let Some(generation) = &self.orchestrator.generation {
            if generation.endpoint.trim().is_empty() {
                return Err(OrchestratorError::Config(
                    "generation.endpoint must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.id == id)
    }
}
