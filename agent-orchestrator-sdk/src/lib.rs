// Error taxonomy
mod error;
pub use error::{CapabilityError, OrchestratorError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

// Re-export async trait for convenience
pub use async_trait::async_trait;

/// Capability id of the dedicated role step
pub const ROLE_CAPABILITY: &str = "role_executor";

const ROLE_ANNOTATION_PREFIX: &str = "[role: ";

/// Result type for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Prefix a task with a role annotation
pub fn annotate_role(role: &str, task: &str) -> String {
    format!("{}{}] {}", ROLE_ANNOTATION_PREFIX, role, task)
}

/// Split a role-annotated task into `(role, task)`
///
/// Tasks without an annotation come back unchanged with no role. Roles
/// never contain `]`, so the first `"] "` ends the annotation.
pub fn split_role_annotation(task: &str) -> (Option<&str>, &str) {
    if let Some(rest) = task.strip_prefix(ROLE_ANNOTATION_PREFIX) {
        if let Some((role, task)) = rest.split_once("] ") {
            return (Some(role), task);
        }
    }
    (None, task)
}

/// Deterministic fixed-length digest of a task, used in telemetry
pub fn task_digest(task: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, task.as_bytes())
}

// ============================================================================
// Agents
// ============================================================================

/// A named bundle of capabilities, loaded from configuration and never mutated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Capability ids, in the order the plan uses them
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Declared capability tags (reporting only)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Role/personality tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personality: Option<String>,
    /// Whether role-scoped execution is allowed
    #[serde(default)]
    pub supports_roles: bool,
}

impl Agent {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            capabilities: Vec::new(),
            tags: Vec::new(),
            personality: None,
            supports_roles: false,
        }
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = Some(personality.into());
        self
    }

    pub fn with_role_support(mut self) -> Self {
        self.supports_roles = true;
        self
    }
}

// ============================================================================
// Steps
// ============================================================================

/// Step status discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Step state machine; output and duration only exist once the step finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepState {
    Running,
    Completed { output: Value, duration_ms: u64 },
    Failed { output: Value, duration_ms: u64 },
}

impl StepState {
    pub fn status(&self) -> StepStatus {
        match self {
            Self::Running => StepStatus::Running,
            Self::Completed { .. } => StepStatus::Completed,
            Self::Failed { .. } => StepStatus::Failed,
        }
    }
}

/// One capability invocation within an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique within the owning execution (`step-1`, `step-2`, ...)
    pub id: String,
    pub capability: String,
    pub action: String,
    pub input: Value,
    state: StepState,
    pub created_at: DateTime<Utc>,
}

impl Step {
    pub fn new(
        id: impl Into<String>,
        capability: impl Into<String>,
        action: impl Into<String>,
        input: Value,
    ) -> Self {
        Self {
            id: id.into(),
            capability: capability.into(),
            action: action.into(),
            input,
            state: StepState::Running,
            created_at: Utc::now(),
        }
    }

    pub fn state(&self) -> &StepState {
        &self.state
    }

    pub fn status(&self) -> StepStatus {
        self.state.status()
    }

    pub fn output(&self) -> Option<&Value> {
        match &self.state {
            StepState::Running => None,
            StepState::Completed { output, .. } | StepState::Failed { output, .. } => Some(output),
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match &self.state {
            StepState::Running => None,
            StepState::Completed { duration_ms, .. } | StepState::Failed { duration_ms, .. } => {
                Some(*duration_ms)
            }
        }
    }

    /// Transition `running -> completed`
    pub fn complete(&mut self, output: Value, duration_ms: u64) -> OrchestratorResult<()> {
        self.transition(StepState::Completed {
            output,
            duration_ms,
        })
    }

    /// Transition `running -> failed`
    pub fn fail(&mut self, output: Value, duration_ms: u64) -> OrchestratorResult<()> {
        self.transition(StepState::Failed {
            output,
            duration_ms,
        })
    }

    fn transition(&mut self, next: StepState) -> OrchestratorResult<()> {
        if self.state != StepState::Running {
            return Err(OrchestratorError::InvalidTransition(format!(
                "step {} is already {}",
                self.id,
                self.status()
            )));
        }
        self.state = next;
        Ok(())
    }
}

// ============================================================================
// Executions
// ============================================================================

/// Execution status discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Why an execution failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    CapabilityError,
    Timeout,
    Panicked,
    Cancelled,
    /// The engine itself failed while driving the execution
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilityError => write!(f, "capability_error"),
            Self::Timeout => write!(f, "timeout"),
            Self::Panicked => write!(f, "panicked"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Failure marker attached to the result of a failed execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureMarker {
    pub kind: FailureKind,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,
}

/// Aggregate result of a finished execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub summary: String,
    pub capabilities_used: Vec<String>,
    pub elapsed_ms: u64,
    pub success_rate: f64,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureMarker>,
}

impl ExecutionResult {
    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Execution state machine; the result lives inside the terminal variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "result", rename_all = "snake_case")]
pub enum ExecutionState {
    Running,
    Completed(ExecutionResult),
    Failed(ExecutionResult),
}

impl ExecutionState {
    pub fn status(&self) -> ExecutionStatus {
        match self {
            Self::Running => ExecutionStatus::Running,
            Self::Completed(_) => ExecutionStatus::Completed,
            Self::Failed(_) => ExecutionStatus::Failed,
        }
    }
}

/// One run of a task against an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub agent_id: String,
    pub agent_name: String,
    /// Literal task, role-annotated for role-scoped executions
    pub task: String,
    /// Caller identity, provenance only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    state: ExecutionState,
    steps: Vec<Step>,
    pub started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Execution {
    /// Create a running execution with a fresh id
    pub fn new(agent: &Agent, task: impl Into<String>, requested_by: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            agent_id: agent.id.clone(),
            agent_name: agent.name.clone(),
            task: task.into(),
            requested_by,
            state: ExecutionState::Running,
            steps: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn status(&self) -> ExecutionStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.status() != ExecutionStatus::Running
    }

    pub fn result(&self) -> Option<&ExecutionResult> {
        match &self.state {
            ExecutionState::Running => None,
            ExecutionState::Completed(result) | ExecutionState::Failed(result) => Some(result),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Append a running step and return a copy of it
    ///
    /// Rejected when the execution is terminal, when a step is still running,
    /// or when an earlier step failed.
    pub fn begin_step(
        &mut self,
        capability: &str,
        action: String,
        input: Value,
    ) -> OrchestratorResult<Step> {
        if self.is_terminal() {
            return Err(OrchestratorError::InvalidTransition(format!(
                "execution {} is already {}",
                self.id,
                self.status()
            )));
        }
        if let Some(blocking) = self
            .steps
            .iter()
            .find(|s| s.status() != StepStatus::Completed)
        {
            return Err(OrchestratorError::InvalidTransition(format!(
                "execution {} cannot start a step after {} ({})",
                self.id,
                blocking.id,
                blocking.status()
            )));
        }

        let step = Step::new(
            format!("step-{}", self.steps.len() + 1),
            capability,
            action,
            input,
        );
        self.steps.push(step.clone());
        self.touch();
        Ok(step)
    }

    /// Move a running step to its terminal state and return a copy of it
    pub fn finish_step(
        &mut self,
        step_id: &str,
        outcome: Result<Value, Value>,
        duration_ms: u64,
    ) -> OrchestratorResult<Step> {
        let execution_id = self.id;
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.id == step_id)
            .ok_or_else(|| {
                OrchestratorError::InvalidTransition(format!(
                    "execution {} has no step {}",
                    execution_id, step_id
                ))
            })?;

        match outcome {
            Ok(output) => step.complete(output, duration_ms)?,
            Err(output) => step.fail(output, duration_ms)?,
        }
        let step = step.clone();
        self.touch();
        Ok(step)
    }

    /// Transition `running -> completed`
    pub fn complete(&mut self, result: ExecutionResult) -> OrchestratorResult<()> {
        if let Some(step) = self
            .steps
            .iter()
            .find(|s| s.status() != StepStatus::Completed)
        {
            return Err(OrchestratorError::InvalidTransition(format!(
                "execution {} cannot complete with step {} {}",
                self.id,
                step.id,
                step.status()
            )));
        }
        self.transition(ExecutionState::Completed(result))
    }

    /// Transition `running -> failed`
    pub fn fail(&mut self, result: ExecutionResult) -> OrchestratorResult<()> {
        self.transition(ExecutionState::Failed(result))
    }

    fn transition(&mut self, next: ExecutionState) -> OrchestratorResult<()> {
        if self.is_terminal() {
            return Err(OrchestratorError::InvalidTransition(format!(
                "execution {} is already {}",
                self.id,
                self.status()
            )));
        }
        self.state = next;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// ============================================================================
// Telemetry
// ============================================================================

/// Structured telemetry events, one per status transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    ExecutionStarted {
        execution_id: Uuid,
        agent_id: String,
        task_digest: Uuid,
        planned_steps: usize,
    },
    ExecutionFinished {
        execution_id: Uuid,
        agent_id: String,
        task_digest: Uuid,
        outcome: ExecutionStatus,
        duration_ms: u64,
    },
    StepStarted {
        execution_id: Uuid,
        step_id: String,
        capability: String,
        action: String,
    },
    StepFinished {
        execution_id: Uuid,
        step_id: String,
        capability: String,
        action: String,
        outcome: StepStatus,
        duration_ms: u64,
    },
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> Uuid {
        match self {
            Self::ExecutionStarted { execution_id, .. }
            | Self::ExecutionFinished { execution_id, .. }
            | Self::StepStarted { execution_id, .. }
            | Self::StepFinished { execution_id, .. } => *execution_id,
        }
    }

    /// Whether this event ends an execution
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ExecutionFinished { .. })
    }
}

/// Narrow optional sink for telemetry events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ExecutionEvent);
}

// ============================================================================
// Capabilities
// ============================================================================

/// A pluggable unit of work identified by a string key
///
/// `resolve_action` and `build_input` are pure and must not block;
/// `invoke` is the only operation allowed to suspend.
#[async_trait]
pub trait Capability: Send + Sync {
    fn id(&self) -> &str;

    /// Derive the operation name from a task
    fn resolve_action(&self, task: &str) -> String;

    /// Derive the structured input payload from a task
    fn build_input(&self, task: &str) -> Value;

    async fn invoke(&self, input: Value) -> Result<Value, CapabilityError>;
}

// ============================================================================
// Runtime API
// ============================================================================

/// Parameters of a new execution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartRequest {
    pub agent_id: String,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
}

impl StartRequest {
    pub fn new(agent_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            task: task.into(),
            role: None,
            caller: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }
}

/// Handle returned when an execution is started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionHandle {
    pub id: Uuid,
    pub agent_id: String,
}

impl ExecutionHandle {
    pub fn new(id: Uuid, agent_id: String) -> Self {
        Self { id, agent_id }
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }
}

/// Runtime trait for starting and observing executions
/// This is the whole surface a UI or API layer needs
#[async_trait]
pub trait OrchestratorRuntime: Send + Sync {
    /// List configured agents
    fn list_agents(&self) -> Vec<Agent>;

    fn get_agent(&self, id: &str) -> OrchestratorResult<Agent>;

    /// Start an execution; returns before any step runs
    async fn start(&self, request: StartRequest) -> OrchestratorResult<ExecutionHandle>;

    /// Snapshot of an execution
    async fn get_execution(&self, id: &Uuid) -> OrchestratorResult<Execution>;

    /// Most recently started executions, newest first
    async fn list_recent(&self, limit: usize) -> Vec<Execution>;

    /// Stop an execution from starting further steps
    async fn cancel(&self, id: &Uuid) -> OrchestratorResult<()>;

    /// Subscribe to telemetry events of all executions
    async fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent>;

    /// Wait until an execution reaches a terminal state
    async fn wait_for_completion(&self, id: &Uuid) -> OrchestratorResult<Execution>;
}

// ============================================================================
// Console Logging Macros (for the CLI)
// ============================================================================
// Colored console output for humans, complementing the structured
// ExecutionEvent stream.
// ============================================================================

/// Logs an informational message.
///
/// # Example
/// ```
/// use agent_orchestrator_sdk::log_info;
/// log_info!("Loading agents...");
/// ```
#[macro_export]
macro_rules! log_info {
    ($message:expr) => {
        println!("\x1b[36mℹ {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[36mℹ {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs a warning message.
///
/// # Example
/// ```
/// use agent_orchestrator_sdk::log_warning;
/// log_warning!("No config file found");
/// ```
#[macro_export]
macro_rules! log_warning {
    ($message:expr) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", $message);
    };
    ($fmt:expr, $($arg:tt)*) => {
        println!("\x1b[33m⚠ Warning: {}\x1b[0m", format!($fmt, $($arg)*));
    };
}

/// Logs the number of items found.
///
/// # Example
/// ```
/// use agent_orchestrator_sdk::log_found;
/// log_found!(3, "agents");
/// ```
#[macro_export]
macro_rules! log_found {
    ($count:expr, $item_type:expr) => {
        println!("\x1b[36mFound {} {}\x1b[0m", $count, $item_type);
    };
}

/// Logs the outcome of a single step.
///
/// # Example
/// ```
/// use agent_orchestrator_sdk::log_step_result;
/// log_step_result!("step-1", "text_processor", "summarize", true, 12);
/// ```
///
/// Outputs:
/// ```text
///   ✓ step-1 text_processor/summarize (12ms)
/// ```
#[macro_export]
macro_rules! log_step_result {
    ($step_id:expr, $capability:expr, $action:expr, $ok:expr, $duration_ms:expr) => {
        if $ok {
            println!(
                "\x1b[32m  ✓ {} {}/{} ({}ms)\x1b[0m",
                $step_id, $capability, $action, $duration_ms
            );
        } else {
            println!(
                "\x1b[31m  ✗ {} {}/{} ({}ms)\x1b[0m",
                $step_id, $capability, $action, $duration_ms
            );
        }
    };
}

/// Logs aggregate statistics of an execution.
///
/// # Example
/// ```
/// use agent_orchestrator_sdk::log_execution_stats;
/// log_execution_stats!(2, 1234, 100.0);
/// ```
///
/// Outputs:
/// ```text
/// Total: 2 steps, 1.2s, 100% success
/// ```
#[macro_export]
macro_rules! log_execution_stats {
    ($step_count:expr, $elapsed_ms:expr, $success_rate:expr) => {
        println!(
            "\x1b[1mTotal: {} steps, {:.1}s, {:.0}% success\x1b[0m",
            $step_count,
            $elapsed_ms as f64 / 1000.0,
            $success_rate
        );
    };
}
