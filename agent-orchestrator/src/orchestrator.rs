//! Execution orchestrator
//!
//! `start` validates the request, builds the plan, records a running
//! execution and spawns a task that owns it until a terminal state. Steps of
//! one execution run strictly in plan order; different executions run
//! concurrently, bounded by a shared worker pool.

use agent_orchestrator_sdk::{
    async_trait, task_digest, Agent, EventSink, Execution, ExecutionEvent,
    ExecutionHandle, ExecutionResult, ExecutionStatus, FailureKind, FailureMarker,
    OrchestratorError, OrchestratorResult, OrchestratorRuntime, StartRequest, Step, StepStatus,
};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::aggregate::{aggregate_failure, aggregate_success};
use crate::capabilities::CapabilityRegistry;
use crate::config::{Config, OrchestratorSettings};
use crate::events::Telemetry;
use crate::handles::ExecutionHandles;
use crate::plan::{build_plan, Plan};
use crate::step_runner::{panic_message, StepRunner};
use crate::store::ExecutionStore;

/// Drives executions; cheap to clone, all clones share state
#[derive(Clone)]
pub struct Orchestrator {
    agents: Arc<HashMap<String, Agent>>,
    registry: Arc<CapabilityRegistry>,
    store: Arc<ExecutionStore>,
    settings: OrchestratorSettings,
    pool: Arc<Semaphore>,
    telemetry: Telemetry,
    handles: ExecutionHandles,
}

impl Orchestrator {
    pub fn new(
        settings: OrchestratorSettings,
        registry: CapabilityRegistry,
        store: Arc<ExecutionStore>,
    ) -> Self {
        let pool = Arc::new(Semaphore::new(settings.max_concurrent_executions.max(1)));
        let telemetry = Telemetry::new(settings.event_buffer);
        Self {
            agents: Arc::new(HashMap::new()),
            registry: Arc::new(registry),
            store,
            settings,
            pool,
            telemetry,
            handles: ExecutionHandles::new(),
        }
    }

    /// Orchestrator for a loaded configuration, with its own store
    pub fn from_config(config: &Config) -> OrchestratorResult<Self> {
        config.validate()?;
        let settings = config.orchestrator.clone();
        let store = match settings.store_capacity {
            Some(capacity) => ExecutionStore::with_capacity(capacity),
            None => ExecutionStore::new(),
        };
        let registry = CapabilityRegistry::from_settings(settings.generation.as_ref());
        Ok(Self::new(settings, registry, Arc::new(store)).with_agents(config.agents.clone()))
    }

    pub fn with_agents(mut self, agents: Vec<Agent>) -> Self {
        self.agents = Arc::new(agents.into_iter().map(|a| (a.id.clone(), a)).collect());
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.telemetry = self.telemetry.with_sink(sink);
        self
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<ExecutionStore> {
        &self.store
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Start an execution for an agent that is not part of the configuration
    ///
    /// Plan errors are returned synchronously; nothing is stored for them.
    pub async fn start_with_agent(
        &self,
        agent: Agent,
        task: impl Into<String>,
        role: Option<String>,
        caller: Option<String>,
    ) -> OrchestratorResult<ExecutionHandle> {
        let task = task.into();
        let plan = build_plan(&agent, &task, role.as_deref(), self.settings.max_plan_width)?;

        let execution = Execution::new(&agent, plan.task.clone(), caller);
        let execution_id = execution.id;
        // Cancellable as soon as it is visible in the store
        let token = self.handles.register(execution_id).await;
        let evicted = self.store.append(execution);
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "Store evicted finished executions");
        }

        self.telemetry.emit(ExecutionEvent::ExecutionStarted {
            execution_id,
            agent_id: agent.id.clone(),
            task_digest: task_digest(&plan.task),
            planned_steps: plan.len(),
        });

        let handle = ExecutionHandle::new(execution_id, agent.id.clone());
        let this = self.clone();
        let join = tokio::spawn(async move {
            this.drive(execution_id, agent, plan, token).await;
        });
        self.handles.attach(execution_id, join).await;

        Ok(handle)
    }

    /// Signal every in-flight execution to stop and wait for them to settle
    pub async fn shutdown(&self) {
        for join in self.handles.cancel_everything().await {
            let _ = join.await;
        }
    }

    pub async fn active_executions(&self) -> usize {
        self.handles.active_count().await
    }

    /// Owns the execution until it is terminal, whatever `run_plan` does
    async fn drive(self, execution_id: Uuid, agent: Agent, plan: Plan, token: CancellationToken) {
        let started = Instant::now();
        let run = AssertUnwindSafe(self.run_plan(execution_id, &agent, &plan, &token))
            .catch_unwind()
            .await;
        let outcome = match run {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!(%execution_id, agent = %agent.id, error = %e, "Execution aborted");
                self.abort(execution_id, &agent, &plan, e.to_string())
            }
            Err(panic) => {
                let reason = format!("driver panicked: {}", panic_message(panic));
                error!(%execution_id, agent = %agent.id, %reason, "Execution aborted");
                self.abort(execution_id, &agent, &plan, reason)
            }
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(%execution_id, agent = %agent.id, %outcome, duration_ms, "Execution finished");
        self.telemetry.emit(ExecutionEvent::ExecutionFinished {
            execution_id,
            agent_id: agent.id.clone(),
            task_digest: task_digest(&plan.task),
            outcome,
            duration_ms,
        });
        self.handles.finish(&execution_id).await;
    }

    /// Fail an execution whose driver hit an engine error
    ///
    /// An execution that already reached a terminal state keeps it.
    fn abort(&self, execution_id: Uuid, agent: &Agent, plan: &Plan, reason: String) -> ExecutionStatus {
        let marker = FailureMarker {
            kind: FailureKind::Internal,
            reason,
            step_id: None,
            capability: None,
        };
        match self.finish_failed(execution_id, agent, plan, marker) {
            Ok(status) => status,
            Err(e) => {
                debug!(%execution_id, error = %e, "Execution already settled");
                self.store
                    .get(&execution_id)
                    .map(|execution| execution.status())
                    .unwrap_or(ExecutionStatus::Failed)
            }
        }
    }

    async fn run_plan(
        &self,
        execution_id: Uuid,
        agent: &Agent,
        plan: &Plan,
        token: &CancellationToken,
    ) -> OrchestratorResult<ExecutionStatus> {
        // Held until the last step finishes
        let _permit = tokio::select! {
            permit = self.pool.clone().acquire_owned() => permit.map_err(|_| {
                OrchestratorError::Config("worker pool closed".to_string())
            })?,
            _ = token.cancelled() => return self.finish_cancelled(execution_id, agent, plan, 0),
        };

        let runner = StepRunner::new(
            self.registry.clone(),
            self.store.clone(),
            self.settings.step_timeout(),
            self.telemetry.clone(),
        );

        for (index, capability) in plan.steps.iter().enumerate() {
            if token.is_cancelled() {
                return self.finish_cancelled(execution_id, agent, plan, index);
            }

            let step = runner.run_step(execution_id, capability, &plan.task).await?;
            if step.status() == StepStatus::Failed {
                let marker = failure_marker(&step);
                return self.finish_failed(execution_id, agent, plan, marker);
            }
        }

        let role = plan.role.as_deref();
        self.store.try_update(&execution_id, |execution| {
            let result = aggregate_success(agent, &plan.request_task, role, execution.steps());
            execution.complete(result)
        })?;
        Ok(ExecutionStatus::Completed)
    }

    fn finish_cancelled(
        &self,
        execution_id: Uuid,
        agent: &Agent,
        plan: &Plan,
        next_index: usize,
    ) -> OrchestratorResult<ExecutionStatus> {
        let reason = match plan.steps.get(next_index) {
            Some(capability) => format!(
                "cancelled before step {} ({}) started",
                next_index + 1,
                capability
            ),
            None => "cancelled".to_string(),
        };
        let marker = FailureMarker {
            kind: FailureKind::Cancelled,
            reason,
            step_id: None,
            capability: None,
        };
        self.finish_failed(execution_id, agent, plan, marker)
    }

    fn finish_failed(
        &self,
        execution_id: Uuid,
        agent: &Agent,
        plan: &Plan,
        marker: FailureMarker,
    ) -> OrchestratorResult<ExecutionStatus> {
        self.store.try_update(&execution_id, |execution| {
            let result: ExecutionResult =
                aggregate_failure(agent, &plan.request_task, execution.steps(), marker);
            execution.fail(result)
        })?;
        Ok(ExecutionStatus::Failed)
    }
}

/// Failure marker built from the recorded output of a failed step
fn failure_marker(step: &Step) -> FailureMarker {
    let output = step.output();
    let kind = output
        .and_then(|o| serde_json::from_value::<FailureKind>(o["kind"].clone()).ok())
        .unwrap_or(FailureKind::CapabilityError);
    let reason = output
        .and_then(|o| o["error"].as_str())
        .unwrap_or("capability failed")
        .to_string();
    FailureMarker {
        kind,
        reason,
        step_id: Some(step.id.clone()),
        capability: Some(step.capability.clone()),
    }
}

#[async_trait]
impl OrchestratorRuntime for Orchestrator {
    fn list_agents(&self) -> Vec<Agent> {
        let mut agents: Vec<Agent> = self.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }

    fn get_agent(&self, id: &str) -> OrchestratorResult<Agent> {
        self.agents
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownAgent(id.to_string()))
    }

    async fn start(&self, request: StartRequest) -> OrchestratorResult<ExecutionHandle> {
        let agent = self.get_agent(&request.agent_id)?;
        self.start_with_agent(agent, request.task, request.role, request.caller)
            .await
    }

    async fn get_execution(&self, id: &Uuid) -> OrchestratorResult<Execution> {
        self.store
            .get(id)
            .ok_or(OrchestratorError::ExecutionNotFound(*id))
    }

    async fn list_recent(&self, limit: usize) -> Vec<Execution> {
        self.store.list_recent(limit)
    }

    async fn cancel(&self, id: &Uuid) -> OrchestratorResult<()> {
        if !self.store.contains(id) {
            return Err(OrchestratorError::ExecutionNotFound(*id));
        }
        if self.handles.cancel(id).await {
            debug!(execution_id = %id, "Cancellation requested");
        }
        Ok(())
    }

    async fn subscribe_events(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.telemetry.subscribe()
    }

    async fn wait_for_completion(&self, id: &Uuid) -> OrchestratorResult<Execution> {
        // Subscribe before checking so the terminal event cannot be missed
        let mut events = self.telemetry.subscribe();
        loop {
            let execution = self.get_execution(id).await?;
            if execution.is_terminal() {
                return Ok(execution);
            }

            loop {
                match events.recv().await {
                    Ok(event) if event.is_terminal() && event.execution_id() == *id => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => {
                        return self.get_execution(id).await;
                    }
                }
            }
        }
    }
}
