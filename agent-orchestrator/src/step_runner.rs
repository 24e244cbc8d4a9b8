//! Runs a single step of an execution against a capability

use agent_orchestrator_sdk::{
    Capability, CapabilityError, ExecutionEvent, OrchestratorResult, Step, StepStatus,
};
use futures::FutureExt;
use serde_json::{json, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::capabilities::{CapabilityRegistry, FALLBACK_ACTION};
use crate::events::Telemetry;
use crate::store::ExecutionStore;

/// Executes steps; holds no per-execution state
#[derive(Clone)]
pub struct StepRunner {
    registry: Arc<CapabilityRegistry>,
    store: Arc<ExecutionStore>,
    step_timeout: Duration,
    telemetry: Telemetry,
}

impl StepRunner {
    pub fn new(
        registry: Arc<CapabilityRegistry>,
        store: Arc<ExecutionStore>,
        step_timeout: Duration,
        telemetry: Telemetry,
    ) -> Self {
        Self {
            registry,
            store,
            step_timeout,
            telemetry,
        }
    }

    /// Run `capability_id` for `task` as the next step of an execution
    ///
    /// The step is appended as running before the handler is invoked, so
    /// readers can observe it in flight. Handler errors, timeouts and panics
    /// all end the step as failed; they are not returned as `Err`. A panic
    /// while deriving the action or input records the step with the fallback
    /// action and fails it without invoking the handler. Errors from this
    /// function are store errors only.
    pub async fn run_step(
        &self,
        execution_id: Uuid,
        capability_id: &str,
        task: &str,
    ) -> OrchestratorResult<Step> {
        let capability = self.registry.get(capability_id);
        let derived = std::panic::catch_unwind(AssertUnwindSafe(|| {
            (capability.resolve_action(task), capability.build_input(task))
        }));
        let (action, input, derive_error) = match derived {
            Ok((action, input)) => (action, input, None),
            Err(panic) => (
                FALLBACK_ACTION.to_string(),
                json!({ "task": task }),
                Some(CapabilityError::Panicked(panic_message(panic))),
            ),
        };

        let step = self.store.try_update(&execution_id, |execution| {
            execution.begin_step(capability_id, action.clone(), input.clone())
        })?;
        debug!(%execution_id, step_id = %step.id, capability = capability_id, %action, "Step started");
        self.telemetry.emit(ExecutionEvent::StepStarted {
            execution_id,
            step_id: step.id.clone(),
            capability: capability_id.to_string(),
            action: action.clone(),
        });

        let started = Instant::now();
        let outcome = match derive_error {
            Some(err) => Err(err),
            None => self.invoke(capability, input).await,
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        let recorded = match outcome {
            Ok(output) => Ok(output),
            Err(err) => {
                warn!(%execution_id, step_id = %step.id, capability = capability_id, error = %err, "Step failed");
                Err(failure_output(&err))
            }
        };

        let step = self.store.try_update(&execution_id, |execution| {
            execution.finish_step(&step.id, recorded, duration_ms)
        })?;
        self.telemetry.emit(ExecutionEvent::StepFinished {
            execution_id,
            step_id: step.id.clone(),
            capability: step.capability.clone(),
            action: step.action.clone(),
            outcome: step.status(),
            duration_ms,
        });
        if step.status() == StepStatus::Completed {
            debug!(%execution_id, step_id = %step.id, duration_ms, "Step completed");
        }

        Ok(step)
    }

    /// Invoke the handler under the step timeout, turning panics into errors
    async fn invoke(
        &self,
        capability: Arc<dyn Capability>,
        input: Value,
    ) -> Result<Value, CapabilityError> {
        let invocation = AssertUnwindSafe(capability.invoke(input)).catch_unwind();
        match tokio::time::timeout(self.step_timeout, invocation).await {
            Ok(Ok(result)) => result,
            Ok(Err(panic)) => Err(CapabilityError::Panicked(panic_message(panic))),
            Err(_) => Err(CapabilityError::Timeout(self.step_timeout.as_millis() as u64)),
        }
    }
}

/// Output recorded on a failed step
pub fn failure_output(err: &CapabilityError) -> Value {
    json!({
        "error": err.to_string(),
        "kind": err.failure_kind(),
    })
}

pub(crate) fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
