//! Telemetry fan-out: optional sink plus a broadcast channel for subscribers

use agent_orchestrator_sdk::{EventSink, ExecutionEvent, ExecutionStatus, StepStatus};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Line prefix used by [`JsonLinesSink`]
pub const EVENT_LINE_PREFIX: &str = "__ORCH_EVENT__:";

/// Delivers every event to the configured sink and to broadcast subscribers
#[derive(Clone)]
pub struct Telemetry {
    sink: Option<Arc<dyn EventSink>>,
    events_tx: broadcast::Sender<ExecutionEvent>,
}

impl Telemetry {
    pub fn new(buffer: usize) -> Self {
        let (events_tx, _) = broadcast::channel(buffer.max(1));
        Self {
            sink: None,
            events_tx,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn emit(&self, event: ExecutionEvent) {
        if let Some(sink) = &self.sink {
            sink.emit(&event);
        }
        // No subscribers is not an error
        let _ = self.events_tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.events_tx.subscribe()
    }
}

/// Maps events to `tracing` records
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::ExecutionStarted {
                execution_id,
                agent_id,
                task_digest,
                planned_steps,
            } => info!(
                %execution_id,
                agent = %agent_id,
                %task_digest,
                planned_steps,
                "Execution started"
            ),
            ExecutionEvent::ExecutionFinished {
                execution_id,
                agent_id,
                task_digest,
                outcome,
                duration_ms,
            } => match outcome {
                ExecutionStatus::Failed => warn!(
                    %execution_id,
                    agent = %agent_id,
                    %task_digest,
                    duration_ms,
                    "Execution failed"
                ),
                _ => info!(
                    %execution_id,
                    agent = %agent_id,
                    %task_digest,
                    %outcome,
                    duration_ms,
                    "Execution finished"
                ),
            },
            ExecutionEvent::StepStarted {
                execution_id,
                step_id,
                capability,
                action,
            } => info!(%execution_id, step_id = %step_id, %capability, %action, "Step started"),
            ExecutionEvent::StepFinished {
                execution_id,
                step_id,
                capability,
                action,
                outcome,
                duration_ms,
            } => match outcome {
                StepStatus::Failed => warn!(
                    %execution_id,
                    step_id = %step_id,
                    %capability,
                    %action,
                    duration_ms,
                    "Step failed"
                ),
                _ => info!(
                    %execution_id,
                    step_id = %step_id,
                    %capability,
                    %action,
                    duration_ms,
                    "Step completed"
                ),
            },
        }
    }
}

/// Writes `__ORCH_EVENT__:<json>` lines to stderr for a supervising process
pub struct JsonLinesSink;

impl EventSink for JsonLinesSink {
    fn emit(&self, event: &ExecutionEvent) {
        if let Ok(json) = serde_json::to_string(event) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}{}", EVENT_LINE_PREFIX, json);
            let _ = stderr.flush();
        }
    }
}

/// Parse a line written by [`JsonLinesSink`]
pub fn parse_event_line(line: &str) -> Option<ExecutionEvent> {
    line.strip_prefix(EVENT_LINE_PREFIX)
        .and_then(|json| serde_json::from_str(json).ok())
}
