//! Error taxonomy shared by the runtime and capability implementations

use thiserror::Error;
use uuid::Uuid;

use crate::FailureKind;

/// Failure reported by (or on behalf of) a capability handler.
///
/// Always recorded on the step that produced it and never returned to the
/// caller that started the execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    /// The handler ran and reported failure
    #[error("{0}")]
    Failed(String),

    /// The handler did not finish within the per-step timeout
    #[error("step timed out after {0}ms")]
    Timeout(u64),

    /// The handler panicked while running
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// The backend could not be reached
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with something that is not usable output
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl CapabilityError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Failure marker kind recorded on the execution result
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Panicked(_) => FailureKind::Panicked,
            Self::Failed(_) | Self::Transport(_) | Self::InvalidResponse(_) => {
                FailureKind::CapabilityError
            }
        }
    }
}

/// Synchronous errors of the orchestration engine
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The agent resolved to a plan with zero steps
    #[error("agent '{0}' has no usable capabilities")]
    PlanEmpty(String),

    /// Role names must not contain `]`
    #[error("invalid role '{0}'")]
    InvalidRole(String),

    #[error("agent '{0}' not found")]
    UnknownAgent(String),

    /// `update` was called for an execution the store does not hold
    #[error("execution {0} does not exist in the store")]
    StoreConflict(Uuid),

    #[error("execution {0} not found")]
    ExecutionNotFound(Uuid),

    /// A state machine was asked to leave a terminal state or skip one
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("configuration error: {0}")]
    Config(String),
}
