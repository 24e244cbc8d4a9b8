//! Plan construction

use agent_orchestrator_sdk::{
    annotate_role, Agent, OrchestratorError, OrchestratorResult, ROLE_CAPABILITY,
};

/// Ordered list of capability ids an execution commits to running
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Task as stored on the execution, role-annotated when role-scoped
    pub task: String,
    /// Task as the caller wrote it
    pub request_task: String,
    pub role: Option<String>,
    pub steps: Vec<String>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn is_role_scoped(&self) -> bool {
        self.role.is_some()
    }
}

/// Build the plan for `task` on `agent`
///
/// A non-empty role on an agent that supports roles yields a single
/// role step. Otherwise the agent's capabilities are used in declared
/// order, truncated to `max_width`. Blank capability ids are skipped.
/// Roles containing `]` are rejected since they would end the annotation early.
pub fn build_plan(
    agent: &Agent,
    task: &str,
    role: Option<&str>,
    max_width: usize,
) -> OrchestratorResult<Plan> {
    let role = role.map(str::trim).filter(|r| !r.is_empty());

    if let (Some(role), true) = (role, agent.supports_roles) {
        if role.contains(']') {
            return Err(OrchestratorError::InvalidRole(role.to_string()));
        }
        return Ok(Plan {
            task: annotate_role(role, task),
            request_task: task.to_string(),
            role: Some(role.to_string()),
            steps: vec![ROLE_CAPABILITY.to_string()],
        });
    }

    let steps: Vec<String> = agent
        .capabilities
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .take(max_width)
        .map(str::to_string)
        .collect();

    if steps.is_empty() {
        return Err(OrchestratorError::PlanEmpty(agent.id.clone()));
    }

    Ok(Plan {
        task: task.to_string(),
        request_task: task.to_string(),
        role: None,
        steps,
    })
}
