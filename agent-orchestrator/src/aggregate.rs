//! Folding step outcomes into an execution result
//!
//! Everything here is deterministic: the same agent, task and steps always
//! produce the same result.

use agent_orchestrator_sdk::{
    Agent, ExecutionResult, FailureKind, FailureMarker, Step, StepStatus,
};

const MAX_NOTES: usize = 3;

/// Result of an execution whose steps all completed
pub fn aggregate_success(
    agent: &Agent,
    task: &str,
    role: Option<&str>,
    steps: &[Step],
) -> ExecutionResult {
    let capabilities_used = completed_capabilities(steps);
    ExecutionResult {
        summary: format!(
            "{} completed \"{}\" in {} step{}",
            agent.name,
            task,
            steps.len(),
            if steps.len() == 1 { "" } else { "s" }
        ),
        capabilities_used,
        elapsed_ms: elapsed_ms(steps),
        success_rate: 100.0,
        insights: derive_insights(agent, role),
        recommendations: derive_recommendations(agent, role),
        failure: None,
    }
}

/// Result of an execution that stopped early
pub fn aggregate_failure(
    agent: &Agent,
    task: &str,
    steps: &[Step],
    marker: FailureMarker,
) -> ExecutionResult {
    let run = steps
        .iter()
        .filter(|s| s.status() != StepStatus::Running)
        .count();
    let completed = steps
        .iter()
        .filter(|s| s.status() == StepStatus::Completed)
        .count();
    let success_rate = if run == 0 {
        0.0
    } else {
        completed as f64 * 100.0 / run as f64
    };

    let location = match (&marker.step_id, &marker.capability) {
        (Some(step_id), Some(capability)) => format!("{} ({})", step_id, capability),
        (Some(step_id), None) => step_id.clone(),
        _ => "before the next step".to_string(),
    };

    ExecutionResult {
        summary: format!(
            "{} failed \"{}\" at {}: {}",
            agent.name, task, location, marker.reason
        ),
        capabilities_used: completed_capabilities(steps),
        elapsed_ms: elapsed_ms(steps),
        success_rate,
        insights: Vec::new(),
        recommendations: vec![failure_recommendation(&marker)],
        failure: Some(marker),
    }
}

fn completed_capabilities(steps: &[Step]) -> Vec<String> {
    steps
        .iter()
        .filter(|s| s.status() == StepStatus::Completed)
        .map(|s| s.capability.clone())
        .collect()
}

fn elapsed_ms(steps: &[Step]) -> u64 {
    steps.iter().filter_map(Step::duration_ms).sum()
}

fn derive_insights(agent: &Agent, role: Option<&str>) -> Vec<String> {
    let mut insights: Vec<String> = Vec::new();
    if let Some(role) = role {
        insights.push(format!("Answered from the perspective of the {} role", role));
    }
    insights.extend(agent.tags.iter().map(|tag| tag_insight(tag)));
    if insights.is_empty() {
        insights.push(format!(
            "{} ran every planned capability without errors",
            agent.name
        ));
    }
    insights.truncate(MAX_NOTES);
    insights
}

fn tag_insight(tag: &str) -> String {
    match tag {
        "writing" => "Output was drafted for a reader-facing audience".to_string(),
        "summarization" => "Key points were condensed into a short summary".to_string(),
        "code_review" => "Code was checked for defects and maintainability".to_string(),
        "documentation" => "Explanations are suitable for project documentation".to_string(),
        "research" => "Findings are drawn from gathered sources".to_string(),
        "data_analysis" => "Quantitative signals were extracted from the data".to_string(),
        "automation" => "Repeatable parts of the task were automated".to_string(),
        other => format!("Applied {} expertise", other.replace('_', " ")),
    }
}

fn derive_recommendations(agent: &Agent, role: Option<&str>) -> Vec<String> {
    let mut recommendations = Vec::new();
    if let Some(role) = role {
        recommendations.push(format!(
            "Ask follow-up questions with the {} role to keep the same framing",
            role
        ));
    }
    if let Some(personality) = &agent.personality {
        recommendations.push(format!(
            "Responses use a {} personality; change it in the agent configuration if the tone does not fit",
            personality
        ));
    }
    if agent.tags.is_empty() {
        recommendations
            .push("Declare capability tags on this agent to get more specific insights".to_string());
    }
    recommendations.push("Review the step outputs before acting on the summary".to_string());
    recommendations.truncate(MAX_NOTES);
    recommendations
}

fn failure_recommendation(marker: &FailureMarker) -> String {
    let capability = marker.capability.as_deref().unwrap_or("capability");
    match marker.kind {
        FailureKind::CapabilityError => format!(
            "Inspect the {} step output and start a new execution once the cause is fixed",
            capability
        ),
        FailureKind::Timeout => format!(
            "Raise step_timeout_secs or check the latency of the {} backend",
            capability
        ),
        FailureKind::Panicked => format!(
            "The {} handler panicked; report it to the capability owner",
            capability
        ),
        FailureKind::Cancelled => {
            "The execution was cancelled; start a new one to run the remaining steps".to_string()
        }
        FailureKind::Internal => {
            "The engine stopped this execution; check the orchestrator logs".to_string()
        }
    }
}
