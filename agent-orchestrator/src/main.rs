use agent_orchestrator::events::{JsonLinesSink, TracingSink};
use agent_orchestrator::{Config, Orchestrator};
use agent_orchestrator_sdk::{
    log_execution_stats, log_found, log_info, log_step_result, log_warning, Execution,
    ExecutionStatus, OrchestratorRuntime, StartRequest, StepStatus,
};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Run tasks against configured agents
#[derive(Parser, Debug)]
#[command(name = "agent-orchestrator", version, about)]
struct Cli {
    /// Path to the YAML config (defaults to ~/.agent-orchestrator/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write structured execution events to stderr
    #[arg(long, global = true)]
    events: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured agents
    Agents,

    /// Run one task and wait for the result
    Run {
        /// Agent id
        #[arg(short, long)]
        agent: String,

        /// Task description
        #[arg(short, long)]
        task: String,

        /// Role for agents that support role-scoped execution
        #[arg(short, long)]
        role: Option<String>,

        /// Caller identity recorded on the execution
        #[arg(long)]
        caller: Option<String>,

        /// Print the execution as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run several tasks concurrently against one agent
    Batch {
        /// Agent id
        #[arg(short, long)]
        agent: String,

        /// Task descriptions (repeat the flag)
        #[arg(short, long, required = true)]
        task: Vec<String>,

        /// Print the executions as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::resolve(cli.config.as_deref())?;
    config.apply_env_overrides();

    let orchestrator = Orchestrator::from_config(&config)?;
    let orchestrator = if cli.events {
        orchestrator.with_sink(Arc::new(JsonLinesSink))
    } else {
        orchestrator.with_sink(Arc::new(TracingSink))
    };

    match cli.command {
        Command::Agents => list_agents(&orchestrator),
        Command::Run {
            agent,
            task,
            role,
            caller,
            json,
        } => {
            let mut request = StartRequest::new(agent, task);
            request.role = role;
            request.caller = caller;

            let handle = orchestrator.start(request).await?;
            let execution = orchestrator.wait_for_completion(handle.id()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&execution)?);
            } else {
                print_execution(&execution);
            }
            if execution.status() == ExecutionStatus::Failed {
                return Err(anyhow!("execution {} failed", execution.id));
            }
        }
        Command::Batch { agent, task, json } => {
            let mut handles = Vec::new();
            for task in task {
                handles.push(orchestrator.start(StartRequest::new(agent.clone(), task)).await?);
            }
            log_info!("Started {} executions", handles.len());

            let waits = handles
                .iter()
                .map(|handle| orchestrator.wait_for_completion(handle.id()));
            let executions = futures::future::try_join_all(waits).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&executions)?);
            } else {
                for execution in &executions {
                    print_execution(execution);
                }
            }
        }
    }

    orchestrator.shutdown().await;
    Ok(())
}

fn list_agents(orchestrator: &Orchestrator) {
    let agents = orchestrator.list_agents();
    log_found!(agents.len(), "agents");
    for agent in agents {
        let role_note = if agent.supports_roles { " [roles]" } else { "" };
        println!("  {} - {}{}", agent.id, agent.name, role_note);
        if !agent.description.is_empty() {
            println!("      {}", agent.description);
        }
        println!("      capabilities: {}", agent.capabilities.join(", "));
    }
}

fn print_execution(execution: &Execution) {
    log_info!(
        "{} · {} · {}",
        execution.agent_name,
        execution.task,
        execution.status()
    );
    for step in execution.steps() {
        log_step_result!(
            step.id,
            step.capability,
            step.action,
            step.status() == StepStatus::Completed,
            step.duration_ms().unwrap_or_default()
        );
    }

    if let Some(result) = execution.result() {
        println!("{}", result.summary);
        if let Some(failure) = &result.failure {
            log_warning!("{}: {}", failure.kind, failure.reason);
        }
        for insight in &result.insights {
            println!("  • {}", insight);
        }
        for recommendation in &result.recommendations {
            println!("  → {}", recommendation);
        }
        log_execution_stats!(
            execution.steps().len(),
            result.elapsed_ms,
            result.success_rate
        );
    }
}
