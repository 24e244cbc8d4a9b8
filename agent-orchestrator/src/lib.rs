// Capability registry and implementations
pub mod capabilities;

// Configuration loading
pub mod config;

// Execution store
pub mod store;

// Plan construction
pub mod plan;

// Single step execution
pub mod step_runner;

// Result aggregation
pub mod aggregate;

// Telemetry sinks
pub mod events;

// In-flight execution tracking
pub mod handles;

// Execution orchestrator
pub mod orchestrator;

pub use capabilities::CapabilityRegistry;
pub use config::{Config, OrchestratorSettings};
pub use orchestrator::Orchestrator;
pub use store::ExecutionStore;
