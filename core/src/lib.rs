//! AgentAsKit orchestration core.
//!
//! Four subsystems — Agent Registry, Orchestrator, Distributed Task
//! Service, Performance Monitor — assembled by [`runtime::CoreRuntime`]
//! and backed by pluggable persistence/broker/LLM adapters.

pub mod api;
pub mod broker;
pub mod distributed;
pub mod llm;
pub mod manual_intervention;
pub mod orchestrator;
pub mod performance;
pub mod persistence;
pub mod registry;
pub mod runtime;

pub use runtime::CoreRuntime;

/// Installs the process-wide tracing subscriber. The only permitted
/// global: every other dependency flows through `CoreRuntime`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
