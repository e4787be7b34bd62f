//! Shared data models, identifiers, configuration, and error types used by
//! the orchestration core's crates. Kept free of tokio/sqlx/redis so it can
//! be depended on by lightweight tooling without pulling in the full async
//! stack.

pub mod config;
pub mod errors;
pub mod ids;
pub mod models;

pub use config::CoreConfig;
pub use errors::{CoreError, CoreResult, ErrorEnvelope};
pub use ids::{ensure_uuid, AgentId, SubtaskId, TaskId, ID_NAMESPACE, SYSTEM_AGENT_ID};
