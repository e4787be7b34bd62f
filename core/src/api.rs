//! DTOs for the HTTP surface the core is designed against (spec §6).
//!
//! The core owns no HTTP server; these types are the contract an API
//! layer built on top of `CoreRuntime` would serialize bit-for-bit.

use std::collections::HashMap;

use agentaskit_shared::ids::{AgentId, SubtaskId, TaskId};
use agentaskit_shared::models::{
    Agent, AgentDefinition, AgentPerformanceStats, AgentPatch, Alert, DelegationStrategy,
    DecompositionStrategy, DistributionMode, Priority, Subtask, SubtaskStatus, Task, TaskStatus,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest(pub AgentDefinition);

#[derive(Debug, Deserialize)]
pub struct UpdateAgentRequest(pub AgentPatch);

#[derive(Debug, Deserialize)]
pub struct SubmitTaskRequest {
    pub description: String,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub decomposition_strategy: Option<DecompositionStrategy>,
    #[serde(default)]
    pub delegation_strategy: Option<DelegationStrategy>,
    #[serde(default)]
    pub distribution_mode: Option<DistributionMode>,
}

#[derive(Debug, Serialize)]
pub struct SubmitTaskResponse {
    pub task_id: TaskId,
}

#[derive(Debug, Serialize)]
pub struct SubtaskView {
    pub id: SubtaskId,
    pub status: SubtaskStatus,
    pub assigned_agent: Option<AgentId>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl From<&Subtask> for SubtaskView {
    fn from(s: &Subtask) -> Self {
        Self {
            id: s.id.clone(),
            status: s.status,
            assigned_agent: s.assigned_agent,
            result: s.result.clone(),
            error: s.error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: TaskId,
    pub status: TaskStatus,
    pub description: String,
    pub subtasks: Vec<SubtaskView>,
    /// Percentage of subtasks in a terminal state (`completed` or
    /// `failed`), 0-100. 100 for tasks with no decomposition yet.
    pub progress_percent: u8,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl TaskView {
    pub fn build(task: &Task, subtasks: &[Subtask]) -> Self {
        let progress_percent = if subtasks.is_empty() {
            match task.status {
                TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled => 100,
                _ => 0,
            }
        } else {
            let terminal = subtasks
                .iter()
                .filter(|s| matches!(s.status, SubtaskStatus::Completed | SubtaskStatus::Failed))
                .count();
            ((terminal as f64 / subtasks.len() as f64) * 100.0).round() as u8
        };

        Self {
            id: task.id,
            status: task.status,
            description: task.description.clone(),
            subtasks: subtasks.iter().map(SubtaskView::from).collect(),
            progress_percent,
            result: task.result.clone(),
            error: task.error.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
}

fn default_window_hours() -> u32 {
    24
}

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    pub severity: Option<agentaskit_shared::models::AlertSeverity>,
    pub resolved: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterWorkerRequest {
    pub kind: String,
    pub max_tasks: u32,
    pub queue_names: Vec<String>,
    #[serde(default)]
    pub capabilities: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct WorkerHeartbeatRequest {
    pub worker_id: String,
}

#[derive(Debug, Serialize)]
pub struct AgentView(pub Agent);

#[derive(Debug, Serialize)]
pub struct AlertView(pub Alert);

#[derive(Debug, Serialize)]
pub struct AgentPerformanceView(pub AgentPerformanceStats);

#[cfg(test)]
mod tests {
    use super::*;
    use agentaskit_shared::models::Complexity;
    use chrono::Utc;

    fn task() -> Task {
        Task {
            id: uuid::Uuid::new_v4(),
            description: "x".to_string(),
            parameters: None,
            submitted_at: Utc::now(),
            priority: Priority::default(),
            decomposition_strategy: DecompositionStrategy::Sequential,
            delegation_strategy: DelegationStrategy::CapabilityMatch,
            distribution_mode: DistributionMode::Local,
            status: TaskStatus::Processing,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    fn subtask(id: &str, status: SubtaskStatus) -> Subtask {
        Subtask {
            id: id.to_string(),
            description: id.to_string(),
            required_capabilities: vec![],
            estimated_complexity: Complexity::Low,
            dependencies: vec![],
            assigned_agent: None,
            status,
            result: None,
            error: None,
        }
    }

    #[test]
    fn progress_percent_counts_terminal_subtasks_only() {
        let t = task();
        let subtasks = vec![
            subtask("a", SubtaskStatus::Completed),
            subtask("b", SubtaskStatus::InProgress),
        ];
        let view = TaskView::build(&t, &subtasks);
        assert_eq!(view.progress_percent, 50);
    }

    #[test]
    fn no_subtasks_yet_is_zero_percent_unless_terminal() {
        let t = task();
        let view = TaskView::build(&t, &[]);
        assert_eq!(view.progress_percent, 0);
    }
}
