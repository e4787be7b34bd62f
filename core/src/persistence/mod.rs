//! Persistence Adapter: typed queries/commands against a relational store
//! with JSON column support (spec §6, "Persistence schema").
//!
//! One method family per logical table. JSON encoding is centralized in
//! each implementation rather than scattered across callers, per Design
//! Notes §9 ("JSON columns").

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use agentaskit_shared::errors::CoreResult;
use agentaskit_shared::ids::{AgentId, TaskId};
use agentaskit_shared::models::{
    Agent, Alert, LeaderRecord, LeaderTransition, ManualTask, MetricSample, QueueStats,
    ScalingDecision, Task, TaskDecomposition, Worker,
};

#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    // agents
    async fn insert_agent(&self, agent: &Agent) -> CoreResult<()>;
    async fn update_agent(&self, agent: &Agent) -> CoreResult<()>;
    async fn delete_agent(&self, id: AgentId) -> CoreResult<()>;
    async fn get_agent(&self, id: AgentId) -> CoreResult<Option<Agent>>;
    async fn get_agent_by_name(&self, name: &str) -> CoreResult<Option<Agent>>;
    async fn list_agents(&self) -> CoreResult<Vec<Agent>>;

    // tasks + decompositions
    async fn insert_task(&self, task: &Task) -> CoreResult<()>;
    async fn update_task(&self, task: &Task) -> CoreResult<()>;
    async fn get_task(&self, id: TaskId) -> CoreResult<Option<Task>>;
    async fn upsert_decomposition(&self, decomposition: &TaskDecomposition) -> CoreResult<()>;
    async fn get_decomposition(&self, task_id: TaskId) -> CoreResult<Option<TaskDecomposition>>;

    // performance
    async fn insert_metric_samples(&self, samples: &[MetricSample]) -> CoreResult<()>;
    async fn get_metric_samples(
        &self,
        agent_id: AgentId,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<MetricSample>>;

    // alerts
    async fn upsert_alert(&self, alert: &Alert) -> CoreResult<()>;
    async fn get_alert(&self, id: &str) -> CoreResult<Option<Alert>>;
    async fn list_alerts(&self) -> CoreResult<Vec<Alert>>;
    async fn delete_alert(&self, id: &str) -> CoreResult<()>;

    // workers + worker events
    async fn upsert_worker(&self, worker: &Worker) -> CoreResult<()>;
    async fn get_worker(&self, worker_id: &str) -> CoreResult<Option<Worker>>;
    async fn list_workers(&self) -> CoreResult<Vec<Worker>>;
    async fn record_worker_event(
        &self,
        worker_id: &str,
        event: &str,
        metadata: serde_json::Value,
    ) -> CoreResult<()>;

    // queue stats + scaling decisions
    async fn insert_queue_stats(&self, stats: &QueueStats) -> CoreResult<()>;
    async fn insert_scaling_decision(&self, decision: &ScalingDecision) -> CoreResult<()>;

    // leader election
    async fn get_leader_record(&self, role: &str) -> CoreResult<Option<LeaderRecord>>;
    /// Atomically installs `record` iff the stored record for `record.role`
    /// is absent, expired, or already held by `record.node_id`. Returns
    /// whether the claim succeeded.
    async fn compare_and_set_leader(&self, record: &LeaderRecord, now: DateTime<Utc>)
        -> CoreResult<bool>;
    async fn append_leader_history(&self, transition: &LeaderTransition) -> CoreResult<()>;

    // manual intervention
    async fn upsert_manual_task(&self, task: &ManualTask) -> CoreResult<()>;
    async fn find_open_manual_task(
        &self,
        source_system: &str,
        source_id: &str,
    ) -> CoreResult<Option<ManualTask>>;

    // error logs
    async fn record_error_log(
        &self,
        context: &str,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> CoreResult<()>;
}
