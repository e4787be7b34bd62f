//! Distributed Task Service: bridges the Orchestrator to an out-of-process
//! worker fleet (spec §4.3).
//!
//! Background-loop spawning mirrors the teacher's
//! `OrchestratorEngine::start_health_monitor` pattern: each loop owns a
//! clone of the shared `running` flag and polls on a fixed interval.

pub mod leader;
pub mod queue_stats;
pub mod scaling;
pub mod worker;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentaskit_shared::errors::CoreResult;
use agentaskit_shared::ids::TaskId;
use agentaskit_shared::models::{Subtask, Worker};
use tokio::sync::RwLock;
use tracing::info;

use crate::broker::BrokerAdapter;
use crate::persistence::PersistenceAdapter;

/// Roles with exactly one leader at a time (spec §4.3, "Leader election").
pub const ELECTED_ROLES: &[&str] = &["beat_scheduler", "cleanup_coordinator"];

pub struct DistributedTaskService {
    persistence: Arc<dyn PersistenceAdapter>,
    broker: Arc<dyn BrokerAdapter>,
    node_id: String,
    running: Arc<RwLock<bool>>,
}

impl DistributedTaskService {
    pub fn new(persistence: Arc<dyn PersistenceAdapter>, broker: Arc<dyn BrokerAdapter>, node_id: String) -> Self {
        Self {
            persistence,
            broker,
            node_id,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn register_worker(
        &self,
        kind: &str,
        max_tasks: u32,
        queue_names: Vec<String>,
        capabilities: HashMap<String, serde_json::Value>,
    ) -> CoreResult<Worker> {
        worker::register(self.persistence.as_ref(), kind, max_tasks, queue_names, capabilities).await
    }

    pub async fn heartbeat(&self, worker_id: &str) -> CoreResult<()> {
        worker::heartbeat(self.persistence.as_ref(), worker_id).await
    }

    pub async fn unregister_worker(&self, worker_id: &str) -> CoreResult<()> {
        worker::unregister(self.persistence.as_ref(), worker_id).await
    }

    /// DISTRIBUTED mode: push the whole task onto `queue_name` directly.
    pub async fn dispatch_task(&self, queue_name: &str, task_id: TaskId, priority: u8) -> CoreResult<()> {
        self.broker
            .enqueue(
                queue_name,
                priority,
                serde_json::json!({ "task_id": task_id, "kind": "task" }),
            )
            .await
    }

    /// HYBRID mode: push each subtask with its parent task UUID and
    /// dependency metadata; workers gate on dependencies via the
    /// persistence adapter before starting.
    pub async fn dispatch_subtasks(
        &self,
        queue_name: &str,
        task_id: TaskId,
        subtasks: &[Subtask],
        priority: u8,
    ) -> CoreResult<()> {
        for subtask in subtasks {
            self.broker
                .enqueue(
                    queue_name,
                    priority,
                    serde_json::json!({
                        "task_id": task_id,
                        "subtask_id": subtask.id,
                        "dependencies": subtask.dependencies,
                        "kind": "subtask",
                    }),
                )
                .await?;
        }
        Ok(())
    }

    pub async fn queue_stats(&self, queue_name: &str) -> CoreResult<agentaskit_shared::models::QueueStats> {
        queue_stats::sample(self.persistence.as_ref(), self.broker.as_ref(), queue_name).await
    }

    pub async fn propose_scaling(&self, queue_name: &str) -> CoreResult<Option<agentaskit_shared::models::ScalingDecision>> {
        let stats = self.queue_stats(queue_name).await?;
        let decision = scaling::evaluate(&stats);
        if let Some(decision) = &decision {
            self.persistence.insert_scaling_decision(decision).await?;
        }
        Ok(decision)
    }

    pub async fn claim_leadership(&self, role: &str) -> CoreResult<agentaskit_shared::models::LeaderRecord> {
        leader::try_claim(self.persistence.as_ref(), role, &self.node_id).await
    }

    /// Starts all four background loops (spec §5): stale-worker sweep
    /// (300s), queue-stats sampler (60s), leader-election check (10s).
    /// The shard rebalancer is on-demand only and has no background loop.
    pub async fn start(
        self: &Arc<Self>,
        queue_names: Vec<String>,
        stale_sweep_interval: Duration,
        queue_sample_interval: Duration,
        election_check_interval: Duration,
    ) {
        *self.running.write().await = true;

        worker::spawn_stale_sweep(Arc::clone(&self.persistence), stale_sweep_interval, Arc::clone(&self.running));
        queue_stats::spawn_sampler(
            Arc::clone(&self.persistence),
            Arc::clone(&self.broker),
            queue_names,
            queue_sample_interval,
            Arc::clone(&self.running),
        );
        leader::spawn_election_loop(
            Arc::clone(&self.persistence),
            ELECTED_ROLES.iter().map(|r| r.to_string()).collect(),
            self.node_id.clone(),
            election_check_interval,
            Arc::clone(&self.running),
        );
        info!(node_id = %self.node_id, "distributed task service background loops started");
    }

    pub async fn shutdown(&self) {
        *self.running.write().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::memory::InMemoryBroker;
    use crate::persistence::memory::InMemoryPersistence;

    #[tokio::test]
    async fn dispatch_task_lands_on_named_queue() {
        let persistence = Arc::new(InMemoryPersistence::new());
        let broker = Arc::new(InMemoryBroker::new());
        let service = DistributedTaskService::new(persistence, broker.clone(), "node-a".to_string());

        let task_id = uuid::Uuid::new_v4();
        service.dispatch_task("default", task_id, 5).await.unwrap();
        assert_eq!(broker.queue_depth("default").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn worker_registers_and_reports_heartbeat() {
        let persistence = Arc::new(InMemoryPersistence::new());
        let broker = Arc::new(InMemoryBroker::new());
        let service = DistributedTaskService::new(persistence, broker, "node-a".to_string());

        let worker = service
            .register_worker("executor", 4, vec!["default".to_string()], HashMap::new())
            .await
            .unwrap();
        service.heartbeat(&worker.worker_id).await.unwrap();
        service.unregister_worker(&worker.worker_id).await.unwrap();
    }
}
