//! In-memory `PersistenceAdapter` used by tests and the fallback path when
//! no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use agentaskit_shared::errors::{CoreError, CoreResult};
use agentaskit_shared::ids::{AgentId, TaskId};
use agentaskit_shared::models::{
    Agent, Alert, LeaderRecord, LeaderTransition, ManualTask, MetricSample, QueueStats,
    ScalingDecision, Task, TaskDecomposition, Worker,
};

use super::PersistenceAdapter;

#[derive(Default)]
struct Store {
    agents: HashMap<AgentId, Agent>,
    tasks: HashMap<TaskId, Task>,
    decompositions: HashMap<TaskId, TaskDecomposition>,
    metrics: Vec<MetricSample>,
    alerts: HashMap<String, Alert>,
    workers: HashMap<String, Worker>,
    worker_events: Vec<(String, String, serde_json::Value)>,
    queue_stats: Vec<QueueStats>,
    scaling_decisions: Vec<ScalingDecision>,
    leaders: HashMap<String, LeaderRecord>,
    leader_history: Vec<LeaderTransition>,
    manual_tasks: HashMap<uuid::Uuid, ManualTask>,
    error_logs: Vec<(String, String, Option<serde_json::Value>)>,
}

pub struct InMemoryPersistence {
    store: Mutex<Store>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryPersistence {
    async fn insert_agent(&self, agent: &Agent) -> CoreResult<()> {
        let mut store = self.store.lock();
        if store.agents.values().any(|a| a.name == agent.name) {
            return Err(CoreError::NameConflict(agent.name.clone()));
        }
        store.agents.insert(agent.id, agent.clone());
        Ok(())
    }

    async fn update_agent(&self, agent: &Agent) -> CoreResult<()> {
        let mut store = self.store.lock();
        if !store.agents.contains_key(&agent.id) {
            return Err(CoreError::NotFound(format!("agent {}", agent.id)));
        }
        store.agents.insert(agent.id, agent.clone());
        Ok(())
    }

    async fn delete_agent(&self, id: AgentId) -> CoreResult<()> {
        self.store.lock().agents.remove(&id);
        Ok(())
    }

    async fn get_agent(&self, id: AgentId) -> CoreResult<Option<Agent>> {
        Ok(self.store.lock().agents.get(&id).cloned())
    }

    async fn get_agent_by_name(&self, name: &str) -> CoreResult<Option<Agent>> {
        Ok(self
            .store
            .lock()
            .agents
            .values()
            .find(|a| a.name == name)
            .cloned())
    }

    async fn list_agents(&self) -> CoreResult<Vec<Agent>> {
        Ok(self.store.lock().agents.values().cloned().collect())
    }

    async fn insert_task(&self, task: &Task) -> CoreResult<()> {
        self.store.lock().tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> CoreResult<()> {
        self.store.lock().tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> CoreResult<Option<Task>> {
        Ok(self.store.lock().tasks.get(&id).cloned())
    }

    async fn upsert_decomposition(&self, decomposition: &TaskDecomposition) -> CoreResult<()> {
        self.store
            .lock()
            .decompositions
            .insert(decomposition.task_id, decomposition.clone());
        Ok(())
    }

    async fn get_decomposition(&self, task_id: TaskId) -> CoreResult<Option<TaskDecomposition>> {
        Ok(self.store.lock().decompositions.get(&task_id).cloned())
    }

    async fn insert_metric_samples(&self, samples: &[MetricSample]) -> CoreResult<()> {
        self.store.lock().metrics.extend_from_slice(samples);
        Ok(())
    }

    async fn get_metric_samples(
        &self,
        agent_id: AgentId,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<MetricSample>> {
        Ok(self
            .store
            .lock()
            .metrics
            .iter()
            .filter(|m| m.agent_id == agent_id && m.timestamp >= since)
            .cloned()
            .collect())
    }

    async fn upsert_alert(&self, alert: &Alert) -> CoreResult<()> {
        self.store.lock().alerts.insert(alert.id.clone(), alert.clone());
        Ok(())
    }

    async fn get_alert(&self, id: &str) -> CoreResult<Option<Alert>> {
        Ok(self.store.lock().alerts.get(id).cloned())
    }

    async fn list_alerts(&self) -> CoreResult<Vec<Alert>> {
        Ok(self.store.lock().alerts.values().cloned().collect())
    }

    async fn delete_alert(&self, id: &str) -> CoreResult<()> {
        self.store.lock().alerts.remove(id);
        Ok(())
    }

    async fn upsert_worker(&self, worker: &Worker) -> CoreResult<()> {
        self.store
            .lock()
            .workers
            .insert(worker.worker_id.clone(), worker.clone());
        Ok(())
    }

    async fn get_worker(&self, worker_id: &str) -> CoreResult<Option<Worker>> {
        Ok(self.store.lock().workers.get(worker_id).cloned())
    }

    async fn list_workers(&self) -> CoreResult<Vec<Worker>> {
        Ok(self.store.lock().workers.values().cloned().collect())
    }

    async fn record_worker_event(
        &self,
        worker_id: &str,
        event: &str,
        metadata: serde_json::Value,
    ) -> CoreResult<()> {
        self.store
            .lock()
            .worker_events
            .push((worker_id.to_string(), event.to_string(), metadata));
        Ok(())
    }

    async fn insert_queue_stats(&self, stats: &QueueStats) -> CoreResult<()> {
        self.store.lock().queue_stats.push(stats.clone());
        Ok(())
    }

    async fn insert_scaling_decision(&self, decision: &ScalingDecision) -> CoreResult<()> {
        self.store.lock().scaling_decisions.push(decision.clone());
        Ok(())
    }

    async fn get_leader_record(&self, role: &str) -> CoreResult<Option<LeaderRecord>> {
        Ok(self.store.lock().leaders.get(role).cloned())
    }

    async fn compare_and_set_leader(
        &self,
        record: &LeaderRecord,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let mut store = self.store.lock();
        let installable = match store.leaders.get(&record.role) {
            None => true,
            Some(current) => current.is_expired(now) || current.node_id == record.node_id,
        };
        if installable {
            store.leaders.insert(record.role.clone(), record.clone());
        }
        Ok(installable)
    }

    async fn append_leader_history(&self, transition: &LeaderTransition) -> CoreResult<()> {
        self.store.lock().leader_history.push(transition.clone());
        Ok(())
    }

    async fn upsert_manual_task(&self, task: &ManualTask) -> CoreResult<()> {
        self.store.lock().manual_tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn find_open_manual_task(
        &self,
        source_system: &str,
        source_id: &str,
    ) -> CoreResult<Option<ManualTask>> {
        Ok(self
            .store
            .lock()
            .manual_tasks
            .values()
            .find(|t| {
                t.source_system == source_system
                    && t.source_id == source_id
                    && t.status != agentaskit_shared::models::ManualTaskStatus::Resolved
            })
            .cloned())
    }

    async fn record_error_log(
        &self,
        context: &str,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> CoreResult<()> {
        self.store
            .lock()
            .error_logs
            .push((context.to_string(), message.to_string(), details));
        Ok(())
    }
}
