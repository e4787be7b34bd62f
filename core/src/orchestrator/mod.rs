//! Orchestrator: task submission, decomposition, delegation, execution,
//! aggregation (spec §4.2).
//!
//! The submission queue and single-consumer task-processor loop mirror
//! the teacher's `OrchestratorEngine::start_task_scheduler` in
//! `core/src/orchestration/mod.rs` — a bounded `mpsc` channel drained by
//! one `tokio::spawn`ed loop gated by `running: Arc<RwLock<bool>>`.

pub mod aggregation;
pub mod decomposition;
pub mod delegation;
pub mod execution;
pub mod graph;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentaskit_shared::errors::{CoreError, CoreResult};
use agentaskit_shared::ids::TaskId;
use agentaskit_shared::models::{
    DelegationStrategy, DistributionMode, Task, TaskAggregate, TaskRequest, TaskStatus,
};
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use crate::llm::LlmClient;
use crate::performance::PerformanceMonitor;
use crate::persistence::PersistenceAdapter;
use crate::registry::{AgentPerformanceSnapshot, AgentRegistry};
use execution::{CancellationHandle, SubtaskExecutor};

struct SubmittedTask {
    task_id: TaskId,
    request: TaskRequest,
}

/// Live handles for a task that is decomposing or executing, enough to
/// service a client-initiated cancel.
struct InFlight {
    cancellation: CancellationHandle,
}

pub struct Orchestrator {
    persistence: Arc<dyn PersistenceAdapter>,
    registry: Arc<AgentRegistry>,
    performance: Arc<PerformanceMonitor>,
    llm: Arc<dyn LlmClient>,
    executor: Arc<dyn SubtaskExecutor>,
    cancellation_grace: Duration,
    sender: mpsc::Sender<SubmittedTask>,
    receiver: tokio::sync::Mutex<Option<mpsc::Receiver<SubmittedTask>>>,
    in_flight: DashMap<TaskId, InFlight>,
    running: Arc<RwLock<bool>>,
}

impl Orchestrator {
    pub fn new(
        persistence: Arc<dyn PersistenceAdapter>,
        registry: Arc<AgentRegistry>,
        performance: Arc<PerformanceMonitor>,
        llm: Arc<dyn LlmClient>,
        executor: Arc<dyn SubtaskExecutor>,
        submission_queue_capacity: usize,
        cancellation_grace: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(submission_queue_capacity);
        Self {
            persistence,
            registry,
            performance,
            llm,
            executor,
            cancellation_grace,
            sender,
            receiver: tokio::sync::Mutex::new(Some(receiver)),
            in_flight: DashMap::new(),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Accepts a task request, persists it in `submitted` state, and
    /// enqueues it for the background processor. Returns immediately;
    /// the caller polls `get_task` for progress.
    pub async fn submit(&self, request: TaskRequest) -> CoreResult<Task> {
        let task_id = uuid::Uuid::new_v4();
        let task = Task::new(task_id, request.clone(), Utc::now());
        self.persistence.insert_task(&task).await?;

        self.sender
            .send(SubmittedTask { task_id, request })
            .await
            .map_err(|_| CoreError::BackpressureExceeded("submission queue closed".to_string()))?;

        Ok(task)
    }

    pub async fn get_task(&self, id: TaskId) -> CoreResult<Task> {
        self.persistence
            .get_task(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("task {id}")))
    }

    /// Requests cancellation of an in-flight task. A no-op if the task is
    /// not currently executing.
    pub fn cancel(&self, id: TaskId) {
        if let Some(entry) = self.in_flight.get(&id) {
            entry.cancellation.cancel();
        }
    }

    async fn set_status(&self, task: &mut Task, status: TaskStatus) -> CoreResult<()> {
        task.status = status;
        if matches!(status, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled) {
            task.completed_at = Some(Utc::now());
        }
        self.persistence.update_task(task).await
    }

    /// Drives one task end-to-end: decompose → delegate → execute →
    /// aggregate. Errors are captured on the task record rather than
    /// propagated, since this runs off the background processor loop.
    async fn process(&self, submitted: SubmittedTask) {
        let SubmittedTask { task_id, request } = submitted;
        let Ok(mut task) = self.get_task(task_id).await else {
            error!(task_id = %task_id, "submitted task vanished before processing");
            return;
        };

        if self.set_status(&mut task, TaskStatus::Decomposing).await.is_err() {
            return;
        }

        let decomposition = decomposition::decompose(
            self.llm.as_ref(),
            task_id,
            &task.description,
            task.decomposition_strategy,
        )
        .await;

        if let Err(err) = self.persistence.upsert_decomposition(&decomposition).await {
            warn!(task_id = %task_id, error = %err, "failed to persist decomposition");
        }

        if self.set_status(&mut task, TaskStatus::Decomposed).await.is_err() {
            return;
        }

        let cancellation = CancellationHandle::new();
        self.in_flight.insert(task_id, InFlight { cancellation: cancellation.clone() });

        let performance: HashMap<_, AgentPerformanceSnapshot> = HashMap::new();
        let plan = delegation::build_plan(
            &self.registry,
            &decomposition,
            request.delegation_strategy,
            None,
            &performance,
        )
        .await;

        let plan = match plan {
            Ok(plan) => plan,
            Err(err) => {
                self.fail_task(&mut task, &err).await;
                self.in_flight.remove(&task_id);
                return;
            }
        };

        if self.set_status(&mut task, TaskStatus::Processing).await.is_err() {
            self.in_flight.remove(&task_id);
            return;
        }

        if request.distribution_mode != DistributionMode::Local {
            // DISTRIBUTED / HYBRID dispatch is owned by the Distributed
            // Task Service (spec §4.3); the Orchestrator only prepares
            // the plan up to this point for those modes.
            info!(task_id = %task_id, mode = ?request.distribution_mode, "handing off to distributed dispatch");
            self.in_flight.remove(&task_id);
            return;
        }

        let outcomes = execution::execute_dag(
            &self.registry,
            &self.executor,
            &decomposition,
            &plan,
            cancellation.clone(),
            self.cancellation_grace,
        )
        .await;

        for outcome in outcomes.values() {
            if let Some(agent_id) = outcome.agent_id {
                self.performance
                    .record_agent_execution(&agent_id.to_string(), outcome.success, outcome.execution_time_ms)
                    .await;
            }
        }

        let deadlocked = outcomes.values().any(|o| o.error.as_deref() == Some("dependency deadlock"));
        if deadlocked {
            let err = CoreError::DependencyDeadlock(task_id);
            if let Err(log_err) = self
                .persistence
                .record_error_log("orchestrator.execute_dag", &err.to_string(), None)
                .await
            {
                error!(task_id = %task_id, error = %log_err, "failed to log deadlock");
            }
        }

        let aggregate: TaskAggregate = aggregation::aggregate(&decomposition, &outcomes);
        task.result = serde_json::to_value(&aggregate).ok();

        let final_status = if deadlocked {
            TaskStatus::Failed
        } else if aggregate.subtasks_failed == 0 {
            TaskStatus::Completed
        } else if cancellation.is_cancelled() {
            TaskStatus::Cancelled
        } else {
            TaskStatus::Failed
        };

        if cancellation.is_cancelled() && final_status != TaskStatus::Cancelled {
            task.error = Some("cancelled".to_string());
        }

        if let Err(e) = self.set_status(&mut task, final_status).await {
            error!(task_id = %task_id, error = %e, "failed to persist final task status");
        }
        self.in_flight.remove(&task_id);
    }

    async fn fail_task(&self, task: &mut Task, err: &CoreError) {
        task.error = Some(err.to_string());
        if let Err(e) = self.set_status(task, TaskStatus::Failed).await {
            error!(task_id = %task.id, error = %e, "failed to persist failed task status");
        }
        warn!(task_id = %task.id, error = %err, "task failed before execution");
    }

    /// Single-consumer background loop: dequeues one submitted task at a
    /// time and drives it fully (decomposition is serial per task, but
    /// subtask execution within a task is concurrent).
    pub async fn start(self: &Arc<Self>) {
        *self.running.write().await = true;
        let Some(mut receiver) = self.receiver.lock().await.take() else {
            warn!("orchestrator task processor already started");
            return;
        };

        let orchestrator = Arc::clone(self);
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            while *running.read().await {
                match receiver.recv().await {
                    Some(submitted) => orchestrator.process(submitted).await,
                    None => break,
                }
            }
        });
    }

    pub async fn shutdown(&self) {
        *self.running.write().await = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::orchestrator::execution::EchoExecutor;
    use crate::persistence::memory::InMemoryPersistence;
    use agentaskit_shared::models::{AgentDefinition, AgentKind, DecompositionStrategy, Priority};
    use tokio::time::{sleep, timeout};

    async fn build_orchestrator() -> (Arc<Orchestrator>, Arc<AgentRegistry>) {
        let persistence: Arc<dyn PersistenceAdapter> = Arc::new(InMemoryPersistence::new());
        let registry = Arc::new(AgentRegistry::new(persistence.clone()).await.unwrap());
        let performance = Arc::new(PerformanceMonitor::new(persistence.clone()).await.unwrap());
        let orchestrator = Arc::new(Orchestrator::new(
            persistence,
            registry.clone(),
            performance,
            Arc::new(MockLlmClient),
            Arc::new(EchoExecutor),
            16,
            Duration::from_secs(1),
        ));
        (orchestrator, registry)
    }

    #[tokio::test]
    async fn happy_path_single_subtask_completes() {
        let (orchestrator, registry) = build_orchestrator().await;
        registry
            .create(AgentDefinition {
                name: "responder".to_string(),
                kind: AgentKind::Worker,
                system_prompt: String::new(),
                capabilities: vec!["general".to_string()],
                domain: None,
                supervisor: None,
                config: HashMap::new(),
                allow_delegation: false,
                iteration_cap: 10,
            })
            .await
            .unwrap();

        orchestrator.start().await;

        let task = orchestrator
            .submit(TaskRequest {
                description: "summarize then email".to_string(),
                parameters: None,
                priority: Priority::default(),
                decomposition_strategy: DecompositionStrategy::Sequential,
                delegation_strategy: DelegationStrategy::CapabilityMatch,
                distribution_mode: DistributionMode::Local,
            })
            .await
            .unwrap();

        let completed = timeout(Duration::from_secs(2), async {
            loop {
                let reloaded = orchestrator.get_task(task.id).await.unwrap();
                if reloaded.status == TaskStatus::Completed || reloaded.status == TaskStatus::Failed {
                    return reloaded;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("task should terminate");

        assert_eq!(completed.status, TaskStatus::Completed);
        orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn no_eligible_agent_fails_task() {
        let (orchestrator, _registry) = build_orchestrator().await;
        orchestrator.start().await;

        let task = orchestrator
            .submit(TaskRequest {
                description: "do something".to_string(),
                parameters: None,
                priority: Priority::default(),
                decomposition_strategy: DecompositionStrategy::Sequential,
                delegation_strategy: DelegationStrategy::CapabilityMatch,
                distribution_mode: DistributionMode::Local,
            })
            .await
            .unwrap();

        let failed = timeout(Duration::from_secs(2), async {
            loop {
                let reloaded = orchestrator.get_task(task.id).await.unwrap();
                if reloaded.status == TaskStatus::Completed || reloaded.status == TaskStatus::Failed {
                    return reloaded;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("task should terminate");

        assert_eq!(failed.status, TaskStatus::Failed);
        orchestrator.shutdown().await;
    }
}
