//! Subtask executor contract and the dependency-respecting frontier loop
//! (spec §4.2, "Execution").
//!
//! Grounded on `app/agents/orchestrator.py`'s
//! `_execute_subtasks_with_dependencies`. Per Design Notes §9 ("Dynamic
//! dispatch on AgentType"), execution behavior is a small injected
//! interface rather than a class hierarchy on `Agent`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use agentaskit_shared::ids::{AgentId, SubtaskId, TaskId};
use agentaskit_shared::models::{Agent, DelegationPlan, Subtask, SubtaskOutcome, TaskDecomposition};
use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::registry::AgentRegistry;

/// A subtask's execution contract: given the assigned agent and the
/// subtask, produce a result payload or an error. Implementations own
/// whatever model/tool-calling machinery backs a given `AgentKind`.
#[async_trait]
pub trait SubtaskExecutor: Send + Sync {
    async fn execute(
        &self,
        agent: &Agent,
        subtask: &Subtask,
        task_id: TaskId,
    ) -> anyhow::Result<serde_json::Value>;
}

/// Deterministic stand-in that always succeeds immediately, echoing the
/// subtask description. Used by tests and as the default when no richer
/// executor is configured.
pub struct EchoExecutor;

#[async_trait]
impl SubtaskExecutor for EchoExecutor {
    async fn execute(
        &self,
        _agent: &Agent,
        subtask: &Subtask,
        _task_id: TaskId,
    ) -> anyhow::Result<serde_json::Value> {
        Ok(serde_json::json!({ "result": subtask.description.clone() }))
    }
}

/// Signals in-flight subtask executions to wind down; cancellation is
/// cooperative with a bounded grace period (spec: default 30s).
#[derive(Clone)]
pub struct CancellationHandle {
    notify: Arc<Notify>,
    cancelled: Arc<std::sync::atomic::AtomicBool>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            cancelled: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the `pending` / `in_progress` / `completed` frontier until every
/// subtask terminates, a deadlock is detected, or cancellation fires.
pub async fn execute_dag(
    registry: &AgentRegistry,
    executor: &Arc<dyn SubtaskExecutor>,
    decomposition: &TaskDecomposition,
    plan: &DelegationPlan,
    cancellation: CancellationHandle,
    grace: Duration,
) -> HashMap<SubtaskId, SubtaskOutcome> {
    let by_id: HashMap<SubtaskId, Subtask> = decomposition
        .subtasks
        .iter()
        .map(|s| (s.id.clone(), s.clone()))
        .collect();

    let mut pending: HashSet<SubtaskId> = by_id.keys().cloned().collect();
    let mut completed: HashSet<SubtaskId> = HashSet::new();
    let mut outcomes: HashMap<SubtaskId, SubtaskOutcome> = HashMap::new();

    // spec §4.2 step 4: launch ready subtasks concurrently up to
    // `max_parallelism`, not all at once.
    let batch_size = (decomposition.max_parallelism as usize).max(1);

    while !pending.is_empty() {
        let ready: Vec<SubtaskId> = pending
            .iter()
            .filter(|id| by_id[*id].dependencies.iter().all(|d| completed.contains(d)))
            .cloned()
            .collect();

        if ready.is_empty() {
            warn!(
                task_id = %decomposition.task_id,
                remaining = pending.len(),
                "dependency deadlock detected, aborting remaining subtasks"
            );
            for id in pending {
                outcomes.insert(
                    id.clone(),
                    SubtaskOutcome {
                        subtask_id: id,
                        success: false,
                        agent_id: None,
                        result: None,
                        error: Some("dependency deadlock".to_string()),
                        execution_time_ms: 0,
                    },
                );
            }
            break;
        }

        let batch: Vec<SubtaskId> = ready.into_iter().take(batch_size).collect();

        let mut join_set: JoinSet<SubtaskOutcome> = JoinSet::new();
        for id in &batch {
            pending.remove(id);
            let subtask = by_id[id].clone();
            let agent_id: Option<AgentId> = plan.assignments.get(id).copied();
            let cancellation = cancellation.clone();
            let grace = grace;

            let Some(agent_id) = agent_id else {
                outcomes.insert(
                    id.clone(),
                    SubtaskOutcome {
                        subtask_id: id.clone(),
                        success: false,
                        agent_id: None,
                        result: None,
                        error: Some("no agent assigned".to_string()),
                        execution_time_ms: 0,
                    },
                );
                completed.insert(id.clone());
                continue;
            };

            let agent = match registry.get(agent_id).await {
                Ok(a) => a,
                Err(err) => {
                    outcomes.insert(
                        id.clone(),
                        SubtaskOutcome {
                            subtask_id: id.clone(),
                            success: false,
                            agent_id: Some(agent_id),
                            result: None,
                            error: Some(err.to_string()),
                            execution_time_ms: 0,
                        },
                    );
                    completed.insert(id.clone());
                    continue;
                }
            };

            let executor = Arc::clone(executor);
            let subtask_id = id.clone();
            let task_id = decomposition.task_id;

            join_set.spawn(async move {
                let started = std::time::Instant::now();

                let run = executor.execute(&agent, &subtask, task_id);
                tokio::pin!(run);

                tokio::select! {
                    result = &mut run => {
                        let execution_time_ms = started.elapsed().as_millis() as u64;
                        match result {
                            Ok(value) => SubtaskOutcome {
                                subtask_id,
                                success: true,
                                agent_id: Some(agent_id),
                                result: Some(value),
                                error: None,
                                execution_time_ms,
                            },
                            Err(err) => SubtaskOutcome {
                                subtask_id,
                                success: false,
                                agent_id: Some(agent_id),
                                result: None,
                                error: Some(err.to_string()),
                                execution_time_ms,
                            },
                        }
                    }
                    _ = cancellation.notify.notified() => {
                        tokio::select! {
                            result = &mut run => {
                                let execution_time_ms = started.elapsed().as_millis() as u64;
                                match result {
                                    Ok(value) => SubtaskOutcome {
                                        subtask_id, success: true, agent_id: Some(agent_id),
                                        result: Some(value), error: None, execution_time_ms,
                                    },
                                    Err(err) => SubtaskOutcome {
                                        subtask_id, success: false, agent_id: Some(agent_id),
                                        result: None, error: Some(err.to_string()), execution_time_ms,
                                    },
                                }
                            }
                            _ = tokio::time::sleep(grace) => {
                                SubtaskOutcome {
                                    subtask_id,
                                    success: false,
                                    agent_id: Some(agent_id),
                                    result: None,
                                    error: Some("cancelled".to_string()),
                                    execution_time_ms: started.elapsed().as_millis() as u64,
                                }
                            }
                        }
                    }
                }
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => {
                    completed.insert(outcome.subtask_id.clone());
                    if !outcome.success {
                        info!(subtask_id = %outcome.subtask_id, error = ?outcome.error, "subtask failed");
                    }
                    outcomes.insert(outcome.subtask_id.clone(), outcome);
                }
                Err(join_err) => {
                    error!(error = %join_err, "subtask task panicked");
                }
            }
        }
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::InMemoryPersistence;
    use agentaskit_shared::models::{AgentDefinition, AgentKind, Complexity, DecompositionStrategy, DelegationStrategy, SubtaskStatus};
    use std::sync::Arc as StdArc;

    fn subtask(id: &str, deps: &[&str]) -> Subtask {
        Subtask {
            id: id.to_string(),
            description: format!("do {id}"),
            required_capabilities: vec!["general".to_string()],
            estimated_complexity: Complexity::Low,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            assigned_agent: None,
            status: SubtaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn linear_chain_completes_in_order() {
        let persistence = StdArc::new(InMemoryPersistence::new());
        let registry = AgentRegistry::new(persistence).await.unwrap();
        let agent = registry
            .create(AgentDefinition {
                name: "worker".to_string(),
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

        let decomposition = TaskDecomposition {
            task_id: uuid::Uuid::new_v4(),
            original_description: "x".to_string(),
            strategy: DecompositionStrategy::Sequential,
            subtasks: vec![subtask("a", &[]), subtask("b", &["a"])],
            total_complexity: 2,
            max_parallelism: 1,
            critical_path: vec!["a".to_string(), "b".to_string()],
        };

        let mut assignments = HashMap::new();
        assignments.insert("a".to_string(), agent.id);
        assignments.insert("b".to_string(), agent.id);
        let plan = DelegationPlan {
            task_id: decomposition.task_id,
            strategy: DelegationStrategy::CapabilityMatch,
            assignments,
            estimated_cost: 0.002,
            estimated_duration_ms: 1200,
            load_distribution: HashMap::new(),
        };

        let executor: Arc<dyn SubtaskExecutor> = Arc::new(EchoExecutor);
        let outcomes = execute_dag(
            &registry,
            &executor,
            &decomposition,
            &plan,
            CancellationHandle::new(),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.values().all(|o| o.success));
    }

    #[tokio::test]
    async fn missing_assignment_fails_that_subtask_without_deadlocking() {
        let persistence = StdArc::new(InMemoryPersistence::new());
        let registry = AgentRegistry::new(persistence).await.unwrap();

        let decomposition = TaskDecomposition {
            task_id: uuid::Uuid::new_v4(),
            original_description: "x".to_string(),
            strategy: DecompositionStrategy::Sequential,
            subtasks: vec![subtask("a", &[])],
            total_complexity: 1,
            max_parallelism: 1,
            critical_path: vec!["a".to_string()],
        };
        let plan = DelegationPlan {
            task_id: decomposition.task_id,
            strategy: DelegationStrategy::CapabilityMatch,
            assignments: HashMap::new(),
            estimated_cost: 0.0,
            estimated_duration_ms: 0,
            load_distribution: HashMap::new(),
        };

        let executor: Arc<dyn SubtaskExecutor> = Arc::new(EchoExecutor);
        let outcomes = execute_dag(
            &registry,
            &executor,
            &decomposition,
            &plan,
            CancellationHandle::new(),
            Duration::from_secs(1),
        )
        .await;

        assert!(!outcomes["a"].success);
    }

    /// Counting executor used to observe peak concurrency: tracks how
    /// many subtasks are simultaneously inside `execute`.
    struct ConcurrencyTrackingExecutor {
        in_flight: std::sync::Arc<std::sync::atomic::AtomicUsize>,
        max_observed: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl SubtaskExecutor for ConcurrencyTrackingExecutor {
        async fn execute(
            &self,
            _agent: &Agent,
            subtask: &Subtask,
            _task_id: TaskId,
        ) -> anyhow::Result<serde_json::Value> {
            use std::sync::atomic::Ordering;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_observed.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(serde_json::json!({ "result": subtask.description.clone() }))
        }
    }

    #[tokio::test]
    async fn max_parallelism_one_serializes_ten_ready_subtasks() {
        let persistence = StdArc::new(InMemoryPersistence::new());
        let registry = AgentRegistry::new(persistence).await.unwrap();
        let agent = registry
            .create(AgentDefinition {
                name: "worker".to_string(),
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

        let ids: Vec<String> = (0..10).map(|i| format!("s{i}")).collect();
        let subtasks: Vec<Subtask> = ids.iter().map(|id| subtask(id, &[])).collect();

        let decomposition = TaskDecomposition {
            task_id: uuid::Uuid::new_v4(),
            original_description: "x".to_string(),
            strategy: DecompositionStrategy::Sequential,
            subtasks,
            total_complexity: 10,
            max_parallelism: 1,
            critical_path: vec![],
        };

        let mut assignments = HashMap::new();
        for id in &ids {
            assignments.insert(id.clone(), agent.id);
        }
        let plan = DelegationPlan {
            task_id: decomposition.task_id,
            strategy: DelegationStrategy::CapabilityMatch,
            assignments,
            estimated_cost: 0.0,
            estimated_duration_ms: 0,
            load_distribution: HashMap::new(),
        };

        let in_flight = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let max_observed = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let executor: Arc<dyn SubtaskExecutor> = Arc::new(ConcurrencyTrackingExecutor {
            in_flight: in_flight.clone(),
            max_observed: max_observed.clone(),
        });

        let outcomes = execute_dag(
            &registry,
            &executor,
            &decomposition,
            &plan,
            CancellationHandle::new(),
            Duration::from_secs(1),
        )
        .await;

        assert_eq!(outcomes.len(), 10);
        assert!(outcomes.values().all(|o| o.success));
        assert!(
            max_observed.load(std::sync::atomic::Ordering::SeqCst) <= 1,
            "max_parallelism=1 must bound observed in-flight subtasks to 1"
        );
    }
}
