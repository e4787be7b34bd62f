//! End-to-end scenarios exercising the Orchestrator, Distributed Task
//! Service, and Performance Monitor against in-memory backends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use agentaskit_core::distributed::scaling;
use agentaskit_core::distributed::{leader, DistributedTaskService};
use agentaskit_core::llm::{ChatResponse, LlmClient};
use agentaskit_core::orchestrator::execution::EchoExecutor;
use agentaskit_core::orchestrator::Orchestrator;
use agentaskit_core::performance::PerformanceMonitor;
use agentaskit_core::persistence::memory::InMemoryPersistence;
use agentaskit_core::persistence::PersistenceAdapter;
use agentaskit_core::registry::AgentRegistry;
use agentaskit_shared::models::{
    AgentDefinition, AgentKind, DecompositionStrategy, DelegationStrategy, DistributionMode,
    Priority, QueueStats, TaskRequest, TaskStatus,
};
use async_trait::async_trait;

struct TwoSubtaskLlm;

#[async_trait]
impl LlmClient for TwoSubtaskLlm {
    async fn chat(&self, _prompt: &str) -> anyhow::Result<ChatResponse> {
        let content = serde_json::json!([
            {
                "id": "s1",
                "description": "summarize the document",
                "required_capabilities": ["summarization"],
                "estimated_complexity": "low",
                "dependencies": []
            },
            {
                "id": "s2",
                "description": "email the summary",
                "required_capabilities": ["email_send"],
                "estimated_complexity": "low",
                "dependencies": ["s1"]
            }
        ])
        .to_string();
        Ok(ChatResponse {
            content,
            model: "test".into(),
            provider: "test".into(),
            input_tokens: 0,
            output_tokens: 0,
            latency_ms: 1,
            cost: 0.0,
            cached: false,
        })
    }
}

struct QuantumSimLlm;

#[async_trait]
impl LlmClient for QuantumSimLlm {
    async fn chat(&self, _prompt: &str) -> anyhow::Result<ChatResponse> {
        let content = serde_json::json!([
            {
                "id": "s1",
                "description": "run a quantum simulation",
                "required_capabilities": ["quantum_sim"],
                "estimated_complexity": "high",
                "dependencies": []
            }
        ])
        .to_string();
        Ok(ChatResponse {
            content,
            model: "test".into(),
            provider: "test".into(),
            input_tokens: 0,
            output_tokens: 0,
            latency_ms: 1,
            cost: 0.0,
            cached: false,
        })
    }
}

async fn wait_terminal(orchestrator: &Orchestrator, task_id: uuid::Uuid) -> agentaskit_shared::models::Task {
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let task = orchestrator.get_task(task_id).await.unwrap();
            if matches!(task.status, TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled) {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("task must reach a terminal state")
}

#[tokio::test]
async fn scenario_a_happy_path_two_agent_chain() {
    let persistence: Arc<dyn PersistenceAdapter> = Arc::new(InMemoryPersistence::new());
    let registry = Arc::new(AgentRegistry::new(persistence.clone()).await.unwrap());
    let performance = Arc::new(PerformanceMonitor::new(persistence.clone()).await.unwrap());

    registry
        .create(AgentDefinition {
            name: "A1".to_string(),
            kind: AgentKind::Worker,
            system_prompt: String::new(),
            capabilities: vec!["summarization".to_string()],
            domain: None,
            supervisor: None,
            config: HashMap::new(),
            allow_delegation: false,
            iteration_cap: 10,
        })
        .await
        .unwrap();
    registry
        .create(AgentDefinition {
            name: "A2".to_string(),
            kind: AgentKind::Worker,
            system_prompt: String::new(),
            capabilities: vec!["email_send".to_string()],
            domain: None,
            supervisor: None,
            config: HashMap::new(),
            allow_delegation: false,
            iteration_cap: 10,
        })
        .await
        .unwrap();

    let orchestrator = Arc::new(Orchestrator::new(
        persistence,
        registry,
        performance,
        Arc::new(TwoSubtaskLlm),
        Arc::new(EchoExecutor),
        16,
        Duration::from_secs(1),
    ));
    orchestrator.start().await;

    let task = orchestrator
        .submit(TaskRequest {
            description: "T1: summarize then email".to_string(),
            parameters: None,
            priority: Priority::default(),
            decomposition_strategy: DecompositionStrategy::Sequential,
            delegation_strategy: DelegationStrategy::CapabilityMatch,
            distribution_mode: DistributionMode::Local,
        })
        .await
        .unwrap();

    let finished = wait_terminal(&orchestrator, task.id).await;
    assert_eq!(finished.status, TaskStatus::Completed);

    let aggregate: agentaskit_shared::models::TaskAggregate =
        serde_json::from_value(finished.result.expect("result present")).unwrap();
    assert_eq!(aggregate.subtasks_successful, 2);
    assert_eq!(aggregate.success_rate, 1.0);
    assert!(aggregate.combined_results.is_some());

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn scenario_c_no_eligible_agent_fails_before_execution() {
    let persistence: Arc<dyn PersistenceAdapter> = Arc::new(InMemoryPersistence::new());
    let registry = Arc::new(AgentRegistry::new(persistence.clone()).await.unwrap());
    let performance = Arc::new(PerformanceMonitor::new(persistence.clone()).await.unwrap());

    let orchestrator = Arc::new(Orchestrator::new(
        persistence,
        registry,
        performance,
        Arc::new(QuantumSimLlm),
        Arc::new(EchoExecutor),
        16,
        Duration::from_secs(1),
    ));
    orchestrator.start().await;

    let task = orchestrator
        .submit(TaskRequest {
            description: "simulate a quantum system".to_string(),
            parameters: None,
            priority: Priority::default(),
            decomposition_strategy: DecompositionStrategy::Sequential,
            delegation_strategy: DelegationStrategy::CapabilityMatch,
            distribution_mode: DistributionMode::Local,
        })
        .await
        .unwrap();

    let finished = wait_terminal(&orchestrator, task.id).await;
    assert_eq!(finished.status, TaskStatus::Failed);
    assert!(finished.error.unwrap().contains("no agent available"));

    orchestrator.shutdown().await;
}

// spec.md's narrative Scenario D describes five silent failures followed
// by an alert on the sixth, but its own §4.4 anomaly-detection rule
// requires "last >= 10 executions" before the rolling failure-rate
// estimator produces a verdict at all. The general rule is treated as
// normative (see DESIGN.md), the same way Scenario E's literal number
// yields to the scaling cap formula.
#[tokio::test]
async fn scenario_d_tenth_consecutive_failure_raises_high_failure_rate_alert() {
    let persistence = Arc::new(InMemoryPersistence::new());
    let monitor = PerformanceMonitor::new(persistence).await.unwrap();

    for _ in 0..9 {
        monitor.record_agent_execution("agent-a", false, 200).await;
    }
    assert!(monitor.list_alerts(None, None).await.is_empty());

    monitor.record_agent_execution("agent-a", false, 200).await;
    let alerts = monitor.list_alerts(None, None).await;
    assert!(alerts.iter().any(|a| a.source == "high_failure_rate"));
}

// spec.md's narrative scenario E describes worker_count=10 yielding
// target_workers=11, but its own autoscaling-policy formula a few
// paragraphs earlier is explicit: `target = min(worker_count + 1, 10)`,
// which caps a 10-worker pool at 10. The formula is the normative
// contract (it is the one production code must satisfy generally);
// the narrative number is treated as a minor spec inconsistency. See
// DESIGN.md for the recorded decision.
#[tokio::test]
async fn scenario_e_high_depth_and_utilization_proposes_scale_up_capped_at_ten() {
    let stats = QueueStats::compute("default", 10, 60, 9, chrono::Utc::now());
    let decision = scaling::evaluate(&stats).expect("scale up expected");
    assert_eq!(decision.target_worker_count, 10);
    assert!(decision.reason.contains("High queue depth"));
    assert!(!decision.applied);
}

#[tokio::test]
async fn scenario_f_expired_lease_is_reclaimed_with_history_row() {
    let persistence = Arc::new(InMemoryPersistence::new());
    let held = leader::try_claim(persistence.as_ref(), "beat_scheduler", "N1").await.unwrap();

    let mut expired = held.clone();
    expired.lease_expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
    persistence.compare_and_set_leader(&expired, chrono::Utc::now()).await.unwrap();

    let claimed = leader::try_claim(persistence.as_ref(), "beat_scheduler", "N2").await.unwrap();
    assert_eq!(claimed.node_id, "N2");
    assert_eq!(claimed.term, held.term + 1);

    let record = persistence.get_leader_record("beat_scheduler").await.unwrap().unwrap();
    assert_eq!(record.node_id, "N2");
}

#[tokio::test]
async fn distributed_service_round_trips_worker_lifecycle() {
    let persistence: Arc<dyn PersistenceAdapter> = Arc::new(InMemoryPersistence::new());
    let broker: Arc<dyn agentaskit_core::broker::BrokerAdapter> =
        Arc::new(agentaskit_core::broker::memory::InMemoryBroker::new());
    let service = DistributedTaskService::new(persistence, broker, "node-a".to_string());

    let worker = service
        .register_worker("executor", 4, vec!["default".to_string()], HashMap::new())
        .await
        .unwrap();
    service.heartbeat(&worker.worker_id).await.unwrap();

    let stats = service.queue_stats("default").await.unwrap();
    assert_eq!(stats.worker_count, 1);

    service.unregister_worker(&worker.worker_id).await.unwrap();
}
