//! Delegation planning: assign an agent to every subtask in topological
//! order, tracking load as it goes (spec §4.2, "Delegation plan").
//!
//! Grounded on `app/agents/orchestrator.py`'s `_build_delegation_plan`.

use std::collections::HashMap;

use agentaskit_shared::errors::{CoreError, CoreResult};
use agentaskit_shared::ids::AgentId;
use agentaskit_shared::models::{DelegationPlan, DelegationStrategy, TaskDecomposition};

use crate::registry::{AgentPerformanceSnapshot, AgentRegistry};

use super::graph;

/// Build a delegation plan for `decomposition` under `strategy`. Subtasks
/// are visited in topological order so `load_balanced` scoring sees the
/// load accumulated by earlier assignments. Fails the whole plan if any
/// subtask has no eligible agent (spec: `NoAgentAvailable`).
pub async fn build_plan(
    registry: &AgentRegistry,
    decomposition: &TaskDecomposition,
    strategy: DelegationStrategy,
    task_domain: Option<&str>,
    performance: &HashMap<AgentId, AgentPerformanceSnapshot>,
) -> CoreResult<DelegationPlan> {
    let order = graph::topological_sort(&decomposition.subtasks)
        .ok_or_else(|| CoreError::DependencyDeadlock(decomposition.task_id))?;
    let by_id: HashMap<_, _> = decomposition.subtasks.iter().map(|s| (&s.id, s)).collect();

    let mut assignments = HashMap::new();
    let mut load: HashMap<AgentId, usize> = HashMap::new();
    let mut estimated_cost = 0.0;
    let mut max_duration_ms: u64 = 0;

    for subtask_id in &order {
        let subtask = by_id[subtask_id];
        let required = subtask.effective_capabilities();

        let Some((agent, _score)) = registry
            .select_for_task(&required, strategy, task_domain, &load, performance, false)
            .await
        else {
            return Err(CoreError::NoAgentAvailable(required));
        };

        *load.entry(agent.id).or_insert(0) += 1;
        assignments.insert(subtask_id.clone(), agent.id);
        estimated_cost += subtask.estimated_complexity.cost();
        max_duration_ms = max_duration_ms.max(subtask.estimated_complexity.duration_ms());
    }

    Ok(DelegationPlan {
        task_id: decomposition.task_id,
        strategy,
        assignments,
        estimated_cost,
        estimated_duration_ms: (max_duration_ms as f64 * 1.2) as u64,
        load_distribution: load,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::InMemoryPersistence;
    use agentaskit_shared::models::{AgentDefinition, AgentKind, Complexity, Subtask, SubtaskStatus};
    use std::sync::Arc;

    fn subtask(id: &str, caps: &[&str], deps: &[&str]) -> Subtask {
        Subtask {
            id: id.to_string(),
            description: id.to_string(),
            required_capabilities: caps.iter().map(|c| c.to_string()).collect(),
            estimated_complexity: Complexity::Low,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            assigned_agent: None,
            status: SubtaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    #[tokio::test]
    async fn missing_capability_fails_whole_plan() {
        let persistence = Arc::new(InMemoryPersistence::new());
        let registry = AgentRegistry::new(persistence).await.unwrap();
        registry
            .create(AgentDefinition {
                name: "a".to_string(),
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

        let decomposition = TaskDecomposition {
            task_id: uuid::Uuid::new_v4(),
            original_description: "x".to_string(),
            strategy: agentaskit_shared::models::DecompositionStrategy::Sequential,
            subtasks: vec![subtask("s1", &["unrelated_capability"], &[])],
            total_complexity: 1,
            max_parallelism: 1,
            critical_path: vec!["s1".to_string()],
        };

        let err = build_plan(
            &registry,
            &decomposition,
            DelegationStrategy::CapabilityMatch,
            None,
            &HashMap::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CoreError::NoAgentAvailable(_)));
    }

    #[tokio::test]
    async fn load_balanced_spreads_across_two_agents() {
        let persistence = Arc::new(InMemoryPersistence::new());
        let registry = AgentRegistry::new(persistence).await.unwrap();
        for name in ["a", "b"] {
            registry
                .create(AgentDefinition {
                    name: name.to_string(),
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
        }

        let decomposition = TaskDecomposition {
            task_id: uuid::Uuid::new_v4(),
            original_description: "x".to_string(),
            strategy: agentaskit_shared::models::DecompositionStrategy::Parallel,
            subtasks: vec![subtask("s1", &["general"], &[]), subtask("s2", &["general"], &[])],
            total_complexity: 2,
            max_parallelism: 2,
            critical_path: vec![],
        };

        let plan = build_plan(
            &registry,
            &decomposition,
            DelegationStrategy::LoadBalanced,
            None,
            &HashMap::new(),
        )
        .await
        .unwrap();

        let distinct_agents: std::collections::HashSet<_> = plan.assignments.values().collect();
        assert_eq!(distinct_agents.len(), 2);
    }
}
