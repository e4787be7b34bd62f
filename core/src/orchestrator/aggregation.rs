//! Result aggregation after DAG execution terminates (spec §4.2,
//! "Aggregation").
//!
//! Grounded on `app/agents/orchestrator.py`'s `_aggregate_results`.
//! `combined_results` ordering resolves the spec's open question in
//! favor of topological (stable) order, not production order.

use std::collections::HashMap;

use agentaskit_shared::ids::SubtaskId;
use agentaskit_shared::models::{
    FailedSubtaskSummary, SubtaskOutcome, SubtaskResultSummary, TaskAggregate, TaskDecomposition,
};

use super::graph;

pub fn aggregate(
    decomposition: &TaskDecomposition,
    outcomes: &HashMap<SubtaskId, SubtaskOutcome>,
) -> TaskAggregate {
    let subtasks_total = decomposition.subtasks.len();
    let subtasks_successful = outcomes.values().filter(|o| o.success).count();
    let subtasks_failed = subtasks_total - subtasks_successful;
    let success_rate = if subtasks_total == 0 {
        0.0
    } else {
        subtasks_successful as f64 / subtasks_total as f64
    };

    let failed_subtasks = outcomes
        .values()
        .filter(|o| !o.success)
        .map(|o| FailedSubtaskSummary {
            id: o.subtask_id.clone(),
            error: o.error.clone(),
            agent: o.agent_id,
        })
        .collect();

    let results_by_subtask = outcomes
        .values()
        .map(|o| {
            (
                o.subtask_id.clone(),
                SubtaskResultSummary {
                    success: o.success,
                    agent: o.agent_id,
                    execution_time_ms: o.execution_time_ms,
                },
            )
        })
        .collect();

    let combined_results = if subtasks_failed == 0 {
        let order = graph::topological_sort(&decomposition.subtasks)
            .unwrap_or_else(|| decomposition.subtasks.iter().map(|s| s.id.clone()).collect());
        let mut results = Vec::with_capacity(order.len());
        let mut all_have_result_key = true;
        for id in &order {
            match outcomes.get(id).and_then(|o| o.result.clone()) {
                Some(value) if value.get("result").is_some() => results.push(value),
                _ => {
                    all_have_result_key = false;
                    break;
                }
            }
        }
        if all_have_result_key {
            Some(results)
        } else {
            None
        }
    } else {
        None
    };

    TaskAggregate {
        subtasks_total,
        subtasks_successful,
        subtasks_failed,
        success_rate,
        failed_subtasks,
        results_by_subtask,
        combined_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentaskit_shared::models::{Complexity, DecompositionStrategy, Subtask, SubtaskStatus};

    fn decomposition(ids: &[&str]) -> TaskDecomposition {
        TaskDecomposition {
            task_id: uuid::Uuid::new_v4(),
            original_description: "x".to_string(),
            strategy: DecompositionStrategy::Sequential,
            subtasks: ids
                .iter()
                .enumerate()
                .map(|(i, id)| Subtask {
                    id: id.to_string(),
                    description: id.to_string(),
                    required_capabilities: vec![],
                    estimated_complexity: Complexity::Low,
                    dependencies: if i == 0 { vec![] } else { vec![ids[i - 1].to_string()] },
                    assigned_agent: None,
                    status: SubtaskStatus::Pending,
                    result: None,
                    error: None,
                })
                .collect(),
            total_complexity: ids.len() as u32,
            max_parallelism: 1,
            critical_path: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn outcome(id: &str, success: bool, result: Option<serde_json::Value>) -> SubtaskOutcome {
        SubtaskOutcome {
            subtask_id: id.to_string(),
            success,
            agent_id: Some(uuid::Uuid::new_v4()),
            result,
            error: if success { None } else { Some("boom".to_string()) },
            execution_time_ms: 500,
        }
    }

    #[test]
    fn all_success_with_result_key_yields_combined_results_in_order() {
        let decomposition = decomposition(&["s1", "s2"]);
        let mut outcomes = HashMap::new();
        outcomes.insert(
            "s1".to_string(),
            outcome("s1", true, Some(serde_json::json!({"result": "r1"}))),
        );
        outcomes.insert(
            "s2".to_string(),
            outcome("s2", true, Some(serde_json::json!({"result": "r2"}))),
        );

        let aggregate = aggregate(&decomposition, &outcomes);
        assert_eq!(aggregate.success_rate, 1.0);
        assert_eq!(
            aggregate.combined_results,
            Some(vec![serde_json::json!({"result": "r1"}), serde_json::json!({"result": "r2"})])
        );
    }

    #[test]
    fn any_failure_suppresses_combined_results() {
        let decomposition = decomposition(&["s1", "s2"]);
        let mut outcomes = HashMap::new();
        outcomes.insert("s1".to_string(), outcome("s1", true, Some(serde_json::json!({"result": "r1"}))));
        outcomes.insert("s2".to_string(), outcome("s2", false, None));

        let aggregate = aggregate(&decomposition, &outcomes);
        assert_eq!(aggregate.subtasks_failed, 1);
        assert!(aggregate.combined_results.is_none());
        assert_eq!(aggregate.failed_subtasks.len(), 1);
    }
}
