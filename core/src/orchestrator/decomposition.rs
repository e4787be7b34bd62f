//! Task decomposition: LLM-driven subtask graph generation, validation,
//! and the two-node fallback (spec §4.2, "Decomposition contract").
//!
//! Grounded on `app/agents/orchestrator.py`'s `decompose_task` and
//! `_validate_decomposition`.

use agentaskit_shared::ids::TaskId;
use agentaskit_shared::models::{Complexity, DecompositionStrategy, Subtask, SubtaskStatus, TaskDecomposition};
use tracing::warn;

use super::graph;
use crate::llm::LlmClient;

#[derive(serde::Deserialize)]
struct RawSubtask {
    id: String,
    description: String,
    #[serde(default)]
    required_capabilities: Vec<String>,
    estimated_complexity: Complexity,
    #[serde(default)]
    dependencies: Vec<String>,
}

fn prompt_for(description: &str, strategy: DecompositionStrategy) -> String {
    let style = match strategy {
        DecompositionStrategy::Hierarchical => "a hierarchy of subtasks, coarse to fine",
        DecompositionStrategy::Sequential => "an ordered sequence of subtasks, each depending on the last",
        DecompositionStrategy::Parallel => "independent subtasks with no dependencies between them",
        DecompositionStrategy::DivideConquer => "balanced partitions that can be solved independently and merged",
    };
    format!(
        "Decompose the following task into {style}. Respond with a JSON array of \
         objects {{id, description, required_capabilities[], estimated_complexity, \
         dependencies[]}}.\n\nTask: {description}"
    )
}

fn fallback(task_id: TaskId, description: &str, strategy: DecompositionStrategy) -> TaskDecomposition {
    let subtasks = vec![
        Subtask {
            id: "analyze".to_string(),
            description: format!("Analyze: {description}"),
            required_capabilities: vec![Subtask::DEFAULT_CAPABILITY.to_string()],
            estimated_complexity: Complexity::Low,
            dependencies: vec![],
            assigned_agent: None,
            status: SubtaskStatus::Pending,
            result: None,
            error: None,
        },
        Subtask {
            id: "execute".to_string(),
            description: format!("Execute: {description}"),
            required_capabilities: vec![Subtask::DEFAULT_CAPABILITY.to_string()],
            estimated_complexity: Complexity::Medium,
            dependencies: vec!["analyze".to_string()],
            assigned_agent: None,
            status: SubtaskStatus::Pending,
            result: None,
            error: None,
        },
    ];
    finalize(task_id, description, strategy, subtasks)
}

fn finalize(
    task_id: TaskId,
    description: &str,
    strategy: DecompositionStrategy,
    subtasks: Vec<Subtask>,
) -> TaskDecomposition {
    let total_complexity: u32 = subtasks.iter().map(|s| s.estimated_complexity.score()).sum();
    let max_parallelism = graph::max_parallelism(&subtasks);
    let critical_path = graph::critical_path(&subtasks);
    if critical_path.is_empty() && !subtasks.is_empty() {
        warn!(task_id = %task_id, "critical path empty, cycle detected after validation passed");
    }
    TaskDecomposition {
        task_id,
        original_description: description.to_string(),
        strategy,
        subtasks,
        total_complexity,
        max_parallelism,
        critical_path,
    }
}

fn validate(subtasks: &[Subtask]) -> Result<(), &'static str> {
    if subtasks.is_empty() {
        return Err("empty subtask array");
    }
    if !graph::ids_are_unique(subtasks) {
        return Err("duplicate subtask ids");
    }
    if !graph::dependencies_resolve(subtasks) {
        return Err("dependency id does not resolve to a declared subtask");
    }
    if graph::topological_sort(subtasks).is_none() {
        return Err("dependency graph contains a cycle");
    }
    Ok(())
}

/// Decompose `description` via the LLM, falling back to a two-node linear
/// plan on any LLM error or validation failure (never fails itself).
pub async fn decompose(
    llm: &dyn LlmClient,
    task_id: TaskId,
    description: &str,
    strategy: DecompositionStrategy,
) -> TaskDecomposition {
    let prompt = prompt_for(description, strategy);

    let parsed = match llm.chat(&prompt).await {
        Ok(response) => serde_json::from_str::<Vec<RawSubtask>>(&response.content).ok(),
        Err(err) => {
            warn!(task_id = %task_id, error = %err, "decomposition LLM call failed, using fallback");
            None
        }
    };

    let Some(raw) = parsed else {
        return fallback(task_id, description, strategy);
    };

    let subtasks: Vec<Subtask> = raw
        .into_iter()
        .map(|r| Subtask {
            id: r.id,
            description: r.description,
            required_capabilities: r.required_capabilities,
            estimated_complexity: r.estimated_complexity,
            dependencies: r.dependencies,
            assigned_agent: None,
            status: SubtaskStatus::Pending,
            result: None,
            error: None,
        })
        .collect();

    if let Err(reason) = validate(&subtasks) {
        warn!(task_id = %task_id, reason, "decomposition validation failed, using fallback");
        return fallback(task_id, description, strategy);
    }

    finalize(task_id, description, strategy, subtasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use async_trait::async_trait;
    use crate::llm::ChatResponse;

    struct FailingLlm;
    #[async_trait]
    impl LlmClient for FailingLlm {
        async fn chat(&self, _prompt: &str) -> anyhow::Result<ChatResponse> {
            Err(anyhow::anyhow!("provider unavailable"))
        }
    }

    struct CyclicLlm;
    #[async_trait]
    impl LlmClient for CyclicLlm {
        async fn chat(&self, _prompt: &str) -> anyhow::Result<ChatResponse> {
            let content = serde_json::json!([
                {"id": "a", "description": "a", "required_capabilities": [], "estimated_complexity": "low", "dependencies": ["b"]},
                {"id": "b", "description": "b", "required_capabilities": [], "estimated_complexity": "low", "dependencies": ["a"]}
            ])
            .to_string();
            Ok(ChatResponse {
                content,
                model: "x".into(),
                provider: "x".into(),
                input_tokens: 0,
                output_tokens: 0,
                latency_ms: 0,
                cost: 0.0,
                cached: false,
            })
        }
    }

    #[tokio::test]
    async fn mock_llm_decomposition_validates_cleanly() {
        let task_id = uuid::Uuid::new_v4();
        let decomposition = decompose(&MockLlmClient, task_id, "do a thing", DecompositionStrategy::Sequential).await;
        assert_eq!(decomposition.subtasks.len(), 1);
        assert_eq!(decomposition.total_complexity, 1);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_two_node_plan() {
        let task_id = uuid::Uuid::new_v4();
        let decomposition = decompose(&FailingLlm, task_id, "do a thing", DecompositionStrategy::Sequential).await;
        assert_eq!(decomposition.subtasks.len(), 2);
        assert_eq!(decomposition.critical_path, vec!["analyze".to_string(), "execute".to_string()]);
    }

    #[tokio::test]
    async fn cyclic_decomposition_falls_back() {
        let task_id = uuid::Uuid::new_v4();
        let decomposition = decompose(&CyclicLlm, task_id, "do a thing", DecompositionStrategy::Sequential).await;
        assert_eq!(decomposition.subtasks.len(), 2);
    }
}
