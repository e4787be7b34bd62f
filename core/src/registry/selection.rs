//! Agent selection scoring strategies (spec §4.1, "Selection policy").
//!
//! Grounded line-for-line on `app/agents/orchestrator.py`'s
//! `_score_agent_for_subtask`.

use std::collections::HashMap;

use agentaskit_shared::ids::AgentId;
use agentaskit_shared::models::{Agent, AgentStatus, DelegationStrategy};

use super::AgentPerformanceSnapshot;

/// Inputs a scoring strategy may need beyond the candidate agent itself.
pub struct ScoringContext<'a> {
    pub required_capabilities: &'a [String],
    pub task_domain: Option<&'a str>,
    pub load: &'a HashMap<AgentId, usize>,
    pub performance: &'a HashMap<AgentId, AgentPerformanceSnapshot>,
}

pub fn score_agent(agent: &Agent, strategy: DelegationStrategy, ctx: &ScoringContext<'_>) -> f64 {
    let base = match strategy {
        DelegationStrategy::CapabilityMatch => {
            let overlap = ctx
                .required_capabilities
                .iter()
                .filter(|c| agent.capabilities.contains(c))
                .count();
            overlap as f64 * 0.5 + 1.0
        }
        DelegationStrategy::DomainExpert => {
            let matches = matches!((agent.domain.as_deref(), ctx.task_domain), (Some(a), Some(b)) if a == b);
            if matches {
                1.3
            } else {
                1.0
            }
        }
        DelegationStrategy::LoadBalanced => {
            let load = ctx.load.get(&agent.id).copied().unwrap_or(0);
            1.0 / (load as f64 + 1.0)
        }
        DelegationStrategy::CostOptimized => {
            let cost_per_request = ctx
                .performance
                .get(&agent.id)
                .map(|p| p.cost_per_request)
                .unwrap_or(0.0);
            1.0 / (cost_per_request + 0.001)
        }
        DelegationStrategy::PerformanceOptimized => {
            let snapshot = ctx.performance.get(&agent.id).copied().unwrap_or_default();
            snapshot.success_rate * 0.5 + 1000.0 / (snapshot.avg_latency_ms + 1.0) * 0.2
        }
    };

    let penalized = if agent.status == AgentStatus::Error {
        base - 0.5
    } else {
        base
    };

    penalized.max(0.1)
}

/// Picks the highest-scoring eligible candidate, breaking ties by name.
/// Returns `None` if no candidate offers any required capability.
pub fn select_best<'a>(
    candidates: impl Iterator<Item = &'a Agent>,
    strategy: DelegationStrategy,
    ctx: &ScoringContext<'_>,
) -> Option<(&'a Agent, f64)> {
    candidates
        .filter(|a| {
            ctx.required_capabilities
                .iter()
                .any(|c| a.capabilities.contains(c))
        })
        .map(|a| (a, score_agent(a, strategy, ctx)))
        .max_by(|(a, score_a), (b, score_b)| {
            score_a
                .partial_cmp(score_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.name.cmp(&a.name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentaskit_shared::models::{AgentKind};
    use chrono::Utc;
    use std::collections::HashMap;

    fn agent(name: &str, capabilities: &[&str], status: AgentStatus) -> Agent {
        Agent {
            id: uuid::Uuid::new_v4(),
            name: name.to_string(),
            kind: AgentKind::Worker,
            system_prompt: String::new(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            domain: None,
            supervisor: None,
            config: HashMap::new(),
            allow_delegation: false,
            iteration_cap: 10,
            status,
            created_at: Utc::now(),
            last_activity: Utc::now(),
        }
    }

    #[test]
    fn capability_match_prefers_broader_overlap() {
        let a1 = agent("a1", &["summarization"], AgentStatus::Idle);
        let a2 = agent("a2", &["summarization", "email_send"], AgentStatus::Idle);
        let required = vec!["summarization".to_string(), "email_send".to_string()];
        let load = HashMap::new();
        let performance = HashMap::new();
        let ctx = ScoringContext {
            required_capabilities: &required,
            task_domain: None,
            load: &load,
            performance: &performance,
        };

        let (winner, _) =
            select_best([&a1, &a2].into_iter(), DelegationStrategy::CapabilityMatch, &ctx).unwrap();
        assert_eq!(winner.name, "a2");
    }

    #[test]
    fn error_status_is_penalized_but_floor_applies() {
        let a = agent("a", &["x"], AgentStatus::Error);
        let required = vec!["x".to_string()];
        let load = HashMap::new();
        let performance = HashMap::new();
        let ctx = ScoringContext {
            required_capabilities: &required,
            task_domain: None,
            load: &load,
            performance: &performance,
        };
        let score = score_agent(&a, DelegationStrategy::CapabilityMatch, &ctx);
        assert!(score >= 0.1);
        assert!(score < 1.5);
    }
}
