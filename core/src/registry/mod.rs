//! Agent Registry: owns the canonical set of agents, their capabilities,
//! and runtime lifecycle (spec §4.1).
//!
//! The capability index is a `HashMap<String, HashSet<Uuid>>` behind a
//! `tokio::sync::RwLock`, mirroring the read-biased-lock discipline the
//! teacher applies to its `agents: Arc<RwLock<HashMap<Uuid, Arc<dyn
//! Agent>>>>` field in `core/src/agents/mod.rs` — adapted here to a single
//! `Agent` struct with a `kind` tag (Design Notes §9) rather than a
//! trait-object hierarchy.

pub mod selection;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use agentaskit_shared::errors::{CoreError, CoreResult};
use agentaskit_shared::ids::AgentId;
use agentaskit_shared::models::{
    Agent, AgentDefinition, AgentFilter, AgentPatch, AgentStatus, DelegationStrategy,
};

use crate::persistence::PersistenceAdapter;
use selection::{select_best, ScoringContext};

/// Rolling performance figures fed into `cost_optimized` /
/// `performance_optimized` scoring, sourced from the Performance Monitor.
#[derive(Debug, Clone, Copy)]
pub struct AgentPerformanceSnapshot {
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub cost_per_request: f64,
}

impl Default for AgentPerformanceSnapshot {
    fn default() -> Self {
        Self {
            success_rate: 1.0,
            avg_latency_ms: 1000.0,
            cost_per_request: 0.01,
        }
    }
}

struct Inner {
    agents: HashMap<AgentId, Agent>,
    capability_index: HashMap<String, HashSet<AgentId>>,
}

pub struct AgentRegistry {
    persistence: Arc<dyn PersistenceAdapter>,
    inner: RwLock<Inner>,
}

impl AgentRegistry {
    pub async fn new(persistence: Arc<dyn PersistenceAdapter>) -> CoreResult<Self> {
        let agents = persistence.list_agents().await?;
        let mut capability_index: HashMap<String, HashSet<AgentId>> = HashMap::new();
        for agent in &agents {
            for cap in &agent.capabilities {
                capability_index.entry(cap.clone()).or_default().insert(agent.id);
            }
        }
        let agents = agents.into_iter().map(|a| (a.id, a)).collect();
        Ok(Self {
            persistence,
            inner: RwLock::new(Inner {
                agents,
                capability_index,
            }),
        })
    }

    pub async fn create(&self, definition: AgentDefinition) -> CoreResult<Agent> {
        if let Some(supervisor) = definition.supervisor {
            if !self.inner.read().await.agents.contains_key(&supervisor) {
                return Err(CoreError::InvalidSupervisor(supervisor));
            }
        }

        let agent = Agent::from_definition(uuid::Uuid::new_v4(), definition, Utc::now());

        // Persist first; a partial index mutation never happens because the
        // in-memory index is only touched after the store accepts the row
        // (spec §4.1, "Failure semantics").
        self.persistence.insert_agent(&agent).await?;

        let mut inner = self.inner.write().await;
        for cap in &agent.capabilities {
            inner.capability_index.entry(cap.clone()).or_default().insert(agent.id);
        }
        inner.agents.insert(agent.id, agent.clone());
        info!(agent_id = %agent.id, name = %agent.name, "agent created");
        Ok(agent)
    }

    pub async fn get(&self, id: AgentId) -> CoreResult<Agent> {
        self.inner
            .read()
            .await
            .agents
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("agent {id}")))
    }

    pub async fn get_by_name(&self, name: &str) -> CoreResult<Agent> {
        self.inner
            .read()
            .await
            .agents
            .values()
            .find(|a| a.name == name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("agent named '{name}'")))
    }

    pub async fn list(&self, filter: &AgentFilter) -> Vec<Agent> {
        self.inner
            .read()
            .await
            .agents
            .values()
            .filter(|a| filter.kind.map_or(true, |k| a.kind == k))
            .filter(|a| filter.status.map_or(true, |s| a.status == s))
            .filter(|a| filter.domain.as_ref().map_or(true, |d| a.domain.as_deref() == Some(d)))
            .filter(|a| {
                filter
                    .capability_substring
                    .as_ref()
                    .map_or(true, |needle| a.capabilities.iter().any(|c| c.contains(needle.as_str())))
            })
            .cloned()
            .collect()
    }

    pub async fn update(&self, id: AgentId, patch: AgentPatch) -> CoreResult<Agent> {
        let mut inner = self.inner.write().await;
        let mut agent = inner
            .agents
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("agent {id}")))?;

        let old_capabilities = agent.capabilities.clone();
        if let Some(name) = patch.name {
            agent.name = name;
        }
        if let Some(system_prompt) = patch.system_prompt {
            agent.system_prompt = system_prompt;
        }
        if let Some(capabilities) = patch.capabilities {
            agent.capabilities = capabilities;
        }
        if let Some(domain) = patch.domain {
            agent.domain = Some(domain);
        }
        if let Some(supervisor) = patch.supervisor {
            if let Some(sup_id) = supervisor {
                if !inner.agents.contains_key(&sup_id) {
                    return Err(CoreError::InvalidSupervisor(sup_id));
                }
            }
            agent.supervisor = supervisor;
        }
        if let Some(config) = patch.config {
            agent.config = config;
        }
        if let Some(allow_delegation) = patch.allow_delegation {
            agent.allow_delegation = allow_delegation;
        }
        if let Some(iteration_cap) = patch.iteration_cap {
            agent.iteration_cap = iteration_cap;
        }
        agent.last_activity = Utc::now();

        self.persistence.update_agent(&agent).await?;

        for cap in &old_capabilities {
            if !agent.capabilities.contains(cap) {
                if let Some(set) = inner.capability_index.get_mut(cap) {
                    set.remove(&id);
                }
            }
        }
        for cap in &agent.capabilities {
            inner.capability_index.entry(cap.clone()).or_default().insert(id);
        }
        inner.agents.insert(id, agent.clone());
        Ok(agent)
    }

    pub async fn delete(&self, id: AgentId) -> CoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.agents.values().any(|a| a.supervisor == Some(id)) {
            return Err(CoreError::Validation(format!(
                "agent {id} is referenced as a supervisor; cascade is a client decision"
            )));
        }
        let Some(agent) = inner.agents.remove(&id) else {
            return Err(CoreError::NotFound(format!("agent {id}")));
        };
        self.persistence.delete_agent(id).await?;
        for cap in &agent.capabilities {
            if let Some(set) = inner.capability_index.get_mut(cap) {
                set.remove(&id);
            }
        }
        Ok(())
    }

    pub async fn start(&self, id: AgentId) -> CoreResult<Agent> {
        self.transition(id, |a| {
            if a.status == AgentStatus::Stopped || a.status == AgentStatus::Initializing {
                a.status = AgentStatus::Idle;
            }
        })
        .await
    }

    pub async fn stop(&self, id: AgentId) -> CoreResult<Agent> {
        self.transition(id, |a| a.status = AgentStatus::Stopped).await
    }

    async fn transition(&self, id: AgentId, mutate: impl FnOnce(&mut Agent)) -> CoreResult<Agent> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("agent {id}")))?;
        mutate(agent);
        agent.last_activity = Utc::now();
        let snapshot = agent.clone();
        self.persistence.update_agent(&snapshot).await?;
        Ok(snapshot)
    }

    pub async fn find_by_capability(&self, capability: &str) -> Vec<Agent> {
        let inner = self.inner.read().await;
        inner
            .capability_index
            .get(capability)
            .map(|ids| ids.iter().filter_map(|id| inner.agents.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Select the best-scoring eligible agent for a subtask's required
    /// capabilities under the given strategy (spec §4.1, "Selection
    /// policy"). `load` feeds the `load_balanced` strategy and is owned by
    /// the caller (the Orchestrator tracks it per delegation plan).
    pub async fn select_for_task(
        &self,
        required_capabilities: &[String],
        strategy: DelegationStrategy,
        task_domain: Option<&str>,
        load: &HashMap<AgentId, usize>,
        performance: &HashMap<AgentId, AgentPerformanceSnapshot>,
        exclude_busy: bool,
    ) -> Option<(Agent, f64)> {
        let inner = self.inner.read().await;
        let ctx = ScoringContext {
            required_capabilities,
            task_domain,
            load,
            performance,
        };
        let candidates = inner
            .agents
            .values()
            .filter(|a| !exclude_busy || a.status != AgentStatus::Processing);
        select_best(candidates, strategy, &ctx).map(|(a, score)| (a.clone(), score))
    }
}
