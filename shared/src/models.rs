//! Core entities shared between the Agent Registry, Orchestrator,
//! Distributed Task Service, and Performance Monitor.
//!
//! Grounded on `app/agents/orchestrator.py`, `app/agents/monitoring.py`,
//! and `app/services/distributed_tasks.py` (original_source) for field
//! shape and semantics, rendered as typed Rust structs instead of loosely
//! typed dataclasses/dicts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{AgentId, SubtaskId, TaskId};

// ---------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Orchestrator,
    Domain,
    Tool,
    Supervisor,
    Worker,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Initializing,
    Idle,
    Processing,
    Waiting,
    Error,
    Stopped,
}

/// Declarative definition supplied by a caller creating an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub kind: AgentKind,
    pub system_prompt: String,
    pub capabilities: Vec<String>,
    pub domain: Option<String>,
    pub supervisor: Option<AgentId>,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub allow_delegation: bool,
    #[serde(default = "default_iteration_cap")]
    pub iteration_cap: u32,
}

fn default_iteration_cap() -> u32 {
    10
}

/// A patch applied via `Registry::update`. `id` and `kind` are immutable and
/// intentionally absent from this structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentPatch {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub domain: Option<String>,
    pub supervisor: Option<Option<AgentId>>,
    pub config: Option<HashMap<String, serde_json::Value>>,
    pub allow_delegation: Option<bool>,
    pub iteration_cap: Option<u32>,
}

/// The canonical, persistable agent record owned exclusively by the Registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub kind: AgentKind,
    pub system_prompt: String,
    pub capabilities: Vec<String>,
    pub domain: Option<String>,
    pub supervisor: Option<AgentId>,
    pub config: HashMap<String, serde_json::Value>,
    pub allow_delegation: bool,
    pub iteration_cap: u32,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Agent {
    pub fn from_definition(id: AgentId, definition: AgentDefinition, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: definition.name,
            kind: definition.kind,
            system_prompt: definition.system_prompt,
            capabilities: definition.capabilities,
            domain: definition.domain,
            supervisor: definition.supervisor,
            config: definition.config,
            allow_delegation: definition.allow_delegation,
            iteration_cap: definition.iteration_cap,
            status: AgentStatus::Initializing,
            created_at: now,
            last_activity: now,
        }
    }
}

/// Filters accepted by `Registry::list`.
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    pub kind: Option<AgentKind>,
    pub status: Option<AgentStatus>,
    pub capability_substring: Option<String>,
    pub domain: Option<String>,
}

// ---------------------------------------------------------------------
// Task / Subtask
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecompositionStrategy {
    Hierarchical,
    Sequential,
    Parallel,
    DivideConquer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DelegationStrategy {
    CapabilityMatch,
    DomainExpert,
    LoadBalanced,
    CostOptimized,
    PerformanceOptimized,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistributionMode {
    Local,
    Distributed,
    Hybrid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Submitted,
    Decomposing,
    Decomposed,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

impl Default for Priority {
    fn default() -> Self {
        Priority(3)
    }
}

impl Priority {
    pub fn clamp_valid(self) -> Self {
        Priority(self.0.clamp(1, 5))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRequest {
    pub description: String,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_decomposition_strategy")]
    pub decomposition_strategy: DecompositionStrategy,
    #[serde(default = "default_delegation_strategy")]
    pub delegation_strategy: DelegationStrategy,
    #[serde(default = "default_distribution_mode")]
    pub distribution_mode: DistributionMode,
}

fn default_decomposition_strategy() -> DecompositionStrategy {
    DecompositionStrategy::Hierarchical
}
fn default_delegation_strategy() -> DelegationStrategy {
    DelegationStrategy::CapabilityMatch
}
fn default_distribution_mode() -> DistributionMode {
    DistributionMode::Local
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub description: String,
    pub parameters: Option<serde_json::Value>,
    pub submitted_at: DateTime<Utc>,
    pub priority: Priority,
    pub decomposition_strategy: DecompositionStrategy,
    pub delegation_strategy: DelegationStrategy,
    pub distribution_mode: DistributionMode,
    pub status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(id: TaskId, request: TaskRequest, now: DateTime<Utc>) -> Self {
        Self {
            id,
            description: request.description,
            parameters: request.parameters,
            submitted_at: now,
            priority: request.priority.clamp_valid(),
            decomposition_strategy: request.decomposition_strategy,
            delegation_strategy: request.delegation_strategy,
            distribution_mode: request.distribution_mode,
            status: TaskStatus::Submitted,
            completed_at: None,
            result: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn score(self) -> u32 {
        match self {
            Complexity::Low => 1,
            Complexity::Medium => 3,
            Complexity::High => 10,
        }
    }

    pub fn cost(self) -> f64 {
        match self {
            Complexity::Low => 0.001,
            Complexity::Medium => 0.005,
            Complexity::High => 0.02,
        }
    }

    pub fn duration_ms(self) -> u64 {
        match self {
            Complexity::Low => 1_000,
            Complexity::Medium => 5_000,
            Complexity::High => 15_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubtaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub description: String,
    pub required_capabilities: Vec<String>,
    pub estimated_complexity: Complexity,
    pub dependencies: Vec<SubtaskId>,
    pub assigned_agent: Option<AgentId>,
    pub status: SubtaskStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Subtask {
    /// Capability used when a subtask declares no required capabilities.
    pub const DEFAULT_CAPABILITY: &'static str = "general";

    pub fn effective_capabilities(&self) -> Vec<String> {
        if self.required_capabilities.is_empty() {
            vec![Self::DEFAULT_CAPABILITY.to_string()]
        } else {
            self.required_capabilities.clone()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDecomposition {
    pub task_id: TaskId,
    pub original_description: String,
    pub strategy: DecompositionStrategy,
    pub subtasks: Vec<Subtask>,
    pub total_complexity: u32,
    pub max_parallelism: usize,
    pub critical_path: Vec<SubtaskId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationPlan {
    pub task_id: TaskId,
    pub strategy: DelegationStrategy,
    pub assignments: HashMap<SubtaskId, AgentId>,
    pub estimated_cost: f64,
    pub estimated_duration_ms: u64,
    pub load_distribution: HashMap<AgentId, usize>,
}

/// Outcome of executing a single subtask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskOutcome {
    pub subtask_id: SubtaskId,
    pub success: bool,
    pub agent_id: Option<AgentId>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAggregate {
    pub subtasks_total: usize,
    pub subtasks_successful: usize,
    pub subtasks_failed: usize,
    pub success_rate: f64,
    pub failed_subtasks: Vec<FailedSubtaskSummary>,
    pub results_by_subtask: HashMap<SubtaskId, SubtaskResultSummary>,
    pub combined_results: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSubtaskSummary {
    pub id: SubtaskId,
    pub error: Option<String>,
    pub agent: Option<AgentId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtaskResultSummary {
    pub success: bool,
    pub agent: Option<AgentId>,
    pub execution_time_ms: u64,
}

// ---------------------------------------------------------------------
// Performance Monitor
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Latency,
    Cost,
    SuccessRate,
    TokenUsage,
    ToolUsage,
    ErrorRate,
    QueueSize,
    MemoryUsage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub agent_id: AgentId,
    pub kind: MetricKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub source: String,
    pub source_id: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPerformanceStats {
    pub agent_id: AgentId,
    pub window_hours: u32,
    pub per_metric: HashMap<MetricKind, MetricStats>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub stddev: f64,
}

// ---------------------------------------------------------------------
// Distributed Task Service
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Online,
    Offline,
    Busy,
    Idle,
    Error,
    Stale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: String,
    pub kind: String,
    pub hostname: String,
    pub pid: u32,
    pub status: WorkerStatus,
    pub max_tasks: u32,
    pub active_tasks: u32,
    pub queue_names: Vec<String>,
    pub capabilities: HashMap<String, serde_json::Value>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub last_heartbeat: DateTime<Utc>,
}

impl Worker {
    /// Heartbeat liveness window: a worker older than this is stale.
    pub const STALE_AFTER_SECS: i64 = 5 * 60;

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        (now - self.last_heartbeat).num_seconds() > Self::STALE_AFTER_SECS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStats {
    pub queue_name: String,
    pub worker_count: u32,
    pub queued_count: u32,
    pub active_count: u32,
    pub utilization: f64,
    pub sampled_at: DateTime<Utc>,
}

impl QueueStats {
    pub fn compute(
        queue_name: impl Into<String>,
        worker_count: u32,
        queued_count: u32,
        active_count: u32,
        sampled_at: DateTime<Utc>,
    ) -> Self {
        let utilization = active_count as f64 / worker_count.max(1) as f64;
        Self {
            queue_name: queue_name.into(),
            worker_count,
            queued_count,
            active_count,
            utilization,
            sampled_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScalingKind {
    ScaleUp,
    ScaleDown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingDecision {
    pub kind: ScalingKind,
    pub queue_name: String,
    pub current_worker_count: u32,
    pub target_worker_count: u32,
    pub reason: String,
    pub metrics_snapshot: serde_json::Value,
    pub applied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderRecord {
    pub role: String,
    pub node_id: String,
    pub term: u64,
    pub lease_expires_at: DateTime<Utc>,
}

impl LeaderRecord {
    /// Lease duration granted on every successful claim.
    pub const LEASE_SECS: i64 = 30;

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.lease_expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderTransition {
    pub role: String,
    pub old_holder: Option<String>,
    pub new_holder: String,
    pub term: u64,
    pub reason: String,
    pub at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Manual intervention
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ManualTaskStatus {
    Open,
    Acknowledged,
    Resolved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualTask {
    pub id: Uuid,
    pub category: String,
    pub priority: Priority,
    pub source_system: String,
    pub source_id: String,
    pub description: String,
    pub status: ManualTaskStatus,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
