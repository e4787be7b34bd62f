//! `sqlx`/Postgres-backed `PersistenceAdapter`.
//!
//! Grounded on `examples/FlexNetOS-noa_ark_os/server/gateway/src/main.rs`'s
//! `PgPoolOptions::new().max_connections(...).connect_lazy_with(...)`
//! connection-pool pattern — the sibling project in the same source
//! organization that already wires `sqlx` + `redis` for this kind of
//! service. JSON columns centralize encoding here, per Design Notes §9.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use agentaskit_shared::errors::{CoreError, CoreResult};
use agentaskit_shared::ids::{AgentId, TaskId};
use agentaskit_shared::models::{
    Agent, Alert, LeaderRecord, LeaderTransition, ManualTask, MetricSample, QueueStats,
    ScalingDecision, Task, TaskDecomposition, Worker,
};

use super::PersistenceAdapter;

pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    fn map_sqlx_err(err: sqlx::Error) -> CoreError {
        CoreError::Internal(anyhow::anyhow!(err))
    }

    fn row_to_agent(row: PgRow) -> CoreResult<Agent> {
        let config: serde_json::Value = row.try_get("config").map_err(Self::map_sqlx_err)?;
        let capabilities: serde_json::Value =
            row.try_get("capabilities").map_err(Self::map_sqlx_err)?;
        Ok(Agent {
            id: row.try_get("id").map_err(Self::map_sqlx_err)?,
            name: row.try_get("name").map_err(Self::map_sqlx_err)?,
            kind: serde_json::from_value(row.try_get::<serde_json::Value, _>("kind").map_err(Self::map_sqlx_err)?)
                .map_err(|e| CoreError::Internal(e.into()))?,
            system_prompt: row.try_get("system_prompt").map_err(Self::map_sqlx_err)?,
            capabilities: serde_json::from_value(capabilities).map_err(|e| CoreError::Internal(e.into()))?,
            domain: row.try_get("domain").map_err(Self::map_sqlx_err)?,
            supervisor: row.try_get("supervisor").map_err(Self::map_sqlx_err)?,
            config: serde_json::from_value(config).map_err(|e| CoreError::Internal(e.into()))?,
            allow_delegation: row.try_get("allow_delegation").map_err(Self::map_sqlx_err)?,
            iteration_cap: row
                .try_get::<i32, _>("iteration_cap")
                .map_err(Self::map_sqlx_err)? as u32,
            status: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("status").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            created_at: row.try_get("created_at").map_err(Self::map_sqlx_err)?,
            last_activity: row.try_get("last_activity").map_err(Self::map_sqlx_err)?,
        })
    }
}

#[async_trait]
impl PersistenceAdapter for PostgresPersistence {
    async fn insert_agent(&self, agent: &Agent) -> CoreResult<()> {
        let existing: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM agents WHERE name = $1")
                .bind(&agent.name)
                .fetch_optional(&self.pool)
                .await
                .map_err(Self::map_sqlx_err)?;
        if existing.is_some() {
            return Err(CoreError::NameConflict(agent.name.clone()));
        }

        sqlx::query(
            r#"INSERT INTO agents
                (id, name, kind, system_prompt, capabilities, domain, supervisor, config,
                 allow_delegation, iteration_cap, status, created_at, last_activity)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)"#,
        )
        .bind(agent.id)
        .bind(&agent.name)
        .bind(serde_json::to_value(agent.kind).unwrap())
        .bind(&agent.system_prompt)
        .bind(serde_json::to_value(&agent.capabilities).unwrap())
        .bind(&agent.domain)
        .bind(agent.supervisor)
        .bind(serde_json::to_value(&agent.config).unwrap())
        .bind(agent.allow_delegation)
        .bind(agent.iteration_cap as i32)
        .bind(serde_json::to_value(agent.status).unwrap())
        .bind(agent.created_at)
        .bind(agent.last_activity)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn update_agent(&self, agent: &Agent) -> CoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE agents SET name=$2, system_prompt=$3, capabilities=$4, domain=$5,
                supervisor=$6, config=$7, allow_delegation=$8, iteration_cap=$9,
                status=$10, last_activity=$11
               WHERE id = $1"#,
        )
        .bind(agent.id)
        .bind(&agent.name)
        .bind(&agent.system_prompt)
        .bind(serde_json::to_value(&agent.capabilities).unwrap())
        .bind(&agent.domain)
        .bind(agent.supervisor)
        .bind(serde_json::to_value(&agent.config).unwrap())
        .bind(agent.allow_delegation)
        .bind(agent.iteration_cap as i32)
        .bind(serde_json::to_value(agent.status).unwrap())
        .bind(agent.last_activity)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("agent {}", agent.id)));
        }
        Ok(())
    }

    async fn delete_agent(&self, id: AgentId) -> CoreResult<()> {
        sqlx::query("DELETE FROM agents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn get_agent(&self, id: AgentId) -> CoreResult<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        row.map(Self::row_to_agent).transpose()
    }

    async fn get_agent_by_name(&self, name: &str) -> CoreResult<Option<Agent>> {
        let row = sqlx::query("SELECT * FROM agents WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        row.map(Self::row_to_agent).transpose()
    }

    async fn list_agents(&self) -> CoreResult<Vec<Agent>> {
        let rows = sqlx::query("SELECT * FROM agents ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        rows.into_iter().map(Self::row_to_agent).collect()
    }

    async fn insert_task(&self, task: &Task) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO tasks
                (id, description, parameters, submitted_at, priority, decomposition_strategy,
                 delegation_strategy, distribution_mode, status, completed_at, result, error)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
               ON CONFLICT (id) DO NOTHING"#,
        )
        .bind(task.id)
        .bind(&task.description)
        .bind(&task.parameters)
        .bind(task.submitted_at)
        .bind(task.priority.0 as i16)
        .bind(serde_json::to_value(task.decomposition_strategy).unwrap())
        .bind(serde_json::to_value(task.delegation_strategy).unwrap())
        .bind(serde_json::to_value(task.distribution_mode).unwrap())
        .bind(serde_json::to_value(task.status).unwrap())
        .bind(task.completed_at)
        .bind(&task.result)
        .bind(&task.error)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn update_task(&self, task: &Task) -> CoreResult<()> {
        sqlx::query(
            r#"UPDATE tasks SET status=$2, completed_at=$3, result=$4, error=$5 WHERE id = $1"#,
        )
        .bind(task.id)
        .bind(serde_json::to_value(task.status).unwrap())
        .bind(task.completed_at)
        .bind(&task.result)
        .bind(&task.error)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> CoreResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(Task {
            id: row.try_get("id").map_err(Self::map_sqlx_err)?,
            description: row.try_get("description").map_err(Self::map_sqlx_err)?,
            parameters: row.try_get("parameters").map_err(Self::map_sqlx_err)?,
            submitted_at: row.try_get("submitted_at").map_err(Self::map_sqlx_err)?,
            priority: agentaskit_shared::models::Priority(
                row.try_get::<i16, _>("priority").map_err(Self::map_sqlx_err)? as u8,
            ),
            decomposition_strategy: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("decomposition_strategy")
                    .map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            delegation_strategy: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("delegation_strategy")
                    .map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            distribution_mode: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("distribution_mode")
                    .map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            status: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("status").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            completed_at: row.try_get("completed_at").map_err(Self::map_sqlx_err)?,
            result: row.try_get("result").map_err(Self::map_sqlx_err)?,
            error: row.try_get("error").map_err(Self::map_sqlx_err)?,
        }))
    }

    async fn upsert_decomposition(&self, decomposition: &TaskDecomposition) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO task_decompositions
                (task_id, original_description, strategy, subtasks, total_complexity,
                 max_parallelism, critical_path)
               VALUES ($1,$2,$3,$4,$5,$6,$7)
               ON CONFLICT (task_id) DO UPDATE SET subtasks = EXCLUDED.subtasks"#,
        )
        .bind(decomposition.task_id)
        .bind(&decomposition.original_description)
        .bind(serde_json::to_value(decomposition.strategy).unwrap())
        .bind(serde_json::to_value(&decomposition.subtasks).unwrap())
        .bind(decomposition.total_complexity as i32)
        .bind(decomposition.max_parallelism as i32)
        .bind(serde_json::to_value(&decomposition.critical_path).unwrap())
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn get_decomposition(&self, task_id: TaskId) -> CoreResult<Option<TaskDecomposition>> {
        let row = sqlx::query("SELECT * FROM task_decompositions WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(TaskDecomposition {
            task_id: row.try_get("task_id").map_err(Self::map_sqlx_err)?,
            original_description: row
                .try_get("original_description")
                .map_err(Self::map_sqlx_err)?,
            strategy: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("strategy").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            subtasks: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("subtasks").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            total_complexity: row
                .try_get::<i32, _>("total_complexity")
                .map_err(Self::map_sqlx_err)? as u32,
            max_parallelism: row
                .try_get::<i32, _>("max_parallelism")
                .map_err(Self::map_sqlx_err)? as usize,
            critical_path: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("critical_path")
                    .map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
        }))
    }

    async fn insert_metric_samples(&self, samples: &[MetricSample]) -> CoreResult<()> {
        if samples.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.map_err(Self::map_sqlx_err)?;
        for sample in samples {
            sqlx::query(
                r#"INSERT INTO agent_performance_metrics (agent_id, kind, value, timestamp, tags)
                   VALUES ($1,$2,$3,$4,$5)"#,
            )
            .bind(sample.agent_id)
            .bind(serde_json::to_value(sample.kind).unwrap())
            .bind(sample.value)
            .bind(sample.timestamp)
            .bind(serde_json::to_value(&sample.tags).unwrap())
            .execute(&mut *tx)
            .await
            .map_err(Self::map_sqlx_err)?;
        }
        tx.commit().await.map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn get_metric_samples(
        &self,
        agent_id: AgentId,
        since: DateTime<Utc>,
    ) -> CoreResult<Vec<MetricSample>> {
        let rows = sqlx::query(
            "SELECT * FROM agent_performance_metrics WHERE agent_id = $1 AND timestamp >= $2",
        )
        .bind(agent_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;

        rows.into_iter()
            .map(|row| {
                Ok(MetricSample {
                    agent_id: row.try_get("agent_id").map_err(Self::map_sqlx_err)?,
                    kind: serde_json::from_value(
                        row.try_get::<serde_json::Value, _>("kind").map_err(Self::map_sqlx_err)?,
                    )
                    .map_err(|e| CoreError::Internal(e.into()))?,
                    value: row.try_get("value").map_err(Self::map_sqlx_err)?,
                    timestamp: row.try_get("timestamp").map_err(Self::map_sqlx_err)?,
                    tags: serde_json::from_value(
                        row.try_get::<serde_json::Value, _>("tags").map_err(Self::map_sqlx_err)?,
                    )
                    .map_err(|e| CoreError::Internal(e.into()))?,
                })
            })
            .collect()
    }

    async fn upsert_alert(&self, alert: &Alert) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO system_alerts
                (id, title, message, severity, source, source_id, metadata, created_at,
                 acknowledged, acknowledged_at, resolved, resolved_at)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
               ON CONFLICT (id) DO UPDATE SET
                 acknowledged = EXCLUDED.acknowledged,
                 acknowledged_at = EXCLUDED.acknowledged_at,
                 resolved = EXCLUDED.resolved,
                 resolved_at = EXCLUDED.resolved_at"#,
        )
        .bind(&alert.id)
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(serde_json::to_value(alert.severity).unwrap())
        .bind(&alert.source)
        .bind(&alert.source_id)
        .bind(serde_json::to_value(&alert.metadata).unwrap())
        .bind(alert.created_at)
        .bind(alert.acknowledged)
        .bind(alert.acknowledged_at)
        .bind(alert.resolved)
        .bind(alert.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn get_alert(&self, id: &str) -> CoreResult<Option<Alert>> {
        let row = sqlx::query("SELECT * FROM system_alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        row.map(Self::row_to_alert).transpose()
    }

    async fn list_alerts(&self) -> CoreResult<Vec<Alert>> {
        let rows = sqlx::query("SELECT * FROM system_alerts ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        rows.into_iter().map(Self::row_to_alert).collect()
    }

    async fn delete_alert(&self, id: &str) -> CoreResult<()> {
        sqlx::query("DELETE FROM system_alerts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn upsert_worker(&self, worker: &Worker) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO task_workers
                (worker_id, kind, hostname, pid, status, max_tasks, active_tasks, queue_names,
                 capabilities, metadata, last_heartbeat)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
               ON CONFLICT (worker_id) DO UPDATE SET
                 status = EXCLUDED.status,
                 active_tasks = EXCLUDED.active_tasks,
                 last_heartbeat = EXCLUDED.last_heartbeat"#,
        )
        .bind(&worker.worker_id)
        .bind(&worker.kind)
        .bind(&worker.hostname)
        .bind(worker.pid as i32)
        .bind(serde_json::to_value(worker.status).unwrap())
        .bind(worker.max_tasks as i32)
        .bind(worker.active_tasks as i32)
        .bind(serde_json::to_value(&worker.queue_names).unwrap())
        .bind(serde_json::to_value(&worker.capabilities).unwrap())
        .bind(serde_json::to_value(&worker.metadata).unwrap())
        .bind(worker.last_heartbeat)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn get_worker(&self, worker_id: &str) -> CoreResult<Option<Worker>> {
        let row = sqlx::query("SELECT * FROM task_workers WHERE worker_id = $1")
            .bind(worker_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        row.map(Self::row_to_worker).transpose()
    }

    async fn list_workers(&self) -> CoreResult<Vec<Worker>> {
        let rows = sqlx::query("SELECT * FROM task_workers")
            .fetch_all(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        rows.into_iter().map(Self::row_to_worker).collect()
    }

    async fn record_worker_event(
        &self,
        worker_id: &str,
        event: &str,
        metadata: serde_json::Value,
    ) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO worker_events (worker_id, event, metadata, created_at) VALUES ($1,$2,$3,$4)",
        )
        .bind(worker_id)
        .bind(event)
        .bind(metadata)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn insert_queue_stats(&self, stats: &QueueStats) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO task_queue_stats
                (queue_name, worker_count, queued_count, active_count, utilization, sampled_at)
               VALUES ($1,$2,$3,$4,$5,$6)"#,
        )
        .bind(&stats.queue_name)
        .bind(stats.worker_count as i32)
        .bind(stats.queued_count as i32)
        .bind(stats.active_count as i32)
        .bind(stats.utilization)
        .bind(stats.sampled_at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn insert_scaling_decision(&self, decision: &ScalingDecision) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO scaling_decisions
                (kind, queue_name, current_worker_count, target_worker_count, reason,
                 metrics_snapshot, applied)
               VALUES ($1,$2,$3,$4,$5,$6,$7)"#,
        )
        .bind(serde_json::to_value(decision.kind).unwrap())
        .bind(&decision.queue_name)
        .bind(decision.current_worker_count as i32)
        .bind(decision.target_worker_count as i32)
        .bind(&decision.reason)
        .bind(&decision.metrics_snapshot)
        .bind(decision.applied)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn get_leader_record(&self, role: &str) -> CoreResult<Option<LeaderRecord>> {
        let row = sqlx::query("SELECT * FROM leader_election WHERE role = $1")
            .bind(role)
            .fetch_optional(&self.pool)
            .await
            .map_err(Self::map_sqlx_err)?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(LeaderRecord {
            role: row.try_get("role").map_err(Self::map_sqlx_err)?,
            node_id: row.try_get("node_id").map_err(Self::map_sqlx_err)?,
            term: row.try_get::<i64, _>("term").map_err(Self::map_sqlx_err)? as u64,
            lease_expires_at: row.try_get("lease_expires_at").map_err(Self::map_sqlx_err)?,
        }))
    }

    async fn compare_and_set_leader(
        &self,
        record: &LeaderRecord,
        now: DateTime<Utc>,
    ) -> CoreResult<bool> {
        let result = sqlx::query(
            r#"INSERT INTO leader_election (role, node_id, term, lease_expires_at)
               VALUES ($1,$2,$3,$4)
               ON CONFLICT (role) DO UPDATE SET
                 node_id = EXCLUDED.node_id, term = EXCLUDED.term,
                 lease_expires_at = EXCLUDED.lease_expires_at
               WHERE leader_election.lease_expires_at <= $5
                  OR leader_election.node_id = $2"#,
        )
        .bind(&record.role)
        .bind(&record.node_id)
        .bind(record.term as i64)
        .bind(record.lease_expires_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn append_leader_history(&self, transition: &LeaderTransition) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO leader_history (role, old_holder, new_holder, term, reason, at)
               VALUES ($1,$2,$3,$4,$5,$6)"#,
        )
        .bind(&transition.role)
        .bind(&transition.old_holder)
        .bind(&transition.new_holder)
        .bind(transition.term as i64)
        .bind(&transition.reason)
        .bind(transition.at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn upsert_manual_task(&self, task: &ManualTask) -> CoreResult<()> {
        sqlx::query(
            r#"INSERT INTO manual_tasks
                (id, category, priority, source_system, source_id, description, status,
                 created_at, last_seen_at, resolved_at)
               VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
               ON CONFLICT (id) DO UPDATE SET
                 status = EXCLUDED.status,
                 last_seen_at = EXCLUDED.last_seen_at,
                 resolved_at = EXCLUDED.resolved_at"#,
        )
        .bind(task.id)
        .bind(&task.category)
        .bind(task.priority.0 as i16)
        .bind(&task.source_system)
        .bind(&task.source_id)
        .bind(&task.description)
        .bind(serde_json::to_value(task.status).unwrap())
        .bind(task.created_at)
        .bind(task.last_seen_at)
        .bind(task.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }

    async fn find_open_manual_task(
        &self,
        source_system: &str,
        source_id: &str,
    ) -> CoreResult<Option<ManualTask>> {
        let row = sqlx::query(
            r#"SELECT * FROM manual_tasks
               WHERE source_system = $1 AND source_id = $2 AND status != 'resolved'
               LIMIT 1"#,
        )
        .bind(source_system)
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(ManualTask {
            id: row.try_get("id").map_err(Self::map_sqlx_err)?,
            category: row.try_get("category").map_err(Self::map_sqlx_err)?,
            priority: agentaskit_shared::models::Priority(
                row.try_get::<i16, _>("priority").map_err(Self::map_sqlx_err)? as u8,
            ),
            source_system: row.try_get("source_system").map_err(Self::map_sqlx_err)?,
            source_id: row.try_get("source_id").map_err(Self::map_sqlx_err)?,
            description: row.try_get("description").map_err(Self::map_sqlx_err)?,
            status: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("status").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            created_at: row.try_get("created_at").map_err(Self::map_sqlx_err)?,
            last_seen_at: row.try_get("last_seen_at").map_err(Self::map_sqlx_err)?,
            resolved_at: row.try_get("resolved_at").map_err(Self::map_sqlx_err)?,
        }))
    }

    async fn record_error_log(
        &self,
        context: &str,
        message: &str,
        details: Option<serde_json::Value>,
    ) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO error_logs (context, message, details, created_at) VALUES ($1,$2,$3,$4)",
        )
        .bind(context)
        .bind(message)
        .bind(details)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Self::map_sqlx_err)?;
        Ok(())
    }
}

impl PostgresPersistence {
    fn row_to_alert(row: PgRow) -> CoreResult<Alert> {
        Ok(Alert {
            id: row.try_get("id").map_err(Self::map_sqlx_err)?,
            title: row.try_get("title").map_err(Self::map_sqlx_err)?,
            message: row.try_get("message").map_err(Self::map_sqlx_err)?,
            severity: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("severity").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            source: row.try_get("source").map_err(Self::map_sqlx_err)?,
            source_id: row.try_get("source_id").map_err(Self::map_sqlx_err)?,
            metadata: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("metadata").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            created_at: row.try_get("created_at").map_err(Self::map_sqlx_err)?,
            acknowledged: row.try_get("acknowledged").map_err(Self::map_sqlx_err)?,
            acknowledged_at: row.try_get("acknowledged_at").map_err(Self::map_sqlx_err)?,
            resolved: row.try_get("resolved").map_err(Self::map_sqlx_err)?,
            resolved_at: row.try_get("resolved_at").map_err(Self::map_sqlx_err)?,
        })
    }

    fn row_to_worker(row: PgRow) -> CoreResult<Worker> {
        Ok(Worker {
            worker_id: row.try_get("worker_id").map_err(Self::map_sqlx_err)?,
            kind: row.try_get("kind").map_err(Self::map_sqlx_err)?,
            hostname: row.try_get("hostname").map_err(Self::map_sqlx_err)?,
            pid: row.try_get::<i32, _>("pid").map_err(Self::map_sqlx_err)? as u32,
            status: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("status").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            max_tasks: row.try_get::<i32, _>("max_tasks").map_err(Self::map_sqlx_err)? as u32,
            active_tasks: row
                .try_get::<i32, _>("active_tasks")
                .map_err(Self::map_sqlx_err)? as u32,
            queue_names: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("queue_names").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            capabilities: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("capabilities").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            metadata: serde_json::from_value(
                row.try_get::<serde_json::Value, _>("metadata").map_err(Self::map_sqlx_err)?,
            )
            .map_err(|e| CoreError::Internal(e.into()))?,
            last_heartbeat: row.try_get("last_heartbeat").map_err(Self::map_sqlx_err)?,
        })
    }
}
