//! Performance Monitor: metric ingestion, rolling aggregates, anomaly
//! alerting (spec §4.4).
//!
//! Grounded on `app/agents/monitoring.py` (`record_metric`,
//! `record_agent_execution`, `_ensure_uuid`, `_check_agent_anomalies`,
//! `acknowledge_alert`, `resolve_alert`). Background loops follow the
//! teacher's `running: Arc<RwLock<bool>>` + `tokio::spawn` pattern in
//! `core/src/orchestration/mod.rs`.

pub mod aggregates;
pub mod alerts;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use agentaskit_shared::errors::CoreResult;
use agentaskit_shared::ids::{ensure_uuid, AgentId};
use agentaskit_shared::models::{
    Agent, AgentPerformanceStats, AgentStatus, Alert, MetricKind, MetricSample, MetricStats,
};

use crate::persistence::PersistenceAdapter;

/// Ingestion buffer flushes after this many buffered samples (spec §4.4).
const FLUSH_AT: usize = 100;

#[derive(Default)]
struct Buffer {
    samples: Vec<MetricSample>,
}

struct ExecutionHistory {
    by_agent: HashMap<AgentId, Vec<(bool, DateTime<Utc>)>>,
}

pub struct PerformanceMonitor {
    persistence: Arc<dyn PersistenceAdapter>,
    buffer: Mutex<Buffer>,
    alerts: RwLock<HashMap<String, Alert>>,
    history: Mutex<ExecutionHistory>,
    running: Arc<RwLock<bool>>,
}

impl PerformanceMonitor {
    pub async fn new(persistence: Arc<dyn PersistenceAdapter>) -> CoreResult<Self> {
        let alerts = persistence
            .list_alerts()
            .await?
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();
        Ok(Self {
            persistence,
            buffer: Mutex::new(Buffer::default()),
            alerts: RwLock::new(alerts),
            history: Mutex::new(ExecutionHistory {
                by_agent: HashMap::new(),
            }),
            running: Arc::new(RwLock::new(false)),
        })
    }

    /// Non-blocking ingestion: appends to the buffer, flushing at 100
    /// entries. `agent_id = "system"` substitutes the fixed system UUID;
    /// other non-UUID strings are hashed deterministically (spec §4.4,
    /// Design Notes §9).
    pub async fn record(&self, agent_id: &str, kind: MetricKind, value: f64, tags: HashMap<String, String>) {
        let sample = MetricSample {
            agent_id: ensure_uuid(agent_id),
            kind,
            value,
            timestamp: Utc::now(),
            tags,
        };

        let should_flush = {
            let mut buffer = self.buffer.lock();
            buffer.samples.push(sample);
            buffer.samples.len() >= FLUSH_AT
        };

        if should_flush {
            self.flush().await;
        }
    }

    pub async fn flush(&self) {
        let batch = {
            let mut buffer = self.buffer.lock();
            std::mem::take(&mut buffer.samples)
        };
        if batch.is_empty() {
            return;
        }
        if let Err(err) = self.persistence.insert_metric_samples(&batch).await {
            // Flush failures restore the buffer and retry next cycle
            // (spec §4.4, "Failure semantics"); never surfaced to the
            // caller that recorded the metric.
            warn!(error = %err, samples = batch.len(), "metric flush failed, restoring buffer");
            let mut buffer = self.buffer.lock();
            buffer.samples.extend(batch);
            if buffer.samples.len() > FLUSH_AT * 2 {
                let overflow = buffer.samples.len() - FLUSH_AT * 2;
                buffer.samples.drain(0..overflow);
                warn!(dropped = overflow, "metric buffer overflow, oldest samples discarded");
            }
        }
    }

    /// Anomaly detection on every subtask/agent execution (spec §4.4).
    /// Recording never fails from the caller's perspective: alert
    /// write failures are logged, not propagated.
    pub async fn record_agent_execution(
        &self,
        agent_id: &str,
        success: bool,
        execution_time_ms: u64,
    ) {
        let id = ensure_uuid(agent_id);
        let now = Utc::now();

        self.record(
            agent_id,
            MetricKind::Latency,
            execution_time_ms as f64,
            HashMap::new(),
        )
        .await;

        if execution_time_ms > alerts::HIGH_LATENCY_THRESHOLD_MS {
            let alert = alerts::high_latency_alert(agent_id, execution_time_ms, now);
            self.raise(alert).await;
        }

        let failure_rate = {
            let mut history = self.history.lock();
            let entries = history.by_agent.entry(id).or_default();
            entries.push((success, now));
            if entries.len() > 10_000 {
                entries.drain(0..entries.len() - 10_000);
            }
            alerts::recent_failure_rate(entries, now)
        };

        if !success {
            if let Some(rate) = failure_rate {
                if rate > alerts::FAILURE_RATE_THRESHOLD {
                    let alert = alerts::high_failure_rate_alert(agent_id, rate, now);
                    self.raise(alert).await;
                }
            }
        }
    }

    async fn raise(&self, alert: Alert) {
        if let Err(err) = self.persistence.upsert_alert(&alert).await {
            error!(error = %err, alert_id = %alert.id, "alert write failed");
        }
        self.alerts.write().await.insert(alert.id.clone(), alert);
    }

    pub async fn acknowledge(&self, id: &str) -> CoreResult<()> {
        let mut alerts = self.alerts.write().await;
        if let Some(alert) = alerts.get_mut(id) {
            if !alert.acknowledged {
                alert.acknowledged = true;
                alert.acknowledged_at = Some(Utc::now());
                self.persistence.upsert_alert(alert).await?;
            }
        }
        Ok(())
    }

    pub async fn resolve(&self, id: &str) -> CoreResult<()> {
        let mut alerts = self.alerts.write().await;
        if let Some(alert) = alerts.get_mut(id) {
            if !alert.resolved {
                alert.resolved = true;
                alert.resolved_at = Some(Utc::now());
                self.persistence.upsert_alert(alert).await?;
            }
        }
        Ok(())
    }

    pub async fn list_alerts(&self, severity: Option<agentaskit_shared::models::AlertSeverity>, resolved: Option<bool>) -> Vec<Alert> {
        self.alerts
            .read()
            .await
            .values()
            .filter(|a| severity.map_or(true, |s| a.severity == s))
            .filter(|a| resolved.map_or(true, |r| a.resolved == r))
            .cloned()
            .collect()
    }

    pub async fn get_agent_performance(
        &self,
        agent_id: AgentId,
        window_hours: u32,
    ) -> CoreResult<AgentPerformanceStats> {
        let since = Utc::now() - chrono::Duration::hours(window_hours as i64);
        let samples = self.persistence.get_metric_samples(agent_id, since).await?;
        let grouped = aggregates::group_by_kind(&samples);
        let per_metric = grouped
            .into_iter()
            .map(|(kind, values)| (kind, aggregates::compute_stats(values)))
            .collect();
        Ok(AgentPerformanceStats {
            agent_id,
            window_hours,
            per_metric,
        })
    }

    pub async fn get_system_performance(
        &self,
        window_hours: u32,
        agents: &[Agent],
    ) -> CoreResult<SystemPerformance> {
        let since = Utc::now() - chrono::Duration::hours(window_hours as i64);
        let mut all_samples = Vec::new();
        for agent in agents {
            all_samples.extend(self.persistence.get_metric_samples(agent.id, since).await?);
        }
        let grouped = aggregates::group_by_kind(&all_samples);
        let per_metric = grouped
            .into_iter()
            .map(|(kind, values)| (kind, aggregates::compute_stats(values)))
            .collect();

        let total_cost: f64 = all_samples
            .iter()
            .filter(|s| s.kind == MetricKind::Cost)
            .map(|s| s.value)
            .sum();

        let mut agent_status_counts: HashMap<AgentStatus, usize> = HashMap::new();
        for agent in agents {
            *agent_status_counts.entry(agent.status).or_insert(0) += 1;
        }

        Ok(SystemPerformance {
            window_hours,
            per_metric,
            total_cost,
            agent_status_counts,
        })
    }

    /// Background flush loop: once per `interval` (default 60s).
    pub fn spawn_flush_loop(self: &Arc<Self>, interval: StdDuration) {
        let monitor = Arc::clone(self);
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            while *running.read().await {
                tokio::time::sleep(interval).await;
                monitor.flush().await;
            }
        });
    }

    /// Background alert sweep: removes resolved alerts older than 7 days
    /// from the in-memory cache only (storage retains them).
    pub fn spawn_alert_sweep(self: &Arc<Self>, interval: StdDuration) {
        let monitor = Arc::clone(self);
        let running = Arc::clone(&self.running);
        tokio::spawn(async move {
            while *running.read().await {
                tokio::time::sleep(interval).await;
                let now = Utc::now();
                let mut alerts = monitor.alerts.write().await;
                alerts.retain(|_, alert| !alerts::should_gc(alert, now));
            }
        });
    }

    pub async fn start(&self) {
        *self.running.write().await = true;
        info!("performance monitor background loops enabled");
    }

    pub async fn shutdown(&self) {
        *self.running.write().await = false;
        self.flush().await;
    }
}

#[derive(Debug, Clone)]
pub struct SystemPerformance {
    pub window_hours: u32,
    pub per_metric: HashMap<MetricKind, MetricStats>,
    pub total_cost: f64,
    pub agent_status_counts: HashMap<AgentStatus, usize>,
}
