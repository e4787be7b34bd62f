//! Periodic queue-depth/utilization sampling (spec §4.3, "Queue
//! accounting").
//!
//! Grounded on `app/celery_tasks/system_tasks.py`'s `update_queue_stats`.

use std::sync::Arc;

use agentaskit_shared::errors::CoreResult;
use agentaskit_shared::models::{QueueStats, WorkerStatus};
use chrono::Utc;

use crate::broker::BrokerAdapter;
use crate::persistence::PersistenceAdapter;

/// Samples `(depth, online_worker_count, active_task_count)` for
/// `queue_name` and persists the snapshot.
pub async fn sample(
    persistence: &dyn PersistenceAdapter,
    broker: &dyn BrokerAdapter,
    queue_name: &str,
) -> CoreResult<QueueStats> {
    let depth = broker.queue_depth(queue_name).await? as u32;

    let workers = persistence.list_workers().await?;
    let relevant: Vec<_> = workers
        .iter()
        .filter(|w| w.queue_names.iter().any(|q| q == queue_name))
        .collect();
    let worker_count = relevant.iter().filter(|w| w.status == WorkerStatus::Online).count() as u32;
    let active_count: u32 = relevant.iter().map(|w| w.active_tasks).sum();

    let stats = QueueStats::compute(queue_name, worker_count, depth, active_count, Utc::now());
    persistence.insert_queue_stats(&stats).await?;
    Ok(stats)
}

pub fn spawn_sampler(
    persistence: Arc<dyn PersistenceAdapter>,
    broker: Arc<dyn BrokerAdapter>,
    queue_names: Vec<String>,
    interval: std::time::Duration,
    running: Arc<tokio::sync::RwLock<bool>>,
) {
    tokio::spawn(async move {
        while *running.read().await {
            tokio::time::sleep(interval).await;
            for queue_name in &queue_names {
                if let Err(err) = sample(persistence.as_ref(), broker.as_ref(), queue_name).await {
                    tracing::warn!(error = %err, queue_name, "queue stats sample failed");
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::memory::InMemoryBroker;
    use crate::persistence::memory::InMemoryPersistence;

    #[tokio::test]
    async fn utilization_reflects_active_over_worker_count() {
        let persistence = InMemoryPersistence::new();
        let broker = InMemoryBroker::new();
        broker.enqueue("default", 1, serde_json::json!({})).await.unwrap();
        broker.enqueue("default", 1, serde_json::json!({})).await.unwrap();

        let stats = sample(&persistence, &broker, "default").await.unwrap();
        assert_eq!(stats.queued_count, 2);
        assert_eq!(stats.worker_count, 0);
        assert_eq!(stats.utilization, 0.0);
    }
}
