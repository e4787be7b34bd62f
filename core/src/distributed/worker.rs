//! Worker registration, heartbeat, and staleness sweep (spec §4.3,
//! "Worker lifecycle").
//!
//! Worker ID format and registration sequence grounded verbatim on
//! `app/services/distributed_tasks.py`'s `_generate_worker_id` /
//! `register_worker`.

use std::collections::HashMap;
use std::sync::Arc;

use agentaskit_shared::errors::CoreResult;
use agentaskit_shared::models::{Worker, WorkerStatus};
use chrono::Utc;
use rand::Rng;
use tracing::info;

use crate::persistence::PersistenceAdapter;

/// `hostname_pid_randomsuffix`, taken verbatim from the source's
/// `_generate_worker_id`.
pub fn generate_worker_id() -> String {
    let hostname = hostname();
    let pid = std::process::id();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{hostname}_{pid}_{suffix:06}")
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            #[cfg(unix)]
            {
                std::process::Command::new("hostname")
                    .output()
                    .ok()
                    .and_then(|o| String::from_utf8(o.stdout).ok())
                    .map(|s| s.trim().to_string())
            }
            #[cfg(not(unix))]
            {
                None
            }
        })
        .unwrap_or_else(|| "unknown-host".to_string())
}

pub async fn register(
    persistence: &dyn PersistenceAdapter,
    kind: &str,
    max_tasks: u32,
    queue_names: Vec<String>,
    capabilities: HashMap<String, serde_json::Value>,
) -> CoreResult<Worker> {
    let worker = Worker {
        worker_id: generate_worker_id(),
        kind: kind.to_string(),
        hostname: hostname(),
        pid: std::process::id(),
        status: WorkerStatus::Online,
        max_tasks,
        active_tasks: 0,
        queue_names,
        capabilities,
        metadata: HashMap::new(),
        last_heartbeat: Utc::now(),
    };

    persistence.upsert_worker(&worker).await?;
    persistence
        .record_worker_event(
            &worker.worker_id,
            "registered",
            serde_json::json!({ "hostname": worker.hostname, "pid": worker.pid, "kind": worker.kind }),
        )
        .await?;
    info!(worker_id = %worker.worker_id, "worker registered");
    Ok(worker)
}

pub async fn heartbeat(persistence: &dyn PersistenceAdapter, worker_id: &str) -> CoreResult<()> {
    if let Some(mut worker) = persistence.get_worker(worker_id).await? {
        worker.last_heartbeat = Utc::now();
        if worker.status == WorkerStatus::Stale {
            worker.status = WorkerStatus::Online;
        }
        persistence.upsert_worker(&worker).await?;
    }
    Ok(())
}

pub async fn unregister(persistence: &dyn PersistenceAdapter, worker_id: &str) -> CoreResult<()> {
    if let Some(mut worker) = persistence.get_worker(worker_id).await? {
        worker.status = WorkerStatus::Offline;
        persistence.upsert_worker(&worker).await?;
    }
    persistence
        .record_worker_event(worker_id, "unregistered", serde_json::json!({}))
        .await
}

/// Marks any worker whose heartbeat is older than `Worker::STALE_AFTER_SECS`
/// as `stale`, then `offline`, per spec's periodic system job (spec §4.3,
/// "A periodic system job... marks any worker `stale -> offline`").
///
/// The two transitions are distinct writes rather than one jump, so a
/// worker that resumes heartbeating while merely `stale` is rescued back
/// to `online` by `heartbeat` instead of having already been discarded.
pub async fn sweep_stale(persistence: &dyn PersistenceAdapter) -> CoreResult<usize> {
    let now = Utc::now();
    let workers = persistence.list_workers().await?;
    let mut marked = 0;
    for mut worker in workers {
        if !worker.is_stale(now) {
            continue;
        }
        match worker.status {
            WorkerStatus::Offline => continue,
            WorkerStatus::Stale => {
                worker.status = WorkerStatus::Offline;
                persistence.upsert_worker(&worker).await?;
                persistence
                    .record_worker_event(&worker.worker_id, "offline", serde_json::json!({}))
                    .await?;
                marked += 1;
            }
            _ => {
                worker.status = WorkerStatus::Stale;
                persistence.upsert_worker(&worker).await?;
                persistence
                    .record_worker_event(&worker.worker_id, "stale", serde_json::json!({}))
                    .await?;
                marked += 1;
            }
        }
    }
    Ok(marked)
}

pub fn spawn_stale_sweep(persistence: Arc<dyn PersistenceAdapter>, interval: std::time::Duration, running: Arc<tokio::sync::RwLock<bool>>) {
    tokio::spawn(async move {
        while *running.read().await {
            tokio::time::sleep(interval).await;
            if let Err(err) = sweep_stale(persistence.as_ref()).await {
                tracing::warn!(error = %err, "stale worker sweep failed");
            }
        }
    });
}
