//! Idempotent manual-intervention record insertion (spec §9, "Manual
//! intervention errors"; GLOSSARY "Manual intervention record").
//!
//! Repeated triggers for the same `(source_system, source_id)` collapse
//! to one open record with a bumped `last_seen_at`, rather than
//! duplicating — grounded on the source's manual-review-queue insert
//! path described in Design Notes §9.

use agentaskit_shared::errors::CoreResult;
use agentaskit_shared::models::{ManualTask, ManualTaskStatus, Priority};
use chrono::Utc;
use uuid::Uuid;

use crate::persistence::PersistenceAdapter;

pub async fn raise(
    persistence: &dyn PersistenceAdapter,
    category: &str,
    priority: Priority,
    source_system: &str,
    source_id: &str,
    description: &str,
) -> CoreResult<ManualTask> {
    let now = Utc::now();

    if let Some(mut existing) = persistence.find_open_manual_task(source_system, source_id).await? {
        existing.last_seen_at = now;
        persistence.upsert_manual_task(&existing).await?;
        return Ok(existing);
    }

    let task = ManualTask {
        id: Uuid::new_v4(),
        category: category.to_string(),
        priority,
        source_system: source_system.to_string(),
        source_id: source_id.to_string(),
        description: description.to_string(),
        status: ManualTaskStatus::Open,
        created_at: now,
        last_seen_at: now,
        resolved_at: None,
    };
    persistence.upsert_manual_task(&task).await?;
    Ok(task)
}

pub async fn acknowledge(persistence: &dyn PersistenceAdapter, source_system: &str, source_id: &str) -> CoreResult<()> {
    if let Some(mut task) = persistence.find_open_manual_task(source_system, source_id).await? {
        task.status = ManualTaskStatus::Acknowledged;
        persistence.upsert_manual_task(&task).await?;
    }
    Ok(())
}

pub async fn resolve(persistence: &dyn PersistenceAdapter, source_system: &str, source_id: &str) -> CoreResult<()> {
    if let Some(mut task) = persistence.find_open_manual_task(source_system, source_id).await? {
        task.status = ManualTaskStatus::Resolved;
        task.resolved_at = Some(Utc::now());
        persistence.upsert_manual_task(&task).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::InMemoryPersistence;

    #[tokio::test]
    async fn repeated_trigger_collapses_to_one_open_record() {
        let persistence = InMemoryPersistence::new();
        let first = raise(&persistence, "deadlock", Priority::default(), "orchestrator", "task-1", "stuck").await.unwrap();
        let second = raise(&persistence, "deadlock", Priority::default(), "orchestrator", "task-1", "stuck again").await.unwrap();

        assert_eq!(first.id, second.id);
        assert!(second.last_seen_at >= first.last_seen_at);
    }

    #[tokio::test]
    async fn resolved_task_does_not_collapse_a_new_trigger() {
        let persistence = InMemoryPersistence::new();
        let first = raise(&persistence, "deadlock", Priority::default(), "orchestrator", "task-1", "stuck").await.unwrap();
        resolve(&persistence, "orchestrator", "task-1").await.unwrap();

        let second = raise(&persistence, "deadlock", Priority::default(), "orchestrator", "task-1", "stuck again").await.unwrap();
        assert_ne!(first.id, second.id);
    }
}
