//! Leader election: lease/term/history per role (spec §4.3, "Leader
//! election").
//!
//! Grounded on `app/celery_tasks/system_tasks.py`'s
//! `check_leader_election`. The compare-and-set itself lives in the
//! persistence adapter (`compare_and_set_leader`) to keep the claim
//! atomic against the backing store; this module owns the election-check
//! cadence and history bookkeeping.

use std::sync::Arc;

use agentaskit_shared::errors::CoreResult;
use agentaskit_shared::models::LeaderRecord;
use chrono::Utc;
use tracing::info;

use crate::persistence::PersistenceAdapter;

/// Attempts to claim `role` on behalf of `node_id`. Returns the winning
/// record (which may belong to another node if the claim failed).
pub async fn try_claim(
    persistence: &dyn PersistenceAdapter,
    role: &str,
    node_id: &str,
) -> CoreResult<LeaderRecord> {
    let now = Utc::now();
    let current = persistence.get_leader_record(role).await?;

    let (next_term, reason) = match &current {
        None => (1, "initial_claim"),
        Some(existing) if existing.is_expired(now) => (existing.term + 1, "lease_expired"),
        Some(existing) if existing.node_id == node_id => (existing.term, "renewal"),
        Some(existing) => return Ok(existing.clone()),
    };

    let candidate = LeaderRecord {
        role: role.to_string(),
        node_id: node_id.to_string(),
        term: next_term,
        lease_expires_at: now + chrono::Duration::seconds(LeaderRecord::LEASE_SECS),
    };

    let claimed = persistence.compare_and_set_leader(&candidate, now).await?;
    if !claimed {
        return Ok(persistence
            .get_leader_record(role)
            .await?
            .unwrap_or(candidate));
    }

    if current.as_ref().map(|c| &c.node_id) != Some(&candidate.node_id) || reason == "initial_claim" {
        persistence
            .append_leader_history(&agentaskit_shared::models::LeaderTransition {
                role: role.to_string(),
                old_holder: current.map(|c| c.node_id),
                new_holder: candidate.node_id.clone(),
                term: candidate.term,
                reason: reason.to_string(),
                at: now,
            })
            .await?;
        info!(role, node_id = %candidate.node_id, term = candidate.term, reason, "leader claimed");
    }

    Ok(candidate)
}

pub fn spawn_election_loop(
    persistence: Arc<dyn PersistenceAdapter>,
    roles: Vec<String>,
    node_id: String,
    interval: std::time::Duration,
    running: Arc<tokio::sync::RwLock<bool>>,
) {
    tokio::spawn(async move {
        while *running.read().await {
            tokio::time::sleep(interval).await;
            for role in &roles {
                if let Err(err) = try_claim(persistence.as_ref(), role, &node_id).await {
                    tracing::warn!(error = %err, role, "leader election check failed");
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::InMemoryPersistence;

    #[tokio::test]
    async fn first_claim_starts_at_term_one() {
        let persistence = InMemoryPersistence::new();
        let record = try_claim(&persistence, "beat_scheduler", "node-a").await.unwrap();
        assert_eq!(record.term, 1);
        assert_eq!(record.node_id, "node-a");
    }

    #[tokio::test]
    async fn expired_lease_allows_another_node_to_claim_next_term() {
        let persistence = InMemoryPersistence::new();
        let first = try_claim(&persistence, "beat_scheduler", "node-a").await.unwrap();
        let mut expired = first.clone();
        expired.lease_expires_at = Utc::now() - chrono::Duration::seconds(1);
        persistence.compare_and_set_leader(&expired, Utc::now()).await.unwrap();

        let second = try_claim(&persistence, "beat_scheduler", "node-b").await.unwrap();
        assert_eq!(second.node_id, "node-b");
        assert_eq!(second.term, first.term + 1);
    }

    #[tokio::test]
    async fn unexpired_lease_rejects_a_different_candidate() {
        let persistence = InMemoryPersistence::new();
        let first = try_claim(&persistence, "beat_scheduler", "node-a").await.unwrap();
        let attempt = try_claim(&persistence, "beat_scheduler", "node-b").await.unwrap();
        assert_eq!(attempt.node_id, first.node_id);
        assert_eq!(attempt.term, first.term);
    }
}
