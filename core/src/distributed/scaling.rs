//! Autoscaling proposal thresholds (spec §4.3, "Autoscaling policy").
//!
//! Grounded on `app/services/distributed_tasks.py`'s `scale_workers` and
//! `app/celery_tasks/system_tasks.py`'s `await_make_scaling_decisions`.
//! The core only proposes; an external actuator applies.

use agentaskit_shared::models::{QueueStats, ScalingDecision, ScalingKind};

const MAX_WORKERS: u32 = 10;
const MIN_WORKERS: u32 = 1;

pub fn evaluate(stats: &QueueStats) -> Option<ScalingDecision> {
    let worker_count = stats.worker_count;

    if stats.queued_count as u64 > worker_count as u64 * 5 && stats.utilization > 0.8 {
        return Some(ScalingDecision {
            kind: ScalingKind::ScaleUp,
            queue_name: stats.queue_name.clone(),
            current_worker_count: worker_count,
            target_worker_count: (worker_count + 1).min(MAX_WORKERS),
            reason: format!(
                "High queue depth: {} exceeds {}x worker count at {:.0}% utilization",
                stats.queued_count,
                5,
                stats.utilization * 100.0
            ),
            metrics_snapshot: serde_json::to_value(stats).unwrap_or_default(),
            applied: false,
        });
    }

    if stats.queued_count < 3 && worker_count > MIN_WORKERS && stats.utilization < 0.3 {
        return Some(ScalingDecision {
            kind: ScalingKind::ScaleDown,
            queue_name: stats.queue_name.clone(),
            current_worker_count: worker_count,
            target_worker_count: (worker_count.saturating_sub(1)).max(MIN_WORKERS),
            reason: format!(
                "depth {} with {:.0}% utilization across {} workers",
                stats.queued_count,
                stats.utilization * 100.0,
                worker_count
            ),
            metrics_snapshot: serde_json::to_value(stats).unwrap_or_default(),
            applied: false,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stats(worker_count: u32, queued: u32, active: u32) -> QueueStats {
        QueueStats::compute("default", worker_count, queued, active, Utc::now())
    }

    #[test]
    fn high_depth_and_utilization_triggers_scale_up() {
        let decision = evaluate(&stats(2, 11, 2)).unwrap();
        assert_eq!(decision.kind, ScalingKind::ScaleUp);
        assert_eq!(decision.target_worker_count, 3);
    }

    #[test]
    fn low_depth_and_utilization_triggers_scale_down() {
        let decision = evaluate(&stats(4, 1, 0)).unwrap();
        assert_eq!(decision.kind, ScalingKind::ScaleDown);
        assert_eq!(decision.target_worker_count, 3);
    }

    #[test]
    fn single_worker_never_scales_below_one() {
        assert!(evaluate(&stats(1, 0, 0)).is_none());
    }

    #[test]
    fn scale_up_is_capped_at_ten() {
        let decision = evaluate(&stats(10, 100, 10)).unwrap();
        assert_eq!(decision.target_worker_count, 10);
    }

    #[test]
    fn within_thresholds_proposes_nothing() {
        assert!(evaluate(&stats(3, 5, 1)).is_none());
    }
}
