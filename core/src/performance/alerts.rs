//! Alert construction and anomaly-detection thresholds (spec §4.4,
//! "Anomaly detection" / "Alert lifecycle").
//!
//! Grounded on `app/agents/monitoring.py`'s `_check_agent_anomalies`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use agentaskit_shared::models::{Alert, AlertSeverity};

pub const HIGH_LATENCY_THRESHOLD_MS: u64 = 10_000;
pub const FAILURE_RATE_THRESHOLD: f64 = 0.5;
pub const MIN_SAMPLE_SIZE: usize = 10;
pub const FAILURE_WINDOW_HOURS: i64 = 24;
pub const ALERT_RETENTION_DAYS: i64 = 7;

pub fn new_alert(
    title: impl Into<String>,
    message: impl Into<String>,
    severity: AlertSeverity,
    source: impl Into<String>,
    source_id: Option<String>,
    metadata: HashMap<String, serde_json::Value>,
    now: DateTime<Utc>,
) -> Alert {
    Alert {
        id: Uuid::new_v4().to_string(),
        title: title.into(),
        message: message.into(),
        severity,
        source: source.into(),
        source_id,
        metadata,
        created_at: now,
        acknowledged: false,
        acknowledged_at: None,
        resolved: false,
        resolved_at: None,
    }
}

pub fn high_latency_alert(agent_id: &str, execution_time_ms: u64, now: DateTime<Utc>) -> Alert {
    let mut metadata = HashMap::new();
    metadata.insert(
        "execution_time_ms".to_string(),
        serde_json::json!(execution_time_ms),
    );
    new_alert(
        "High latency detected",
        format!("agent {agent_id} execution took {execution_time_ms}ms"),
        AlertSeverity::Warning,
        "high_latency",
        Some(agent_id.to_string()),
        metadata,
        now,
    )
}

pub fn high_failure_rate_alert(agent_id: &str, failure_rate: f64, now: DateTime<Utc>) -> Alert {
    let mut metadata = HashMap::new();
    metadata.insert("failure_rate".to_string(), serde_json::json!(failure_rate));
    new_alert(
        "High failure rate detected",
        format!("agent {agent_id} failure rate is {:.2}", failure_rate),
        AlertSeverity::Error,
        "high_failure_rate",
        Some(agent_id.to_string()),
        metadata,
        now,
    )
}

/// Failure rate over the executions considered "recent": the last
/// `MIN_SAMPLE_SIZE` executions, or everything in the last
/// `FAILURE_WINDOW_HOURS`, whichever window is larger.
pub fn recent_failure_rate(history: &[(bool, DateTime<Utc>)], now: DateTime<Utc>) -> Option<f64> {
    if history.is_empty() {
        return None;
    }
    let window_start = now - chrono::Duration::hours(FAILURE_WINDOW_HOURS);
    let within_window: Vec<_> = history.iter().filter(|(_, ts)| *ts >= window_start).collect();

    let considered: Vec<_> = if within_window.len() >= MIN_SAMPLE_SIZE {
        within_window
    } else {
        history.iter().rev().take(MIN_SAMPLE_SIZE).collect()
    };

    if considered.len() < MIN_SAMPLE_SIZE {
        return None;
    }

    let failures = considered.iter().filter(|(success, _)| !success).count();
    Some(failures as f64 / considered.len() as f64)
}

pub fn should_gc(alert: &Alert, now: DateTime<Utc>) -> bool {
    match alert.resolved_at {
        Some(resolved_at) => (now - resolved_at).num_days() >= ALERT_RETENTION_DAYS,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_rate_requires_minimum_sample() {
        let now = Utc::now();
        let history: Vec<_> = (0..5).map(|_| (false, now)).collect();
        assert_eq!(recent_failure_rate(&history, now), None);
    }

    // spec §4.4 states the rolling estimator needs "last >= 10 executions
    // or last 24h, whichever is more recent"; Scenario D's narrative (five
    // failures silent, sixth raises the alert) is a smaller number than
    // that general rule supports. MIN_SAMPLE_SIZE (the normative, general
    // contract) wins; see DESIGN.md for the recorded decision, mirroring
    // the scaling-formula-vs-Scenario-E inconsistency.
    #[test]
    fn failure_rate_over_threshold_once_minimum_sample_reached() {
        let now = Utc::now();
        let mut history: Vec<_> = (0..(MIN_SAMPLE_SIZE - 1)).map(|_| (false, now)).collect();
        assert_eq!(recent_failure_rate(&history, now), None);

        history.push((false, now));
        let rate = recent_failure_rate(&history, now).unwrap();
        assert!(rate >= FAILURE_RATE_THRESHOLD);
    }

    #[test]
    fn gc_only_after_retention_window() {
        let now = Utc::now();
        let mut alert = new_alert(
            "t",
            "m",
            AlertSeverity::Info,
            "src",
            None,
            HashMap::new(),
            now,
        );
        alert.resolved_at = Some(now - chrono::Duration::days(8));
        assert!(should_gc(&alert, now));
        alert.resolved_at = Some(now - chrono::Duration::days(1));
        assert!(!should_gc(&alert, now));
    }
}
