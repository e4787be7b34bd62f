//! Rolling aggregate computation over metric samples (spec §4.4, "Rolling
//! aggregates").

use agentaskit_shared::models::{MetricSample, MetricStats};

pub fn compute_stats(mut values: Vec<f64>) -> MetricStats {
    if values.is_empty() {
        return MetricStats {
            count: 0,
            mean: 0.0,
            median: 0.0,
            min: 0.0,
            max: 0.0,
            stddev: 0.0,
        };
    }

    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let count = values.len();
    let sum: f64 = values.iter().sum();
    let mean = sum / count as f64;
    let median = if count % 2 == 0 {
        (values[count / 2 - 1] + values[count / 2]) / 2.0
    } else {
        values[count / 2]
    };
    let min = values[0];
    let max = values[count - 1];
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

    MetricStats {
        count,
        mean,
        median,
        min,
        max,
        stddev: variance.sqrt(),
    }
}

pub fn group_by_kind(samples: &[MetricSample]) -> std::collections::HashMap<agentaskit_shared::models::MetricKind, Vec<f64>> {
    let mut grouped: std::collections::HashMap<_, Vec<f64>> = std::collections::HashMap::new();
    for sample in samples {
        grouped.entry(sample.kind).or_default().push(sample.value);
    }
    grouped
}
