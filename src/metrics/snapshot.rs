use serde::Serialize;

use crate::config::Thresholds;

/// Coarse verdict derived from the rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    /// No samples recorded yet.
    Unknown,
    Healthy,
    Degraded,
    Unhealthy,
}

impl Status {
    /// The average check wins over the p95 check: a slow average makes the
    /// service unhealthy no matter how the tail looks.
    pub fn classify(avg: f64, p95: f64, thresholds: &Thresholds) -> Self {
        if avg > thresholds.unhealthy_avg_ms {
            Self::Unhealthy
        } else if p95 > thresholds.degraded_p95_ms {
            Self::Degraded
        } else {
            Self::Healthy
        }
    }
}

/// Point-in-time summary of the rolling window. Computed on demand and
/// never stored.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub sample_count: usize,
    pub avg: f64,
    pub p95: f64,
    pub max: f64,
    pub min: f64,
    pub status: Status,
    pub baseline_avg: Option<f64>,
    pub baseline_established: bool,
    /// Signed distance of `avg` from the baseline, in percent. `None` when
    /// there is no baseline or no data, which is not the same as `0.0`.
    pub deviation_percent: Option<f64>,
}

impl Snapshot {
    /// Summarise `samples` (any order) against an optional baseline.
    pub fn compute(mut samples: Vec<f64>, baseline: Option<f64>, thresholds: &Thresholds) -> Self {
        if samples.is_empty() {
            return Self::empty(baseline);
        }

        samples.sort_by(f64::total_cmp);
        let n = samples.len();
        let avg = samples.iter().sum::<f64>() / n as f64;
        let p95 = samples[percentile_index(n, 0.95)];
        let min = samples[0];
        let max = samples[n - 1];

        let deviation_percent = baseline
            .filter(|b| *b > 0.0)
            .map(|b| round2((avg - b) / b * 100.0));

        Self {
            sample_count: n,
            avg: round2(avg),
            p95: round2(p95),
            max: round2(max),
            min: round2(min),
            status: Status::classify(avg, p95, thresholds),
            baseline_avg: baseline.map(round2),
            baseline_established: baseline.is_some(),
            deviation_percent,
        }
    }

    /// Placeholder used before any samples are recorded.
    pub fn empty(baseline: Option<f64>) -> Self {
        Self {
            sample_count: 0,
            avg: 0.0,
            p95: 0.0,
            max: 0.0,
            min: 0.0,
            status: Status::Unknown,
            baseline_avg: baseline.map(round2),
            baseline_established: baseline.is_some(),
            deviation_percent: None,
        }
    }

    pub fn has_data(&self) -> bool {
        self.sample_count > 0
    }
}

/// Nearest-rank index into a sorted slice of length `n` (n > 0).
fn percentile_index(n: usize, quantile: f64) -> usize {
    ((n as f64 * quantile).floor() as usize).min(n - 1)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
