use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use super::snapshot::{round2, Snapshot};
use super::window::RingBuffer;
use crate::config::Thresholds;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonitorError {
    #[error("response time must be a finite, non-negative number of milliseconds (got {0})")]
    InvalidSample(f64),

    #[error("baseline must be greater than 0 (got {0})")]
    InvalidBaseline(f64),

    #[error("need at least {required} samples to establish a baseline, have {available}")]
    InsufficientSamples { available: usize, required: usize },
}

/// Thread-safe response-time monitor.
///
/// The interceptor calls `record()`, the baseline and health endpoints call
/// `snapshot()`. Both windows and the baseline share one lock so an
/// automatic commit can never interleave with a reset.
pub struct PerformanceMonitor {
    inner: Mutex<Inner>,
    thresholds: Thresholds,
}

struct Inner {
    window: RingBuffer,
    /// Candidate samples for the automatic baseline. Only fed while no
    /// baseline is established.
    establishment: RingBuffer,
    baseline: Option<f64>,
}

impl PerformanceMonitor {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            inner: Mutex::new(Inner {
                window: RingBuffer::with_capacity(thresholds.window_capacity),
                establishment: RingBuffer::with_capacity(thresholds.baseline_window),
                baseline: None,
            }),
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Record one response time. Negative, NaN and infinite values are
    /// rejected without touching any state.
    pub fn record(&self, duration_ms: f64) -> Result<(), MonitorError> {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            return Err(MonitorError::InvalidSample(duration_ms));
        }

        let mut inner = self.inner.lock();
        inner.window.push(duration_ms);

        if inner.baseline.is_none() {
            inner.establishment.push(duration_ms);
            if inner.establishment.is_full() {
                inner.try_auto_establish(self.thresholds.auto_baseline_ceiling_ms);
            }
        }
        Ok(())
    }

    /// Overwrite the baseline unconditionally.
    pub fn set_baseline(&self, avg_ms: f64) -> Result<(), MonitorError> {
        if !avg_ms.is_finite() || avg_ms <= 0.0 {
            return Err(MonitorError::InvalidBaseline(avg_ms));
        }
        let mut inner = self.inner.lock();
        inner.baseline = Some(avg_ms);
        inner.establishment.clear();
        info!(baseline_ms = avg_ms, "baseline set");
        Ok(())
    }

    /// Forget the baseline and any half-collected automatic candidate.
    pub fn reset_baseline(&self) {
        let mut inner = self.inner.lock();
        inner.baseline = None;
        inner.establishment.clear();
        info!("baseline reset");
    }

    /// Adopt the current rolling average as the baseline. The sample count
    /// check and the write happen under the same lock.
    pub fn establish_from_window(&self) -> Result<f64, MonitorError> {
        let mut inner = self.inner.lock();
        let available = inner.window.len();
        let required = self.thresholds.min_establish_samples;
        if available < required {
            return Err(MonitorError::InsufficientSamples { available, required });
        }

        let avg = inner.window.mean().map(round2).unwrap_or_default();
        if avg <= 0.0 {
            return Err(MonitorError::InvalidBaseline(avg));
        }
        inner.baseline = Some(avg);
        inner.establishment.clear();
        info!(baseline_ms = avg, samples = available, "baseline established from rolling window");
        Ok(avg)
    }

    pub fn baseline(&self) -> Option<f64> {
        self.inner.lock().baseline
    }

    pub fn sample_count(&self) -> usize {
        self.inner.lock().window.len()
    }

    /// Copy the window under the lock, then sort and summarise outside it.
    pub fn snapshot(&self) -> Snapshot {
        let (samples, baseline) = {
            let inner = self.inner.lock();
            (inner.window.to_vec(), inner.baseline)
        };
        Snapshot::compute(samples, baseline, &self.thresholds)
    }
}

impl Inner {
    fn try_auto_establish(&mut self, ceiling_ms: f64) {
        let Some(avg) = self.establishment.mean() else {
            return;
        };
        let candidates = self.establishment.len();
        self.establishment.clear();

        if avg < ceiling_ms {
            self.baseline = Some(avg);
            info!(baseline_ms = round2(avg), candidates, "baseline auto-established");
        } else {
            debug!(
                candidate_avg_ms = round2(avg),
                ceiling_ms, "automatic baseline rejected, collecting again"
            );
        }
    }
}
