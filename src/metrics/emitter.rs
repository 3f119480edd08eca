use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::monitor::PerformanceMonitor;
use super::snapshot::Snapshot;

// ─── Metric names ────────────────────────────────────────────────

pub const METRIC_ROLLING_AVG: &str = "response_time.rolling_avg_ms";
pub const METRIC_ROLLING_P95: &str = "response_time.rolling_p95_ms";
pub const METRIC_ROLLING_MAX: &str = "response_time.rolling_max_ms";
pub const METRIC_SAMPLE_COUNT: &str = "response_time.sample_count";
pub const METRIC_DEVIATION: &str = "response_time.baseline_deviation_pct";
pub const EVENT_SNAPSHOT: &str = "PerformanceSnapshot";

// ─── Public types ────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EmissionError {
    #[error("telemetry queue is full")]
    QueueFull,

    #[error("telemetry publisher has stopped")]
    QueueClosed,

    #[error("telemetry sink unavailable: {0}")]
    SinkUnavailable(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricPoint {
    pub name: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub name: &'static str,
    pub snapshot: Snapshot,
}

/// Everything pushed to the sink for one emission window.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsBatch {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub metrics: Vec<MetricPoint>,
    /// Only present once a baseline is established.
    pub event: Option<TelemetryEvent>,
}

impl MetricsBatch {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut metrics = vec![
            MetricPoint { name: METRIC_ROLLING_AVG, value: snapshot.avg },
            MetricPoint { name: METRIC_ROLLING_P95, value: snapshot.p95 },
            MetricPoint { name: METRIC_ROLLING_MAX, value: snapshot.max },
            MetricPoint { name: METRIC_SAMPLE_COUNT, value: snapshot.sample_count as f64 },
        ];

        let mut event = None;
        if snapshot.baseline_established {
            if let Some(deviation) = snapshot.deviation_percent {
                metrics.push(MetricPoint { name: METRIC_DEVIATION, value: deviation });
            }
            event = Some(TelemetryEvent {
                name: EVENT_SNAPSHOT,
                snapshot: snapshot.clone(),
            });
        }

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            metrics,
            event,
        }
    }
}

/// Destination for aggregated metrics. Implementations run on the
/// publisher task, never on the request path.
pub trait TelemetrySink: Send + Sync + 'static {
    fn publish(&self, batch: &MetricsBatch) -> Result<(), EmissionError>;
}

/// Default sink: writes each metric and event as a `telemetry` log record.
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn publish(&self, batch: &MetricsBatch) -> Result<(), EmissionError> {
        for metric in &batch.metrics {
            info!(
                target: "telemetry",
                batch = %batch.id,
                metric = metric.name,
                value = metric.value,
                "metric"
            );
        }
        if let Some(event) = &batch.event {
            let payload = serde_json::to_string(&event.snapshot)
                .map_err(|e| EmissionError::SinkUnavailable(e.to_string()))?;
            info!(target: "telemetry", batch = %batch.id, event = event.name, %payload, "event");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// Still inside the interval since the last emission.
    Gated,
    /// Gate open but nothing recorded yet; the slot is not consumed.
    Empty,
    /// Batch handed to the publisher.
    Queued,
    /// Batch built but the publisher could not take it.
    Dropped,
}

// ─── Emission gate ───────────────────────────────────────────────

/// Time-gated push of rolling-window metrics.
///
/// `maybe_emit()` is called after every request. The interval check and
/// the timestamp update happen under one lock, so concurrent callers racing
/// the same window produce exactly one batch.
pub struct MetricsEmitter {
    monitor: Arc<PerformanceMonitor>,
    last_emit: Mutex<Option<Instant>>,
    interval: Duration,
    deviation_alert_pct: f64,
    queue: mpsc::Sender<MetricsBatch>,
}

impl MetricsEmitter {
    pub fn new(monitor: Arc<PerformanceMonitor>, queue: mpsc::Sender<MetricsBatch>) -> Self {
        let thresholds = monitor.thresholds();
        Self {
            interval: thresholds.emit_interval(),
            deviation_alert_pct: thresholds.deviation_alert_pct,
            last_emit: Mutex::new(None),
            monitor,
            queue,
        }
    }

    /// Never blocks on the sink and never fails the caller.
    pub fn maybe_emit(&self) -> EmitOutcome {
        let snapshot = {
            let mut last = self.last_emit.lock();
            let now = Instant::now();
            if let Some(prev) = *last {
                if now.duration_since(prev) < self.interval {
                    return EmitOutcome::Gated;
                }
            }
            let snapshot = self.monitor.snapshot();
            if !snapshot.has_data() {
                return EmitOutcome::Empty;
            }
            *last = Some(now);
            snapshot
        };

        if let Some(deviation) = snapshot.deviation_percent {
            if deviation.abs() > self.deviation_alert_pct {
                warn!(
                    deviation_pct = deviation,
                    avg_ms = snapshot.avg,
                    baseline_ms = ?snapshot.baseline_avg,
                    "response time deviates significantly from baseline"
                );
            }
        }

        match self.dispatch(MetricsBatch::from_snapshot(&snapshot)) {
            Ok(()) => EmitOutcome::Queued,
            Err(e) => {
                warn!(error = %e, "dropping telemetry batch");
                EmitOutcome::Dropped
            }
        }
    }

    fn dispatch(&self, batch: MetricsBatch) -> Result<(), EmissionError> {
        self.queue.try_send(batch).map_err(|e| match e {
            TrySendError::Full(_) => EmissionError::QueueFull,
            TrySendError::Closed(_) => EmissionError::QueueClosed,
        })
    }
}

/// Drain queued batches into `sink` until every sender is gone.
pub fn spawn_publisher(
    mut queue: mpsc::Receiver<MetricsBatch>,
    sink: Arc<dyn TelemetrySink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(batch) = queue.recv().await {
            match sink.publish(&batch) {
                Ok(()) => debug!(batch = %batch.id, metrics = batch.metrics.len(), "telemetry published"),
                Err(e) => warn!(batch = %batch.id, error = %e, "telemetry publish failed"),
            }
        }
        debug!("telemetry publisher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;

    fn emitter(capacity: usize) -> (Arc<PerformanceMonitor>, MetricsEmitter, mpsc::Receiver<MetricsBatch>) {
        let monitor = Arc::new(PerformanceMonitor::new(Thresholds::default()));
        let (tx, rx) = mpsc::channel(capacity);
        let emitter = MetricsEmitter::new(monitor.clone(), tx);
        (monitor, emitter, rx)
    }

    fn names(batch: &MetricsBatch) -> Vec<&'static str> {
        batch.metrics.iter().map(|m| m.name).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn gate_allows_one_emission_per_interval() {
        let (monitor, emitter, mut rx) = emitter(8);
        monitor.record(20.0).unwrap();

        assert_eq!(emitter.maybe_emit(), EmitOutcome::Queued);
        assert_eq!(emitter.maybe_emit(), EmitOutcome::Gated);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(emitter.maybe_emit(), EmitOutcome::Gated);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(emitter.maybe_emit(), EmitOutcome::Queued);

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_window_does_not_consume_the_slot() {
        let (monitor, emitter, _rx) = emitter(8);
        assert_eq!(emitter.maybe_emit(), EmitOutcome::Empty);

        monitor.record(15.0).unwrap();
        assert_eq!(emitter.maybe_emit(), EmitOutcome::Queued);
    }

    #[test]
    fn concurrent_callers_emit_once() {
        let (monitor, emitter, mut rx) = emitter(64);
        monitor.record(10.0).unwrap();
        let emitter = Arc::new(emitter);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let emitter = emitter.clone();
                std::thread::spawn(move || emitter.maybe_emit())
            })
            .collect();
        let queued = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == EmitOutcome::Queued)
            .count();

        assert_eq!(queued, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn batch_without_baseline_has_four_metrics() {
        let (monitor, emitter, mut rx) = emitter(8);
        for v in [10.0, 20.0, 30.0] {
            monitor.record(v).unwrap();
        }
        emitter.maybe_emit();

        let batch = rx.try_recv().unwrap();
        assert_eq!(
            names(&batch),
            vec![METRIC_ROLLING_AVG, METRIC_ROLLING_P95, METRIC_ROLLING_MAX, METRIC_SAMPLE_COUNT]
        );
        assert_eq!(batch.metrics[0].value, 20.0);
        assert_eq!(batch.metrics[3].value, 3.0);
        assert!(batch.event.is_none());
    }

    #[tokio::test]
    async fn batch_with_baseline_carries_deviation_and_event() {
        let (monitor, emitter, mut rx) = emitter(8);
        monitor.set_baseline(50.0).unwrap();
        monitor.record(100.0).unwrap();
        emitter.maybe_emit();

        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.metrics.len(), 5);
        assert_eq!(batch.metrics[4].name, METRIC_DEVIATION);
        assert_eq!(batch.metrics[4].value, 100.0);

        let event = batch.event.expect("snapshot event");
        assert_eq!(event.name, EVENT_SNAPSHOT);
        assert_eq!(event.snapshot.sample_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_or_closed_queue_is_swallowed() {
        let (monitor, emitter, rx) = emitter(1);
        monitor.record(10.0).unwrap();

        assert_eq!(emitter.maybe_emit(), EmitOutcome::Queued);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(emitter.maybe_emit(), EmitOutcome::Dropped);

        drop(rx);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(emitter.maybe_emit(), EmitOutcome::Dropped);
    }

    struct RecordingSink {
        fail_first: Mutex<bool>,
        published: Mutex<Vec<Uuid>>,
    }

    impl TelemetrySink for RecordingSink {
        fn publish(&self, batch: &MetricsBatch) -> Result<(), EmissionError> {
            let mut fail = self.fail_first.lock();
            if *fail {
                *fail = false;
                return Err(EmissionError::SinkUnavailable("connection refused".into()));
            }
            self.published.lock().push(batch.id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn publisher_survives_sink_failures() {
        let sink = Arc::new(RecordingSink {
            fail_first: Mutex::new(true),
            published: Mutex::new(Vec::new()),
        });
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_publisher(rx, sink.clone());

        let snapshot = Snapshot::empty(None);
        let first = MetricsBatch::from_snapshot(&snapshot);
        let second = MetricsBatch::from_snapshot(&snapshot);
        let second_id = second.id;
        tx.send(first).await.unwrap();
        tx.send(second).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(*sink.published.lock(), vec![second_id]);
    }

    #[test]
    fn log_sink_accepts_batches() {
        let mut snapshot = Snapshot::empty(Some(40.0));
        snapshot.sample_count = 1;
        let batch = MetricsBatch::from_snapshot(&snapshot);
        assert!(batch.event.is_some());
        assert!(LogSink.publish(&batch).is_ok());
    }
}
