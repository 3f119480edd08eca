use std::time::Duration;

use clap::{Args, Parser, ValueEnum};
use serde::{Deserialize, Serialize};

// ─── Command line / environment ──────────────────────────────────

/// Runtime configuration. Every flag can also be set through a
/// `TRIAGE_*` environment variable.
#[derive(Debug, Clone, Parser)]
#[command(name = "perf-triage-demo")]
#[command(about = "Product catalog API with switchable degraded behaviour", long_about = None)]
#[command(version)]
pub struct Config {
    /// Listen address
    #[arg(long, env = "TRIAGE_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: String,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "TRIAGE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "TRIAGE_LOG_JSON")]
    pub log_json: bool,

    #[command(flatten)]
    pub thresholds: Thresholds,

    #[command(flatten)]
    pub faults: FaultConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".into(),
            log_level: "info".into(),
            log_json: false,
            thresholds: Thresholds::default(),
            faults: FaultConfig::default(),
        }
    }
}

// ─── Thresholds ──────────────────────────────────────────────────

/// Limits used by the performance monitor, health check and emitter.
#[derive(Debug, Clone, Args)]
pub struct Thresholds {
    /// Rolling window capacity (samples)
    #[arg(long, env = "TRIAGE_WINDOW_CAPACITY", default_value_t = 100)]
    pub window_capacity: usize,

    /// Samples collected before an automatic baseline is attempted
    #[arg(long, env = "TRIAGE_BASELINE_WINDOW", default_value_t = 100)]
    pub baseline_window: usize,

    /// An automatic baseline is only accepted below this average (ms)
    #[arg(long, env = "TRIAGE_AUTO_BASELINE_CEILING_MS", default_value_t = 500.0)]
    pub auto_baseline_ceiling_ms: f64,

    /// Rolling average above which the service is unhealthy (ms)
    #[arg(long, env = "TRIAGE_UNHEALTHY_AVG_MS", default_value_t = 1000.0)]
    pub unhealthy_avg_ms: f64,

    /// Rolling p95 above which the service is degraded (ms)
    #[arg(long, env = "TRIAGE_DEGRADED_P95_MS", default_value_t = 2000.0)]
    pub degraded_p95_ms: f64,

    /// Requests slower than this are logged at warn level (ms)
    #[arg(long, env = "TRIAGE_SLOW_REQUEST_MS", default_value_t = 500.0)]
    pub slow_request_ms: f64,

    /// Baseline deviation that raises an alert (percent)
    #[arg(long, env = "TRIAGE_DEVIATION_ALERT_PCT", default_value_t = 50.0)]
    pub deviation_alert_pct: f64,

    /// Baseline deviation that calls for a rollback (percent)
    #[arg(long, env = "TRIAGE_ROLLBACK_DEVIATION_PCT", default_value_t = 100.0)]
    pub rollback_deviation_pct: f64,

    /// Samples required before a baseline can be established on demand
    #[arg(long, env = "TRIAGE_MIN_ESTABLISH_SAMPLES", default_value_t = 10)]
    pub min_establish_samples: usize,

    /// Minimum seconds between two telemetry pushes
    #[arg(long, env = "TRIAGE_EMIT_INTERVAL_SECS", default_value_t = 30)]
    pub emit_interval_secs: u64,

    /// Pending telemetry batches kept before new ones are dropped
    #[arg(long, env = "TRIAGE_TELEMETRY_QUEUE", default_value_t = 64)]
    pub telemetry_queue: usize,

    /// Resident memory above which the memory check degrades (MiB)
    #[arg(long, env = "TRIAGE_MEMORY_THRESHOLD_MB", default_value_t = 1024)]
    pub memory_threshold_mb: u64,
}

impl Thresholds {
    pub fn emit_interval(&self) -> Duration {
        Duration::from_secs(self.emit_interval_secs)
    }

    pub fn memory_threshold_bytes(&self) -> u64 {
        self.memory_threshold_mb * 1024 * 1024
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            window_capacity: 100,
            baseline_window: 100,
            auto_baseline_ceiling_ms: 500.0,
            unhealthy_avg_ms: 1000.0,
            degraded_p95_ms: 2000.0,
            slow_request_ms: 500.0,
            deviation_alert_pct: 50.0,
            rollback_deviation_pct: 100.0,
            min_establish_samples: 10,
            emit_interval_secs: 30,
            telemetry_queue: 64,
            memory_threshold_mb: 1024,
        }
    }
}

// ─── Fault injection ─────────────────────────────────────────────

/// Whether the plain product endpoints behave normally or slowly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Args)]
pub struct FaultConfig {
    /// Delay added by the slow fault (ms)
    #[arg(long, env = "TRIAGE_SLOW_DELAY_MS", default_value_t = 2000)]
    pub slow_delay_ms: u64,

    /// Loop iterations burned by the CPU fault
    #[arg(long, env = "TRIAGE_CPU_ITERATIONS", default_value_t = 5_000_000)]
    pub cpu_iterations: u64,

    /// Mode the service starts in
    #[arg(long, env = "TRIAGE_PERFORMANCE_MODE", value_enum, default_value_t = PerformanceMode::Healthy)]
    pub performance_mode: PerformanceMode,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            slow_delay_ms: 2000,
            cpu_iterations: 5_000_000,
            performance_mode: PerformanceMode::Healthy,
        }
    }
}
