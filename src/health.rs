use std::collections::BTreeMap;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use sysinfo::{Pid, System};

use crate::config::Thresholds;
use crate::metrics::{PerformanceMonitor, Snapshot, Status};

/// Ordered so that `max()` picks the worst verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Verdict plus the numbers that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub status: HealthStatus,
    pub description: String,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEntry {
    pub status: HealthStatus,
    pub description: String,
    pub duration_ms: f64,
    pub data: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub total_duration_ms: f64,
    pub checks: BTreeMap<&'static str, HealthEntry>,
}

// ─── Performance check ───────────────────────────────────────────

/// Map a snapshot to a health verdict. An empty window counts as healthy.
pub fn classify(snapshot: &Snapshot, thresholds: &Thresholds) -> CheckResult {
    let data = json!({
        "avgMs": snapshot.avg,
        "p95Ms": snapshot.p95,
        "maxMs": snapshot.max,
        "sampleCount": snapshot.sample_count,
    });

    let (status, description) = match snapshot.status {
        Status::Unknown => (
            HealthStatus::Healthy,
            "No performance data collected yet".to_string(),
        ),
        Status::Unhealthy => (
            HealthStatus::Unhealthy,
            format!(
                "Average response time {:.2}ms exceeds {}ms",
                snapshot.avg, thresholds.unhealthy_avg_ms
            ),
        ),
        Status::Degraded => (
            HealthStatus::Degraded,
            format!(
                "P95 response time {:.2}ms exceeds {}ms",
                snapshot.p95, thresholds.degraded_p95_ms
            ),
        ),
        Status::Healthy => (
            HealthStatus::Healthy,
            format!(
                "Response times normal (avg {:.2}ms, p95 {:.2}ms)",
                snapshot.avg, snapshot.p95
            ),
        ),
    };

    CheckResult { status, description, data }
}

// ─── Memory check ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub resident_bytes: u64,
    pub virtual_bytes: u64,
}

/// Reads this process's memory counters.
pub struct MemoryProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl MemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    pub fn sample(&self) -> Option<MemoryUsage> {
        let pid = self.pid?;
        let mut system = self.system.lock();
        if !system.refresh_process(pid) {
            return None;
        }
        system.process(pid).map(|p| MemoryUsage {
            resident_bytes: p.memory(),
            virtual_bytes: p.virtual_memory(),
        })
    }
}

impl Default for MemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

pub fn memory_check(usage: Option<MemoryUsage>, threshold_bytes: u64) -> CheckResult {
    let Some(usage) = usage else {
        return CheckResult {
            status: HealthStatus::Degraded,
            description: "Process memory could not be read".to_string(),
            data: json!({ "thresholdBytes": threshold_bytes }),
        };
    };

    let data = json!({
        "residentBytes": usage.resident_bytes,
        "virtualBytes": usage.virtual_bytes,
        "thresholdBytes": threshold_bytes,
    });
    let mib = usage.resident_bytes as f64 / (1024.0 * 1024.0);

    if usage.resident_bytes > threshold_bytes {
        CheckResult {
            status: HealthStatus::Degraded,
            description: format!("Resident memory {mib:.1}MiB above threshold"),
            data,
        }
    } else {
        CheckResult {
            status: HealthStatus::Healthy,
            description: format!("Resident memory {mib:.1}MiB"),
            data,
        }
    }
}

// ─── Aggregation ─────────────────────────────────────────────────

/// Run every check, timing each one, and fold them into one report.
pub fn evaluate(monitor: &PerformanceMonitor, probe: &MemoryProbe) -> HealthReport {
    let started = Instant::now();
    let thresholds = monitor.thresholds();
    let mut checks = BTreeMap::new();

    checks.insert(
        "performance",
        timed(|| classify(&monitor.snapshot(), thresholds)),
    );
    checks.insert(
        "memory",
        timed(|| memory_check(probe.sample(), thresholds.memory_threshold_bytes())),
    );

    let status = checks
        .values()
        .map(|c| c.status)
        .max()
        .unwrap_or(HealthStatus::Healthy);

    HealthReport {
        status,
        total_duration_ms: elapsed_ms(started),
        checks,
    }
}

fn timed(check: impl FnOnce() -> CheckResult) -> HealthEntry {
    let started = Instant::now();
    let result = check();
    HealthEntry {
        status: result.status,
        description: result.description,
        duration_ms: elapsed_ms(started),
        data: result.data,
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    crate::metrics::snapshot::round2(started.elapsed().as_secs_f64() * 1000.0)
}
