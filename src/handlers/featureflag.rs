use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PerformanceMode;
use crate::fault::{Fault, RouteFamily};
use crate::health::MemoryUsage;
use crate::AppState;

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFault {
    pub prefix: &'static str,
    pub fault: Fault,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceModeStatus {
    pub mode: PerformanceMode,
    pub slow_delay_ms: u64,
    pub cpu_iterations: u64,
    pub routes: Vec<RouteFault>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchModeRequest {
    pub mode: PerformanceMode,
}

#[derive(Debug, Serialize)]
pub struct ModeSwitched {
    pub previous: PerformanceMode,
    pub mode: PerformanceMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessMetrics {
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: f64,
    pub memory: Option<MemoryUsage>,
    pub runtime_workers: usize,
    pub sample_count: usize,
    pub baseline_established: bool,
}

// ─── GET /api/featureflag/performance-mode ───────────────────────

pub async fn performance_mode(State(state): State<Arc<AppState>>) -> Json<PerformanceModeStatus> {
    let faults = &state.faults;
    Json(PerformanceModeStatus {
        mode: faults.mode(),
        slow_delay_ms: faults.slow_delay_ms(),
        cpu_iterations: faults.cpu_iterations(),
        routes: RouteFamily::ALL
            .into_iter()
            .map(|family| RouteFault {
                prefix: family.prefix(),
                fault: faults.fault_for(family),
            })
            .collect(),
    })
}

// ─── POST /api/featureflag/performance-mode ──────────────────────

pub async fn switch_performance_mode(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SwitchModeRequest>,
) -> Json<ModeSwitched> {
    let previous = state.faults.set_mode(req.mode);
    Json(ModeSwitched {
        previous,
        mode: req.mode,
    })
}

// ─── GET /api/featureflag/metrics ────────────────────────────────

pub async fn process_metrics(State(state): State<Arc<AppState>>) -> Json<ProcessMetrics> {
    Json(ProcessMetrics {
        timestamp: Utc::now(),
        uptime_secs: state.started_at.elapsed().as_secs_f64(),
        memory: state.memory.sample(),
        runtime_workers: tokio::runtime::Handle::current().metrics().num_workers(),
        sample_count: state.monitor.sample_count(),
        baseline_established: state.monitor.baseline().is_some(),
    })
}
