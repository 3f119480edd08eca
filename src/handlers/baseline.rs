use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Thresholds;
use crate::metrics::{Snapshot, Status};
use crate::AppState;

use super::AppError;

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineInfo {
    pub baseline_ms: Option<f64>,
    pub established: bool,
}

/// Flags an operator (or agent) checks before deciding to roll back.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Alerts {
    pub significant_deviation: bool,
    pub is_unhealthy: bool,
    pub is_degraded: bool,
    pub requires_rollback: bool,
}

impl Alerts {
    pub fn from_snapshot(snapshot: &Snapshot, thresholds: &Thresholds) -> Self {
        let deviation = snapshot.deviation_percent;
        Self {
            significant_deviation: deviation.map_or(false, |d| d.abs() > thresholds.deviation_alert_pct),
            is_unhealthy: snapshot.status == Status::Unhealthy,
            is_degraded: snapshot.status == Status::Degraded,
            requires_rollback: deviation.map_or(false, |d| d > thresholds.rollback_deviation_pct),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BaselineReport {
    pub current: Snapshot,
    pub baseline: BaselineInfo,
    pub alerts: Alerts,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBaselineRequest {
    pub baseline_ms: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineUpdated {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline_ms: Option<f64>,
}

// ─── GET /api/baseline ───────────────────────────────────────────

pub async fn get_baseline(State(state): State<Arc<AppState>>) -> Json<BaselineReport> {
    let snapshot = state.monitor.snapshot();
    let alerts = Alerts::from_snapshot(&snapshot, state.monitor.thresholds());
    Json(BaselineReport {
        baseline: BaselineInfo {
            baseline_ms: snapshot.baseline_avg,
            established: snapshot.baseline_established,
        },
        alerts,
        current: snapshot,
    })
}

// ─── POST /api/baseline/establish ────────────────────────────────

pub async fn establish_baseline(
    State(state): State<Arc<AppState>>,
) -> Result<Json<BaselineUpdated>, AppError> {
    let baseline = state.monitor.establish_from_window()?;
    Ok(Json(BaselineUpdated {
        message: "Baseline established from current rolling window".into(),
        baseline_ms: Some(baseline),
    }))
}

// ─── POST /api/baseline/set ──────────────────────────────────────

pub async fn set_baseline(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetBaselineRequest>,
) -> Result<Json<BaselineUpdated>, AppError> {
    state.monitor.set_baseline(req.baseline_ms)?;
    Ok(Json(BaselineUpdated {
        message: "Baseline set".into(),
        baseline_ms: Some(req.baseline_ms),
    }))
}

// ─── POST /api/baseline/reset ────────────────────────────────────

pub async fn reset_baseline(State(state): State<Arc<AppState>>) -> Json<BaselineUpdated> {
    state.monitor.reset_baseline();
    Json(BaselineUpdated {
        message: "Baseline reset".into(),
        baseline_ms: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{app, send};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn report_without_data_has_no_alerts() {
        let (_state, app, _rx) = app();
        let (status, body) = send(&app, "GET", "/api/baseline", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["current"]["sampleCount"], 0);
        assert_eq!(body["current"]["status"], "Unknown");
        assert_eq!(body["baseline"]["established"], false);
        assert!(body["baseline"]["baselineMs"].is_null());
        assert_eq!(body["alerts"]["significantDeviation"], false);
        assert_eq!(body["alerts"]["requiresRollback"], false);
    }

    #[tokio::test]
    async fn establish_needs_ten_samples() {
        let (state, app, _rx) = app();
        for _ in 0..5 {
            state.monitor.record(40.0).unwrap();
        }
        let (status, body) = send(&app, "POST", "/api/baseline/establish", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert!(state.monitor.baseline().is_none());

        // The failed request above was itself recorded: 6 samples now.
        for _ in 0..4 {
            state.monitor.record(40.0).unwrap();
        }
        let (status, body) = send(&app, "POST", "/api/baseline/establish", None).await;
        assert_eq!(status, StatusCode::OK);
        let baseline = body["baselineMs"].as_f64().unwrap();
        assert!(baseline > 0.0);
        assert_eq!(state.monitor.baseline(), Some(baseline));
    }

    #[tokio::test]
    async fn set_validates_and_raises_alerts() {
        let (state, app, _rx) = app();

        let (status, _) = send(&app, "POST", "/api/baseline/set", Some(json!({ "baselineMs": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "POST", "/api/baseline/set", Some(json!({ "baselineMs": -3.5 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.monitor.baseline().is_none());

        let (status, body) = send(&app, "POST", "/api/baseline/set", Some(json!({ "baselineMs": 0.5 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["baselineMs"], 0.5);

        // 50ms samples against a 0.5ms baseline
        for _ in 0..10 {
            state.monitor.record(50.0).unwrap();
        }
        let (_, body) = send(&app, "GET", "/api/baseline", None).await;
        assert_eq!(body["baseline"]["established"], true);
        assert_eq!(body["alerts"]["significantDeviation"], true);
        assert_eq!(body["alerts"]["requiresRollback"], true);
        assert_eq!(body["alerts"]["isUnhealthy"], false);
    }

    #[tokio::test]
    async fn reset_clears_deviation() {
        let (state, app, _rx) = app();
        state.monitor.set_baseline(10.0).unwrap();
        state.monitor.record(30.0).unwrap();

        let (status, body) = send(&app, "POST", "/api/baseline/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.get("baselineMs").is_none());

        let snapshot = state.monitor.snapshot();
        assert!(!snapshot.baseline_established);
        assert_eq!(snapshot.deviation_percent, None);
    }

    #[test]
    fn alert_thresholds() {
        let t = Thresholds::default();
        let snapshot = Snapshot::compute(vec![175.0; 10], Some(100.0), &t);
        let alerts = Alerts::from_snapshot(&snapshot, &t);
        assert!(alerts.significant_deviation);
        assert!(!alerts.requires_rollback);

        let snapshot = Snapshot::compute(vec![40.0; 10], Some(100.0), &t);
        let alerts = Alerts::from_snapshot(&snapshot, &t);
        assert!(alerts.significant_deviation);
        assert!(!alerts.requires_rollback);

        let snapshot = Snapshot::compute(vec![201.0; 10], Some(100.0), &t);
        assert!(Alerts::from_snapshot(&snapshot, &t).requires_rollback);
    }
}
