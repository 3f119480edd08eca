use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::warn;

use crate::health::{self, HealthReport, HealthStatus};
use crate::AppState;

// ─── GET /health ─────────────────────────────────────────────────

/// Unhealthy maps to 503 so load balancers pull the instance; degraded
/// still serves traffic.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthReport>) {
    let report = health::evaluate(&state.monitor, &state.memory);

    let code = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    if report.status != HealthStatus::Healthy {
        warn!(status = ?report.status, "health check not healthy");
    }

    (code, Json(report))
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::{app, send};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn fresh_service_reports_performance_healthy() {
        let (_state, app, _rx) = app();
        let (status, body) = send(&app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["performance"]["status"], "Healthy");
        assert_eq!(body["checks"]["performance"]["data"]["sampleCount"], 0);
        assert!(body["checks"]["memory"]["description"].is_string());
        assert!(body["totalDurationMs"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn slow_average_returns_503() {
        let (state, app, _rx) = app();
        for _ in 0..20 {
            state.monitor.record(1800.0).unwrap();
        }
        let (status, body) = send(&app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "Unhealthy");
        assert_eq!(body["checks"]["performance"]["status"], "Unhealthy");
        assert_eq!(body["checks"]["performance"]["data"]["avgMs"], 1800.0);
    }
}
