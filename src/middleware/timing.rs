use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::AppState;

pub const RESPONSE_TIME_HEADER: &str = "X-Response-Time-Ms";

/// Records the elapsed time into the monitor when dropped, so the sample
/// lands on every exit path: normal return, handler panic (unwinding)
/// and a dropped future.
struct TimingGuard {
    state: Arc<AppState>,
    method: Method,
    path: String,
    start: Instant,
    /// Set once the handler returned normally.
    elapsed_ms: Option<f64>,
}

impl TimingGuard {
    fn stop(&mut self) -> f64 {
        let ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.elapsed_ms = Some(ms);
        ms
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let ms = self
            .elapsed_ms
            .unwrap_or_else(|| self.start.elapsed().as_secs_f64() * 1000.0);

        if let Err(e) = self.state.monitor.record(ms) {
            debug!(error = %e, path = %self.path, "response time rejected by monitor");
        }

        if ms > self.state.monitor.thresholds().slow_request_ms {
            warn!(method = %self.method, path = %self.path, elapsed_ms = ms, "slow request");
        }

        // Best effort; the emitter swallows its own failures.
        self.state.emitter.maybe_emit();
    }
}

/// Middleware applied to every route.
///
/// Times the downstream handler and feeds the performance monitor. Adds
/// two response headers:
///
///   X-Response-Time-Ms  handler wall time, two decimals
///   Server-Timing       same value in the standard Server-Timing format
pub async fn timing_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let mut guard = TimingGuard {
        state,
        method: req.method().clone(),
        path: req.uri().path().to_owned(),
        start: Instant::now(),
        elapsed_ms: None,
    };

    let mut response = next.run(req).await;
    let ms = guard.stop();

    // ── Inject response headers ─────────────────────────────────
    if let Ok(val) = HeaderValue::from_str(&format!("{ms:.2}")) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, val);
    }
    if let Ok(val) = HeaderValue::from_str(&format!("total;dur={ms:.3}")) {
        response.headers_mut().insert("Server-Timing", val);
    }

    debug!(
        method = %guard.method,
        path = %guard.path,
        status = response.status().as_u16(),
        elapsed_ms = ms,
        "request completed"
    );

    drop(guard);
    response
}
