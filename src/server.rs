use axum::{
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;

use crate::fault::RouteFamily;
use crate::handlers;
use crate::middleware::timing;
use crate::AppState;

/// Builds the full Axum `Router` with all routes and middleware.
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        // ── Health ──────────────────────────────────────────────
        .route("/health", get(handlers::health::health_check))
        // ── Baseline management ─────────────────────────────────
        .route("/api/baseline", get(handlers::baseline::get_baseline))
        .route(
            "/api/baseline/establish",
            post(handlers::baseline::establish_baseline),
        )
        .route("/api/baseline/set", post(handlers::baseline::set_baseline))
        .route(
            "/api/baseline/reset",
            post(handlers::baseline::reset_baseline),
        )
        // ── Feature flags ───────────────────────────────────────
        .route(
            "/api/featureflag/performance-mode",
            get(handlers::featureflag::performance_mode)
                .post(handlers::featureflag::switch_performance_mode),
        )
        .route(
            "/api/featureflag/metrics",
            get(handlers::featureflag::process_metrics),
        );

    // ── Product families (normal, slow, CPU-heavy) ──────────────
    let api = RouteFamily::ALL.into_iter().fold(api, |router, family| {
        router.nest(family.prefix(), handlers::products::routes(family))
    });

    with_middleware(api.with_state(state.clone()), state)
}

/// Global middleware (applied bottom-up). The panic catcher sits inside
/// the timing layer, so a panicking handler comes back to the interceptor
/// as an ordinary 500 and is timed and stamped like any other response.
fn with_middleware(router: Router, state: Arc<AppState>) -> Router {
    router
        .layer(CatchPanicLayer::new())
        .layer(axum_mw::from_fn_with_state(state, timing::timing_middleware))
        .layer(CorsLayer::permissive())
}
