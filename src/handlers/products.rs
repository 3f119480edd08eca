use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::catalog::{Product, ProductQuery};
use crate::fault::{Fault, RouteFamily};
use crate::AppState;

use super::AppError;

/// Cache directive attached to healthy list responses. No server-side
/// cache sits behind it.
const CACHE_CONTROL: &str = "public, max-age=60";

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub count: usize,
    pub fault: Fault,
    pub products: Vec<Product>,
}

/// Routes for one product family, mounted under `family.prefix()`.
pub fn routes(family: RouteFamily) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/",
            get(move |State(state): State<Arc<AppState>>, Query(query): Query<ProductQuery>| {
                list_products(family, state, query)
            }),
        )
        .route(
            "/search",
            post(move |State(state): State<Arc<AppState>>, Json(query): Json<ProductQuery>| {
                search_products(family, state, query)
            }),
        )
        .route(
            "/:id",
            get(move |State(state): State<Arc<AppState>>, Path(id): Path<u32>| {
                get_product(family, state, id)
            }),
        )
}

// ─── GET <prefix> ────────────────────────────────────────────────

async fn list_products(family: RouteFamily, state: Arc<AppState>, query: ProductQuery) -> Response {
    let fault = state.faults.inject(family).await;
    let products = state.catalog.search(&query);
    let body = Json(ProductList {
        count: products.len(),
        fault,
        products,
    });

    if family == RouteFamily::Products && fault == Fault::None {
        ([(header::CACHE_CONTROL, CACHE_CONTROL)], body).into_response()
    } else {
        body.into_response()
    }
}

// ─── POST <prefix>/search ────────────────────────────────────────

async fn search_products(
    family: RouteFamily,
    state: Arc<AppState>,
    query: ProductQuery,
) -> Json<ProductList> {
    let fault = state.faults.inject(family).await;
    let products = state.catalog.search(&query);
    Json(ProductList {
        count: products.len(),
        fault,
        products,
    })
}

// ─── GET <prefix>/:id ────────────────────────────────────────────

async fn get_product(family: RouteFamily, state: Arc<AppState>, id: u32) -> Result<Json<Product>, AppError> {
    state.faults.inject(family).await;
    state
        .catalog
        .get(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product '{id}' not found")))
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, FaultConfig, PerformanceMode};
    use crate::handlers::test_support::{app_with, send};
    use crate::middleware::RESPONSE_TIME_HEADER;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    fn quick_faults() -> Config {
        Config {
            faults: FaultConfig {
                slow_delay_ms: 30,
                cpu_iterations: 10_000,
                performance_mode: PerformanceMode::Healthy,
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn healthy_list_is_cacheable_and_timed() {
        let (state, app, _rx) = app_with(quick_faults());
        let resp = app
            .oneshot(Request::builder().uri("/api/products?limit=3").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "public, max-age=60");
        let timing = resp.headers()[RESPONSE_TIME_HEADER].to_str().unwrap();
        assert!(timing.parse::<f64>().is_ok());
        assert_eq!(timing.split('.').nth(1).map(str::len), Some(2));

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["count"], 3);
        assert_eq!(body["fault"]["kind"], "none");
        assert_eq!(state.monitor.sample_count(), 1);
    }

    #[tokio::test]
    async fn degraded_mode_slows_plain_products() {
        let (state, app, _rx) = app_with(quick_faults());
        state.faults.set_mode(PerformanceMode::Degraded);

        let resp = app
            .oneshot(Request::builder().uri("/api/products").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(resp.headers().get(header::CACHE_CONTROL).is_none());
        let timing: f64 = resp.headers()[RESPONSE_TIME_HEADER].to_str().unwrap().parse().unwrap();
        assert!(timing >= 30.0);

        let snapshot = state.monitor.snapshot();
        assert!(snapshot.max >= 30.0);
    }

    #[tokio::test]
    async fn fault_families_report_their_fault() {
        let (_state, app, _rx) = app_with(quick_faults());

        let (status, body) = send(&app, "GET", "/api/slowproducts/7", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 7);

        let (status, body) = send(&app, "POST", "/api/cpuintensive/search", Some(json!({ "limit": 2 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
        assert_eq!(body["fault"]["kind"], "cpuIntensive");
    }

    #[tokio::test]
    async fn missing_product_is_404_and_still_recorded() {
        let (state, app, _rx) = app_with(quick_faults());
        let (status, body) = send(&app, "GET", "/api/products/9999", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
        assert_eq!(state.monitor.sample_count(), 1);
    }
}
