//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};

use crate::config::HEALTH_PATH;
use crate::json::{CollectorHealth, HealthResponse};
use crate::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(HEALTH_PATH, get(health_check))
}

/// Health check handler. Reports the outcome of the last scrape without querying.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let collectors: Vec<CollectorHealth> = state
        .exporter
        .status()
        .iter()
        .map(CollectorHealth::from)
        .collect();
    let healthy = collectors.iter().all(|collector| collector.healthy);

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cloud: state.exporter.cloud().to_string(),
        collectors,
    })
}
