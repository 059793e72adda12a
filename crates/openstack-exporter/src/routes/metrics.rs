//! Metrics endpoint.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::error;

use openstack_exporter_core::CONTENT_TYPE;

use crate::error::AppError;
use crate::AppState;

/// Metrics routes, mounted at the configured telemetry path.
pub fn routes(path: &str) -> Router<AppState> {
    Router::new().route(path, get(scrape))
}

/// Scrape handler. Collector failures still produce a 200 with last known values.
async fn scrape(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.exporter.render().await.map_err(|e| {
        error!(error = %e, "failed to encode metrics");
        AppError::from(e)
    })?;

    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], body))
}
