//! OpenStack Exporter - HTTP front end.
//!
//! Serves the collectors from `openstack-exporter-core` over HTTP: a landing
//! page, the metrics endpoint and a health endpoint.

pub mod config;
pub mod error;
pub mod json;
pub mod routes;

pub use config::{Args, ConfigError, DatabaseConfig, ExporterConfig};
pub use error::AppError;

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use openstack_exporter_core::{Exporter, MySqlSession, SqliteSession};

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// The exporter registry.
    pub exporter: Arc<Exporter>,
    /// Exporter configuration.
    pub config: ExporterConfig,
}

impl AppState {
    /// Create new application state.
    pub fn new(exporter: Exporter, config: ExporterConfig) -> Self {
        Self {
            exporter: Arc::new(exporter),
            config,
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::landing::routes())
        .merge(routes::health::routes())
        .merge(routes::metrics::routes(&state.config.telemetry_path))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the configured database and build the exporter around it.
///
/// The connection is opened once here and reused for the life of the process.
pub async fn build_exporter(config: &ExporterConfig) -> anyhow::Result<Exporter> {
    let builder = match &config.database {
        DatabaseConfig::MySql(options) => {
            let session = MySqlSession::connect(options).await?;
            Exporter::builder(session, config.cloud.as_str())
        }
        DatabaseConfig::Sqlite(path) => {
            let session = SqliteSession::open_dir(path)?;
            Exporter::builder(session, config.cloud.as_str())
        }
    };

    let exporter = builder
        .with_default_collectors()?
        .stale_policy(config.stale_policy)
        .collector_timeout(config.collector_timeout)
        .build()?;

    info!(
        cloud = %config.cloud,
        stale_policy = ?config.stale_policy,
        collector_timeout = ?config.collector_timeout,
        "exporter ready"
    );
    Ok(exporter)
}
