//! JSON bodies served by the exporter.

use serde::{Deserialize, Serialize};

use openstack_exporter_core::CollectorStatus;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when every collector's last pass succeeded, else `degraded`.
    pub status: String,
    /// Exporter version.
    pub version: String,
    /// Cloud label.
    pub cloud: String,
    /// Per-collector outcome.
    pub collectors: Vec<CollectorHealth>,
}

/// Outcome of one collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorHealth {
    /// Collector name.
    pub name: String,
    /// Whether the last populate step succeeded.
    pub healthy: bool,
    /// Populate steps attempted.
    pub runs: u64,
    /// Error of the last populate step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&CollectorStatus> for CollectorHealth {
    fn from(status: &CollectorStatus) -> Self {
        Self {
            name: status.name.to_string(),
            healthy: status.is_healthy(),
            runs: status.runs,
            last_error: status.last_error.clone(),
        }
    }
}
