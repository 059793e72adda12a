//! OpenStack Exporter Core - collectors and registry for the OpenStack exporter.
//!
//! This crate reads instance allocations and quota limits from the OpenStack
//! control-plane database and republishes them as Prometheus gauges labelled
//! by project. It is a read-only bridge: queries run only when a scrape asks
//! for data, and nothing is cached between scrapes apart from the gauges'
//! last known values.
//!
//! # Usage
//!
//! ```ignore
//! use openstack_exporter_core::{Exporter, MySqlOptions, MySqlSession};
//!
//! let options = MySqlOptions::new("db.internal").with_credentials("exporter", "secret");
//! let session = MySqlSession::connect(&options).await?;
//! let exporter = Exporter::new(session, "default")?;
//!
//! let text = exporter.render().await?;
//! ```

pub mod collectors;
pub mod error;
pub mod exporter;
pub mod metrics;
pub mod session;

pub use collectors::{
    DomainCollector, InstanceUsageCollector, Observation, QuotaUsageCollector, StalePolicy,
};
pub use error::{Error, Result};
pub use exporter::{CollectorStatus, Exporter, ExporterBuilder, CONTENT_TYPE};
pub use metrics::ScrapeMetrics;
pub use session::{Cell, MySqlOptions, MySqlSession, Row, Session, SqliteSession};
