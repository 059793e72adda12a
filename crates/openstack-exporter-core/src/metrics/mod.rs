//! Exporter self-monitoring.
//!
//! Collector failures never reach the scrape response as errors; they are
//! logged and counted here instead, so a dashboard can tell "no data" apart
//! from "the query is failing".
//!
//! # Usage
//!
//! ```ignore
//! use std::time::Duration;
//! use openstack_exporter_core::metrics::ScrapeMetrics;
//!
//! let metrics = ScrapeMetrics::new("default")?;
//! metrics.register_collector("quota_usage");
//!
//! metrics.record_scrape();
//! metrics.record_failure("quota_usage", Duration::from_millis(40));
//!
//! assert_eq!(metrics.error_count("quota_usage"), 1);
//! ```

mod registry;

pub use registry::{ScrapeMetrics, EXPORTER_NAMESPACE};
