//! Scrape and collector health metrics.

use std::time::{Duration, Instant};

use prometheus::core::{Collector, Desc};
use prometheus::{Gauge, GaugeVec, IntCounter, IntCounterVec, Opts, Registry};

use crate::collectors::CLOUD_LABEL;
use crate::error::Result;

/// Namespace for the exporter's own metrics.
pub const EXPORTER_NAMESPACE: &str = "openstack_exporter";

const COLLECTOR_LABEL: &str = "collector";

/// Metrics describing the exporter itself.
pub struct ScrapeMetrics {
    /// Exporter start time.
    started_at: Instant,

    uptime: Gauge,

    // Scrape metrics
    scrapes: IntCounter,

    // Per-collector metrics
    collector_errors: IntCounterVec,
    collector_duration: GaugeVec,
    collector_last_success: GaugeVec,
}

impl ScrapeMetrics {
    /// Create the metrics with the constant cloud label.
    pub fn new(cloud: &str) -> Result<Self> {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(EXPORTER_NAMESPACE)
                .const_label(CLOUD_LABEL, cloud)
        };

        Ok(Self {
            started_at: Instant::now(),
            uptime: Gauge::with_opts(opts("uptime_seconds", "Exporter uptime in seconds"))?,
            scrapes: IntCounter::with_opts(opts("scrapes_total", "Total scrapes served"))?,
            collector_errors: IntCounterVec::new(
                opts("collector_errors_total", "Failed collector populate steps"),
                &[COLLECTOR_LABEL],
            )?,
            collector_duration: GaugeVec::new(
                opts(
                    "collector_duration_seconds",
                    "Duration of the last collector populate step",
                ),
                &[COLLECTOR_LABEL],
            )?,
            collector_last_success: GaugeVec::new(
                opts(
                    "collector_last_success",
                    "Whether the last collector populate step succeeded",
                ),
                &[COLLECTOR_LABEL],
            )?,
        })
    }

    /// Pre-create the series for a collector so they read 0 before its first run.
    pub fn register_collector(&self, collector: &str) {
        self.collector_errors.with_label_values(&[collector]);
        self.collector_duration.with_label_values(&[collector]);
        self.collector_last_success.with_label_values(&[collector]);
    }

    /// Record the start of a scrape.
    pub fn record_scrape(&self) {
        self.scrapes.inc();
    }

    /// Record a successful populate step.
    pub fn record_success(&self, collector: &str, elapsed: Duration) {
        self.collector_duration
            .with_label_values(&[collector])
            .set(elapsed.as_secs_f64());
        self.collector_last_success
            .with_label_values(&[collector])
            .set(1.0);
    }

    /// Record a failed populate step.
    pub fn record_failure(&self, collector: &str, elapsed: Duration) {
        self.collector_errors.with_label_values(&[collector]).inc();
        self.collector_duration
            .with_label_values(&[collector])
            .set(elapsed.as_secs_f64());
        self.collector_last_success
            .with_label_values(&[collector])
            .set(0.0);
    }

    /// Bring the uptime gauge up to date before a gather.
    pub fn update_uptime(&self) {
        self.uptime.set(self.started_at.elapsed().as_secs_f64());
    }

    // Getters

    /// Get total scrape count.
    pub fn scrape_count(&self) -> u64 {
        self.scrapes.get()
    }

    /// Get the failure count of a collector.
    pub fn error_count(&self, collector: &str) -> u64 {
        self.collector_errors.with_label_values(&[collector]).get()
    }

    fn collectors(&self) -> [&dyn Collector; 5] {
        [
            &self.uptime,
            &self.scrapes,
            &self.collector_errors,
            &self.collector_duration,
            &self.collector_last_success,
        ]
    }

    /// Descriptors of every self-metric.
    pub fn describe(&self) -> Vec<&Desc> {
        self.collectors()
            .into_iter()
            .flat_map(|collector| collector.desc())
            .collect()
    }

    /// Register every self-metric with `registry`.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.uptime.clone()))?;
        registry.register(Box::new(self.scrapes.clone()))?;
        registry.register(Box::new(self.collector_errors.clone()))?;
        registry.register(Box::new(self.collector_duration.clone()))?;
        registry.register(Box::new(self.collector_last_success.clone()))?;
        Ok(())
    }
}
