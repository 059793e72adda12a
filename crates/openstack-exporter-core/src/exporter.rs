//! The exporter registry.
//!
//! [`Exporter`] presents every domain collector as one collectible unit. All
//! collectors share a single database session, so a scrape takes one mutex for
//! the whole query-and-populate sequence. Concurrent scrapes queue on that
//! mutex and run one after another; none are dropped.
//!
//! # Architecture
//!
//! ```text
//! Exporter
//!   ├── describe() → descriptors, no I/O
//!   ├── collect()  → lock session
//!   │                 ├── QuotaUsageCollector::populate
//!   │                 ├── InstanceUsageCollector::populate
//!   │                 └── Registry::gather
//!   └── render()   → Prometheus text exposition
//! ```

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Registry, TextEncoder};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::collectors::{DomainCollector, InstanceUsageCollector, QuotaUsageCollector, StalePolicy};
use crate::error::{Error, Result};
use crate::metrics::ScrapeMetrics;
use crate::session::Session;

/// Content type of [`Exporter::render`] output.
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

/// Last known outcome of one collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorStatus {
    /// Collector name.
    pub name: &'static str,
    /// Number of populate steps attempted.
    pub runs: u64,
    /// Error of the last populate step, if it failed.
    pub last_error: Option<String>,
}

impl CollectorStatus {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            runs: 0,
            last_error: None,
        }
    }

    /// Whether the last populate step succeeded (or none ran yet).
    pub fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }
}

/// Builder for [`Exporter`].
pub struct ExporterBuilder {
    session: Box<dyn Session>,
    cloud: String,
    collectors: Vec<Box<dyn DomainCollector>>,
    stale_policy: StalePolicy,
    collector_timeout: Option<Duration>,
}

impl ExporterBuilder {
    /// Set the stale-series policy applied by every collector.
    pub fn stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    /// Bound each collector's populate step. `None` waits indefinitely.
    pub fn collector_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.collector_timeout = timeout;
        self
    }

    /// Add a collector. Collectors run in insertion order.
    pub fn with_collector(mut self, collector: impl DomainCollector + 'static) -> Self {
        self.collectors.push(Box::new(collector));
        self
    }

    /// Add the quota and instance usage collectors.
    pub fn with_default_collectors(self) -> Result<Self> {
        let quota = QuotaUsageCollector::new(&self.cloud)?;
        let usage = InstanceUsageCollector::new(&self.cloud)?;
        Ok(self.with_collector(quota).with_collector(usage))
    }

    /// Build the exporter.
    ///
    /// Fails if two families clash in the registry.
    pub fn build(self) -> Result<Exporter> {
        let metrics = ScrapeMetrics::new(&self.cloud)?;

        let registry = Registry::new();
        for collector in &self.collectors {
            collector.register(&registry)?;
        }
        metrics.register(&registry)?;

        let status = self
            .collectors
            .iter()
            .map(|collector| {
                metrics.register_collector(collector.name());
                CollectorStatus::new(collector.name())
            })
            .collect();

        Ok(Exporter {
            session: Mutex::new(self.session),
            collectors: self.collectors,
            registry,
            metrics,
            status: RwLock::new(status),
            stale_policy: self.stale_policy,
            collector_timeout: self.collector_timeout,
            cloud: self.cloud,
        })
    }
}

/// All collectors behind one scrape-safe entry point.
pub struct Exporter {
    /// Guards the shared session for a whole scrape.
    session: Mutex<Box<dyn Session>>,
    collectors: Vec<Box<dyn DomainCollector>>,
    /// Every collector family plus the self-metrics.
    registry: Registry,
    metrics: ScrapeMetrics,
    /// Index-aligned with `collectors`.
    status: RwLock<Vec<CollectorStatus>>,
    stale_policy: StalePolicy,
    collector_timeout: Option<Duration>,
    cloud: String,
}

impl Exporter {
    /// Create an exporter with the quota and instance usage collectors.
    pub fn new(session: impl Session + 'static, cloud: impl Into<String>) -> Result<Self> {
        Self::builder(session, cloud)
            .with_default_collectors()?
            .build()
    }

    /// Start building an exporter with no collectors.
    pub fn builder(session: impl Session + 'static, cloud: impl Into<String>) -> ExporterBuilder {
        ExporterBuilder {
            session: Box::new(session),
            cloud: cloud.into(),
            collectors: Vec::new(),
            stale_policy: StalePolicy::default(),
            collector_timeout: None,
        }
    }

    /// The cloud label value.
    pub fn cloud(&self) -> &str {
        &self.cloud
    }

    /// The exporter's own metrics.
    pub fn scrape_metrics(&self) -> &ScrapeMetrics {
        &self.metrics
    }

    /// Descriptors of every family, independent of any query.
    pub fn describe(&self) -> Vec<&Desc> {
        self.collectors
            .iter()
            .flat_map(|collector| collector.describe())
            .chain(self.metrics.describe())
            .collect()
    }

    /// Run every collector against the database and return all non-empty families.
    ///
    /// Holds the session lock for the whole pass. A failing collector is
    /// logged and counted; its families keep their last known values and the
    /// remaining collectors still run.
    pub async fn collect(&self) -> Vec<MetricFamily> {
        let mut session = self.session.lock().await;
        self.metrics.record_scrape();

        for (idx, collector) in self.collectors.iter().enumerate() {
            let name = collector.name();
            let started = Instant::now();
            let outcome = self.populate(collector.as_ref(), &mut **session).await;
            let elapsed = started.elapsed();

            match &outcome {
                Ok(applied) => {
                    debug!(
                        collector = name,
                        observations = applied,
                        duration_ms = elapsed.as_millis() as u64,
                        "collector populated"
                    );
                    self.metrics.record_success(name, elapsed);
                }
                Err(e) => {
                    warn!(
                        collector = name,
                        backend = session.backend(),
                        error = %e,
                        "collector failed, keeping last known values"
                    );
                    self.metrics.record_failure(name, elapsed);
                }
            }
            self.record_status(idx, outcome.err());
        }

        self.metrics.update_uptime();
        self.registry.gather()
    }

    /// Collect and encode in the Prometheus text format.
    pub async fn render(&self) -> Result<String> {
        let families = self.collect().await;
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| Error::Metrics(prometheus::Error::Msg(e.to_string())))
    }

    /// Last known outcome of every collector, in run order.
    pub fn status(&self) -> Vec<CollectorStatus> {
        self.status.read().clone()
    }

    async fn populate(
        &self,
        collector: &dyn DomainCollector,
        session: &mut dyn Session,
    ) -> Result<usize> {
        let pass = collector.populate(session, self.stale_policy);
        match self.collector_timeout {
            Some(limit) => tokio::time::timeout(limit, pass)
                .await
                .map_err(|_| Error::Timeout {
                    collector: collector.name(),
                    elapsed: limit,
                })?,
            None => pass.await,
        }
    }

    fn record_status(&self, idx: usize, error: Option<Error>) {
        let mut status = self.status.write();
        if let Some(entry) = status.get_mut(idx) {
            entry.runs += 1;
            entry.last_error = error.map(|e| e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::collectors::testing::{sample, ScriptedSession};
    use crate::collectors::{INSTANCE_USAGE_QUERY, QUOTA_QUERY};
    use crate::session::{Cell, Row};

    fn usage_rows(project: &str, instances: i64) -> Vec<Row> {
        vec![Row::new(vec![
            Cell::Int(instances),
            Cell::Float(12.0),
            Cell::Float(4096.0),
            Cell::Float(80.0),
            Cell::from(project),
        ])]
    }

    fn quota_rows(project: &str, cores: i64) -> Vec<Row> {
        vec![Row::new(vec![
            Cell::from("cores"),
            Cell::Int(cores),
            Cell::from(project),
        ])]
    }

    #[tokio::test]
    async fn test_collect_runs_every_collector() {
        let session = ScriptedSession::new()
            .respond(quota_rows("alpha", 20))
            .respond(usage_rows("alpha", 3));
        let exporter = Exporter::new(session, "test").unwrap();

        let families = exporter.collect().await;

        assert_eq!(sample(&families, "openstack_vcpus_quota", "alpha"), Some(20.0));
        assert_eq!(sample(&families, "openstack_instances_total", "alpha"), Some(3.0));
        assert_eq!(exporter.scrape_metrics().scrape_count(), 1);
        assert!(exporter.status().iter().all(CollectorStatus::is_healthy));
    }

    #[tokio::test]
    async fn test_failing_collector_does_not_stop_siblings() {
        let session = ScriptedSession::new()
            .respond(quota_rows("alpha", 20))
            .respond(usage_rows("alpha", 3))
            .fail("lost connection")
            .respond(usage_rows("alpha", 5));
        let exporter = Exporter::new(session, "test").unwrap();

        exporter.collect().await;
        let families = exporter.collect().await;

        // Quota failed on the second pass: last known value survives.
        assert_eq!(sample(&families, "openstack_vcpus_quota", "alpha"), Some(20.0));
        // Usage ran after the failure and picked up the new value.
        assert_eq!(sample(&families, "openstack_instances_total", "alpha"), Some(5.0));

        assert_eq!(exporter.scrape_metrics().error_count("quota_usage"), 1);
        assert_eq!(exporter.scrape_metrics().error_count("instance_usage"), 0);

        let status = exporter.status();
        assert_eq!(status[0].name, "quota_usage");
        assert_eq!(status[0].runs, 2);
        assert!(status[0].last_error.as_deref().unwrap().contains("lost connection"));
        assert!(status[1].is_healthy());
    }

    #[tokio::test]
    async fn test_all_failing_still_renders() {
        let session = ScriptedSession::new().fail("down").fail("down");
        let exporter = Exporter::new(session, "test").unwrap();

        let text = exporter.render().await.unwrap();

        assert!(!text.contains("openstack_vcpus_quota"));
        assert!(text.contains("openstack_exporter_collector_errors_total"));
        assert!(text.contains("openstack_exporter_scrapes_total{cloud=\"test\"} 1"));
    }

    #[tokio::test]
    async fn test_describe_is_stable_and_query_free() {
        let exporter = Exporter::new(ScriptedSession::new(), "test").unwrap();

        let before: Vec<String> = exporter.describe().iter().map(|d| d.fq_name.clone()).collect();
        exporter.collect().await;
        let after: Vec<String> = exporter.describe().iter().map(|d| d.fq_name.clone()).collect();

        assert_eq!(before, after);
        // 9 quota families, 4 usage families, 5 self-metrics.
        assert_eq!(before.len(), 18);
        assert_eq!(exporter.scrape_metrics().scrape_count(), 1);
    }

    #[tokio::test]
    async fn test_render_format() {
        let session = ScriptedSession::new()
            .respond(quota_rows("beta", -1))
            .respond(usage_rows("alpha", 3));
        let exporter = Exporter::new(session, "east").unwrap();

        let text = exporter.render().await.unwrap();

        assert!(text.contains("# TYPE openstack_instances_total gauge"));
        assert!(text.contains("openstack_instances_total{cloud=\"east\",project=\"alpha\"} 3"));
        assert!(text.contains("openstack_vcpus_quota{cloud=\"east\",project=\"beta\"} 0"));
    }

    #[test]
    fn test_duplicate_family_names_rejected() {
        let result = Exporter::builder(ScriptedSession::new(), "test")
            .with_collector(QuotaUsageCollector::new("test").unwrap())
            .with_collector(QuotaUsageCollector::new("test").unwrap())
            .build();

        assert!(matches!(
            result,
            Err(Error::Metrics(prometheus::Error::AlreadyReg))
        ));
    }

    #[tokio::test]
    async fn test_collect_gathers_sorted_non_empty_families() {
        let session = ScriptedSession::new()
            .fail("down")
            .respond(usage_rows("alpha", 3));
        let exporter = Exporter::new(session, "test").unwrap();

        let families = exporter.collect().await;
        let names: Vec<&str> = families.iter().map(|family| family.get_name()).collect();

        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"openstack_instances_total"));
        assert!(!names.iter().any(|name| name.ends_with("_quota")));
    }

    /// Session that sleeps inside every query and tracks overlap.
    struct SlowSession {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        log: Arc<parking_lot::Mutex<Vec<String>>>,
        delay: Duration,
    }

    #[async_trait]
    impl Session for SlowSession {
        fn backend(&self) -> &'static str {
            "slow"
        }

        async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.log.lock().push(sql.to_string());
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scrapes_never_interleave() {
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let session = SlowSession {
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::clone(&max_in_flight),
            log: Arc::clone(&log),
            delay: Duration::from_millis(5),
        };
        let exporter = Arc::new(Exporter::new(session, "test").unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let exporter = Arc::clone(&exporter);
                tokio::spawn(async move { exporter.collect().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(exporter.scrape_metrics().scrape_count(), 8);

        // Each pass issues quota then usage, back to back.
        let log = log.lock();
        assert_eq!(log.len(), 16);
        for pass in log.chunks(2) {
            assert_eq!(pass[0], QUOTA_QUERY);
            assert_eq!(pass[1], INSTANCE_USAGE_QUERY);
        }
    }

    #[tokio::test]
    async fn test_collector_timeout() {
        let session = SlowSession {
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(parking_lot::Mutex::new(Vec::new())),
            delay: Duration::from_millis(200),
        };
        let exporter = Exporter::builder(session, "test")
            .with_default_collectors()
            .unwrap()
            .collector_timeout(Some(Duration::from_millis(10)))
            .build()
            .unwrap();

        exporter.collect().await;

        let status = exporter.status();
        assert!(status.iter().all(|s| !s.is_healthy()));
        assert!(status[0].last_error.as_deref().unwrap().contains("timed out"));
    }
}
