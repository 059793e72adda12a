//! Domain collectors.
//!
//! Each collector owns the gauge families for one data domain and knows the
//! query that feeds them. Populating is two-phase: the whole result set is
//! decoded into [`Observation`]s first, and the families are only touched once
//! every row decoded. A failed pass leaves the families exactly as they were.

mod instance_usage;
mod quota_usage;

pub use instance_usage::{InstanceUsageCollector, INSTANCE_USAGE_QUERY};
pub use quota_usage::{
    kind_index, QuotaKind, QuotaUsageCollector, QUOTA_KINDS, QUOTA_QUERY, UNLIMITED,
};

use async_trait::async_trait;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts, Registry};

use crate::error::Result;
use crate::session::Session;

/// Metric namespace for every collector family.
pub const NAMESPACE: &str = "openstack";

/// Constant label distinguishing one cloud from another.
pub const CLOUD_LABEL: &str = "cloud";

/// Variable label carrying the project name.
pub const PROJECT_LABEL: &str = "project";

/// What to do with label values that a successful pass did not return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StalePolicy {
    /// Keep the last known value until the project shows up again.
    #[default]
    Retain,
    /// Drop every series of the collector before applying a successful pass.
    Reset,
}

/// A single decoded value destined for one family.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Index into [`DomainCollector::families`].
    pub family: usize,
    /// Project label value.
    pub project: String,
    /// Gauge value.
    pub value: f64,
}

impl Observation {
    /// Create an observation.
    pub fn new(family: usize, project: impl Into<String>, value: f64) -> Self {
        Self {
            family,
            project: project.into(),
            value,
        }
    }
}

/// A collector for one data domain.
#[async_trait]
pub trait DomainCollector: Send + Sync {
    /// Short name used in logs and self-metrics.
    fn name(&self) -> &'static str;

    /// The gauge families owned by this collector, in a fixed order.
    fn families(&self) -> Vec<&GaugeVec>;

    /// Run the domain query and decode every row.
    async fn observe(&self, session: &mut dyn Session) -> Result<Vec<Observation>>;

    /// Query, then update the families from the result.
    ///
    /// Returns the number of observations applied.
    async fn populate(&self, session: &mut dyn Session, policy: StalePolicy) -> Result<usize> {
        let observations = self.observe(session).await?;
        if policy == StalePolicy::Reset {
            for family in self.families() {
                family.reset();
            }
        }
        Ok(self.apply(&observations))
    }

    /// Set each observation on its family. Re-setting a known label overwrites it.
    fn apply(&self, observations: &[Observation]) -> usize {
        let families = self.families();
        let mut applied = 0;
        for obs in observations {
            if let Some(family) = families.get(obs.family) {
                family.with_label_values(&[obs.project.as_str()]).set(obs.value);
                applied += 1;
            }
        }
        applied
    }

    /// Register every family with `registry`.
    ///
    /// Fails if a family clashes with one already registered.
    fn register(&self, registry: &Registry) -> Result<()> {
        for family in self.families() {
            registry.register(Box::new(family.clone()))?;
        }
        Ok(())
    }

    /// Descriptors of every family. Never touches the database.
    fn describe(&self) -> Vec<&Desc> {
        self.families()
            .into_iter()
            .flat_map(|family| family.desc())
            .collect()
    }

    /// Current values of every family.
    fn collect(&self) -> Vec<MetricFamily> {
        self.families()
            .into_iter()
            .flat_map(|family| family.collect())
            .collect()
    }
}

/// Build a gauge family labelled by project with the constant cloud label.
pub(crate) fn project_gauge(name: &str, help: &str, cloud: &str) -> Result<GaugeVec> {
    let opts = Opts::new(name, help)
        .namespace(NAMESPACE)
        .const_label(CLOUD_LABEL, cloud);
    Ok(GaugeVec::new(opts, &[PROJECT_LABEL])?)
}
