//! Per-project instance allocation totals.

use async_trait::async_trait;
use prometheus::GaugeVec;

use super::{project_gauge, DomainCollector, Observation};
use crate::error::Result;
use crate::session::Session;

/// Aggregate of live instances per project.
///
/// Columns: instances, vcpus, memory_mb, root_gb, project. MySQL returns the
/// sums as DECIMAL, which the session hands back as numeric text.
pub const INSTANCE_USAGE_QUERY: &str = "
    SELECT COUNT(c.vcpus) AS instances,
      SUM(c.vcpus) AS vcpus,
      SUM(c.memory_mb) AS memory_mb,
      SUM(c.root_gb) AS root_gb,
      d.name AS project
    FROM nova.instances c
    JOIN keystone.project d ON c.project_id = d.id
     AND c.deleted_at IS NULL
    GROUP BY d.name
";

const INSTANCES: usize = 0;
const VCPUS: usize = 1;
const MEMORY: usize = 2;
const LOCAL_DISK: usize = 3;

/// Reports instance count, vCPUs, memory and local disk allocated per project.
pub struct InstanceUsageCollector {
    /// Allocated instances.
    pub instances: GaugeVec,
    /// Allocated vCPUs.
    pub vcpus: GaugeVec,
    /// Allocated memory in MB.
    pub memory: GaugeVec,
    /// Allocated local disk in GB.
    pub local_disk: GaugeVec,
}

impl InstanceUsageCollector {
    /// Create the collector and its families for the given cloud.
    pub fn new(cloud: &str) -> Result<Self> {
        Ok(Self {
            instances: project_gauge("instances_total", "Openstack Instances", cloud)?,
            vcpus: project_gauge("vcpus_total", "Openstack VCPUs", cloud)?,
            memory: project_gauge("memory_mb_total", "Openstack Memory", cloud)?,
            local_disk: project_gauge("root_gb_total", "Openstack Local Disk", cloud)?,
        })
    }
}

#[async_trait]
impl DomainCollector for InstanceUsageCollector {
    fn name(&self) -> &'static str {
        "instance_usage"
    }

    fn families(&self) -> Vec<&GaugeVec> {
        vec![&self.instances, &self.vcpus, &self.memory, &self.local_disk]
    }

    async fn observe(&self, session: &mut dyn Session) -> Result<Vec<Observation>> {
        let rows = session.fetch_all(INSTANCE_USAGE_QUERY).await?;

        let mut observations = Vec::with_capacity(rows.len() * 4);
        for row in &rows {
            let project = row.text(4)?;
            observations.push(Observation::new(INSTANCES, project, row.f64_or_zero(0)?));
            observations.push(Observation::new(VCPUS, project, row.f64_or_zero(1)?));
            observations.push(Observation::new(MEMORY, project, row.f64_or_zero(2)?));
            observations.push(Observation::new(LOCAL_DISK, project, row.f64_or_zero(3)?));
        }
        Ok(observations)
    }
}
