//! Per-project quota limits across compute and block storage.

use async_trait::async_trait;
use prometheus::GaugeVec;
use tracing::trace;

use super::{project_gauge, DomainCollector, Observation};
use crate::error::Result;
use crate::session::Session;

/// Quota rows from cinder and nova.
///
/// Columns: resource, hard_limit, project.
pub const QUOTA_QUERY: &str = "
    SELECT a.resource, a.hard_limit, b.name AS project
    FROM cinder.quotas a
    JOIN keystone.project b ON a.project_id = b.id AND a.deleted_at IS NULL
    UNION ALL
    SELECT a.resource, a.hard_limit, b.name AS project
    FROM nova.quotas a
    JOIN keystone.project b ON a.project_id = b.id AND a.deleted_at IS NULL
";

/// Hard limit meaning "no limit". Reported as 0.
pub const UNLIMITED: f64 = -1.0;

/// One quota resource and the family it is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaKind {
    /// Resource name as stored in the quota tables.
    pub resource: &'static str,
    /// Metric name without namespace.
    pub metric: &'static str,
    /// Help text.
    pub help: &'static str,
}

impl QuotaKind {
    const fn new(resource: &'static str, metric: &'static str, help: &'static str) -> Self {
        Self {
            resource,
            metric,
            help,
        }
    }
}

/// Recognised quota resources. Rows with any other resource are skipped.
pub const QUOTA_KINDS: [QuotaKind; 9] = [
    QuotaKind::new("cores", "vcpus_quota", "Openstack VCPUs Quota"),
    QuotaKind::new("gigabytes", "gigabytes_quota", "Openstack Gigabytes Quota"),
    QuotaKind::new(
        "injected_file_content_bytes",
        "inject_file_content_bytes_quota",
        "Openstack Injected file content bytes Quota",
    ),
    QuotaKind::new("injected_files", "injected_files_quota", "Openstack Injected Files Quota"),
    QuotaKind::new("instances", "instances_quota", "Openstack Instances Quota"),
    QuotaKind::new("metadata_items", "metadata_items_quota", "Openstack Metadata items Quota"),
    QuotaKind::new("ram", "ram_quota", "Openstack RAM Quota"),
    QuotaKind::new("snapshots", "snapshots_quota", "Openstack Snapshots Quota"),
    QuotaKind::new("volumes", "volumes_quota", "Openstack Volumes Quota"),
];

/// Map a resource name to its index in [`QUOTA_KINDS`].
pub fn kind_index(resource: &str) -> Option<usize> {
    QUOTA_KINDS.iter().position(|kind| kind.resource == resource)
}

fn normalize_hard_limit(limit: f64) -> f64 {
    if limit == UNLIMITED {
        0.0
    } else {
        limit
    }
}

/// Reports the hard limit of every recognised quota per project.
pub struct QuotaUsageCollector {
    families: Vec<GaugeVec>,
}

impl QuotaUsageCollector {
    /// Create the collector and one family per entry of [`QUOTA_KINDS`].
    pub fn new(cloud: &str) -> Result<Self> {
        let families = QUOTA_KINDS
            .iter()
            .map(|kind| project_gauge(kind.metric, kind.help, cloud))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { families })
    }

    /// The family for a resource name, if recognised.
    pub fn family(&self, resource: &str) -> Option<&GaugeVec> {
        kind_index(resource).and_then(|idx| self.families.get(idx))
    }
}

#[async_trait]
impl DomainCollector for QuotaUsageCollector {
    fn name(&self) -> &'static str {
        "quota_usage"
    }

    fn families(&self) -> Vec<&GaugeVec> {
        self.families.iter().collect()
    }

    async fn observe(&self, session: &mut dyn Session) -> Result<Vec<Observation>> {
        let rows = session.fetch_all(QUOTA_QUERY).await?;

        let mut observations = Vec::with_capacity(rows.len());
        for row in &rows {
            let resource = row.text(0)?;
            let limit = normalize_hard_limit(row.f64_or_zero(1)?);
            let project = row.text(2)?;

            match kind_index(resource) {
                Some(family) => observations.push(Observation::new(family, project, limit)),
                None => trace!(%resource, %project, "ignoring unknown quota resource"),
            }
        }
        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::testing::{sample, ScriptedSession};
    use crate::collectors::StalePolicy;
    use crate::session::{Cell, Row};

    fn quota_row(resource: &str, hard_limit: i64, project: &str) -> Row {
        Row::new(vec![Cell::from(resource), Cell::Int(hard_limit), Cell::from(project)])
    }

    #[tokio::test]
    async fn test_every_kind_is_dispatched() {
        let collector = QuotaUsageCollector::new("test").unwrap();
        let rows = QUOTA_KINDS
            .iter()
            .enumerate()
            .map(|(i, kind)| quota_row(kind.resource, 10 + i as i64, "alpha"))
            .collect();
        let mut session = ScriptedSession::new().respond(rows);

        let applied = collector
            .populate(&mut session, StalePolicy::Retain)
            .await
            .unwrap();
        assert_eq!(applied, QUOTA_KINDS.len());

        let families = collector.collect();
        for (i, kind) in QUOTA_KINDS.iter().enumerate() {
            let name = format!("openstack_{}", kind.metric);
            assert_eq!(sample(&families, &name, "alpha"), Some(10.0 + i as f64));
        }
    }

    #[tokio::test]
    async fn test_unlimited_is_reported_as_zero() {
        let collector = QuotaUsageCollector::new("test").unwrap();
        let mut session = ScriptedSession::new().respond(vec![quota_row("cores", -1, "beta")]);

        collector
            .populate(&mut session, StalePolicy::Retain)
            .await
            .unwrap();

        assert_eq!(
            sample(&collector.collect(), "openstack_vcpus_quota", "beta"),
            Some(0.0)
        );
    }

    #[tokio::test]
    async fn test_unknown_resource_is_ignored() {
        let collector = QuotaUsageCollector::new("test").unwrap();
        let mut session =
            ScriptedSession::new().respond(vec![quota_row("unknown_thing", 5, "gamma")]);

        let applied = collector
            .populate(&mut session, StalePolicy::Retain)
            .await
            .unwrap();
        assert_eq!(applied, 0);

        let families = collector.collect();
        assert!(families.iter().all(|family| family.get_metric().is_empty()));
    }

    #[tokio::test]
    async fn test_same_project_from_both_services_overwrites() {
        let collector = QuotaUsageCollector::new("test").unwrap();
        let mut session = ScriptedSession::new().respond(vec![
            quota_row("gigabytes", 1000, "alpha"),
            quota_row("gigabytes", 2000, "alpha"),
        ]);

        collector
            .populate(&mut session, StalePolicy::Retain)
            .await
            .unwrap();

        let families = collector.collect();
        let family = families
            .iter()
            .find(|family| family.get_name() == "openstack_gigabytes_quota")
            .unwrap();
        assert_eq!(family.get_metric().len(), 1);
        assert_eq!(sample(&families, "openstack_gigabytes_quota", "alpha"), Some(2000.0));
    }

    #[tokio::test]
    async fn test_query_failure_keeps_previous_values() {
        let collector = QuotaUsageCollector::new("test").unwrap();
        let mut session = ScriptedSession::new()
            .respond(vec![quota_row("ram", 51200, "alpha")])
            .fail("connection reset");

        collector
            .populate(&mut session, StalePolicy::Reset)
            .await
            .unwrap();
        assert!(collector
            .populate(&mut session, StalePolicy::Reset)
            .await
            .is_err());

        assert_eq!(
            sample(&collector.collect(), "openstack_ram_quota", "alpha"),
            Some(51200.0)
        );
    }

    #[test]
    fn test_family_names_are_unique() {
        let mut names: Vec<_> = QUOTA_KINDS.iter().map(|kind| kind.metric).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), QUOTA_KINDS.len());
    }

    #[test]
    fn test_family_lookup() {
        let collector = QuotaUsageCollector::new("test").unwrap();
        assert!(collector.family("snapshots").is_some());
        assert!(collector.family("snaphots").is_none());
        assert_eq!(kind_index("cores"), Some(0));
    }

    #[test]
    fn test_normalize_hard_limit() {
        assert_eq!(normalize_hard_limit(UNLIMITED), 0.0);
        assert_eq!(normalize_hard_limit(0.0), 0.0);
        assert_eq!(normalize_hard_limit(20.0), 20.0);
    }
}
