//! Exporter configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use openstack_exporter_core::session::DEFAULT_MYSQL_PORT;
use openstack_exporter_core::{MySqlOptions, StalePolicy};

/// Default address for the HTTP listener.
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:9100";

/// Default path of the metrics endpoint.
pub const DEFAULT_TELEMETRY_PATH: &str = "/metrics";

/// Default cloud label.
pub const DEFAULT_CLOUD: &str = "default";

/// Characters the router treats as path parameters or wildcards.
const ROUTE_SYNTAX: [char; 4] = ['*', ':', '{', '}'];

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// MySQL was selected but no server address was given.
    #[error("--db.address is required unless --db.sqlite-path is set")]
    MissingDatabaseAddress,

    /// The telemetry path cannot be served.
    #[error(
        "invalid telemetry path {0:?}: must start with '/', not clash with '/' or '/health' \
         and contain none of '*', ':', '{{', '}}'"
    )]
    InvalidTelemetryPath(String),

    /// The cloud label is empty.
    #[error("cloud label must not be empty")]
    EmptyCloud,
}

/// Where the OpenStack tables live.
#[derive(Debug, Clone)]
pub enum DatabaseConfig {
    /// A MySQL server holding the nova, keystone and cinder schemas.
    MySql(MySqlOptions),
    /// A directory of SQLite files named after the schemas.
    Sqlite(PathBuf),
}

/// Exporter configuration.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    /// Address to listen on for HTTP requests.
    pub listen_address: String,

    /// Path under which metrics are served.
    pub telemetry_path: String,

    /// Database to query.
    pub database: DatabaseConfig,

    /// Cloud label applied to every metric.
    pub cloud: String,

    /// Deadline for one collector's populate step. None waits indefinitely.
    pub collector_timeout: Option<Duration>,

    /// What happens to series of projects that disappear.
    pub stale_policy: StalePolicy,
}

impl ExporterConfig {
    /// Create a configuration for the given database with defaults elsewhere.
    pub fn new(database: DatabaseConfig) -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            telemetry_path: DEFAULT_TELEMETRY_PATH.to_string(),
            database,
            cloud: DEFAULT_CLOUD.to_string(),
            collector_timeout: None,
            stale_policy: StalePolicy::default(),
        }
    }

    /// Set the listen address. A leading `:` binds all interfaces.
    pub fn with_listen_address(mut self, address: impl Into<String>) -> Self {
        self.listen_address = normalize_listen_address(address.into());
        self
    }

    /// Set the telemetry path.
    pub fn with_telemetry_path(mut self, path: impl Into<String>) -> Self {
        self.telemetry_path = path.into();
        self
    }

    /// Set the cloud label.
    pub fn with_cloud(mut self, cloud: impl Into<String>) -> Self {
        self.cloud = cloud.into();
        self
    }

    /// Set the per-collector deadline.
    pub fn with_collector_timeout(mut self, timeout: Duration) -> Self {
        self.collector_timeout = Some(timeout);
        self
    }

    /// Set the stale-series policy.
    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    /// Check the configuration can be served.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let path = &self.telemetry_path;
        let route_syntax = path.contains(ROUTE_SYNTAX);
        if !path.starts_with('/') || path == "/" || path == HEALTH_PATH || route_syntax {
            return Err(ConfigError::InvalidTelemetryPath(path.clone()));
        }
        if self.cloud.is_empty() {
            return Err(ConfigError::EmptyCloud);
        }
        Ok(())
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self::new(DatabaseConfig::MySql(MySqlOptions::new("localhost")))
    }
}

fn normalize_listen_address(address: String) -> String {
    if address.starts_with(':') {
        format!("0.0.0.0{address}")
    } else {
        address
    }
}

/// Command-line arguments for the exporter.
#[derive(Parser, Debug)]
#[command(name = "openstack-exporter")]
#[command(version, about = "Prometheus exporter for OpenStack", long_about = None)]
pub struct Args {
    /// Address on which to expose metrics and web interface.
    #[arg(long = "web.listen-address", default_value = DEFAULT_LISTEN_ADDRESS)]
    pub listen_address: String,

    /// Path under which to expose metrics.
    #[arg(long = "web.telemetry-path", default_value = DEFAULT_TELEMETRY_PATH)]
    pub telemetry_path: String,

    /// Address of the OpenStack DB server to query.
    #[arg(long = "db.address")]
    pub db_address: Option<String>,

    /// Port of the OpenStack DB server to query.
    #[arg(long = "db.port", default_value_t = DEFAULT_MYSQL_PORT)]
    pub db_port: u16,

    /// Username of the OpenStack DB server to query.
    #[arg(long = "db.username", default_value = "")]
    pub db_username: String,

    /// Password of the OpenStack DB server to query.
    #[arg(long = "db.password", default_value = "")]
    pub db_password: String,

    /// Directory of SQLite files (nova.db, keystone.db, cinder.db) to query instead of MySQL.
    #[arg(long = "db.sqlite-path")]
    pub sqlite_path: Option<PathBuf>,

    /// Cloud label to assign to metrics.
    #[arg(long = "os.cloud", default_value = DEFAULT_CLOUD)]
    pub cloud: String,

    /// Deadline in milliseconds for each collector's queries. 0 waits indefinitely.
    /// A query past its deadline is abandoned, not cancelled: on SQLite it keeps
    /// the connection busy until it finishes.
    #[arg(long = "collector.timeout-ms", default_value_t = 0)]
    pub collector_timeout_ms: u64,

    /// Drop series of projects that no longer appear in query results.
    #[arg(long = "collector.reset-stale")]
    pub reset_stale: bool,
}

impl Args {
    /// Convert command-line arguments to exporter configuration.
    pub fn into_config(self) -> Result<ExporterConfig, ConfigError> {
        let database = match (self.sqlite_path, self.db_address) {
            (Some(path), _) => DatabaseConfig::Sqlite(path),
            (None, Some(address)) => DatabaseConfig::MySql(
                MySqlOptions::new(address)
                    .with_port(self.db_port)
                    .with_credentials(self.db_username, self.db_password),
            ),
            (None, None) => return Err(ConfigError::MissingDatabaseAddress),
        };

        let mut config = ExporterConfig::new(database)
            .with_listen_address(self.listen_address)
            .with_telemetry_path(self.telemetry_path)
            .with_cloud(self.cloud);
        if self.collector_timeout_ms > 0 {
            config = config.with_collector_timeout(Duration::from_millis(self.collector_timeout_ms));
        }
        if self.reset_stale {
            config = config.with_stale_policy(StalePolicy::Reset);
        }

        config.validate()?;
        Ok(config)
    }
}
