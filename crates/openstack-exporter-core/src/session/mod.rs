//! Database sessions.
//!
//! A [`Session`] is one long-lived connection to the OpenStack control-plane
//! database. Collectors only ever see `&mut dyn Session`, so whoever owns the
//! session decides how access is serialized; the [`Exporter`] keeps it behind a
//! single mutex.
//!
//! Two backends are provided:
//!
//! - [`MySqlSession`]: the production backend, built on `sqlx`.
//! - [`SqliteSession`]: a `rusqlite` backend with the `nova`, `keystone` and
//!   `cinder` schemas attached, used for local development and tests.
//!
//! [`Exporter`]: crate::Exporter

mod mysql;
mod row;
mod sqlite;

pub use mysql::{MySqlOptions, MySqlSession, DEFAULT_MYSQL_PORT};
pub use row::{Cell, Row};
pub use sqlite::{SqliteSession, OPENSTACK_SCHEMAS};

use async_trait::async_trait;

use crate::error::Result;

/// A connection capable of running a query and returning its rows.
#[async_trait]
pub trait Session: Send {
    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    /// Execute `sql` and return every row of the result set, in order.
    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>>;
}
