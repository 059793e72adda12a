//! MySQL backend built on `sqlx`.

use std::fmt;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{Column, ConnectOptions, Row as _, TypeInfo};
use tracing::{debug, info};

use super::row::{Cell, Row};
use super::Session;
use crate::error::{Error, Result};

/// Default MySQL port.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

const DECIMAL_TYPE: &str = "DECIMAL";

/// Connection parameters for the OpenStack database server.
///
/// No default schema is selected; every query names its schema
/// (`nova.instances`, `keystone.project`, ...).
#[derive(Clone)]
pub struct MySqlOptions {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// User name.
    pub username: String,
    /// Password (may be empty).
    pub password: String,
}

impl MySqlOptions {
    /// Create options for the given host with the default port and no credentials.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_MYSQL_PORT,
            username: String::new(),
            password: String::new(),
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the user name and password.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        options
    }
}

impl fmt::Debug for MySqlOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A single MySQL connection.
pub struct MySqlSession {
    conn: MySqlConnection,
}

impl MySqlSession {
    /// Open a connection to the database server.
    pub async fn connect(options: &MySqlOptions) -> Result<Self> {
        Self::connect_with(options.connect_options()).await
    }

    /// Open a connection from prepared sqlx options, e.g. parsed from a
    /// `mysql://` URL.
    pub async fn connect_with(options: MySqlConnectOptions) -> Result<Self> {
        let conn = options
            .connect()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        info!(
            host = %options.get_host(),
            port = options.get_port(),
            "connected to MySQL"
        );
        Ok(Self { conn })
    }
}

#[async_trait]
impl Session for MySqlSession {
    fn backend(&self) -> &'static str {
        "mysql"
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>> {
        let rows = sqlx::query(sql).fetch_all(&mut self.conn).await?;
        debug!(rows = rows.len(), "mysql query returned");
        rows.iter().map(decode_row).collect()
    }
}

fn decode_row(row: &MySqlRow) -> Result<Row> {
    (0..row.len())
        .map(|idx| decode_cell(row, idx))
        .collect::<Result<Vec<_>>>()
        .map(Row::new)
}

/// Decode one column by trying the Rust types sqlx can produce for it.
///
/// NULL passes the first attempt regardless of column type.
fn decode_cell(row: &MySqlRow, idx: usize) -> Result<Cell> {
    if let Ok(value) = row.try_get::<Option<i64>, _>(idx) {
        return Ok(value.into());
    }
    if let Ok(value) = row.try_get::<Option<u64>, _>(idx) {
        return Ok(match value {
            Some(v) => i64::try_from(v).map_or(Cell::Float(v as f64), Cell::Int),
            None => Cell::Null,
        });
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(idx) {
        return Ok(value.into());
    }
    if let Ok(value) = row.try_get::<Option<f32>, _>(idx) {
        return Ok(value.map(f64::from).into());
    }
    if let Ok(value) = row.try_get::<Option<String>, _>(idx) {
        return Ok(value.into());
    }

    let type_name = row.column(idx).type_info().name();
    if type_name == DECIMAL_TYPE {
        // DECIMAL travels as text on the wire.
        let value = row.try_get_unchecked::<Option<String>, _>(idx)?;
        return Ok(value.into());
    }
    Err(Error::decode(idx, format!("unsupported column type {type_name}")))
}
