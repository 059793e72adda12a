//! SQLite backend built on `rusqlite`.
//!
//! The OpenStack services keep their tables in separate schemas. SQLite models
//! that with attached databases, one per schema, so the same schema-qualified
//! SQL runs unchanged against both backends.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::{Type, ValueRef};
use rusqlite::Connection;
use tracing::{debug, info};

use super::row::{Cell, Row};
use super::Session;
use crate::error::{Error, Result};

/// Schemas the collectors query.
pub const OPENSTACK_SCHEMAS: [&str; 3] = ["nova", "keystone", "cinder"];

/// A SQLite connection with the OpenStack schemas attached.
///
/// Queries run on the blocking thread pool, so a collector timeout stops
/// waiting for them even though SQLite itself cannot be cancelled mid-query.
pub struct SqliteSession {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSession {
    /// Open a session over a directory holding `nova.db`, `keystone.db` and `cinder.db`.
    ///
    /// Missing files are created empty.
    pub fn open_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let conn = Connection::open_in_memory()?;
        for schema in OPENSTACK_SCHEMAS {
            let file = dir.join(format!("{schema}.db"));
            conn.execute(
                &format!("ATTACH DATABASE ?1 AS {schema}"),
                [file.to_string_lossy().as_ref()],
            )?;
        }

        info!(path = %dir.display(), "opened SQLite schemas");
        Ok(Self::from_connection(conn))
    }

    /// Open a session whose schemas all live in memory.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        for schema in OPENSTACK_SCHEMAS {
            conn.execute_batch(&format!("ATTACH DATABASE ':memory:' AS {schema};"))?;
        }
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Lock the underlying connection, e.g. to load fixtures.
    ///
    /// Blocks while a query is still running on the blocking pool.
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

#[async_trait]
impl Session for SqliteSession {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch_all(&mut self, sql: &str) -> Result<Vec<Row>> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let rows = tokio::task::spawn_blocking(move || fetch_rows(&conn.lock(), &sql))
            .await
            .map_err(|e| Error::Query(format!("sqlite query task failed: {e}")))??;
        debug!(rows = rows.len(), "sqlite query returned");
        Ok(rows)
    }
}

fn fetch_rows(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            let cell = match row.get_ref(idx)? {
                ValueRef::Null => Cell::Null,
                ValueRef::Integer(v) => Cell::Int(v),
                ValueRef::Real(v) => Cell::Float(v),
                ValueRef::Text(v) => Cell::Text(String::from_utf8_lossy(v).into_owned()),
                ValueRef::Blob(_) => {
                    return Err(rusqlite::Error::InvalidColumnType(idx, name.clone(), Type::Blob))
                }
            };
            cells.push(cell);
        }
        out.push(Row::new(cells));
    }
    Ok(out)
}
