//! Core error types.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while talking to the database or building metrics.
#[derive(Debug, Error)]
pub enum Error {
    /// Could not establish or use the database connection.
    #[error("connection error: {0}")]
    Connection(String),

    /// Query execution failed.
    #[error("query error: {0}")]
    Query(String),

    /// A result row could not be decoded.
    #[error("decode error in column {column}: {reason}")]
    Decode {
        /// Zero-based column index.
        column: usize,
        /// What went wrong.
        reason: String,
    },

    /// A collector's populate step exceeded its deadline.
    #[error("collector {collector} timed out after {elapsed:?}")]
    Timeout {
        /// Collector name.
        collector: &'static str,
        /// The configured deadline.
        elapsed: Duration,
    },

    /// Metric construction or encoding error.
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl Error {
    /// Build a decode error for the given column.
    pub fn decode(column: usize, reason: impl Into<String>) -> Self {
        Error::Decode {
            column,
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { index, source } => Error::Decode {
                column: index.parse().unwrap_or_default(),
                reason: source.to_string(),
            },
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
                Error::Connection(err.to_string())
            }
            other => Error::Query(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::InvalidColumnIndex(column) => {
                Error::decode(column, "column index out of range")
            }
            rusqlite::Error::InvalidColumnType(column, name, ty) => {
                Error::decode(column, format!("unexpected type {ty} for column {name}"))
            }
            other => Error::Query(other.to_string()),
        }
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
