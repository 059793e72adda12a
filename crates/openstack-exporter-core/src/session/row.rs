//! Backend-neutral result rows.

use crate::error::{Error, Result};

/// A single decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// SQL NULL.
    Null,
    /// Any integer column.
    Int(i64),
    /// Any floating point column.
    Float(f64),
    /// Character data.
    Text(String),
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map_or(Cell::Null, Into::into)
    }
}

/// One row of a result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<Cell>,
}

impl Row {
    /// Create a row from its cells.
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Get a cell by column index.
    pub fn get(&self, idx: usize) -> Result<&Cell> {
        self.cells
            .get(idx)
            .ok_or_else(|| Error::decode(idx, format!("row has only {} columns", self.len())))
    }

    /// Read a numeric column as `f64`, treating NULL as zero.
    ///
    /// Aggregates such as `SUM` over an empty or all-NULL group come back as
    /// NULL; those are reported as 0. Numeric text (DECIMAL columns on some
    /// drivers) is parsed.
    pub fn f64_or_zero(&self, idx: usize) -> Result<f64> {
        match self.get(idx)? {
            Cell::Null => Ok(0.0),
            Cell::Int(v) => Ok(*v as f64),
            Cell::Float(v) => Ok(*v),
            Cell::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| Error::decode(idx, format!("expected a number, got {s:?}"))),
        }
    }

    /// Read a text column.
    pub fn text(&self, idx: usize) -> Result<&str> {
        match self.get(idx)? {
            Cell::Text(s) => Ok(s),
            Cell::Null => Err(Error::decode(idx, "expected text, got NULL")),
            other => Err(Error::decode(idx, format!("expected text, got {other:?}"))),
        }
    }
}

impl From<Vec<Cell>> for Row {
    fn from(cells: Vec<Cell>) -> Self {
        Self::new(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_accessors() {
        let row = Row::new(vec![
            Cell::Int(3),
            Cell::Float(12.5),
            Cell::Null,
            Cell::from("4096.00"),
        ]);

        assert_eq!(row.f64_or_zero(0).unwrap(), 3.0);
        assert_eq!(row.f64_or_zero(1).unwrap(), 12.5);
        assert_eq!(row.f64_or_zero(2).unwrap(), 0.0);
        assert_eq!(row.f64_or_zero(3).unwrap(), 4096.0);
    }

    #[test]
    fn test_non_numeric_text_is_decode_error() {
        let row = Row::new(vec![Cell::from("alpha")]);
        let err = row.f64_or_zero(0).unwrap_err();
        assert!(matches!(err, Error::Decode { column: 0, .. }));
    }

    #[test]
    fn test_text_accessor() {
        let row = Row::new(vec![Cell::from("alpha"), Cell::Null, Cell::Int(1)]);

        assert_eq!(row.text(0).unwrap(), "alpha");
        assert!(row.text(1).is_err());
        assert!(row.text(2).is_err());
    }

    #[test]
    fn test_out_of_range_column() {
        let row = Row::new(vec![Cell::Int(1)]);
        assert!(matches!(
            row.f64_or_zero(4),
            Err(Error::Decode { column: 4, .. })
        ));
        assert!(row.text(1).is_err());
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Cell::from(None::<i64>), Cell::Null);
        assert_eq!(Cell::from(Some(5i64)), Cell::Int(5));
    }
}
