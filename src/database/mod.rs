//! Database boundary used by every collector.
//!
//! Collectors only see the [`Database`] trait. Result sets are materialised
//! into [`Rows`] by the implementation and the underlying cursor is closed
//! before the future resolves, so callers never manage row-set lifetimes.

use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub mod limit;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod oracle;

pub use self::limit::SessionLimit;
pub use self::oracle::{ConnectionSettings, OracleDatabase};

#[derive(Error, Debug, Clone)]
pub enum DatabaseError {
    #[error("failed to connect: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("database worker failed: {0}")]
    Worker(String),
}

/// A row-returning handle that can be shared by concurrent tasks.
pub trait Database: Send + Sync {
    fn query<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<Rows, DatabaseError>>;
}

/// A single decoded column value.
///
/// `Number` keeps the driver's textual rendering of an Oracle `NUMBER` and is
/// only turned into an integer or float by [`Value::sanitize`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Number(String),
}

impl Value {
    /// Replace a driver numeric wrapper with a plain integer or float.
    /// Unparseable numbers become strings.
    #[must_use]
    pub fn sanitize(self) -> Self {
        match self {
            Self::Number(raw) => {
                let trimmed = raw.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    Self::Int(i)
                } else if let Ok(f) = trimmed.parse::<f64>() {
                    Self::Float(f)
                } else {
                    Self::Str(raw)
                }
            }
            other => other,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_) | Self::Number(_))
    }

    /// Numeric view of the value. Strings holding a number are accepted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Number(s) | Self::Str(s) => s.trim().parse::<f64>().ok(),
            Self::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) | Self::Number(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// A fully fetched result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Rows {
    #[must_use]
    pub const fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched exactly first and then ignoring ASCII
    /// case (Oracle upper-cases unquoted aliases).
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// First column of the first row, if any.
    #[must_use]
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }
}

/// Collapse every run of whitespace into a single space for log output.
#[must_use]
pub fn normalize_query(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query() {
        let sql = "SELECT a,\n\t\tb\n   FROM   gv$instance ";
        assert_eq!(normalize_query(sql), "SELECT a, b FROM gv$instance");
    }

    #[test]
    fn test_sanitize_number() {
        assert_eq!(Value::Number("12".into()).sanitize(), Value::Int(12));
        assert_eq!(Value::Number("0.25".into()).sanitize(), Value::Float(0.25));
        assert_eq!(
            Value::Number("n/a".into()).sanitize(),
            Value::Str("n/a".into())
        );
        assert_eq!(Value::Str("12".into()).sanitize(), Value::Str("12".into()));
    }

    #[test]
    fn test_column_index_ignores_case() {
        let rows = Rows::new(
            vec!["INST_ID".into(), "PhysicalReads".into()],
            vec![vec![Value::Int(1), Value::Int(3)]],
        );
        assert_eq!(rows.column_index("INST_ID"), Some(0));
        assert_eq!(rows.column_index("inst_id"), Some(0));
        assert_eq!(rows.column_index("PhysicalReads"), Some(1));
        assert_eq!(rows.column_index("missing"), None);
    }

    #[test]
    fn test_rows_keep_result_order() {
        let rows = Rows::new(
            vec!["NAME".into(), "name".into()],
            vec![vec![Value::from("one"), Value::from("x")], vec![Value::from("two"), Value::from("y")]],
        );
        assert_eq!(rows.columns(), ["NAME".to_string(), "name".to_string()]);
        let first: Vec<_> = rows.iter().filter_map(|r| r.first()).collect();
        assert_eq!(first, vec![&Value::from("one"), &Value::from("two")]);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Int(5).to_string(), "5");
        assert_eq!(Value::Number("12345".into()).to_string(), "12345");
        assert_eq!(Value::Null.to_string(), "");
    }
}
