//! Loosely-typed SQL values and field maps.
//!
//! Sync and export build their statements as column-name → value maps, so
//! the store can assemble parameterized SQL without knowing each table's
//! shape. Ordering is fixed by BTreeMap iteration, which keeps generated
//! statements deterministic.

use std::collections::BTreeMap;

use rusqlite::types::{ToSqlOutput, Value as RusqliteValue, ValueRef};
use rusqlite::ToSql;

/// A single SQL cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Real(f64),
    Null,
}

impl SqlValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Int(n) => ToSqlOutput::Owned(RusqliteValue::Integer(*n)),
            SqlValue::Real(f) => ToSqlOutput::Owned(RusqliteValue::Real(*f)),
            SqlValue::Null => ToSqlOutput::Owned(RusqliteValue::Null),
        })
    }
}

impl From<RusqliteValue> for SqlValue {
    fn from(value: RusqliteValue) -> Self {
        match value {
            RusqliteValue::Text(s) => SqlValue::Text(s),
            RusqliteValue::Integer(n) => SqlValue::Int(n),
            RusqliteValue::Real(f) => SqlValue::Real(f),
            RusqliteValue::Null => SqlValue::Null,
            RusqliteValue::Blob(b) => SqlValue::Text(String::from_utf8_lossy(&b).into_owned()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(n: i64) -> Self {
        SqlValue::Int(n)
    }
}

impl From<f64> for SqlValue {
    fn from(f: f64) -> Self {
        SqlValue::Real(f)
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Int(b as i64)
    }
}

/// Column-name → value map for one statement (insert values, update set,
/// or match predicates).
pub type FieldMap = BTreeMap<String, SqlValue>;

/// One row of select results, keyed by column name.
pub type Row = BTreeMap<String, SqlValue>;

/// Backslash-escape `"` and `%` in text. Applied to every text value as it
/// crosses the store boundary; readers strip the backslashes back out.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '"' || c == '%' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Apply [`escape_text`] to every text value in a field map.
pub fn escape_fields(fields: &FieldMap) -> FieldMap {
    fields
        .iter()
        .map(|(k, v)| {
            let v = match v {
                SqlValue::Text(s) => SqlValue::Text(escape_text(s)),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}
