//! Conversion between core [`Value`]s and SQLite column values.
//!
//! UUIDs are stored as hyphenated lowercase strings and timestamps as
//! RFC 3339 strings. Reads are driven by the column's declared type.

use chrono::{DateTime, Utc};
use rusqlite::types::{Value as SqlValue, ValueRef};
use strata_core::{
  Value,
  schema::{Column, ColumnType},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Value ───────────────────────────────────────────────────────────────────

pub fn encode(value: &Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Integer(i) => SqlValue::Integer(*i),
    Value::Text(s) => SqlValue::Text(s.clone()),
    Value::Uuid(id) => SqlValue::Text(encode_uuid(*id)),
    Value::Float(f) => SqlValue::Real(*f),
    Value::DateTime(dt) => SqlValue::Text(encode_dt(*dt)),
  }
}

pub fn decode(column: &Column, raw: ValueRef<'_>) -> Result<Value> {
  let mismatch = || Error::ColumnType { column: column.name.clone(), found: type_name(raw) };

  let text = |bytes| std::str::from_utf8(bytes).map_err(|_| mismatch());

  Ok(match (column.column_type, raw) {
    (_, ValueRef::Null) => Value::Null,
    (ColumnType::Integer, ValueRef::Integer(i)) => Value::Integer(i),
    (ColumnType::Float, ValueRef::Real(f)) => Value::Float(f),
    (ColumnType::Float, ValueRef::Integer(i)) => Value::Float(i as f64),
    (ColumnType::VarChar(_), ValueRef::Text(b)) => Value::Text(text(b)?.to_owned()),
    (ColumnType::Uuid, ValueRef::Text(b)) => Value::Uuid(decode_uuid(text(b)?)?),
    (ColumnType::DateTime, ValueRef::Text(b)) => Value::DateTime(decode_dt(text(b)?)?),
    _ => return Err(mismatch()),
  })
}

fn type_name(raw: ValueRef<'_>) -> &'static str {
  match raw {
    ValueRef::Null => "NULL",
    ValueRef::Integer(_) => "INTEGER",
    ValueRef::Real(_) => "REAL",
    ValueRef::Text(_) => "TEXT",
    ValueRef::Blob(_) => "BLOB",
  }
}
