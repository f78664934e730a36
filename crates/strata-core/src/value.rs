//! Scalar types and the dynamic values exchanged with a storage engine.
//!
//! Domain objects reach the core as `serde_json` trees. A [`Value`] is what a
//! single column holds once the field's declared [`ScalarType`] has been
//! applied to the JSON leaf.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::{Error, Result};

// ─── ScalarType ──────────────────────────────────────────────────────────────

/// The declared type of a leaf field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
  Integer,
  Text,
  Uuid,
  Float,
  DateTime,
  Boolean,
  Date,
}

impl ScalarType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Integer => "integer",
      Self::Text => "text",
      Self::Uuid => "uuid",
      Self::Float => "float",
      Self::DateTime => "datetime",
      Self::Boolean => "boolean",
      Self::Date => "date",
    }
  }
}

impl fmt::Display for ScalarType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Value ───────────────────────────────────────────────────────────────────

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Integer(i64),
  Text(String),
  Uuid(Uuid),
  Float(f64),
  DateTime(DateTime<Utc>),
}

impl Value {
  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  /// Interpret a serialised domain leaf as a column value of type `scalar`.
  pub fn from_json(scalar: ScalarType, json: &Json, field: &str) -> Result<Self> {
    if json.is_null() {
      return Ok(Self::Null);
    }

    let mismatch = || Error::conversion(field, format!("expected {scalar}, found {json}"));

    match scalar {
      ScalarType::Integer => json.as_i64().map(Self::Integer).ok_or_else(mismatch),
      ScalarType::Text => json
        .as_str()
        .map(|s| Self::Text(s.to_owned()))
        .ok_or_else(mismatch),
      ScalarType::Uuid => {
        let s = json.as_str().ok_or_else(mismatch)?;
        Uuid::parse_str(s)
          .map(Self::Uuid)
          .map_err(|e| Error::conversion(field, e.to_string()))
      }
      ScalarType::Float => json.as_f64().map(Self::Float).ok_or_else(mismatch),
      ScalarType::DateTime => {
        let s = json.as_str().ok_or_else(mismatch)?;
        DateTime::parse_from_rfc3339(s)
          .map(|dt| Self::DateTime(dt.with_timezone(&Utc)))
          .map_err(|e| Error::conversion(field, e.to_string()))
      }
      ScalarType::Boolean | ScalarType::Date => Err(Error::conversion(
        field,
        format!("{scalar} values have no storage representation"),
      )),
    }
  }

  /// The JSON leaf a domain deserialiser expects for this value.
  pub fn into_json(self, field: &str) -> Result<Json> {
    Ok(match self {
      Self::Null => Json::Null,
      Self::Integer(i) => Json::from(i),
      Self::Text(s) => Json::String(s),
      Self::Uuid(id) => Json::String(id.hyphenated().to_string()),
      Self::Float(f) => serde_json::Number::from_f64(f)
        .map(Json::Number)
        .ok_or_else(|| Error::conversion(field, format!("{f} is not representable")))?,
      Self::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    })
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => f.write_str("NULL"),
      Self::Integer(i) => write!(f, "{i}"),
      Self::Text(s) => write!(f, "{s:?}"),
      Self::Uuid(id) => write!(f, "{id}"),
      Self::Float(x) => write!(f, "{x}"),
      Self::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
    }
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<i32> for Value {
  fn from(v: i32) -> Self { Self::Integer(v.into()) }
}

impl From<&str> for Value {
  fn from(v: &str) -> Self { Self::Text(v.to_owned()) }
}

impl From<String> for Value {
  fn from(v: String) -> Self { Self::Text(v) }
}

impl From<Uuid> for Value {
  fn from(v: Uuid) -> Self { Self::Uuid(v) }
}

impl From<f64> for Value {
  fn from(v: f64) -> Self { Self::Float(v) }
}

impl From<DateTime<Utc>> for Value {
  fn from(v: DateTime<Utc>) -> Self { Self::DateTime(v) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self { v.map_or(Self::Null, Into::into) }
}

/// Render a primary key for error messages.
pub(crate) fn display_key(key: &[Value]) -> String {
  key.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
}
