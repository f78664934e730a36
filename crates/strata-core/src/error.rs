//! Error types for `strata-core`.

use thiserror::Error;

use crate::value::ScalarType;

#[derive(Debug, Error)]
pub enum Error {
  // ── Declaration-time shape errors ──────────────────────────────────────

  #[error("entity {type_name} declares no identity field")]
  EntityWithoutIdentity { type_name: &'static str },

  #[error("value object {type_name} declares identity field {field:?}")]
  ValueObjectWithIdentity {
    type_name: &'static str,
    field:     &'static str,
  },

  #[error("value object {value_object} nests entity {entity} in field {field:?}")]
  EntityNestedInValueObject {
    value_object: &'static str,
    field:        &'static str,
    entity:       &'static str,
  },

  #[error("aggregate root {type_name} must be an entity")]
  RootNotEntity { type_name: &'static str },

  #[error("unhandled shape {shape} for field {field:?}")]
  UnhandledFieldShape { field: String, shape: String },

  #[error("no storage type for {scalar} column {column:?}")]
  UnsupportedStorageType { column: String, scalar: ScalarType },

  /// Nested entities are joined through a single foreign-key column, so they
  /// need exactly one identity field.
  #[error(
    "nested entity {type_name} has {count} identity fields; multiple identity \
     fields not supported for nested entities"
  )]
  NestedIdentity { type_name: &'static str, count: usize },

  #[error("column {column:?} is produced twice in table {table}")]
  DuplicateColumn { table: String, column: String },

  #[error("{type_name} appears as its own descendant; recursive nesting is not supported")]
  RecursiveNesting { type_name: &'static str },

  #[error("entity {type_name} is already materialized by another aggregate")]
  DuplicateMaterialization { type_name: &'static str },

  // ── Unsupported features ───────────────────────────────────────────────

  #[error("{kind} node {name:?} is not supported")]
  Unsupported { kind: &'static str, name: String },

  // ── Runtime ────────────────────────────────────────────────────────────

  #[error("type {type_name} is not registered")]
  NotRegistered { type_name: &'static str },

  #[error("{type_name} not found: {key}")]
  NotFound { type_name: &'static str, key: String },

  #[error("{type_name} has {expected} primary key columns, got {got} values")]
  KeyArity {
    type_name: &'static str,
    expected:  usize,
    got:       usize,
  },

  #[error("cannot convert field {field:?}: {reason}")]
  Conversion { field: String, reason: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn storage<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(err))
  }

  pub(crate) fn conversion(field: impl Into<String>, reason: impl Into<String>) -> Self {
    Self::Conversion { field: field.into(), reason: reason.into() }
  }

  /// `true` for the expected "no row for this key" outcome of a fetch.
  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
