//! Error type for `strata-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] strata_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("configuration error: {0}")]
  Config(#[from] config::ConfigError),

  /// Upserts and keyed fetches need a primary key to target.
  #[error("table {table} has no primary key")]
  MissingPrimaryKey { table: String },

  #[error("column {column:?} holds {found}, which does not fit its declared type")]
  ColumnType { column: String, found: &'static str },

  #[error("table {0} has not been materialized in this session")]
  UnknownTable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
