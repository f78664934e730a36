//! The `Storage` trait: what the core needs from a relational engine.
//!
//! The trait is implemented by storage backends (e.g. `strata-store-sqlite`).
//! Repositories depend on this abstraction, not on any concrete backend.
//! Transaction boundaries belong to the implementation; the core never
//! commits or rolls back.

use crate::{query::FetchQuery, record::Record, schema::TableModel, value::Value};

/// A session with a relational storage engine.
pub trait Storage {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Schema sink ───────────────────────────────────────────────────────

  /// Make `table` queryable. Called for every table of an aggregate, nested
  /// tables first; must be a no-op for tables that already exist.
  fn materialize(&mut self, table: &TableModel) -> Result<(), Self::Error>;

  // ── Query sink ────────────────────────────────────────────────────────

  /// Run `query` filtered by the base table's primary key, in declared
  /// column order. Nested records are attached by relationship name.
  fn fetch_one(&mut self, query: &FetchQuery, key: &[Value])
  -> Result<Option<Record>, Self::Error>;

  /// Run `query` unfiltered.
  fn fetch_all(&mut self, query: &FetchQuery) -> Result<Vec<Record>, Self::Error>;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert or update `record` and its nested records by primary key.
  fn merge(&mut self, record: Record) -> Result<(), Self::Error>;

  /// Make every merge so far visible to subsequent reads in this session.
  fn flush(&mut self) -> Result<(), Self::Error>;
}
