//! [`SqliteSession`]: the SQLite implementation of [`Storage`].

use std::{collections::HashMap, time::Duration};

use rusqlite::{Connection, params_from_iter};
use strata_core::{
  Record, Value,
  query::FetchQuery,
  schema::TableModel,
  store::Storage,
};

use crate::{
  Error, Result, SqliteConfig,
  encode::{decode, encode},
  sql,
};

// ─── Session ─────────────────────────────────────────────────────────────────

/// One SQLite connection plus the merges waiting for the next flush.
///
/// The first flush opens a transaction that stays open until
/// [`commit`](Self::commit) or [`rollback`](Self::rollback); reads through
/// the same session see flushed rows before they are committed. Dropping an
/// uncommitted session discards its writes.
pub struct SqliteSession {
  conn:    Connection,
  tables:  HashMap<String, TableModel>,
  pending: Vec<Record>,
}

impl SqliteSession {
  /// Open the database described by `cfg`.
  pub fn open(cfg: &SqliteConfig) -> Result<Self> {
    let conn = match &cfg.path {
      Some(path) => Connection::open(path)?,
      None => Connection::open_in_memory()?,
    };
    conn.pragma_update(None, "foreign_keys", cfg.foreign_keys)?;
    conn.busy_timeout(Duration::from_millis(cfg.busy_timeout_ms))?;

    tracing::debug!(path = ?cfg.path, "opened sqlite session");
    Ok(Self { conn, tables: HashMap::new(), pending: Vec::new() })
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self> { Self::open(&SqliteConfig::in_memory()) }

  pub fn connection(&self) -> &Connection { &self.conn }

  /// Commit everything flushed so far.
  pub fn commit(&mut self) -> Result<()> {
    if !self.conn.is_autocommit() {
      self.conn.execute_batch("COMMIT")?;
      tracing::debug!("committed");
    }
    Ok(())
  }

  /// Discard pending merges and everything flushed since the last commit.
  pub fn rollback(&mut self) -> Result<()> {
    self.pending.clear();
    if !self.conn.is_autocommit() {
      self.conn.execute_batch("ROLLBACK")?;
      tracing::debug!("rolled back");
    }
    Ok(())
  }

  fn model(&self, table: &str) -> Result<&TableModel> {
    self
      .tables
      .get(table)
      .ok_or_else(|| Error::UnknownTable(table.to_owned()))
  }

  /// Upsert `record`, nested records first so foreign keys resolve.
  fn write(&self, record: &Record) -> Result<()> {
    for (_, nested) in record.relations() {
      if let Some(nested) = nested {
        self.write(nested)?;
      }
    }

    let model = self.model(record.table())?;
    let sql = sql::upsert(model)?;
    tracing::trace!(%sql, "upsert");

    let values = model.columns.iter().map(|c| encode(record.get(&c.name)));
    self.conn.prepare_cached(&sql)?.execute(params_from_iter(values))?;
    Ok(())
  }

  fn fetch(&self, query: &FetchQuery, key: Option<&[Value]>) -> Result<Vec<Record>> {
    for slot in 0..query.slots() {
      self.model(&query.table(slot).table_name)?;
    }

    let sql = sql::select(query, key.is_some())?;
    tracing::trace!(%sql, "select");

    let params = key.unwrap_or_default().iter().map(encode);
    let mut stmt = self.conn.prepare_cached(&sql)?;
    let mut rows = stmt.query(params_from_iter(params))?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
      records.push(assemble(query, row)?);
    }
    Ok(records)
  }
}

/// Split one joined row into per-slot records and nest them.
fn assemble(query: &FetchQuery, row: &rusqlite::Row<'_>) -> Result<Record> {
  let mut slots: Vec<Option<Record>> = Vec::with_capacity(query.slots());
  let mut index = 0;

  for slot in 0..query.slots() {
    let table = query.table(slot);
    let mut record = Record::new(&table.table_name);
    for column in &table.columns {
      record.set(&column.name, decode(column, row.get_ref(index)?)?);
      index += 1;
    }

    // An outer join that matched nothing yields a NULL key.
    let absent = slot > 0 && table.primary_key().all(|c| record.get(&c.name).is_null());
    slots.push((!absent).then_some(record));
  }

  for (i, join) in query.joins.iter().enumerate().rev() {
    let nested = slots[i + 1].take();
    if let Some(parent) = slots[join.parent].as_mut() {
      parent.relate(&join.relationship.name, nested);
    }
  }

  slots
    .swap_remove(0)
    .ok_or_else(|| Error::MissingPrimaryKey { table: query.base.table_name.clone() })
}

impl Storage for SqliteSession {
  type Error = Error;

  fn materialize(&mut self, table: &TableModel) -> Result<()> {
    if self.tables.contains_key(&table.table_name) {
      return Ok(());
    }

    let ddl = sql::create_table(table)?;
    tracing::trace!(sql = %ddl, "create table");
    self.conn.execute_batch(&ddl)?;

    tracing::debug!(table = %table.table_name, "materialized table");
    self.tables.insert(table.table_name.clone(), table.clone());
    Ok(())
  }

  fn fetch_one(&mut self, query: &FetchQuery, key: &[Value]) -> Result<Option<Record>> {
    self.flush()?;
    Ok(self.fetch(query, Some(key))?.into_iter().next())
  }

  fn fetch_all(&mut self, query: &FetchQuery) -> Result<Vec<Record>> {
    self.flush()?;
    self.fetch(query, None)
  }

  fn merge(&mut self, record: Record) -> Result<()> {
    self.model(record.table())?;
    self.pending.push(record);
    Ok(())
  }

  fn flush(&mut self) -> Result<()> {
    if self.pending.is_empty() {
      return Ok(());
    }
    if self.conn.is_autocommit() {
      self.conn.execute_batch("BEGIN")?;
    }

    let mut pending = std::mem::take(&mut self.pending).into_iter();
    while let Some(record) = pending.next() {
      if let Err(err) = self.write(&record) {
        // Keep the failed record and the rest queued; `rollback` drops them.
        self.pending = std::iter::once(record).chain(pending).collect();
        return Err(err);
      }
    }
    tracing::debug!("flushed pending merges");
    Ok(())
  }
}
