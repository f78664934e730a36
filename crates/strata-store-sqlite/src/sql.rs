//! SQL text generated from table models and fetch queries.

use std::fmt::Write as _;

use strata_core::{
  query::FetchQuery,
  schema::{Column, ColumnType, TableModel},
};

use crate::{Error, Result};

pub fn quote(ident: &str) -> String { format!("\"{}\"", ident.replace('"', "\"\"")) }

fn column_type(column_type: ColumnType) -> String {
  match column_type {
    ColumnType::Integer => "INTEGER".to_owned(),
    ColumnType::VarChar(len) => format!("VARCHAR({len})"),
    ColumnType::Uuid => "TEXT".to_owned(),
    ColumnType::Float => "REAL".to_owned(),
    ColumnType::DateTime => "TEXT".to_owned(),
  }
}

fn primary_key(table: &TableModel) -> Result<Vec<&Column>> {
  let pk: Vec<&Column> = table.primary_key().collect();
  if pk.is_empty() {
    return Err(Error::MissingPrimaryKey { table: table.table_name.clone() });
  }
  Ok(pk)
}

fn column_list<'c>(columns: impl IntoIterator<Item = &'c Column>) -> String {
  columns
    .into_iter()
    .map(|c| quote(&c.name))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── DDL ─────────────────────────────────────────────────────────────────────

/// `CREATE TABLE IF NOT EXISTS` for `table`.
pub fn create_table(table: &TableModel) -> Result<String> {
  let mut lines: Vec<String> = table
    .columns
    .iter()
    .map(|c| {
      let null = if c.nullable { "" } else { " NOT NULL" };
      format!("  {} {}{null}", quote(&c.name), column_type(c.column_type))
    })
    .collect();

  lines.push(format!("  PRIMARY KEY ({})", column_list(primary_key(table)?)));

  for column in &table.columns {
    if let Some(fk) = &column.references {
      lines.push(format!(
        "  FOREIGN KEY ({}) REFERENCES {} ({})",
        quote(&column.name),
        quote(&fk.table),
        quote(&fk.column)
      ));
    }
  }

  Ok(format!(
    "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
    quote(&table.table_name),
    lines.join(",\n")
  ))
}

// ─── Writes ──────────────────────────────────────────────────────────────────

/// Upsert of one row, binding every column of `table` in declared order.
pub fn upsert(table: &TableModel) -> Result<String> {
  let pk = primary_key(table)?;
  let placeholders = (1..=table.columns.len())
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ");

  let updates: Vec<String> = table
    .columns
    .iter()
    .filter(|c| !c.primary_key)
    .map(|c| format!("{0} = excluded.{0}", quote(&c.name)))
    .collect();

  let action = if updates.is_empty() {
    "NOTHING".to_owned()
  } else {
    format!("UPDATE SET {}", updates.join(", "))
  };

  Ok(format!(
    "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT ({}) DO {action}",
    quote(&table.table_name),
    column_list(&table.columns),
    column_list(pk),
  ))
}

// ─── Reads ───────────────────────────────────────────────────────────────────

fn alias(slot: usize) -> String { format!("t{slot}") }

/// One `SELECT` over the base table and every join of `query`.
///
/// Columns come out slot by slot, each table's columns in declared order.
/// With `by_key`, the base table's primary key columns are bound as `?1..`.
pub fn select(query: &FetchQuery, by_key: bool) -> Result<String> {
  let columns: Vec<String> = (0..query.slots())
    .flat_map(move |slot| {
      query
        .table(slot)
        .columns
        .iter()
        .map(move |c| format!("{}.{}", alias(slot), quote(&c.name)))
    })
    .collect();

  let mut sql = format!(
    "SELECT {} FROM {} AS {}",
    columns.join(", "),
    quote(&query.base.table_name),
    alias(0)
  );

  for (i, join) in query.joins.iter().enumerate() {
    let kind = if join.inner { "INNER" } else { "LEFT" };
    let _ = write!(
      sql,
      " {kind} JOIN {table} AS {this} ON {this}.{target} = {parent}.{fk}",
      table = quote(&join.table.table_name),
      this = alias(i + 1),
      target = quote(&join.relationship.target_key),
      parent = alias(join.parent),
      fk = quote(&join.relationship.foreign_key),
    );
  }

  if by_key {
    let filter = primary_key(&query.base)?
      .iter()
      .enumerate()
      .map(|(i, c)| format!("{}.{} = ?{}", alias(0), quote(&c.name), i + 1))
      .collect::<Vec<_>>()
      .join(" AND ");
    let _ = write!(sql, " WHERE {filter}");
  }

  Ok(sql)
}
