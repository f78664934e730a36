//! The flat storage representation of one entity and its nested entities.

use std::collections::BTreeMap;

use crate::value::Value;

/// One table row, plus the rows of nested entities keyed by relationship
/// name. A relationship mapped to `None` means the nested entity is absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
  table:     String,
  columns:   BTreeMap<String, Value>,
  relations: BTreeMap<String, Option<Record>>,
}

impl Record {
  pub fn new(table: impl Into<String>) -> Self {
    Self { table: table.into(), ..Self::default() }
  }

  pub fn table(&self) -> &str { &self.table }

  /// A column's value; columns never set read as `NULL`.
  pub fn get(&self, column: &str) -> &Value {
    self.columns.get(column).unwrap_or(&Value::Null)
  }

  pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
    self.columns.insert(column.into(), value.into());
  }

  pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
    self.set(column, value);
    self
  }

  /// The nested record joined under `name`, if present.
  pub fn relation(&self, name: &str) -> Option<&Record> {
    self.relations.get(name).and_then(Option::as_ref)
  }

  pub fn relate(&mut self, name: impl Into<String>, record: Option<Record>) {
    self.relations.insert(name.into(), record);
  }

  pub fn columns(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.columns.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn relations(&self) -> impl Iterator<Item = (&str, Option<&Record>)> {
    self.relations.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
  }
}
