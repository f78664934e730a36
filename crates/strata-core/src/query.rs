//! Fetch specifications: one base table plus an eager join per nested entity.

use std::sync::Arc;

use crate::{
  Error, Result,
  aet::ComplexNode,
  schema::{Relationship, TableModel, Tables},
  visitor::{Visitor, unsupported_list},
};

/// Everything a storage engine needs to load an aggregate in one query.
///
/// Slot `0` is the base table; join `i` occupies slot `i + 1`. Joins are
/// ordered parent-first, so a join's `parent` slot always precedes it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchQuery {
  pub base:  Arc<TableModel>,
  pub joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
  /// Slot of the table this join hangs off.
  pub parent:       usize,
  pub relationship: Relationship,
  pub table:        Arc<TableModel>,
  /// Inner when the nested entity and every join above it is required.
  pub inner:        bool,
}

impl FetchQuery {
  /// The table occupying `slot`.
  pub fn table(&self, slot: usize) -> &TableModel {
    match slot {
      0 => &self.base,
      n => &self.joins[n - 1].table,
    }
  }

  /// Number of table slots (base plus joins).
  pub fn slots(&self) -> usize { self.joins.len() + 1 }
}

/// Builds a [`FetchQuery`] from a tree whose tables are already registered.
pub struct QueryVisitor<'r> {
  tables: &'r Tables,
  /// Table per slot, base first.
  slots:  Vec<Arc<TableModel>>,
  joins:  Vec<Join>,
  /// `(slot, inner)` of every open entity, innermost last.
  open:   Vec<(usize, bool)>,
}

impl<'r> QueryVisitor<'r> {
  pub fn new(tables: &'r Tables) -> Self {
    Self { tables, slots: Vec::new(), joins: Vec::new(), open: Vec::new() }
  }

  pub fn finish(self, root: &ComplexNode) -> Result<FetchQuery> {
    let base = self
      .slots
      .into_iter()
      .next()
      .ok_or(Error::NotRegistered { type_name: root.ty.name })?;
    Ok(FetchQuery { base, joins: self.joins })
  }
}

impl Visitor for QueryVisitor<'_> {
  fn visit_entity(&mut self, entity: &ComplexNode) -> Result<()> {
    let table = self
      .tables
      .get(&entity.ty.id())
      .cloned()
      .ok_or(Error::NotRegistered { type_name: entity.ty.name })?;

    let Some(&(parent, parent_inner)) = self.open.last() else {
      self.slots.push(table);
      self.open.push((0, true));
      return Ok(());
    };

    let relationship = self.slots[parent]
      .relationship(&entity.name)
      .cloned()
      .ok_or(Error::NotRegistered { type_name: entity.ty.name })?;

    let inner = parent_inner && !relationship.nullable;
    tracing::debug!(relationship = %relationship.name, inner, "added eager join");
    self.joins.push(Join { parent, relationship, table: table.clone(), inner });
    self.open.push((self.slots.len(), inner));
    self.slots.push(table);
    Ok(())
  }

  fn leave_entity(&mut self, _entity: &ComplexNode) -> Result<()> {
    self.open.pop();
    Ok(())
  }

  fn visit_list_of_entities(&mut self, list: &ComplexNode) -> Result<()> {
    Err(unsupported_list("list of entities", list))
  }

  fn visit_list_of_value_objects(&mut self, list: &ComplexNode) -> Result<()> {
    Err(unsupported_list("list of value objects", list))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    aet, entity,
    model::{Declared, Identity},
    schema::SchemaVisitor,
    value_object,
  };

  entity! {
    struct Country {
      code: Identity<String>,
    }
  }

  entity! {
    struct City {
      id:      Identity<i64>,
      country: Country,
    }
  }

  value_object! {
    struct Address {
      street: String,
    }
  }

  entity! {
    struct Warehouse {
      id:      Identity<i64>,
      address: Address,
      city:    Option<City>,
      backup:  Depot,
    }
  }

  entity! {
    struct Depot {
      id: Identity<i64>,
    }
  }

  fn query_for<T: Declared>() -> FetchQuery {
    let tree = aet::build::<T>().unwrap();
    let existing = Tables::new();
    let mut schema = SchemaVisitor::new(&existing);
    schema.traverse_from(tree.root()).unwrap();

    let tables: Tables = schema
      .finish()
      .into_iter()
      .map(|t| (t.entity.id(), Arc::new(t)))
      .collect();

    let mut visitor = QueryVisitor::new(&tables);
    visitor.traverse_from(tree.root()).unwrap();
    visitor.finish(tree.root_entity()).unwrap()
  }

  #[test]
  fn flat_entity_has_no_joins() {
    let query = query_for::<Country>();
    assert_eq!(query.base.table_name, "countries");
    assert!(query.joins.is_empty());
  }

  #[test]
  fn joins_follow_nesting_and_nullability() {
    let query = query_for::<Warehouse>();
    assert_eq!(query.base.table_name, "warehouses");

    let joins: Vec<(usize, &str, &str, bool)> = query
      .joins
      .iter()
      .map(|j| (j.parent, j.relationship.name.as_str(), j.table.table_name.as_str(), j.inner))
      .collect();

    // The country join sits below an optional city, so it must be outer too.
    assert_eq!(joins, [
      (0, "city", "cities", false),
      (1, "country", "countries", false),
      (0, "backup", "depots", true),
    ]);
    assert_eq!(query.slots(), 4);
    assert_eq!(query.table(2).table_name, "countries");
  }

  #[test]
  fn unregistered_tables_are_reported() {
    let tree = aet::build::<City>().unwrap();
    let tables = Tables::new();
    let mut visitor = QueryVisitor::new(&tables);

    let err = visitor.traverse_from(tree.root()).unwrap_err();
    assert!(matches!(err, Error::NotRegistered { type_name: "City" }));
  }
}
