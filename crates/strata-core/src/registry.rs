//! Per-application cache of trees, tables and fetch queries by root type.
//!
//! A [`Registry`] is created once and shared (by reference or `Arc`) with
//! every repository. Registration of a type happens on first use, under a
//! lock, so concurrent first use of the same type builds it exactly once.
//! A registration that fails leaves nothing behind.

use std::{
  any::TypeId,
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
  Error, Result,
  aet::{self, AbstractEntityTree, Node},
  model::{Declared, TypeRef},
  query::{FetchQuery, QueryVisitor},
  schema::{SchemaVisitor, TableModel, Tables},
  visitor::Visitor as _,
};

#[derive(Debug, Default)]
pub struct Registry {
  inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
  trees:   HashMap<TypeId, Arc<AbstractEntityTree>>,
  tables:  Tables,
  queries: HashMap<TypeId, Arc<FetchQuery>>,
}

impl Registry {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, Inner> {
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Build and cache the tree and tables of aggregate root `T`.
  ///
  /// Idempotent: later calls return the cached tree.
  pub fn register<T: Declared>(&self) -> Result<Arc<AbstractEntityTree>> {
    self.lock().register(TypeRef::of::<T>())
  }

  pub fn is_registered<T: Declared>(&self) -> bool {
    self.lock().trees.contains_key(&TypeId::of::<T>())
  }

  pub fn tree<T: Declared>(&self) -> Option<Arc<AbstractEntityTree>> {
    self.lock().trees.get(&TypeId::of::<T>()).cloned()
  }

  /// The table storing entity `T`, whether root or nested.
  pub fn table<T: Declared>(&self) -> Option<Arc<TableModel>> {
    self.lock().tables.get(&TypeId::of::<T>()).cloned()
  }

  /// Every table of `tree`, nested tables before the tables referencing
  /// them.
  pub fn tables_for(&self, tree: &AbstractEntityTree) -> Result<Vec<Arc<TableModel>>> {
    let inner = self.lock();
    let mut tables = tree
      .iter()
      .filter_map(|node| match node {
        Node::Entity(entity) => Some(entity.ty),
        _ => None,
      })
      .map(|ty| {
        inner
          .tables
          .get(&ty.id())
          .cloned()
          .ok_or(Error::NotRegistered { type_name: ty.name })
      })
      .collect::<Result<Vec<_>>>()?;

    tables.reverse();
    Ok(tables)
  }

  /// The fetch query for aggregate root `T`, registering `T` if needed.
  pub fn query<T: Declared>(&self) -> Result<Arc<FetchQuery>> {
    let mut inner = self.lock();
    let root = TypeRef::of::<T>();
    if let Some(query) = inner.queries.get(&root.id()) {
      return Ok(query.clone());
    }

    let tree = inner.register(root)?;
    let mut visitor = QueryVisitor::new(&inner.tables);
    visitor.traverse_from(tree.root())?;
    let query = Arc::new(visitor.finish(tree.root_entity())?);

    tracing::debug!(root = root.name, joins = query.joins.len(), "constructed fetch query");
    inner.queries.insert(root.id(), query.clone());
    Ok(query)
  }
}

impl Inner {
  fn register(&mut self, root: TypeRef) -> Result<Arc<AbstractEntityTree>> {
    if let Some(tree) = self.trees.get(&root.id()) {
      return Ok(tree.clone());
    }

    let tree = Arc::new(aet::build_from(root)?);
    let mut schema = SchemaVisitor::new(&self.tables);
    schema.traverse_from(tree.root())?;
    let tables = schema.finish();

    tracing::info!(
      root = root.name,
      tables = ?tables.iter().map(|t| t.table_name.as_str()).collect::<Vec<_>>(),
      "registered aggregate"
    );

    for table in tables {
      self.tables.insert(table.entity.id(), Arc::new(table));
    }
    self.trees.insert(root.id(), tree.clone());
    Ok(tree)
  }
}
