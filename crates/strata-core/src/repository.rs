//! Repositories: `get` and `save` for one aggregate root type.

use std::{marker::PhantomData, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
  Error, Result,
  aet::AbstractEntityTree,
  dump, load,
  model::Declared,
  registry::Registry,
  store::Storage,
  value::{Value, display_key},
};

/// A declared root entity that can cross the serde boundary.
pub trait Aggregate: Declared + Serialize + DeserializeOwned {}

impl<T: Declared + Serialize + DeserializeOwned> Aggregate for T {}

/// Loading aggregates by identity.
pub trait ReadOnlyRepository<A: Aggregate> {
  /// Load the aggregate whose primary key columns equal `key`, in declared
  /// identity order. A missing row is [`Error::NotFound`].
  fn get_by_key(&mut self, key: &[Value]) -> Result<A>;

  /// [`get_by_key`](Self::get_by_key) for single-identity aggregates.
  fn get(&mut self, identity: impl Into<Value>) -> Result<A> {
    self.get_by_key(&[identity.into()])
  }
}

/// Loading and persisting aggregates.
pub trait WriteRepository<A: Aggregate>: ReadOnlyRepository<A> {
  /// Upsert `aggregate` and its nested entities, then flush.
  fn save(&mut self, aggregate: &A) -> Result<()>;
}

/// The repository for aggregate root `A` over one storage session.
///
/// Construction registers `A` and materializes its tables. The session is
/// borrowed for the repository's lifetime; committing it is the caller's
/// business.
pub struct Repository<'a, A, S> {
  registry: &'a Registry,
  session:  &'a mut S,
  tree:     Arc<AbstractEntityTree>,
  _root:    PhantomData<fn() -> A>,
}

impl<'a, A: Aggregate, S: Storage> Repository<'a, A, S> {
  pub fn new(registry: &'a Registry, session: &'a mut S) -> Result<Self> {
    let tree = registry.register::<A>()?;
    for table in registry.tables_for(&tree)? {
      session.materialize(&table).map_err(Error::storage)?;
    }
    Ok(Self { registry, session, tree, _root: PhantomData })
  }

  pub fn tree(&self) -> &AbstractEntityTree { &self.tree }

  /// Load every stored aggregate.
  pub fn all(&mut self) -> Result<Vec<A>> {
    let query = self.registry.query::<A>()?;
    let records = self.session.fetch_all(&query).map_err(Error::storage)?;
    records
      .iter()
      .map(|record| load::into_aggregate(&self.tree, record))
      .collect()
  }
}

impl<A: Aggregate, S: Storage> ReadOnlyRepository<A> for Repository<'_, A, S> {
  #[tracing::instrument(skip(self), fields(aggregate = A::NAME))]
  fn get_by_key(&mut self, key: &[Value]) -> Result<A> {
    let expected = self.tree.root_entity().identity_fields().count();
    if key.len() != expected {
      return Err(Error::KeyArity { type_name: A::NAME, expected, got: key.len() });
    }

    let query = self.registry.query::<A>()?;
    let record = self
      .session
      .fetch_one(&query, key)
      .map_err(Error::storage)?
      .ok_or_else(|| Error::NotFound { type_name: A::NAME, key: display_key(key) })?;

    load::into_aggregate(&self.tree, &record)
  }
}

impl<A: Aggregate, S: Storage> WriteRepository<A> for Repository<'_, A, S> {
  #[tracing::instrument(skip_all, fields(aggregate = A::NAME))]
  fn save(&mut self, aggregate: &A) -> Result<()> {
    let record = dump::dump(&self.tree, aggregate)?;
    self.session.merge(record).map_err(Error::storage)?;
    self.session.flush().map_err(Error::storage)?;
    tracing::debug!("saved aggregate");
    Ok(())
  }
}
