//! Storage table definitions and the visitor that derives them from a tree.
//!
//! Every entity (root or nested) becomes one [`TableModel`]. Value objects
//! have no table: their fields are flattened into the enclosing entity's
//! table with the value object's name as a column prefix. A nested entity is
//! linked to its parent through a foreign-key column on the parent's table
//! and a named [`Relationship`].

use std::{
  any::TypeId,
  collections::{HashMap, HashSet},
  sync::Arc,
};

use crate::{
  Error, Result,
  aet::{ComplexNode, FieldNode},
  model::TypeRef,
  naming,
  value::ScalarType,
  visitor::{Visitor, unsupported_list},
};

/// Bound length of short string columns.
pub const SHORT_TEXT_LEN: u32 = 255;

/// Materialized tables by the entity type they store.
pub type Tables = HashMap<TypeId, Arc<TableModel>>;

// ─── Table definitions ───────────────────────────────────────────────────────

/// Storage column types; a closed mapping from [`ScalarType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  Integer,
  VarChar(u32),
  Uuid,
  Float,
  DateTime,
}

impl ColumnType {
  pub fn for_scalar(scalar: ScalarType) -> Option<Self> {
    match scalar {
      ScalarType::Integer => Some(Self::Integer),
      ScalarType::Text => Some(Self::VarChar(SHORT_TEXT_LEN)),
      ScalarType::Uuid => Some(Self::Uuid),
      ScalarType::Float => Some(Self::Float),
      ScalarType::DateTime => Some(Self::DateTime),
      ScalarType::Boolean | ScalarType::Date => None,
    }
  }

  fn resolve(scalar: ScalarType, column: &str) -> Result<Self> {
    Self::for_scalar(scalar)
      .ok_or_else(|| Error::UnsupportedStorageType { column: column.to_owned(), scalar })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
  pub table:  String,
  pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
  pub name:        String,
  pub column_type: ColumnType,
  pub nullable:    bool,
  pub primary_key: bool,
  pub references:  Option<ForeignKey>,
}

/// A named link from this table to a nested entity's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
  /// The nested entity's field name; also the name its record is joined as.
  pub name:         String,
  pub target_table: String,
  /// Column on this table holding the nested entity's identity.
  pub foreign_key:  String,
  /// Identity column on the target table.
  pub target_key:   String,
  /// Absent nested entities are allowed; the join must be an outer one.
  pub nullable:     bool,
}

/// One entity's storage model.
#[derive(Debug, Clone, PartialEq)]
pub struct TableModel {
  pub model_name:    String,
  pub table_name:    String,
  pub entity:        TypeRef,
  pub columns:       Vec<Column>,
  pub relationships: Vec<Relationship>,
}

impl TableModel {
  fn for_entity(entity: TypeRef) -> Self {
    Self {
      model_name: format!("{}Model", entity.name),
      table_name: naming::table_name(entity.name),
      entity,
      columns: Vec::new(),
      relationships: Vec::new(),
    }
  }

  pub fn column(&self, name: &str) -> Option<&Column> {
    self.columns.iter().find(|c| c.name == name)
  }

  pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
    self.columns.iter().filter(|c| c.primary_key)
  }

  pub fn relationship(&self, name: &str) -> Option<&Relationship> {
    self.relationships.iter().find(|r| r.name == name)
  }

  fn push_column(&mut self, column: Column) -> Result<()> {
    if self.column(&column.name).is_some() {
      return Err(Error::DuplicateColumn {
        table:  self.table_name.clone(),
        column: column.name,
      });
    }
    self.columns.push(column);
    Ok(())
  }
}

// ─── Schema construction ─────────────────────────────────────────────────────

/// Builds the tables for one aggregate tree.
///
/// Tables are returned from [`SchemaVisitor::finish`] nested-first, which is
/// also a valid creation order for their foreign keys.
pub struct SchemaVisitor<'r> {
  existing:      &'r Tables,
  /// Tables in progress, innermost entity last.
  open:          Vec<TableModel>,
  finished:      Vec<TableModel>,
  materialized:  HashSet<TypeId>,
  /// Value objects currently entered, with the prefix in force before each.
  value_objects: Vec<(TypeId, String)>,
  prefix:        String,
  /// Depth in `value_objects` of the outermost nullable value object.
  nullable_from: Option<usize>,
}

impl<'r> SchemaVisitor<'r> {
  pub fn new(existing: &'r Tables) -> Self {
    Self {
      existing,
      open: Vec::new(),
      finished: Vec::new(),
      materialized: HashSet::new(),
      value_objects: Vec::new(),
      prefix: String::new(),
      nullable_from: None,
    }
  }

  pub fn finish(self) -> Vec<TableModel> { self.finished }

  fn current(&mut self, column: &str) -> Result<&mut TableModel> {
    self
      .open
      .last_mut()
      .ok_or_else(|| Error::conversion(column, "field outside of any entity"))
  }

  fn link_to_parent(&mut self, entity: &ComplexNode, table_name: &str) -> Result<()> {
    let identities: Vec<&FieldNode> = entity.identity_fields().collect();
    let [identity] = identities.as_slice() else {
      return Err(Error::NestedIdentity { type_name: entity.ty.name, count: identities.len() });
    };

    let fk_name = format!("{}_{}", entity.name, identity.name);
    let column_type = ColumnType::resolve(identity.scalar, &fk_name)?;
    let parent = self.current(&fk_name)?;

    parent.push_column(Column {
      name: fk_name.clone(),
      column_type,
      nullable: entity.nullable,
      primary_key: false,
      references: Some(ForeignKey {
        table:  table_name.to_owned(),
        column: identity.name.clone(),
      }),
    })?;
    parent.relationships.push(Relationship {
      name:         entity.name.clone(),
      target_table: table_name.to_owned(),
      foreign_key:  fk_name,
      target_key:   identity.name.clone(),
      nullable:     entity.nullable,
    });
    Ok(())
  }
}

impl Visitor for SchemaVisitor<'_> {
  fn visit_entity(&mut self, entity: &ComplexNode) -> Result<()> {
    let id = entity.ty.id();
    if self.materialized.contains(&id) {
      return Err(Error::RecursiveNesting { type_name: entity.ty.name });
    }
    if self.existing.contains_key(&id) {
      return Err(Error::DuplicateMaterialization { type_name: entity.ty.name });
    }

    let table = TableModel::for_entity(entity.ty);
    if !self.open.is_empty() {
      self.link_to_parent(entity, &table.table_name)?;
    }

    self.materialized.insert(id);
    self.open.push(table);
    Ok(())
  }

  fn leave_entity(&mut self, entity: &ComplexNode) -> Result<()> {
    let table = self.open.pop().ok_or(Error::NotRegistered { type_name: entity.ty.name })?;
    tracing::debug!(
      table = %table.table_name,
      columns = table.columns.len(),
      relationships = table.relationships.len(),
      "constructed table model"
    );
    self.finished.push(table);
    Ok(())
  }

  fn visit_field(&mut self, field: &FieldNode) -> Result<()> {
    let name = format!("{}{}", self.prefix, field.name);
    let column_type = ColumnType::resolve(field.scalar, &name)?;
    let nullable = field.nullable || self.nullable_from.is_some();

    self.current(&name)?.push_column(Column {
      name,
      column_type,
      nullable,
      primary_key: field.is_identity,
      references: None,
    })
  }

  fn visit_value_object(&mut self, value_object: &ComplexNode) -> Result<()> {
    let id = value_object.ty.id();
    if self.value_objects.iter().any(|(open, _)| *open == id) {
      return Err(Error::RecursiveNesting { type_name: value_object.ty.name });
    }

    let outer = std::mem::take(&mut self.prefix);
    self.prefix = format!("{outer}{}_", value_object.name);
    self.value_objects.push((id, outer));

    if self.nullable_from.is_none() && value_object.nullable {
      self.nullable_from = Some(self.value_objects.len());
    }
    Ok(())
  }

  fn leave_value_object(&mut self, _value_object: &ComplexNode) -> Result<()> {
    if self.nullable_from == Some(self.value_objects.len()) {
      self.nullable_from = None;
    }
    if let Some((_, outer)) = self.value_objects.pop() {
      self.prefix = outer;
    }
    Ok(())
  }

  fn visit_list_of_entities(&mut self, list: &ComplexNode) -> Result<()> {
    Err(unsupported_list("list of entities", list))
  }

  fn visit_list_of_value_objects(&mut self, list: &ComplexNode) -> Result<()> {
    Err(unsupported_list("list of value objects", list))
  }
}
