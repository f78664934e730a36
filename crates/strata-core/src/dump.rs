//! Aggregate → row conversion.
//!
//! The visitor walks the serialised aggregate alongside its tree and builds
//! one [`Record`] per entity, nested records first. Value-object fields land
//! on the enclosing entity's record under their prefixed column names. Once
//! a sub-object is absent nothing below it is read; its columns are written
//! as `NULL`.
//!
//! A nullable nested entity that is absent, or whose fields are all vacant,
//! produces no record and a `NULL` foreign key (see [`crate::load`] for the
//! matching read-side rule).

use serde::Serialize;
use serde_json::Value as Json;

use crate::{
  Error, Result,
  aet::{AbstractEntityTree, ComplexNode, FieldNode},
  load::is_vacant,
  naming,
  record::Record,
  value::Value,
  visitor::{Visitor, unsupported_list},
};

pub struct DumpVisitor<'a> {
  root:     &'a Json,
  /// Domain object of each open complex node; `None` once absent.
  objects:  Vec<Option<&'a Json>>,
  /// Record of each open entity.
  records:  Vec<Record>,
  prefixes: Vec<String>,
  result:   Option<Record>,
}

impl<'a> DumpVisitor<'a> {
  pub fn new(root: &'a Json) -> Self {
    Self {
      root,
      objects: Vec::new(),
      records: Vec::new(),
      prefixes: Vec::new(),
      result: None,
    }
  }

  pub fn finish(self) -> Option<Record> { self.result }

  /// The member `name` of the current domain object, if both are present.
  fn child(&self, name: &str) -> Option<&'a Json> {
    self
      .objects
      .last()
      .copied()
      .flatten()
      .and_then(|object| object.get(name))
      .filter(|json| !json.is_null())
  }

  fn prefix(&self) -> &str { self.prefixes.last().map(String::as_str).unwrap_or_default() }
}

impl Visitor for DumpVisitor<'_> {
  fn visit_entity(&mut self, entity: &ComplexNode) -> Result<()> {
    let object = if self.objects.is_empty() { Some(self.root) } else { self.child(&entity.name) };
    let enclosing_present = matches!(self.objects.last(), None | Some(Some(_)));
    if object.is_none() && !entity.nullable && enclosing_present {
      return Err(Error::conversion(&entity.name, "required entity is missing"));
    }

    self.objects.push(object);
    self.records.push(Record::new(naming::table_name(entity.ty.name)));
    self.prefixes.push(String::new());
    Ok(())
  }

  fn leave_entity(&mut self, entity: &ComplexNode) -> Result<()> {
    let object = self.objects.pop().flatten();
    self.prefixes.pop();
    let Some(record) = self.records.pop() else {
      return Ok(());
    };

    let Some(parent) = self.records.last_mut() else {
      self.result = Some(record);
      return Ok(());
    };

    let identity = entity
      .identity_fields()
      .next()
      .ok_or(Error::NestedIdentity { type_name: entity.ty.name, count: 0 })?;
    let fk_column = format!("{}_{}", entity.name, identity.name);

    let absent = match object {
      None => true,
      Some(json) => entity.nullable && is_vacant(json),
    };
    if absent {
      parent.set(fk_column, Value::Null);
      parent.relate(&entity.name, None);
    } else {
      parent.set(fk_column, record.get(&identity.name).clone());
      parent.relate(&entity.name, Some(record));
    }
    Ok(())
  }

  fn visit_value_object(&mut self, value_object: &ComplexNode) -> Result<()> {
    let object = self.child(&value_object.name);
    let prefix = format!("{}{}_", self.prefix(), value_object.name);
    self.objects.push(object);
    self.prefixes.push(prefix);
    Ok(())
  }

  fn leave_value_object(&mut self, _value_object: &ComplexNode) -> Result<()> {
    self.objects.pop();
    self.prefixes.pop();
    Ok(())
  }

  fn visit_field(&mut self, field: &FieldNode) -> Result<()> {
    let column = format!("{}{}", self.prefix(), field.name);
    let value = match self.child(&field.name) {
      Some(json) => Value::from_json(field.scalar, json, &column)?,
      None => Value::Null,
    };

    if let Some(record) = self.records.last_mut() {
      record.set(column, value);
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

/// Convert an already-serialised aggregate into its record graph.
pub fn dump_json(tree: &AbstractEntityTree, aggregate: &Json) -> Result<Record> {
  let mut visitor = DumpVisitor::new(aggregate);
  visitor.traverse_from(tree.root())?;
  visitor
    .finish()
    .ok_or(Error::NotRegistered { type_name: tree.root_type().name })
}

/// Convert `aggregate` into its record graph.
pub fn dump<T: Serialize>(tree: &AbstractEntityTree, aggregate: &T) -> Result<Record> {
  dump_json(tree, &serde_json::to_value(aggregate)?)
}
