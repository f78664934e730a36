//! Row → aggregate conversion.
//!
//! The visitor reads every field off the record of its nearest enclosing
//! entity (value-object fields through their accumulated prefix) and
//! rebuilds the serialised shape of the aggregate, which serde then turns
//! into the domain type.
//!
//! # Presence heuristic
//!
//! Storage cannot tell an absent optional sub-object from a present one
//! whose fields are all `NULL`. When leaving a nullable node whose collected
//! values are all vacant, the node is read back as absent. A present
//! optional value object with only `None` fields therefore round-trips as
//! `None`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value as Json};

use crate::{
  Result,
  aet::{AbstractEntityTree, ComplexNode, FieldNode},
  record::Record,
  visitor::{Visitor, unsupported_list},
};

pub struct LoadVisitor<'a> {
  root:     &'a Record,
  /// Record of each open entity; `None` below an absent nested entity.
  records:  Vec<Option<&'a Record>>,
  /// Fields collected for each open complex node.
  dicts:    Vec<Map<String, Json>>,
  /// Column prefix for each open complex node.
  prefixes: Vec<String>,
  result:   Option<Json>,
}

impl<'a> LoadVisitor<'a> {
  pub fn new(root: &'a Record) -> Self {
    Self {
      root,
      records: Vec::new(),
      dicts: Vec::new(),
      prefixes: Vec::new(),
      result: None,
    }
  }

  /// The rebuilt aggregate, or `Null` if nothing was traversed.
  pub fn finish(self) -> Json { self.result.unwrap_or(Json::Null) }

  fn enter(&mut self, prefix: String) {
    self.dicts.push(Map::new());
    self.prefixes.push(prefix);
  }

  fn leave(&mut self, node: &ComplexNode) {
    let dict = self.dicts.pop().unwrap_or_default();
    self.prefixes.pop();

    let json = Json::Object(dict);
    let json = if node.nullable && is_vacant(&json) { Json::Null } else { json };

    match self.dicts.last_mut() {
      Some(parent) => {
        parent.insert(node.name.clone(), json);
      }
      None => self.result = Some(json),
    }
  }
}

/// `NULL`, or a non-empty object holding nothing but vacant values.
pub(crate) fn is_vacant(json: &Json) -> bool {
  match json {
    Json::Null => true,
    Json::Object(map) => !map.is_empty() && map.values().all(is_vacant),
    _ => false,
  }
}

impl Visitor for LoadVisitor<'_> {
  fn visit_entity(&mut self, entity: &ComplexNode) -> Result<()> {
    let record = match self.records.last() {
      None => Some(self.root),
      Some(parent) => parent.and_then(|r| r.relation(&entity.name)),
    };
    self.records.push(record);
    self.enter(String::new());
    Ok(())
  }

  fn leave_entity(&mut self, entity: &ComplexNode) -> Result<()> {
    self.records.pop();
    self.leave(entity);
    Ok(())
  }

  fn visit_value_object(&mut self, value_object: &ComplexNode) -> Result<()> {
    let outer = self.prefixes.last().map(String::as_str).unwrap_or_default();
    let prefix = format!("{outer}{}_", value_object.name);
    self.enter(prefix);
    Ok(())
  }

  fn leave_value_object(&mut self, value_object: &ComplexNode) -> Result<()> {
    self.leave(value_object);
    Ok(())
  }

  fn visit_field(&mut self, field: &FieldNode) -> Result<()> {
    let prefix = self.prefixes.last().map(String::as_str).unwrap_or_default();
    let column = format!("{prefix}{}", field.name);

    let value = match self.records.last().copied().flatten() {
      Some(record) => record.get(&column).clone(),
      None => crate::value::Value::Null,
    };
    let json = value.into_json(&column)?;

    if let Some(dict) = self.dicts.last_mut() {
      dict.insert(field.name.clone(), json);
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

/// Rebuild the serialised aggregate described by `tree` from `record`.
pub fn load(tree: &AbstractEntityTree, record: &Record) -> Result<Json> {
  let mut visitor = LoadVisitor::new(record);
  visitor.traverse_from(tree.root())?;
  Ok(visitor.finish())
}

/// Rebuild the aggregate described by `tree` from `record`.
pub fn into_aggregate<T: DeserializeOwned>(
  tree: &AbstractEntityTree,
  record: &Record,
) -> Result<T> {
  Ok(serde_json::from_value(load(tree, record)?)?)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn vacancy_looks_through_nested_objects() {
    assert!(is_vacant(&json!(null)));
    assert!(is_vacant(&json!({ "a": null, "b": { "c": null } })));
    assert!(!is_vacant(&json!({ "a": null, "b": 0 })));
    assert!(!is_vacant(&json!({})));
  }
}
