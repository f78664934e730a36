//! Depth-first traversal over an [`AbstractEntityTree`](crate::aet::AbstractEntityTree).
//!
//! Each node kind has a `visit_*` callback fired before its children and a
//! `leave_*` callback fired after them. Callbacks default to no-ops, so a
//! visitor implements only the kinds it cares about. The first error stops
//! the traversal.

use crate::{
  Error, Result,
  aet::{ComplexNode, FieldNode, Node},
};

pub trait Visitor {
  fn visit_field(&mut self, _field: &FieldNode) -> Result<()> { Ok(()) }

  fn leave_field(&mut self, _field: &FieldNode) -> Result<()> { Ok(()) }

  fn visit_entity(&mut self, _entity: &ComplexNode) -> Result<()> { Ok(()) }

  fn leave_entity(&mut self, _entity: &ComplexNode) -> Result<()> { Ok(()) }

  fn visit_value_object(&mut self, _value_object: &ComplexNode) -> Result<()> { Ok(()) }

  fn leave_value_object(&mut self, _value_object: &ComplexNode) -> Result<()> { Ok(()) }

  fn visit_list_of_entities(&mut self, _list: &ComplexNode) -> Result<()> { Ok(()) }

  fn leave_list_of_entities(&mut self, _list: &ComplexNode) -> Result<()> { Ok(()) }

  fn visit_list_of_value_objects(&mut self, _list: &ComplexNode) -> Result<()> { Ok(()) }

  fn leave_list_of_value_objects(&mut self, _list: &ComplexNode) -> Result<()> { Ok(()) }

  /// Visit `node`, traverse its children in declared order, then leave it.
  fn traverse_from(&mut self, node: &Node) -> Result<()>
  where
    Self: Sized,
  {
    traverse(self, node)
  }
}

/// [`Visitor::traverse_from`] for unsized visitors.
pub fn traverse<V: Visitor + ?Sized>(visitor: &mut V, node: &Node) -> Result<()> {
  match node {
    Node::Field(f) => visitor.visit_field(f)?,
    Node::Entity(c) => visitor.visit_entity(c)?,
    Node::ValueObject(c) => visitor.visit_value_object(c)?,
    Node::ListOfEntities(c) => visitor.visit_list_of_entities(c)?,
    Node::ListOfValueObjects(c) => visitor.visit_list_of_value_objects(c)?,
  }

  for child in node.children() {
    traverse(visitor, child)?;
  }

  match node {
    Node::Field(f) => visitor.leave_field(f),
    Node::Entity(c) => visitor.leave_entity(c),
    Node::ValueObject(c) => visitor.leave_value_object(c),
    Node::ListOfEntities(c) => visitor.leave_list_of_entities(c),
    Node::ListOfValueObjects(c) => visitor.leave_list_of_value_objects(c),
  }
}

/// The error every storage visitor raises on one-to-many nodes.
pub(crate) fn unsupported_list(kind: &'static str, list: &ComplexNode) -> Error {
  Error::Unsupported { kind, name: list.name.clone() }
}
