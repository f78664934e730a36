//! The Abstract Entity Tree: the storage-relevant shape of one aggregate.
//!
//! [`build`] walks a root entity's declaration once and produces an immutable
//! tree of typed [`Node`]s. Every algorithm that touches storage (schema,
//! queries, row conversion) is a [`Visitor`](crate::visitor::Visitor) over
//! this tree; none of them looks at the Rust types again.

use std::any::TypeId;

use crate::{
  Error, Result,
  model::{Declared, DeclaredType, FieldDecl, FieldShape, TypeKind, TypeRef},
  naming,
  value::ScalarType,
};

// ─── Nodes ───────────────────────────────────────────────────────────────────

/// A scalar leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldNode {
  pub name:        String,
  pub scalar:      ScalarType,
  pub nullable:    bool,
  pub is_identity: bool,
}

impl FieldNode {
  pub fn new(name: impl Into<String>, scalar: ScalarType) -> Self {
    Self { name: name.into(), scalar, nullable: false, is_identity: false }
  }

  pub fn identity(name: impl Into<String>, scalar: ScalarType) -> Self {
    Self { is_identity: true, ..Self::new(name, scalar) }
  }

  pub fn nullable(self) -> Self { Self { nullable: true, ..self } }
}

/// An entity, value object or list thereof, with its fields as children.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexNode {
  pub name:     String,
  pub ty:       TypeRef,
  pub nullable: bool,
  pub children: Vec<Node>,
}

impl ComplexNode {
  pub fn new(name: impl Into<String>, ty: TypeRef, children: Vec<Node>) -> Self {
    Self { name: name.into(), ty, nullable: false, children }
  }

  pub fn nullable(self) -> Self { Self { nullable: true, ..self } }

  /// Identity leaves among the direct children.
  pub fn identity_fields(&self) -> impl Iterator<Item = &FieldNode> {
    self.children.iter().filter_map(|child| match child {
      Node::Field(f) if f.is_identity => Some(f),
      _ => None,
    })
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
  Field(FieldNode),
  Entity(ComplexNode),
  ValueObject(ComplexNode),
  ListOfEntities(ComplexNode),
  ListOfValueObjects(ComplexNode),
}

impl Node {
  pub fn name(&self) -> &str {
    match self {
      Self::Field(f) => &f.name,
      Self::Entity(c)
      | Self::ValueObject(c)
      | Self::ListOfEntities(c)
      | Self::ListOfValueObjects(c) => &c.name,
    }
  }

  pub fn nullable(&self) -> bool {
    match self {
      Self::Field(f) => f.nullable,
      Self::Entity(c)
      | Self::ValueObject(c)
      | Self::ListOfEntities(c)
      | Self::ListOfValueObjects(c) => c.nullable,
    }
  }

  pub fn children(&self) -> &[Node] {
    match self {
      Self::Field(_) => &[],
      Self::Entity(c)
      | Self::ValueObject(c)
      | Self::ListOfEntities(c)
      | Self::ListOfValueObjects(c) => &c.children,
    }
  }

  /// Human-readable node kind, used in error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Field(_) => "field",
      Self::Entity(_) => "entity",
      Self::ValueObject(_) => "value object",
      Self::ListOfEntities(_) => "list of entities",
      Self::ListOfValueObjects(_) => "list of value objects",
    }
  }
}

// ─── Tree ────────────────────────────────────────────────────────────────────

/// One tree per aggregate root type. The root is always an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AbstractEntityTree {
  root: Node,
}

impl AbstractEntityTree {
  pub fn new(root: ComplexNode) -> Self { Self { root: Node::Entity(root) } }

  pub fn root(&self) -> &Node { &self.root }

  pub fn root_entity(&self) -> &ComplexNode {
    match &self.root {
      Node::Entity(entity) => entity,
      _ => unreachable!("tree roots are constructed as entities"),
    }
  }

  pub fn root_type(&self) -> TypeRef { self.root_entity().ty }

  /// Depth-first, pre-order iteration over every node.
  pub fn iter(&self) -> Iter<'_> { Iter { stack: vec![&self.root] } }
}

impl<'a> IntoIterator for &'a AbstractEntityTree {
  type IntoIter = Iter<'a>;
  type Item = &'a Node;

  fn into_iter(self) -> Iter<'a> { self.iter() }
}

pub struct Iter<'a> {
  stack: Vec<&'a Node>,
}

impl<'a> Iterator for Iter<'a> {
  type Item = &'a Node;

  fn next(&mut self) -> Option<&'a Node> {
    let node = self.stack.pop()?;
    self.stack.extend(node.children().iter().rev());
    Some(node)
  }
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Build the tree for a declared root entity.
pub fn build<T: Declared>() -> Result<AbstractEntityTree> { build_from(TypeRef::of::<T>()) }

/// Build the tree for the type behind `root`.
pub fn build_from(root: TypeRef) -> Result<AbstractEntityTree> {
  let declared = root.declare()?;
  if declared.kind() != TypeKind::Entity {
    return Err(Error::RootNotEntity { type_name: root.name });
  }

  let mut builder = Builder { path: vec![root.id()] };
  let children = builder.children(&declared)?;
  let tree = AbstractEntityTree::new(ComplexNode::new(
    naming::snake_case(root.name),
    root,
    children,
  ));

  tracing::debug!(root = root.name, nodes = tree.iter().count(), "built entity tree");
  Ok(tree)
}

struct Builder {
  /// Types currently being expanded, root first.
  path: Vec<TypeId>,
}

impl Builder {
  fn children(&mut self, declared: &DeclaredType) -> Result<Vec<Node>> {
    declared.fields().iter().map(|f| self.node(f)).collect()
  }

  fn node(&mut self, field: &FieldDecl) -> Result<Node> {
    match &field.shape {
      FieldShape::Identity(inner) => match **inner {
        FieldShape::Scalar(s) => Ok(Node::Field(FieldNode::identity(field.name, s))),
        _ => Err(unhandled(field)),
      },
      FieldShape::Optional(inner) => match &**inner {
        FieldShape::Complex(ty) => self.complex(field.name, ty, true, false),
        FieldShape::Scalar(s) => Ok(Node::Field(FieldNode::new(field.name, *s).nullable())),
        _ => Err(unhandled(field)),
      },
      FieldShape::List(inner) => match &**inner {
        FieldShape::Complex(ty) => self.complex(field.name, ty, false, true),
        _ => Err(unhandled(field)),
      },
      FieldShape::Complex(ty) => self.complex(field.name, ty, false, false),
      FieldShape::Scalar(s) => Ok(Node::Field(FieldNode::new(field.name, *s))),
    }
  }

  fn complex(&mut self, name: &str, ty: &TypeRef, nullable: bool, list: bool) -> Result<Node> {
    // A type already being expanded is emitted without children; schema
    // construction reports the recursion.
    let children = if self.path.contains(&ty.id()) {
      Vec::new()
    } else {
      let declared = ty.declare()?;
      self.path.push(ty.id());
      let children = self.children(&declared);
      self.path.pop();
      children?
    };

    let node = ComplexNode { name: name.to_owned(), ty: *ty, nullable, children };
    Ok(match (ty.kind, list) {
      (TypeKind::Entity, false) => Node::Entity(node),
      (TypeKind::ValueObject, false) => Node::ValueObject(node),
      (TypeKind::Entity, true) => Node::ListOfEntities(node),
      (TypeKind::ValueObject, true) => Node::ListOfValueObjects(node),
    })
  }
}

fn unhandled(field: &FieldDecl) -> Error {
  Error::UnhandledFieldShape { field: field.name.to_owned(), shape: field.shape.to_string() }
}
