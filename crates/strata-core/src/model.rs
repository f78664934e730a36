//! The type model: entities, value objects and the shapes of their fields.
//!
//! A domain type becomes mappable by declaring it with [`entity!`] or
//! [`value_object!`](crate::value_object). The macros keep the struct exactly
//! as written (derives included) and add two impls:
//!
//! * [`Shaped`], which classifies the type when it appears as a field, and
//! * [`Declared`], which lists its fields and their [`FieldShape`]s.
//!
//! Shape rules ("an entity has an identity", "a value object never nests an
//! entity") are checked by [`TypeDecl::declare`] once per registration, not
//! per instance.
//!
//! Field names double as the serialised keys of the aggregate, so declared
//! types must not rename fields through serde attributes.
//!
//! [`entity!`]: crate::entity

use std::{
  any::TypeId,
  fmt,
  ops::{Deref, DerefMut},
};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, value::ScalarType};

// ─── Identity marker ─────────────────────────────────────────────────────────

/// Marks a field as part of its entity's primary key.
///
/// Serialises exactly like the wrapped value.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Identity<T>(pub T);

impl<T> Identity<T> {
  pub fn new(value: T) -> Self { Self(value) }

  pub fn into_inner(self) -> T { self.0 }
}

impl<T> Deref for Identity<T> {
  type Target = T;

  fn deref(&self) -> &T { &self.0 }
}

impl<T> DerefMut for Identity<T> {
  fn deref_mut(&mut self) -> &mut T { &mut self.0 }
}

impl<T> From<T> for Identity<T> {
  fn from(value: T) -> Self { Self(value) }
}

// ─── Field shapes ────────────────────────────────────────────────────────────

/// Whether a declared type carries identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
  Entity,
  ValueObject,
}

/// A reference to a declared entity or value object type.
///
/// Fields are resolved lazily so self-referential declarations do not loop
/// while their shapes are being described.
#[derive(Clone, Copy)]
pub struct TypeRef {
  pub name: &'static str,
  pub kind: TypeKind,
  id:       TypeId,
  fields:   fn() -> Vec<FieldDecl>,
}

impl TypeRef {
  pub fn of<T: Declared>() -> Self {
    Self { name: T::NAME, kind: T::KIND, id: TypeId::of::<T>(), fields: T::fields }
  }

  pub fn id(&self) -> TypeId { self.id }

  pub fn is_entity(&self) -> bool { self.kind == TypeKind::Entity }

  pub fn declaration(&self) -> TypeDecl {
    TypeDecl { name: self.name, kind: self.kind, fields: (self.fields)() }
  }

  /// Validate this type's declaration.
  pub fn declare(&self) -> Result<DeclaredType> { self.declaration().declare() }
}

impl PartialEq for TypeRef {
  fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for TypeRef {}

impl fmt::Debug for TypeRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TypeRef")
      .field("name", &self.name)
      .field("kind", &self.kind)
      .finish()
  }
}

/// How a field's Rust type looks to the tree builder.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
  Scalar(ScalarType),
  Identity(Box<FieldShape>),
  Optional(Box<FieldShape>),
  List(Box<FieldShape>),
  Complex(TypeRef),
}

impl FieldShape {
  /// The entity reachable through this shape directly or through `Option`.
  fn embedded_entity(&self) -> Option<&TypeRef> {
    match self {
      Self::Complex(ty) if ty.is_entity() => Some(ty),
      Self::Optional(inner) => inner.embedded_entity(),
      _ => None,
    }
  }
}

impl fmt::Display for FieldShape {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Scalar(s) => write!(f, "{s}"),
      Self::Identity(inner) => write!(f, "Identity<{inner}>"),
      Self::Optional(inner) => write!(f, "Option<{inner}>"),
      Self::List(inner) => write!(f, "Vec<{inner}>"),
      Self::Complex(ty) => f.write_str(ty.name),
    }
  }
}

/// Classifies a Rust type as a field shape.
pub trait Shaped {
  fn shape() -> FieldShape;
}

/// A type declared with [`entity!`](crate::entity) or
/// [`value_object!`](crate::value_object).
pub trait Declared: Shaped + 'static {
  const NAME: &'static str;
  const KIND: TypeKind;

  fn fields() -> Vec<FieldDecl>;

  fn declaration() -> TypeDecl {
    TypeDecl { name: Self::NAME, kind: Self::KIND, fields: Self::fields() }
  }
}

macro_rules! scalar_shape {
  ($($ty:ty => $scalar:ident),* $(,)?) => {
    $(
      impl Shaped for $ty {
        fn shape() -> FieldShape { FieldShape::Scalar(ScalarType::$scalar) }
      }
    )*
  };
}

scalar_shape! {
  i64           => Integer,
  i32           => Integer,
  String        => Text,
  Uuid          => Uuid,
  f64           => Float,
  DateTime<Utc> => DateTime,
  bool          => Boolean,
  NaiveDate     => Date,
}

impl<T: Shaped> Shaped for Identity<T> {
  fn shape() -> FieldShape { FieldShape::Identity(Box::new(T::shape())) }
}

impl<T: Shaped> Shaped for Option<T> {
  fn shape() -> FieldShape { FieldShape::Optional(Box::new(T::shape())) }
}

impl<T: Shaped> Shaped for Vec<T> {
  fn shape() -> FieldShape { FieldShape::List(Box::new(T::shape())) }
}

impl<T: Shaped> Shaped for Box<T> {
  fn shape() -> FieldShape { T::shape() }
}

// ─── Declarations ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
  pub name:  &'static str,
  pub shape: FieldShape,
}

impl FieldDecl {
  pub fn new(name: &'static str, shape: FieldShape) -> Self { Self { name, shape } }

  pub fn is_identity(&self) -> bool { matches!(self.shape, FieldShape::Identity(_)) }
}

/// The unvalidated shape of a domain type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
  pub name:   &'static str,
  pub kind:   TypeKind,
  pub fields: Vec<FieldDecl>,
}

impl TypeDecl {
  pub fn entity(name: &'static str, fields: Vec<FieldDecl>) -> Self {
    Self { name, kind: TypeKind::Entity, fields }
  }

  pub fn value_object(name: &'static str, fields: Vec<FieldDecl>) -> Self {
    Self { name, kind: TypeKind::ValueObject, fields }
  }

  /// Check the shape rules for this declaration's kind.
  pub fn declare(self) -> Result<DeclaredType> {
    match self.kind {
      TypeKind::Entity => {
        if !self.fields.iter().any(FieldDecl::is_identity) {
          return Err(Error::EntityWithoutIdentity { type_name: self.name });
        }
      }
      TypeKind::ValueObject => {
        if let Some(field) = self.fields.iter().find(|f| f.is_identity()) {
          return Err(Error::ValueObjectWithIdentity {
            type_name: self.name,
            field:     field.name,
          });
        }
        for field in &self.fields {
          if let Some(entity) = field.shape.embedded_entity() {
            return Err(Error::EntityNestedInValueObject {
              value_object: self.name,
              field:        field.name,
              entity:       entity.name,
            });
          }
        }
      }
    }
    Ok(DeclaredType { decl: self })
  }
}

/// A declaration that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredType {
  decl: TypeDecl,
}

impl DeclaredType {
  pub fn name(&self) -> &'static str { self.decl.name }

  pub fn kind(&self) -> TypeKind { self.decl.kind }

  pub fn fields(&self) -> &[FieldDecl] { &self.decl.fields }

  /// Identity field names in declared order.
  pub fn identity_fields(&self) -> Vec<&'static str> {
    self
      .decl
      .fields
      .iter()
      .filter(|f| f.is_identity())
      .map(|f| f.name)
      .collect()
  }
}

/// Validate the declaration of `T`.
pub fn declare<T: Declared>() -> Result<DeclaredType> { T::declaration().declare() }

// ─── Declaration macros ──────────────────────────────────────────────────────

/// Declare an entity: a struct with at least one [`Identity`] field.
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use strata_core::{entity, model::Identity};
///
/// entity! {
///   #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
///   pub struct Plan {
///     pub id:       Identity<i64>,
///     pub discount: f64,
///   }
/// }
///
/// assert!(strata_core::model::declare::<Plan>().is_ok());
/// ```
#[macro_export]
macro_rules! entity {
  ($($item:tt)*) => { $crate::__declare_type! { Entity; $($item)* } };
}

/// Declare a value object: a struct without identity whose fields are
/// scalars or other value objects.
#[macro_export]
macro_rules! value_object {
  ($($item:tt)*) => { $crate::__declare_type! { ValueObject; $($item)* } };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __declare_type {
  (
    $kind:ident;
    $(#[$meta:meta])*
    $vis:vis struct $name:ident {
      $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty ),* $(,)?
    }
  ) => {
    $(#[$meta])*
    $vis struct $name {
      $( $(#[$fmeta])* $fvis $field: $ty, )*
    }

    impl $crate::model::Shaped for $name {
      fn shape() -> $crate::model::FieldShape {
        $crate::model::FieldShape::Complex($crate::model::TypeRef::of::<Self>())
      }
    }

    impl $crate::model::Declared for $name {
      const NAME: &'static str = ::core::stringify!($name);
      const KIND: $crate::model::TypeKind = $crate::model::TypeKind::$kind;

      fn fields() -> ::std::vec::Vec<$crate::model::FieldDecl> {
        ::std::vec![
          $(
            $crate::model::FieldDecl::new(
              ::core::stringify!($field),
              <$ty as $crate::model::Shaped>::shape(),
            ),
          )*
        ]
      }
    }
  };
}
