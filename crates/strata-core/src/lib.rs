//! Core types and algorithms for mapping aggregates onto relational tables.
//!
//! An aggregate root is declared with [`entity!`], which yields a
//! [`model::Declared`] description of its fields. From that description the
//! crate builds an [`aet::AbstractEntityTree`] and walks it with visitors to
//! derive table definitions, fetch queries and record conversions.
//!
//! This crate is deliberately free of database dependencies. Backends
//! implement [`store::Storage`] (e.g. `strata-store-sqlite`).

pub mod aet;
pub mod dump;
pub mod error;
pub mod load;
pub mod model;
pub mod naming;
pub mod query;
pub mod record;
pub mod registry;
pub mod repository;
pub mod schema;
pub mod store;
pub mod value;
pub mod visitor;

pub use error::{Error, Result};
pub use model::Identity;
pub use record::Record;
pub use registry::Registry;
pub use repository::{ReadOnlyRepository, Repository, WriteRepository};
pub use value::Value;
