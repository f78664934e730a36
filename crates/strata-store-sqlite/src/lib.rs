//! SQLite backend for `strata` repositories.
//!
//! [`SqliteSession`] implements [`strata_core::store::Storage`] over a
//! single synchronous [`rusqlite`] connection: tables are created from
//! [`TableModel`](strata_core::schema::TableModel)s, aggregates are fetched
//! with one joined `SELECT`, and merges are written as upserts.

mod encode;
mod session;
mod sql;

pub mod config;
pub mod error;

pub use self::config::SqliteConfig;
pub use error::{Error, Result};
pub use session::SqliteSession;

#[cfg(test)]
mod tests;
