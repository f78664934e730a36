//! Connection settings for [`SqliteSession`](crate::SqliteSession).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Where and how to open the database.
///
/// Every field has a default, so an empty configuration opens an in-memory
/// database with foreign keys enforced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
  /// Database file; `None` opens a private in-memory database.
  pub path:            Option<PathBuf>,
  pub foreign_keys:    bool,
  pub busy_timeout_ms: u64,
}

impl Default for SqliteConfig {
  fn default() -> Self { Self { path: None, foreign_keys: true, busy_timeout_ms: 5_000 } }
}

impl SqliteConfig {
  /// Layer an optional configuration file and `STRATA_*` environment
  /// variables over the defaults.
  pub fn load(file: impl AsRef<Path>) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file.as_ref()).required(false))
      .add_source(config::Environment::with_prefix("STRATA"))
      .build()?;

    let cfg: Self = settings.try_deserialize()?;
    tracing::debug!(?cfg, "loaded sqlite configuration");
    Ok(cfg)
  }

  pub fn in_memory() -> Self { Self::default() }
}
