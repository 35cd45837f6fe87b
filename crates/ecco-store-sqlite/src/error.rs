//! Error type for `ecco-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] ecco_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// An existing table does not carry a column the catalog declares.
  #[error("table {table:?} is missing column {column:?}")]
  SchemaMismatch { table: String, column: String },

  /// A loaded value does not fit the dataset's value column.
  #[error("table {table:?} cannot store {value:?}")]
  ValueKind { table: String, value: String },

  /// A loaded row names a factor the dataset does not declare.
  #[error("table {table:?} has no factor {factor:?}")]
  UnknownFactor { table: String, factor: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
