//! Error type for startup and import.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("catalog error: {0}")]
  Catalog(#[from] ecco_core::Error),
  #[error("store error: {0}")]
  Store(#[from] ecco_store_sqlite::Error),
  #[error("csv error: {0}")]
  Csv(#[from] csv::Error),
  #[error("import file has no {0:?} column")]
  MissingColumn(String),
  #[error("line {line}: cannot read {value:?} as a {table} value")]
  BadValue { line: u64, table: String, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
