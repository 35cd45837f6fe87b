//! SQLite backend for the ECCO statistics store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One table is generated per catalog
//! dataset; geographies and precomputed state statistics live in shared
//! tables.

mod encode;
mod schema;
mod sql;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{NewRow, SqliteStore};

#[cfg(test)]
mod tests;
