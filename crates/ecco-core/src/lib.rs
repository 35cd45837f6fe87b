//! Core types and query logic for the ECCO statistics API.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the measure catalog, effective-default resolution for stratifying factors,
//! and the [`Engine`] that turns catalog metadata into query shapes over any
//! [`store::StatsStore`] backend.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod aggregate;
pub mod catalog;
pub mod category;
pub mod clause;
pub mod compose;
pub mod engine;
pub mod error;
pub mod export;
pub mod filter;
pub mod measure;
pub mod query;
pub mod resolve;
pub mod store;
pub mod text;
pub mod trend;
pub mod value;

pub use catalog::Catalog;
pub use category::{Dataset, GeographyFamily, MeasureCategory, SchemaKind};
pub use engine::{Engine, QuerySettings, StateComparison};
pub use error::{Error, ErrorKind, Result};
