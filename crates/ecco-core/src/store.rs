//! The `StatsStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `ecco-store-sqlite`).
//! The engine and the HTTP layer depend on this abstraction, not on any
//! concrete backend. Every method is a read; loading data is a concern of the
//! backend itself.

use std::{collections::BTreeMap, future::Future};

use crate::{
  category::{Dataset, GeographyFamily},
  clause::ConstraintClause,
  resolve::ObservedFactorValues,
  value::{Geography, RawRows, StateStat, ValueRange, ValueRow},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`StatsStore::list_rows`].
#[derive(Debug, Clone, Default)]
pub struct RowQuery {
  /// Exact match on the measure (or site) column.
  pub measure: Option<String>,
  pub state:   Option<String>,
  pub limit:   u32,
  pub offset:  u64,
}

/// Parameters for [`StatsStore::select_values`]. All present conditions are
/// combined with `AND`.
#[derive(Debug, Clone, Default)]
pub struct Selection {
  /// Rows must satisfy this clause.
  pub clause:  Option<ConstraintClause>,
  /// Exact match on the measure (or site) column.
  pub measure: Option<String>,
  /// Exact matches on factor columns.
  pub factors: BTreeMap<String, String>,
  pub geo_id:  Option<String>,
  pub state:   Option<String>,
}

impl Selection {
  pub fn clause(clause: ConstraintClause) -> Self {
    Self { clause: Some(clause), ..Self::default() }
  }

  pub fn for_geography(mut self, geo_id: impl Into<String>) -> Self {
    self.geo_id = Some(geo_id.into());
    self
  }

  pub fn in_state(mut self, state: Option<String>) -> Self {
    self.state = state;
    self
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an ECCO row store.
///
/// A store holds one table per [`Dataset`], keyed by geography id, with the
/// measure and value columns of the dataset's schema kind plus one column per
/// declared factor. Rows are ordered by geography id, then measure, wherever
/// order is observable.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait StatsStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Distinct measure keys, sorted, optionally limited to one state.
  fn distinct_measures<'a>(
    &'a self,
    dataset: Dataset<'a>,
    state: Option<&'a str>,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  /// Per measure, the distinct non-null values of every declared factor that
  /// occur together with that measure. `None` covers every measure.
  fn observed_factor_values<'a>(
    &'a self,
    dataset: Dataset<'a>,
    measures: Option<&'a [String]>,
  ) -> impl Future<Output = Result<ObservedFactorValues, Self::Error>> + Send + 'a;

  /// Raw rows with every column, plus the size of the unpaginated selection.
  fn list_rows<'a>(
    &'a self,
    dataset: Dataset<'a>,
    query: &'a RowQuery,
  ) -> impl Future<Output = Result<RawRows, Self::Error>> + Send + 'a;

  /// Rows matching `selection`, joined with their geography's name and state.
  fn select_values<'a>(
    &'a self,
    dataset: Dataset<'a>,
    selection: &'a Selection,
  ) -> impl Future<Output = Result<Vec<ValueRow>, Self::Error>> + Send + 'a;

  /// Minimum and maximum headline value over every geography matching
  /// `clause`; `None` when nothing matches. Trend extremes are by rank.
  fn value_range<'a>(
    &'a self,
    dataset: Dataset<'a>,
    clause: &'a ConstraintClause,
  ) -> impl Future<Output = Result<Option<ValueRange>, Self::Error>> + Send + 'a;

  /// Look up one geography. Returns `None` if it is not known.
  fn geography<'a>(
    &'a self,
    family: GeographyFamily,
    geo_id: &'a str,
  ) -> impl Future<Output = Result<Option<Geography>, Self::Error>> + Send + 'a;

  /// Precomputed state-level statistics for a dataset.
  fn state_stats<'a>(
    &'a self,
    dataset: Dataset<'a>,
  ) -> impl Future<Output = Result<Vec<StateStat>, Self::Error>> + Send + 'a;
}
