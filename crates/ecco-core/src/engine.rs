//! The query engine: a catalog, a store and the settings that shape queries.
//!
//! The operations themselves live next to the response shapes they build:
//! [`crate::query`] (per-dataset queries), [`crate::compose`] (by-geography
//! documents) and [`crate::export`] (bulk export planning).

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
  aggregate::average_across_geographies,
  catalog::Catalog,
  category::{Dataset, GeographyFamily},
  clause::{ConstraintClause, MeasureTerm},
  error::{Error, Result},
  store::{Selection, StatsStore},
  value::{CellValue, StateStat},
};

// ─── Settings ────────────────────────────────────────────────────────────────

/// How state-level comparison values are obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateComparison {
  /// Only precomputed state statistics.
  External,
  /// Only averages computed across every geography of the family.
  Computed,
  /// Precomputed statistics where available, computed averages elsewhere.
  #[default]
  ExternalThenComputed,
}

impl StateComparison {
  fn uses_external(self) -> bool { !matches!(self, StateComparison::Computed) }

  fn uses_computed(self) -> bool { !matches!(self, StateComparison::External) }
}

/// Where a reported state value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateSource {
  External,
  Computed,
}

/// Knobs that shape every query the engine issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
  /// Restrict listings, map values and exports to one state.
  pub limit_to_state:    Option<String>,
  pub state_comparison:  StateComparison,
  pub default_page_size: u32,
  pub max_page_size:     u32,
  /// Leading component of exported file names.
  pub export_prefix:     String,
}

impl Default for QuerySettings {
  fn default() -> Self {
    Self {
      limit_to_state:    None,
      state_comparison:  StateComparison::default(),
      default_page_size: 50,
      max_page_size:     100,
      export_prefix:     "ECCO".to_owned(),
    }
  }
}

/// A state-level comparison value for one measure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateValue {
  pub value:    Option<CellValue>,
  pub count:    Option<f64>,
  pub us_value: Option<f64>,
  pub source:   StateSource,
}

// ─── Engine ──────────────────────────────────────────────────────────────────

/// Shared, immutable query engine. Cheap to clone.
pub struct Engine<S> {
  store:    Arc<S>,
  catalog:  Arc<Catalog>,
  settings: Arc<QuerySettings>,
}

impl<S> Clone for Engine<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      catalog:  Arc::clone(&self.catalog),
      settings: Arc::clone(&self.settings),
    }
  }
}

impl<S: StatsStore> Engine<S> {
  pub fn new(store: Arc<S>, catalog: Arc<Catalog>, settings: QuerySettings) -> Self {
    Self { store, catalog, settings: Arc::new(settings) }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn catalog(&self) -> &Catalog { &self.catalog }

  pub fn settings(&self) -> &QuerySettings { &self.settings }

  pub(crate) fn limit_to_state(&self) -> Option<&str> {
    self.settings.limit_to_state.as_deref()
  }

  /// Look up a dataset, or fail with a not-found error.
  pub fn dataset(&self, family: GeographyFamily, category: &str) -> Result<Dataset<'_>> {
    self
      .catalog
      .dataset(family, category)
      .ok_or_else(|| Error::UnknownCategory {
        family,
        category: category.to_owned(),
      })
  }

  /// State-level comparison values for every measure of `clause`, following
  /// the configured [`StateComparison`] strategy.
  pub(crate) async fn state_values(
    &self,
    dataset: Dataset<'_>,
    clause: &ConstraintClause,
  ) -> Result<BTreeMap<String, StateValue>> {
    let strategy = self.settings.state_comparison;
    let mut out = BTreeMap::new();

    if strategy.uses_external() {
      let stats = self
        .store
        .state_stats(dataset)
        .await
        .map_err(Error::store)?;
      for term in clause.terms() {
        if let Some(stat) = best_state_stat(term, &stats) {
          out.insert(term.measure.clone(), StateValue {
            value:    stat.state_avg.map(CellValue::Number),
            count:    None,
            us_value: stat.us_avg,
            source:   StateSource::External,
          });
        }
      }
    }

    if strategy.uses_computed() {
      let gaps = clause.restricted_to(|measure| !out.contains_key(measure));
      if !gaps.is_empty() {
        let selection = Selection::clause(gaps)
          .in_state(self.settings.limit_to_state.clone());
        let rows = self
          .store
          .select_values(dataset, &selection)
          .await
          .map_err(Error::store)?;
        for (measure, summary) in average_across_geographies(&rows) {
          out.insert(measure, StateValue {
            value:    summary.value,
            count:    summary.count,
            us_value: None,
            source:   StateSource::Computed,
          });
        }
      }
    }

    Ok(out)
  }
}

/// The most specific precomputed statistic describing a term's slice.
fn best_state_stat<'a>(term: &MeasureTerm, stats: &'a [StateStat]) -> Option<&'a StateStat> {
  stats
    .iter()
    .filter(|stat| term.matches_state_stat(stat))
    .max_by_key(|stat| stat.factors.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn settings_defaults() {
    let s = QuerySettings::default();
    assert_eq!(s.default_page_size, 50);
    assert_eq!(s.max_page_size, 100);
    assert_eq!(s.export_prefix, "ECCO");
    assert_eq!(s.state_comparison, StateComparison::ExternalThenComputed);
  }

  #[test]
  fn strategy_flags() {
    assert!(StateComparison::External.uses_external());
    assert!(!StateComparison::External.uses_computed());
    assert!(!StateComparison::Computed.uses_external());
    assert!(StateComparison::ExternalThenComputed.uses_external());
    assert!(StateComparison::ExternalThenComputed.uses_computed());
  }

  #[test]
  fn most_specific_state_stat_wins() {
    let term = MeasureTerm {
      measure: "m".into(),
      factors: vec![("sex".into(), "All".into())],
    };
    let stat = |factors: &[(&str, &str)], avg: f64| StateStat {
      measure:   "m".into(),
      factors:   factors
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
      state_avg: Some(avg),
      us_avg:    None,
    };
    let stats = [stat(&[], 1.0), stat(&[("sex", "All")], 2.0), stat(&[("sex", "Male")], 3.0)];
    assert_eq!(best_state_stat(&term, &stats).unwrap().state_avg, Some(2.0));
  }
}
