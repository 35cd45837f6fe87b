//! The default-constraint clause.
//!
//! A clause is a disjunction of per-measure terms; each term requires the row's
//! measure to equal the term's measure and every listed factor to equal its
//! value. It is built once per request and handed unchanged to every query
//! that must agree on "this measure's slice" (map values and their global
//! statistics, by-geography values and state averages).

use std::collections::BTreeMap;

use crate::value::StateStat;

/// Per measure, the factor values rows must carry.
pub type FactorConstraints = BTreeMap<String, BTreeMap<String, String>>;

/// `measure == m AND factor_1 == v_1 AND ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureTerm {
  pub measure: String,
  /// Factor equalities; a factor not listed is unconstrained.
  pub factors: Vec<(String, String)>,
}

impl MeasureTerm {
  /// Whether a precomputed state statistic describes this term's slice: every
  /// stratum the statistic names must be the one this term selects.
  pub fn matches_state_stat(&self, stat: &StateStat) -> bool {
    self.measure == stat.measure
      && stat.factors.iter().all(|(field, value)| {
        self
          .factors
          .iter()
          .any(|(f, v)| f == field && v == value)
      })
  }
}

/// `OR` over [`MeasureTerm`]s. An empty clause matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintClause {
  terms: Vec<MeasureTerm>,
}

impl ConstraintClause {
  pub fn from_constraints(constraints: &FactorConstraints) -> Self {
    let terms = constraints
      .iter()
      .map(|(measure, factors)| MeasureTerm {
        measure: measure.clone(),
        factors: factors
          .iter()
          .map(|(k, v)| (k.clone(), v.clone()))
          .collect(),
      })
      .collect();
    Self { terms }
  }

  /// A clause over one measure.
  pub fn single(measure: &str, factors: &BTreeMap<String, String>) -> Self {
    Self {
      terms: vec![MeasureTerm {
        measure: measure.to_owned(),
        factors: factors
          .iter()
          .map(|(k, v)| (k.clone(), v.clone()))
          .collect(),
      }],
    }
  }

  pub fn terms(&self) -> &[MeasureTerm] { &self.terms }

  pub fn is_empty(&self) -> bool { self.terms.is_empty() }

  /// A clause keeping only the terms whose measure satisfies `keep`.
  pub fn restricted_to<F>(&self, keep: F) -> Self
  where
    F: Fn(&str) -> bool,
  {
    Self {
      terms: self
        .terms
        .iter()
        .filter(|t| keep(&t.measure))
        .cloned()
        .collect(),
    }
  }
}
