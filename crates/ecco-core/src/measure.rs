//! Measure and factor metadata.
//!
//! A category's metadata is pure data: descriptors for the measures it
//! carries and the stratifying factors declared on its rows. Lookups never
//! fail; a measure without metadata is reported under its raw key with no
//! unit.

use std::{
  borrow::Cow,
  collections::BTreeMap,
};

use serde::{Deserialize, Serialize};

use crate::category::GeographyFamily;

// ─── Units ───────────────────────────────────────────────────────────────────

/// The unit of measurement for a measure, exposed as `unit` in responses.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MeasureUnit {
  /// Stored as a fraction between 0 and 1.
  Percent,
  Count,
  /// Typically normalised by population (e.g. per 100k).
  Rate,
  DollarAmount,
  Rank,
  /// Ordered discrete labels, e.g. falling/stable/rising.
  Ordinal,
  Categorical,
  /// Ranges from -1 (least affected) to +1 (most affected).
  Ratio,
  /// Segregation indices ranging from least to most segregated.
  LeastMost,
}

// ─── Measures ────────────────────────────────────────────────────────────────

/// Which geography families a measure is published for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureScope {
  #[default]
  All,
  CountyOnly,
  TractOnly,
}

impl MeasureScope {
  pub fn applies_to(self, family: GeographyFamily) -> bool {
    match self {
      MeasureScope::All => true,
      MeasureScope::CountyOnly => family == GeographyFamily::County,
      MeasureScope::TractOnly => family == GeographyFamily::Tract,
    }
  }
}

/// One measurable quantity within a category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureDescriptor {
  /// The raw value as stored in the measure (or site) column.
  pub key:        String,
  pub label:      String,
  pub unit:       MeasureUnit,
  pub source:     Option<String>,
  pub source_url: Option<String>,
  pub scope:      MeasureScope,
  /// Explicit ordinal label sequence for trend-like measures.
  pub order:      Option<Vec<String>>,
}

/// Descriptor template applied to measure keys with no explicit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureFallback {
  pub unit:       MeasureUnit,
  pub source:     Option<String>,
  pub source_url: Option<String>,
}

impl MeasureFallback {
  fn describe(&self, key: &str) -> MeasureDescriptor {
    MeasureDescriptor {
      key:        key.to_owned(),
      label:      key.to_owned(),
      unit:       self.unit,
      source:     self.source.clone(),
      source_url: self.source_url.clone(),
      scope:      MeasureScope::All,
      order:      None,
    }
  }
}

// ─── Factors ─────────────────────────────────────────────────────────────────

/// A stratifying dimension declared on a category (sex, race, stage, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorDescriptor {
  /// Column name on the category's rows.
  pub field:   String,
  pub label:   String,
  /// Value used when no filter and no data-driven signal exists.
  pub default: Option<String>,
  /// Raw value to display label; empty means labels equal raw values.
  pub values:  BTreeMap<String, String>,
}

impl FactorDescriptor {
  /// Display label for `raw`, falling back to the raw value itself.
  pub fn value_label<'a>(&'a self, raw: &'a str) -> &'a str {
    match self.values.get(raw) {
      Some(label) if !label.is_empty() => label,
      _ => raw,
    }
  }
}

// ─── Category metadata ───────────────────────────────────────────────────────

/// Measure and factor descriptors shared by every family a category is
/// published for.
#[derive(Debug, Clone, Default)]
pub struct CategoryMeta {
  pub(crate) measures: BTreeMap<String, MeasureDescriptor>,
  pub(crate) fallback: Option<MeasureFallback>,
  pub(crate) factors:  Vec<FactorDescriptor>,
}

impl CategoryMeta {
  pub(crate) const EMPTY: CategoryMeta = CategoryMeta {
    measures: BTreeMap::new(),
    fallback: None,
    factors:  Vec::new(),
  };

  /// Descriptor for `key`: the explicit entry, else one synthesised from the
  /// category's fallback, else `None`.
  pub fn measure(&self, key: &str) -> Option<Cow<'_, MeasureDescriptor>> {
    if let Some(desc) = self.measures.get(key) {
      return Some(Cow::Borrowed(desc));
    }
    self
      .fallback
      .as_ref()
      .map(|fallback| Cow::Owned(fallback.describe(key)))
  }

  /// Human label for `key`, or the key itself.
  pub fn measure_label<'a>(&'a self, key: &'a str) -> Cow<'a, str> {
    match self.measure(key) {
      Some(Cow::Borrowed(desc)) => Cow::Borrowed(desc.label.as_str()),
      Some(Cow::Owned(desc)) => Cow::Owned(desc.label),
      None => Cow::Borrowed(key),
    }
  }

  /// Explicitly declared measures, ordered by key.
  pub fn declared_measures(&self) -> impl Iterator<Item = &MeasureDescriptor> {
    self.measures.values()
  }

  /// Factors in declaration order.
  pub fn factors(&self) -> &[FactorDescriptor] { &self.factors }

  pub fn factor(&self, field: &str) -> Option<&FactorDescriptor> {
    self.factors.iter().find(|f| f.field == field)
  }
}
