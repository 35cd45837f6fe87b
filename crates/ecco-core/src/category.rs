//! Measure categories and the geography families they are keyed by.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{error::Error, measure::CategoryMeta};

// ─── Geography families ──────────────────────────────────────────────────────

/// Granularity of the spatial unit a category's rows are keyed by.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  strum::EnumString,
  strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GeographyFamily {
  County,
  Tract,
  HealthRegion,
}

impl GeographyFamily {
  /// Every family, in the order they are served.
  pub const ALL: [GeographyFamily; 3] = [
    GeographyFamily::County,
    GeographyFamily::Tract,
    GeographyFamily::HealthRegion,
  ];

  /// Path segment, e.g. `healthregion`.
  pub fn slug(self) -> &'static str { self.into() }

  pub fn label(self) -> &'static str {
    match self {
      GeographyFamily::County => "County",
      GeographyFamily::Tract => "Tract",
      GeographyFamily::HealthRegion => "Health Region",
    }
  }

  /// Header of the geography-name column in CSV exports.
  pub fn name_header(self) -> &'static str { self.label() }

  pub fn parse(s: &str) -> Result<Self, Error> {
    s.parse()
      .map_err(|_| Error::UnknownFamily(s.to_owned()))
  }
}

impl fmt::Display for GeographyFamily {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.slug())
  }
}

// ─── Schema kinds ────────────────────────────────────────────────────────────

/// How a category physically represents "which measure" and "what value".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
  /// `measure` + numeric `value`.
  #[default]
  Generic,
  /// Cancer convention: `site` + `rate` + `count`.
  SiteBased,
  /// `measure` + ordinal `trend` label.
  TrendOrdinal,
}

impl SchemaKind {
  /// Column holding the measure key.
  pub fn measure_column(self) -> &'static str {
    match self {
      SchemaKind::SiteBased => "site",
      SchemaKind::Generic | SchemaKind::TrendOrdinal => "measure",
    }
  }

  /// Column holding the headline value.
  pub fn value_column(self) -> &'static str {
    match self {
      SchemaKind::Generic => "value",
      SchemaKind::SiteBased => "rate",
      SchemaKind::TrendOrdinal => "trend",
    }
  }

  /// Secondary count column, present only for the cancer convention.
  pub fn count_column(self) -> Option<&'static str> {
    match self {
      SchemaKind::SiteBased => Some("count"),
      SchemaKind::Generic | SchemaKind::TrendOrdinal => None,
    }
  }
}

// ─── Categories ──────────────────────────────────────────────────────────────

/// One statistical table: a category as published for one geography family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureCategory {
  pub name:   String,
  pub label:  String,
  pub family: GeographyFamily,
  pub schema: SchemaKind,
}

impl MeasureCategory {
  /// Backing table name, e.g. `cancerincidence_county`.
  pub fn table_name(&self) -> String {
    format!("{}_{}", self.name, self.family)
  }
}

/// A category paired with its metadata; the unit every query runs against.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
  pub category: &'a MeasureCategory,
  pub meta:     &'a CategoryMeta,
}

impl<'a> Dataset<'a> {
  pub fn name(self) -> &'a str { &self.category.name }

  pub fn family(self) -> GeographyFamily { self.category.family }

  pub fn schema(self) -> SchemaKind { self.category.schema }

  /// Declared factor columns, in declaration order.
  pub fn factor_fields(self) -> impl Iterator<Item = &'a str> + 'a {
    self.meta.factors().iter().map(|f| f.field.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn family_slugs_round_trip() {
    for family in GeographyFamily::ALL {
      assert_eq!(GeographyFamily::parse(family.slug()).unwrap(), family);
    }
    assert_eq!(GeographyFamily::HealthRegion.slug(), "healthregion");
  }

  #[test]
  fn unknown_family_is_client_error() {
    let err = GeographyFamily::parse("state").unwrap_err();
    assert!(matches!(err, Error::UnknownFamily(ref s) if s == "state"));
  }

  #[test]
  fn schema_columns() {
    assert_eq!(SchemaKind::SiteBased.measure_column(), "site");
    assert_eq!(SchemaKind::SiteBased.value_column(), "rate");
    assert_eq!(SchemaKind::SiteBased.count_column(), Some("count"));
    assert_eq!(SchemaKind::TrendOrdinal.value_column(), "trend");
    assert_eq!(SchemaKind::Generic.count_column(), None);
  }

  #[test]
  fn table_name_includes_family() {
    let cat = MeasureCategory {
      name:   "radon".into(),
      label:  "Radon".into(),
      family: GeographyFamily::Tract,
      schema: SchemaKind::Generic,
    };
    assert_eq!(cat.table_name(), "radon_tract");
  }
}
