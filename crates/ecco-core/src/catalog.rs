//! The measure catalog: category registry plus measure and factor metadata.
//!
//! The catalog is a TOML document. The built-in deployment catalog is embedded
//! at compile time; [`Catalog::from_toml`] accepts an alternative. Either way
//! it is parsed and validated exactly once, before anything is served, and is
//! immutable afterwards.
//!
//! ```toml
//! [[category]]
//! name     = "hpv"
//! label    = "HPV Vaccination"
//! families = ["county"]
//!
//! [[category.factors]]
//! field   = "sex"
//! label   = "Sex"
//! default = "Both"
//! values  = { Both = "Both", Female = "Female", Male = "Male" }
//!
//! [category.measures.vaccinated]
//! label = "HPV Vaccination Rate"
//! unit  = "percent"
//! ```

use std::{
  borrow::Cow,
  collections::{BTreeMap, HashMap, HashSet},
};

use serde::Deserialize;

use crate::{
  category::{Dataset, GeographyFamily, MeasureCategory, SchemaKind},
  error::{Error, Result},
  measure::{
    CategoryMeta, FactorDescriptor, MeasureDescriptor, MeasureFallback,
    MeasureScope, MeasureUnit,
  },
};

const BUILTIN: &str = include_str!("../catalog.toml");

/// Column names every generated table already uses; factors may not shadow
/// them.
pub const RESERVED_COLUMNS: &[&str] = &[
  "id", "fips", "name", "state", "measure", "site", "value", "rate", "count",
  "trend",
];

static EMPTY_META: CategoryMeta = CategoryMeta::EMPTY;

// ─── Raw document ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
  #[serde(default)]
  category: Vec<RawCategory>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCategory {
  name:            String,
  label:           String,
  families:        Vec<GeographyFamily>,
  #[serde(default)]
  site_schema:     bool,
  #[serde(default)]
  trend_schema:    bool,
  default_measure: Option<RawFallback>,
  #[serde(default)]
  factors:         Vec<RawFactor>,
  #[serde(default)]
  measures:        BTreeMap<String, RawMeasure>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFallback {
  unit:       MeasureUnit,
  source:     Option<String>,
  source_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFactor {
  field:   String,
  label:   String,
  default: Option<String>,
  #[serde(default)]
  values:  BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMeasure {
  label:       Option<String>,
  unit:        Option<MeasureUnit>,
  source:      Option<String>,
  source_url:  Option<String>,
  #[serde(default)]
  county_only: bool,
  #[serde(default)]
  tract_only:  bool,
  order:       Option<Vec<String>>,
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Immutable registry of every category, keyed by geography family.
#[derive(Debug, Clone)]
pub struct Catalog {
  families: BTreeMap<GeographyFamily, Vec<MeasureCategory>>,
  meta:     HashMap<String, CategoryMeta>,
}

impl Catalog {
  /// The catalog embedded in this crate.
  pub fn builtin() -> Result<Self> { Self::from_toml(BUILTIN) }

  /// Parse and validate a catalog document.
  pub fn from_toml(src: &str) -> Result<Self> {
    let raw: RawCatalog = toml::from_str(src)?;

    let mut families: BTreeMap<GeographyFamily, Vec<MeasureCategory>> =
      BTreeMap::new();
    let mut meta = HashMap::new();

    for cat in raw.category {
      let (category_meta, schema) = build_category(&cat)?;
      if meta.contains_key(&cat.name) {
        return Err(Error::invalid_catalog(&cat.name, "declared more than once"));
      }

      for family in &cat.families {
        families.entry(*family).or_default().push(MeasureCategory {
          name:   cat.name.clone(),
          label:  cat.label.clone(),
          family: *family,
          schema,
        });
      }
      meta.insert(cat.name, category_meta);
    }

    Ok(Self { families, meta })
  }

  /// Every family with its categories in registry order.
  pub fn categories_by_family(
    &self,
  ) -> &BTreeMap<GeographyFamily, Vec<MeasureCategory>> {
    &self.families
  }

  pub fn categories(&self, family: GeographyFamily) -> &[MeasureCategory] {
    self.families.get(&family).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn category(
    &self,
    family: GeographyFamily,
    name: &str,
  ) -> Option<&MeasureCategory> {
    self.categories(family).iter().find(|c| c.name == name)
  }

  pub fn dataset(&self, family: GeographyFamily, name: &str) -> Option<Dataset<'_>> {
    self.category(family, name).map(|category| self.pair(category))
  }

  /// Every dataset of a family, in registry order.
  pub fn datasets(
    &self,
    family: GeographyFamily,
  ) -> impl Iterator<Item = Dataset<'_>> + '_ {
    self.categories(family).iter().map(|c| self.pair(c))
  }

  /// Every dataset across all families.
  pub fn all_datasets(&self) -> impl Iterator<Item = Dataset<'_>> + '_ {
    self
      .families
      .values()
      .flatten()
      .map(|c| self.pair(c))
  }

  /// Metadata for a category; empty when the category declares none.
  pub fn meta(&self, category: &str) -> &CategoryMeta {
    self.meta.get(category).unwrap_or(&EMPTY_META)
  }

  pub fn measure_descriptor(
    &self,
    category: &str,
    measure: &str,
  ) -> Option<Cow<'_, MeasureDescriptor>> {
    self.meta(category).measure(measure)
  }

  /// Declared factors in declaration order.
  pub fn factor_descriptors(&self, category: &str) -> &[FactorDescriptor] {
    self.meta(category).factors()
  }

  fn pair<'a>(&'a self, category: &'a MeasureCategory) -> Dataset<'a> {
    Dataset { category, meta: self.meta(&category.name) }
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

fn build_category(cat: &RawCategory) -> Result<(CategoryMeta, SchemaKind)> {
  let name = cat.name.as_str();

  if !is_identifier(name) || name.chars().any(|c| c.is_ascii_uppercase()) {
    return Err(Error::invalid_catalog(
      name,
      "name must be a lowercase slug",
    ));
  }
  if cat.families.is_empty() {
    return Err(Error::invalid_catalog(name, "no geography families"));
  }
  let unique_families: HashSet<_> = cat.families.iter().collect();
  if unique_families.len() != cat.families.len() {
    return Err(Error::invalid_catalog(name, "geography family repeated"));
  }

  let schema = match (cat.site_schema, cat.trend_schema) {
    (true, true) => {
      return Err(Error::invalid_catalog(
        name,
        "site_schema and trend_schema are mutually exclusive",
      ));
    }
    (true, false) => SchemaKind::SiteBased,
    (false, true) => SchemaKind::TrendOrdinal,
    (false, false) => SchemaKind::Generic,
  };

  let mut factors = Vec::with_capacity(cat.factors.len());
  for f in &cat.factors {
    if !is_identifier(&f.field) {
      return Err(Error::invalid_catalog(
        name,
        format!("factor field {:?} is not a column identifier", f.field),
      ));
    }
    if RESERVED_COLUMNS.contains(&f.field.to_ascii_lowercase().as_str()) {
      return Err(Error::invalid_catalog(
        name,
        format!("factor field {:?} shadows a built-in column", f.field),
      ));
    }
    if factors
      .iter()
      .any(|seen: &FactorDescriptor| seen.field.eq_ignore_ascii_case(&f.field))
    {
      return Err(Error::invalid_catalog(
        name,
        format!("factor field {:?} declared more than once", f.field),
      ));
    }
    factors.push(FactorDescriptor {
      field:   f.field.clone(),
      label:   f.label.clone(),
      default: f.default.clone(),
      values:  f.values.clone(),
    });
  }

  let mut measures = BTreeMap::new();
  for (key, m) in &cat.measures {
    let Some(unit) = m.unit else {
      return Err(Error::invalid_catalog(
        name,
        format!("measure {key:?} has no unit"),
      ));
    };
    let scope = match (m.county_only, m.tract_only) {
      (true, true) => {
        return Err(Error::invalid_catalog(
          name,
          format!("measure {key:?} is both county_only and tract_only"),
        ));
      }
      (true, false) => MeasureScope::CountyOnly,
      (false, true) => MeasureScope::TractOnly,
      (false, false) => MeasureScope::All,
    };
    measures.insert(key.clone(), MeasureDescriptor {
      key: key.clone(),
      label: m.label.clone().unwrap_or_else(|| key.clone()),
      unit,
      source: m.source.clone(),
      source_url: m.source_url.clone(),
      scope,
      order: m.order.clone(),
    });
  }

  let fallback = cat.default_measure.as_ref().map(|d| MeasureFallback {
    unit:       d.unit,
    source:     d.source.clone(),
    source_url: d.source_url.clone(),
  });

  Ok((CategoryMeta { measures, fallback, factors }, schema))
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_catalog_loads() {
    let catalog = Catalog::builtin().unwrap();
    let county: Vec<_> = catalog
      .categories(GeographyFamily::County)
      .iter()
      .map(|c| c.name.as_str())
      .collect();
    assert_eq!(county.first(), Some(&"sociodemographics"));
    assert!(county.contains(&"cancerincidence"));
    assert!(!county.contains(&"fooddesert"));

    let tract = catalog.categories(GeographyFamily::Tract);
    assert!(tract.iter().any(|c| c.name == "fooddesert"));

    let regions = catalog.categories(GeographyFamily::HealthRegion);
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].name, "vaping");
  }

  #[test]
  fn builtin_schema_kinds() {
    let catalog = Catalog::builtin().unwrap();
    let kind = |name: &str| {
      catalog
        .category(GeographyFamily::County, name)
        .unwrap()
        .schema
    };
    assert_eq!(kind("cancerincidence"), SchemaKind::SiteBased);
    assert_eq!(kind("scpdeathstrend"), SchemaKind::TrendOrdinal);
    assert_eq!(kind("rfandscreening"), SchemaKind::Generic);
  }

  #[test]
  fn builtin_measures_carry_units() {
    let catalog = Catalog::builtin().unwrap();
    for ds in catalog.all_datasets() {
      for m in ds.meta.declared_measures() {
        assert!(!m.label.is_empty(), "{}::{}", ds.name(), m.key);
      }
    }
    let bmi = catalog
      .measure_descriptor("rfandscreening", "BMI_Obese")
      .unwrap();
    assert_eq!(bmi.unit, MeasureUnit::Percent);
  }

  #[test]
  fn open_ended_sites_use_fallback() {
    let catalog = Catalog::builtin().unwrap();
    let desc = catalog
      .measure_descriptor("scpincidence", "Pancreas")
      .unwrap();
    assert_eq!(desc.label, "Pancreas");
    assert_eq!(desc.unit, MeasureUnit::Rate);
  }

  #[test]
  fn unknown_category_has_no_metadata() {
    let catalog = Catalog::builtin().unwrap();
    assert!(catalog.measure_descriptor("nope", "x").is_none());
    assert!(catalog.factor_descriptors("nope").is_empty());
  }

  #[test]
  fn rejects_both_schema_flags() {
    let err = Catalog::from_toml(
      r#"
        [[category]]
        name = "bad"
        label = "Bad"
        families = ["county"]
        site_schema = true
        trend_schema = true
      "#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidCatalog { .. }));
    assert_eq!(err.kind(), crate::ErrorKind::Configuration);
  }

  #[test]
  fn rejects_measure_without_unit() {
    let err = Catalog::from_toml(
      r#"
        [[category]]
        name = "bad"
        label = "Bad"
        families = ["county"]
        [category.measures.x]
        label = "X"
      "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("no unit"));
  }

  #[test]
  fn rejects_conflicting_scope() {
    let err = Catalog::from_toml(
      r#"
        [[category]]
        name = "bad"
        label = "Bad"
        families = ["county", "tract"]
        [category.measures.x]
        unit = "percent"
        county_only = true
        tract_only = true
      "#,
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidCatalog { .. }));
  }

  #[test]
  fn rejects_reserved_factor_field() {
    let err = Catalog::from_toml(
      r#"
        [[category]]
        name = "bad"
        label = "Bad"
        families = ["county"]
        [[category.factors]]
        field = "Value"
        label = "Value"
      "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("built-in column"));
  }

  #[test]
  fn tolerates_default_missing_from_values() {
    let catalog = Catalog::from_toml(
      r#"
        [[category]]
        name = "ok"
        label = "Ok"
        families = ["county"]
        [[category.factors]]
        field = "sex"
        label = "Sex"
        default = "Both"
        values = { Female = "Female" }
      "#,
    )
    .unwrap();
    let sex = &catalog.factor_descriptors("ok")[0];
    assert_eq!(sex.value_label("Both"), "Both");
  }

  #[test]
  fn rejects_duplicate_category() {
    let err = Catalog::from_toml(
      r#"
        [[category]]
        name = "dup"
        label = "A"
        families = ["county"]
        [[category]]
        name = "dup"
        label = "B"
        families = ["tract"]
      "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("more than once"));
  }
}
