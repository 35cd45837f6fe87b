//! The by-geography document: every category's measures for one geography,
//! side by side with state-level comparison values.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::{
  aggregate::summarize_by_measure,
  category::{GeographyFamily, SchemaKind},
  clause::ConstraintClause,
  engine::{Engine, StateSource},
  error::{Error, Result},
  filter::parse_filter_str,
  measure::MeasureUnit,
  resolve::{FactorChoices, resolve_constraints},
  store::{Selection, StatsStore},
  value::{CellValue, OrderedMap},
};

#[derive(Debug, Clone, Serialize)]
pub struct GeographyReport {
  #[serde(rename = "FIPS")]
  pub fips:       String,
  pub name:       String,
  pub categories: OrderedMap<CategoryReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryReport {
  pub label:    String,
  pub measures: OrderedMap<MeasureReport>,
}

/// Case counts reported alongside cancer-convention rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SiteCounts {
  pub count:       Option<f64>,
  pub state_count: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasureReport {
  pub label:        String,
  pub unit:         Option<MeasureUnit>,
  pub value:        Option<CellValue>,
  #[serde(flatten)]
  pub counts:       Option<SiteCounts>,
  pub state_value:  Option<CellValue>,
  pub state_source: Option<StateSource>,
  pub us_value:     Option<f64>,
  pub source:       Option<String>,
  pub source_url:   Option<String>,
  /// Factor values this entry was computed with.
  pub factors:      BTreeMap<String, String>,
}

impl<S: StatsStore> Engine<S> {
  /// Compose every category of `family` for one geography.
  ///
  /// Each measure is held at its own effective defaults unless `filters`
  /// names a factor, in which case that choice applies to every category
  /// declaring the factor.
  pub async fn by_geography(
    &self,
    family: GeographyFamily,
    geo_id: &str,
    filters: Option<&str>,
  ) -> Result<GeographyReport> {
    let geography = self
      .store()
      .geography(family, geo_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::GeographyNotFound {
        family,
        geo_id: geo_id.to_owned(),
      })?;

    let filters = filters
      .map(parse_filter_str)
      .transpose()?
      .unwrap_or_default();
    let declared: HashSet<&str> = self
      .catalog()
      .datasets(family)
      .flat_map(|ds| ds.factor_fields())
      .collect();
    if let Some(unknown) = filters.keys().find(|k| !declared.contains(k.as_str())) {
      return Err(Error::UnknownFactor {
        scope:  format!("{family} categories"),
        factor: unknown.clone(),
      });
    }

    let mut categories = OrderedMap::new();
    for dataset in self.catalog().datasets(family) {
      let applicable: BTreeMap<String, String> = filters
        .iter()
        .filter(|(k, _)| dataset.meta.factor(k).is_some())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

      let observed = self
        .store()
        .observed_factor_values(dataset, None)
        .await
        .map_err(Error::store)?;
      let choices: FactorChoices = if applicable.is_empty() {
        FactorChoices::new()
      } else {
        observed
          .keys()
          .map(|m| (m.clone(), applicable.clone()))
          .collect()
      };
      let constraints = resolve_constraints(
        dataset.meta,
        observed.keys().map(String::as_str),
        &observed,
        &choices,
      );
      let clause = ConstraintClause::from_constraints(&constraints);

      let rows = self
        .store()
        .select_values(dataset, &Selection::clause(clause.clone()).for_geography(geo_id))
        .await
        .map_err(Error::store)?;
      let local = summarize_by_measure(&rows);
      let state = self.state_values(dataset, &clause).await?;

      let site = dataset.schema() == SchemaKind::SiteBased;
      let mut entries = OrderedMap::new();
      for (measure, factors) in constraints {
        let value = local.get(&measure).copied().unwrap_or_default();
        let state_value = state.get(&measure).copied();
        if value.is_empty() && state_value.is_none() {
          continue;
        }
        let desc = dataset.meta.measure(&measure);
        if desc.as_ref().is_some_and(|d| !d.scope.applies_to(family)) {
          continue;
        }

        let report = MeasureReport {
          label: dataset.meta.measure_label(&measure).into_owned(),
          unit: desc.as_ref().map(|d| d.unit),
          value: value.value,
          counts: site.then(|| SiteCounts {
            count:       value.count,
            state_count: state_value.and_then(|s| s.count),
          }),
          state_value: state_value.and_then(|s| s.value),
          state_source: state_value.map(|s| s.source),
          us_value: state_value.and_then(|s| s.us_value),
          source: desc.as_ref().and_then(|d| d.source.clone()),
          source_url: desc.as_ref().and_then(|d| d.source_url.clone()),
          factors,
        };
        entries.push(measure, report);
      }

      categories.push(dataset.name(), CategoryReport {
        label:    dataset.category.label.clone(),
        measures: entries,
      });
    }

    Ok(GeographyReport {
      fips: geography.geo_id,
      name: geography.name,
      categories,
    })
  }
}
