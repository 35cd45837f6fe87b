//! Per-dataset queries: the measures overview, distinct measures, raw rows,
//! the geography → value map and CSV export rows.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
  aggregate::summarize_by_geography,
  category::{Dataset, GeographyFamily, SchemaKind},
  clause::ConstraintClause,
  engine::{Engine, StateSource},
  error::{Error, Result},
  filter::parse_filter_str,
  measure::{MeasureDescriptor, MeasureUnit},
  resolve::{effective_default, nominal_constraints, validate_filters},
  store::{RowQuery, Selection, StatsStore},
  text::slugify,
  trend::Trend,
  value::{CellValue, OrderedMap, RowPage},
};

// ─── Response shapes ─────────────────────────────────────────────────────────

/// `family → {label, categories}`.
pub type MeasuresOverview = OrderedMap<FamilyOverview>;

#[derive(Debug, Clone, Serialize)]
pub struct FamilyOverview {
  pub label:      &'static str,
  pub categories: OrderedMap<CategoryOverview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryOverview {
  pub label:    String,
  pub measures: OrderedMap<MeasureOverview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasureOverview {
  pub label:      String,
  pub unit:       Option<MeasureUnit>,
  pub source:     Option<String>,
  pub source_url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order:      Option<Vec<String>>,
  pub factors:    OrderedMap<FactorOverview>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FactorOverview {
  pub label:   String,
  /// Effective default for this measure.
  pub default: Option<String>,
  /// Observed raw values → display labels.
  pub values:  OrderedMap<String>,
}

/// One entry of the geography → value map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapValue {
  pub value: Option<CellValue>,
  /// Average annual count, for cancer-convention categories.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub aac:   Option<f64>,
}

/// Response of the geography → value map query.
#[derive(Debug, Clone, Serialize)]
pub struct FipsValue {
  pub min:          Option<CellValue>,
  pub max:          Option<CellValue>,
  pub state:        Option<CellValue>,
  pub state_source: Option<StateSource>,
  pub unit:         Option<MeasureUnit>,
  pub source:       Option<String>,
  pub source_url:   Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub order:        Option<Vec<String>>,
  /// Factor constraints the values were selected with.
  pub factors:      BTreeMap<String, String>,
  pub values:       BTreeMap<String, MapValue>,
}

/// A CSV export, ready to be encoded.
#[derive(Debug, Clone)]
pub struct CsvExport {
  pub filename: String,
  pub header:   Vec<String>,
  pub rows:     Vec<Vec<String>>,
}

/// Ordinal label sequence reported for a measure, if it has one.
fn ordinal_order(dataset: Dataset<'_>, desc: Option<&MeasureDescriptor>) -> Option<Vec<String>> {
  match desc.and_then(|d| d.order.clone()) {
    Some(order) => Some(order),
    None if dataset.schema() == SchemaKind::TrendOrdinal => Some(Trend::labels()),
    None => None,
  }
}

fn parse_filters(filters: Option<&str>) -> Result<BTreeMap<String, String>> {
  filters.map(parse_filter_str).transpose().map(Option::unwrap_or_default)
}

/// Parse and validate `filters` for one dataset. A category without factors
/// rejects the parameter outright, even when it parses to nothing.
fn dataset_filters(
  dataset: Dataset<'_>,
  filters: Option<&str>,
) -> Result<BTreeMap<String, String>> {
  if filters.is_some() && dataset.meta.factors().is_empty() {
    return Err(Error::FiltersWithoutFactors(dataset.name().to_owned()));
  }
  let filters = parse_filters(filters)?;
  validate_filters(dataset.name(), dataset.meta, &filters)?;
  Ok(filters)
}

// ─── Queries ─────────────────────────────────────────────────────────────────

impl<S: StatsStore> Engine<S> {
  /// Every family, category and measure with its metadata and, per measure,
  /// the factor values observed in the data.
  pub async fn measures_overview(&self) -> Result<MeasuresOverview> {
    let mut families = OrderedMap::new();

    for (&family, categories) in self.catalog().categories_by_family() {
      let mut cats = OrderedMap::new();
      for category in categories {
        let dataset = self.dataset(family, &category.name)?;
        cats.push(category.name.clone(), CategoryOverview {
          label:    category.label.clone(),
          measures: self.overview_measures(dataset).await?,
        });
      }
      families.push(family.slug(), FamilyOverview {
        label:      family.label(),
        categories: cats,
      });
    }

    Ok(families)
  }

  async fn overview_measures(
    &self,
    dataset: Dataset<'_>,
  ) -> Result<OrderedMap<MeasureOverview>> {
    let observed = self
      .store()
      .observed_factor_values(dataset, None)
      .await
      .map_err(Error::store)?;

    let mut measures = OrderedMap::new();
    for (key, seen) in &observed {
      let desc = dataset.meta.measure(key);
      if desc
        .as_ref()
        .is_some_and(|d| !d.scope.applies_to(dataset.family()))
      {
        continue;
      }

      let factors = dataset
        .meta
        .factors()
        .iter()
        .map(|factor| {
          let values_seen = seen.get(&factor.field);
          let values = values_seen
            .into_iter()
            .flatten()
            .map(|raw| (raw.clone(), factor.value_label(raw).to_owned()))
            .collect();
          (factor.field.clone(), FactorOverview {
            label: factor.label.clone(),
            default: effective_default(factor, values_seen),
            values,
          })
        })
        .collect();

      measures.push(key.clone(), MeasureOverview {
        label:      dataset.meta.measure_label(key).into_owned(),
        unit:       desc.as_ref().map(|d| d.unit),
        source:     desc.as_ref().and_then(|d| d.source.clone()),
        source_url: desc.as_ref().and_then(|d| d.source_url.clone()),
        order:      ordinal_order(dataset, desc.as_deref()),
        factors,
      });
    }

    Ok(measures)
  }

  /// Sorted distinct measure keys of one dataset.
  pub async fn dataset_measures(
    &self,
    family: GeographyFamily,
    category: &str,
  ) -> Result<Vec<String>> {
    let dataset = self.dataset(family, category)?;
    self
      .store()
      .distinct_measures(dataset, self.limit_to_state())
      .await
      .map_err(Error::store)
  }

  /// One page of raw rows. `page` is 1-based.
  pub async fn dataset_rows(
    &self,
    family: GeographyFamily,
    category: &str,
    measure: Option<&str>,
    page: Option<u32>,
    size: Option<u32>,
  ) -> Result<RowPage> {
    let dataset = self.dataset(family, category)?;
    let settings = self.settings();

    let page = page.unwrap_or(1);
    let size = size.unwrap_or(settings.default_page_size);
    if page == 0 {
      return Err(Error::InvalidPage("page numbers start at 1".into()));
    }
    if size == 0 || size > settings.max_page_size {
      return Err(Error::InvalidPage(format!(
        "size must be between 1 and {}",
        settings.max_page_size
      )));
    }

    let query = RowQuery {
      measure: measure.map(str::to_owned),
      state:   settings.limit_to_state.clone(),
      limit:   size,
      offset:  u64::from(page - 1) * u64::from(size),
    };
    let rows = self
      .store()
      .list_rows(dataset, &query)
      .await
      .map_err(Error::store)?;

    Ok(RowPage {
      items: rows.items,
      total: rows.total,
      page,
      size,
      pages: rows.total.div_ceil(u64::from(size)),
    })
  }

  /// Geography → value map for one measure.
  ///
  /// Factors not named in `filters` are held at their nominal defaults. The
  /// same clause selects the map values (scoped to the configured state) and
  /// the global min/max.
  pub async fn fips_value(
    &self,
    family: GeographyFamily,
    category: &str,
    measure: &str,
    filters: Option<&str>,
  ) -> Result<FipsValue> {
    let dataset = self.dataset(family, category)?;
    let filters = dataset_filters(dataset, filters)?;

    let factors = nominal_constraints(dataset.meta, &filters);
    let clause = ConstraintClause::single(measure, &factors);

    let selection =
      Selection::clause(clause.clone()).in_state(self.settings().limit_to_state.clone());
    let rows = self
      .store()
      .select_values(dataset, &selection)
      .await
      .map_err(Error::store)?;
    let range = self
      .store()
      .value_range(dataset, &clause)
      .await
      .map_err(Error::store)?;
    let state = self.state_values(dataset, &clause).await?.remove(measure);

    let with_count = dataset.schema() == SchemaKind::SiteBased;
    let values = summarize_by_geography(&rows)
      .into_iter()
      .map(|(geo, summary)| {
        (geo, MapValue {
          value: summary.value,
          aac:   summary.count.filter(|_| with_count),
        })
      })
      .collect();

    let desc = dataset.meta.measure(measure);
    Ok(FipsValue {
      min: range.map(|r| r.min),
      max: range.map(|r| r.max),
      state: state.and_then(|s| s.value),
      state_source: state.map(|s| s.source),
      unit: desc.as_ref().map(|d| d.unit),
      source: desc.as_ref().and_then(|d| d.source.clone()),
      source_url: desc.as_ref().and_then(|d| d.source_url.clone()),
      order: ordinal_order(dataset, desc.as_deref()),
      factors,
      values,
    })
  }

  /// Flattened rows for CSV export, one per stored record.
  ///
  /// Only explicit `filters` constrain factors, so an unfiltered export holds
  /// every stratum.
  pub async fn csv_export(
    &self,
    family: GeographyFamily,
    category: &str,
    measure: Option<&str>,
    filters: Option<&str>,
  ) -> Result<CsvExport> {
    let dataset = self.dataset(family, category)?;
    let filters = dataset_filters(dataset, filters)?;

    let selection = Selection {
      measure: measure.map(str::to_owned),
      factors: filters,
      state: self.settings().limit_to_state.clone(),
      ..Selection::default()
    };
    let rows = self
      .store()
      .select_values(dataset, &selection)
      .await
      .map_err(Error::store)?;

    let mut header: Vec<String> = ["GEOID", family.name_header(), "State", "measure", "value"]
      .into_iter()
      .map(str::to_owned)
      .collect();
    header.extend(dataset.factor_fields().map(str::to_owned));

    let rows = rows
      .into_iter()
      .map(|row| {
        let mut fields = vec![
          row.geo_id,
          row.geo_name.unwrap_or_default(),
          row.state.unwrap_or_default(),
          dataset.meta.measure_label(&row.measure).into_owned(),
          row.value.map(CellValue::to_field).unwrap_or_default(),
        ];
        fields.extend(row.factors.into_iter().map(Option::unwrap_or_default));
        fields
      })
      .collect();

    let filename = format!(
      "{}_{}_{}.csv",
      self.settings().export_prefix,
      slugify(measure.unwrap_or(dataset.name())),
      family
    );

    Ok(CsvExport { filename, header, rows })
  }
}
