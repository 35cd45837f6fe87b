//! Loading long-format CSV files into a dataset.
//!
//! The accepted layout is the one `as-csv` produces: `GEOID`, the family's
//! name column (`County`, `Tract`, `Health Region` or `name`), `State`,
//! `measure`, `value`, an optional `count` and one column per declared factor.
//! Measure labels are mapped back to their keys; unknown labels are kept as
//! raw keys.

use std::{
  collections::{BTreeMap, HashMap},
  io::Read,
};

use ecco_core::{
  category::{Dataset, SchemaKind},
  trend::Trend,
  value::{CellValue, Geography},
};
use ecco_store_sqlite::{NewRow, SqliteStore};

use crate::{Error, Result};

/// What an import wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
  pub rows:        usize,
  pub geographies: usize,
}

struct Columns {
  geo_id:  usize,
  name:    Option<usize>,
  state:   Option<usize>,
  measure: usize,
  value:   usize,
  count:   Option<usize>,
  factors: Vec<(String, usize)>,
}

impl Columns {
  fn locate(headers: &csv::StringRecord, dataset: Dataset<'_>) -> Result<Self> {
    let find = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let require = |name: &str| find(name).ok_or_else(|| Error::MissingColumn(name.to_owned()));

    Ok(Self {
      geo_id:  require("GEOID")?,
      name:    find(dataset.family().name_header()).or_else(|| find("name")),
      state:   find("State"),
      measure: require("measure")?,
      value:   require("value")?,
      count:   find("count"),
      factors: dataset
        .factor_fields()
        .filter_map(|f| find(f).map(|i| (f.to_owned(), i)))
        .collect(),
    })
  }
}

fn cell(record: &csv::StringRecord, index: usize) -> &str {
  record.get(index).map(str::trim).unwrap_or_default()
}

fn parse_value(
  schema: SchemaKind,
  raw: &str,
  line: u64,
  table: &str,
) -> Result<Option<CellValue>> {
  if raw.is_empty() {
    return Ok(None);
  }
  let bad = || Error::BadValue {
    line,
    table: table.to_owned(),
    value: raw.to_owned(),
  };
  match schema {
    SchemaKind::TrendOrdinal => Trend::parse(raw).map(|t| Some(CellValue::Trend(t))).ok_or_else(bad),
    SchemaKind::Generic | SchemaKind::SiteBased => {
      raw.parse().map(|n| Some(CellValue::Number(n))).map_err(|_| bad())
    }
  }
}

/// Read every record of `reader` into `dataset`, upserting the geographies it
/// names. Rows are written in one transaction.
pub async fn import_csv<R: Read>(
  store: &SqliteStore,
  dataset: Dataset<'_>,
  reader: R,
) -> Result<ImportSummary> {
  let table = dataset.category.table_name();
  let mut rdr = csv::Reader::from_reader(reader);
  let columns = Columns::locate(rdr.headers()?, dataset)?;

  let keys_by_label: HashMap<&str, &str> = dataset
    .meta
    .declared_measures()
    .map(|d| (d.label.as_str(), d.key.as_str()))
    .collect();

  let mut rows = Vec::new();
  let mut geographies: BTreeMap<String, Geography> = BTreeMap::new();

  for record in rdr.records() {
    let record = record?;
    let line = record.position().map_or(0, |p| p.line());

    let geo_id = cell(&record, columns.geo_id).to_owned();
    let measure = cell(&record, columns.measure);
    let measure = keys_by_label.get(measure).copied().unwrap_or(measure).to_owned();
    let value = parse_value(dataset.schema(), cell(&record, columns.value), line, &table)?;
    let count = match columns.count.map(|i| cell(&record, i)) {
      Some(raw) if !raw.is_empty() => Some(raw.parse().map_err(|_| Error::BadValue {
        line,
        table: table.clone(),
        value: raw.to_owned(),
      })?),
      _ => None,
    };
    let factors = columns
      .factors
      .iter()
      .map(|(field, i)| (field.clone(), cell(&record, *i)))
      .filter(|(_, v)| !v.is_empty())
      .map(|(field, v)| (field, v.to_owned()))
      .collect();

    if let Some(name) = columns.name.map(|i| cell(&record, i)).filter(|n| !n.is_empty()) {
      let state = columns
        .state
        .map(|i| cell(&record, i))
        .filter(|s| !s.is_empty())
        .map(str::to_owned);
      geographies.entry(geo_id.clone()).or_insert_with(|| Geography {
        family: dataset.family(),
        geo_id: geo_id.clone(),
        name: name.to_owned(),
        state,
      });
    }

    rows.push(NewRow { geo_id, measure, value, count, factors });
  }

  let geography_count = geographies.len();
  for geography in geographies.into_values() {
    store.upsert_geography(geography).await?;
  }
  let written = store.insert_rows(dataset, rows).await?;

  tracing::info!(%table, rows = written, geographies = geography_count, "import complete");
  Ok(ImportSummary {
    rows:        written,
    geographies: geography_count,
  })
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use ecco_core::{Catalog, Engine, GeographyFamily, QuerySettings};

  use super::*;

  const RADON: &str = "\
GEOID,County,State,measure,value
08031,Denver County,Colorado,Percentage of Tests over 4 pCi/L,41.5
08001,Adams County,Colorado,NTests,1200
08005,Arapahoe County,Colorado,PctOver4,
";

  #[tokio::test]
  async fn export_layout_round_trips() {
    let catalog = Catalog::builtin().unwrap();
    let store = SqliteStore::open_in_memory(&catalog).await.unwrap();
    let dataset = catalog.dataset(GeographyFamily::County, "radon").unwrap();

    let summary = import_csv(&store, dataset, RADON.as_bytes()).await.unwrap();
    assert_eq!(summary, ImportSummary { rows: 3, geographies: 3 });

    let engine = Engine::new(Arc::new(store), Arc::new(catalog), QuerySettings::default());
    let map = engine
      .fips_value(GeographyFamily::County, "radon", "PctOver4", None)
      .await
      .unwrap();
    assert_eq!(map.values["08031"].value, Some(CellValue::Number(41.5)));
    assert_eq!(map.values["08005"].value, None);

    let measures = engine
      .dataset_measures(GeographyFamily::County, "radon")
      .await
      .unwrap();
    assert_eq!(measures, vec!["NTests", "PctOver4"]);
  }

  #[tokio::test]
  async fn factor_columns_are_read() {
    let catalog = Catalog::builtin().unwrap();
    let store = SqliteStore::open_in_memory(&catalog).await.unwrap();
    let dataset = catalog.dataset(GeographyFamily::County, "hpv").unwrap();
    let csv = "GEOID,County,State,measure,value,sex\n08031,Denver County,Colorado,Up-To-Date Percent,60,Female\n";

    import_csv(&store, dataset, csv.as_bytes()).await.unwrap();

    let engine = Engine::new(Arc::new(store), Arc::new(catalog), QuerySettings::default());
    let map = engine
      .fips_value(GeographyFamily::County, "hpv", "Up-To-Date Percent", Some("sex:Female"))
      .await
      .unwrap();
    assert_eq!(map.values.len(), 1);
  }

  #[tokio::test]
  async fn unreadable_values_are_rejected() {
    let catalog = Catalog::builtin().unwrap();
    let store = SqliteStore::open_in_memory(&catalog).await.unwrap();
    let dataset = catalog.dataset(GeographyFamily::County, "radon").unwrap();
    let csv = "GEOID,measure,value\n08031,PctOver4,lots\n";

    let err = import_csv(&store, dataset, csv.as_bytes()).await.unwrap_err();
    assert!(matches!(err, Error::BadValue { line: 2, .. }), "{err}");
  }

  #[tokio::test]
  async fn missing_columns_are_rejected() {
    let catalog = Catalog::builtin().unwrap();
    let store = SqliteStore::open_in_memory(&catalog).await.unwrap();
    let dataset = catalog.dataset(GeographyFamily::County, "radon").unwrap();

    let err = import_csv(&store, dataset, "GEOID,value\n".as_bytes())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::MissingColumn(ref c) if c == "measure"));
  }
}
