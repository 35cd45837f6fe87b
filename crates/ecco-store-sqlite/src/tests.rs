//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeMap;

use ecco_core::{
  Catalog, GeographyFamily,
  category::Dataset,
  clause::{ConstraintClause, FactorConstraints},
  store::{RowQuery, Selection, StatsStore},
  trend::Trend,
  value::{CellValue, Geography, StateStat},
};

use crate::{Error, NewRow, SqliteStore};

async fn store(catalog: &Catalog) -> SqliteStore {
  SqliteStore::open_in_memory(catalog)
    .await
    .expect("in-memory store")
}

fn catalog() -> Catalog { Catalog::builtin().expect("builtin catalog") }

fn dataset<'a>(catalog: &'a Catalog, family: GeographyFamily, name: &str) -> Dataset<'a> {
  catalog.dataset(family, name).expect("dataset")
}

fn county(geo_id: &str, name: &str, state: &str) -> Geography {
  Geography {
    family: GeographyFamily::County,
    geo_id: geo_id.into(),
    name:   name.into(),
    state:  Some(state.into()),
  }
}

fn row(geo_id: &str, measure: &str, value: f64, factors: &[(&str, &str)]) -> NewRow {
  NewRow {
    geo_id:  geo_id.into(),
    measure: measure.into(),
    value:   Some(CellValue::Number(value)),
    count:   None,
    factors: factors
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect(),
  }
}

async fn seed_geographies(s: &SqliteStore) {
  s.upsert_geography(county("08031", "Denver County", "Colorado"))
    .await
    .unwrap();
  s.upsert_geography(county("08001", "Adams County", "Colorado"))
    .await
    .unwrap();
  s.upsert_geography(county("56001", "Albany County", "Wyoming"))
    .await
    .unwrap();
}

// ─── Schema ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reopening_schema_is_idempotent() {
  let dir = std::env::temp_dir().join(format!("ecco-store-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("stats.db");
  let _ = std::fs::remove_file(&path);

  let c = catalog();
  SqliteStore::open(&path, &c).await.unwrap();
  SqliteStore::open(&path, &c).await.unwrap();
  let _ = std::fs::remove_dir_all(&dir);
}

// ─── Geographies ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn unknown_geography_is_none() {
  let c = catalog();
  let s = store(&c).await;
  seed_geographies(&s).await;

  assert!(s.geography(GeographyFamily::County, "99999").await.unwrap().is_none());
  // Same id in another family is a different geography.
  assert!(s.geography(GeographyFamily::Tract, "08031").await.unwrap().is_none());

  let denver = s.geography(GeographyFamily::County, "08031").await.unwrap().unwrap();
  assert_eq!(denver.name, "Denver County");
  assert_eq!(denver.state.as_deref(), Some("Colorado"));
}

#[tokio::test]
async fn upsert_geography_replaces_name() {
  let c = catalog();
  let s = store(&c).await;
  s.upsert_geography(county("08031", "Denver", "Colorado")).await.unwrap();
  s.upsert_geography(county("08031", "Denver County", "Colorado")).await.unwrap();

  let g = s.geography(GeographyFamily::County, "08031").await.unwrap().unwrap();
  assert_eq!(g.name, "Denver County");
}

// ─── Measures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn distinct_measures_sorted_and_state_scoped() {
  let c = catalog();
  let s = store(&c).await;
  seed_geographies(&s).await;
  let d = dataset(&c, GeographyFamily::County, "rfandscreening");

  s.insert_rows(d, vec![
    row("08031", "Diabetes_DX", 9.0, &[]),
    row("08031", "BMI_Obese", 20.0, &[]),
    row("56001", "Asthma", 10.0, &[]),
  ])
  .await
  .unwrap();

  assert_eq!(s.distinct_measures(d, None).await.unwrap(), vec![
    "Asthma",
    "BMI_Obese",
    "Diabetes_DX"
  ]);
  assert_eq!(s.distinct_measures(d, Some("Colorado")).await.unwrap(), vec![
    "BMI_Obese",
    "Diabetes_DX"
  ]);
}

#[tokio::test]
async fn observed_values_are_per_measure() {
  let c = catalog();
  let s = store(&c).await;
  let d = dataset(&c, GeographyFamily::County, "hpv");

  s.insert_rows(d, vec![
    row("08031", "Up-To-Date Percent", 60.0, &[("sex", "Female")]),
    row("08031", "Up-To-Date Percent", 55.0, &[("sex", "Male")]),
    row("08031", "Other", 1.0, &[]),
  ])
  .await
  .unwrap();

  let observed = s.observed_factor_values(d, None).await.unwrap();
  let sexes: Vec<&str> = observed["Up-To-Date Percent"]["sex"]
    .iter()
    .map(String::as_str)
    .collect();
  assert_eq!(sexes, vec!["Female", "Male"]);
  // A measure with only null factors still has an entry.
  assert!(observed["Other"]["sex"].is_empty());

  let only = s
    .observed_factor_values(d, Some(&["Other".to_string()]))
    .await
    .unwrap();
  assert_eq!(only.len(), 1);
}

// ─── Selection ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn clause_constrains_each_measure_independently() {
  let c = catalog();
  let s = store(&c).await;
  seed_geographies(&s).await;
  let d = dataset(&c, GeographyFamily::County, "cancerincidence");

  s.insert_rows(d, vec![
    row("08031", "Lung", 50.0, &[("RE", "All"), ("Sex", "All")]),
    row("08031", "Lung", 70.0, &[("RE", "All"), ("Sex", "Male")]),
    row("08031", "Prostate", 120.0, &[("RE", "All"), ("Sex", "Male")]),
  ])
  .await
  .unwrap();

  let constraints: FactorConstraints = BTreeMap::from([
    (
      "Lung".to_string(),
      BTreeMap::from([("Sex".to_string(), "All".to_string())]),
    ),
    (
      "Prostate".to_string(),
      BTreeMap::from([("Sex".to_string(), "Male".to_string())]),
    ),
  ]);
  let selection = Selection::clause(ConstraintClause::from_constraints(&constraints));
  let rows = s.select_values(d, &selection).await.unwrap();

  let got: Vec<(&str, Option<CellValue>)> =
    rows.iter().map(|r| (r.measure.as_str(), r.value)).collect();
  assert_eq!(got, vec![
    ("Lung", Some(CellValue::Number(50.0))),
    ("Prostate", Some(CellValue::Number(120.0))),
  ]);
  assert_eq!(rows[0].geo_name.as_deref(), Some("Denver County"));
  assert_eq!(rows[0].factors.len(), 2);
}

#[tokio::test]
async fn empty_clause_selects_nothing() {
  let c = catalog();
  let s = store(&c).await;
  let d = dataset(&c, GeographyFamily::County, "radon");
  s.insert_rows(d, vec![row("08031", "PctOver4", 40.0, &[])])
    .await
    .unwrap();

  let rows = s
    .select_values(d, &Selection::clause(ConstraintClause::default()))
    .await
    .unwrap();
  assert!(rows.is_empty());
}

#[tokio::test]
async fn site_rows_carry_counts() {
  let c = catalog();
  let s = store(&c).await;
  let d = dataset(&c, GeographyFamily::County, "cancermortality");
  let mut lung = row("08031", "Lung", 30.0, &[("RE", "All"), ("Sex", "All")]);
  lung.count = Some(210.0);
  s.insert_rows(d, vec![lung]).await.unwrap();

  let rows = s
    .select_values(d, &Selection {
      measure: Some("Lung".into()),
      ..Selection::default()
    })
    .await
    .unwrap();
  assert_eq!(rows[0].count, Some(210.0));
}

// ─── Ranges ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn numeric_range_ignores_state_scope() {
  let c = catalog();
  let s = store(&c).await;
  seed_geographies(&s).await;
  let d = dataset(&c, GeographyFamily::County, "rfandscreening");
  s.insert_rows(d, vec![
    row("08031", "BMI_Obese", 20.0, &[]),
    row("08001", "BMI_Obese", 30.0, &[]),
    row("56001", "BMI_Obese", 35.0, &[]),
    row("56001", "Asthma", 90.0, &[]),
  ])
  .await
  .unwrap();

  let clause = ConstraintClause::single("BMI_Obese", &BTreeMap::new());
  let range = s.value_range(d, &clause).await.unwrap().unwrap();
  assert_eq!(range.min, CellValue::Number(20.0));
  assert_eq!(range.max, CellValue::Number(35.0));
}

#[tokio::test]
async fn trend_range_uses_ranks_and_skips_empty_labels() {
  let c = catalog();
  let s = store(&c).await;
  let d = dataset(&c, GeographyFamily::County, "scpincidencetrend");

  let trend = |geo: &str, t: Option<Trend>| NewRow {
    geo_id:  geo.into(),
    measure: "Lung & Bronchus".into(),
    value:   t.map(CellValue::Trend),
    count:   None,
    factors: BTreeMap::new(),
  };
  s.insert_rows(d, vec![
    trend("08031", Some(Trend::Stable)),
    trend("08001", Some(Trend::Rising)),
    trend("56001", None),
  ])
  .await
  .unwrap();

  let clause = ConstraintClause::single("Lung & Bronchus", &BTreeMap::new());
  let range = s.value_range(d, &clause).await.unwrap().unwrap();
  assert_eq!(range.min, CellValue::Trend(Trend::Stable));
  assert_eq!(range.max, CellValue::Trend(Trend::Rising));
}

#[tokio::test]
async fn range_of_nothing_is_none() {
  let c = catalog();
  let s = store(&c).await;
  let d = dataset(&c, GeographyFamily::County, "radon");
  let clause = ConstraintClause::single("PctOver4", &BTreeMap::new());
  assert!(s.value_range(d, &clause).await.unwrap().is_none());
}

// ─── Rows ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_rows_paginates_with_total() {
  let c = catalog();
  let s = store(&c).await;
  seed_geographies(&s).await;
  let d = dataset(&c, GeographyFamily::County, "radon");
  s.insert_rows(d, vec![
    row("08031", "PctOver4", 40.0, &[]),
    row("08001", "PctOver4", 45.0, &[]),
    row("56001", "PctOver4", 50.0, &[]),
  ])
  .await
  .unwrap();

  let page = s
    .list_rows(d, &RowQuery { limit: 2, offset: 0, ..RowQuery::default() })
    .await
    .unwrap();
  assert_eq!(page.total, 3);
  assert_eq!(page.items.len(), 2);
  assert_eq!(page.items[0]["fips"], "08001");
  assert_eq!(page.items[0]["name"], "Adams County");
  assert_eq!(page.items[0]["value"], 45.0);

  let scoped = s
    .list_rows(d, &RowQuery {
      state: Some("Wyoming".into()),
      limit: 10,
      ..RowQuery::default()
    })
    .await
    .unwrap();
  assert_eq!(scoped.total, 1);
}

// ─── Loading ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_rejects_undeclared_factor() {
  let c = catalog();
  let s = store(&c).await;
  let d = dataset(&c, GeographyFamily::County, "radon");
  let err = s
    .insert_rows(d, vec![row("08031", "PctOver4", 1.0, &[("sex", "All")])])
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownFactor { .. }));
}

#[tokio::test]
async fn insert_rejects_trend_in_numeric_table() {
  let c = catalog();
  let s = store(&c).await;
  let d = dataset(&c, GeographyFamily::County, "radon");
  let mut bad = row("08031", "PctOver4", 1.0, &[]);
  bad.value = Some(CellValue::Trend(Trend::Rising));
  let err = s.insert_rows(d, vec![bad]).await.unwrap_err();
  assert!(matches!(err, Error::ValueKind { .. }));
}

#[tokio::test]
async fn state_stats_round_trip() {
  let c = catalog();
  let s = store(&c).await;
  let d = dataset(&c, GeographyFamily::County, "hpv");
  let stat = StateStat {
    measure:   "Up-To-Date Percent".into(),
    factors:   BTreeMap::from([("sex".to_string(), "All".to_string())]),
    state_avg: Some(61.5),
    us_avg:    Some(58.0),
  };
  s.insert_state_stat(d, stat.clone()).await.unwrap();

  assert_eq!(s.state_stats(d).await.unwrap(), vec![stat]);
  let other = dataset(&c, GeographyFamily::County, "radon");
  assert!(s.state_stats(other).await.unwrap().is_empty());
}
