//! SQL schema for the ECCO SQLite store.
//!
//! Shared tables are created from [`BASE_SCHEMA`]; every catalog dataset gets
//! its own table from [`dataset_ddl`]. All statements are idempotent.

use crate::sql::{TableSpec, quote};

/// Shared tables; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const BASE_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS geographies (
    family  TEXT NOT NULL,   -- 'county' | 'tract' | 'healthregion'
    geo_id  TEXT NOT NULL,   -- FIPS or region id
    name    TEXT NOT NULL,
    state   TEXT,
    PRIMARY KEY (family, geo_id)
);

CREATE INDEX IF NOT EXISTS geographies_state_idx ON geographies(family, state);

-- Precomputed state-level comparison values.
CREATE TABLE IF NOT EXISTS state_stats (
    id        INTEGER PRIMARY KEY,
    category  TEXT NOT NULL,
    family    TEXT NOT NULL,
    measure   TEXT NOT NULL,
    factors   TEXT NOT NULL DEFAULT '{}',   -- JSON object of factor values
    state_avg REAL,
    us_avg    REAL
);

CREATE INDEX IF NOT EXISTS state_stats_dataset_idx ON state_stats(category, family);

PRAGMA user_version = 1;
";

/// Table and index DDL for one dataset.
pub fn dataset_ddl(spec: &TableSpec) -> String {
  let mut columns = vec![
    "id INTEGER PRIMARY KEY".to_owned(),
    "fips TEXT NOT NULL".to_owned(),
    format!("{} TEXT NOT NULL", spec.schema.measure_column()),
  ];
  for column in spec.value_columns() {
    let ty = if column == "trend" { "TEXT" } else { "REAL" };
    columns.push(format!("{column} {ty}"));
  }
  for field in &spec.factors {
    columns.push(format!("{} TEXT", quote(field)));
  }

  let table = quote(&spec.table);
  let index = quote(&format!("{}_measure_idx", spec.table));
  format!(
    "CREATE TABLE IF NOT EXISTS {table} (\n    {}\n);\n\
     CREATE INDEX IF NOT EXISTS {index} ON {table}({}, fips);\n",
    columns.join(",\n    "),
    spec.schema.measure_column(),
  )
}

/// Columns an existing dataset table must carry.
pub fn required_columns(spec: &TableSpec) -> Vec<String> {
  let mut cols = vec!["fips".to_owned(), spec.schema.measure_column().to_owned()];
  cols.extend(spec.value_columns().map(str::to_owned));
  cols.extend(spec.factors.iter().cloned());
  cols
}
