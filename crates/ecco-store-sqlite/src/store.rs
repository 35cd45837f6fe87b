//! [`SqliteStore`]: the SQLite implementation of [`StatsStore`].

use std::{
  collections::{BTreeMap, HashSet},
  path::Path,
};

use ecco_core::{
  Catalog, GeographyFamily,
  category::{Dataset, SchemaKind},
  clause::ConstraintClause,
  resolve::ObservedFactorValues,
  store::{RowQuery, Selection, StatsStore},
  trend::Trend,
  value::{CellValue, Geography, RawRows, StateStat, ValueRange, ValueRow},
};
use rusqlite::{OptionalExtension as _, types::Value as SqlValue};

use crate::{
  Error, Result,
  encode::{
    RawStateStat, RawValueRow, encode_factors, sql_f64, sql_text, to_json,
  },
  schema::{BASE_SCHEMA, dataset_ddl, required_columns},
  sql::{Filter, TableSpec, quote},
};

/// One fact row to load into a dataset table.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRow {
  pub geo_id:  String,
  pub measure: String,
  pub value:   Option<CellValue>,
  /// Only stored by cancer-convention datasets.
  pub count:   Option<f64>,
  pub factors: BTreeMap<String, String>,
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An ECCO statistics store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path`, creating a table for every dataset
  /// in `catalog` and checking existing tables carry every declared column.
  pub async fn open(path: impl AsRef<Path>, catalog: &Catalog) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema(catalog).await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory(catalog: &Catalog) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema(catalog).await?;
    Ok(store)
  }

  async fn init_schema(&self, catalog: &Catalog) -> Result<()> {
    let specs: Vec<TableSpec> = catalog.all_datasets().map(TableSpec::of).collect();
    let ddl: String = specs.iter().map(dataset_ddl).collect();
    let tables: Vec<String> = specs.iter().map(|s| s.table.clone()).collect();

    let existing: Vec<HashSet<String>> = self
      .conn
      .call(move |conn| {
        conn.execute_batch(BASE_SCHEMA)?;
        conn.execute_batch(&ddl)?;

        let mut out = Vec::with_capacity(tables.len());
        for table in &tables {
          let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(table)))?;
          let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
          out.push(columns);
        }
        Ok(out)
      })
      .await?;

    for (spec, columns) in specs.iter().zip(&existing) {
      for column in required_columns(spec) {
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(&column)) {
          tracing::error!(table = %spec.table, %column, "dataset table lacks a declared column");
          return Err(Error::SchemaMismatch {
            table: spec.table.clone(),
            column,
          });
        }
      }
    }

    tracing::debug!(tables = specs.len(), "schema initialised");
    Ok(())
  }

  // ── Loading ───────────────────────────────────────────────────────────────

  /// Insert or replace a geography's name and state.
  pub async fn upsert_geography(&self, geography: Geography) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO geographies (family, geo_id, name, state)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (family, geo_id)
           DO UPDATE SET name = excluded.name, state = excluded.state",
          rusqlite::params![
            geography.family.slug(),
            geography.geo_id,
            geography.name,
            geography.state,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Append rows to a dataset table in one transaction. Returns the number of
  /// rows written.
  pub async fn insert_rows(&self, dataset: Dataset<'_>, rows: Vec<NewRow>) -> Result<usize> {
    let spec = TableSpec::of(dataset);

    let mut encoded: Vec<Vec<SqlValue>> = Vec::with_capacity(rows.len());
    for row in rows {
      if let Some(factor) = row.factors.keys().find(|f| !spec.factors.contains(f)) {
        return Err(Error::UnknownFactor {
          table:  spec.table.clone(),
          factor: factor.clone(),
        });
      }

      let value = match (spec.schema, row.value) {
        (_, None) => SqlValue::Null,
        (SchemaKind::TrendOrdinal, Some(CellValue::Trend(t))) => {
          SqlValue::Text(t.label().to_owned())
        }
        (SchemaKind::Generic | SchemaKind::SiteBased, Some(CellValue::Number(n))) => {
          SqlValue::Real(n)
        }
        (_, Some(other)) => {
          return Err(Error::ValueKind {
            table: spec.table.clone(),
            value: other.to_field(),
          });
        }
      };

      let mut params = vec![SqlValue::Text(row.geo_id), SqlValue::Text(row.measure), value];
      if spec.schema.count_column().is_some() {
        params.push(row.count.map_or(SqlValue::Null, SqlValue::Real));
      }
      for field in &spec.factors {
        params.push(
          row
            .factors
            .get(field)
            .cloned()
            .map_or(SqlValue::Null, SqlValue::Text),
        );
      }
      encoded.push(params);
    }

    let mut columns = vec!["fips".to_owned(), spec.schema.measure_column().to_owned()];
    columns.extend(spec.value_columns().map(str::to_owned));
    columns.extend(spec.factors.iter().map(|f| quote(f)));
    let sql = format!(
      "INSERT INTO {} ({}) VALUES ({})",
      quote(&spec.table),
      columns.join(", "),
      vec!["?"; columns.len()].join(", "),
    );

    let written = encoded.len();
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(&sql)?;
          for params in &encoded {
            stmt.execute(rusqlite::params_from_iter(params.iter()))?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(table = %spec.table, rows = written, "inserted rows");
    Ok(written)
  }

  /// Record a precomputed state-level statistic for a dataset.
  pub async fn insert_state_stat(&self, dataset: Dataset<'_>, stat: StateStat) -> Result<()> {
    let category = dataset.name().to_owned();
    let family = dataset.family().slug();
    let factors = encode_factors(&stat.factors)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO state_stats (category, family, measure, factors, state_avg, us_avg)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            category,
            family,
            stat.measure,
            factors,
            stat.state_avg,
            stat.us_avg,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── StatsStore impl ─────────────────────────────────────────────────────────

impl StatsStore for SqliteStore {
  type Error = Error;

  async fn distinct_measures<'a>(
    &'a self,
    dataset: Dataset<'a>,
    state: Option<&'a str>,
  ) -> Result<Vec<String>> {
    let spec = TableSpec::of(dataset);
    let mut filter = Filter::default();
    if let Some(state) = state {
      filter.eq("g.state".to_owned(), state);
    }
    let m = spec.measure_col();
    let sql = format!(
      "SELECT DISTINCT {m} FROM {}{} ORDER BY {m}",
      spec.from_sql(),
      filter.sql()
    );

    let measures = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(filter.params()), |row| {
            row.get::<_, String>(0)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(measures)
  }

  async fn observed_factor_values<'a>(
    &'a self,
    dataset: Dataset<'a>,
    measures: Option<&'a [String]>,
  ) -> Result<ObservedFactorValues> {
    let spec = TableSpec::of(dataset);
    let mut filter = Filter::default();
    if let Some(measures) = measures {
      filter.one_of(spec.measure_col(), measures);
    }
    let sql = format!(
      "SELECT DISTINCT {}{} FROM {} AS t{}",
      spec.measure_col(),
      spec.factor_list(),
      quote(&spec.table),
      filter.sql()
    );
    let width = spec.factors.len();

    let combos: Vec<(String, Vec<SqlValue>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(filter.params()), |row| {
            let measure: String = row.get(0)?;
            let values = (1..=width)
              .map(|i| row.get::<_, SqlValue>(i))
              .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((measure, values))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut observed = ObservedFactorValues::new();
    for (measure, values) in combos {
      let per_factor = observed.entry(measure).or_default();
      for (field, value) in spec.factors.iter().zip(values) {
        let seen = per_factor.entry(field.clone()).or_default();
        if let Some(value) = sql_text(value) {
          seen.insert(value);
        }
      }
    }
    Ok(observed)
  }

  async fn list_rows<'a>(&'a self, dataset: Dataset<'a>, query: &'a RowQuery) -> Result<RawRows> {
    let spec = TableSpec::of(dataset);
    let mut filter = Filter::default();
    if let Some(measure) = &query.measure {
      filter.eq(spec.measure_col(), measure.clone());
    }
    if let Some(state) = &query.state {
      filter.eq("g.state".to_owned(), state.clone());
    }

    let mut keys: Vec<String> = ["fips", "name", "state", spec.schema.measure_column()]
      .into_iter()
      .map(str::to_owned)
      .collect();
    keys.extend(spec.value_columns().map(str::to_owned));
    keys.extend(spec.factors.iter().cloned());

    let values: Vec<String> = spec.value_columns().map(|c| format!("t.{c}")).collect();
    let from = spec.from_sql();
    let count_sql = format!("SELECT COUNT(*) FROM {from}{}", filter.sql());
    let sql = format!(
      "SELECT t.fips, g.name, g.state, {m}, {values}{factors} FROM {from}{filter} \
       ORDER BY t.fips, {m}, t.id LIMIT {limit} OFFSET {offset}",
      m = spec.measure_col(),
      values = values.join(", "),
      factors = spec.factor_list(),
      filter = filter.sql(),
      limit = query.limit,
      offset = query.offset,
    );
    let width = keys.len();

    let (total, rows): (i64, Vec<Vec<SqlValue>>) = self
      .conn
      .call(move |conn| {
        let total: i64 = conn.query_row(
          &count_sql,
          rusqlite::params_from_iter(filter.params()),
          |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(filter.params()), |row| {
            (0..width)
              .map(|i| row.get::<_, SqlValue>(i))
              .collect::<rusqlite::Result<Vec<_>>>()
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((total, rows))
      })
      .await?;

    let items = rows
      .into_iter()
      .map(|values| {
        keys
          .iter()
          .cloned()
          .zip(values.into_iter().map(to_json))
          .collect::<serde_json::Map<_, _>>()
      })
      .collect();

    Ok(RawRows {
      items,
      total: u64::try_from(total).unwrap_or_default(),
    })
  }

  async fn select_values<'a>(
    &'a self,
    dataset: Dataset<'a>,
    selection: &'a Selection,
  ) -> Result<Vec<ValueRow>> {
    let spec = TableSpec::of(dataset);
    let mut filter = Filter::default();
    if let Some(clause) = &selection.clause {
      filter.clause(&spec, clause);
    }
    if let Some(measure) = &selection.measure {
      filter.eq(spec.measure_col(), measure.clone());
    }
    for (field, value) in &selection.factors {
      filter.eq(spec.factor_col(field), value.clone());
    }
    if let Some(geo_id) = &selection.geo_id {
      filter.eq("t.fips".to_owned(), geo_id.clone());
    }
    if let Some(state) = &selection.state {
      filter.eq("g.state".to_owned(), state.clone());
    }

    let sql = format!(
      "SELECT t.fips, g.name, g.state, {m}, {v}, {c}{f} FROM {from}{filter} \
       ORDER BY t.fips, {m}, t.id",
      m = spec.measure_col(),
      v = spec.value_col(),
      c = spec.count_expr(),
      f = spec.factor_list(),
      from = spec.from_sql(),
      filter = filter.sql(),
    );
    let width = spec.factors.len();

    let raws: Vec<RawValueRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(filter.params()), |row| {
            Ok(RawValueRow {
              fips:    row.get(0)?,
              name:    row.get(1)?,
              state:   row.get(2)?,
              measure: row.get(3)?,
              value:   row.get(4)?,
              count:   row.get(5)?,
              factors: (0..width)
                .map(|i| row.get::<_, SqlValue>(6 + i))
                .collect::<rusqlite::Result<Vec<_>>>()?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(|raw| raw.into_row(spec.schema)).collect())
  }

  async fn value_range<'a>(
    &'a self,
    dataset: Dataset<'a>,
    clause: &'a ConstraintClause,
  ) -> Result<Option<ValueRange>> {
    let spec = TableSpec::of(dataset);
    let mut filter = Filter::default();
    filter.clause(&spec, clause);
    let sql = format!(
      "SELECT MIN(v), MAX(v) FROM (SELECT {} AS v FROM {} AS t{}) WHERE v IS NOT NULL",
      spec.ranked_value(),
      quote(&spec.table),
      filter.sql(),
    );

    let (min, max): (SqlValue, SqlValue) = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(&sql, rusqlite::params_from_iter(filter.params()), |row| {
          Ok((row.get(0)?, row.get(1)?))
        })?)
      })
      .await?;

    let decode = |v: &SqlValue| -> Option<CellValue> {
      let n = sql_f64(v)?;
      match spec.schema {
        SchemaKind::TrendOrdinal => Trend::from_rank(n as u8).map(CellValue::Trend),
        SchemaKind::Generic | SchemaKind::SiteBased => Some(CellValue::Number(n)),
      }
    };
    Ok(decode(&min).zip(decode(&max)).map(|(min, max)| ValueRange { min, max }))
  }

  async fn geography<'a>(
    &'a self,
    family: GeographyFamily,
    geo_id: &'a str,
  ) -> Result<Option<Geography>> {
    let id = geo_id.to_owned();
    let raw: Option<(String, String, Option<String>)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT geo_id, name, state FROM geographies WHERE family = ?1 AND geo_id = ?2",
            rusqlite::params![family.slug(), id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(|(geo_id, name, state)| Geography { family, geo_id, name, state }))
  }

  async fn state_stats<'a>(&'a self, dataset: Dataset<'a>) -> Result<Vec<StateStat>> {
    let category = dataset.name().to_owned();
    let family = dataset.family().slug();

    let raws: Vec<RawStateStat> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT measure, factors, state_avg, us_avg FROM state_stats
           WHERE category = ?1 AND family = ?2
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![category, family], |row| {
            Ok(RawStateStat {
              measure:   row.get(0)?,
              factors:   row.get(1)?,
              state_avg: row.get(2)?,
              us_avg:    row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawStateStat::into_stat).collect()
  }
}
