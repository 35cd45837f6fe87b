//! Decoding helpers between SQLite column values and domain types.
//!
//! Numeric value columns are `REAL`; trend columns hold the trend label as
//! text. Factor values are stored as text, and state-statistic factor sets as
//! a compact JSON object.

use std::collections::BTreeMap;

use ecco_core::{
  category::SchemaKind,
  trend::Trend,
  value::{CellValue, StateStat, ValueRow},
};
use rusqlite::types::Value as SqlValue;

use crate::Result;

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn sql_f64(value: &SqlValue) -> Option<f64> {
  match value {
    SqlValue::Integer(i) => Some(*i as f64),
    SqlValue::Real(f) => Some(*f),
    SqlValue::Text(s) => s.trim().parse().ok(),
    SqlValue::Null | SqlValue::Blob(_) => None,
  }
}

pub fn sql_text(value: SqlValue) -> Option<String> {
  match value {
    SqlValue::Text(s) => Some(s),
    SqlValue::Integer(i) => Some(i.to_string()),
    SqlValue::Real(f) => Some(f.to_string()),
    SqlValue::Null | SqlValue::Blob(_) => None,
  }
}

/// Headline value of a row; an empty or unknown trend is unset.
pub fn decode_cell(schema: SchemaKind, value: &SqlValue) -> Option<CellValue> {
  match schema {
    SchemaKind::TrendOrdinal => match value {
      SqlValue::Text(s) => Trend::parse(s).map(CellValue::Trend),
      _ => None,
    },
    SchemaKind::Generic | SchemaKind::SiteBased => sql_f64(value).map(CellValue::Number),
  }
}

pub fn to_json(value: SqlValue) -> serde_json::Value {
  match value {
    SqlValue::Null | SqlValue::Blob(_) => serde_json::Value::Null,
    SqlValue::Integer(i) => i.into(),
    SqlValue::Real(f) => serde_json::Number::from_f64(f)
      .map(serde_json::Value::Number)
      .unwrap_or(serde_json::Value::Null),
    SqlValue::Text(s) => s.into(),
  }
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A dataset row as selected by `select_values`, before decoding.
pub struct RawValueRow {
  pub fips:    String,
  pub name:    Option<String>,
  pub state:   Option<String>,
  pub measure: String,
  pub value:   SqlValue,
  pub count:   SqlValue,
  pub factors: Vec<SqlValue>,
}

impl RawValueRow {
  pub fn into_row(self, schema: SchemaKind) -> ValueRow {
    ValueRow {
      geo_id:   self.fips,
      geo_name: self.name,
      state:    self.state,
      measure:  self.measure,
      value:    decode_cell(schema, &self.value),
      count:    sql_f64(&self.count),
      factors:  self.factors.into_iter().map(sql_text).collect(),
    }
  }
}

pub struct RawStateStat {
  pub measure:   String,
  pub factors:   String,
  pub state_avg: Option<f64>,
  pub us_avg:    Option<f64>,
}

impl RawStateStat {
  pub fn into_stat(self) -> Result<StateStat> {
    let factors: BTreeMap<String, String> = serde_json::from_str(&self.factors)?;
    Ok(StateStat {
      measure: self.measure,
      factors,
      state_avg: self.state_avg,
      us_avg: self.us_avg,
    })
  }
}

pub fn encode_factors(factors: &BTreeMap<String, String>) -> Result<String> {
  Ok(serde_json::to_string(factors)?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn trend_cells_decode_to_labels() {
    let cell = decode_cell(SchemaKind::TrendOrdinal, &SqlValue::Text("Stable".into()));
    assert_eq!(cell, Some(CellValue::Trend(Trend::Stable)));
    assert_eq!(decode_cell(SchemaKind::TrendOrdinal, &SqlValue::Text(String::new())), None);
    assert_eq!(decode_cell(SchemaKind::TrendOrdinal, &SqlValue::Null), None);
  }

  #[test]
  fn numeric_cells_accept_integers() {
    assert_eq!(
      decode_cell(SchemaKind::Generic, &SqlValue::Integer(3)),
      Some(CellValue::Number(3.0))
    );
    assert_eq!(decode_cell(SchemaKind::SiteBased, &SqlValue::Null), None);
  }

  #[test]
  fn nan_becomes_null_json() {
    assert_eq!(to_json(SqlValue::Real(f64::NAN)), serde_json::Value::Null);
    assert_eq!(to_json(SqlValue::Text("x".into())), serde_json::json!("x"));
  }
}
