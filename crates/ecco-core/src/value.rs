//! Values exchanged between the engine and a store, and response building
//! blocks.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{category::GeographyFamily, trend::Trend};

// ─── Cells ───────────────────────────────────────────────────────────────────

/// The headline value of a row: a number, or a trend label for ordinal
/// categories.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
  Number(f64),
  Trend(Trend),
}

impl CellValue {
  /// Text form used in CSV exports.
  pub fn to_field(self) -> String {
    match self {
      CellValue::Number(n) => n.to_string(),
      CellValue::Trend(t) => t.label().to_owned(),
    }
  }
}

// ─── Rows ────────────────────────────────────────────────────────────────────

/// One fact row as returned by [`StatsStore::select_values`].
///
/// [`StatsStore::select_values`]: crate::store::StatsStore::select_values
#[derive(Debug, Clone, PartialEq)]
pub struct ValueRow {
  pub geo_id:   String,
  pub geo_name: Option<String>,
  pub state:    Option<String>,
  pub measure:  String,
  /// `None` for a null value or an empty trend.
  pub value:    Option<CellValue>,
  /// Cancer-convention case count.
  pub count:    Option<f64>,
  /// Factor column values, in the category's declared factor order.
  pub factors:  Vec<Option<String>>,
}

/// Global extremes of a selection, used for client-side colour scales.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
  pub min: CellValue,
  pub max: CellValue,
}

/// A single geographic unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Geography {
  pub family: GeographyFamily,
  pub geo_id: String,
  pub name:   String,
  pub state:  Option<String>,
}

/// A precomputed state-level comparison row.
#[derive(Debug, Clone, PartialEq)]
pub struct StateStat {
  pub measure:   String,
  /// Factor values this statistic is stratified by; factors absent here are
  /// unconstrained.
  pub factors:   BTreeMap<String, String>,
  pub state_avg: Option<f64>,
  pub us_avg:    Option<f64>,
}

/// An unpaginated slice of raw rows plus the size of the full selection.
#[derive(Debug, Clone, Default)]
pub struct RawRows {
  pub items: Vec<serde_json::Map<String, serde_json::Value>>,
  pub total: u64,
}

/// The raw-rows page envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RowPage {
  pub items: Vec<serde_json::Map<String, serde_json::Value>>,
  pub total: u64,
  /// 1-based.
  pub page:  u32,
  pub size:  u32,
  pub pages: u64,
}

// ─── Ordered maps ────────────────────────────────────────────────────────────

/// Key/value pairs serialised as a JSON object in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> Default for OrderedMap<V> {
  fn default() -> Self { Self(Vec::new()) }
}

impl<V> OrderedMap<V> {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, key: impl Into<String>, value: V) {
    self.0.push((key.into(), value));
  }

  pub fn get(&self, key: &str) -> Option<&V> {
    self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
  }

  pub fn len(&self) -> usize { self.0.len() }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<V> FromIterator<(String, V)> for OrderedMap<V> {
  fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.0.len()))?;
    for (k, v) in &self.0 {
      map.serialize_entry(k, v)?;
    }
    map.end()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cells_serialise_untagged() {
    assert_eq!(
      serde_json::to_value(CellValue::Number(0.25)).unwrap(),
      serde_json::json!(0.25)
    );
    assert_eq!(
      serde_json::to_value(CellValue::Trend(Trend::Falling)).unwrap(),
      serde_json::json!("falling")
    );
  }

  #[test]
  fn ordered_map_keeps_insertion_order() {
    let mut m = OrderedMap::new();
    m.push("zeta", 1);
    m.push("alpha", 2);
    let text = serde_json::to_string(&m).unwrap();
    assert_eq!(text, r#"{"zeta":1,"alpha":2}"#);
    assert_eq!(m.get("alpha"), Some(&2));
  }

  #[test]
  fn csv_field_text() {
    assert_eq!(CellValue::Number(12.5).to_field(), "12.5");
    assert_eq!(CellValue::Trend(Trend::Rising).to_field(), "rising");
  }
}
