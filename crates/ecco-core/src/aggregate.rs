//! Aggregation of value rows.
//!
//! Numbers are averaged; trends take the (lower) median of their ranks with
//! unset trends excluded; counts are averaged. These rules are shared by the
//! map endpoint, the by-geography composer and computed state averages, so
//! the same slice always yields the same number.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
  trend::Trend,
  value::{CellValue, ValueRow},
};

/// Aggregated headline value and count of a group of rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
  pub value: Option<CellValue>,
  pub count: Option<f64>,
}

impl Summary {
  pub fn is_empty(&self) -> bool { self.value.is_none() && self.count.is_none() }
}

fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
  let (sum, n) = values
    .into_iter()
    .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
  (n > 0).then(|| sum / n as f64)
}

fn combine<I>(values: I) -> Option<CellValue>
where
  I: IntoIterator<Item = CellValue>,
{
  let mut numbers = Vec::new();
  let mut trends = Vec::new();
  for v in values {
    match v {
      CellValue::Number(n) => numbers.push(n),
      CellValue::Trend(t) => trends.push(t),
    }
  }
  if !trends.is_empty() {
    Trend::median(trends).map(CellValue::Trend)
  } else {
    mean(numbers).map(CellValue::Number)
  }
}

/// Aggregate a group of rows into one summary.
pub fn summarize<'a, I>(rows: I) -> Summary
where
  I: IntoIterator<Item = &'a ValueRow>,
{
  let rows: Vec<&ValueRow> = rows.into_iter().collect();
  Summary {
    value: combine(rows.iter().filter_map(|r| r.value)),
    count: mean(rows.iter().filter_map(|r| r.count)),
  }
}

fn group_by<'a, F>(rows: &'a [ValueRow], key: F) -> BTreeMap<&'a str, Vec<&'a ValueRow>>
where
  F: Fn(&'a ValueRow) -> &'a str,
{
  let mut groups: BTreeMap<&str, Vec<&ValueRow>> = BTreeMap::new();
  for row in rows {
    groups.entry(key(row)).or_default().push(row);
  }
  groups
}

/// One summary per geography id.
pub fn summarize_by_geography(rows: &[ValueRow]) -> BTreeMap<String, Summary> {
  group_by(rows, |r| r.geo_id.as_str())
    .into_iter()
    .map(|(geo, group)| (geo.to_owned(), summarize(group)))
    .collect()
}

/// One summary per measure.
pub fn summarize_by_measure(rows: &[ValueRow]) -> BTreeMap<String, Summary> {
  group_by(rows, |r| r.measure.as_str())
    .into_iter()
    .map(|(measure, group)| (measure.to_owned(), summarize(group)))
    .collect()
}

/// Per measure, the unweighted average over geographies of each geography's
/// own summary. Every geography counts once however many rows it carries.
pub fn average_across_geographies(rows: &[ValueRow]) -> BTreeMap<String, Summary> {
  group_by(rows, |r| r.measure.as_str())
    .into_iter()
    .map(|(measure, group)| {
      let per_geo: Vec<Summary> = {
        let mut by_geo: BTreeMap<&str, Vec<&ValueRow>> = BTreeMap::new();
        for row in group {
          by_geo.entry(row.geo_id.as_str()).or_default().push(row);
        }
        by_geo.into_values().map(summarize).collect()
      };
      let summary = Summary {
        value: combine(per_geo.iter().filter_map(|s| s.value)),
        count: mean(per_geo.iter().filter_map(|s| s.count)),
      };
      (measure.to_owned(), summary)
    })
    .collect()
}
