//! SQL text and parameter building for dataset queries.
//!
//! Dataset tables are always aliased `t` and left-joined to `geographies` as
//! `g`. Identifiers come from the validated catalog and are quoted; every
//! value is bound as a parameter.

use ecco_core::{
  GeographyFamily,
  category::{Dataset, SchemaKind},
  clause::ConstraintClause,
  trend::Trend,
};
use rusqlite::types::Value as SqlValue;

pub fn quote(ident: &str) -> String {
  format!("\"{}\"", ident.replace('"', "\"\""))
}

// ─── Table spec ──────────────────────────────────────────────────────────────

/// Owned description of a dataset table, movable into a connection closure.
#[derive(Debug, Clone)]
pub struct TableSpec {
  pub family:  GeographyFamily,
  pub schema:  SchemaKind,
  pub table:   String,
  pub factors: Vec<String>,
}

impl TableSpec {
  pub fn of(dataset: Dataset<'_>) -> Self {
    Self {
      family:  dataset.family(),
      schema:  dataset.schema(),
      table:   dataset.category.table_name(),
      factors: dataset.factor_fields().map(str::to_owned).collect(),
    }
  }

  /// Headline value column, then the count column if the schema has one.
  pub fn value_columns(&self) -> impl Iterator<Item = &'static str> {
    std::iter::once(self.schema.value_column()).chain(self.schema.count_column())
  }

  pub fn from_sql(&self) -> String {
    format!(
      "{} AS t LEFT JOIN geographies AS g ON g.family = '{}' AND g.geo_id = t.fips",
      quote(&self.table),
      self.family.slug(),
    )
  }

  pub fn measure_col(&self) -> String {
    format!("t.{}", self.schema.measure_column())
  }

  pub fn value_col(&self) -> String { format!("t.{}", self.schema.value_column()) }

  pub fn count_expr(&self) -> String {
    match self.schema.count_column() {
      Some(c) => format!("t.{c}"),
      None => "NULL".to_owned(),
    }
  }

  pub fn factor_col(&self, field: &str) -> String { format!("t.{}", quote(field)) }

  /// `, t."f1", t."f2"` or the empty string.
  pub fn factor_list(&self) -> String {
    self
      .factors
      .iter()
      .map(|f| format!(", {}", self.factor_col(f)))
      .collect()
  }

  /// Numeric expression whose extremes are the value range.
  pub fn ranked_value(&self) -> String {
    match self.schema {
      SchemaKind::TrendOrdinal => trend_rank(&self.value_col()),
      SchemaKind::Generic | SchemaKind::SiteBased => self.value_col(),
    }
  }
}

/// `CASE` mapping trend labels to ranks; unset or unknown labels are `NULL`.
pub fn trend_rank(expr: &str) -> String {
  let arms: String = Trend::ALL
    .iter()
    .map(|t| format!(" WHEN '{}' THEN {}", t.label(), t.rank()))
    .collect();
  format!("CASE lower(trim({expr})){arms} END")
}

// ─── WHERE builder ───────────────────────────────────────────────────────────

/// Conjunction of conditions with their bound parameters, kept in step.
#[derive(Debug, Default)]
pub struct Filter {
  conds:  Vec<String>,
  params: Vec<SqlValue>,
}

impl Filter {
  pub fn eq(&mut self, column: String, value: impl Into<String>) {
    self.conds.push(format!("{column} = ?"));
    self.params.push(SqlValue::Text(value.into()));
  }

  pub fn one_of(&mut self, column: String, values: &[String]) {
    if values.is_empty() {
      self.conds.push("0".to_owned());
      return;
    }
    let marks = vec!["?"; values.len()].join(", ");
    self.conds.push(format!("{column} IN ({marks})"));
    self
      .params
      .extend(values.iter().cloned().map(SqlValue::Text));
  }

  /// Add a default-constraint clause. An empty clause selects nothing.
  pub fn clause(&mut self, spec: &TableSpec, clause: &ConstraintClause) {
    if clause.is_empty() {
      self.conds.push("0".to_owned());
      return;
    }
    let mut terms = Vec::with_capacity(clause.terms().len());
    for term in clause.terms() {
      let mut parts = vec![format!("{} = ?", spec.measure_col())];
      self.params.push(SqlValue::Text(term.measure.clone()));
      for (field, value) in &term.factors {
        parts.push(format!("{} = ?", spec.factor_col(field)));
        self.params.push(SqlValue::Text(value.clone()));
      }
      terms.push(format!("({})", parts.join(" AND ")));
    }
    self.conds.push(format!("({})", terms.join(" OR ")));
  }

  /// ` WHERE ...` or the empty string.
  pub fn sql(&self) -> String {
    if self.conds.is_empty() {
      String::new()
    } else {
      format!(" WHERE {}", self.conds.join(" AND "))
    }
  }

  pub fn params(&self) -> impl Iterator<Item = &SqlValue> { self.params.iter() }
}
