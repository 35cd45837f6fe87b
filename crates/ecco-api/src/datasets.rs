//! Handlers for catalog and per-dataset endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/measures` | Every family, category and measure with metadata |
//! | `GET`  | `/{family}/{category}` | Raw rows; optional `measure`, `page`, `size` |
//! | `GET`  | `/{family}/{category}/measures` | Sorted distinct measure keys |
//! | `GET`  | `/{family}/{category}/fips-value` | `?measure` required; optional `filters` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use ecco_core::{
  Engine, GeographyFamily,
  query::{FipsValue, MeasuresOverview},
  store::StatsStore,
  value::RowPage,
};
use serde::Deserialize;

use crate::error::ApiError;

/// `{family}/{category}` path segments.
pub type DatasetPath = Path<(String, String)>;

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// `GET /measures`
pub async fn measures<S: StatsStore + 'static>(
  State(engine): State<Engine<S>>,
) -> Result<Json<MeasuresOverview>, ApiError> {
  Ok(Json(engine.measures_overview().await?))
}

// ─── Rows ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RowParams {
  pub measure: Option<String>,
  /// 1-based page number. Defaults to 1.
  pub page:    Option<u32>,
  /// Defaults to the configured page size.
  pub size:    Option<u32>,
}

/// `GET /{family}/{category}[?measure=...][&page=...][&size=...]`
pub async fn rows<S: StatsStore + 'static>(
  State(engine): State<Engine<S>>,
  Path((family, category)): DatasetPath,
  Query(params): Query<RowParams>,
) -> Result<Json<RowPage>, ApiError> {
  let family = GeographyFamily::parse(&family)?;
  let page = engine
    .dataset_rows(
      family,
      &category,
      params.measure.as_deref(),
      params.page,
      params.size,
    )
    .await?;
  Ok(Json(page))
}

/// `GET /{family}/{category}/measures`
pub async fn measure_keys<S: StatsStore + 'static>(
  State(engine): State<Engine<S>>,
  Path((family, category)): DatasetPath,
) -> Result<Json<Vec<String>>, ApiError> {
  let family = GeographyFamily::parse(&family)?;
  Ok(Json(engine.dataset_measures(family, &category).await?))
}

// ─── Map values ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FipsParams {
  pub measure: String,
  /// `factor:value;factor:value`
  pub filters: Option<String>,
}

/// `GET /{family}/{category}/fips-value?measure=<key>[&filters=...]`
pub async fn fips_value<S: StatsStore + 'static>(
  State(engine): State<Engine<S>>,
  Path((family, category)): DatasetPath,
  Query(params): Query<FipsParams>,
) -> Result<Json<FipsValue>, ApiError> {
  let family = GeographyFamily::parse(&family)?;
  let value = engine
    .fips_value(family, &category, &params.measure, params.filters.as_deref())
    .await?;
  Ok(Json(value))
}
