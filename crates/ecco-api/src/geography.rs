//! Handlers for the by-geography documents.
//!
//! `GET /by-county/{geo_id}`, `/by-tract/{geo_id}` and
//! `/by-healthregion/{geo_id}` all accept an optional `filters` string whose
//! choices override effective defaults in every category declaring the factor.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use ecco_core::{Engine, GeographyFamily, compose::GeographyReport, store::StatsStore};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
  pub filters: Option<String>,
}

async fn report<S: StatsStore + 'static>(
  engine: Engine<S>,
  family: GeographyFamily,
  geo_id: String,
  params: ReportParams,
) -> Result<Json<GeographyReport>, ApiError> {
  let report = engine
    .by_geography(family, &geo_id, params.filters.as_deref())
    .await?;
  Ok(Json(report))
}

/// `GET /by-county/{geo_id}`
pub async fn by_county<S: StatsStore + 'static>(
  State(engine): State<Engine<S>>,
  Path(geo_id): Path<String>,
  Query(params): Query<ReportParams>,
) -> Result<Json<GeographyReport>, ApiError> {
  report(engine, GeographyFamily::County, geo_id, params).await
}

/// `GET /by-tract/{geo_id}`
pub async fn by_tract<S: StatsStore + 'static>(
  State(engine): State<Engine<S>>,
  Path(geo_id): Path<String>,
  Query(params): Query<ReportParams>,
) -> Result<Json<GeographyReport>, ApiError> {
  report(engine, GeographyFamily::Tract, geo_id, params).await
}

/// `GET /by-healthregion/{geo_id}`
pub async fn by_health_region<S: StatsStore + 'static>(
  State(engine): State<Engine<S>>,
  Path(geo_id): Path<String>,
  Query(params): Query<ReportParams>,
) -> Result<Json<GeographyReport>, ApiError> {
  report(engine, GeographyFamily::HealthRegion, geo_id, params).await
}
