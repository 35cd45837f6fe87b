//! JSON REST API for ECCO statistics.
//!
//! Exposes an axum [`Router`] backed by an [`Engine`] over any
//! [`ecco_core::store::StatsStore`]. TLS, CORS and request tracing are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/stats", ecco_api::api_router(engine.clone()))
//! ```

pub mod datasets;
pub mod download;
pub mod error;
pub mod geography;

use axum::{Router, routing::get};
use ecco_core::{Engine, store::StatsStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `engine`.
///
/// Every category is served by the same handlers; the `{family}` and
/// `{category}` path segments are resolved against the engine's catalog.
pub fn api_router<S>(engine: Engine<S>) -> Router<()>
where
  S: StatsStore + 'static,
{
  Router::new()
    // Catalog-wide
    .route("/measures", get(datasets::measures::<S>))
    .route("/download-all", get(download::all::<S>))
    // Per geography
    .route("/by-county/{geo_id}", get(geography::by_county::<S>))
    .route("/by-tract/{geo_id}", get(geography::by_tract::<S>))
    .route("/by-healthregion/{geo_id}", get(geography::by_health_region::<S>))
    // Per dataset
    .route("/{family}/{category}", get(datasets::rows::<S>))
    .route("/{family}/{category}/measures", get(datasets::measure_keys::<S>))
    .route("/{family}/{category}/fips-value", get(datasets::fips_value::<S>))
    .route("/{family}/{category}/as-csv", get(download::as_csv::<S>))
    .with_state(engine)
}
