//! Process-level wiring for the ECCO statistics server.
//!
//! Owns configuration, catalog loading, router mounting and the CSV importer.
//! The binary in `main.rs` is a thin shell over these.

pub mod error;
pub mod import;

pub use error::{Error, Result};

use std::path::{Path, PathBuf};

use axum::Router;
use ecco_core::{Catalog, Engine, QuerySettings, StateComparison, store::StatsStore};
use serde::Deserialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` layered with
/// `ECCO_`-prefixed environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub database_path:     PathBuf,
  /// Replaces the built-in measure catalog.
  pub catalog_path:      Option<PathBuf>,
  pub limit_to_state:    Option<String>,
  pub state_comparison:  StateComparison,
  pub default_page_size: u32,
  pub max_page_size:     u32,
  pub export_prefix:     String,
}

impl ServerConfig {
  /// Read `path` (if it exists) over built-in defaults, then apply the
  /// environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8000)?
      .set_default("database_path", "ecco.db")?
      .set_default("state_comparison", "external_then_computed")?
      .set_default("default_page_size", 50)?
      .set_default("max_page_size", 100)?
      .set_default("export_prefix", "ECCO")?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("ECCO"))
      .build()?
      .try_deserialize()
  }

  pub fn query_settings(&self) -> QuerySettings {
    QuerySettings {
      limit_to_state:    self.limit_to_state.clone(),
      state_comparison:  self.state_comparison,
      default_page_size: self.default_page_size,
      max_page_size:     self.max_page_size,
      export_prefix:     self.export_prefix.clone(),
    }
  }

  /// The configured catalog, or the built-in one. Validated before return.
  pub fn catalog(&self) -> Result<Catalog> {
    let catalog = match &self.catalog_path {
      Some(path) => {
        tracing::info!(path = %path.display(), "loading measure catalog");
        Catalog::from_toml(&std::fs::read_to_string(path)?)?
      }
      None => Catalog::builtin()?,
    };
    Ok(catalog)
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API mounted under `/stats`, with request tracing and permissive CORS.
pub fn router<S>(engine: Engine<S>) -> Router
where
  S: StatsStore + 'static,
{
  Router::new()
    .nest("/stats", ecco_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
}
