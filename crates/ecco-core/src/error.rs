//! Error types for `ecco-core`.

use thiserror::Error;

use crate::category::GeographyFamily;

#[derive(Debug, Error)]
pub enum Error {
  // ── Configuration ─────────────────────────────────────────────────────

  #[error("failed to parse catalog: {0}")]
  CatalogParse(#[from] toml::de::Error),

  #[error("invalid catalog entry {category:?}: {reason}")]
  InvalidCatalog { category: String, reason: String },

  // ── Client ────────────────────────────────────────────────────────────

  #[error("unknown category {family}/{category}")]
  UnknownCategory {
    family:   GeographyFamily,
    category: String,
  },

  #[error("unknown geography family {0:?}")]
  UnknownFamily(String),

  #[error("malformed filter segment {0:?}; expected <factor>:<value>")]
  MalformedFilter(String),

  #[error(
    "the 'filters' argument was specified, but the category '{0}' has no defined factors"
  )]
  FiltersWithoutFactors(String),

  #[error("unknown factor {factor:?} for {scope}")]
  UnknownFactor { scope: String, factor: String },

  #[error("invalid page request: {0}")]
  InvalidPage(String),

  // ── Not found ─────────────────────────────────────────────────────────

  #[error("{family} with id {geo_id} not found")]
  GeographyNotFound {
    family: GeographyFamily,
    geo_id: String,
  },

  // ── Backend ───────────────────────────────────────────────────────────

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification used by transport layers to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Bad catalog or schema; fatal at startup.
  Configuration,
  /// The caller asked for something malformed or contradictory.
  Client,
  NotFound,
  /// A backend failure, propagated as-is.
  Store,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::CatalogParse(_) | Error::InvalidCatalog { .. } => ErrorKind::Configuration,
      Error::UnknownFamily(_)
      | Error::MalformedFilter(_)
      | Error::FiltersWithoutFactors(_)
      | Error::UnknownFactor { .. }
      | Error::InvalidPage(_) => ErrorKind::Client,
      Error::UnknownCategory { .. } | Error::GeographyNotFound { .. } => ErrorKind::NotFound,
      Error::Store(_) => ErrorKind::Store,
    }
  }

  /// Box a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Store(Box::new(e))
  }

  pub(crate) fn invalid_catalog(category: &str, reason: impl Into<String>) -> Self {
    Error::InvalidCatalog {
      category: category.to_owned(),
      reason:   reason.into(),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
