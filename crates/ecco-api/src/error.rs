//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use ecco_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Encoding a CSV or zip download failed.
  #[error("export error: {0}")]
  Export(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<ecco_core::Error> for ApiError {
  fn from(e: ecco_core::Error) -> Self {
    match e.kind() {
      ErrorKind::Client => ApiError::BadRequest(e.to_string()),
      ErrorKind::NotFound => ApiError::NotFound(e.to_string()),
      ErrorKind::Configuration | ErrorKind::Store => ApiError::Store(Box::new(e)),
    }
  }
}

impl From<csv::Error> for ApiError {
  fn from(e: csv::Error) -> Self { ApiError::Export(e.to_string()) }
}

impl From<zip::result::ZipError> for ApiError {
  fn from(e: zip::result::ZipError) -> Self { ApiError::Export(e.to_string()) }
}

impl From<std::io::Error> for ApiError {
  fn from(e: std::io::Error) -> Self { ApiError::Export(e.to_string()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Export(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
