//! API error type; renders as the standard envelope with `data: null`.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;

use crate::types::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("not found: {0}")]
  NotFound(String),

  #[error("database: {0}")]
  Database(#[from] sqlx_core::Error),
}

impl ApiError {
  pub fn validation(field: &str, reason: impl Into<String>) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.into(),
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::Validation { .. } => StatusCode::BAD_REQUEST,
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if let Self::Database(e) = &self {
      tracing::error!(error = %e, "query failed");
    }
    let body = ApiResponse::<()> {
      code: status.as_u16(),
      message: self.to_string(),
      data: None,
    };
    (status, Json(body)).into_response()
  }
}
