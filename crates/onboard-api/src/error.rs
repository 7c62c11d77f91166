//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use onboard_core::{
  store::StoreError,
  wire::{ErrorBody, ErrorCode},
};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// A domain rule refused the request.
  #[error("{}", .0.error)]
  Rejected(ErrorBody),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthorized: {0}")]
  Unauthorized(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Split a backend error into a domain refusal or an internal failure.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    match e.as_core() {
      Some(core) => ApiError::Rejected(ErrorBody::from(core)),
      None => ApiError::Store(Box::new(e)),
    }
  }
}

impl From<onboard_core::Error> for ApiError {
  fn from(e: onboard_core::Error) -> Self { ApiError::Rejected(ErrorBody::from(&e)) }
}

/// HTTP status for each error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
  match code {
    ErrorCode::LockedRecord => StatusCode::LOCKED,
    ErrorCode::IncompleteSteps => StatusCode::UNPROCESSABLE_ENTITY,
    ErrorCode::Validation | ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
    ErrorCode::InvalidTransition | ErrorCode::StaleCase | ErrorCode::RoleMismatch => {
      StatusCode::CONFLICT
    }
    ErrorCode::NotFound => StatusCode::NOT_FOUND,
    ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
    ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let body = match self {
      ApiError::Rejected(body) => body,
      ApiError::NotFound(m) => ErrorBody::new(ErrorCode::NotFound, m),
      ApiError::BadRequest(m) => ErrorBody::new(ErrorCode::BadRequest, m),
      ApiError::Unauthorized(m) => ErrorBody::new(ErrorCode::Unauthorized, m),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        ErrorBody::new(ErrorCode::Internal, "internal error")
      }
    };
    (status_for(body.code), Json(body)).into_response()
  }
}
