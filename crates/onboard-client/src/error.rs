//! Client-side error taxonomy.
//!
//! Errors are `Clone` so the session can keep the last one in its snapshot
//! while also handing it to the caller.

use onboard_core::{
  lifecycle::CaseStatus,
  validate::ValidationError,
  wire::{ErrorBody, ErrorCode},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
  #[error("onboarding record is locked while the case is {status}")]
  LockedRecord { status: CaseStatus },

  #[error("required steps are not complete: {}", missing.join(", "))]
  IncompleteSteps { missing: Vec<String> },

  /// Passed through unchanged from the step's schema check.
  #[error(transparent)]
  Validation(ValidationError),

  /// Timeouts, refused connections and 5xx responses. Worth retrying.
  #[error("network error: {0}")]
  TransientNetwork(String),

  /// Any other refusal from the server.
  #[error("request rejected ({code:?}): {message}")]
  Rejected { code: ErrorCode, message: String },

  #[error("no onboarding snapshot loaded")]
  NotLoaded,

  #[error("could not decode response: {0}")]
  Decode(String),

  /// Local misconfiguration, such as an HTTP client that cannot be built.
  /// Retrying will not help.
  #[error("client setup failed: {0}")]
  Setup(String),
}

impl ClientError {
  pub fn is_transient(&self) -> bool { matches!(self, ClientError::TransientNetwork(_)) }

  /// Rebuild a typed error from a server error body.
  pub fn from_body(body: ErrorBody) -> Self {
    match body.code {
      ErrorCode::LockedRecord => match body.case_status {
        Some(status) => ClientError::LockedRecord { status },
        None => ClientError::Rejected { code: body.code, message: body.error },
      },
      ErrorCode::IncompleteSteps => ClientError::IncompleteSteps { missing: body.missing_steps },
      ErrorCode::Validation => match body.validation {
        Some(v) => ClientError::Validation(v),
        None => ClientError::Rejected { code: body.code, message: body.error },
      },
      code => ClientError::Rejected { code, message: body.error },
    }
  }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;
