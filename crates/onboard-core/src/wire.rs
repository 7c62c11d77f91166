//! Shapes shared by the JSON API and its client.

use serde::{Deserialize, Serialize};

use crate::{
  Error,
  lifecycle::{CaseStatus, KycCase},
  record::OnboardingRecord,
  validate::ValidationError,
};

/// Machine-readable error category carried in every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
  LockedRecord,
  IncompleteSteps,
  Validation,
  InvalidTransition,
  StaleCase,
  RoleMismatch,
  NotFound,
  Unauthorized,
  BadRequest,
  Internal,
}

/// JSON body of every non-2xx API response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
  pub error:         String,
  pub code:          ErrorCode,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub missing_steps: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub case_status:   Option<CaseStatus>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub validation:    Option<ValidationError>,
}

impl ErrorBody {
  pub fn new(code: ErrorCode, error: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      code,
      missing_steps: Vec::new(),
      case_status: None,
      validation: None,
    }
  }
}

impl From<&Error> for ErrorBody {
  fn from(e: &Error) -> Self {
    let code = match e {
      Error::LockedRecord { .. } => ErrorCode::LockedRecord,
      Error::IncompleteSteps { .. } => ErrorCode::IncompleteSteps,
      Error::Validation(_) | Error::EmptyReviewNote { .. } => ErrorCode::Validation,
      Error::InvalidTransition { .. } => ErrorCode::InvalidTransition,
      Error::StaleCase { .. } => ErrorCode::StaleCase,
      Error::RoleMismatch { .. } => ErrorCode::RoleMismatch,
      Error::NotOnboardingRole(_) | Error::UnknownRole(_) | Error::UnknownCaseStatus(_) => {
        ErrorCode::BadRequest
      }
      Error::RecordNotFound(_) | Error::CaseNotFound(_) => ErrorCode::NotFound,
      Error::Serialization(_) => ErrorCode::Internal,
    };

    let mut body = ErrorBody::new(code, e.to_string());
    match e {
      Error::IncompleteSteps { missing } => body.missing_steps = missing.clone(),
      Error::LockedRecord { status } => body.case_status = Some(*status),
      Error::InvalidTransition { from, .. } => body.case_status = Some(*from),
      Error::Validation(v) => body.validation = Some(v.clone()),
      _ => {}
    }
    body
  }
}

/// Response of every admin case action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResponse {
  pub record: OnboardingRecord,
  pub case:   KycCase,
}
