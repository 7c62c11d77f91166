//! Error types for `onboard-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{
  lifecycle::{CaseAction, CaseStatus},
  role::Role,
  validate::ValidationError,
};

#[derive(Debug, Error)]
pub enum Error {
  /// An applicant action was attempted while the case is under or past
  /// review. Only an admin unlock clears this.
  #[error("onboarding record is locked while the case is {status}")]
  LockedRecord { status: CaseStatus },

  #[error("required steps are not complete: {}", missing.join(", "))]
  IncompleteSteps { missing: Vec<String> },

  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("cannot {action} a case in status {from}")]
  InvalidTransition { from: CaseStatus, action: CaseAction },

  #[error("case {case_id} is not the organization's latest submission")]
  StaleCase { case_id: Uuid, latest: Option<Uuid> },

  #[error("{action} requires a non-empty note")]
  EmptyReviewNote { action: CaseAction },

  #[error("organization is registered as {stored}, not {claimed}")]
  RoleMismatch { stored: Role, claimed: Role },

  #[error("role {0} does not onboard")]
  NotOnboardingRole(Role),

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  #[error("unknown case status: {0:?}")]
  UnknownCaseStatus(String),

  #[error("onboarding record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("case not found: {0}")]
  CaseNotFound(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
