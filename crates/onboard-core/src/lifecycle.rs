//! KYC case lifecycle: statuses, actions and the transition table.
//!
//! No status is strictly terminal: APPROVED and REJECTED can both be reopened
//! by an admin `unlock-for-update`, which leads to REVISION_REQUESTED, and a
//! rejected case can also simply be resubmitted. The table below is
//! the only place that decides which action is legal from which status.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::Error;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
  #[default]
  Draft,
  Submitted,
  Approved,
  Rejected,
  InfoRequested,
  RevisionRequested,
}

impl CaseStatus {
  pub const ALL: [CaseStatus; 6] = [
    CaseStatus::Draft,
    CaseStatus::Submitted,
    CaseStatus::Approved,
    CaseStatus::Rejected,
    CaseStatus::InfoRequested,
    CaseStatus::RevisionRequested,
  ];

  /// Applicant edits are refused while a case is under review or approved.
  pub fn is_locked(self) -> bool { matches!(self, Self::Submitted | Self::Approved) }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "DRAFT",
      Self::Submitted => "SUBMITTED",
      Self::Approved => "APPROVED",
      Self::Rejected => "REJECTED",
      Self::InfoRequested => "INFO_REQUESTED",
      Self::RevisionRequested => "REVISION_REQUESTED",
    }
  }
}

impl fmt::Display for CaseStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for CaseStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    CaseStatus::ALL
      .into_iter()
      .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| Error::UnknownCaseStatus(s.to_owned()))
  }
}

// ─── Actions ─────────────────────────────────────────────────────────────────

/// Who is allowed to drive an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
  Applicant,
  Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaseAction {
  Submit,
  Approve,
  Reject,
  RequestInfo,
  UnlockForUpdate,
}

impl CaseAction {
  pub fn actor(self) -> Actor {
    match self {
      Self::Submit => Actor::Applicant,
      _ => Actor::Admin,
    }
  }

  /// Path segment used by the admin endpoints, e.g. `request-info`.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Submit => "submit",
      Self::Approve => "approve",
      Self::Reject => "reject",
      Self::RequestInfo => "request-info",
      Self::UnlockForUpdate => "unlock-for-update",
    }
  }
}

impl fmt::Display for CaseAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Transition table ────────────────────────────────────────────────────────

/// `(from, action) → to`. Anything not listed is an invalid transition.
pub const TRANSITIONS: &[(CaseStatus, CaseAction, CaseStatus)] = &[
  (CaseStatus::Draft, CaseAction::Submit, CaseStatus::Submitted),
  (CaseStatus::Submitted, CaseAction::Approve, CaseStatus::Approved),
  (CaseStatus::Submitted, CaseAction::Reject, CaseStatus::Rejected),
  (CaseStatus::Submitted, CaseAction::RequestInfo, CaseStatus::InfoRequested),
  (CaseStatus::Rejected, CaseAction::Submit, CaseStatus::Submitted),
  (CaseStatus::InfoRequested, CaseAction::Submit, CaseStatus::Submitted),
  (CaseStatus::Approved, CaseAction::UnlockForUpdate, CaseStatus::RevisionRequested),
  (CaseStatus::Rejected, CaseAction::UnlockForUpdate, CaseStatus::RevisionRequested),
  (CaseStatus::RevisionRequested, CaseAction::Submit, CaseStatus::Submitted),
];

/// Look up the status `action` leads to from `from`.
pub fn transition(from: CaseStatus, action: CaseAction) -> Option<CaseStatus> {
  TRANSITIONS
    .iter()
    .find(|(f, a, _)| *f == from && *a == action)
    .map(|(_, _, to)| *to)
}

/// Whether a submit from `from` continues the previous submission number
/// (answering an info request) or opens a new one.
pub fn continues_submission(from: CaseStatus) -> bool {
  from == CaseStatus::InfoRequested
}

// ─── Review decisions ────────────────────────────────────────────────────────

/// An admin decision on a submitted case, as posted to the admin endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum ReviewDecision {
  Approve,
  Reject {
    reason: String,
  },
  RequestInfo {
    message: String,
  },
  UnlockForUpdate {
    #[serde(default)]
    reason:       Option<String>,
    /// Steps the applicant has to complete again. Their data is kept so the
    /// wizard can prefill it.
    #[serde(default)]
    reopen_steps: Vec<String>,
  },
}

impl ReviewDecision {
  pub fn action(&self) -> CaseAction {
    match self {
      Self::Approve => CaseAction::Approve,
      Self::Reject { .. } => CaseAction::Reject,
      Self::RequestInfo { .. } => CaseAction::RequestInfo,
      Self::UnlockForUpdate { .. } => CaseAction::UnlockForUpdate,
    }
  }
}

// ─── Case ────────────────────────────────────────────────────────────────────

/// One submission of an organization's onboarding data for review.
///
/// The frozen `completed_steps` and `step_data` never change after creation;
/// only the review fields of the organization's latest case are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycCase {
  pub case_id:              Uuid,
  pub organization_id:      Uuid,
  /// Increases by one for every fresh submission of the organization.
  pub submission_number:    u32,
  /// 1-based attempt within `submission_number`; answering an info request
  /// adds an attempt instead of a new number.
  pub attempt:              u32,
  pub status:               CaseStatus,
  pub completed_steps:      Vec<String>,
  pub step_data:            BTreeMap<String, Value>,
  pub submitted_at:         DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reviewed_at:          Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reviewer:             Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rejection_reason:     Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub info_request_message: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unlocked_at:          Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub unlock_reason:        Option<String>,
  /// The case that replaced this one when the applicant submitted again.
  /// Set once; a superseded case is history, whatever its `status` says.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub superseded_by:        Option<Uuid>,
}

impl KycCase {
  /// Still the organization's live case.
  pub fn is_live(&self) -> bool { self.superseded_by.is_none() }
}
