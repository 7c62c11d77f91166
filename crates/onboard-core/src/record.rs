//! The onboarding record and the rules that mutate it.
//!
//! Every mutation goes through a method on [`OnboardingRecord`] so that
//! storage backends only load, call, and persist. A method that returns an
//! error leaves the record exactly as it found it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  Error, Result,
  lifecycle::{self, CaseAction, CaseStatus, KycCase, ReviewDecision},
  registry,
  resolver::{self, Progress},
  role::Role,
  validate::{StepValidator, ValidationError},
};

/// Per-organization onboarding state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingRecord {
  pub organization_id:    Uuid,
  pub role:               Role,
  /// Unordered. Ids unknown to the role's wizard are kept as-is.
  pub completed_steps:    BTreeSet<String>,
  pub case_status:        CaseStatus,
  /// Mirrors `case_status.is_locked()`; recomputed after every transition.
  pub is_locked:          bool,
  /// Last accepted payload per step, replaced wholesale on resubmission.
  pub step_data:          BTreeMap<String, Value>,
  /// Number of successful submit-for-review actions.
  pub submission_attempt: u32,
  /// Bumped by every persisted mutation. `0` means never persisted.
  pub revision:           u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub latest_case_id:     Option<Uuid>,
  pub created_at:         DateTime<Utc>,
  pub updated_at:         DateTime<Utc>,
}

/// Result of [`OnboardingRecord::apply_step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
  Changed,
  /// Same payload resubmitted for an already-completed step.
  Unchanged,
}

/// Result of [`OnboardingRecord::apply_review`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
  Applied,
  /// The decision had already been applied to this case (a retry).
  AlreadyApplied,
}

impl OnboardingRecord {
  /// A fresh, unsaved draft.
  pub fn new(organization_id: Uuid, role: Role, now: DateTime<Utc>) -> Self {
    Self {
      organization_id,
      role,
      completed_steps: BTreeSet::new(),
      case_status: CaseStatus::Draft,
      is_locked: false,
      step_data: BTreeMap::new(),
      submission_attempt: 0,
      revision: 0,
      latest_case_id: None,
      created_at: now,
      updated_at: now,
    }
  }

  pub fn progress(&self) -> Progress { resolver::resolve(self.role, &self.completed_steps) }

  /// Fails if `claimed` differs from the role the record was created with.
  pub fn ensure_role(&self, claimed: Role) -> Result<()> {
    if claimed == self.role {
      Ok(())
    } else {
      Err(Error::RoleMismatch { stored: self.role, claimed })
    }
  }

  /// Fails with [`Error::LockedRecord`] while the case is under or past
  /// review.
  pub fn ensure_editable(&self) -> Result<()> {
    if self.case_status.is_locked() {
      Err(Error::LockedRecord { status: self.case_status })
    } else {
      Ok(())
    }
  }

  /// Accept `payload` for `step`: replace its data and mark it completed.
  pub fn apply_step(
    &mut self,
    step: &str,
    payload: Value,
    validator: &dyn StepValidator,
    now: DateTime<Utc>,
  ) -> Result<StepOutcome> {
    self.ensure_editable()?;
    if !self.role.is_onboarding() {
      return Err(Error::NotOnboardingRole(self.role));
    }
    if !registry::is_known_step(self.role, step) {
      return Err(
        ValidationError::new(step, format!("{step} is not a {} onboarding step", self.role)).into(),
      );
    }
    validator.validate(self.role, step, &payload)?;

    if self.completed_steps.contains(step) && self.step_data.get(step) == Some(&payload) {
      return Ok(StepOutcome::Unchanged);
    }

    self.step_data.insert(step.to_owned(), payload);
    self.completed_steps.insert(step.to_owned());
    self.touch(now);
    Ok(StepOutcome::Changed)
  }

  /// Move the record to `SUBMITTED` and return the new case snapshot.
  ///
  /// `latest` must be the case referenced by `latest_case_id`, if any; it
  /// decides whether this submit continues a submission number or opens a new
  /// one, and is marked as superseded by the returned case.
  pub fn submit_for_review(
    &mut self,
    latest: Option<&mut KycCase>,
    now: DateTime<Utc>,
  ) -> Result<KycCase> {
    self.ensure_editable()?;
    if !self.role.is_onboarding() {
      return Err(Error::NotOnboardingRole(self.role));
    }
    let from = self.case_status;
    let to = lifecycle::transition(from, CaseAction::Submit)
      .ok_or(Error::InvalidTransition { from, action: CaseAction::Submit })?;

    let missing = resolver::missing_steps(self.role, &self.completed_steps);
    if !missing.is_empty() {
      return Err(Error::IncompleteSteps { missing });
    }

    let (submission_number, attempt) = match latest.as_deref() {
      Some(prev) if lifecycle::continues_submission(from) => {
        (prev.submission_number, prev.attempt + 1)
      }
      Some(prev) => (prev.submission_number + 1, 1),
      None => (1, 1),
    };

    let case = KycCase {
      case_id: Uuid::new_v4(),
      organization_id: self.organization_id,
      submission_number,
      attempt,
      status: to,
      completed_steps: self.completed_steps.iter().cloned().collect(),
      step_data: self.step_data.clone(),
      submitted_at: now,
      reviewed_at: None,
      reviewer: None,
      rejection_reason: None,
      info_request_message: None,
      unlocked_at: None,
      unlock_reason: None,
      superseded_by: None,
    };

    if let Some(prev) = latest {
      prev.superseded_by = Some(case.case_id);
    }
    self.case_status = to;
    self.submission_attempt += 1;
    self.latest_case_id = Some(case.case_id);
    self.touch(now);
    Ok(case)
  }

  /// Apply an admin decision to `case`, which must be this record's latest.
  ///
  /// Repeating the decision that produced the current status is a no-op, so
  /// admin endpoints are safe to retry.
  pub fn apply_review(
    &mut self,
    case: &mut KycCase,
    decision: ReviewDecision,
    reviewer: Option<String>,
    now: DateTime<Utc>,
  ) -> Result<ReviewOutcome> {
    let action = decision.action();

    if self.latest_case_id != Some(case.case_id) || case.organization_id != self.organization_id {
      return Err(Error::StaleCase {
        case_id: case.case_id,
        latest:  self.latest_case_id,
      });
    }

    let note = match &decision {
      ReviewDecision::Reject { reason } => Some(reason.trim()),
      ReviewDecision::RequestInfo { message } => Some(message.trim()),
      _ => None,
    };
    if note.is_some_and(str::is_empty) {
      return Err(Error::EmptyReviewNote { action });
    }

    if self.is_repeat_of(case, &decision) {
      return Ok(ReviewOutcome::AlreadyApplied);
    }

    let from = self.case_status;
    let to = lifecycle::transition(from, action)
      .ok_or(Error::InvalidTransition { from, action })?;

    match decision {
      ReviewDecision::Approve => {
        case.reviewed_at = Some(now);
      }
      ReviewDecision::Reject { reason } => {
        case.reviewed_at = Some(now);
        case.rejection_reason = Some(reason.trim().to_owned());
      }
      ReviewDecision::RequestInfo { message } => {
        case.reviewed_at = Some(now);
        case.info_request_message = Some(message.trim().to_owned());
      }
      ReviewDecision::UnlockForUpdate { reason, reopen_steps } => {
        case.unlocked_at = Some(now);
        case.unlock_reason = reason;
        for step in &reopen_steps {
          self.completed_steps.remove(step);
        }
      }
    }
    case.reviewer = reviewer;
    case.status = to;

    self.case_status = to;
    self.touch(now);
    Ok(ReviewOutcome::Applied)
  }

  fn is_repeat_of(&self, case: &KycCase, decision: &ReviewDecision) -> bool {
    match decision {
      ReviewDecision::Approve => case.status == CaseStatus::Approved,
      ReviewDecision::Reject { reason } => {
        case.status == CaseStatus::Rejected
          && case.rejection_reason.as_deref() == Some(reason.trim())
      }
      ReviewDecision::RequestInfo { message } => {
        case.status == CaseStatus::InfoRequested
          && case.info_request_message.as_deref() == Some(message.trim())
      }
      ReviewDecision::UnlockForUpdate { .. } => {
        case.status == CaseStatus::RevisionRequested
      }
    }
  }

  fn touch(&mut self, now: DateTime<Utc>) {
    self.is_locked = self.case_status.is_locked();
    self.revision += 1;
    self.updated_at = now;
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::{
    registry::{BANK_DETAILS, CATALOG, COMPLIANCE_DOCS, ORG_KYC, steps_for},
    validate::{AcceptAll, JsonObjectPayload},
  };

  fn seller() -> OnboardingRecord { OnboardingRecord::new(Uuid::new_v4(), Role::Seller, Utc::now()) }

  fn complete(record: &mut OnboardingRecord) {
    for step in steps_for(record.role) {
      record
        .apply_step(step, json!({ "step": step }), &JsonObjectPayload, Utc::now())
        .unwrap();
    }
  }

  fn submitted() -> (OnboardingRecord, KycCase) {
    let mut record = seller();
    complete(&mut record);
    let case = record.submit_for_review(None, Utc::now()).unwrap();
    (record, case)
  }

  // ── Steps ──────────────────────────────────────────────────────────────────

  #[test]
  fn resubmitting_a_step_is_idempotent() {
    let mut record = seller();
    let payload = json!({"account": "0001", "ifsc": "HDFC0000001"});

    let first = record.apply_step(BANK_DETAILS, payload.clone(), &AcceptAll, Utc::now()).unwrap();
    let revision = record.revision;
    let second = record.apply_step(BANK_DETAILS, payload.clone(), &AcceptAll, Utc::now()).unwrap();

    assert_eq!(first, StepOutcome::Changed);
    assert_eq!(second, StepOutcome::Unchanged);
    assert_eq!(record.revision, revision);
    assert_eq!(record.completed_steps.iter().filter(|s| *s == BANK_DETAILS).count(), 1);
    assert_eq!(record.step_data[BANK_DETAILS], payload);
  }

  #[test]
  fn new_payload_replaces_old_wholesale() {
    let mut record = seller();
    record
      .apply_step(ORG_KYC, json!({"pan": "A", "gstin": "G"}), &AcceptAll, Utc::now())
      .unwrap();
    record.apply_step(ORG_KYC, json!({"pan": "B"}), &AcceptAll, Utc::now()).unwrap();
    assert_eq!(record.step_data[ORG_KYC], json!({"pan": "B"}));
  }

  #[test]
  fn locked_record_refuses_steps_and_stays_unchanged() {
    let (mut record, _case) = submitted();
    let before = record.clone();

    let err = record
      .apply_step(CATALOG, json!({"sku": 1}), &AcceptAll, Utc::now())
      .unwrap_err();

    assert!(matches!(err, Error::LockedRecord { status: CaseStatus::Submitted }));
    assert_eq!(record, before);
  }

  #[test]
  fn unknown_step_is_a_validation_error() {
    let mut record = seller();
    let err = record
      .apply_step("buyer-preferences", json!({}), &AcceptAll, Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::Validation(ref v) if v.step == "buyer-preferences"));
    assert!(record.completed_steps.is_empty());
  }

  #[test]
  fn validator_rejection_leaves_record_untouched() {
    let mut record = seller();
    let err = record
      .apply_step(ORG_KYC, json!("flat string"), &JsonObjectPayload, Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(record.revision, 0);
    assert!(record.step_data.is_empty());
  }

  #[test]
  fn admins_do_not_onboard() {
    let mut admin = OnboardingRecord::new(Uuid::new_v4(), Role::Admin, Utc::now());
    let err = admin.apply_step(ORG_KYC, json!({}), &AcceptAll, Utc::now()).unwrap_err();
    assert!(matches!(err, Error::NotOnboardingRole(Role::Admin)));
    let err = admin.submit_for_review(None, Utc::now()).unwrap_err();
    assert!(matches!(err, Error::NotOnboardingRole(Role::Admin)));
  }

  #[test]
  fn role_is_immutable() {
    let record = seller();
    assert!(record.ensure_role(Role::Seller).is_ok());
    assert!(matches!(
      record.ensure_role(Role::Buyer),
      Err(Error::RoleMismatch { stored: Role::Seller, claimed: Role::Buyer })
    ));
  }

  // ── Submit ─────────────────────────────────────────────────────────────────

  #[test]
  fn submit_requires_every_step() {
    let mut record = seller();
    record.apply_step(ORG_KYC, json!({}), &AcceptAll, Utc::now()).unwrap();
    record.apply_step(CATALOG, json!({}), &AcceptAll, Utc::now()).unwrap();

    let err = record.submit_for_review(None, Utc::now()).unwrap_err();
    match err {
      Error::IncompleteSteps { missing } => {
        assert_eq!(missing, vec![BANK_DETAILS.to_owned(), COMPLIANCE_DOCS.to_owned()]);
      }
      other => panic!("expected IncompleteSteps, got {other:?}"),
    }
    assert_eq!(record.case_status, CaseStatus::Draft);
    assert_eq!(record.submission_attempt, 0);
  }

  #[test]
  fn seller_end_to_end_reaches_submitted() {
    let mut record = seller();
    record.apply_step(ORG_KYC, json!({}), &AcceptAll, Utc::now()).unwrap();
    record.apply_step(BANK_DETAILS, json!({}), &AcceptAll, Utc::now()).unwrap();

    let progress = record.progress();
    assert_eq!(progress.next_step.as_deref(), Some(COMPLIANCE_DOCS));
    assert_eq!(progress.percentage, 50);

    record.apply_step(COMPLIANCE_DOCS, json!({}), &AcceptAll, Utc::now()).unwrap();
    record.apply_step(CATALOG, json!({}), &AcceptAll, Utc::now()).unwrap();
    assert!(record.progress().is_complete);

    let case = record.submit_for_review(None, Utc::now()).unwrap();
    assert_eq!(record.case_status, CaseStatus::Submitted);
    assert!(record.is_locked);
    assert_eq!(record.submission_attempt, 1);
    assert_eq!(case.submission_number, 1);
    assert_eq!(case.attempt, 1);
    assert_eq!(record.latest_case_id, Some(case.case_id));
    assert_eq!(case.step_data, record.step_data);
  }

  #[test]
  fn submit_while_submitted_is_locked() {
    let (mut record, mut case) = submitted();
    let err = record.submit_for_review(Some(&mut case), Utc::now()).unwrap_err();
    assert!(matches!(err, Error::LockedRecord { .. }));
    assert_eq!(record.submission_attempt, 1);
    assert!(case.is_live());
  }

  // ── Review ─────────────────────────────────────────────────────────────────

  #[test]
  fn approve_then_unlock_then_resubmit() {
    let (mut record, mut case) = submitted();
    record
      .apply_review(&mut case, ReviewDecision::Approve, Some("ops".into()), Utc::now())
      .unwrap();
    assert_eq!(record.case_status, CaseStatus::Approved);
    assert!(record.is_locked);
    assert!(case.reviewed_at.is_some());
    let attempts_before_unlock = record.submission_attempt;

    record
      .apply_review(
        &mut case,
        ReviewDecision::UnlockForUpdate { reason: None, reopen_steps: vec![] },
        None,
        Utc::now(),
      )
      .unwrap();
    assert_eq!(record.case_status, CaseStatus::RevisionRequested);
    assert!(!record.is_locked);

    let next = record.submit_for_review(Some(&mut case), Utc::now()).unwrap();
    assert_eq!(record.case_status, CaseStatus::Submitted);
    assert_eq!(record.submission_attempt, attempts_before_unlock + 1);
    assert_eq!(next.submission_number, case.submission_number + 1);
    assert_eq!(next.attempt, 1);
  }

  #[test]
  fn rejection_needs_reason_and_resubmit_opens_new_number() {
    let (mut record, mut case) = submitted();
    let err = record
      .apply_review(&mut case, ReviewDecision::Reject { reason: "   ".into() }, None, Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::EmptyReviewNote { action: CaseAction::Reject }));
    assert_eq!(record.case_status, CaseStatus::Submitted);

    record
      .apply_review(
        &mut case,
        ReviewDecision::Reject { reason: "expired licence".into() },
        None,
        Utc::now(),
      )
      .unwrap();
    assert_eq!(case.rejection_reason.as_deref(), Some("expired licence"));
    assert!(!record.is_locked);

    let next = record.submit_for_review(Some(&mut case), Utc::now()).unwrap();
    assert_eq!(next.submission_number, 2);
    assert_eq!(next.attempt, 1);
  }

  #[test]
  fn rejected_case_can_be_unlocked_then_resubmitted() {
    let (mut record, mut case) = submitted();
    record
      .apply_review(&mut case, ReviewDecision::Reject { reason: "blurry id".into() }, None, Utc::now())
      .unwrap();
    record
      .apply_review(
        &mut case,
        ReviewDecision::UnlockForUpdate {
          reason:       Some("re-upload documents".into()),
          reopen_steps: vec![],
        },
        Some("ops".into()),
        Utc::now(),
      )
      .unwrap();
    assert_eq!(record.case_status, CaseStatus::RevisionRequested);
    assert_eq!(case.status, CaseStatus::RevisionRequested);
    assert_eq!(case.unlock_reason.as_deref(), Some("re-upload documents"));
    assert!(!record.is_locked);

    let next = record.submit_for_review(Some(&mut case), Utc::now()).unwrap();
    assert_eq!(record.case_status, CaseStatus::Submitted);
    assert_eq!(next.submission_number, 2);
    assert_eq!(next.attempt, 1);
    assert_eq!(case.superseded_by, Some(next.case_id));
  }

  #[test]
  fn info_request_resubmit_keeps_submission_number() {
    let (mut record, mut case) = submitted();
    record
      .apply_review(
        &mut case,
        ReviewDecision::RequestInfo { message: "upload cancelled cheque".into() },
        None,
        Utc::now(),
      )
      .unwrap();
    assert_eq!(record.case_status, CaseStatus::InfoRequested);
    assert_eq!(case.info_request_message.as_deref(), Some("upload cancelled cheque"));

    let next = record.submit_for_review(Some(&mut case), Utc::now()).unwrap();
    assert_eq!(next.submission_number, case.submission_number);
    assert_eq!(next.attempt, 2);
    assert_eq!(record.submission_attempt, 2);
    assert_eq!(case.superseded_by, Some(next.case_id));
    assert!(next.is_live());
  }

  #[test]
  fn repeated_decision_is_a_no_op() {
    let (mut record, mut case) = submitted();
    record.apply_review(&mut case, ReviewDecision::Approve, None, Utc::now()).unwrap();
    let revision = record.revision;
    let reviewed_at = case.reviewed_at;

    let outcome = record
      .apply_review(&mut case, ReviewDecision::Approve, None, Utc::now())
      .unwrap();
    assert_eq!(outcome, ReviewOutcome::AlreadyApplied);
    assert_eq!(record.revision, revision);
    assert_eq!(case.reviewed_at, reviewed_at);
  }

  #[test]
  fn conflicting_decision_after_review_is_invalid() {
    let (mut record, mut case) = submitted();
    record.apply_review(&mut case, ReviewDecision::Approve, None, Utc::now()).unwrap();
    let err = record
      .apply_review(&mut case, ReviewDecision::Reject { reason: "late".into() }, None, Utc::now())
      .unwrap_err();
    assert!(matches!(
      err,
      Error::InvalidTransition { from: CaseStatus::Approved, action: CaseAction::Reject }
    ));
  }

  #[test]
  fn only_latest_case_can_be_reviewed() {
    let (mut record, mut first) = submitted();
    record
      .apply_review(&mut first, ReviewDecision::Reject { reason: "no".into() }, None, Utc::now())
      .unwrap();
    let _second = record.submit_for_review(Some(&mut first), Utc::now()).unwrap();

    let err = record
      .apply_review(&mut first, ReviewDecision::Approve, None, Utc::now())
      .unwrap_err();
    assert!(matches!(err, Error::StaleCase { .. }));
  }

  #[test]
  fn unlock_can_reopen_selected_steps() {
    let (mut record, mut case) = submitted();
    record.apply_review(&mut case, ReviewDecision::Approve, None, Utc::now()).unwrap();
    record
      .apply_review(
        &mut case,
        ReviewDecision::UnlockForUpdate {
          reason:       Some("bank changed".into()),
          reopen_steps: vec![BANK_DETAILS.into()],
        },
        None,
        Utc::now(),
      )
      .unwrap();

    assert!(!record.completed_steps.contains(BANK_DETAILS));
    assert!(record.step_data.contains_key(BANK_DETAILS));
    assert_eq!(record.progress().next_step.as_deref(), Some(BANK_DETAILS));
    assert_eq!(case.unlock_reason.as_deref(), Some("bank changed"));
    assert!(matches!(
      record.submit_for_review(Some(&mut case), Utc::now()),
      Err(Error::IncompleteSteps { .. })
    ));
  }
}
