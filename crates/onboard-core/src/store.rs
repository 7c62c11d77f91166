//! The `OnboardingStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `onboard-store-sqlite`).
//! Each mutating method must run load → rule → persist atomically, so that an
//! applicant and a reviewer acting at the same moment cannot interleave.

use std::future::Future;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
  lifecycle::{CaseStatus, KycCase, ReviewDecision},
  record::OnboardingRecord,
  role::Role,
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`OnboardingStore::list_cases`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaseQuery {
  pub organization_id: Option<Uuid>,
  /// Matches live cases only; a superseded case keeps the status it was
  /// left in but no longer belongs in any review queue.
  pub status:          Option<CaseStatus>,
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Backend errors expose the domain error they wrap, if any, so callers can
/// tell a refused transition from a broken database.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn as_core(&self) -> Option<&crate::Error>;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

pub trait OnboardingStore: Send + Sync {
  type Error: StoreError;

  /// The stored record, or `None` if the organization never submitted a
  /// step.
  fn get_record(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<Option<OnboardingRecord>, Self::Error>> + Send + '_;

  /// Accept a step payload, creating the record on first use.
  fn put_step(
    &self,
    organization_id: Uuid,
    role: Role,
    step: String,
    payload: Value,
  ) -> impl Future<Output = Result<OnboardingRecord, Self::Error>> + Send + '_;

  /// Submit the record for review, creating a new [`KycCase`].
  fn submit_for_review(
    &self,
    organization_id: Uuid,
    role: Role,
  ) -> impl Future<Output = Result<(OnboardingRecord, KycCase), Self::Error>> + Send + '_;

  /// Apply an admin decision to a case.
  fn review_case(
    &self,
    case_id: Uuid,
    decision: ReviewDecision,
    reviewer: Option<String>,
  ) -> impl Future<Output = Result<(OnboardingRecord, KycCase), Self::Error>> + Send + '_;

  fn get_case(
    &self,
    case_id: Uuid,
  ) -> impl Future<Output = Result<Option<KycCase>, Self::Error>> + Send + '_;

  /// Cases matching `query`, oldest submission first.
  fn list_cases<'a>(
    &'a self,
    query: &'a CaseQuery,
  ) -> impl Future<Output = Result<Vec<KycCase>, Self::Error>> + Send + 'a;
}
