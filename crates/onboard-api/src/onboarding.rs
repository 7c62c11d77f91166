//! Handlers for the applicant's own `/onboarding` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/onboarding` | Unsaved DRAFT (revision 0) if nothing stored yet |
//! | `GET`  | `/onboarding/progress` | Resolver output for the record |
//! | `PUT`  | `/onboarding/{step_id}` | Body: the step payload |
//! | `POST` | `/onboarding/submit` | Opens a KYC case |
//!
//! Every endpoint requires the `X-Organization-Id` and `X-Organization-Role`
//! headers.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use chrono::Utc;
use onboard_core::{record::OnboardingRecord, resolver::Progress, store::OnboardingStore};
use serde_json::Value;

use crate::{error::ApiError, identity::Applicant};

async fn current_record<S>(store: &S, applicant: Applicant) -> Result<OnboardingRecord, ApiError>
where
  S: OnboardingStore,
{
  let stored = store
    .get_record(applicant.organization_id)
    .await
    .map_err(ApiError::from_store)?;

  match stored {
    Some(record) => {
      record.ensure_role(applicant.role)?;
      Ok(record)
    }
    None if applicant.role.is_onboarding() => {
      Ok(OnboardingRecord::new(applicant.organization_id, applicant.role, Utc::now()))
    }
    None => Err(onboard_core::Error::NotOnboardingRole(applicant.role).into()),
  }
}

// ─── Read ─────────────────────────────────────────────────────────────────────

/// `GET /onboarding`
pub async fn get_record<S>(
  State(store): State<Arc<S>>,
  applicant: Applicant,
) -> Result<Json<OnboardingRecord>, ApiError>
where
  S: OnboardingStore,
{
  Ok(Json(current_record(store.as_ref(), applicant).await?))
}

/// `GET /onboarding/progress`
pub async fn progress<S>(
  State(store): State<Arc<S>>,
  applicant: Applicant,
) -> Result<Json<Progress>, ApiError>
where
  S: OnboardingStore,
{
  let record = current_record(store.as_ref(), applicant).await?;
  Ok(Json(record.progress()))
}

// ─── Write ────────────────────────────────────────────────────────────────────

/// `PUT /onboarding/{step_id}`
///
/// Body: the step's form payload.
pub async fn put_step<S>(
  State(store): State<Arc<S>>,
  applicant: Applicant,
  Path(step_id): Path<String>,
  Json(payload): Json<Value>,
) -> Result<Json<OnboardingRecord>, ApiError>
where
  S: OnboardingStore,
{
  let record = store
    .put_step(applicant.organization_id, applicant.role, step_id, payload)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(record))
}

/// `POST /onboarding/submit`
///
/// Returns the record only; the case is an admin-side resource.
pub async fn submit<S>(
  State(store): State<Arc<S>>,
  applicant: Applicant,
) -> Result<Json<OnboardingRecord>, ApiError>
where
  S: OnboardingStore,
{
  let (record, _case) = store
    .submit_for_review(applicant.organization_id, applicant.role)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(record))
}
