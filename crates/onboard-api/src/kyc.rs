//! Handlers for the admin `/kyc` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/kyc/cases` | Review queue; optional `?status=`, `limit`, `offset` |
//! | `GET`  | `/kyc/case/{id}` | 404 if not found |
//! | `POST` | `/kyc/case/{id}/approve` | No body |
//! | `POST` | `/kyc/case/{id}/reject` | Body: `{"reason":"..."}` |
//! | `POST` | `/kyc/case/{id}/request-info` | Body: `{"message":"..."}` |
//! | `POST` | `/kyc/case/{id}/unlock-for-update` | Optional body: `{"reason":..,"reopen_steps":[..]}` |
//! | `GET`  | `/kyc/organizations/{org_id}/cases` | Submission history, oldest first |
//! | `GET`  | `/kyc/organizations/{org_id}/record` | The organization's current record |
//!
//! Decisions return a [`ReviewResponse`] with both the case and the
//! organization's record after the transition.

use std::sync::Arc;

use axum::{
  Extension, Json,
  extract::{Path, Query, State},
};
use onboard_core::{
  lifecycle::{KycCase, ReviewDecision},
  record::OnboardingRecord,
  store::{CaseQuery, OnboardingStore},
  wire::ReviewResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{error::ApiError, identity::ReviewerId};

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /kyc/cases[?status=SUBMITTED][&limit=..][&offset=..]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(query): Query<CaseQuery>,
) -> Result<Json<Vec<KycCase>>, ApiError>
where
  S: OnboardingStore,
{
  let cases = store.list_cases(&query).await.map_err(ApiError::from_store)?;
  Ok(Json(cases))
}

/// `GET /kyc/case/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<KycCase>, ApiError>
where
  S: OnboardingStore,
{
  let case = store
    .get_case(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("case {id} not found")))?;
  Ok(Json(case))
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /kyc/organizations/{org_id}/cases`
pub async fn organization_cases<S>(
  State(store): State<Arc<S>>,
  Path(org_id): Path<Uuid>,
  Query(page): Query<PageParams>,
) -> Result<Json<Vec<KycCase>>, ApiError>
where
  S: OnboardingStore,
{
  let query = CaseQuery {
    organization_id: Some(org_id),
    status:          None,
    limit:           page.limit,
    offset:          page.offset,
  };
  let cases = store.list_cases(&query).await.map_err(ApiError::from_store)?;
  Ok(Json(cases))
}

/// `GET /kyc/organizations/{org_id}/record`
pub async fn organization_record<S>(
  State(store): State<Arc<S>>,
  Path(org_id): Path<Uuid>,
) -> Result<Json<OnboardingRecord>, ApiError>
where
  S: OnboardingStore,
{
  let record = store
    .get_record(org_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("no onboarding record for {org_id}")))?;
  Ok(Json(record))
}

// ─── Decisions ────────────────────────────────────────────────────────────────

async fn decide<S>(
  store: &S,
  case_id: Uuid,
  decision: ReviewDecision,
  reviewer: Option<Extension<ReviewerId>>,
) -> Result<Json<ReviewResponse>, ApiError>
where
  S: OnboardingStore,
{
  let reviewer = reviewer.map(|Extension(ReviewerId(name))| name);
  let (record, case) = store
    .review_case(case_id, decision, reviewer)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(ReviewResponse { record, case }))
}

/// `POST /kyc/case/{id}/approve`
pub async fn approve<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  reviewer: Option<Extension<ReviewerId>>,
) -> Result<Json<ReviewResponse>, ApiError>
where
  S: OnboardingStore,
{
  decide(store.as_ref(), id, ReviewDecision::Approve, reviewer).await
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
  pub reason: String,
}

/// `POST /kyc/case/{id}/reject`
///
/// Body: `{"reason":"..."}`
pub async fn reject<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  reviewer: Option<Extension<ReviewerId>>,
  Json(body): Json<RejectBody>,
) -> Result<Json<ReviewResponse>, ApiError>
where
  S: OnboardingStore,
{
  decide(store.as_ref(), id, ReviewDecision::Reject { reason: body.reason }, reviewer).await
}

#[derive(Debug, Deserialize)]
pub struct RequestInfoBody {
  pub message: String,
}

/// `POST /kyc/case/{id}/request-info`
///
/// Body: `{"message":"..."}`
pub async fn request_info<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  reviewer: Option<Extension<ReviewerId>>,
  Json(body): Json<RequestInfoBody>,
) -> Result<Json<ReviewResponse>, ApiError>
where
  S: OnboardingStore,
{
  let decision = ReviewDecision::RequestInfo { message: body.message };
  decide(store.as_ref(), id, decision, reviewer).await
}

#[derive(Debug, Default, Deserialize)]
pub struct UnlockBody {
  #[serde(default)]
  pub reason:       Option<String>,
  #[serde(default)]
  pub reopen_steps: Vec<String>,
}

/// `POST /kyc/case/{id}/unlock-for-update`
///
/// The body is optional.
pub async fn unlock_for_update<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  reviewer: Option<Extension<ReviewerId>>,
  body: Option<Json<UnlockBody>>,
) -> Result<Json<ReviewResponse>, ApiError>
where
  S: OnboardingStore,
{
  let UnlockBody { reason, reopen_steps } = body.map(|Json(b)| b).unwrap_or_default();
  let decision = ReviewDecision::UnlockForUpdate { reason, reopen_steps };
  decide(store.as_ref(), id, decision, reviewer).await
}
