//! JSON REST API for marketplace onboarding.
//!
//! Exposes two axum [`Router`]s backed by any
//! [`onboard_core::store::OnboardingStore`]: one for applicants working
//! through their wizard and one for KYC reviewers. Authentication is the
//! caller's responsibility; the admin router expects a
//! [`identity::ReviewerId`] extension when a reviewer name should be
//! recorded.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", onboard_api::applicant_router(store.clone())
//!   .merge(onboard_api::admin_router(store.clone()).layer(auth)))
//! ```

pub mod error;
pub mod identity;
pub mod kyc;
pub mod onboarding;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use onboard_core::store::OnboardingStore;

pub use error::ApiError;

/// Routes an organization uses on its own record.
pub fn applicant_router<S>(store: Arc<S>) -> Router<()>
where
  S: OnboardingStore + 'static,
{
  Router::new()
    .route("/onboarding", get(onboarding::get_record::<S>))
    .route("/onboarding/progress", get(onboarding::progress::<S>))
    .route("/onboarding/submit", post(onboarding::submit::<S>))
    .route("/onboarding/{step_id}", put(onboarding::put_step::<S>))
    .with_state(store)
}

/// Routes for KYC reviewers.
pub fn admin_router<S>(store: Arc<S>) -> Router<()>
where
  S: OnboardingStore + 'static,
{
  Router::new()
    // Reads
    .route("/kyc/cases", get(kyc::list::<S>))
    .route("/kyc/case/{id}", get(kyc::get_one::<S>))
    .route("/kyc/organizations/{org_id}/cases", get(kyc::organization_cases::<S>))
    .route("/kyc/organizations/{org_id}/record", get(kyc::organization_record::<S>))
    // Decisions
    .route("/kyc/case/{id}/approve", post(kyc::approve::<S>))
    .route("/kyc/case/{id}/reject", post(kyc::reject::<S>))
    .route("/kyc/case/{id}/request-info", post(kyc::request_info::<S>))
    .route("/kyc/case/{id}/unlock-for-update", post(kyc::unlock_for_update::<S>))
    .with_state(store)
}

// ─── Integration tests ────────────────────────────────────────────────────────
