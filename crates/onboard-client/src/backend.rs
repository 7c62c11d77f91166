//! The seam between the session layer and the onboarding server.

use std::future::Future;

use onboard_core::record::OnboardingRecord;
use serde_json::Value;

use crate::error::Result;

/// The three applicant calls the session and coordinator need. Implemented by
/// [`crate::client::ApiClient`] and by in-process fakes in tests.
pub trait OnboardingBackend: Send + Sync {
  /// `GET /onboarding`
  fn fetch_record(&self) -> impl Future<Output = Result<OnboardingRecord>> + Send + '_;

  /// `PUT /onboarding/{step}`
  fn put_step<'a>(
    &'a self,
    step: &'a str,
    payload: &'a Value,
  ) -> impl Future<Output = Result<OnboardingRecord>> + Send + 'a;

  /// `POST /onboarding/submit`
  fn submit_for_review(&self) -> impl Future<Output = Result<OnboardingRecord>> + Send + '_;
}
