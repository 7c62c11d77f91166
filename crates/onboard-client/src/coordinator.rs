//! The onboarding Submission Coordinator.
//!
//! Takes a step payload from the wizard, sends it to the backend, and folds
//! the response into the [`SessionStore`]. Requests that the cached snapshot
//! already rules out are refused locally, without a network call.

use onboard_core::{record::OnboardingRecord, resolver, resolver::Progress};
use serde_json::Value;

use crate::{
  backend::OnboardingBackend,
  error::{ClientError, Result},
  session::SharedSession,
};

pub struct SubmissionCoordinator<B> {
  session: SharedSession<B>,
}

impl<B: OnboardingBackend> SubmissionCoordinator<B> {
  pub fn new(session: SharedSession<B>) -> Self { Self { session } }

  pub fn session(&self) -> &SharedSession<B> { &self.session }

  /// Resolver output over the cached snapshot.
  pub fn progress(&self) -> Option<Progress> { self.session.snapshot().progress() }

  /// Replace the data of `step` and mark it completed.
  ///
  /// Not deduplicated: callers disable their submit control while
  /// `is_saving` is raised.
  pub async fn submit_step(&self, step: &str, payload: Value) -> Result<OnboardingRecord> {
    let snapshot = self.session.snapshot();
    if let Some(record) = snapshot.record.as_ref().filter(|r| r.is_locked) {
      return Err(self.refuse(ClientError::LockedRecord { status: record.case_status }));
    }

    let backend = self.session.backend();
    let (record, _) = self.session.save(backend.put_step(step, &payload)).await?;
    tracing::debug!(step, revision = record.revision, "step saved");
    Ok(record)
  }

  /// Send the record for KYC review once every required step is complete.
  pub async fn submit_for_review(&self) -> Result<OnboardingRecord> {
    let snapshot = self.session.snapshot();
    let Some(record) = snapshot.record.as_ref() else {
      return Err(self.refuse(ClientError::NotLoaded));
    };
    if record.is_locked {
      return Err(self.refuse(ClientError::LockedRecord { status: record.case_status }));
    }
    let missing = resolver::missing_steps(record.role, &record.completed_steps);
    if !missing.is_empty() {
      return Err(self.refuse(ClientError::IncompleteSteps { missing }));
    }

    let backend = self.session.backend();
    let (record, _) = self.session.save(backend.submit_for_review()).await?;
    tracing::info!(
      status = %record.case_status,
      attempt = record.submission_attempt,
      "submitted for review"
    );
    Ok(record)
  }

  fn refuse(&self, error: ClientError) -> ClientError {
    self.session.record_local_error(error.clone());
    error
  }
}
