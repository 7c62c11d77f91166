//! Step payload validation seam.
//!
//! Field-level rules belong to each step's own form schema and live outside
//! this crate. The core only needs a yes/no answer plus an error it can pass
//! back to the step unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::role::Role;

/// A payload rejected by a step's schema. The core never inspects `details`.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("invalid payload for step {step}: {message}")]
pub struct ValidationError {
  pub step:    String,
  pub message: String,
  #[serde(default, skip_serializing_if = "Value::is_null")]
  pub details: Value,
}

impl ValidationError {
  pub fn new(step: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      step:    step.into(),
      message: message.into(),
      details: Value::Null,
    }
  }

  pub fn with_details(mut self, details: Value) -> Self {
    self.details = details;
    self
  }
}

/// Checks a payload against the schema of the step it is submitted for.
pub trait StepValidator: Send + Sync {
  fn validate(&self, role: Role, step: &str, payload: &Value) -> Result<(), ValidationError>;
}

/// Requires every payload to be a JSON object. The server default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonObjectPayload;

impl StepValidator for JsonObjectPayload {
  fn validate(&self, _role: Role, step: &str, payload: &Value) -> Result<(), ValidationError> {
    if payload.is_object() {
      Ok(())
    } else {
      Err(ValidationError::new(step, "payload must be a JSON object"))
    }
  }
}

/// Accepts anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl StepValidator for AcceptAll {
  fn validate(&self, _role: Role, _step: &str, _payload: &Value) -> Result<(), ValidationError> {
    Ok(())
  }
}
