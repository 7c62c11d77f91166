//! Async HTTP client wrapping the onboarding JSON API.

use std::time::Duration;

use onboard_core::{
  lifecycle::{CaseStatus, KycCase},
  record::OnboardingRecord,
  role::Role,
  wire::{ErrorBody, ReviewResponse},
};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
  backend::OnboardingBackend,
  error::{ClientError, Result},
};

/// Connection settings for the onboarding API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url:        String,
  pub organization_id: Uuid,
  pub role:            Role,
  /// Empty when the caller never uses the admin endpoints.
  pub admin_username:  String,
  pub admin_password:  String,
  pub timeout:         Duration,
}

/// Async HTTP client for the onboarding REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ClientConfig,
}

impl ApiClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| ClientError::Setup(format!("failed to build HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &ClientConfig { &self.config }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn applicant(&self, req: RequestBuilder) -> RequestBuilder {
    req
      .header("x-organization-id", self.config.organization_id.to_string())
      .header("x-organization-role", self.config.role.as_str())
  }

  fn admin(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.admin_username.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.admin_username, Some(&self.config.admin_password))
    }
  }

  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
    let resp = req.send().await.map_err(|e| classify(e, what))?;
    decode(resp, what).await
  }

  // ── Applicant ─────────────────────────────────────────────────────────────

  // ── Admin ─────────────────────────────────────────────────────────────────

  /// `GET /api/kyc/cases[?status=..]`
  pub async fn list_cases(&self, status: Option<CaseStatus>) -> Result<Vec<KycCase>> {
    let mut req = self.admin(self.client.get(self.url("/kyc/cases")));
    if let Some(status) = status {
      req = req.query(&[("status", status.as_str())]);
    }
    self.send(req, "GET /kyc/cases").await
  }

  /// `GET /api/kyc/case/{id}`
  pub async fn get_case(&self, case_id: Uuid) -> Result<KycCase> {
    let req = self.admin(self.client.get(self.url(&format!("/kyc/case/{case_id}"))));
    self.send(req, "GET /kyc/case").await
  }

  /// `GET /api/kyc/organizations/{org_id}/cases`
  pub async fn organization_cases(&self, org_id: Uuid) -> Result<Vec<KycCase>> {
    let path = format!("/kyc/organizations/{org_id}/cases");
    let req = self.admin(self.client.get(self.url(&path)));
    self.send(req, "GET /kyc/organizations/cases").await
  }

  async fn decide(&self, case_id: Uuid, action: &str, body: Option<Value>) -> Result<ReviewResponse> {
    let path = format!("/kyc/case/{case_id}/{action}");
    let mut req = self.admin(self.client.post(self.url(&path)));
    if let Some(body) = body {
      req = req.json(&body);
    }
    self.send(req, &format!("POST /kyc/case/{action}")).await
  }

  pub async fn approve(&self, case_id: Uuid) -> Result<ReviewResponse> {
    self.decide(case_id, "approve", None).await
  }

  pub async fn reject(&self, case_id: Uuid, reason: &str) -> Result<ReviewResponse> {
    self.decide(case_id, "reject", Some(json!({ "reason": reason }))).await
  }

  pub async fn request_info(&self, case_id: Uuid, message: &str) -> Result<ReviewResponse> {
    self.decide(case_id, "request-info", Some(json!({ "message": message }))).await
  }

  pub async fn unlock_for_update(
    &self,
    case_id: Uuid,
    reason: Option<String>,
    reopen_steps: Vec<String>,
  ) -> Result<ReviewResponse> {
    #[derive(Serialize)]
    struct Body {
      reason:       Option<String>,
      reopen_steps: Vec<String>,
    }
    let body = serde_json::to_value(Body { reason, reopen_steps })
      .map_err(|e| ClientError::Decode(e.to_string()))?;
    self.decide(case_id, "unlock-for-update", Some(body)).await
  }
}

impl OnboardingBackend for ApiClient {
  async fn fetch_record(&self) -> Result<OnboardingRecord> {
    let req = self.applicant(self.client.get(self.url("/onboarding")));
    self.send(req, "GET /onboarding").await
  }

  async fn put_step(&self, step: &str, payload: &Value) -> Result<OnboardingRecord> {
    let req = self.applicant(self.client.put(self.url(&format!("/onboarding/{step}"))));
    self.send(req.json(payload), "PUT /onboarding/{step}").await
  }

  async fn submit_for_review(&self) -> Result<OnboardingRecord> {
    let req = self.applicant(self.client.post(self.url("/onboarding/submit")));
    self.send(req, "POST /onboarding/submit").await
  }
}

// ─── Response mapping ─────────────────────────────────────────────────────────

fn classify(e: reqwest::Error, what: &str) -> ClientError {
  if e.is_timeout() || e.is_connect() || e.is_request() {
    ClientError::TransientNetwork(format!("{what}: {e}"))
  } else {
    ClientError::Decode(format!("{what}: {e}"))
  }
}

async fn decode<T: DeserializeOwned>(resp: Response, what: &str) -> Result<T> {
  let status = resp.status();
  if status.is_success() {
    return resp.json().await.map_err(|e| ClientError::Decode(format!("{what}: {e}")));
  }
  if status.is_server_error() {
    return Err(ClientError::TransientNetwork(format!("{what} → {status}")));
  }

  let bytes = resp.bytes().await.map_err(|e| classify(e, what))?;
  match serde_json::from_slice::<ErrorBody>(&bytes) {
    Ok(body) => Err(ClientError::from_body(body)),
    Err(_) => Err(ClientError::Decode(format!(
      "{what} → {status}: {}",
      String::from_utf8_lossy(&bytes)
    ))),
  }
}
