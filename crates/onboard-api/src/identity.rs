//! Caller identity extractors.
//!
//! Applicants are identified by two headers set by whatever authenticates
//! them upstream. Reviewers are identified by a [`ReviewerId`] request
//! extension that the admin auth layer inserts.

use axum::{extract::FromRequestParts, http::request::Parts};
use onboard_core::role::Role;
use uuid::Uuid;

use crate::error::ApiError;

pub const ORGANIZATION_ID_HEADER: &str = "x-organization-id";
pub const ORGANIZATION_ROLE_HEADER: &str = "x-organization-role";

/// The organization acting on its own onboarding record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applicant {
  pub organization_id: Uuid,
  pub role:            Role,
}

/// Name of the authenticated reviewer, recorded on the cases they decide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewerId(pub String);

fn header<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, ApiError> {
  parts
    .headers
    .get(name)
    .ok_or_else(|| ApiError::Unauthorized(format!("missing {name} header")))?
    .to_str()
    .map_err(|_| ApiError::BadRequest(format!("{name} is not valid ASCII")))
}

impl<S> FromRequestParts<S> for Applicant
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let organization_id = header(parts, ORGANIZATION_ID_HEADER)?
      .trim()
      .parse::<Uuid>()
      .map_err(|e| ApiError::BadRequest(format!("{ORGANIZATION_ID_HEADER}: {e}")))?;
    let role = header(parts, ORGANIZATION_ROLE_HEADER)?.parse::<Role>()?;
    Ok(Applicant { organization_id, role })
  }
}

#[cfg(test)]
mod tests {
  use axum::{body::Body, http::Request};

  use super::*;

  async fn extract(req: Request<Body>) -> Result<Applicant, ApiError> {
    let (mut parts, _) = req.into_parts();
    Applicant::from_request_parts(&mut parts, &()).await
  }

  #[tokio::test]
  async fn reads_both_headers() {
    let org = Uuid::new_v4();
    let req = Request::builder()
      .header(ORGANIZATION_ID_HEADER, org.to_string())
      .header(ORGANIZATION_ROLE_HEADER, "logistics")
      .body(Body::empty())
      .unwrap();
    let applicant = extract(req).await.unwrap();
    assert_eq!(applicant, Applicant { organization_id: org, role: Role::Logistics });
  }

  #[tokio::test]
  async fn missing_header_is_unauthorized() {
    let req = Request::builder()
      .header(ORGANIZATION_ROLE_HEADER, "SELLER")
      .body(Body::empty())
      .unwrap();
    assert!(matches!(extract(req).await, Err(ApiError::Unauthorized(_))));
  }

  #[tokio::test]
  async fn unknown_role_is_rejected() {
    let req = Request::builder()
      .header(ORGANIZATION_ID_HEADER, Uuid::new_v4().to_string())
      .header(ORGANIZATION_ROLE_HEADER, "pirate")
      .body(Body::empty())
      .unwrap();
    assert!(matches!(extract(req).await, Err(ApiError::Rejected(_))));
  }
}
