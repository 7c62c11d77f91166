//! HTTP Basic auth for the admin routes.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, header},
  middleware::Next,
  response::Response,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use onboard_api::identity::ReviewerId;

use crate::error::Error;

/// Credentials accepted for the admin routes of this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

impl AuthConfig {
  /// Whether `password` matches the stored hash for `username`.
  pub fn accepts(&self, username: &str, password: &str) -> bool {
    username == self.username
      && PasswordHash::new(&self.password_hash).is_ok_and(|hash| {
        Argon2::default().verify_password(password.as_bytes(), &hash).is_ok()
      })
  }
}

/// `(username, password)` from an `Authorization: Basic …` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let (scheme, encoded) = value.split_once(' ')?;
  if !scheme.eq_ignore_ascii_case("basic") {
    return None;
  }
  let decoded = String::from_utf8(B64.decode(encoded.trim()).ok()?).ok()?;
  let (username, password) = decoded.split_once(':')?;
  Some((username.to_owned(), password.to_owned()))
}

/// Verify Basic credentials and return the authenticated username.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<String, Error> {
  match basic_credentials(headers) {
    Some((username, password)) if config.accepts(&username, &password) => Ok(username),
    _ => Err(Error::Unauthorized),
  }
}

/// Middleware guarding the admin router. On success the username is handed
/// to the handlers as a [`ReviewerId`].
pub async fn require_admin(
  State(auth): State<Arc<AuthConfig>>,
  mut req: Request,
  next: Next,
) -> Result<Response, Error> {
  let username = verify_auth(req.headers(), &auth).inspect_err(|_| {
    tracing::debug!(path = %req.uri().path(), "admin auth rejected");
  })?;
  req.extensions_mut().insert(ReviewerId(username));
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::HeaderValue;
  use rand_core::OsRng;

  use super::*;

  fn config(password: &str) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig { username: "admin".to_string(), password_hash: hash }
  }

  fn headers(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    let encoded = B64.encode(format!("{user}:{pass}"));
    format!("Basic {encoded}")
  }

  #[test]
  fn correct_credentials_yield_username() {
    let cfg = config("secret");
    assert_eq!(verify_auth(&headers(&basic("admin", "secret")), &cfg).unwrap(), "admin");
  }

  #[test]
  fn wrong_password() {
    let cfg = config("secret");
    assert!(matches!(
      verify_auth(&headers(&basic("admin", "wrong")), &cfg),
      Err(Error::Unauthorized)
    ));
  }

  #[test]
  fn wrong_user() {
    let cfg = config("secret");
    assert!(matches!(
      verify_auth(&headers(&basic("mallory", "secret")), &cfg),
      Err(Error::Unauthorized)
    ));
  }

  #[test]
  fn missing_header() {
    let cfg = config("secret");
    assert!(matches!(verify_auth(&HeaderMap::new(), &cfg), Err(Error::Unauthorized)));
  }

  #[test]
  fn scheme_is_case_insensitive() {
    let cfg = config("secret");
    let value = basic("admin", "secret").replacen("Basic", "basic", 1);
    assert_eq!(verify_auth(&headers(&value), &cfg).unwrap(), "admin");
  }

  #[test]
  fn password_may_contain_colons() {
    let cfg = config("a:b:c");
    assert!(cfg.accepts("admin", "a:b:c"));
    assert_eq!(verify_auth(&headers(&basic("admin", "a:b:c")), &cfg).unwrap(), "admin");
  }

  #[test]
  fn invalid_base64() {
    let cfg = config("secret");
    assert!(matches!(
      verify_auth(&headers("Basic !!!not-base64!!!"), &cfg),
      Err(Error::Unauthorized)
    ));
  }
}
