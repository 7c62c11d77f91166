//! HTTP server for marketplace onboarding.
//!
//! Mounts the applicant and admin routers of [`onboard_api`] under `/api`,
//! puts the admin routes behind HTTP Basic auth, and traces every request.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use argon2::PasswordHash;
use axum::{Router, middleware, routing::get};
use onboard_core::store::OnboardingStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_admin};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ONBOARD_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  pub store_path:          PathBuf,
  pub admin_username:      String,
  pub admin_password_hash: String,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

impl ServerConfig {
  /// Reject configurations that would only fail on the first admin request.
  pub fn validate(&self) -> Result<(), Error> {
    if self.admin_username.is_empty() || self.admin_username.contains(':') {
      return Err(Error::Config("admin_username must be non-empty and contain no ':'".into()));
    }
    PasswordHash::new(&self.admin_password_hash)
      .map_err(|e| Error::Config(format!("admin_password_hash is not a PHC string: {e}")))?;
    Ok(())
  }

  /// Layer `ONBOARD_*` environment variables over an optional TOML file.
  pub fn load(file: &Path) -> Result<Self, Error> {
    config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("ONBOARD"))
      .build()
      .and_then(config::Config::try_deserialize::<Self>)
      .map_err(|e| Error::Config(e.to_string()))
  }

  pub fn listen_addr(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// `store_path` with a leading `~/` expanded to `$HOME`.
  pub fn resolved_store_path(&self) -> PathBuf {
    let raw = self.store_path.to_string_lossy();
    match (raw.strip_prefix("~/"), std::env::var_os("HOME")) {
      (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
      _ => self.store_path.clone(),
    }
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.admin_username.clone(),
      password_hash: self.admin_password_hash.clone(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState<S: OnboardingStore> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full server router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: OnboardingStore + 'static,
{
  let admin = onboard_api::admin_router(state.store.clone())
    .layer(middleware::from_fn_with_state(state.auth.clone(), require_admin));
  let api = onboard_api::applicant_router(state.store).merge(admin);

  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Integration tests ────────────────────────────────────────────────────────
