//! `onboard-server` binary.
//!
//! ```text
//! onboard-server [--config config.toml] [serve --host 0.0.0.0 --port 8080]
//! onboard-server hash-password        # prints admin_password_hash for config.toml
//! onboard-server check-config         # load + validate, then exit
//! ```
//!
//! Settings come from the TOML file layered under `ONBOARD_*` environment
//! variables (`ONBOARD_STORE_PATH`, `ONBOARD_ADMIN_USERNAME`, ...).

use std::{
  io::{self, BufRead, Write},
  path::PathBuf,
  sync::Arc,
};

use anyhow::{Context as _, Result, anyhow};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::{Parser, Subcommand};
use onboard_server::{AppState, ServerConfig};
use onboard_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Marketplace onboarding and KYC review server")]
struct Cli {
  /// Path to the TOML configuration file. Missing is fine if the
  /// environment supplies every required key.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the API (the default).
  Serve {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
  },
  /// Read a password from stdin and print its argon2 PHC string.
  HashPassword,
  /// Load and validate the configuration, then exit.
  CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  match cli.command.unwrap_or(Command::Serve { host: None, port: None }) {
    Command::HashPassword => hash_password(),
    Command::CheckConfig => {
      let cfg = load(&cli.config)?;
      println!("listen      {}", cfg.listen_addr());
      println!("store       {}", cfg.resolved_store_path().display());
      println!("admin user  {}", cfg.admin_username);
      Ok(())
    }
    Command::Serve { host, port } => {
      let mut cfg = load(&cli.config)?;
      if let Some(host) = host {
        cfg.host = host;
      }
      if let Some(port) = port {
        cfg.port = port;
      }
      serve(cfg).await
    }
  }
}

fn load(path: &std::path::Path) -> Result<ServerConfig> {
  let cfg = ServerConfig::load(path)
    .with_context(|| format!("loading configuration ({})", path.display()))?;
  cfg.validate()?;
  Ok(cfg)
}

async fn serve(cfg: ServerConfig) -> Result<()> {
  let store_path = cfg.resolved_store_path();
  if let Some(dir) = store_path.parent().filter(|d| !d.as_os_str().is_empty()) {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("opening store at {}", store_path.display()))?;
  tracing::info!(path = %store_path.display(), "onboarding store ready");

  let app = onboard_server::router(AppState {
    store: Arc::new(store),
    auth:  Arc::new(cfg.auth()),
  });

  let addr = cfg.listen_addr();
  let listener = TcpListener::bind(&addr)
    .await
    .with_context(|| format!("binding {addr}"))?;
  tracing::info!(%addr, admin = %cfg.admin_username, "onboarding API listening");

  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
          tracing::warn!(error = %e, "ctrl-c handler unavailable; running until killed");
          std::future::pending::<()>().await;
        }
      }
    })
    .await
    .context("server error")
}

fn hash_password() -> Result<()> {
  eprint!("Password: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  let password = line.trim_end_matches(['\n', '\r']);
  if password.is_empty() {
    return Err(anyhow!("refusing to hash an empty password"));
  }

  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow!("argon2: {e}"))?;
  println!("{hash}");
  Ok(())
}
