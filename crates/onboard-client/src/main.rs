//! `onboard`, the command-line client for the onboarding server.
//!
//! # Usage
//!
//! ```text
//! onboard --url http://localhost:8080 --org <uuid> --role seller status
//! onboard put-step bank-details bank.json
//! onboard submit
//! onboard --admin-user admin --admin-password secret admin queue
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use onboard_client::{
  client::{ApiClient, ClientConfig},
  coordinator::SubmissionCoordinator,
  session::{SessionConfig, SessionSnapshot, SessionStore},
};
use onboard_core::{lifecycle::CaseStatus, registry, role::Role};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "onboard", about = "Command-line client for marketplace onboarding")]
struct Args {
  /// Path to a TOML config file.
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Base URL of the server (default: http://localhost:8080).
  #[arg(long, env = "ONBOARD_URL")]
  url: Option<String>,

  /// Organization acting as applicant.
  #[arg(long, env = "ONBOARD_ORG_ID")]
  org: Option<Uuid>,

  /// Role of that organization (seller, buyer, logistics).
  #[arg(long, env = "ONBOARD_ROLE")]
  role: Option<String>,

  #[arg(long, env = "ONBOARD_ADMIN_USER")]
  admin_user: Option<String>,

  #[arg(long, env = "ONBOARD_ADMIN_PASSWORD")]
  admin_password: Option<String>,

  /// Per-request timeout in seconds.
  #[arg(long)]
  timeout_secs: Option<u64>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the record and wizard progress.
  Status,
  /// Save one step; PAYLOAD is a JSON file, or `-` for stdin.
  PutStep { step: String, payload: PathBuf },
  /// Submit the record for KYC review.
  Submit,
  /// Refresh in the background and print every change.
  Watch {
    #[arg(long, default_value_t = 5)]
    interval_secs: u64,
  },
  /// Reviewer commands.
  #[command(subcommand)]
  Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
  /// List cases, by default those awaiting review.
  Queue {
    #[arg(long, default_value = "SUBMITTED")]
    status: String,
  },
  /// Show one case.
  Case { id: Uuid },
  /// Show an organization's submission history.
  History { org: Uuid },
  Approve { id: Uuid },
  Reject { id: Uuid, reason: String },
  RequestInfo { id: Uuid, message: String },
  /// Reopen an approved or rejected record for changes.
  Unlock {
    id:     Uuid,
    #[arg(long)]
    reason: Option<String>,
    /// Step to mark incomplete again; repeatable.
    #[arg(long = "reopen")]
    reopen: Vec<String>,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:             String,
  organization_id: Option<Uuid>,
  #[serde(default)]
  role:            String,
  #[serde(default)]
  admin_username:  String,
  #[serde(default)]
  admin_password:  String,
  timeout_secs:    Option<u64>,
}

fn non_empty(s: String) -> Option<String> { (!s.is_empty()).then_some(s) }

fn load_config(args: &Args) -> Result<ClientConfig> {
  let file: ConfigFile = match &args.config {
    Some(path) => {
      let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
      toml::from_str(&raw).context("parsing config file")?
    }
    None => ConfigFile::default(),
  };

  // CLI flags override config file, which overrides defaults.
  let role = match args.role.clone().or_else(|| non_empty(file.role)) {
    Some(r) => r.parse::<Role>()?,
    None => Role::Seller,
  };
  Ok(ClientConfig {
    base_url:        args
      .url
      .clone()
      .or_else(|| non_empty(file.url))
      .unwrap_or_else(|| "http://localhost:8080".to_string()),
    organization_id: args.org.or(file.organization_id).unwrap_or_else(Uuid::nil),
    role,
    admin_username:  args.admin_user.clone().or_else(|| non_empty(file.admin_username)).unwrap_or_default(),
    admin_password:  args
      .admin_password
      .clone()
      .or_else(|| non_empty(file.admin_password))
      .unwrap_or_default(),
    timeout:         Duration::from_secs(args.timeout_secs.or(file.timeout_secs).unwrap_or(10)),
  })
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();
  let client = ApiClient::new(load_config(&args)?)?;

  match args.command {
    Command::Admin(cmd) => run_admin(&client, cmd).await,
    Command::Status => {
      let coord = applicant(&client).await?;
      print_status(&coord.session().snapshot(), client.config().role);
      Ok(())
    }
    Command::PutStep { step, payload } => {
      let payload = read_payload(&payload)?;
      let coord = applicant(&client).await?;
      let record = coord.submit_step(&step, payload).await?;
      println!("saved {step} (revision {})", record.revision);
      print_status(&coord.session().snapshot(), record.role);
      Ok(())
    }
    Command::Submit => {
      let record = applicant(&client).await?.submit_for_review().await?;
      println!(
        "submitted for review: {} (attempt {})",
        record.case_status, record.submission_attempt
      );
      Ok(())
    }
    Command::Watch { interval_secs } => {
      watch(&applicant(&client).await?, Duration::from_secs(interval_secs)).await
    }
  }
}

// ─── Applicant ────────────────────────────────────────────────────────────────

/// Load the organization's record into a fresh session.
async fn applicant(client: &ApiClient) -> Result<SubmissionCoordinator<ApiClient>> {
  let config = client.config();
  if config.organization_id.is_nil() {
    bail!("an organization id is required (--org, ONBOARD_ORG_ID or the config file)");
  }
  let session_config = SessionConfig { request_timeout: config.timeout, ..Default::default() };
  let session = SessionStore::init(client.clone(), session_config).await;
  if let Some(e) = session.snapshot().last_error {
    bail!("could not load onboarding record: {e}");
  }
  Ok(SubmissionCoordinator::new(Arc::new(session)))
}

fn print_status(snapshot: &SessionSnapshot, role: Role) {
  let Some(record) = &snapshot.record else {
    println!("no onboarding record");
    return;
  };
  let progress = record.progress();
  println!("organization {} ({})", record.organization_id, record.role);
  println!(
    "status {}{}, {}% complete",
    record.case_status,
    if record.is_locked { " [locked]" } else { "" },
    progress.percentage
  );
  for step in registry::steps_for(role) {
    let mark = if record.completed_steps.contains(*step) { "x" } else { " " };
    let next = if progress.next_step.as_deref() == Some(*step) { "  <- next" } else { "" };
    println!("  [{mark}] {step}{next}");
  }
}

fn read_payload(path: &Path) -> Result<Value> {
  let raw = if path.as_os_str() == "-" {
    std::io::read_to_string(std::io::stdin()).context("reading payload from stdin")?
  } else {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
  };
  serde_json::from_str(&raw).context("payload is not valid JSON")
}

async fn watch(coord: &SubmissionCoordinator<ApiClient>, every: Duration) -> Result<()> {
  let session = coord.session();
  let mut changes = session.subscribe();
  let mut ticker = tokio::time::interval(every);
  let mut last_revision = session.snapshot().record.map(|r| r.revision);

  loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c() => return Ok(()),
      _ = ticker.tick() => {
        if let Err(e) = session.silent_refresh().await {
          tracing::warn!(error = %e, "refresh failed");
        }
      }
      changed = changes.changed() => {
        changed.context("session closed")?;
        let snapshot = changes.borrow_and_update().clone();
        let revision = snapshot.record.as_ref().map(|r| r.revision);
        if revision != last_revision {
          last_revision = revision;
          if let Some(record) = &snapshot.record {
            print_status(&snapshot, record.role);
          }
        }
      }
    }
  }
}

// ─── Admin ────────────────────────────────────────────────────────────────────

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

async fn run_admin(client: &ApiClient, cmd: AdminCommand) -> Result<()> {
  match cmd {
    AdminCommand::Queue { status } => {
      let status: CaseStatus = status.parse()?;
      let cases = client.list_cases(Some(status)).await?;
      for case in &cases {
        println!(
          "{}  org {}  #{}.{}  {}  submitted {}",
          case.case_id,
          case.organization_id,
          case.submission_number,
          case.attempt,
          case.status,
          case.submitted_at.format("%Y-%m-%d %H:%M")
        );
      }
      if cases.is_empty() {
        println!("no {status} cases");
      }
    }
    AdminCommand::Case { id } => print_json(&client.get_case(id).await?)?,
    AdminCommand::History { org } => print_json(&client.organization_cases(org).await?)?,
    AdminCommand::Approve { id } => print_json(&client.approve(id).await?)?,
    AdminCommand::Reject { id, reason } => print_json(&client.reject(id, &reason).await?)?,
    AdminCommand::RequestInfo { id, message } => {
      print_json(&client.request_info(id, &message).await?)?
    }
    AdminCommand::Unlock { id, reason, reopen } => {
      print_json(&client.unlock_for_update(id, reason, reopen).await?)?
    }
  }
  Ok(())
}
