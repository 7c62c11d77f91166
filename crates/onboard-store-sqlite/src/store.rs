//! [`SqliteStore`], the SQLite implementation of [`OnboardingStore`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use serde_json::Value;
use uuid::Uuid;

use onboard_core::{
  lifecycle::{KycCase, ReviewDecision},
  record::{OnboardingRecord, ReviewOutcome, StepOutcome},
  role::Role,
  store::{CaseQuery, OnboardingStore},
  validate::{JsonObjectPayload, StepValidator},
};

use crate::{
  Error, Result,
  encode::{
    CASE_COLUMNS, RECORD_COLUMNS, RawCase, RawRecord, encode_dt, encode_step_data, encode_steps,
    encode_u64, encode_uuid,
  },
  schema,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An onboarding store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:      tokio_rusqlite::Connection,
  validator: Arc<dyn StepValidator>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  /// Replace the step payload validator (defaults to [`JsonObjectPayload`]).
  pub fn with_validator(mut self, validator: Arc<dyn StepValidator>) -> Self {
    self.validator = validator;
    self
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        schema::apply(conn)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, validator: Arc::new(JsonObjectPayload) })
  }
}

// ─── Row access (runs on the connection thread) ──────────────────────────────

fn load_record(conn: &Connection, organization_id: Uuid) -> Result<Option<OnboardingRecord>> {
  let raw = conn
    .query_row(
      &format!("SELECT {RECORD_COLUMNS} FROM records WHERE organization_id = ?1"),
      rusqlite::params![encode_uuid(organization_id)],
      RawRecord::from_row,
    )
    .optional()?;
  raw.map(RawRecord::into_record).transpose()
}

fn save_record(conn: &Connection, record: &OnboardingRecord) -> Result<()> {
  conn.execute(
    "INSERT INTO records (
       organization_id, role, case_status, completed_steps, step_data,
       submission_attempt, revision, latest_case_id, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
     ON CONFLICT(organization_id) DO UPDATE SET
       case_status        = excluded.case_status,
       completed_steps    = excluded.completed_steps,
       step_data          = excluded.step_data,
       submission_attempt = excluded.submission_attempt,
       revision           = excluded.revision,
       latest_case_id     = excluded.latest_case_id,
       updated_at         = excluded.updated_at",
    rusqlite::params![
      encode_uuid(record.organization_id),
      record.role.as_str(),
      record.case_status.as_str(),
      encode_steps(&record.completed_steps)?,
      encode_step_data(&record.step_data)?,
      record.submission_attempt,
      encode_u64(record.revision),
      record.latest_case_id.map(encode_uuid),
      encode_dt(record.created_at),
      encode_dt(record.updated_at),
    ],
  )?;
  Ok(())
}

fn load_case(conn: &Connection, case_id: Uuid) -> Result<Option<KycCase>> {
  let raw = conn
    .query_row(
      &format!("SELECT {CASE_COLUMNS} FROM kyc_cases WHERE case_id = ?1"),
      rusqlite::params![encode_uuid(case_id)],
      RawCase::from_row,
    )
    .optional()?;
  raw.map(RawCase::into_case).transpose()
}

fn insert_case(conn: &Connection, case: &KycCase) -> Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO kyc_cases ({CASE_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
    ),
    rusqlite::params![
      encode_uuid(case.case_id),
      encode_uuid(case.organization_id),
      case.submission_number,
      case.attempt,
      case.status.as_str(),
      encode_steps(&case.completed_steps)?,
      encode_step_data(&case.step_data)?,
      encode_dt(case.submitted_at),
      case.reviewed_at.map(encode_dt),
      case.reviewer,
      case.rejection_reason,
      case.info_request_message,
      case.unlocked_at.map(encode_dt),
      case.unlock_reason,
      case.superseded_by.map(encode_uuid),
    ],
  )?;
  Ok(())
}

fn mark_superseded(conn: &Connection, case_id: Uuid, by: Uuid) -> Result<()> {
  conn.execute(
    "UPDATE kyc_cases SET superseded_by = ?2 WHERE case_id = ?1",
    rusqlite::params![encode_uuid(case_id), encode_uuid(by)],
  )?;
  Ok(())
}

/// Write back the review fields. The frozen snapshot columns are never
/// touched.
fn update_case_review(conn: &Connection, case: &KycCase) -> Result<()> {
  conn.execute(
    "UPDATE kyc_cases SET
       status               = ?2,
       reviewed_at          = ?3,
       reviewer             = ?4,
       rejection_reason     = ?5,
       info_request_message = ?6,
       unlocked_at          = ?7,
       unlock_reason        = ?8
     WHERE case_id = ?1",
    rusqlite::params![
      encode_uuid(case.case_id),
      case.status.as_str(),
      case.reviewed_at.map(encode_dt),
      case.reviewer,
      case.rejection_reason,
      case.info_request_message,
      case.unlocked_at.map(encode_dt),
      case.unlock_reason,
    ],
  )?;
  Ok(())
}

// ─── Transactions ────────────────────────────────────────────────────────────

fn put_step_tx(
  conn: &Connection,
  organization_id: Uuid,
  role: Role,
  step: &str,
  payload: Value,
  validator: &dyn StepValidator,
  now: DateTime<Utc>,
) -> Result<OnboardingRecord> {
  let mut record = load_record(conn, organization_id)?
    .unwrap_or_else(|| OnboardingRecord::new(organization_id, role, now));
  record.ensure_role(role)?;

  if record.apply_step(step, payload, validator, now)? == StepOutcome::Changed {
    save_record(conn, &record)?;
  }
  Ok(record)
}

fn submit_tx(
  conn: &Connection,
  organization_id: Uuid,
  role: Role,
  now: DateTime<Utc>,
) -> Result<(OnboardingRecord, KycCase)> {
  let mut record = load_record(conn, organization_id)?
    .unwrap_or_else(|| OnboardingRecord::new(organization_id, role, now));
  record.ensure_role(role)?;

  let mut latest = match record.latest_case_id {
    Some(id) => Some(load_case(conn, id)?.ok_or(onboard_core::Error::CaseNotFound(id))?),
    None => None,
  };

  let case = record.submit_for_review(latest.as_mut(), now)?;
  save_record(conn, &record)?;
  insert_case(conn, &case)?;
  if let Some(prev) = &latest {
    mark_superseded(conn, prev.case_id, case.case_id)?;
  }
  Ok((record, case))
}

fn review_tx(
  conn: &Connection,
  case_id: Uuid,
  decision: ReviewDecision,
  reviewer: Option<String>,
  now: DateTime<Utc>,
) -> Result<(OnboardingRecord, KycCase)> {
  let mut case = load_case(conn, case_id)?.ok_or(onboard_core::Error::CaseNotFound(case_id))?;
  let mut record = load_record(conn, case.organization_id)?
    .ok_or(onboard_core::Error::RecordNotFound(case.organization_id))?;

  if record.apply_review(&mut case, decision, reviewer, now)? == ReviewOutcome::Applied {
    update_case_review(conn, &case)?;
    save_record(conn, &record)?;
  }
  Ok((record, case))
}

fn list_cases_tx(conn: &Connection, query: &CaseQuery) -> Result<Vec<KycCase>> {
  let org = query.organization_id.map(encode_uuid);
  let status = query.status.map(|s| s.as_str());
  let limit = query.limit.unwrap_or(100) as i64;
  let offset = query.offset.unwrap_or(0) as i64;

  let mut stmt = conn.prepare(&format!(
    "SELECT {CASE_COLUMNS} FROM kyc_cases
     WHERE (?1 IS NULL OR organization_id = ?1)
       AND (?2 IS NULL OR (status = ?2 AND superseded_by IS NULL))
     ORDER BY submitted_at ASC, submission_number ASC, attempt ASC
     LIMIT ?3 OFFSET ?4"
  ))?;
  let raws = stmt
    .query_map(rusqlite::params![org, status, limit, offset], RawCase::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws.into_iter().map(RawCase::into_case).collect()
}

// ─── OnboardingStore impl ────────────────────────────────────────────────────

impl OnboardingStore for SqliteStore {
  type Error = Error;

  async fn get_record(&self, organization_id: Uuid) -> Result<Option<OnboardingRecord>> {
    self
      .conn
      .call(move |conn| Ok(load_record(conn, organization_id)))
      .await?
  }

  async fn put_step(
    &self,
    organization_id: Uuid,
    role: Role,
    step: String,
    payload: Value,
  ) -> Result<OnboardingRecord> {
    let validator = Arc::clone(&self.validator);
    let record = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome =
          put_step_tx(&tx, organization_id, role, &step, payload, validator.as_ref(), Utc::now());
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await??;

    tracing::debug!(
      organization_id = %organization_id,
      revision = record.revision,
      "step stored"
    );
    Ok(record)
  }

  async fn submit_for_review(
    &self,
    organization_id: Uuid,
    role: Role,
  ) -> Result<(OnboardingRecord, KycCase)> {
    let (record, case) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = submit_tx(&tx, organization_id, role, Utc::now());
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await??;

    tracing::info!(
      organization_id = %organization_id,
      case_id = %case.case_id,
      submission_number = case.submission_number,
      attempt = case.attempt,
      "submitted for review"
    );
    Ok((record, case))
  }

  async fn review_case(
    &self,
    case_id: Uuid,
    decision: ReviewDecision,
    reviewer: Option<String>,
  ) -> Result<(OnboardingRecord, KycCase)> {
    let action = decision.action();
    let (record, case) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let outcome = review_tx(&tx, case_id, decision, reviewer, Utc::now());
        if outcome.is_ok() {
          tx.commit()?;
        }
        Ok(outcome)
      })
      .await??;

    tracing::info!(
      case_id = %case_id,
      action = %action,
      status = %case.status,
      "case reviewed"
    );
    Ok((record, case))
  }

  async fn get_case(&self, case_id: Uuid) -> Result<Option<KycCase>> {
    self.conn.call(move |conn| Ok(load_case(conn, case_id))).await?
  }

  async fn list_cases(&self, query: &CaseQuery) -> Result<Vec<KycCase>> {
    let query = query.clone();
    self.conn.call(move |conn| Ok(list_cases_tx(conn, &query))).await?
  }
}
