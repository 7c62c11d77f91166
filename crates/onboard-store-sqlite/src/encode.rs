//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs are hyphenated lowercase strings,
//! and step sets and step data are compact JSON.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use onboard_core::{
  lifecycle::{CaseStatus, KycCase},
  record::OnboardingRecord,
  role::Role,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

fn decode_u32(column: &'static str, value: i64) -> Result<u32> {
  u32::try_from(value).map_err(|_| Error::OutOfRange { column, value })
}

pub fn encode_u64(value: u64) -> i64 { i64::try_from(value).unwrap_or(i64::MAX) }

// ─── JSON columns ────────────────────────────────────────────────────────────

pub fn encode_steps<'a>(steps: impl IntoIterator<Item = &'a String>) -> Result<String> {
  Ok(serde_json::to_string(&steps.into_iter().collect::<Vec<_>>())?)
}

pub fn encode_step_data(data: &BTreeMap<String, Value>) -> Result<String> {
  Ok(serde_json::to_string(data)?)
}

// ─── Raw rows ────────────────────────────────────────────────────────────────

/// A `records` row as read from SQLite, before decoding.
#[derive(Debug)]
pub struct RawRecord {
  pub organization_id:    String,
  pub role:               String,
  pub case_status:        String,
  pub completed_steps:    String,
  pub step_data:          String,
  pub submission_attempt: i64,
  pub revision:           i64,
  pub latest_case_id:     Option<String>,
  pub created_at:         String,
  pub updated_at:         String,
}

pub const RECORD_COLUMNS: &str = "organization_id, role, case_status, completed_steps, \
  step_data, submission_attempt, revision, latest_case_id, created_at, updated_at";

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      organization_id:    row.get(0)?,
      role:               row.get(1)?,
      case_status:        row.get(2)?,
      completed_steps:    row.get(3)?,
      step_data:          row.get(4)?,
      submission_attempt: row.get(5)?,
      revision:           row.get(6)?,
      latest_case_id:     row.get(7)?,
      created_at:         row.get(8)?,
      updated_at:         row.get(9)?,
    })
  }

  pub fn into_record(self) -> Result<OnboardingRecord> {
    let case_status: CaseStatus = self.case_status.parse()?;
    let revision = u64::try_from(self.revision)
      .map_err(|_| Error::OutOfRange { column: "revision", value: self.revision })?;
    Ok(OnboardingRecord {
      organization_id: decode_uuid(&self.organization_id)?,
      role: self.role.parse::<Role>()?,
      completed_steps: serde_json::from_str::<BTreeSet<String>>(&self.completed_steps)?,
      case_status,
      is_locked: case_status.is_locked(),
      step_data: serde_json::from_str(&self.step_data)?,
      submission_attempt: decode_u32("submission_attempt", self.submission_attempt)?,
      revision,
      latest_case_id: self.latest_case_id.as_deref().map(decode_uuid).transpose()?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// A `kyc_cases` row as read from SQLite, before decoding.
#[derive(Debug)]
pub struct RawCase {
  pub case_id:              String,
  pub organization_id:      String,
  pub submission_number:    i64,
  pub attempt:              i64,
  pub status:               String,
  pub completed_steps:      String,
  pub step_data:            String,
  pub submitted_at:         String,
  pub reviewed_at:          Option<String>,
  pub reviewer:             Option<String>,
  pub rejection_reason:     Option<String>,
  pub info_request_message: Option<String>,
  pub unlocked_at:          Option<String>,
  pub unlock_reason:        Option<String>,
  pub superseded_by:        Option<String>,
}

pub const CASE_COLUMNS: &str = "case_id, organization_id, submission_number, attempt, status, \
  completed_steps, step_data, submitted_at, reviewed_at, reviewer, rejection_reason, \
  info_request_message, unlocked_at, unlock_reason, superseded_by";

impl RawCase {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:              row.get(0)?,
      organization_id:      row.get(1)?,
      submission_number:    row.get(2)?,
      attempt:              row.get(3)?,
      status:               row.get(4)?,
      completed_steps:      row.get(5)?,
      step_data:            row.get(6)?,
      submitted_at:         row.get(7)?,
      reviewed_at:          row.get(8)?,
      reviewer:             row.get(9)?,
      rejection_reason:     row.get(10)?,
      info_request_message: row.get(11)?,
      unlocked_at:          row.get(12)?,
      unlock_reason:        row.get(13)?,
      superseded_by:        row.get(14)?,
    })
  }

  pub fn into_case(self) -> Result<KycCase> {
    Ok(KycCase {
      case_id:              decode_uuid(&self.case_id)?,
      organization_id:      decode_uuid(&self.organization_id)?,
      submission_number:    decode_u32("submission_number", self.submission_number)?,
      attempt:              decode_u32("attempt", self.attempt)?,
      status:               self.status.parse()?,
      completed_steps:      serde_json::from_str(&self.completed_steps)?,
      step_data:            serde_json::from_str(&self.step_data)?,
      submitted_at:         decode_dt(&self.submitted_at)?,
      reviewed_at:          decode_opt_dt(self.reviewed_at)?,
      reviewer:             self.reviewer,
      rejection_reason:     self.rejection_reason,
      info_request_message: self.info_request_message,
      unlocked_at:          decode_opt_dt(self.unlocked_at)?,
      unlock_reason:        self.unlock_reason,
      superseded_by:        self.superseded_by.as_deref().map(decode_uuid).transpose()?,
    })
  }
}
