//! SQL schema for the onboarding SQLite store.
//!
//! Applied once at connection startup. Upgrades are gated on
//! `PRAGMA user_version`.

use rusqlite::Connection;

/// Current schema version, stored in `PRAGMA user_version`.
pub const VERSION: i32 = 2;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS records (
    organization_id    TEXT PRIMARY KEY,
    role               TEXT NOT NULL,   -- 'SELLER' | 'BUYER' | 'LOGISTICS' | 'ADMIN'
    case_status        TEXT NOT NULL DEFAULT 'DRAFT',
    completed_steps    TEXT NOT NULL DEFAULT '[]',   -- JSON array
    step_data          TEXT NOT NULL DEFAULT '{}',   -- JSON object keyed by step id
    submission_attempt INTEGER NOT NULL DEFAULT 0,
    revision           INTEGER NOT NULL,
    latest_case_id     TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

-- One row per submission attempt. Only the latest case of an organization
-- is ever reviewed; older rows are history and carry `superseded_by`.
CREATE TABLE IF NOT EXISTS kyc_cases (
    case_id              TEXT PRIMARY KEY,
    organization_id      TEXT NOT NULL REFERENCES records(organization_id),
    submission_number    INTEGER NOT NULL,
    attempt              INTEGER NOT NULL,
    status               TEXT NOT NULL,
    completed_steps      TEXT NOT NULL,
    step_data            TEXT NOT NULL,
    submitted_at         TEXT NOT NULL,
    reviewed_at          TEXT,
    reviewer             TEXT,
    rejection_reason     TEXT,
    info_request_message TEXT,
    unlocked_at          TEXT,
    unlock_reason        TEXT,
    superseded_by        TEXT,
    UNIQUE (organization_id, submission_number, attempt)
);

CREATE INDEX IF NOT EXISTS cases_org_idx    ON kyc_cases(organization_id);
CREATE INDEX IF NOT EXISTS cases_status_idx ON kyc_cases(status);
";

/// Create or upgrade the schema on `conn`.
pub fn apply(conn: &Connection) -> rusqlite::Result<()> {
  let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
  conn.execute_batch(SCHEMA)?;
  if version == 1 {
    // v1 predates `superseded_by`; mark every non-latest case as replaced.
    conn.execute_batch(
      "ALTER TABLE kyc_cases ADD COLUMN superseded_by TEXT;
       UPDATE kyc_cases SET superseded_by = (
         SELECT r.latest_case_id FROM records r
         WHERE r.organization_id = kyc_cases.organization_id
       )
       WHERE case_id NOT IN (
         SELECT latest_case_id FROM records WHERE latest_case_id IS NOT NULL
       );",
    )?;
  }
  conn.pragma_update(None, "user_version", VERSION)
}
