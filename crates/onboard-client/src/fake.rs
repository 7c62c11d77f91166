//! In-process backends for the session and coordinator tests.

use std::{
  collections::VecDeque,
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
};

use chrono::Utc;
use onboard_core::{
  lifecycle::KycCase,
  record::OnboardingRecord,
  role::Role,
  validate::JsonObjectPayload,
};
use serde_json::Value;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::{
  backend::OnboardingBackend,
  error::{ClientError, Result},
};

pub fn record_at(role: Role, revision: u64) -> OnboardingRecord {
  let mut record = OnboardingRecord::new(Uuid::nil(), role, Utc::now());
  record.revision = revision;
  record
}

// ─── Scripted fetches ─────────────────────────────────────────────────────────

/// One canned `fetch_record` response, optionally held until its gate opens.
pub struct Scripted {
  result: Result<OnboardingRecord>,
  gate:   Option<Arc<Notify>>,
}

impl Scripted {
  pub fn ok(record: OnboardingRecord) -> Self { Self { result: Ok(record), gate: None } }

  pub fn err(error: ClientError) -> Self { Self { result: Err(error), gate: None } }

  pub fn gated(mut self) -> Self {
    self.gate = Some(Arc::new(Notify::new()));
    self
  }
}

/// Serves scripted fetches in call order and counts them. Mutations are not
/// scripted; they fail loudly.
pub struct FakeBackend {
  script:    Mutex<VecDeque<Scripted>>,
  gates:     Vec<Option<Arc<Notify>>>,
  fetches:   AtomicUsize,
  mutations: AtomicUsize,
}

impl FakeBackend {
  pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
    let script: VecDeque<Scripted> = script.into_iter().collect();
    let gates = script.iter().map(|s| s.gate.clone()).collect();
    Self {
      script: Mutex::new(script),
      gates,
      fetches: AtomicUsize::new(0),
      mutations: AtomicUsize::new(0),
    }
  }

  /// The gate of the `index`th scripted response.
  pub fn gate(&self, index: usize) -> Arc<Notify> {
    self.gates[index].clone().expect("scripted response is not gated")
  }

  pub fn fetch_calls(&self) -> usize { self.fetches.load(Ordering::SeqCst) }

  pub fn mutation_calls(&self) -> usize { self.mutations.load(Ordering::SeqCst) }
}

impl OnboardingBackend for FakeBackend {
  async fn fetch_record(&self) -> Result<OnboardingRecord> {
    let next = self.script.lock().unwrap().pop_front().expect("unscripted fetch");
    self.fetches.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = next.gate {
      gate.notified().await;
    }
    next.result
  }

  async fn put_step(&self, step: &str, _payload: &Value) -> Result<OnboardingRecord> {
    self.mutations.fetch_add(1, Ordering::SeqCst);
    panic!("unexpected put_step({step})")
  }

  async fn submit_for_review(&self) -> Result<OnboardingRecord> {
    self.mutations.fetch_add(1, Ordering::SeqCst);
    panic!("unexpected submit_for_review")
  }
}

// ─── Rule-following backend ───────────────────────────────────────────────────

/// Applies the real core rules to a single in-memory record, the way the
/// server would.
pub struct InMemoryBackend {
  state: Mutex<(OnboardingRecord, Option<KycCase>)>,
  calls: AtomicUsize,
}

impl InMemoryBackend {
  pub fn new(role: Role) -> Self {
    Self {
      state: Mutex::new((OnboardingRecord::new(Uuid::new_v4(), role, Utc::now()), None)),
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

  pub fn latest_case(&self) -> Option<KycCase> { self.state.lock().unwrap().1.clone() }
}

fn to_client(e: onboard_core::Error) -> ClientError {
  ClientError::from_body(onboard_core::wire::ErrorBody::from(&e))
}

impl OnboardingBackend for InMemoryBackend {
  async fn fetch_record(&self) -> Result<OnboardingRecord> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.state.lock().unwrap().0.clone())
  }

  async fn put_step(&self, step: &str, payload: &Value) -> Result<OnboardingRecord> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let mut state = self.state.lock().unwrap();
    state
      .0
      .apply_step(step, payload.clone(), &JsonObjectPayload, Utc::now())
      .map_err(to_client)?;
    Ok(state.0.clone())
  }

  async fn submit_for_review(&self) -> Result<OnboardingRecord> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let mut state = self.state.lock().unwrap();
    let (record, latest) = &mut *state;
    let case = record.submit_for_review(latest.as_mut(), Utc::now()).map_err(to_client)?;
    *latest = Some(case);
    Ok(record.clone())
  }
}
