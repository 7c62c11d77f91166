//! The onboarding Session Store.
//!
//! Holds the latest [`OnboardingRecord`] snapshot for one organization along
//! with its loading/saving flags and the last error, and publishes every
//! replacement through a [`tokio::sync::watch`] channel.
//!
//! Every backend call is issued a ticket. A response is installed only if it
//! is not older than what is already installed: a higher `revision` wins, and
//! for equal revisions the later-issued request wins. Responses to requests
//! issued before the last [`SessionStore::reset`] are dropped.

use std::{
  future::Future,
  sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicU64, Ordering},
  },
  time::Duration,
};

use onboard_core::{record::OnboardingRecord, resolver::Progress};
use tokio::sync::watch;

use crate::{
  backend::OnboardingBackend,
  error::{ClientError, Result},
};

// ─── Snapshot ─────────────────────────────────────────────────────────────────

/// What subscribers see. Replaced wholesale, never patched from two places.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
  pub record:            Option<OnboardingRecord>,
  pub is_loading:        bool,
  pub is_saving:         bool,
  pub refresh_in_flight: bool,
  pub last_error:        Option<ClientError>,
}

impl SessionSnapshot {
  pub fn progress(&self) -> Option<Progress> { self.record.as_ref().map(OnboardingRecord::progress) }

  /// The server's lock flag is authoritative; no snapshot means not locked.
  pub fn is_locked(&self) -> bool { self.record.as_ref().is_some_and(|r| r.is_locked) }
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionConfig {
  /// Upper bound on every backend call.
  pub request_timeout: Duration,
  /// Extra attempts a silent refresh makes after a transient failure.
  pub refresh_retries: u32,
}

impl Default for SessionConfig {
  fn default() -> Self {
    Self {
      request_timeout: Duration::from_secs(10),
      refresh_retries: 1,
    }
  }
}

/// What happened to a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
  Installed,
  /// Older than the installed snapshot, or issued before a reset.
  Discarded,
  /// A silent refresh was already running.
  Skipped,
}

// ─── Internal bookkeeping ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Cursor {
  /// `(revision, ticket)` of the installed snapshot.
  installed: Option<(u64, u64)>,
  /// Tickets below this were issued before the last reset.
  floor:     u64,
  loads:     usize,
  saves:     usize,
}

#[derive(Debug, Clone, Copy)]
enum Flag {
  Loading,
  Saving,
}

// ─── Store ────────────────────────────────────────────────────────────────────

/// Process-local cache of one organization's onboarding state.
///
/// Meant to be created once per signed-in organization and shared behind an
/// [`Arc`]; [`SessionStore::reset`] on sign-out.
pub struct SessionStore<B> {
  backend:    B,
  config:     SessionConfig,
  state:      watch::Sender<SessionSnapshot>,
  cursor:     Mutex<Cursor>,
  refreshing: AtomicBool,
  tickets:    AtomicU64,
}

impl<B: OnboardingBackend> SessionStore<B> {
  pub fn new(backend: B, config: SessionConfig) -> Self {
    let (state, _) = watch::channel(SessionSnapshot::default());
    Self {
      backend,
      config,
      state,
      cursor: Mutex::new(Cursor::default()),
      refreshing: AtomicBool::new(false),
      tickets: AtomicU64::new(0),
    }
  }

  /// Create the store and perform the first fetch. A failed first fetch is
  /// left in `last_error`.
  pub async fn init(backend: B, config: SessionConfig) -> Self {
    let store = Self::new(backend, config);
    if let Err(e) = store.fetch().await {
      tracing::warn!(error = %e, "initial onboarding fetch failed");
    }
    store
  }

  pub fn backend(&self) -> &B { &self.backend }

  pub fn snapshot(&self) -> SessionSnapshot { self.state.borrow().clone() }

  pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> { self.state.subscribe() }

  /// Forget the snapshot and invalidate every response still in flight.
  ///
  /// Loading and saving flags belong to the calls that raised them and are
  /// cleared when those calls finish.
  pub fn reset(&self) {
    let floor = self.tickets.load(Ordering::SeqCst) + 1;
    self.state.send_modify(|snap| {
      let mut cursor = self.lock();
      cursor.installed = None;
      cursor.floor = floor;
      snap.record = None;
      snap.last_error = None;
    });
    tracing::debug!(floor, "session reset");
  }

  /// Load the latest record, raising `is_loading` for the duration.
  pub async fn fetch(&self) -> Result<SyncOutcome> {
    let ticket = self.issue();
    let _loading = self.raise(Flag::Loading);
    match self.timed(self.backend.fetch_record()).await {
      Ok(record) => Ok(self.install(record, ticket)),
      Err(e) => {
        self.record_error(e.clone(), Some(ticket));
        Err(e)
      }
    }
  }

  /// Background refresh: never touches `is_loading`, and returns
  /// [`SyncOutcome::Skipped`] if another refresh is still running.
  pub async fn silent_refresh(&self) -> Result<SyncOutcome> {
    if self
      .refreshing
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      tracing::debug!("silent refresh already in flight; skipped");
      return Ok(SyncOutcome::Skipped);
    }
    let _guard = RefreshGuard::new(self);

    let mut attempt = 0;
    loop {
      let ticket = self.issue();
      match self.timed(self.backend.fetch_record()).await {
        Ok(record) => return Ok(self.install(record, ticket)),
        Err(e) => {
          self.record_error(e.clone(), Some(ticket));
          if e.is_transient() && attempt < self.config.refresh_retries {
            attempt += 1;
            tracing::warn!(error = %e, attempt, "silent refresh failed; retrying");
            continue;
          }
          return Err(e);
        }
      }
    }
  }

  /// Run a mutating backend call with `is_saving` raised and fold its
  /// response into the snapshot. Returns the server's record even when a
  /// fresher snapshot was already installed.
  pub async fn save<F>(&self, call: F) -> Result<(OnboardingRecord, SyncOutcome)>
  where
    F: Future<Output = Result<OnboardingRecord>>,
  {
    let ticket = self.issue();
    let _saving = self.raise(Flag::Saving);
    match self.timed(call).await {
      Ok(record) => {
        let outcome = self.install(record.clone(), ticket);
        Ok((record, outcome))
      }
      Err(e) => {
        self.record_error(e.clone(), Some(ticket));
        Err(e)
      }
    }
  }

  /// Record an error found without a backend call.
  pub fn record_local_error(&self, error: ClientError) { self.record_error(error, None); }

  // ── Internals ──────────────────────────────────────────────────────────────

  fn lock(&self) -> MutexGuard<'_, Cursor> { self.cursor.lock().unwrap_or_else(PoisonError::into_inner) }

  fn issue(&self) -> u64 { self.tickets.fetch_add(1, Ordering::SeqCst) + 1 }

  async fn timed<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
    let limit = self.config.request_timeout;
    match tokio::time::timeout(limit, call).await {
      Ok(result) => result,
      Err(_) => {
        tracing::warn!(?limit, "onboarding request timed out");
        Err(ClientError::TransientNetwork(format!("request timed out after {limit:?}")))
      }
    }
  }

  fn install(&self, record: OnboardingRecord, ticket: u64) -> SyncOutcome {
    let mut outcome = SyncOutcome::Discarded;
    let revision = record.revision;
    self.state.send_if_modified(|snap| {
      let mut cursor = self.lock();
      let newer = ticket >= cursor.floor
        && match cursor.installed {
          None => true,
          Some((rev, tk)) => revision > rev || (revision == rev && ticket > tk),
        };
      if !newer {
        return false;
      }
      cursor.installed = Some((revision, ticket));
      snap.record = Some(record);
      snap.last_error = None;
      outcome = SyncOutcome::Installed;
      true
    });

    if outcome == SyncOutcome::Discarded {
      tracing::debug!(revision, ticket, "stale onboarding response discarded");
    }
    outcome
  }

  fn record_error(&self, error: ClientError, ticket: Option<u64>) {
    self.state.send_if_modified(|snap| {
      if ticket.is_some_and(|t| t < self.lock().floor) {
        return false;
      }
      snap.last_error = Some(error);
      true
    });
  }

  fn raise(&self, flag: Flag) -> FlagGuard<'_, B> {
    self.adjust(flag, true);
    FlagGuard { store: self, flag }
  }

  fn adjust(&self, flag: Flag, up: bool) {
    self.state.send_modify(|snap| {
      let mut cursor = self.lock();
      let count = match flag {
        Flag::Loading => &mut cursor.loads,
        Flag::Saving => &mut cursor.saves,
      };
      *count = if up { *count + 1 } else { count.saturating_sub(1) };
      let raised = *count > 0;
      match flag {
        Flag::Loading => snap.is_loading = raised,
        Flag::Saving => snap.is_saving = raised,
      }
    });
  }
}

// ─── Guards ───────────────────────────────────────────────────────────────────

/// Lowers a flag on every exit path, including cancellation.
struct FlagGuard<'a, B: OnboardingBackend> {
  store: &'a SessionStore<B>,
  flag:  Flag,
}

impl<B: OnboardingBackend> Drop for FlagGuard<'_, B> {
  fn drop(&mut self) { self.store.adjust(self.flag, false); }
}

struct RefreshGuard<'a, B: OnboardingBackend> {
  store: &'a SessionStore<B>,
}

impl<'a, B: OnboardingBackend> RefreshGuard<'a, B> {
  fn new(store: &'a SessionStore<B>) -> Self {
    store.state.send_modify(|snap| snap.refresh_in_flight = true);
    Self { store }
  }
}

impl<B: OnboardingBackend> Drop for RefreshGuard<'_, B> {
  fn drop(&mut self) {
    self.store.state.send_modify(|snap| snap.refresh_in_flight = false);
    self.store.refreshing.store(false, Ordering::Release);
  }
}

/// Shared handle type used by the coordinator and the CLI.
pub type SharedSession<B> = Arc<SessionStore<B>>;
