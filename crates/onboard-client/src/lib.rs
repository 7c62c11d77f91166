//! Client side of marketplace onboarding.
//!
//! [`client::ApiClient`] talks to the server; [`session::SessionStore`] keeps
//! the organization's latest snapshot consistent under concurrent refreshes
//! and edits; [`coordinator::SubmissionCoordinator`] drives step submission
//! and submit-for-review on top of it.

pub mod backend;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod session;

#[cfg(test)]
mod fake;

pub use error::{ClientError, Result};
