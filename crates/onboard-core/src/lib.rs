//! Core types and rules for marketplace onboarding and KYC case review.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the step registry, the completion resolver, the case lifecycle table and
//! the [`store::OnboardingStore`] abstraction every other crate builds on.

pub mod error;
pub mod lifecycle;
pub mod record;
pub mod registry;
pub mod resolver;
pub mod role;
pub mod store;
pub mod validate;
pub mod wire;

pub use error::{Error, Result};
