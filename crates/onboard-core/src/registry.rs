//! Step registry: which steps each role completes, in canonical order.
//!
//! The registry is a plain data table. Adding a role or reordering a wizard is
//! a change to [`STEP_TABLE`], never to the lookup code.

use crate::role::Role;

// ─── Step identifiers ────────────────────────────────────────────────────────

pub const ORG_KYC: &str = "org-kyc";
pub const ORG_KYS: &str = "org-kys";
pub const BANK_DETAILS: &str = "bank-details";
pub const COMPLIANCE_DOCS: &str = "compliance-docs";
pub const CATALOG: &str = "catalog";
pub const BUYER_PREFERENCES: &str = "buyer-preferences";

/// Pseudo-step reported once every required step is done.
pub const REVIEW: &str = "review";

// ─── Table ───────────────────────────────────────────────────────────────────

/// Role → ordered required steps. Order defines the wizard progression.
pub const STEP_TABLE: &[(Role, &[&str])] = &[
  (Role::Seller, &[ORG_KYC, BANK_DETAILS, COMPLIANCE_DOCS, CATALOG]),
  (Role::Buyer, &[ORG_KYS, BANK_DETAILS, COMPLIANCE_DOCS, BUYER_PREFERENCES]),
  (Role::Logistics, &[ORG_KYC, BANK_DETAILS, COMPLIANCE_DOCS]),
  (Role::Admin, &[]),
];

/// The ordered steps `role` must complete. Empty for [`Role::Admin`].
pub fn steps_for(role: Role) -> &'static [&'static str] {
  STEP_TABLE
    .iter()
    .find(|(r, _)| *r == role)
    .map(|(_, steps)| *steps)
    .unwrap_or(&[])
}

/// Whether `step` belongs to the wizard of `role`.
pub fn is_known_step(role: Role, step: &str) -> bool {
  steps_for(role).contains(&step)
}
