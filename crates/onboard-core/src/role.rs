//! Organization roles.
//!
//! A role is fixed when an organization's onboarding record is created and
//! selects the step set the organization has to complete.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Error, registry};

/// The part an organization plays on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
  Seller,
  Buyer,
  Logistics,
  /// Back-office reviewers. Admins review cases; they never onboard.
  Admin,
}

impl Role {
  pub const ALL: [Role; 4] = [Role::Seller, Role::Buyer, Role::Logistics, Role::Admin];

  pub fn as_str(self) -> &'static str {
    match self {
      Role::Seller => "SELLER",
      Role::Buyer => "BUYER",
      Role::Logistics => "LOGISTICS",
      Role::Admin => "ADMIN",
    }
  }

  /// Whether organizations with this role complete an onboarding wizard.
  pub fn is_onboarding(self) -> bool { !registry::steps_for(self).is_empty() }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = Error;

  /// Case-insensitive, so `seller` from a config file or a header parses too.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Role::ALL
      .into_iter()
      .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| Error::UnknownRole(s.to_owned()))
  }
}
