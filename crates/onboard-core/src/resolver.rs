//! Step completion resolver.
//!
//! Progress is derived from an unordered set of completed step ids rather than
//! a stored cursor. The resolver reports progress; it does not enforce the
//! order in which steps were completed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{registry, role::Role};

/// Where an organization stands in its wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
  /// First required step not yet completed. `None` once complete.
  pub next_step:   Option<String>,
  pub is_complete: bool,
  /// Share of required steps completed, rounded to the nearest integer.
  pub percentage:  u8,
}

/// Resolve progress for `role` given the steps completed so far.
///
/// Ids in `completed` that the role's wizard does not know (renamed or retired
/// steps) are ignored here but left in the caller's set.
pub fn resolve(role: Role, completed: &BTreeSet<String>) -> Progress {
  let required = registry::steps_for(role);
  let next_step = required
    .iter()
    .find(|step| !completed.contains(**step))
    .map(|step| (*step).to_owned());

  let done = required.iter().filter(|step| completed.contains(**step)).count();
  let percentage = if required.is_empty() {
    100
  } else {
    ((done as f64 / required.len() as f64) * 100.0).round() as u8
  };

  Progress {
    is_complete: next_step.is_none(),
    next_step,
    percentage,
  }
}

/// Required steps of `role` that are not in `completed`, in wizard order.
pub fn missing_steps(role: Role, completed: &BTreeSet<String>) -> Vec<String> {
  registry::steps_for(role)
    .iter()
    .filter(|step| !completed.contains(**step))
    .map(|step| (*step).to_owned())
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::registry::{BANK_DETAILS, CATALOG, COMPLIANCE_DOCS, ORG_KYC, steps_for};

  fn set(steps: &[&str]) -> BTreeSet<String> {
    steps.iter().map(|s| (*s).to_owned()).collect()
  }

  /// Every subset of the role's steps, as bitmask-selected sets.
  fn subsets(role: Role) -> Vec<BTreeSet<String>> {
    let steps = steps_for(role);
    (0..1u32 << steps.len())
      .map(|mask| {
        steps
          .iter()
          .enumerate()
          .filter(|(i, _)| mask & (1 << i) != 0)
          .map(|(_, s)| (*s).to_owned())
          .collect()
      })
      .collect()
  }

  #[test]
  fn percentage_tracks_completed_share_for_every_subset() {
    for role in [Role::Seller, Role::Buyer, Role::Logistics] {
      let total = steps_for(role).len() as f64;
      for subset in subsets(role) {
        let expected = (100.0 * subset.len() as f64 / total).round() as u8;
        assert_eq!(resolve(role, &subset).percentage, expected, "{role} {subset:?}");
      }
    }
  }

  #[test]
  fn all_steps_done_is_complete_with_no_next_step() {
    for role in Role::ALL {
      let all = set(steps_for(role));
      let progress = resolve(role, &all);
      assert!(progress.is_complete);
      assert_eq!(progress.next_step, None);
      assert_eq!(progress.percentage, 100);
    }
  }

  #[test]
  fn empty_set_points_at_first_step() {
    for role in [Role::Seller, Role::Buyer, Role::Logistics] {
      let progress = resolve(role, &BTreeSet::new());
      assert_eq!(progress.next_step.as_deref(), Some(steps_for(role)[0]));
      assert!(!progress.is_complete);
      assert_eq!(progress.percentage, 0);
    }
  }

  #[test]
  fn seller_halfway() {
    let progress = resolve(Role::Seller, &set(&[ORG_KYC, BANK_DETAILS]));
    assert_eq!(progress.next_step.as_deref(), Some(COMPLIANCE_DOCS));
    assert_eq!(progress.percentage, 50);
    assert!(!progress.is_complete);
  }

  #[test]
  fn out_of_order_completion_still_reports_first_gap() {
    let progress = resolve(Role::Seller, &set(&[COMPLIANCE_DOCS, CATALOG]));
    assert_eq!(progress.next_step.as_deref(), Some(ORG_KYC));
    assert_eq!(progress.percentage, 50);
  }

  #[test]
  fn unknown_ids_are_ignored_for_percentage() {
    let completed = set(&[ORG_KYC, "gst-verification", "legacy-bank"]);
    let progress = resolve(Role::Logistics, &completed);
    assert_eq!(progress.percentage, 33);
    assert_eq!(progress.next_step.as_deref(), Some(BANK_DETAILS));
    // The caller's set is untouched.
    assert_eq!(completed.len(), 3);
  }

  #[test]
  fn thirds_round_to_nearest() {
    let two_of_three = resolve(Role::Logistics, &set(&[ORG_KYC, BANK_DETAILS]));
    assert_eq!(two_of_three.percentage, 67);
  }

  #[test]
  fn missing_steps_in_wizard_order() {
    let missing = missing_steps(Role::Seller, &set(&[CATALOG, ORG_KYC]));
    assert_eq!(missing, vec![BANK_DETAILS.to_owned(), COMPLIANCE_DOCS.to_owned()]);
    assert!(missing_steps(Role::Admin, &BTreeSet::new()).is_empty());
  }
}
