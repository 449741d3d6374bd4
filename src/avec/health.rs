//! Tracking of ROCs whose ARM core stopped reading out sanely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// What to do with the run once a spill has been found with a dead ARM core.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeadArmPolicy {
    /// Discard the spill and carry on with the next one.
    #[default]
    DiscardSpill,
    /// Discard the spill and end the run at its closing boundary.
    TerminateRun,
}

/// Per-ROC dead flags for the current spill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthMonitor {
    dead: BTreeMap<u8, bool>,
    policy: DeadArmPolicy,
}

impl HealthMonitor {
    pub fn new(rocs: impl IntoIterator<Item = u8>, policy: DeadArmPolicy) -> Self {
        Self {
            dead: rocs.into_iter().map(|roc| (roc, false)).collect(),
            policy,
        }
    }

    pub fn policy(&self) -> DeadArmPolicy {
        self.policy
    }

    /// Flag a ROC as dead. Returns whether it was alive until now.
    pub fn flag(&mut self, roc_id: u8, control: u32) -> bool {
        let was_dead = self.dead.insert(roc_id, true).unwrap_or(false);
        if !was_dead {
            tracing::warn!(roc_id, "ARM dead, control word {control:#010x}");
        }

        !was_dead
    }

    pub fn is_dead(&self, roc_id: u8) -> bool {
        self.dead.get(&roc_id).copied().unwrap_or(false)
    }

    pub fn any_dead(&self) -> bool {
        self.dead.values().any(|&dead| dead)
    }

    pub fn dead_rocs(&self) -> impl Iterator<Item = u8> + '_ {
        self.dead.iter().filter(|(_, dead)| **dead).map(|(&roc, _)| roc)
    }

    /// Clear every flag, as at a spill boundary.
    pub fn clear(&mut self) {
        self.dead.values_mut().for_each(|dead| *dead = false);
    }
}
