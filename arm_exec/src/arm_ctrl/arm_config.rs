//! Arm Configuration structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use super::Chain;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Stores an arm configuration - the angle of every joint in the chain, in
/// slot order, whether or not a motor is bound to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmConfig {
    /// Units: degrees
    pub angles_deg: Vec<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmConfig {
    /// Snapshot the angles of a chain.
    pub fn of_chain(chain: &Chain) -> Self {
        Self {
            angles_deg: chain.bones().iter().map(|b| b.theta()).collect(),
        }
    }

    /// Write the angles back into a chain, bypassing the joint limits.
    ///
    /// Extra angles, or missing ones, are ignored.
    pub fn apply_to(&self, chain: &mut Chain) {
        let ids: Vec<_> = chain.ids().collect();
        for (id, angle) in ids.into_iter().zip(self.angles_deg.iter()) {
            chain[id].set_theta(*angle);
        }
    }
}
