//! # Mechanisms Equipment Commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Index of a joint slot in the arm's kinematic chain.
pub type JointIdx = usize;

/// Demands sent from arm control to the joint actuators.
///
/// Only joints with a bound actuator appear in the maps.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MechDems {
    /// The demanded position of each joint in degrees.
    pub pos_deg: BTreeMap<JointIdx, f64>,

    /// The demanded angular velocity of each joint in degrees/second.
    pub speed_degs: BTreeMap<JointIdx, f64>,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl MechDems {
    /// True if every demanded speed is zero.
    pub fn is_stationary(&self) -> bool {
        self.speed_degs.values().all(|s| *s == 0.0)
    }
}
