//! Joint motor interface

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A motor driving one joint of the arm.
pub trait Motor: Send {
    /// The measured angle of the joint.
    ///
    /// Units: degrees
    fn angle_deg(&self) -> f64;

    /// Demand a joint angle.
    ///
    /// Units: degrees
    fn set_angle_deg(&mut self, angle_deg: f64);

    /// Demand a joint rate.
    ///
    /// Units: degrees/second
    fn set_velocity_degs(&mut self, velocity_degs: f64);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A perfect simulated servo, it is always exactly where it was last told to
/// be.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimMotor {
    angle_deg: f64,
    velocity_degs: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimMotor {
    pub fn new(angle_deg: f64) -> Self {
        Self {
            angle_deg,
            velocity_degs: 0.0,
        }
    }

    /// The last demanded rate.
    pub fn velocity_degs(&self) -> f64 {
        self.velocity_degs
    }
}

impl Motor for SimMotor {
    fn angle_deg(&self) -> f64 {
        self.angle_deg
    }

    fn set_angle_deg(&mut self, angle_deg: f64) {
        self.angle_deg = angle_deg;
    }

    fn set_velocity_degs(&mut self, velocity_degs: f64) {
        self.velocity_degs = velocity_degs;
    }
}
