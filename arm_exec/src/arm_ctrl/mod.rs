//! Arm control module
//!
//! Kinematic control of a serial arm of rotary joints described by
//! Denavit-Hartenberg parameters. Each cycle the motion director compares the
//! end effector pose to the target pose and moves the joints using a finite
//! difference estimate of the arm's Jacobian.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod arm_config;
mod bone;
mod cartesian;
mod chain;
mod inverse_kinematics;
mod jacobian;
mod motor;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
pub use arm_config::*;
pub use bone::*;
pub use cartesian::*;
pub use chain::*;
pub use jacobian::*;
pub use motor::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The maximum number of joints in the arm's chain.
pub const MAX_JOINTS: usize = 6;

/// Default axis letters of each joint slot, used when the parameters don't
/// name one.
pub const DEFAULT_AXIS_LETTERS: [char; MAX_JOINTS] = ['X', 'Y', 'Z', 'U', 'V', 'W'];

/// Number of components in a cartesian vector.
pub const CARTESIAN_DIMS: usize = 6;

/// Joint angle perturbation used by the finite difference Jacobian.
///
/// Units: degrees
///
/// At this step the forward difference truncation error, proportional to the
/// step, is around 1e-5 relative on an arm with links in the 10-1000 mm range,
/// while cancellation error in the pose difference stays below 1e-9 relative.
pub const JACOBIAN_STEP_DEG: f64 = 0.001;

/// A solved joint motion which reproduces less than this fraction of the
/// requested cartesian motion is treated as singular.
///
/// Must stay well above the finite difference error of `JACOBIAN_STEP_DEG`,
/// otherwise a direction the arm cannot move in looks reachable.
pub const REACH_TOLERANCE: f64 = 1e-3;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during ArmCtrl operation.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum ArmCtrlError {
    #[error("no end effector, the chain has no bones")]
    NoEndEffector,

    #[error("no target pose is set")]
    NoTarget,

    #[error("singular jacobian, cannot move in this direction")]
    SingularJacobian,

    #[error("impossible velocity on joint {joint}: {rate_degs} deg/s")]
    ImpossibleVelocity { joint: usize, rate_degs: f64 },

    #[error("move needs {num_substeps} sub-moves, at most {max_substeps} are allowed")]
    TooManySubsteps {
        num_substeps: usize,
        max_substeps: usize,
    },

    #[error("target is out of range, cartesian error is {0}")]
    TargetOutOfRange(f64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

/// Errors raised while initialising ArmCtrl.
#[derive(Debug, thiserror::Error)]
pub enum ArmCtrlInitError {
    #[error("Cannot load the arm parameters: {0}")]
    LoadError(#[from] util::params::LoadError),

    #[error("Cannot build the arm: {0}")]
    BuildError(#[from] ArmCtrlError),
}
