//! Parameters structure for ArmCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

// Internal
use super::{pose_from_xyz_rpy, ArmCtrlError, DEFAULT_AXIS_LETTERS, MAX_JOINTS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Arm control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    // ---- MOTION ----
    /// Maximum speed of the end effector towards the target.
    ///
    /// Units: millimetres/second (the rotational part of the cartesian error
    /// is limited in degrees/second by the same value)
    pub linear_velocity_mms: f64,

    /// The arm is on target once the magnitude of the cartesian error is
    /// below this value.
    pub target_tolerance: f64,

    /// Default maximum joint rate, for joints which don't set their own.
    ///
    /// Units: degrees/second
    pub max_joint_rate_degs: f64,

    /// Smallest acceptable ratio of the smallest to largest singular value of
    /// the matrix inverted when solving the Jacobian.
    #[serde(default = "default_singular_tolerance")]
    pub singular_tolerance: f64,

    /// Most sub-moves one tick may be split into. Longer moves are refused
    /// with a fault instead of being solved.
    #[serde(default = "default_max_substeps")]
    pub max_substeps: usize,

    // ---- GEOMETRY ----
    /// Pose of the base of the arm.
    #[serde(default)]
    pub base: BaseParams,

    /// The bones of the chain, from the base to the end effector.
    pub bones: Vec<BoneParams>,
}

/// Pose of the base of the chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaseParams {
    /// Units: millimetres
    pub translation_mm: [f64; 3],

    /// Roll, pitch and yaw.
    ///
    /// Units: degrees
    pub rotation_deg: [f64; 3],
}

/// Parameters for a single bone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoneParams {
    /// The axis letter of the joint, defaults to the slot's letter in
    /// `X Y Z U V W`.
    #[serde(default)]
    pub letter: Option<char>,

    /// Units: millimetres
    #[serde(default)]
    pub d: f64,

    /// Units: millimetres
    #[serde(default)]
    pub r: f64,

    /// Units: degrees
    #[serde(default)]
    pub alpha: f64,

    /// Initial joint angle.
    ///
    /// Units: degrees
    #[serde(default)]
    pub theta: f64,

    /// Units: degrees
    #[serde(default = "default_angle_min")]
    pub angle_min: f64,

    /// Units: degrees
    #[serde(default = "default_angle_max")]
    pub angle_max: f64,

    /// Whether a motor drives this joint. Joints without one keep their slot
    /// in the chain but are never moved.
    #[serde(default = "default_motor")]
    pub motor: bool,

    /// Maximum rate of this joint, overriding `max_joint_rate_degs`.
    ///
    /// Units: degrees/second
    #[serde(default)]
    pub max_rate_degs: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            linear_velocity_mms: 50.0,
            target_tolerance: 0.01,
            max_joint_rate_degs: 180.0,
            singular_tolerance: default_singular_tolerance(),
            max_substeps: default_max_substeps(),
            base: BaseParams::default(),
            bones: vec![],
        }
    }
}

impl Params {
    /// Check the parameters describe a buildable arm.
    pub fn validate(&self) -> Result<(), ArmCtrlError> {
        let invalid = |msg: String| Err(ArmCtrlError::InvalidParams(msg));

        if self.bones.len() > MAX_JOINTS {
            return invalid(format!(
                "{} bones given, at most {} are supported",
                self.bones.len(),
                MAX_JOINTS
            ));
        }
        if !(self.linear_velocity_mms > 0.0) {
            return invalid("linear_velocity_mms must be positive".into());
        }
        if !(self.target_tolerance > 0.0) {
            return invalid("target_tolerance must be positive".into());
        }
        if !(self.max_joint_rate_degs > 0.0) {
            return invalid("max_joint_rate_degs must be positive".into());
        }
        if !(self.singular_tolerance >= 0.0) {
            return invalid("singular_tolerance must not be negative".into());
        }
        if self.max_substeps == 0 {
            return invalid("max_substeps must be at least 1".into());
        }

        let base_ok = self
            .base
            .translation_mm
            .iter()
            .chain(self.base.rotation_deg.iter())
            .all(|v| v.is_finite());
        if !base_ok {
            return invalid("base pose must be finite".into());
        }

        for (i, b) in self.bones.iter().enumerate() {
            if ![b.d, b.r, b.alpha, b.theta].iter().all(|v| v.is_finite()) {
                return invalid(format!("bone {} has non-finite DH parameters", i));
            }
            if !(b.angle_min.is_finite() && b.angle_max.is_finite())
                || b.angle_min > b.angle_max
            {
                return invalid(format!(
                    "bone {} has invalid limits [{}, {}]",
                    i, b.angle_min, b.angle_max
                ));
            }
            if let Some(rate) = b.max_rate_degs {
                if !(rate > 0.0) {
                    return invalid(format!("bone {} max_rate_degs must be positive", i));
                }
            }
            if let Some(letter) = b.letter {
                if !letter.is_ascii_alphabetic() || letter == 'F' {
                    return invalid(format!("bone {} letter '{}' is not usable", i, letter));
                }
            }
        }

        let mut letters: Vec<char> = (0..self.bones.len()).map(|i| self.letter_for(i)).collect();
        letters.sort_unstable();
        letters.dedup();
        if letters.len() != self.bones.len() {
            return invalid("bone letters must be unique".into());
        }

        Ok(())
    }

    /// The axis letter of the bone in the given slot.
    pub fn letter_for(&self, slot: usize) -> char {
        self.bones
            .get(slot)
            .and_then(|b| b.letter)
            .unwrap_or(DEFAULT_AXIS_LETTERS[slot % MAX_JOINTS])
    }

    /// The maximum rate of the joint in the given slot.
    pub fn max_rate_for(&self, slot: usize) -> f64 {
        self.bones
            .get(slot)
            .and_then(|b| b.max_rate_degs)
            .unwrap_or(self.max_joint_rate_degs)
    }

    /// The base transform.
    pub fn base_transform(&self) -> Matrix4<f64> {
        pose_from_xyz_rpy(&self.base.translation_mm, &self.base.rotation_deg)
    }
}

fn default_singular_tolerance() -> f64 {
    1e-10
}

fn default_max_substeps() -> usize {
    100
}

fn default_angle_min() -> f64 {
    -180.0
}

fn default_angle_max() -> f64 {
    180.0
}

fn default_motor() -> bool {
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load_arm_ctrl_params() {
        let params: Params =
            util::params::load_from_str(include_str!("../../../params/arm_ctrl.toml")).unwrap();

        assert_eq!(params.bones.len(), 6);
        assert!(params.validate().is_ok());
        assert_eq!(params.singular_tolerance, 1e-10);
        assert_eq!(params.letter_for(3), 'U');
    }

    #[test]
    fn test_defaults_and_overrides() {
        let params: Params = util::params::load_from_str(
            r#"
            linear_velocity_mms = 20.0
            target_tolerance = 0.1
            max_joint_rate_degs = 90.0

            [[bones]]
            r = 10.0

            [[bones]]
            letter = "A"
            r = 10.0
            angle_min = -45.0
            angle_max = 45.0
            motor = false
            max_rate_degs = 10.0
            "#,
        )
        .unwrap();

        assert!(params.validate().is_ok());
        assert_eq!(params.bones[0].angle_min, -180.0);
        assert!(params.bones[0].motor);
        assert!(!params.bones[1].motor);
        assert_eq!(params.letter_for(0), 'X');
        assert_eq!(params.letter_for(1), 'A');
        assert_eq!(params.max_rate_for(0), 90.0);
        assert_eq!(params.max_rate_for(1), 10.0);
        assert_eq!(params.max_substeps, 100);
        assert_eq!(params.base_transform(), Matrix4::identity());
    }

    #[test]
    fn test_validate() {
        let mut params = Params::default();
        params.bones = vec![
            BoneParams {
                letter: None,
                d: 0.0,
                r: 10.0,
                alpha: 0.0,
                theta: 0.0,
                angle_min: -90.0,
                angle_max: 90.0,
                motor: true,
                max_rate_degs: None,
            };
            2
        ];
        assert!(params.validate().is_ok());

        params.bones[1].letter = Some('X');
        assert!(matches!(
            params.validate(),
            Err(ArmCtrlError::InvalidParams(_))
        ));

        params.bones[1].letter = None;
        params.bones[0].angle_min = 100.0;
        assert!(params.validate().is_err());

        params.bones[0].angle_min = -90.0;
        params.bones[0].r = std::f64::NAN;
        assert!(params.validate().is_err());

        params.bones[0].r = 10.0;
        params.max_substeps = 0;
        assert!(params.validate().is_err());

        params.max_substeps = 1;
        params.linear_velocity_mms = 0.0;
        assert!(params.validate().is_err());
    }
}
