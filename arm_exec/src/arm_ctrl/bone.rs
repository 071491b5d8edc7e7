//! A single joint and link of the arm

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::Matrix4;

// Internal
use util::{maths, raise_error};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One rotary joint and the link following it, described by standard
/// Denavit-Hartenberg parameters.
///
/// The local transform is cached and recomputed on every write to `theta`,
/// so it always matches the current joint angle.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Offset along the previous z axis.
    ///
    /// Units: millimetres
    d: f64,

    /// Length along the rotated x axis (the DH `a`).
    ///
    /// Units: millimetres
    r: f64,

    /// Twist about the rotated x axis.
    ///
    /// Units: degrees
    alpha: f64,

    /// Joint angle about the previous z axis.
    ///
    /// Units: degrees
    theta: f64,

    /// Lower joint limit.
    ///
    /// Units: degrees
    angle_min: f64,

    /// Upper joint limit.
    ///
    /// Units: degrees
    angle_max: f64,

    /// Axis letter addressing this joint in `G0` commands.
    letter: char,

    /// Cached local transform.
    local: Matrix4<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Bone {
    /// Create a new bone with a full circle range, which is unconstrained.
    ///
    /// # Panics
    /// - If any parameter is not finite.
    pub fn new(d: f64, r: f64, alpha: f64, theta: f64) -> Self {
        let mut bone = Self {
            d,
            r,
            alpha,
            theta,
            angle_min: -180.0,
            angle_max: 180.0,
            letter: 'X',
            local: Matrix4::identity(),
        };
        bone.update_matrix();
        bone
    }

    /// Set the joint limits.
    ///
    /// # Panics
    /// - If either limit is not finite or `angle_min > angle_max`.
    pub fn with_limits(mut self, angle_min: f64, angle_max: f64) -> Self {
        assert!(
            angle_min.is_finite() && angle_max.is_finite() && angle_min <= angle_max,
            "Invalid joint limits [{}, {}]",
            angle_min,
            angle_max
        );
        self.angle_min = angle_min;
        self.angle_max = angle_max;
        self
    }

    /// Set the axis letter.
    pub fn with_letter(mut self, letter: char) -> Self {
        self.letter = letter;
        self
    }

    pub fn d(&self) -> f64 {
        self.d
    }

    pub fn r(&self) -> f64 {
        self.r
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn angle_min(&self) -> f64 {
        self.angle_min
    }

    pub fn angle_max(&self) -> f64 {
        self.angle_max
    }

    pub fn letter(&self) -> char {
        self.letter
    }

    /// The local transform of this bone relative to its predecessor.
    pub fn local(&self) -> &Matrix4<f64> {
        &self.local
    }

    /// Set the joint angle without applying limits.
    ///
    /// # Panics
    /// - If `theta` is not finite.
    pub fn set_theta(&mut self, theta: f64) {
        self.theta = theta;
        self.update_matrix();
    }

    /// True if the joint range covers a full circle, in which case limits
    /// are not applied at all.
    ///
    /// This is judged from the distance of each limit to the middle of the
    /// range so that continuous joints configured as e.g. `[0, 360]` or
    /// `[-270, 90]` qualify.
    pub fn is_unconstrained(&self) -> bool {
        let mid = (self.angle_max + self.angle_min) / 2.0;
        (self.angle_max - mid).abs() + (self.angle_min - mid).abs() >= 360.0
    }

    /// Set the joint angle, clamping it into the joint limits unless the joint
    /// is unconstrained.
    ///
    /// Returns `true` if the requested angle was changed by the limits.
    pub fn set_angle_wrt_limits(&mut self, new_angle: f64) -> bool {
        if self.is_unconstrained() {
            self.set_theta(new_angle);
            return false;
        }

        let clamped = maths::clamp(&new_angle, &self.angle_min, &self.angle_max);
        if clamped != new_angle {
            trace!(
                "Joint {} limited from {} to {} deg",
                self.letter,
                new_angle,
                clamped
            );
        }
        self.set_theta(clamped);

        clamped != new_angle
    }

    /// Recompute the cached local transform from the DH parameters.
    ///
    /// # Panics
    /// - If any DH parameter is not finite.
    pub fn update_matrix(&mut self) {
        self.local = dh_transform(self.d, self.r, self.alpha, self.theta);
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// The standard DH transform `TransZ(d) RotZ(theta) TransX(r) RotX(alpha)`.
///
/// Angles are in degrees.
///
/// # Panics
/// - If any parameter is not finite.
pub fn dh_transform(d: f64, r: f64, alpha: f64, theta: f64) -> Matrix4<f64> {
    if !(d.is_finite() && r.is_finite() && alpha.is_finite() && theta.is_finite()) {
        raise_error!(
            "Non-finite DH parameters (d: {}, r: {}, alpha: {}, theta: {})",
            d,
            r,
            alpha,
            theta
        );
    }

    let (st, ct) = theta.to_radians().sin_cos();
    let (sa, ca) = alpha.to_radians().sin_cos();

    #[rustfmt::skip]
    let local = Matrix4::new(
        ct,  -st * ca,  st * sa, r * ct,
        st,   ct * ca, -ct * sa, r * st,
        0.0,  sa,       ca,      d,
        0.0,  0.0,      0.0,     1.0,
    );

    local
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dh_transform() {
        // Pure length along x
        let m = dh_transform(0.0, 10.0, 0.0, 0.0);
        assert_eq!(m[(0, 3)], 10.0);
        assert_eq!(m[(1, 3)], 0.0);
        assert_eq!(m[(2, 3)], 0.0);

        // Offset along z with a quarter turn
        let m = dh_transform(5.0, 10.0, 0.0, 90.0);
        assert!(m[(0, 3)].abs() < 1e-12);
        assert!((m[(1, 3)] - 10.0).abs() < 1e-12);
        assert_eq!(m[(2, 3)], 5.0);

        // Twist maps y onto z
        let m = dh_transform(0.0, 0.0, 90.0, 0.0);
        assert!((m[(2, 1)] - 1.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic]
    fn test_non_finite_panics() {
        Bone::new(0.0, 10.0, 0.0, 0.0).set_theta(std::f64::NAN);
    }

    #[test]
    fn test_matrix_tracks_theta() {
        let mut bone = Bone::new(1.0, 10.0, 30.0, 0.0);
        bone.set_theta(42.0);
        assert_eq!(*bone.local(), dh_transform(1.0, 10.0, 30.0, 42.0));

        let first = *bone.local();
        bone.update_matrix();
        assert_eq!(*bone.local(), first);
    }

    #[test]
    fn test_unconstrained_rule() {
        assert!(Bone::new(0.0, 0.0, 0.0, 0.0).is_unconstrained());
        assert!(Bone::new(0.0, 0.0, 0.0, 0.0)
            .with_limits(0.0, 360.0)
            .is_unconstrained());
        assert!(Bone::new(0.0, 0.0, 0.0, 0.0)
            .with_limits(-270.0, 90.0)
            .is_unconstrained());
        assert!(!Bone::new(0.0, 0.0, 0.0, 0.0)
            .with_limits(-179.0, 180.0)
            .is_unconstrained());
    }

    #[test]
    fn test_clamp_invariant() {
        let limits = [
            (-90.0, 90.0),
            (0.0, 10.0),
            (-170.0, 170.0),
            (-180.0, 180.0),
            (0.0, 360.0),
            (-400.0, 10.0),
            (5.0, 5.0),
        ];
        let angles = [-720.0, -361.0, -180.0, -90.5, -1e-9, 0.0, 7.3, 90.0, 179.9, 500.0];

        for (min, max) in limits.iter() {
            for angle in angles.iter() {
                let mut bone = Bone::new(0.0, 10.0, 0.0, 0.0).with_limits(*min, *max);
                let limited = bone.set_angle_wrt_limits(*angle);

                let mid = (max + min) / 2.0;
                if (max - mid).abs() + (min - mid).abs() < 360.0 {
                    assert!(bone.theta() >= *min && bone.theta() <= *max);
                    assert_eq!(limited, bone.theta() != *angle);
                } else {
                    assert_eq!(bone.theta(), *angle);
                    assert!(!limited);
                }
            }
        }
    }
}
