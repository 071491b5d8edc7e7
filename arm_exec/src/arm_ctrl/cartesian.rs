//! Cartesian vectors and pose differences
//!
//! A cartesian vector is `[dx, dy, dz, rx, ry, rz]`: a linear displacement in
//! millimetres followed by a rotation vector in degrees.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3, Vector6};

// Internal
use util::maths;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// A 6 component cartesian vector, see the module documentation.
pub type Cartesian = Vector6<f64>;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// The translation part of a homogeneous transform.
pub fn position_of(m: &Matrix4<f64>) -> Vector3<f64> {
    Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
}

/// The rotation part of a homogeneous transform.
pub fn rotation_of(m: &Matrix4<f64>) -> Rotation3<f64> {
    #[rustfmt::skip]
    let rot = Matrix3::new(
        m[(0, 0)], m[(0, 1)], m[(0, 2)],
        m[(1, 0)], m[(1, 1)], m[(1, 2)],
        m[(2, 0)], m[(2, 1)], m[(2, 2)],
    );

    Rotation3::from_matrix_unchecked(rot)
}

/// Inverse of a rigid (rotation and translation only) transform.
pub fn rigid_inverse(m: &Matrix4<f64>) -> Matrix4<f64> {
    let rot_t = rotation_of(m).inverse();
    let t = -(rot_t * position_of(m));

    let mut inv = rot_t.to_homogeneous();
    inv[(0, 3)] = t.x;
    inv[(1, 3)] = t.y;
    inv[(2, 3)] = t.z;
    inv
}

/// Build a transform from a position (mm) and roll, pitch, yaw angles
/// (degrees, applied about x, then y, then z).
pub fn pose_from_xyz_rpy(xyz: &[f64; 3], rpy_deg: &[f64; 3]) -> Matrix4<f64> {
    let mut m = Rotation3::from_euler_angles(
        rpy_deg[0].to_radians(),
        rpy_deg[1].to_radians(),
        rpy_deg[2].to_radians(),
    )
    .to_homogeneous();
    m[(0, 3)] = xyz[0];
    m[(1, 3)] = xyz[1];
    m[(2, 3)] = xyz[2];
    m
}

/// Decompose a transform into a position (mm) and roll, pitch, yaw angles
/// (degrees), the inverse of `pose_from_xyz_rpy`.
pub fn xyz_rpy_from_pose(m: &Matrix4<f64>) -> ([f64; 3], [f64; 3]) {
    let p = position_of(m);
    let (roll, pitch, yaw) = rotation_of(m).euler_angles();

    (
        [p.x, p.y, p.z],
        [roll.to_degrees(), pitch.to_degrees(), yaw.to_degrees()],
    )
}

/// The cartesian vector taking pose `from` to pose `to`, both in the same
/// frame.
///
/// The rotational part is the rotation vector of `q_to * q_from^-1` along the
/// shortest arc, so it is well defined whatever the Euler angles of either
/// pose.
pub fn cartesian_delta(from: &Matrix4<f64>, to: &Matrix4<f64>) -> Cartesian {
    let dp = position_of(to) - position_of(from);

    let q_from = UnitQuaternion::from_rotation_matrix(&rotation_of(from));
    let q_to = UnitQuaternion::from_rotation_matrix(&rotation_of(to));
    let dr = rotation_vector(&(q_to * q_from.inverse()));

    Cartesian::new(
        dp.x,
        dp.y,
        dp.z,
        dr.x.to_degrees(),
        dr.y.to_degrees(),
        dr.z.to_degrees(),
    )
}

/// Scale `v` down so its magnitude is at most `max_len`. Vectors already short
/// enough are returned unchanged.
pub fn cap_vector_to_magnitude(v: &Cartesian, max_len: f64) -> Cartesian {
    let mut capped = *v;
    maths::cap_to_magnitude(capped.as_mut_slice(), max_len.max(0.0));
    capped
}

/// A cartesian move split into equal steps, see `segment_cartesian_move`.
///
/// The steps are produced on demand, so a move needing an absurd number of
/// them can be inspected and refused without being built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentedMove {
    step: Cartesian,
    num_steps: usize,
}

impl SegmentedMove {
    /// Number of steps in the move.
    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn is_empty(&self) -> bool {
        self.num_steps == 0
    }

    /// A single step of the move.
    pub fn step(&self) -> &Cartesian {
        &self.step
    }

    /// Iterate over the steps.
    pub fn steps(&self) -> impl Iterator<Item = Cartesian> {
        std::iter::repeat(self.step).take(self.num_steps)
    }
}

/// Split a cartesian move into equal sub-moves small enough for the Jacobian's
/// linearisation.
///
/// With `sum` the sum of the absolute components, a move with `sum <= 1` is a
/// single step and a larger one becomes `ceil(sum)` equal steps. A zero move
/// has no steps. Moves too long to count, including non-finite ones, report
/// `usize::MAX` steps.
pub fn segment_cartesian_move(v: &Cartesian) -> SegmentedMove {
    let sum = maths::abs_sum(v.as_slice());

    if sum == 0.0 {
        return SegmentedMove {
            step: Cartesian::zeros(),
            num_steps: 0,
        };
    }
    if sum <= 1.0 {
        return SegmentedMove {
            step: *v,
            num_steps: 1,
        };
    }

    // Float to int casts saturate
    let num_steps = if sum.is_finite() {
        sum.ceil() as usize
    } else {
        usize::MAX
    };

    SegmentedMove {
        step: v / num_steps as f64,
        num_steps,
    }
}

/// Rotation vector (axis times angle, radians) of a unit quaternion, taking
/// the shortest arc.
fn rotation_vector(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    let w = q.quaternion().scalar();
    let v = q.quaternion().imag();

    let s = v.norm();
    if s == 0.0 {
        return Vector3::zeros();
    }

    // q and -q are the same rotation, pick the one with w >= 0
    let (w, v) = if w < 0.0 { (-w, -v) } else { (w, v) };

    // atan2 stays accurate for small angles where acos(w) does not
    let angle = 2.0 * s.atan2(w);

    v * (angle / s)
}
