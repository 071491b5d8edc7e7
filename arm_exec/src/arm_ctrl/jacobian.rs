//! Finite difference Jacobian estimation and inverse velocity solving

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector, Matrix4};
use std::fmt;

// Internal
use super::{
    cartesian_delta, ArmCtrlError, BoneId, Cartesian, Chain, CARTESIAN_DIMS,
    JACOBIAN_STEP_DEG, REACH_TOLERANCE,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A numerical estimate of the arm's Jacobian, mapping joint rates (deg/s) of
/// the given joints onto cartesian rates of the end effector.
///
/// The matrix is `CARTESIAN_DIMS` rows by one column per joint, in the order of
/// `joints`.
#[derive(Debug, Clone)]
pub struct ApproxJacobian {
    jacobian: DMatrix<f64>,

    joints: Vec<BoneId>,
}

/// A single joint temporarily moved away from its committed angle.
///
/// The committed angle is written back when the guard drops, so an unwinding
/// panic cannot leave the chain perturbed.
struct Perturbation<'a> {
    chain: &'a mut Chain,
    id: BoneId,
    committed_deg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ApproxJacobian {
    /// Estimate the Jacobian of `chain` with respect to `joints`.
    ///
    /// Each joint in turn is moved by `JACOBIAN_STEP_DEG` and the resulting
    /// change in end effector pose becomes its column. The chain is left
    /// exactly as it was found.
    pub fn estimate(chain: &mut Chain, joints: &[BoneId]) -> Result<Self, ArmCtrlError> {
        if let Some(id) = joints.iter().find(|id| chain.bone(**id).is_none()) {
            return Err(ArmCtrlError::InvalidArgument(format!(
                "no bone with id {}",
                id.0
            )));
        }

        let p0 = chain.end_effector_pose()?;

        let mut jacobian = DMatrix::zeros(CARTESIAN_DIMS, joints.len());

        for (col, id) in joints.iter().enumerate() {
            let pi = {
                let perturbed = Perturbation::new(chain, *id, JACOBIAN_STEP_DEG);
                perturbed.end_effector_pose()?
            };

            let column = cartesian_delta(&p0, &pi) / JACOBIAN_STEP_DEG;
            jacobian.set_column(col, &column);
        }

        Ok(Self {
            jacobian,
            joints: joints.to_vec(),
        })
    }

    /// The estimated matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.jacobian
    }

    /// The joints each column corresponds to.
    pub fn joints(&self) -> &[BoneId] {
        &self.joints
    }

    /// Solve for the joint motion producing the cartesian motion `v`.
    ///
    /// With N joints a square Jacobian is inverted directly, a tall one
    /// (N < 6) uses the left pseudo-inverse `(J^T J)^-1 J^T` and a wide one the
    /// right pseudo-inverse `J^T (J J^T)^-1`.
    ///
    /// Returns `SingularJacobian` if the inverted matrix is ill conditioned
    /// (the ratio of its smallest to largest singular value is below
    /// `singular_tolerance`) or if the arm cannot reproduce `v` at all from
    /// this configuration.
    pub fn joint_from_cartesian(
        &self,
        v: &Cartesian,
        singular_tolerance: f64,
    ) -> Result<DVector<f64>, ArmCtrlError> {
        let j = &self.jacobian;
        let n = j.ncols();
        let v = DVector::from_column_slice(v.as_slice());

        if n == 0 {
            return Err(ArmCtrlError::SingularJacobian);
        }

        let x = if n == CARTESIAN_DIMS {
            invert_checked(j.clone(), singular_tolerance)? * &v
        } else if n < CARTESIAN_DIMS {
            let jt = j.transpose();
            invert_checked(&jt * j, singular_tolerance)? * (jt * &v)
        } else {
            let jt = j.transpose();
            &jt * (invert_checked(j * &jt, singular_tolerance)? * &v)
        };

        if x.iter().any(|xi| !xi.is_finite()) {
            return Err(ArmCtrlError::SingularJacobian);
        }

        let v_norm = v.norm();
        if v_norm > 0.0 && (j * &x).norm() < REACH_TOLERANCE * v_norm {
            return Err(ArmCtrlError::SingularJacobian);
        }

        Ok(x)
    }
}

impl fmt::Display for ApproxJacobian {
    /// One row per line, columns separated by spaces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.jacobian.row_iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
            write!(f, "{}", cells.join(" "))?;
        }

        Ok(())
    }
}

impl<'a> Perturbation<'a> {
    fn new(chain: &'a mut Chain, id: BoneId, delta_deg: f64) -> Self {
        let committed_deg = chain[id].theta();
        chain[id].set_theta(committed_deg + delta_deg);

        Self {
            chain,
            id,
            committed_deg,
        }
    }

    fn end_effector_pose(&self) -> Result<Matrix4<f64>, ArmCtrlError> {
        self.chain.end_effector_pose()
    }
}

impl<'a> Drop for Perturbation<'a> {
    fn drop(&mut self) {
        self.chain[self.id].set_theta(self.committed_deg);
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Invert a square matrix, rejecting it if it is singular within `tolerance`.
fn invert_checked(m: DMatrix<f64>, tolerance: f64) -> Result<DMatrix<f64>, ArmCtrlError> {
    if m.is_empty() {
        return Err(ArmCtrlError::SingularJacobian);
    }

    let sv = m.clone().svd(false, false).singular_values;
    let sv_max = sv.iter().fold(0f64, |acc, s| acc.max(*s));
    let sv_min = sv.iter().fold(std::f64::INFINITY, |acc, s| acc.min(*s));

    if !(sv_max > 0.0) || !(sv_min / sv_max >= tolerance) {
        return Err(ArmCtrlError::SingularJacobian);
    }

    m.try_inverse().ok_or(ArmCtrlError::SingularJacobian)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arm_ctrl::Bone;

    fn two_link(theta_0: f64, theta_1: f64) -> Chain {
        let mut chain = Chain::new();
        chain.push(Bone::new(0.0, 10.0, 0.0, theta_0)).unwrap();
        chain.push(Bone::new(0.0, 10.0, 0.0, theta_1)).unwrap();
        chain
    }

    #[test]
    fn test_matches_analytic() {
        let (t0, t1) = (30f64, 45f64);
        let mut chain = two_link(t0, t1);
        let ids: Vec<BoneId> = chain.ids().collect();

        let jac = ApproxJacobian::estimate(&mut chain, &ids).unwrap();
        assert_eq!(jac.matrix().shape(), (6, 2));
        assert_eq!(jac.joints(), &ids[..]);

        // Planar two link arm, derivatives per degree
        let k = std::f64::consts::PI / 180.0;
        let (s0, c0) = t0.to_radians().sin_cos();
        let (s01, c01) = (t0 + t1).to_radians().sin_cos();
        #[rustfmt::skip]
        let expected = DMatrix::from_row_slice(6, 2, &[
            -10.0 * (s0 + s01) * k, -10.0 * s01 * k,
            10.0 * (c0 + c01) * k, 10.0 * c01 * k,
            0.0, 0.0,
            0.0, 0.0,
            0.0, 0.0,
            1.0, 1.0,
        ]);

        for (a, b) in jac.matrix().iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-4, "{} != {}", a, b);
        }
    }

    #[test]
    fn test_chain_untouched() {
        let mut chain = two_link(12.345, -67.89);
        let before = chain.clone();
        let ids: Vec<BoneId> = chain.ids().collect();

        ApproxJacobian::estimate(&mut chain, &ids).unwrap();

        for (a, b) in chain.bones().iter().zip(before.bones().iter()) {
            assert_eq!(a.theta().to_bits(), b.theta().to_bits());
            for (x, y) in a.local().iter().zip(b.local().iter()) {
                assert_eq!(x.to_bits(), y.to_bits());
            }
        }
    }

    #[test]
    fn test_perturbation_restored_on_panic() {
        let mut chain = two_link(10.0, 20.0);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _p = Perturbation::new(&mut chain, BoneId(1), 5.0);
            panic!("fault while perturbed");
        }));

        assert!(result.is_err());
        assert_eq!(chain[BoneId(1)].theta(), 20.0);
    }

    #[test]
    fn test_solve_recovers_joint_motion() {
        let mut chain = two_link(30.0, 45.0);
        let ids: Vec<BoneId> = chain.ids().collect();
        let jac = ApproxJacobian::estimate(&mut chain, &ids).unwrap();

        let dtheta = DVector::from_column_slice(&[0.2, -0.1]);
        let v = jac.matrix() * &dtheta;
        let v = Cartesian::from_column_slice(v.as_slice());

        let x = jac.joint_from_cartesian(&v, 1e-10).unwrap();
        assert!((x - dtheta).norm() < 1e-9);
    }

    #[test]
    fn test_singular_direction() {
        let mut chain = Chain::new();
        chain.push(Bone::new(0.0, 10.0, 0.0, 0.0)).unwrap();
        let jac = ApproxJacobian::estimate(&mut chain, &[BoneId(0)]).unwrap();

        // The tip of a single joint moves along y, never along x or z
        for v in [
            Cartesian::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0),
            Cartesian::new(0.0, 0.0, 1.0, 0.0, 0.0, 0.0),
        ]
        .iter()
        {
            assert_eq!(
                jac.joint_from_cartesian(v, 1e-10),
                Err(ArmCtrlError::SingularJacobian)
            );
        }

        // But it can move along y
        let v = Cartesian::new(0.0, 0.1, 0.0, 0.0, 0.0, 0.0);
        assert!(jac.joint_from_cartesian(&v, 1e-10).is_ok());
    }

    #[test]
    fn test_no_joints_is_singular() {
        let mut chain = two_link(0.0, 0.0);
        let jac = ApproxJacobian::estimate(&mut chain, &[]).unwrap();
        let v = Cartesian::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(
            jac.joint_from_cartesian(&v, 1e-10),
            Err(ArmCtrlError::SingularJacobian)
        );
        assert!(matches!(
            ApproxJacobian::estimate(&mut chain, &[BoneId(4)]),
            Err(ArmCtrlError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_display() {
        let mut chain = two_link(0.0, 0.0);
        let ids: Vec<BoneId> = chain.ids().collect();
        let jac = ApproxJacobian::estimate(&mut chain, &ids).unwrap();

        let text = jac.to_string();
        assert_eq!(text.lines().count(), 6);
        assert!(text.lines().all(|l| l.split(' ').count() == 2));
    }
}
