//! Kinematic chain and forward kinematics

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

// Internal
use super::{ArmCtrlError, Bone, MAX_JOINTS};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something with a local transform and a world transform derived from its
/// ancestors.
pub trait Pose {
    /// The world transform.
    fn world(&self) -> Matrix4<f64>;

    /// Set the transform relative to the parent.
    fn set_local(&mut self, local: Matrix4<f64>);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Stable handle to a bone in a chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct BoneId(pub usize);

/// An ordered chain of bones.
///
/// The bones are owned by the chain in slot order, other parts of the
/// software refer to them by `BoneId`. Forward kinematics multiplies, in
/// order, the parent's world transform, the base transform and each bone's
/// local transform.
#[derive(Debug, Clone)]
pub struct Chain {
    bones: Vec<Bone>,

    base: Matrix4<f64>,

    parent_world: Option<Matrix4<f64>>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Chain {
    /// Create an empty chain with an identity base.
    pub fn new() -> Self {
        Self {
            bones: Vec::with_capacity(MAX_JOINTS),
            base: Matrix4::identity(),
            parent_world: None,
        }
    }

    /// Set the base transform.
    pub fn with_base(mut self, base: Matrix4<f64>) -> Self {
        self.base = base;
        self
    }

    /// Append a bone to the end of the chain.
    pub fn push(&mut self, bone: Bone) -> Result<BoneId, ArmCtrlError> {
        if self.bones.len() >= MAX_JOINTS {
            return Err(ArmCtrlError::InvalidArgument(format!(
                "a chain holds at most {} bones",
                MAX_JOINTS
            )));
        }

        self.bones.push(bone);
        Ok(BoneId(self.bones.len() - 1))
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Ids of every bone in chain order.
    pub fn ids(&self) -> impl Iterator<Item = BoneId> {
        (0..self.bones.len()).map(BoneId)
    }

    pub fn bone(&self, id: BoneId) -> Option<&Bone> {
        self.bones.get(id.0)
    }

    pub fn bone_mut(&mut self, id: BoneId) -> Option<&mut Bone> {
        self.bones.get_mut(id.0)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn base(&self) -> &Matrix4<f64> {
        &self.base
    }

    /// Set the world transform of whatever the chain is mounted on, or `None`
    /// if the base is expressed in the world frame.
    pub fn set_parent_world(&mut self, parent_world: Option<Matrix4<f64>>) {
        self.parent_world = parent_world;
    }

    /// The world transform of the chain's base.
    pub fn world_base(&self) -> Matrix4<f64> {
        match self.parent_world {
            Some(p) => p * self.base,
            None => self.base,
        }
    }

    /// The world pose at the far end of the given bone.
    pub fn bone_world_pose(&self, id: BoneId) -> Option<Matrix4<f64>> {
        if id.0 >= self.bones.len() {
            return None;
        }

        Some(
            self.bones[..=id.0]
                .iter()
                .fold(self.world_base(), |acc, b| acc * b.local()),
        )
    }

    /// The world pose of the end effector, i.e. the end of the last bone.
    pub fn end_effector_pose(&self) -> Result<Matrix4<f64>, ArmCtrlError> {
        match self.bones.len() {
            0 => Err(ArmCtrlError::NoEndEffector),
            n => self
                .bone_world_pose(BoneId(n - 1))
                .ok_or(ArmCtrlError::NoEndEffector),
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Pose for Chain {
    fn world(&self) -> Matrix4<f64> {
        self.world_base()
    }

    fn set_local(&mut self, local: Matrix4<f64>) {
        self.base = local;
    }
}

impl Index<BoneId> for Chain {
    type Output = Bone;

    fn index(&self, id: BoneId) -> &Bone {
        &self.bones[id.0]
    }
}

impl IndexMut<BoneId> for Chain {
    fn index_mut(&mut self, id: BoneId) -> &mut Bone {
        &mut self.bones[id.0]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::Vector3;

    fn two_link() -> Chain {
        let mut chain = Chain::new();
        chain.push(Bone::new(0.0, 10.0, 0.0, 0.0)).unwrap();
        chain.push(Bone::new(0.0, 10.0, 0.0, 0.0)).unwrap();
        chain
    }

    fn translation(m: &Matrix4<f64>) -> Vector3<f64> {
        Vector3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)])
    }

    #[test]
    fn test_two_link_scenario() {
        let mut chain = two_link();

        let ee = chain.end_effector_pose().unwrap();
        assert!((translation(&ee) - Vector3::new(20.0, 0.0, 0.0)).norm() < 1e-12);

        // Fold the first joint by a quarter turn, the whole arm now points
        // along y
        chain[BoneId(0)].set_theta(90.0);
        let ee = chain.end_effector_pose().unwrap();
        let expected = Vector3::new(
            10.0 * 90f64.to_radians().cos() * 2.0,
            10.0 * 90f64.to_radians().sin() * 2.0,
            0.0,
        );
        assert!((translation(&ee) - expected).norm() < 1e-9);
        assert!(ee[(0, 3)].abs() < 1e-9);

        // Elbow at 90 too
        chain[BoneId(1)].set_theta(90.0);
        let ee = chain.end_effector_pose().unwrap();
        assert!((translation(&ee) - Vector3::new(-10.0, 10.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn test_deterministic() {
        let mut chain = two_link();
        chain[BoneId(0)].set_theta(33.3);
        chain[BoneId(1)].set_theta(-71.9);

        let a = chain.end_effector_pose().unwrap();
        chain[BoneId(1)].update_matrix();
        let b = chain.end_effector_pose().unwrap();

        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn test_base_and_parent() {
        let mut chain =
            two_link().with_base(Matrix4::new_translation(&Vector3::new(0.0, 0.0, 5.0)));
        chain.set_parent_world(Some(Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0))));

        let ee = chain.end_effector_pose().unwrap();
        assert!((translation(&ee) - Vector3::new(21.0, 0.0, 5.0)).norm() < 1e-12);

        let elbow = chain.bone_world_pose(BoneId(0)).unwrap();
        assert!((translation(&elbow) - Vector3::new(11.0, 0.0, 5.0)).norm() < 1e-12);
        assert!(chain.bone_world_pose(BoneId(2)).is_none());

        chain.set_local(Matrix4::identity());
        assert!((translation(&chain.world()) - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_empty_and_full() {
        let mut chain = Chain::default();
        assert_eq!(chain.end_effector_pose(), Err(ArmCtrlError::NoEndEffector));

        for _ in 0..MAX_JOINTS {
            chain.push(Bone::new(0.0, 1.0, 0.0, 0.0)).unwrap();
        }
        assert!(matches!(
            chain.push(Bone::new(0.0, 1.0, 0.0, 0.0)),
            Err(ArmCtrlError::InvalidArgument(_))
        ));
        assert_eq!(chain.ids().count(), MAX_JOINTS);
    }
}
