//! Implementations for the ArmCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

// Internal
use super::{
    cap_vector_to_magnitude, cartesian_delta, ApproxJacobian, ArmConfig, ArmCtrlError,
    ArmCtrlInitError, Bone, BoneId, Cartesian, Chain, Motor, Params, SimMotor, MAX_JOINTS,
};
use comms_if::eqpt::mech::MechDems;
use util::{maths, module::State, params, session::Session};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Arm control module state.
///
/// Owns the kinematic chain and the motors bound to its joints, and acts as
/// the motion director: each call to `update` moves the end effector a
/// bounded step towards the target pose.
#[derive(Default)]
pub struct ArmCtrl {
    pub(crate) params: Params,

    pub(crate) chain: Chain,

    /// One optional motor per chain slot.
    pub(crate) motors: Vec<Option<Box<dyn Motor>>>,

    /// Target pose of the end effector in the world frame.
    pub(crate) target: Option<Matrix4<f64>>,

    pub(crate) motion_state: MotionState,

    pub(crate) report: StatusReport,

    pub(crate) output: MechDems,

    /// Rate last demanded of each joint.
    ///
    /// Units: degrees/second
    pub(crate) rates_degs: [f64; MAX_JOINTS],
}

/// Input data to Arm Control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Time since the previous cycle.
    ///
    /// Units: seconds
    pub dt_s: f64,
}

/// Status report for ArmCtrl processing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    pub motion_state: MotionState,

    /// Set for each joint whose demanded angle was clamped into its limits
    /// this cycle.
    pub angle_limited: [bool; MAX_JOINTS],

    /// Magnitude of the cartesian error to the target at the start of the
    /// cycle, or zero if there is no target.
    pub error_norm: f64,

    /// Number of Jacobian solves used to move this cycle.
    pub num_substeps: usize,

    /// Reason the arm could not move this cycle.
    pub fault: Option<ArmCtrlError>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Motion director state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    /// No target, or on target.
    Idle,

    /// Moving towards the target.
    Tracking,
}

impl Default for MotionState {
    fn default() -> Self {
        MotionState::Idle
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for ArmCtrl {
    type InitData = String;
    type InitError = ArmCtrlInitError;

    type InputData = InputData;
    type OutputData = MechDems;
    type StatusReport = StatusReport;
    type ProcError = ArmCtrlError;

    /// Initialise the ArmCtrl module.
    ///
    /// Expected init data is the path to the parameter file, relative to the
    /// params directory.
    fn init(
        &mut self,
        init_data: Self::InitData,
        _session: &Session,
    ) -> Result<(), Self::InitError> {
        let params: Params = params::load(&init_data)?;

        *self = Self::from_params(params)?;

        info!(
            "ArmCtrl initialised with {} joints ({} driven)",
            self.chain.len(),
            self.active_joints().len()
        );

        Ok(())
    }

    /// Perform cyclic processing of Arm Control.
    ///
    /// Only an invalid cycle period is an error, faults during motion are
    /// given in the status report.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        if !(input_data.dt_s.is_finite() && input_data.dt_s > 0.0) {
            return Err(ArmCtrlError::InvalidArgument(format!(
                "cycle period must be positive, got {}",
                input_data.dt_s
            )));
        }

        let report = self.update(input_data.dt_s);

        Ok((self.output.clone(), report))
    }
}

impl ArmCtrl {
    /// Build the arm described by the parameters, with a simulated motor on
    /// every joint the parameters mark as driven.
    pub fn from_params(params: Params) -> Result<Self, ArmCtrlError> {
        params.validate()?;

        let mut chain = Chain::new().with_base(params.base_transform());
        let mut motors: Vec<Option<Box<dyn Motor>>> = Vec::with_capacity(params.bones.len());

        for (i, b) in params.bones.iter().enumerate() {
            let mut bone = Bone::new(b.d, b.r, b.alpha, 0.0)
                .with_limits(b.angle_min, b.angle_max)
                .with_letter(params.letter_for(i));
            if bone.set_angle_wrt_limits(b.theta) {
                warn!(
                    "Initial angle of joint {} is outside its limits, clamped to {}",
                    i,
                    bone.theta()
                );
            }

            let motor: Option<Box<dyn Motor>> = match b.motor {
                true => Some(Box::new(SimMotor::new(bone.theta()))),
                false => None,
            };
            motors.push(motor);

            chain.push(bone)?;
        }

        let mut arm = Self {
            params,
            chain,
            motors,
            ..Default::default()
        };
        arm.set_output();

        Ok(arm)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn motion_state(&self) -> MotionState {
        self.motion_state
    }

    /// The status report of the last cycle.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    /// Bind a motor to the joint in the given slot, replacing any motor
    /// already bound there.
    pub fn bind_motor(&mut self, id: BoneId, motor: Box<dyn Motor>) -> Result<(), ArmCtrlError> {
        match self.motors.get_mut(id.0) {
            Some(slot) => {
                *slot = Some(motor);
                Ok(())
            }
            None => Err(ArmCtrlError::InvalidArgument(format!(
                "no joint in slot {}",
                id.0
            ))),
        }
    }

    /// Remove the motor from a joint, which then stays where it is.
    pub fn unbind_motor(&mut self, id: BoneId) -> Option<Box<dyn Motor>> {
        if let Some(r) = self.rates_degs.get_mut(id.0) {
            *r = 0.0;
        }
        self.motors.get_mut(id.0).and_then(|m| m.take())
    }

    pub fn motor(&self, id: BoneId) -> Option<&dyn Motor> {
        self.motors.get(id.0).and_then(|m| m.as_deref())
    }

    /// The joints with a bound motor, in chain order.
    pub fn active_joints(&self) -> Vec<BoneId> {
        self.motors
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_some())
            .map(|(i, _)| BoneId(i))
            .collect()
    }

    /// The active joint with the given axis letter.
    pub fn active_joint_by_letter(&self, letter: char) -> Option<BoneId> {
        self.active_joints()
            .into_iter()
            .find(|id| self.chain[*id].letter() == letter)
    }

    /// Set the world transform of whatever the arm is mounted on.
    pub fn set_parent_world(&mut self, parent_world: Option<Matrix4<f64>>) {
        self.chain.set_parent_world(parent_world);
    }

    pub fn end_effector_pose(&self) -> Result<Matrix4<f64>, ArmCtrlError> {
        self.chain.end_effector_pose()
    }

    /// The end effector pose relative to the base of the chain.
    pub fn end_effector_pose_from_base(&self) -> Result<Matrix4<f64>, ArmCtrlError> {
        let ee = self.chain.end_effector_pose()?;
        Ok(super::rigid_inverse(&self.chain.world_base()) * ee)
    }

    pub fn target(&self) -> Option<&Matrix4<f64>> {
        self.target.as_ref()
    }

    /// The target relative to the base of the chain.
    pub fn target_from_base(&self) -> Option<Matrix4<f64>> {
        self.target
            .map(|t| super::rigid_inverse(&self.chain.world_base()) * t)
    }

    /// Set the target pose, in the world frame. Replaces any current target.
    pub fn set_target(&mut self, target: Matrix4<f64>) {
        debug!("New ArmCtrl target:{}", target);
        self.target = Some(target);
    }

    /// Set the target pose, relative to the base of the chain.
    pub fn set_target_from_base(&mut self, target: Matrix4<f64>) {
        self.set_target(self.chain.world_base() * target);
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    /// If there is a target move it onto the end effector, so the arm stays
    /// where it is.
    pub fn retarget_to_end_effector(&mut self) {
        if self.target.is_some() {
            self.target = self.chain.end_effector_pose().ok();
        }
    }

    /// Set the maximum speed of the end effector.
    pub fn set_linear_velocity(&mut self, velocity_mms: f64) -> Result<(), ArmCtrlError> {
        if !(velocity_mms.is_finite() && velocity_mms > 0.0) {
            return Err(ArmCtrlError::InvalidArgument(format!(
                "linear velocity must be positive, got {}",
                velocity_mms
            )));
        }

        self.params.linear_velocity_mms = velocity_mms;
        Ok(())
    }

    /// The angle of each active joint, in chain order.
    pub fn get_all_joint_angles(&self) -> Vec<f64> {
        self.active_joints()
            .into_iter()
            .map(|id| self.chain[id].theta())
            .collect()
    }

    /// Set the angle of each active joint, in chain order, applying the joint
    /// limits.
    pub fn set_all_joint_angles(&mut self, angles_deg: &[f64]) -> Result<(), ArmCtrlError> {
        let joints = self.active_joints();
        check_len(joints.len(), angles_deg.len())?;

        for (id, angle) in joints.into_iter().zip(angles_deg.iter()) {
            self.set_joint_angle(id, *angle)?;
        }

        Ok(())
    }

    /// Demand a rate of each active joint's motor, in chain order.
    pub fn set_all_joint_velocities(&mut self, rates_degs: &[f64]) -> Result<(), ArmCtrlError> {
        let joints = self.active_joints();
        check_len(joints.len(), rates_degs.len())?;

        if rates_degs.iter().any(|r| !r.is_finite()) {
            return Err(ArmCtrlError::InvalidArgument(
                "joint rates must be finite".into(),
            ));
        }

        for (id, rate) in joints.into_iter().zip(rates_degs.iter()) {
            self.rates_degs[id.0] = *rate;
            if let Some(Some(m)) = self.motors.get_mut(id.0) {
                m.set_velocity_degs(*rate);
            }
        }

        Ok(())
    }

    /// Set the angle of one joint, applying its limits, and demand it of the
    /// joint's motor.
    ///
    /// Returns `true` if the angle was limited.
    pub fn set_joint_angle(&mut self, id: BoneId, angle_deg: f64) -> Result<bool, ArmCtrlError> {
        if !angle_deg.is_finite() {
            return Err(ArmCtrlError::InvalidArgument(format!(
                "joint angle must be finite, got {}",
                angle_deg
            )));
        }

        let bone = self
            .chain
            .bone_mut(id)
            .ok_or_else(|| ArmCtrlError::InvalidArgument(format!("no joint in slot {}", id.0)))?;

        let limited = bone.set_angle_wrt_limits(angle_deg);
        let theta = bone.theta();
        if limited {
            self.report.angle_limited[id.0] = true;
        }

        if let Some(Some(m)) = self.motors.get_mut(id.0) {
            m.set_angle_deg(theta);
        }

        Ok(limited)
    }

    /// Estimate the Jacobian with respect to the active joints.
    pub fn estimate_jacobian(&mut self) -> Result<ApproxJacobian, ArmCtrlError> {
        let joints = self.active_joints();
        ApproxJacobian::estimate(&mut self.chain, &joints)
    }

    /// The cartesian vector from the end effector to the target.
    pub fn cartesian_error(&self) -> Result<Cartesian, ArmCtrlError> {
        let target = self.target.ok_or(ArmCtrlError::NoTarget)?;
        let ee = self.chain.end_effector_pose()?;

        Ok(cartesian_delta(&ee, &target))
    }

    /// A snapshot of every joint angle.
    pub fn arm_config(&self) -> ArmConfig {
        ArmConfig::of_chain(&self.chain)
    }

    /// Restore every joint angle from a snapshot and demand it of the motors.
    pub fn restore_arm_config(&mut self, config: &ArmConfig) -> Result<(), ArmCtrlError> {
        check_len(self.chain.len(), config.angles_deg.len())?;

        config.apply_to(&mut self.chain);
        for (i, m) in self.motors.iter_mut().enumerate() {
            if let Some(m) = m {
                m.set_angle_deg(self.chain[BoneId(i)].theta());
            }
        }

        Ok(())
    }

    /// Run one cycle of the motion director.
    ///
    /// The joints are first synchronised with their motors. If there is a
    /// target further than the tolerance from the end effector the end
    /// effector is moved towards it by at most `linear_velocity_mms * dt_s`.
    ///
    /// Never fails: if the arm cannot move the fault is given in the report,
    /// the arm is left in its last valid configuration and the motors are
    /// stopped.
    pub fn update(&mut self, dt_s: f64) -> StatusReport {
        self.report = StatusReport::default();

        self.sync_from_motors();

        match self.track_target(dt_s) {
            Ok(num_substeps) => self.report.num_substeps = num_substeps,
            Err(e) => {
                warn!("ArmCtrl cannot move: {}", e);
                self.halt_motors();
                self.report.fault = Some(e);
            }
        }

        self.report.motion_state = self.motion_state;
        self.set_output();

        self.report.clone()
    }

    /// Read every active joint's angle from its motor.
    pub fn sync_from_motors(&mut self) {
        for (i, m) in self.motors.iter().enumerate() {
            let angle_deg = match m {
                Some(m) => m.angle_deg(),
                None => continue,
            };

            if !angle_deg.is_finite() {
                warn!("Motor {} reports a non-finite angle, ignored", i);
                continue;
            }

            if self.chain[BoneId(i)].set_angle_wrt_limits(angle_deg) {
                self.report.angle_limited[i] = true;
            }
        }
    }

    /// Function called when entering safe mode.
    ///
    /// Must result in no motion of the arm.
    pub fn make_safe(&mut self) {
        self.clear_target();
        self.motion_state = MotionState::Idle;
        self.halt_motors();
        self.set_output();
    }

    fn track_target(&mut self, dt_s: f64) -> Result<usize, ArmCtrlError> {
        if !(dt_s.is_finite() && dt_s > 0.0) {
            return Err(ArmCtrlError::InvalidArgument(format!(
                "cycle period must be positive, got {}",
                dt_s
            )));
        }

        let error = match self.cartesian_error() {
            Ok(e) => e,
            Err(ArmCtrlError::NoTarget) | Err(ArmCtrlError::NoEndEffector) => {
                self.go_idle();
                return Ok(0);
            }
            Err(e) => return Err(e),
        };

        self.report.error_norm = maths::magnitude(error.as_slice());

        if !self.report.error_norm.is_finite() {
            return Err(ArmCtrlError::TargetOutOfRange(self.report.error_norm));
        }

        if self.report.error_norm < self.params.target_tolerance {
            self.go_idle();
            return Ok(0);
        }

        if self.motion_state == MotionState::Idle {
            debug!("ArmCtrl tracking target, error {}", self.report.error_norm);
        }
        self.motion_state = MotionState::Tracking;

        let v = cap_vector_to_magnitude(&error, self.params.linear_velocity_mms * dt_s);

        self.move_end_effector_in_cartesian_direction(&v, dt_s)
    }

    fn go_idle(&mut self) {
        if self.motion_state == MotionState::Tracking {
            debug!("ArmCtrl on target");
        }
        self.motion_state = MotionState::Idle;
        self.halt_motors();
    }

    fn halt_motors(&mut self) {
        self.rates_degs = [0.0; MAX_JOINTS];
        for m in self.motors.iter_mut().flatten() {
            m.set_velocity_degs(0.0);
        }
    }

    /// Set the output demands from the chain and the last demanded rates.
    fn set_output(&mut self) {
        let mut output = MechDems::default();

        for id in self.active_joints() {
            output.pos_deg.insert(id.0, self.chain[id].theta());
            output.speed_degs.insert(id.0, self.rates_degs[id.0]);
        }

        self.output = output;
    }
}

fn check_len(expected: usize, given: usize) -> Result<(), ArmCtrlError> {
    match expected == given {
        true => Ok(()),
        false => Err(ArmCtrlError::InvalidArgument(format!(
            "expected {} values, got {}",
            expected, given
        ))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arm_ctrl::{pose_from_xyz_rpy, BoneParams};

    /// Planar two link arm, links of 10 mm, both joints driven.
    fn two_link_params(theta_0: f64, theta_1: f64) -> Params {
        let bone = |theta| BoneParams {
            letter: None,
            d: 0.0,
            r: 10.0,
            alpha: 0.0,
            theta,
            angle_min: -180.0,
            angle_max: 180.0,
            motor: true,
            max_rate_degs: None,
        };

        Params {
            linear_velocity_mms: 100.0,
            target_tolerance: 0.01,
            max_joint_rate_degs: 1000.0,
            bones: vec![bone(theta_0), bone(theta_1)],
            ..Default::default()
        }
    }

    /// World pose of the two link arm's end effector for the given angles.
    fn two_link_pose(theta_0: f64, theta_1: f64) -> Matrix4<f64> {
        let (s0, c0) = theta_0.to_radians().sin_cos();
        let (s01, c01) = (theta_0 + theta_1).to_radians().sin_cos();
        pose_from_xyz_rpy(
            &[10.0 * (c0 + c01), 10.0 * (s0 + s01), 0.0],
            &[0.0, 0.0, theta_0 + theta_1],
        )
    }

    #[test]
    fn test_converges_on_target() {
        let mut arm = ArmCtrl::from_params(two_link_params(0.0, 90.0)).unwrap();
        arm.set_target(two_link_pose(30.0, 45.0));

        let mut ticks = 0;
        loop {
            let report = arm.update(0.05);
            assert!(report.fault.is_none(), "{:?}", report.fault);
            if report.motion_state == MotionState::Idle {
                break;
            }
            ticks += 1;
            assert!(ticks < 400, "did not converge");
        }

        let angles = arm.get_all_joint_angles();
        assert!((angles[0] - 30.0).abs() < 0.1, "{:?}", angles);
        assert!((angles[1] - 45.0).abs() < 0.1, "{:?}", angles);
        assert!(arm.cartesian_error().unwrap().norm() < 0.01);

        // Stopped once on target
        assert!(arm.output.is_stationary());
    }

    #[test]
    fn test_step_bounded_by_velocity() {
        let mut arm = ArmCtrl::from_params(two_link_params(0.0, 90.0)).unwrap();
        let before = arm.end_effector_pose().unwrap();
        arm.set_target(two_link_pose(30.0, 45.0));

        let report = arm.update(0.01);
        assert_eq!(report.motion_state, MotionState::Tracking);
        assert!(report.num_substeps >= 1);

        // One tick moves at most linear_velocity_mms * dt, plus linearisation
        // error
        let moved = cartesian_delta(&before, &arm.end_effector_pose().unwrap());
        assert!(moved.norm() < 1.0 * 1.1);
        assert!(moved.norm() > 0.5);

        // Moving joints have non-zero demanded rates
        assert!(!arm.output.is_stationary());
    }

    #[test]
    fn test_rollback_on_impossible_velocity() {
        let mut params = two_link_params(0.0, 90.0);
        params.max_joint_rate_degs = 0.001;
        let mut arm = ArmCtrl::from_params(params).unwrap();
        arm.set_target(two_link_pose(30.0, 45.0));

        let before = arm.arm_config();
        let report = arm.update(0.05);

        assert!(matches!(
            report.fault,
            Some(ArmCtrlError::ImpossibleVelocity { .. })
        ));
        assert_eq!(arm.arm_config(), before);
        assert!(arm.output.is_stationary());
        assert_eq!(arm.motor(BoneId(1)).unwrap().angle_deg(), 90.0);
    }

    #[test]
    fn test_singular_fault_reported() {
        let mut params = two_link_params(0.0, 90.0);
        params.bones.truncate(1);
        let mut arm = ArmCtrl::from_params(params).unwrap();

        // Straight out along x from the base, the single joint can't get there
        arm.set_target(pose_from_xyz_rpy(&[15.0, 0.0, 0.0], &[0.0, 0.0, 0.0]));
        let before = arm.arm_config();

        let report = arm.update(0.05);
        assert_eq!(report.fault, Some(ArmCtrlError::SingularJacobian));
        assert_eq!(arm.arm_config(), before);
    }

    #[test]
    fn test_distant_target_still_moves() {
        let mut arm = ArmCtrl::from_params(two_link_params(0.0, 90.0)).unwrap();
        arm.set_target(pose_from_xyz_rpy(&[1e300, 0.0, 0.0], &[0.0, 0.0, 0.0]));
        let before = arm.arm_config();

        // The error is huge but finite, so the arm either moves towards the
        // target or reports why it can't
        let report = arm.update(0.05);
        assert!(report.error_norm.is_finite());
        assert!(report.error_norm > 1e299);
        assert_eq!(report.motion_state, MotionState::Tracking);
        if report.fault.is_none() {
            assert!(report.num_substeps > 0);
            assert_ne!(arm.arm_config(), before);
        }
    }

    #[test]
    fn test_non_finite_target_faults() {
        let mut arm = ArmCtrl::from_params(two_link_params(0.0, 90.0)).unwrap();
        let mut target = two_link_pose(30.0, 45.0);
        target[(0, 3)] = std::f64::INFINITY;
        arm.set_target(target);
        let before = arm.arm_config();

        let report = arm.update(0.05);
        assert!(matches!(
            report.fault,
            Some(ArmCtrlError::TargetOutOfRange(_))
        ));
        assert_eq!(arm.arm_config(), before);
        assert!(arm.output.is_stationary());
    }

    #[test]
    fn test_idle_without_target() {
        let mut arm = ArmCtrl::from_params(two_link_params(10.0, 20.0)).unwrap();
        arm.set_all_joint_velocities(&[5.0, -5.0]).unwrap();
        assert_eq!(arm.rates_degs, [5.0, -5.0, 0.0, 0.0, 0.0, 0.0]);

        let (output, report) = arm.proc(&InputData { dt_s: 0.1 }).unwrap();
        assert_eq!(report.motion_state, MotionState::Idle);
        assert!(report.fault.is_none());
        assert!(output.is_stationary());
        assert_eq!(output.pos_deg[&0], 10.0);
        assert_eq!(output.pos_deg[&1], 20.0);

        assert!(arm.proc(&InputData { dt_s: 0.0 }).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let mut arm = ArmCtrl::from_params(two_link_params(0.0, 0.0)).unwrap();

        assert!(matches!(
            arm.set_all_joint_angles(&[1.0]),
            Err(ArmCtrlError::InvalidArgument(_))
        ));
        assert!(matches!(
            arm.set_all_joint_velocities(&[1.0, 2.0, 3.0]),
            Err(ArmCtrlError::InvalidArgument(_))
        ));

        arm.set_all_joint_angles(&[12.0, -8.0]).unwrap();
        assert_eq!(arm.get_all_joint_angles(), vec![12.0, -8.0]);
    }

    #[test]
    fn test_unbound_joints_skipped() {
        let mut params = two_link_params(5.0, 15.0);
        params.bones[0].motor = false;
        let mut arm = ArmCtrl::from_params(params).unwrap();

        assert_eq!(arm.active_joints(), vec![BoneId(1)]);
        assert_eq!(arm.get_all_joint_angles(), vec![15.0]);
        assert_eq!(arm.active_joint_by_letter('X'), None);
        assert_eq!(arm.active_joint_by_letter('Y'), Some(BoneId(1)));
        assert_eq!(arm.estimate_jacobian().unwrap().matrix().ncols(), 1);

        arm.set_all_joint_angles(&[25.0]).unwrap();
        assert_eq!(arm.chain()[BoneId(0)].theta(), 5.0);
        assert_eq!(arm.chain()[BoneId(1)].theta(), 25.0);
    }

    #[test]
    fn test_sync_from_motors() {
        let mut params = two_link_params(0.0, 0.0);
        params.bones[1].angle_min = -30.0;
        params.bones[1].angle_max = 30.0;
        let mut arm = ArmCtrl::from_params(params).unwrap();

        arm.bind_motor(BoneId(0), Box::new(SimMotor::new(42.0)))
            .unwrap();
        arm.bind_motor(BoneId(1), Box::new(SimMotor::new(50.0)))
            .unwrap();
        assert!(arm.bind_motor(BoneId(2), Box::new(SimMotor::default())).is_err());

        let report = arm.update(0.1);
        assert_eq!(arm.chain()[BoneId(0)].theta(), 42.0);
        assert_eq!(arm.chain()[BoneId(1)].theta(), 30.0);
        assert!(report.angle_limited[1]);
        assert!(!report.angle_limited[0]);

        assert!(arm.unbind_motor(BoneId(0)).is_some());
        assert_eq!(arm.active_joints(), vec![BoneId(1)]);
    }

    #[test]
    fn test_retarget_and_safe() {
        let mut arm = ArmCtrl::from_params(two_link_params(0.0, 90.0)).unwrap();

        arm.retarget_to_end_effector();
        assert!(arm.target().is_none());

        arm.set_target(two_link_pose(30.0, 45.0));
        arm.retarget_to_end_effector();
        assert!(arm.cartesian_error().unwrap().norm() < 1e-9);
        assert_eq!(arm.update(0.1).motion_state, MotionState::Idle);

        arm.set_target(two_link_pose(30.0, 45.0));
        arm.update(0.1);
        arm.make_safe();
        assert!(arm.target().is_none());
        assert_eq!(arm.motion_state(), MotionState::Idle);
        assert!(arm.output.is_stationary());
        assert_eq!(arm.cartesian_error(), Err(ArmCtrlError::NoTarget));

        assert!(arm.set_linear_velocity(-1.0).is_err());
        assert!(arm.set_linear_velocity(25.0).is_ok());
        assert_eq!(arm.params().linear_velocity_mms, 25.0);
    }

    #[test]
    fn test_status_report_json() {
        let mut params = two_link_params(0.0, 90.0);
        params.bones.truncate(1);
        let mut arm = ArmCtrl::from_params(params).unwrap();
        arm.set_target(pose_from_xyz_rpy(&[15.0, 0.0, 0.0], &[0.0, 0.0, 0.0]));

        let json = serde_json::to_value(arm.update(0.05)).unwrap();
        assert_eq!(json["motion_state"], "Tracking");
        assert_eq!(json["fault"], "SingularJacobian");
        assert_eq!(json["num_substeps"], 0);
        assert!((json["error_norm"].as_f64().unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_restore_arm_config() {
        let mut arm = ArmCtrl::from_params(two_link_params(0.0, 0.0)).unwrap();
        let config = ArmConfig {
            angles_deg: vec![11.0, 22.0],
        };

        arm.restore_arm_config(&config).unwrap();
        assert_eq!(arm.arm_config(), config);
        assert_eq!(arm.motor(BoneId(1)).unwrap().angle_deg(), 22.0);

        assert!(arm
            .restore_arm_config(&ArmConfig {
                angles_deg: vec![1.0]
            })
            .is_err());
    }
}
