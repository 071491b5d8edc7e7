//! Arm inverse kinematics calculations

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;

// Internal
use super::*;

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ArmCtrl {
    /// Move the end effector by the cartesian vector `v` over `dt_s` seconds.
    ///
    /// Small moves are solved in one go, larger ones are split into equal
    /// sub-moves with the Jacobian re-estimated from the pose reached by the
    /// previous one, since the linearisation only holds locally.
    ///
    /// Moves needing more than `max_substeps` sub-moves are refused before
    /// anything is solved.
    ///
    /// The move is all or nothing: on any error the arm is put back in the
    /// configuration it started in and the motors are not touched. On success
    /// every active joint's motor is given its new angle and the rate needed
    /// to reach it in `dt_s`.
    ///
    /// Returns the number of sub-moves.
    pub fn move_end_effector_in_cartesian_direction(
        &mut self,
        v: &Cartesian,
        dt_s: f64,
    ) -> Result<usize, ArmCtrlError> {
        if !(dt_s.is_finite() && dt_s > 0.0) {
            return Err(ArmCtrlError::InvalidArgument(format!(
                "move duration must be positive, got {}",
                dt_s
            )));
        }

        let segments = segment_cartesian_move(v);
        if segments.is_empty() {
            return Ok(0);
        }
        if segments.num_steps() > self.params.max_substeps {
            return Err(ArmCtrlError::TooManySubsteps {
                num_substeps: segments.num_steps(),
                max_substeps: self.params.max_substeps,
            });
        }

        let joints = self.active_joints();
        let start_deg: Vec<f64> = joints.iter().map(|id| self.chain[*id].theta()).collect();

        let snapshot = ArmConfig::of_chain(&self.chain);
        let limited_before = self.report.angle_limited;

        if let Err(e) = self.apply_sub_moves(&segments, &joints, &start_deg, dt_s) {
            snapshot.apply_to(&mut self.chain);
            self.report.angle_limited = limited_before;
            return Err(e);
        }

        // Commit to the motors
        for (id, start) in joints.iter().zip(start_deg.iter()) {
            let theta = self.chain[*id].theta();
            let rate_degs = (theta - start) / dt_s;

            self.rates_degs[id.0] = rate_degs;
            if let Some(Some(m)) = self.motors.get_mut(id.0) {
                m.set_angle_deg(theta);
                m.set_velocity_degs(rate_degs);
            }
        }

        Ok(segments.num_steps())
    }

    fn apply_sub_moves(
        &mut self,
        segments: &SegmentedMove,
        joints: &[BoneId],
        start_deg: &[f64],
        dt_s: f64,
    ) -> Result<(), ArmCtrlError> {
        for sub_move in segments.steps() {
            let jacobian = ApproxJacobian::estimate(&mut self.chain, joints)?;
            let dtheta = jacobian.joint_from_cartesian(&sub_move, self.params.singular_tolerance)?;

            trace!("ArmCtrl sub-move joint deltas: {:?}", dtheta.as_slice());

            for (k, id) in joints.iter().enumerate() {
                let new_deg = self.chain[*id].theta() + dtheta[k];

                // Rate over the whole move so far
                let rate_degs = (new_deg - start_deg[k]) / dt_s;
                if !rate_degs.is_finite() || rate_degs.abs() > self.params.max_rate_for(id.0) {
                    return Err(ArmCtrlError::ImpossibleVelocity {
                        joint: id.0,
                        rate_degs,
                    });
                }

                if self.chain[*id].set_angle_wrt_limits(new_deg) {
                    self.report.angle_limited[id.0] = true;
                }
            }
        }

        Ok(())
    }
}
