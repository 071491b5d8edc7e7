//! # Telecommand processor module
//!
//! The telecommand processor executes text commands against ArmCtrl and
//! publishes a response to each of them on the response bus.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use std::mem::discriminant;
use std::sync::mpsc::Receiver;

// Internal
use crate::arm_ctrl::{pose_from_xyz_rpy, xyz_rpy_from_pose, ArmCtrl, ArmCtrlError, StatusReport};
use comms_if::{
    net::ResponseBus,
    tc::{
        arm_ctrl::{find_word, format_axis_words, AxisWord},
        Tc, TcParseError, TcResponse, KW_LINEAR, KW_RAPID,
    },
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Letters of the cartesian words of a `G1` command, position then roll,
/// pitch and yaw.
const CARTESIAN_LETTERS: [char; 6] = ['X', 'Y', 'Z', 'U', 'V', 'W'];

/// Letter of the feed rate word of a `G1` command.
const FEED_LETTER: char = 'F';

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Executes telecommands and publishes their responses.
#[derive(Default)]
pub struct TcProcessor {
    bus: ResponseBus,

    /// The fault last published, so each new fault is only published once.
    last_fault: Option<ArmCtrlError>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TcProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the responses.
    pub fn subscribe(&mut self) -> Receiver<TcResponse> {
        self.bus.subscribe()
    }

    /// Parse and execute a single line of text.
    ///
    /// Blank and comment lines are skipped without a response.
    pub fn exec_line(&mut self, arm: &mut ArmCtrl, line: &str) {
        match Tc::from_line(line) {
            Ok(tc) => self.exec(arm, &tc),
            Err(TcParseError::Empty) => (),
            Err(e) => {
                warn!("Could not parse TC \"{}\": {}", line.trim(), e);
                self.publish(TcResponse::error(e));
            }
        }
    }

    /// Execute a telecommand.
    pub fn exec(&mut self, arm: &mut ArmCtrl, tc: &Tc) {
        debug!("Executing TC: {}", tc);

        let response = match exec_tc(arm, tc) {
            Ok(r) => r,
            Err(e) => {
                warn!("Could not execute TC \"{}\": {}", tc, e);
                TcResponse::error(e)
            }
        };

        self.publish(response);
    }

    /// Publish the fault in ArmCtrl's status report, if it is a new one.
    pub fn report_status(&mut self, report: &StatusReport) {
        let is_new = match (&report.fault, &self.last_fault) {
            (Some(f), Some(l)) => discriminant(f) != discriminant(l),
            (Some(_), None) => true,
            (None, _) => false,
        };

        if is_new {
            if let Some(f) = &report.fault {
                self.publish(TcResponse::error(f));
            }
        }

        self.last_fault = report.fault.clone();
    }

    fn publish(&mut self, response: TcResponse) {
        if self.bus.publish(response) == 0 {
            debug!("No subscribers to the TC response");
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn exec_tc(arm: &mut ArmCtrl, tc: &Tc) -> Result<TcResponse, ArmCtrlError> {
    match tc {
        Tc::RapidJointMove(words) => {
            for w in words {
                match arm.active_joint_by_letter(w.letter) {
                    Some(id) => {
                        arm.set_joint_angle(id, w.value)?;
                    }
                    None => debug!("No active joint '{}', word ignored", w.letter),
                }
            }

            // Stop the director from undoing the move
            arm.retarget_to_end_effector();

            Ok(TcResponse::Ok)
        }
        Tc::LinearMove(words) => {
            if let Some(f) = find_word(words, FEED_LETTER) {
                arm.set_linear_velocity(f)?;
            }

            let current = match arm.target_from_base() {
                Some(t) => t,
                None => arm.end_effector_pose_from_base()?,
            };
            let (mut xyz, mut rpy) = xyz_rpy_from_pose(&current);

            for (i, letter) in CARTESIAN_LETTERS.iter().enumerate() {
                if let Some(v) = find_word(words, *letter) {
                    match i {
                        0..=2 => xyz[i] = v,
                        _ => rpy[i - 3] = v,
                    }
                }
            }

            arm.set_target_from_base(pose_from_xyz_rpy(&xyz, &rpy));

            Ok(TcResponse::Ok)
        }
        Tc::ReportJoints => {
            let words: Vec<AxisWord> = arm
                .active_joints()
                .into_iter()
                .map(|id| AxisWord::new(arm.chain()[id].letter(), arm.chain()[id].theta()))
                .collect();

            Ok(TcResponse::OkWith(format_axis_words(KW_RAPID, &words)))
        }
        Tc::ReportPose => {
            let (xyz, rpy) = xyz_rpy_from_pose(&arm.end_effector_pose_from_base()?);

            let words: Vec<AxisWord> = CARTESIAN_LETTERS
                .iter()
                .zip(xyz.iter().chain(rpy.iter()))
                .map(|(l, v)| AxisWord::new(*l, *v))
                .collect();

            Ok(TcResponse::OkWith(format_axis_words(KW_LINEAR, &words)))
        }
        Tc::ReportJacobian => {
            let jacobian = arm.estimate_jacobian()?;

            Ok(TcResponse::OkWith(jacobian.to_string()))
        }
    }
}
