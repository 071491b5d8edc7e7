//! # Telecommand module
//!
//! This module provides the text command protocol used to drive the arm. A
//! telecommand (TC) is one line of space separated tokens, modelled on G-code:
//!
//! | Line                     | Meaning                                        |
//! |--------------------------|------------------------------------------------|
//! | `G0 X10 Y-45`            | Set joint angles directly (degrees)            |
//! | `G1 X100 Y0 Z50 U0 V0 W0`| Set the end effector target pose (mm, degrees) |
//! | `fk`                     | Report the joint angles as a `G0` line         |
//! | `ik`                     | Report the end effector pose as a `G1` line    |
//! | `aj`                     | Report the current Jacobian estimate           |
//!
//! Keywords are case sensitive. Responses are `Ok`, `Ok: <payload>` or
//! `Error: <reason>`.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod arm_ctrl;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// Internal
pub use arm_ctrl::AxisWord;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Keyword of the rapid joint move command.
pub const KW_RAPID: &str = "G0";

/// Keyword of the cartesian target command.
pub const KW_LINEAR: &str = "G1";

/// Keyword of the joint report command.
pub const KW_FK: &str = "fk";

/// Keyword of the end effector pose report command.
pub const KW_IK: &str = "ik";

/// Keyword of the Jacobian report command.
pub const KW_AJ: &str = "aj";

/// Lines starting with this character are comments.
pub const COMMENT_CHAR: char = ';';

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the arm by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tc {
    /// `G0`: set the angle of each joint whose letter matches a word.
    RapidJointMove(Vec<AxisWord>),

    /// `G1`: set the cartesian target of the end effector relative to the
    /// chain base.
    LinearMove(Vec<AxisWord>),

    /// `fk`: report the current joint angles.
    ReportJoints,

    /// `ik`: report the current end effector pose.
    ReportPose,

    /// `aj`: report the current Jacobian estimate.
    ReportJacobian,
}

/// Possible parsing errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TcParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command")]
    UnknownCommand(String),

    #[error("invalid token '{0}'")]
    InvalidToken(String),
}

/// Response to a telecommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TcResponse {
    /// Command accepted, nothing to report.
    Ok,

    /// Command accepted with a payload.
    OkWith(String),

    /// Command rejected or failed.
    Error(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a single line of text.
    ///
    /// Blank lines and comment lines produce `TcParseError::Empty`, which
    /// callers are expected to skip silently.
    pub fn from_line(line: &str) -> Result<Self, TcParseError> {
        let line = line.trim();

        if line.is_empty() || line.starts_with(COMMENT_CHAR) {
            return Err(TcParseError::Empty);
        }

        let mut tokens = line.split_whitespace();

        let keyword = match tokens.next() {
            Some(k) => k,
            None => return Err(TcParseError::Empty),
        };

        match keyword {
            KW_RAPID => Ok(Tc::RapidJointMove(arm_ctrl::parse_axis_words(tokens)?)),
            KW_LINEAR => Ok(Tc::LinearMove(arm_ctrl::parse_axis_words(tokens)?)),
            KW_FK => Ok(Tc::ReportJoints),
            KW_IK => Ok(Tc::ReportPose),
            KW_AJ => Ok(Tc::ReportJacobian),
            k => Err(TcParseError::UnknownCommand(k.to_string())),
        }
    }
}

impl fmt::Display for Tc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tc::RapidJointMove(words) => {
                write!(f, "{}", arm_ctrl::format_axis_words(KW_RAPID, words))
            }
            Tc::LinearMove(words) => {
                write!(f, "{}", arm_ctrl::format_axis_words(KW_LINEAR, words))
            }
            Tc::ReportJoints => write!(f, "{}", KW_FK),
            Tc::ReportPose => write!(f, "{}", KW_IK),
            Tc::ReportJacobian => write!(f, "{}", KW_AJ),
        }
    }
}

impl TcResponse {
    /// Build an error response from anything displayable.
    pub fn error<E: fmt::Display>(e: E) -> Self {
        TcResponse::Error(e.to_string())
    }

    /// True for `Ok` and `OkWith`.
    pub fn is_ok(&self) -> bool {
        !matches!(self, TcResponse::Error(_))
    }

    /// The payload of an `OkWith` response.
    pub fn payload(&self) -> Option<&str> {
        match self {
            TcResponse::OkWith(p) => Some(p.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for TcResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TcResponse::Ok => write!(f, "Ok"),
            TcResponse::OkWith(p) => write!(f, "Ok: {}", p),
            TcResponse::Error(e) => write!(f, "Error: {}", e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        assert_eq!(Tc::from_line("fk"), Ok(Tc::ReportJoints));
        assert_eq!(Tc::from_line("  ik \n"), Ok(Tc::ReportPose));
        assert_eq!(Tc::from_line("aj"), Ok(Tc::ReportJacobian));

        // Keywords are case sensitive
        assert_eq!(
            Tc::from_line("FK"),
            Err(TcParseError::UnknownCommand("FK".into()))
        );
        assert_eq!(
            Tc::from_line("g0 X1"),
            Err(TcParseError::UnknownCommand("g0".into()))
        );
    }

    #[test]
    fn test_parse_moves() {
        assert_eq!(
            Tc::from_line("G0 X10 Y-45.5"),
            Ok(Tc::RapidJointMove(vec![
                AxisWord::new('X', 10.0),
                AxisWord::new('Y', -45.5)
            ]))
        );
        assert_eq!(
            Tc::from_line("G1 X100 Z50 W-90"),
            Ok(Tc::LinearMove(vec![
                AxisWord::new('X', 100.0),
                AxisWord::new('Z', 50.0),
                AxisWord::new('W', -90.0)
            ]))
        );
        assert_eq!(Tc::from_line("G1"), Ok(Tc::LinearMove(vec![])));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Tc::from_line(""), Err(TcParseError::Empty));
        assert_eq!(Tc::from_line("; a comment"), Err(TcParseError::Empty));
        assert_eq!(
            Tc::from_line("G0 Xabc"),
            Err(TcParseError::InvalidToken("Xabc".into()))
        );
        assert_eq!(
            Tc::from_line("G1 X"),
            Err(TcParseError::InvalidToken("X".into()))
        );
        assert_eq!(
            Tc::from_line("G1 10"),
            Err(TcParseError::InvalidToken("10".into()))
        );
        assert_eq!(
            Tc::from_line("G1 XNaN"),
            Err(TcParseError::InvalidToken("XNaN".into()))
        );
    }

    #[test]
    fn test_response_format() {
        assert_eq!(TcResponse::Ok.to_string(), "Ok");
        assert_eq!(
            TcResponse::OkWith("G0 X1".into()).to_string(),
            "Ok: G0 X1"
        );
        assert_eq!(
            TcResponse::error(TcParseError::UnknownCommand("M3".into())).to_string(),
            "Error: unknown command"
        );
        assert!(TcResponse::Ok.is_ok());
        assert!(!TcResponse::Error("x".into()).is_ok());
        assert_eq!(TcResponse::OkWith("p".into()).payload(), Some("p"));
    }

    #[test]
    fn test_display_round_trip() {
        let tc = Tc::from_line("G0 X0.1 Y-90 Z12.25").unwrap();
        assert_eq!(tc.to_string(), "G0 X0.1 Y-90 Z12.25");
        assert_eq!(Tc::from_line(&tc.to_string()), Ok(tc));
    }
}
