//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the arm software: the
//! text command protocol, its responses, and the structures sent to the
//! joint actuators.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod tc;

/// Command and response definitions for equipment (like mechanisms)
pub mod eqpt;

/// In-process message distribution
pub mod net;
