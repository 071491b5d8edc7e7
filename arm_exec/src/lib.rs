//! # Arm library.
//!
//! This library allows other crates in the workspace, the executable and the
//! benchmarks to access items defined inside the arm crate.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Arm control module - kinematic chain, Jacobian and motion director
pub mod arm_ctrl;

/// Data store - global state of the executable
pub mod data_store;

/// Telecommand processor - executes text commands against the arm
pub mod tc_processor;
