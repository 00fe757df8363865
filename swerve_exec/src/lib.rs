//! # Swerve library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to access items defined
//! inside the swerve executable crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm control module - profiled position control of the arm joint with homing
pub mod arm_ctrl;

/// Data store - state carried between cycles of the executable
pub mod data_store;

/// Drive control module - turns operator commands into module targets and tracks the pose
pub mod drive_ctrl;

/// Equipment interfaces and their simulated implementations
pub mod eqpt;

/// Swerve chassis kinematics
pub mod kinematics;

/// Pose estimation from module motion
pub mod odometry;

/// Executable parameters
pub mod params;

pub mod pid;

/// Control of a single corner module
pub mod swerve_module;

/// Telecommand processor - routes telecommands to the controllers
pub mod tc_processor;
