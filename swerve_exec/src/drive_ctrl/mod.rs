//! # Drive control module
//!
//! Converts operator drive commands into demands for the four swerve modules
//! and keeps the odometry pose estimate up to date.
//!
//! Each cycle runs, in order: command mapping, kinematics, the four module
//! controllers and then odometry.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod mapper;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use mapper::*;
pub use params::*;
pub use state::*;

use comms_if::tc::drive_ctrl::DriveCmd;
use crate::{
    eqpt::{Actuator, HeadingSensor},
    kinematics::KinematicsError,
    swerve_module::SwerveModuleError,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The actuators belonging to one module.
pub struct ModuleEqpt {
    pub drv: Box<dyn Actuator>,
    pub str: Box<dyn Actuator>,
}

/// All equipment owned by drive control.
pub struct DriveEqpt {
    /// One entry per module, in `MODULE_IDS` order.
    pub modules: Vec<ModuleEqpt>,
    pub heading: Box<dyn HeadingSensor>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during DriveCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum DriveCtrlError {
    #[error("Expected equipment for {expected} modules, found {found}")]
    WrongNumberOfModules {
        expected: usize,
        found: usize
    },

    #[error("Could not initialise a module: {0}")]
    ModuleInitError(SwerveModuleError),

    #[error("Kinematics error: {0}")]
    KinematicsError(KinematicsError),

    #[error("Recieved an invalid drive command: {0:?}")]
    InvalidCmd(DriveCmd),
}
