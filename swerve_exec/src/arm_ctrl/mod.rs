//! # Arm control module
//!
//! Position control of the single arm joint. The joint follows a trapezoidal
//! motion profile towards its target, with gravity, friction and velocity
//! feedforward added to a PID on the profiled position.
//!
//! The encoder reference is only trusted once the arm has been homed against
//! its limit switches, so the controller starts in `ArmMode::Homing`.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod profile;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use profile::*;
pub use state::*;

use comms_if::tc::arm_ctrl::ArmCmd;
use crate::eqpt::{Actuator, EqptError, LimitSwitch};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// All equipment owned by arm control.
pub struct ArmEqpt {
    pub actuator: Box<dyn Actuator>,

    /// Switches at the home position, any one of them triggering counts.
    pub limit_switches: Vec<Box<dyn LimitSwitch>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during ArmCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum ArmCtrlError {
    #[error("Could not configure the arm actuator: {0}")]
    ConfigFailed(EqptError),

    #[error("Lost communication with the arm actuator: {0}")]
    CommsLost(EqptError),

    #[error("Recieved an invalid arm command: {0:?}")]
    InvalidCmd(ArmCmd),

    #[error("The arm must be homed before executing {0:?}")]
    NotHomed(ArmCmd),
}
