//! # Swerve module control
//!
//! Closed loop control of one corner module, made of a drive actuator
//! spinning the wheel and a turn actuator steering it.
//!
//! Targets exchanged with the rest of the chassis are free of the module's
//! mounting offset. The offset is added before commanding the turn actuator
//! and removed again from every reading.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::f64::consts::{FRAC_PI_2, PI};

// Internal
pub use params::*;
pub use state::*;
use crate::{eqpt::EqptError, kinematics::ModuleState};
use comms_if::eqpt::mech::ModuleId;
use util::maths::get_ang_dist;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur while controlling a module.
#[derive(Debug, thiserror::Error)]
pub enum SwerveModuleError {
    #[error("Could not configure the {0:?} module: {1}")]
    ConfigFailed(ModuleId, EqptError),

    #[error("Lost communication with the {0:?} module: {1}")]
    CommsLost(ModuleId, EqptError),

    #[error("The {0:?} module is faulted and will not accept targets")]
    Faulted(ModuleId),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Optimise a target so the wheel never turns more than 90 degrees.
///
/// If the shortest rotation from `measured_angle_rad` to the target angle is
/// greater than 90 degrees the target is rotated by 180 degrees and its speed
/// negated, which gives the same wheel motion. A rotation of exactly 90
/// degrees is not flipped.
///
/// The returned angle is `measured_angle_rad` plus the rotation to perform,
/// so it is continuous with the measurement rather than wrapped.
pub fn optimise(target: ModuleState, measured_angle_rad: f64) -> ModuleState {
    let mut delta = get_ang_dist(measured_angle_rad, target.angle_rad);
    let mut speed_ms = target.speed_ms;

    if delta.abs() > FRAC_PI_2 {
        delta -= PI * delta.signum();
        speed_ms = -speed_ms;
    }

    ModuleState {
        speed_ms,
        angle_rad: measured_angle_rad + delta
    }
}
