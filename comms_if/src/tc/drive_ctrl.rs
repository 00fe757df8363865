//! # Drive control telecommands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Serialize, Deserialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command that can be executed by drive control.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum DriveCmd {
    /// Drive the chassis from normalised operator axes.
    ///
    /// The command is held until a new one replaces it.
    Drive {
        /// Forward axis, between -1 and +1. Positive is forwards.
        x: f64,

        /// Lateral axis, between -1 and +1. Positive is to the left.
        y: f64,

        /// Rotational axis, between -1 and +1. Positive is anticlockwise
        /// (right hand rule about the chassis Z+ axis).
        rot: f64,

        /// If true `x` and `y` are interpreted in the field frame rather than
        /// the chassis frame.
        field_relative: bool,
    },

    /// Stop the chassis, holding the current module angles but setting all drive speeds to zero.
    Stop,

    /// Lock the chassis in place by pointing all wheels into an X.
    XFormation,

    /// Change the virtual gear.
    SetGear {
        gear: VirtualGear
    },

    /// Rotate the chassis to, and hold, an absolute field heading.
    ///
    /// Translation from the last `Drive` command continues while the heading is held.
    RotateTo {
        /// The field heading to hold in radians, anticlockwise from field forwards.
        heading_rad: f64
    },

    /// Briefly move the chassis in a direction relative to itself.
    Nudge {
        direction: NudgeDirection
    },

    /// Zero the heading sensor, making the current chassis forwards the new field forwards.
    ResetHeading,

    /// Overwrite the odometry pose estimate.
    ResetPose {
        x_m: f64,
        y_m: f64,
        heading_rad: f64,
    },
}

/// Software speed scaling mimicking a gearbox.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VirtualGear {
    Low,
    High
}

/// Directions for a nudge, relative to the chassis.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NudgeDirection {
    Forward,
    Backward,
    Left,
    Right
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl Default for VirtualGear {
    fn default() -> Self {
        VirtualGear::Low
    }
}

impl NudgeDirection {
    /// Unit vector of the direction in the chassis frame, as `(x, y)`.
    pub fn unit_vector(&self) -> (f64, f64) {
        match self {
            NudgeDirection::Forward => (1.0, 0.0),
            NudgeDirection::Backward => (-1.0, 0.0),
            NudgeDirection::Left => (0.0, 1.0),
            NudgeDirection::Right => (0.0, -1.0),
        }
    }
}
