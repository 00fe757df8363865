//! # Arm control telecommands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A command that can be completed by arm control.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArmCmd {
    /// Set the target joint angle for automatic control.
    ///
    /// The target is clamped to the arm's soft limits.
    SetTarget {
        /// Joint angle in radians, measured from the home position.
        pos_rad: f64
    },

    /// Set the target to one of the predefined positions.
    Preset {
        preset: ArmPreset
    },

    /// Track the target with the profiled closed loop controller.
    Automatic,

    /// Drive the arm directly with operator power.
    Manual {
        /// Power between -1 and +1, positive moves away from home.
        power: f64
    },

    /// Open loop diagnostic drive, soft limits are not enforced.
    Testing {
        /// Power between -1 and +1.
        power: f64
    },

    /// Stop the arm, holding it at its current position.
    Stop,
}

/// Predefined arm positions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmPreset {
    /// Stowed at the home position
    Home,
    /// Parallel to the ground
    Level,
    /// High scoring position
    HighScore,
    /// Pickup from the human player station
    HumanPlayer,
}
