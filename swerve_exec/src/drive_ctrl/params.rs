//! Parameters structure for DriveCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use comms_if::eqpt::mech::{GainSet, NUM_MODULES};
use crate::{kinematics::ModuleGeometry, swerve_module::ModuleParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Drive control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- CAPABILITIES ----

    /// Chassis translation speed at full operator input in high gear.
    ///
    /// Units: meters/second
    pub max_linear_speed_ms: f64,

    /// Chassis rotation speed at full operator input.
    ///
    /// Units: radians/second
    pub max_angular_speed_rads: f64,

    /// Maximum speed of any one wheel.
    ///
    /// Units: meters/second
    pub max_module_speed_ms: f64,

    // ---- COMMAND SHAPING ----

    /// Operator axis values with a magnitude below this are treated as zero.
    pub deadband: f64,

    /// Rate multiplier of the low virtual gear.
    pub low_gear_rate: f64,

    /// Rate multiplier of the high virtual gear.
    pub high_gear_rate: f64,

    /// Maximum rate of change of the rotation command, as a fraction of
    /// `max_angular_speed_rads` per second.
    ///
    /// Units: 1/second
    pub rot_slew_rate: f64,

    // ---- GEOMETRY ----

    pub geometry: ModuleGeometry,

    /// Angle of each module's zero relative to chassis forwards, in
    /// `MODULE_IDS` order.
    ///
    /// Units: radians
    pub chassis_offsets_rad: [f64; NUM_MODULES],

    // ---- MODULES ----

    pub module: ModuleParams,

    // ---- HEADING HOLD ----

    /// Gains of the heading hold controller, output in radians/second. The
    /// output is also limited to `max_angular_speed_rads`.
    pub heading_hold_gains: GainSet,

    // ---- NUDGE ----

    /// Units: meters/second
    pub nudge_speed_ms: f64,

    /// Units: seconds
    pub nudge_duration_s: f64,
}

