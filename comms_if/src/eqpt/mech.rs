//! # Mechanisms Equipment Interface
//!
//! Identifiers, demands and configuration for the actuators on the robot.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of swerve modules on the chassis.
pub const NUM_MODULES: usize = 4;

/// All module IDs, in the order used for every per-module array.
pub const MODULE_IDS: [ModuleId; NUM_MODULES] = [
    ModuleId::FL,
    ModuleId::FR,
    ModuleId::RL,
    ModuleId::RR,
];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Gains for a closed loop controller.
///
/// For actuators these are run by the actuator's onboard controller, the
/// output range is normalised (-1 to +1).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GainSet {
    /// Proportional gain
    pub k_p: f64,

    /// Integral gain
    pub k_i: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Velocity feedforward gain
    #[serde(default)]
    pub k_ff: f64,

    /// Minimum output of the controller
    #[serde(default = "default_min_output")]
    pub min_output: f64,

    /// Maximum output of the controller
    #[serde(default = "default_max_output")]
    pub max_output: f64,
}

/// Configuration applied to an actuator once during startup.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ActuatorConfig {
    /// Smart current limit.
    ///
    /// Units: amps
    pub current_limit_a: f64,

    /// Behaviour of the motor when no output is demanded.
    pub idle_mode: IdleMode,

    /// Whether the encoder direction is inverted relative to the output.
    pub encoder_inverted: bool,

    /// Factor converting one encoder rotation into output position units.
    pub position_conversion_factor: f64,

    /// Factor converting encoder RPM into output velocity units.
    pub velocity_conversion_factor: f64,

    /// If set the onboard position loop treats positions as continuous over
    /// `[min, max)`, always taking the shortest path to the setpoint.
    pub position_wrapping: Option<[f64; 2]>,

    /// Gains for the onboard closed loop controller.
    pub gains: GainSet,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Corner modules of the chassis.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum ModuleId {
    /// Front left
    FL,
    /// Front right
    FR,
    /// Rear left
    RL,
    /// Rear right
    RR,
}

/// IDs of all actuators available to the robot.
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone)]
pub enum ActId {
    DrvFL,
    DrvFR,
    DrvRL,
    DrvRR,
    StrFL,
    StrFR,
    StrRL,
    StrRR,
    ArmPivot,
}

/// A demand sent to a single actuator.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub enum Demand {
    /// Closed loop velocity, in output units per second.
    Velocity(f64),

    /// Closed loop position, in output units.
    Position(f64),

    /// Open loop voltage.
    Voltage(f64),

    /// Open loop output between -1 and +1.
    Normalised(f64),

    /// No output, the motor idles in its configured idle mode.
    Neutral,
}

/// Motor behaviour when no output is demanded.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum IdleMode {
    Brake,
    Coast,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl ModuleId {
    /// Index of this module in per-module arrays.
    pub fn index(&self) -> usize {
        match self {
            ModuleId::FL => 0,
            ModuleId::FR => 1,
            ModuleId::RL => 2,
            ModuleId::RR => 3,
        }
    }

    /// The drive actuator belonging to this module.
    pub fn drv_act_id(&self) -> ActId {
        match self {
            ModuleId::FL => ActId::DrvFL,
            ModuleId::FR => ActId::DrvFR,
            ModuleId::RL => ActId::DrvRL,
            ModuleId::RR => ActId::DrvRR,
        }
    }

    /// The steer (turn) actuator belonging to this module.
    pub fn str_act_id(&self) -> ActId {
        match self {
            ModuleId::FL => ActId::StrFL,
            ModuleId::FR => ActId::StrFR,
            ModuleId::RL => ActId::StrRL,
            ModuleId::RR => ActId::StrRR,
        }
    }
}

impl Default for GainSet {
    fn default() -> Self {
        Self {
            k_p: 0.0,
            k_i: 0.0,
            k_d: 0.0,
            k_ff: 0.0,
            min_output: default_min_output(),
            max_output: default_max_output(),
        }
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            current_limit_a: 20.0,
            idle_mode: IdleMode::Brake,
            encoder_inverted: false,
            position_conversion_factor: 1.0,
            velocity_conversion_factor: 1.0,
            position_wrapping: None,
            gains: GainSet::default(),
        }
    }
}

impl Demand {
    /// The magnitude of the demand, regardless of its kind.
    pub fn value(&self) -> f64 {
        match self {
            Demand::Velocity(v)
            | Demand::Position(v)
            | Demand::Voltage(v)
            | Demand::Normalised(v) => *v,
            Demand::Neutral => 0.0,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_min_output() -> f64 {
    -1.0
}

fn default_max_output() -> f64 {
    1.0
}
