//! Parameters structure for ArmCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use comms_if::{
    eqpt::mech::{ActuatorConfig, GainSet},
    tc::arm_ctrl::ArmPreset,
};
use super::FeedforwardGains;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for Arm control.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- LIMITS ----

    /// Lowest allowed joint angle.
    ///
    /// Units: radians
    pub soft_limit_reverse_rad: f64,

    /// Highest allowed joint angle.
    ///
    /// Units: radians
    pub soft_limit_forward_rad: f64,

    // ---- HOMING ----

    /// Joint angle at which the limit switches trigger.
    ///
    /// Units: radians
    pub home_pos_rad: f64,

    /// Direction of travel towards home, either -1 or +1.
    pub home_dir: f64,

    /// Normalised power used to drive towards home while homing.
    pub homing_power: f64,

    /// A limit switch trigger is ignored if the arm is moving away from home
    /// faster than this.
    ///
    /// Units: radians/second
    pub rehome_velocity_eps_rads: f64,

    // ---- CONTROL ----

    /// Joint angle at which the gravity torque is zero relative to the
    /// cosine model, i.e. the angle where the arm is horizontal.
    ///
    /// Units: radians
    pub zero_cos_offset_rad: f64,

    /// Position loop gains, output in volts.
    pub pid: GainSet,

    pub feedforward: FeedforwardGains,

    /// Units: radians/second
    pub max_vel_rads: f64,

    /// Units: radians/second^2
    pub max_accel_rads2: f64,

    /// Units: volts
    pub max_voltage_v: f64,

    /// Scaling applied to operator power in manual mode.
    pub manual_scale: f64,

    // ---- PRESETS ----

    pub presets: Presets,

    // ---- EQUIPMENT ----

    pub actuator: ActuatorConfig,
}

/// Predefined arm positions.
///
/// Units: radians
#[derive(Debug, Clone, Deserialize)]
pub struct Presets {
    pub home: f64,
    pub level: f64,
    pub high_score: f64,
    pub human_player: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Presets {
    pub fn get(&self, preset: ArmPreset) -> f64 {
        match preset {
            ArmPreset::Home => self.home,
            ArmPreset::Level => self.level,
            ArmPreset::HighScore => self.high_score,
            ArmPreset::HumanPlayer => self.human_player,
        }
    }
}

impl Params {
    /// Clamp an angle into the soft limits.
    pub fn clamp_to_soft_limits(&self, pos_rad: f64) -> f64 {
        pos_rad.max(self.soft_limit_reverse_rad).min(self.soft_limit_forward_rad)
    }
}
