//! Parameters structure for the swerve modules

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::{PI, TAU};
use serde::Deserialize;

use comms_if::eqpt::mech::{ActuatorConfig, GainSet, IdleMode};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Teeth on the wheel's bevel gear.
const BEVEL_GEAR_TEETH: f64 = 45.0;

/// Teeth on the first stage spur gear.
const FIRST_STAGE_SPUR_TEETH: f64 = 22.0;

/// Teeth on the bevel pinion.
const BEVEL_PINION_TEETH: f64 = 15.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Equipment parameters shared by all four modules.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleParams {

    // ---- DRIVE ----

    /// Diameter of the wheels.
    ///
    /// Units: meters
    pub wheel_diameter_m: f64,

    /// Number of teeth on the drive motor pinion (12, 13 or 14).
    pub drive_pinion_teeth: u32,

    /// Free spin speed of the drive motor.
    ///
    /// Units: revolutions/minute
    pub drive_motor_free_spin_rpm: f64,

    /// Drive velocity loop gains. `k_ff` is given as a fraction of full
    /// output at the wheel's free spin speed.
    pub drive_gains: GainSet,

    /// Units: amps
    pub drive_current_limit_a: f64,

    pub drive_idle_mode: IdleMode,

    // ---- TURN ----

    /// Turn position loop gains.
    pub turn_gains: GainSet,

    /// Units: amps
    pub turn_current_limit_a: f64,

    pub turn_idle_mode: IdleMode,

    /// True if the turn encoder counts in the opposite direction to the
    /// module's rotation.
    pub turn_encoder_inverted: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ModuleParams {

    /// Reduction between the drive motor and the wheel.
    pub fn drive_reduction(&self) -> f64 {
        (BEVEL_GEAR_TEETH * FIRST_STAGE_SPUR_TEETH)
            / (self.drive_pinion_teeth as f64 * BEVEL_PINION_TEETH)
    }

    /// Linear speed of the wheel when the drive motor spins freely.
    ///
    /// Units: meters/second
    pub fn drive_wheel_free_speed_ms(&self) -> f64 {
        (self.drive_motor_free_spin_rpm / 60.0) * self.wheel_diameter_m * PI
            / self.drive_reduction()
    }

    /// Configuration of the drive actuator, which works in meters and
    /// meters/second.
    pub fn drive_actuator_config(&self) -> ActuatorConfig {
        let position_conversion_factor = self.wheel_diameter_m * PI / self.drive_reduction();

        ActuatorConfig {
            current_limit_a: self.drive_current_limit_a,
            idle_mode: self.drive_idle_mode,
            encoder_inverted: false,
            position_conversion_factor,
            velocity_conversion_factor: position_conversion_factor / 60.0,
            position_wrapping: None,
            gains: GainSet {
                k_ff: self.drive_gains.k_ff / self.drive_wheel_free_speed_ms(),
                ..self.drive_gains
            },
        }
    }

    /// Configuration of the turn actuator, which works in radians and wraps
    /// over one full rotation.
    pub fn turn_actuator_config(&self) -> ActuatorConfig {
        ActuatorConfig {
            current_limit_a: self.turn_current_limit_a,
            idle_mode: self.turn_idle_mode,
            encoder_inverted: self.turn_encoder_inverted,
            position_conversion_factor: TAU,
            velocity_conversion_factor: TAU / 60.0,
            position_wrapping: Some([0.0, TAU]),
            gains: self.turn_gains,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_drive_conversions() {
        let params: ModuleParams = util::params::parse(r#"
            wheel_diameter_m = 0.0762
            drive_pinion_teeth = 12
            drive_motor_free_spin_rpm = 5676.0
            drive_current_limit_a = 24.0
            drive_idle_mode = "Brake"
            turn_current_limit_a = 12.0
            turn_idle_mode = "Brake"
            turn_encoder_inverted = true

            [drive_gains]
            k_p = 0.04
            k_i = 0.0
            k_d = 0.0
            k_ff = 1.0

            [turn_gains]
            k_p = 1.0
            k_i = 0.0
            k_d = 0.0
        "#).unwrap();

        // 990 / 180
        assert!((params.drive_reduction() - 5.5).abs() < 1e-12);

        let free_speed = 94.6 * 0.0762 * PI / 5.5;
        assert!((params.drive_wheel_free_speed_ms() - free_speed).abs() < 1e-9);

        let drv = params.drive_actuator_config();
        assert!((drv.position_conversion_factor - 0.0762 * PI / 5.5).abs() < 1e-12);
        assert!((drv.gains.k_ff - 1.0 / free_speed).abs() < 1e-12);
        assert_eq!(drv.current_limit_a, 24.0);

        let turn = params.turn_actuator_config();
        assert_eq!(turn.position_wrapping, Some([0.0, TAU]));
        assert!(turn.encoder_inverted);
        assert_eq!(turn.current_limit_a, 12.0);
    }
}
