//! Operator command mapping
//!
//! Turns normalised operator axes into a chassis velocity.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::Params;
use crate::kinematics::ChassisVelocity;
use comms_if::tc::drive_ctrl::VirtualGear;
use util::maths::apply_deadband;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Raw operator axes, each between -1 and +1.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAxes {
    /// Forwards
    pub x: f64,
    /// Left
    pub y: f64,
    /// Anticlockwise
    pub rot: f64,
}

/// Limits the rate of change of a signal.
#[derive(Debug, Clone)]
pub struct SlewRateLimiter {
    /// Units: signal units/second
    rate_per_s: f64,

    prev: f64,
}

/// Shapes operator axes into a chassis velocity.
#[derive(Debug, Clone)]
pub struct ChassisCommandMapper {
    max_linear_speed_ms: f64,
    max_angular_speed_rads: f64,
    deadband: f64,
    low_gear_rate: f64,
    high_gear_rate: f64,

    rot_limiter: SlewRateLimiter,

    /// Units: seconds
    cycle_period_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SlewRateLimiter {
    pub fn new(rate_per_s: f64) -> Self {
        Self {
            rate_per_s,
            prev: 0.0
        }
    }

    /// Move towards `input` by at most `rate_per_s * dt`.
    pub fn calculate(&mut self, input: f64, dt: f64) -> f64 {
        let max_step = self.rate_per_s * dt;
        self.prev += (input - self.prev).max(-max_step).min(max_step);
        self.prev
    }

    /// Jump straight to `value`.
    pub fn reset(&mut self, value: f64) {
        self.prev = value;
    }
}

impl ChassisCommandMapper {
    pub fn new(params: &Params, cycle_period_s: f64) -> Self {
        Self {
            max_linear_speed_ms: params.max_linear_speed_ms,
            max_angular_speed_rads: params.max_angular_speed_rads,
            deadband: params.deadband,
            low_gear_rate: params.low_gear_rate,
            high_gear_rate: params.high_gear_rate,
            rot_limiter: SlewRateLimiter::new(
                params.rot_slew_rate * params.max_angular_speed_rads
            ),
            cycle_period_s,
        }
    }

    /// Map operator axes to a chassis velocity.
    ///
    /// 1. Axes inside the deadband snap to zero, the rest pass unscaled.
    /// 2. Translation is scaled by the max linear speed and the gear's rate,
    ///    rotation by the max angular speed.
    /// 3. If `field_relative` the translation is rotated by `-heading_rad`,
    ///    so operator forwards is always field forwards.
    /// 4. Rotation is slew rate limited.
    pub fn map(
        &mut self,
        axes: &RawAxes,
        field_relative: bool,
        gear: VirtualGear,
        heading_rad: f64
    ) -> ChassisVelocity {
        let x = apply_deadband(axes.x, self.deadband);
        let y = apply_deadband(axes.y, self.deadband);
        let rot = apply_deadband(axes.rot, self.deadband);

        let gear_rate = match gear {
            VirtualGear::Low => self.low_gear_rate,
            VirtualGear::High => self.high_gear_rate,
        };
        let mut vx_ms = x * self.max_linear_speed_ms * gear_rate;
        let mut vy_ms = y * self.max_linear_speed_ms * gear_rate;
        let omega_rads = rot * self.max_angular_speed_rads;

        if field_relative {
            let (sin_h, cos_h) = heading_rad.sin_cos();
            let vx_field = vx_ms;
            vx_ms = vx_field * cos_h + vy_ms * sin_h;
            vy_ms = -vx_field * sin_h + vy_ms * cos_h;
        }

        ChassisVelocity {
            vx_ms,
            vy_ms,
            omega_rads: self.rot_limiter.calculate(omega_rads, self.cycle_period_s),
        }
    }

    /// True if the rotation axis is outside the deadband.
    pub fn rot_active(&self, axes: &RawAxes) -> bool {
        apply_deadband(axes.rot, self.deadband) != 0.0
    }

    /// Set the output of the rotation limiter, e.g. to zero on stop or to the
    /// rate another controller was commanding.
    pub fn reset_rotation(&mut self, omega_rads: f64) {
        self.rot_limiter.reset(omega_rads);
    }

    pub fn max_angular_speed_rads(&self) -> f64 {
        self.max_angular_speed_rads
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, TAU};

    const DT: f64 = 0.02;

    fn mapper() -> ChassisCommandMapper {
        ChassisCommandMapper {
            max_linear_speed_ms: 4.8,
            max_angular_speed_rads: TAU,
            deadband: 0.05,
            low_gear_rate: 0.66,
            high_gear_rate: 1.0,
            rot_limiter: SlewRateLimiter::new(2.0 * TAU),
            cycle_period_s: DT,
        }
    }

    fn axes(x: f64, y: f64, rot: f64) -> RawAxes {
        RawAxes { x, y, rot }
    }

    #[test]
    fn test_full_forward_low_gear() {
        let v = mapper().map(&axes(1.0, 0.0, 0.0), true, VirtualGear::Low, 0.0);
        assert!((v.vx_ms - 4.8 * 0.66).abs() < 1e-12);
        assert_eq!(v.vy_ms, 0.0);
        assert_eq!(v.omega_rads, 0.0);

        let v = mapper().map(&axes(1.0, 0.0, 0.0), true, VirtualGear::High, 0.0);
        assert!((v.vx_ms - 4.8).abs() < 1e-12);
    }

    #[test]
    fn test_deadband_does_not_rescale() {
        let mut m = mapper();

        let v = m.map(&axes(0.04, -0.049, 0.0), false, VirtualGear::High, 0.0);
        assert_eq!(v.vx_ms, 0.0);
        assert_eq!(v.vy_ms, 0.0);

        let v = m.map(&axes(0.05, -0.5, 0.0), false, VirtualGear::High, 0.0);
        assert!((v.vx_ms - 0.05 * 4.8).abs() < 1e-12);
        assert!((v.vy_ms + 0.5 * 4.8).abs() < 1e-12);
    }

    #[test]
    fn test_field_relative_zero_heading_matches_robot_relative() {
        let inputs = [
            axes(0.3, -0.7, 0.0),
            axes(-1.0, 1.0, 0.5),
            axes(0.06, 0.0, -0.2),
        ];

        for a in inputs.iter() {
            let fr = mapper().map(a, true, VirtualGear::Low, 0.0);
            let rr = mapper().map(a, false, VirtualGear::Low, 0.0);
            assert_eq!(fr, rr);
        }
    }

    #[test]
    fn test_field_relative_rotation() {
        // Robot facing field left, field forwards is to the robot's right
        let v = mapper().map(&axes(1.0, 0.0, 0.0), true, VirtualGear::High, FRAC_PI_2);
        assert!(v.vx_ms.abs() < 1e-12);
        assert!((v.vy_ms + 4.8).abs() < 1e-12);

        // Heading ignored when robot relative
        let v = mapper().map(&axes(1.0, 0.0, 0.0), false, VirtualGear::High, FRAC_PI_2);
        assert!((v.vx_ms - 4.8).abs() < 1e-12);
    }

    #[test]
    fn test_rotation_slew_limited() {
        let mut m = mapper();
        let max_step = 2.0 * TAU * DT;

        // Settle at full negative rotation
        let mut prev = 0.0;
        for _ in 0..100 {
            let v = m.map(&axes(0.0, 0.0, -1.0), false, VirtualGear::Low, 0.0);
            assert!((v.omega_rads - prev).abs() <= max_step + 1e-12);
            prev = v.omega_rads;
        }
        assert!((prev + TAU).abs() < 1e-9);

        // Step straight to full positive rotation
        for _ in 0..100 {
            let v = m.map(&axes(0.0, 0.0, 1.0), false, VirtualGear::Low, 0.0);
            assert!((v.omega_rads - prev).abs() <= max_step + 1e-12);
            prev = v.omega_rads;
        }
        assert!((prev - TAU).abs() < 1e-9);
    }
}
