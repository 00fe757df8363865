//! Motion profile and feedforward for the arm joint

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use util::maths::signum_or_zero;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A point along a motion profile.
#[derive(Debug, Default, Copy, Clone, PartialEq, Serialize)]
pub struct ProfileState {
    /// Units: radians
    pub pos_rad: f64,

    /// Units: radians/second
    pub vel_rads: f64,
}

/// Trapezoidal motion profile with velocity and acceleration limits.
///
/// The profile is stepped from its previous state every cycle, so the goal
/// can change at any time without a discontinuity in the setpoint.
#[derive(Debug, Clone)]
pub struct TrapezoidProfile {
    max_vel_rads: f64,
    max_accel_rads2: f64,
}

/// Gains of the arm feedforward, all in volts.
#[derive(Debug, Default, Copy, Clone, Deserialize)]
pub struct FeedforwardGains {
    /// Static friction
    pub k_s: f64,

    /// Gravity, at the angle of maximum gravity torque
    pub k_g: f64,

    /// Units: volts/(radians/second)
    pub k_v: f64,

    /// Units: volts/(radians/second^2)
    #[serde(default)]
    pub k_a: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TrapezoidProfile {
    pub fn new(max_vel_rads: f64, max_accel_rads2: f64) -> Self {
        Self {
            max_vel_rads,
            max_accel_rads2,
        }
    }

    /// Advance `current` by `dt` seconds towards a stationary goal at
    /// `goal_rad`.
    ///
    /// The full profile from `current` to the goal is planned and sampled at
    /// `dt`. A current velocity away from the goal is handled by extending
    /// the acceleration phase, so the setpoint is always continuous.
    pub fn step(&self, current: ProfileState, goal_rad: f64, dt: f64) -> ProfileState {
        let a = self.max_accel_rads2;

        // Plan in a frame where the goal is ahead
        let dir = if current.pos_rad > goal_rad { -1.0 } else { 1.0 };
        let start_pos = current.pos_rad * dir;
        let start_vel = (current.vel_rads * dir).min(self.max_vel_rads);
        let goal_pos = goal_rad * dir;

        // Time and distance needed to reach the start velocity from rest
        let cutoff_begin_s = start_vel / a;
        let cutoff_dist_begin = cutoff_begin_s * cutoff_begin_s * a / 2.0;

        let full_trap_dist = cutoff_dist_begin + (goal_pos - start_pos);
        let mut accel_time_s = self.max_vel_rads / a;
        let mut full_speed_dist = full_trap_dist - accel_time_s * accel_time_s * a;

        // Triangular profile if max velocity is never reached
        if full_speed_dist < 0.0 {
            accel_time_s = (full_trap_dist / a).sqrt();
            full_speed_dist = 0.0;
        }

        let end_accel_s = accel_time_s - cutoff_begin_s;
        let end_full_speed_s = end_accel_s + full_speed_dist / self.max_vel_rads;
        let end_decel_s = end_full_speed_s + accel_time_s;

        let (pos, vel) = if dt < end_accel_s {
            (
                start_pos + (start_vel + dt * a / 2.0) * dt,
                start_vel + dt * a
            )
        }
        else if dt < end_full_speed_s {
            (
                start_pos
                    + (start_vel + end_accel_s * a / 2.0) * end_accel_s
                    + self.max_vel_rads * (dt - end_accel_s),
                self.max_vel_rads
            )
        }
        else if dt <= end_decel_s {
            let time_left_s = end_decel_s - dt;
            (
                goal_pos - (time_left_s * a / 2.0) * time_left_s,
                time_left_s * a
            )
        }
        else {
            (goal_pos, 0.0)
        };

        ProfileState {
            pos_rad: pos * dir,
            vel_rads: vel * dir,
        }
    }
}

impl FeedforwardGains {
    /// Feedforward voltage.
    ///
    /// `pos_rad` is the measured joint angle and `zero_cos_offset_rad` the
    /// angle at which the arm is horizontal.
    pub fn calculate(
        &self,
        pos_rad: f64,
        zero_cos_offset_rad: f64,
        vel_rads: f64,
        accel_rads2: f64
    ) -> f64 {
        self.k_s * signum_or_zero(vel_rads)
            + self.k_g * (pos_rad - zero_cos_offset_rad).cos()
            + self.k_v * vel_rads
            + self.k_a * accel_rads2
    }
}
