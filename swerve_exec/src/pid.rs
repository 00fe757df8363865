//! # PID controller
//!
//! A discrete PID controller with output limits, used by arm control and by
//! the heading hold of drive control.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use comms_if::eqpt::mech::GainSet;
use util::maths::rem_euclid;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Gains and output limits
    gains: GainSet,

    /// If set the input is treated as continuous over `[min, max)`, and the
    /// error is always the shortest way round.
    continuous_input: Option<[f64; 2]>,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {

    /// Create a new controller with the given gains.
    pub fn new(gains: GainSet) -> Self {
        Self {
            gains,
            continuous_input: None,
            prev_error: None,
            integral: 0f64,
        }
    }

    /// Treat the input as continuous over `[min, max)`, e.g. an angle.
    pub fn with_continuous_input(mut self, min: f64, max: f64) -> Self {
        self.continuous_input = Some([min, max]);
        self
    }

    /// Get the output of the controller.
    ///
    /// `dt` is the time since the last call in seconds. The derivative is
    /// zero on the first call after creation or a reset.
    pub fn calculate(&mut self, setpoint: f64, measurement: f64, dt: f64) -> f64 {
        let error = match self.continuous_input {
            Some([min, max]) => {
                let span = max - min;
                let e = rem_euclid(setpoint - measurement, span);
                if e >= 0.5 * span { e - span } else { e }
            },
            None => setpoint - measurement
        };

        if dt > 0.0 {
            self.integral += error * dt;

            // Keep the integral contribution within the output range
            if self.gains.k_i != 0.0 {
                let lim_a = self.gains.min_output / self.gains.k_i;
                let lim_b = self.gains.max_output / self.gains.k_i;
                self.integral = self.integral.max(lim_a.min(lim_b)).min(lim_a.max(lim_b));
            }
        }

        let deriv = match (self.prev_error, dt > 0.0) {
            (Some(e), true) => (error - e) / dt,
            _ => 0f64
        };

        self.prev_error = Some(error);

        let out =
            self.gains.k_p * error
            + self.gains.k_i * self.integral
            + self.gains.k_d * deriv;

        out.max(self.gains.min_output).min(self.gains.max_output)
    }

    /// Clear the integral and derivative history.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = None;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    fn gains(k_p: f64, k_i: f64, k_d: f64) -> GainSet {
        GainSet {
            k_p,
            k_i,
            k_d,
            min_output: -12.0,
            max_output: 12.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_pid_terms() {
        let mut pid = PidController::new(gains(2.0, 0.5, 0.1));

        // First call: no derivative, integral over one step
        let out = pid.calculate(1.0, 0.0, 0.1);
        assert!((out - (2.0 + 0.5 * 0.1)).abs() < 1e-12);

        // Second call: error halves
        let out = pid.calculate(1.0, 0.5, 0.1);
        let expected = 2.0 * 0.5 + 0.5 * (0.1 + 0.05) + 0.1 * (0.5 - 1.0) / 0.1;
        assert!((out - expected).abs() < 1e-12);

        pid.reset();
        let out = pid.calculate(1.0, 0.0, 0.1);
        assert!((out - (2.0 + 0.5 * 0.1)).abs() < 1e-12);
    }

    #[test]
    fn test_pid_output_limits() {
        let mut pid = PidController::new(gains(100.0, 0.0, 0.0));
        assert_eq!(pid.calculate(1.0, 0.0, 0.02), 12.0);
        assert_eq!(pid.calculate(-1.0, 0.0, 0.02), -12.0);
    }

    #[test]
    fn test_pid_continuous_input() {
        let mut pid = PidController::new(gains(1.0, 0.0, 0.0))
            .with_continuous_input(-PI, PI);

        // From just below +pi to just above -pi is a short positive step
        let out = pid.calculate(-PI + 0.1, PI - 0.1, 0.02);
        assert!((out - 0.2).abs() < 1e-9);
    }
}
