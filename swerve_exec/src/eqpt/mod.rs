//! # Equipment module
//!
//! Capability interfaces for the hardware the control loop drives: motor
//! controllers (`Actuator`), the heading sensor and limit switches. Each
//! controller owns the equipment it writes to, so no actuator is ever written
//! by two controllers in the same cycle.
//!
//! Concrete implementations bind to real hardware or to the simulated
//! equipment in [`sim`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::mech::{ActId, ActuatorConfig, Demand};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors that can occur when talking to equipment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EqptError {
    #[error("Lost communication with {0}")]
    NotConnected(String),

    #[error("No fresh reading available from {0}")]
    StaleReading(String),

    #[error("{0} was commanded before being configured")]
    NotConfigured(String),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A motor controller with an attached encoder.
///
/// Position and velocity are in output units after the configured conversion
/// factors have been applied (meters or radians).
pub trait Actuator {
    /// The ID of the actuator, used in logs.
    fn id(&self) -> ActId;

    /// Apply the startup configuration (conversion factors, current limit,
    /// idle mode, gains and position wrapping).
    fn configure(&mut self, config: &ActuatorConfig) -> Result<(), EqptError>;

    /// Send a demand to the actuator.
    fn set_demand(&mut self, demand: Demand) -> Result<(), EqptError>;

    /// Current position of the output.
    fn position(&self) -> Result<f64, EqptError>;

    /// Current velocity of the output.
    fn velocity(&self) -> Result<f64, EqptError>;

    /// Overwrite the encoder's position reference.
    fn set_encoder_position(&mut self, position: f64) -> Result<(), EqptError>;

    /// Track a velocity with the onboard closed loop controller.
    fn set_velocity_setpoint(&mut self, velocity: f64) -> Result<(), EqptError> {
        self.set_demand(Demand::Velocity(velocity))
    }

    /// Track a position with the onboard closed loop controller.
    fn set_position_setpoint(&mut self, position: f64) -> Result<(), EqptError> {
        self.set_demand(Demand::Position(position))
    }
}

/// A sensor providing the chassis heading.
pub trait HeadingSensor {
    /// Heading in radians, anticlockwise positive.
    ///
    /// The heading is unwrapped, i.e. it is continuous and can exceed a full
    /// rotation.
    fn heading_rad(&self) -> Result<f64, EqptError>;

    /// Make the current heading the new zero.
    fn zero(&mut self) -> Result<(), EqptError>;
}

/// A debounced limit switch.
pub trait LimitSwitch {
    fn is_triggered(&self) -> Result<bool, EqptError>;
}
