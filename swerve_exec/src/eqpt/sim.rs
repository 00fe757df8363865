//! # Simulated equipment
//!
//! First order models of the robot's equipment, used by the executable when
//! no hardware is present and by the unit tests of every controller.
//!
//! Each simulated item is split into the equipment object, which is handed to
//! the controller owning it, and a handle sharing the same state. Handles are
//! used to step the models, inspect the demands sent to them and inject
//! faults.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::{cell::RefCell, rc::Rc};
use serde::Deserialize;

// Internal
use comms_if::eqpt::mech::{ActId, ActuatorConfig, Demand, NUM_MODULES, MODULE_IDS};
use super::{Actuator, EqptError, HeadingSensor, LimitSwitch};
use crate::{
    arm_ctrl::ArmEqpt,
    drive_ctrl::{DriveEqpt, ModuleEqpt},
    kinematics::{ChassisKinematics, ModuleState},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Nominal battery voltage used to convert voltage demands into speed.
const SIM_BATTERY_VOLTAGE_V: f64 = 12.0;

/// Distance the arm can travel past its home position before reaching the
/// hard stop.
///
/// Units: radians
const SIM_ARM_HARD_STOP_OVERTRAVEL_RAD: f64 = 0.02;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulation.
#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    /// Drive output speed at full normalised demand.
    ///
    /// Units: meters/second
    pub drive_free_speed_ms: f64,

    /// Arm output speed at full normalised demand.
    ///
    /// Units: radians/second
    pub arm_free_speed_rads: f64,

    /// Physical angle of the arm when the simulation starts. The arm encoder
    /// reads zero at this angle until the arm is homed.
    ///
    /// Units: radians
    pub arm_initial_pos_rad: f64,

    /// Voltage needed to hold the arm against gravity when it is at the
    /// angle of maximum gravity torque.
    ///
    /// Units: volts
    #[serde(default)]
    pub arm_gravity_v: f64,

    /// Physical arm angle at which gravity torque is maximal (arm
    /// horizontal).
    ///
    /// Units: radians
    #[serde(default)]
    pub arm_zero_cos_offset_rad: f64,
}

/// Internal state of a simulated actuator.
#[derive(Debug, Clone)]
pub struct SimActuatorState {
    pub id: ActId,
    pub config: Option<ActuatorConfig>,
    pub demand: Demand,

    /// Physical position of the output.
    pub true_position: f64,

    /// Offset between the encoder reading and the physical position.
    pub encoder_bias: f64,

    /// Velocity of the output.
    pub velocity: f64,

    /// Output speed at full normalised demand.
    pub free_speed: f64,

    /// Physical travel limits of the output, if any.
    pub hard_stops: Option<[f64; 2]>,

    /// `[volts, zero_cos_offset_rad]` of a gravity load opposing open loop
    /// demands, if any.
    pub gravity: Option<[f64; 2]>,

    /// If false all calls fail with `EqptError::NotConnected`.
    pub connected: bool,

    /// If true reads fail with `EqptError::StaleReading` but demands are
    /// still accepted.
    pub stale: bool,
}

/// A simulated motor controller.
pub struct SimActuator {
    state: Rc<RefCell<SimActuatorState>>,
}

/// Handle onto a simulated motor controller.
#[derive(Clone)]
pub struct SimActuatorHandle {
    state: Rc<RefCell<SimActuatorState>>,
}

#[derive(Debug, Default)]
struct SimHeadingState {
    raw_heading_rad: f64,
    zero_offset_rad: f64,
    connected: bool,
}

/// A simulated heading sensor (gyro).
pub struct SimHeading {
    state: Rc<RefCell<SimHeadingState>>,
}

/// Handle onto a simulated heading sensor.
#[derive(Clone)]
pub struct SimHeadingHandle {
    state: Rc<RefCell<SimHeadingState>>,
}

#[derive(Debug, Default)]
struct SimLimitSwitchState {
    triggered: bool,
    connected: bool,
}

/// A simulated limit switch.
pub struct SimLimitSwitch {
    state: Rc<RefCell<SimLimitSwitchState>>,
}

/// Handle onto a simulated limit switch.
#[derive(Clone)]
pub struct SimLimitSwitchHandle {
    state: Rc<RefCell<SimLimitSwitchState>>,
}

/// The full set of simulated equipment on the robot.
pub struct SimRig {
    pub drv: Vec<SimActuatorHandle>,
    pub str: Vec<SimActuatorHandle>,
    pub arm: SimActuatorHandle,
    pub heading: SimHeadingHandle,
    pub limit_switches: [SimLimitSwitchHandle; 2],

    kinematics: ChassisKinematics,
    chassis_offsets_rad: [f64; NUM_MODULES],
    arm_home_pos_rad: f64,
    arm_home_dir: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimActuator {
    /// Create a new actuator and the handle onto it.
    pub fn new(id: ActId, free_speed: f64) -> (Self, SimActuatorHandle) {
        let state = Rc::new(RefCell::new(SimActuatorState {
            id,
            config: None,
            demand: Demand::Neutral,
            true_position: 0.0,
            encoder_bias: 0.0,
            velocity: 0.0,
            free_speed,
            hard_stops: None,
            gravity: None,
            connected: true,
            stale: false,
        }));

        (
            Self { state: state.clone() },
            SimActuatorHandle { state }
        )
    }

    fn name(&self) -> String {
        format!("{:?}", self.state.borrow().id)
    }

    fn check_connected(&self) -> Result<(), EqptError> {
        match self.state.borrow().connected {
            true => Ok(()),
            false => Err(EqptError::NotConnected(self.name()))
        }
    }

    fn check_fresh(&self) -> Result<(), EqptError> {
        self.check_connected()?;
        match self.state.borrow().stale {
            true => Err(EqptError::StaleReading(self.name())),
            false => Ok(())
        }
    }
}

impl Actuator for SimActuator {
    fn id(&self) -> ActId {
        self.state.borrow().id
    }

    fn configure(&mut self, config: &ActuatorConfig) -> Result<(), EqptError> {
        self.check_connected()?;
        self.state.borrow_mut().config = Some(*config);
        Ok(())
    }

    fn set_demand(&mut self, demand: Demand) -> Result<(), EqptError> {
        self.check_connected()?;

        let mut state = self.state.borrow_mut();
        if state.config.is_none() {
            return Err(EqptError::NotConfigured(format!("{:?}", state.id)))
        }
        state.demand = demand;
        Ok(())
    }

    fn position(&self) -> Result<f64, EqptError> {
        self.check_fresh()?;
        Ok(self.state.borrow().encoder_position())
    }

    fn velocity(&self) -> Result<f64, EqptError> {
        self.check_fresh()?;
        Ok(self.state.borrow().velocity)
    }

    fn set_encoder_position(&mut self, position: f64) -> Result<(), EqptError> {
        self.check_connected()?;
        let mut state = self.state.borrow_mut();
        state.encoder_bias = position - state.true_position;
        Ok(())
    }
}

impl SimActuatorState {
    /// Position as reported by the encoder, wrapped if the actuator is
    /// configured with position wrapping.
    fn encoder_position(&self) -> f64 {
        let pos = self.true_position + self.encoder_bias;

        match self.config.and_then(|c| c.position_wrapping) {
            Some([min, max]) => min + util::maths::rem_euclid(pos - min, max - min),
            None => pos
        }
    }

    /// Advance the model by `dt` seconds.
    fn step(&mut self, dt: f64) {
        match self.demand {
            Demand::Velocity(v) => {
                self.velocity = v;
                self.true_position += v * dt;
            },
            Demand::Position(target) => {
                // Ideal servo, the output reaches the setpoint within one
                // step taking the shortest path if wrapping is enabled.
                let current = self.encoder_position();
                let delta = match self.config.and_then(|c| c.position_wrapping) {
                    Some([min, max]) => {
                        let span = max - min;
                        let d = util::maths::rem_euclid(target - current, span);
                        if d > 0.5 * span { d - span } else { d }
                    },
                    None => target - current
                };
                self.true_position += delta;
                self.velocity = if dt > 0.0 { delta / dt } else { 0.0 };
            },
            Demand::Voltage(volts) => self.step_open_loop(volts, dt),
            Demand::Normalised(power) => {
                self.step_open_loop(power.max(-1.0).min(1.0) * SIM_BATTERY_VOLTAGE_V, dt)
            },
            Demand::Neutral => {
                self.velocity = 0.0;
            }
        }

        if let Some([min, max]) = self.hard_stops {
            if self.true_position < min || self.true_position > max {
                self.true_position = self.true_position.max(min).min(max);
                self.velocity = 0.0;
            }
        }
    }

    /// Speed proportional to the voltage left once gravity is overcome.
    fn step_open_loop(&mut self, volts: f64, dt: f64) {
        let gravity_v = match self.gravity {
            Some([g, offset]) => g * (self.true_position - offset).cos(),
            None => 0.0
        };
        self.velocity = (volts - gravity_v) / SIM_BATTERY_VOLTAGE_V * self.free_speed;
        self.true_position += self.velocity * dt;
    }
}

impl SimActuatorHandle {
    /// Advance the model by `dt` seconds.
    pub fn step(&self, dt: f64) {
        self.state.borrow_mut().step(dt)
    }

    /// Get a copy of the full actuator state.
    pub fn state(&self) -> SimActuatorState {
        self.state.borrow().clone()
    }

    /// The last demand sent to the actuator.
    pub fn demand(&self) -> Demand {
        self.state.borrow().demand
    }

    /// The configuration applied to the actuator, if any.
    pub fn config(&self) -> Option<ActuatorConfig> {
        self.state.borrow().config
    }

    /// The position the encoder currently reports.
    pub fn encoder_position(&self) -> f64 {
        self.state.borrow().encoder_position()
    }

    pub fn true_position(&self) -> f64 {
        self.state.borrow().true_position
    }

    /// Move the output to a physical position, keeping the encoder bias.
    pub fn set_true_position(&self, position: f64) {
        self.state.borrow_mut().true_position = position;
    }

    pub fn set_encoder_bias(&self, bias: f64) {
        self.state.borrow_mut().encoder_bias = bias;
    }

    pub fn set_hard_stops(&self, hard_stops: Option<[f64; 2]>) {
        self.state.borrow_mut().hard_stops = hard_stops;
    }

    pub fn set_gravity(&self, gravity: Option<[f64; 2]>) {
        self.state.borrow_mut().gravity = gravity;
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().connected = connected;
    }

    pub fn set_stale(&self, stale: bool) {
        self.state.borrow_mut().stale = stale;
    }
}

impl SimHeading {
    pub fn new() -> (Self, SimHeadingHandle) {
        let state = Rc::new(RefCell::new(SimHeadingState {
            connected: true,
            ..Default::default()
        }));

        (
            Self { state: state.clone() },
            SimHeadingHandle { state }
        )
    }
}

impl HeadingSensor for SimHeading {
    fn heading_rad(&self) -> Result<f64, EqptError> {
        let state = self.state.borrow();
        match state.connected {
            true => Ok(state.raw_heading_rad - state.zero_offset_rad),
            false => Err(EqptError::NotConnected("heading sensor".into()))
        }
    }

    fn zero(&mut self) -> Result<(), EqptError> {
        let mut state = self.state.borrow_mut();
        match state.connected {
            true => {
                state.zero_offset_rad = state.raw_heading_rad;
                Ok(())
            },
            false => Err(EqptError::NotConnected("heading sensor".into()))
        }
    }
}

impl SimHeadingHandle {
    /// Physical heading of the chassis, ignoring any zeroing.
    pub fn raw_heading_rad(&self) -> f64 {
        self.state.borrow().raw_heading_rad
    }

    pub fn set_raw_heading_rad(&self, heading_rad: f64) {
        self.state.borrow_mut().raw_heading_rad = heading_rad;
    }

    pub fn rotate(&self, delta_rad: f64) {
        self.state.borrow_mut().raw_heading_rad += delta_rad;
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().connected = connected;
    }
}

impl SimLimitSwitch {
    pub fn new() -> (Self, SimLimitSwitchHandle) {
        let state = Rc::new(RefCell::new(SimLimitSwitchState {
            triggered: false,
            connected: true,
        }));

        (
            Self { state: state.clone() },
            SimLimitSwitchHandle { state }
        )
    }
}

impl LimitSwitch for SimLimitSwitch {
    fn is_triggered(&self) -> Result<bool, EqptError> {
        let state = self.state.borrow();
        match state.connected {
            true => Ok(state.triggered),
            false => Err(EqptError::NotConnected("limit switch".into()))
        }
    }
}

impl SimLimitSwitchHandle {
    pub fn set_triggered(&self, triggered: bool) {
        self.state.borrow_mut().triggered = triggered;
    }

    pub fn is_triggered(&self) -> bool {
        self.state.borrow().triggered
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.borrow_mut().connected = connected;
    }
}

impl SimRig {
    /// Build the simulated robot.
    ///
    /// Returns the rig, which keeps the handles and steps the models, along
    /// with the equipment to hand to drive and arm control.
    ///
    /// # Inputs
    /// - `params`: simulation parameters
    /// - `kinematics`: kinematics of the chassis, used to integrate heading
    /// - `chassis_offsets_rad`: mounting offset of each module
    /// - `arm_home_pos_rad`, `arm_home_dir`: the arm's home position and the
    ///   direction it moves in to reach it, where the limit switches sit
    pub fn new(
        params: &SimParams,
        kinematics: ChassisKinematics,
        chassis_offsets_rad: [f64; NUM_MODULES],
        arm_home_pos_rad: f64,
        arm_home_dir: f64,
    ) -> (Self, DriveEqpt, ArmEqpt) {
        let mut drv = Vec::with_capacity(NUM_MODULES);
        let mut str = Vec::with_capacity(NUM_MODULES);
        let mut modules = Vec::with_capacity(NUM_MODULES);

        for id in MODULE_IDS.iter() {
            let (d, dh) = SimActuator::new(id.drv_act_id(), params.drive_free_speed_ms);
            let (s, sh) = SimActuator::new(id.str_act_id(), 1.0);

            // Turn modules start pointing along their mounting offset, i.e.
            // chassis forwards
            sh.set_true_position(chassis_offsets_rad[id.index()]);

            drv.push(dh);
            str.push(sh);
            modules.push(ModuleEqpt {
                drv: Box::new(d),
                str: Box::new(s),
            });
        }

        let (heading, heading_handle) = SimHeading::new();

        let (arm, arm_handle) = SimActuator::new(ActId::ArmPivot, params.arm_free_speed_rads);
        arm_handle.set_true_position(params.arm_initial_pos_rad);
        arm_handle.set_encoder_bias(-params.arm_initial_pos_rad);
        arm_handle.set_gravity(Some([params.arm_gravity_v, params.arm_zero_cos_offset_rad]));
        let hard_stop = arm_home_pos_rad + arm_home_dir * SIM_ARM_HARD_STOP_OVERTRAVEL_RAD;
        arm_handle.set_hard_stops(Some(match arm_home_dir < 0.0 {
            true => [hard_stop, std::f64::INFINITY],
            false => [std::f64::NEG_INFINITY, hard_stop],
        }));

        let (left, left_handle) = SimLimitSwitch::new();
        let (right, right_handle) = SimLimitSwitch::new();

        let rig = Self {
            drv,
            str,
            arm: arm_handle,
            heading: heading_handle,
            limit_switches: [left_handle, right_handle],
            kinematics,
            chassis_offsets_rad,
            arm_home_pos_rad,
            arm_home_dir,
        };

        let drive_eqpt = DriveEqpt {
            modules,
            heading: Box::new(heading),
        };

        let arm_eqpt = ArmEqpt {
            actuator: Box::new(arm),
            limit_switches: vec![Box::new(left), Box::new(right)],
        };

        (rig, drive_eqpt, arm_eqpt)
    }

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        for h in self.drv.iter().chain(self.str.iter()) {
            h.step(dt);
        }

        // Chassis rotation from the module motion
        let mut states = [ModuleState::default(); NUM_MODULES];
        for i in 0..NUM_MODULES {
            states[i] = ModuleState {
                speed_ms: self.drv[i].state().velocity,
                angle_rad: self.str[i].true_position() - self.chassis_offsets_rad[i],
            };
        }
        let chassis_vel = self.kinematics.inverse(&states);
        self.heading.rotate(chassis_vel.omega_rads * dt);

        // Arm, both switches sit at the home position
        self.arm.step(dt);
        let at_home = (self.arm.true_position() - self.arm_home_pos_rad) * self.arm_home_dir >= 0.0;
        for s in self.limit_switches.iter() {
            s.set_triggered(at_home);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::eqpt::mech::ActuatorConfig;

    #[test]
    fn test_sim_actuator() {
        let (mut act, handle) = SimActuator::new(ActId::DrvFL, 4.8);

        // Must be configured first
        assert!(act.set_velocity_setpoint(1.0).is_err());
        act.configure(&ActuatorConfig::default()).unwrap();

        act.set_velocity_setpoint(2.0).unwrap();
        handle.step(0.5);
        assert!((act.position().unwrap() - 1.0).abs() < 1e-12);
        assert!((act.velocity().unwrap() - 2.0).abs() < 1e-12);

        act.set_encoder_position(0.0).unwrap();
        assert!(act.position().unwrap().abs() < 1e-12);
        assert!((handle.true_position() - 1.0).abs() < 1e-12);

        handle.set_stale(true);
        assert_eq!(
            act.position(),
            Err(EqptError::StaleReading("DrvFL".into()))
        );
        assert!(act.set_velocity_setpoint(0.0).is_ok());

        handle.set_connected(false);
        assert!(act.set_velocity_setpoint(0.0).is_err());
    }

    #[test]
    fn test_sim_wrapping() {
        let (mut act, handle) = SimActuator::new(ActId::StrFL, 1.0);
        act.configure(&ActuatorConfig {
            position_wrapping: Some([0.0, std::f64::consts::TAU]),
            ..Default::default()
        }).unwrap();

        handle.set_true_position(-0.5);
        assert!((act.position().unwrap() - (std::f64::consts::TAU - 0.5)).abs() < 1e-12);

        // Shortest path from 2pi - 0.5 to 0.5 goes through zero
        act.set_position_setpoint(0.5).unwrap();
        handle.step(0.02);
        assert!((handle.true_position() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_sim_heading() {
        let (mut heading, handle) = SimHeading::new();

        handle.set_raw_heading_rad(1.0);
        assert!((heading.heading_rad().unwrap() - 1.0).abs() < 1e-12);

        heading.zero().unwrap();
        assert!(heading.heading_rad().unwrap().abs() < 1e-12);

        handle.rotate(0.25);
        assert!((heading.heading_rad().unwrap() - 0.25).abs() < 1e-12);
    }
}
