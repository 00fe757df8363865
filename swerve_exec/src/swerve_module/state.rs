//! Implementations for the SwerveModule structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, trace, warn};

// Internal
use super::{optimise, ModuleParams, SwerveModuleError};
use crate::{
    eqpt::{Actuator, EqptError},
    kinematics::{ModulePosition, ModuleState},
};
use comms_if::eqpt::mech::ModuleId;
use util::maths::{wrap_to_2pi, wrap_to_pi};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Controller for a single corner module.
pub struct SwerveModule {
    id: ModuleId,

    drv: Box<dyn Actuator>,
    str: Box<dyn Actuator>,

    /// Angle of the module's zero relative to chassis forwards.
    ///
    /// Units: radians
    chassis_offset_rad: f64,

    /// Last good readings, held when a read fails.
    last_turn_pos_rad: f64,
    last_drive_pos_m: f64,
    last_drive_vel_ms: f64,

    /// Last target given to the module, offset free and before optimisation.
    desired: ModuleState,

    /// Set once communication with an actuator is lost.
    faulted: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SwerveModule {

    /// Configure the module's actuators and build the controller.
    ///
    /// The drive distance is reset to zero and the current wheel angle is
    /// taken as the initial desired angle.
    pub fn new(
        id: ModuleId,
        mut drv: Box<dyn Actuator>,
        mut str: Box<dyn Actuator>,
        chassis_offset_rad: f64,
        params: &ModuleParams,
    ) -> Result<Self, SwerveModuleError> {
        let config_err = |e| SwerveModuleError::ConfigFailed(id, e);

        drv.configure(&params.drive_actuator_config()).map_err(config_err)?;
        str.configure(&params.turn_actuator_config()).map_err(config_err)?;

        let last_turn_pos_rad = str.position().map_err(config_err)?;

        let mut module = Self {
            id,
            drv,
            str,
            chassis_offset_rad,
            last_turn_pos_rad,
            last_drive_pos_m: 0.0,
            last_drive_vel_ms: 0.0,
            desired: ModuleState {
                speed_ms: 0.0,
                angle_rad: wrap_to_pi(last_turn_pos_rad - chassis_offset_rad),
            },
            faulted: false,
        };
        module.reset_position()?;

        Ok(module)
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// The last target given to the module.
    pub fn desired_state(&self) -> ModuleState {
        self.desired
    }

    /// Command the module towards a target state.
    ///
    /// Returns the optimised state actually sent to the actuators, which
    /// includes the mounting offset.
    ///
    /// If either actuator rejects its demand the module is marked as faulted
    /// and its drive is commanded to zero. A faulted module rejects all
    /// further targets.
    pub fn set_target(&mut self, target: ModuleState) -> Result<ModuleState, SwerveModuleError> {
        if self.faulted {
            self.drv.set_velocity_setpoint(0.0).ok();
            return Err(SwerveModuleError::Faulted(self.id))
        }

        let measured_rad = self.read_turn_pos();

        let corrected = ModuleState {
            speed_ms: target.speed_ms,
            angle_rad: target.angle_rad + self.chassis_offset_rad,
        };
        let optimised = optimise(corrected, measured_rad);

        trace!(
            "{:?} module target: {:.3} m/s at {:.3} rad (measured {:.3} rad)",
            self.id, optimised.speed_ms, optimised.angle_rad, measured_rad
        );

        let result = self.drv
            .set_velocity_setpoint(optimised.speed_ms)
            .and_then(|_| self.str.set_position_setpoint(wrap_to_2pi(optimised.angle_rad)));

        if let Err(e) = result {
            error!("Communication lost with the {:?} module, stopping its drive: {}", self.id, e);
            self.faulted = true;
            self.drv.set_velocity_setpoint(0.0).ok();
            return Err(SwerveModuleError::CommsLost(self.id, e))
        }

        self.desired = target;

        Ok(optimised)
    }

    /// Measured wheel speed and angle, with the mounting offset removed.
    ///
    /// The angle is in the range [-pi, pi).
    pub fn get_state(&mut self) -> ModuleState {
        if let Some(v) = self.read(|a| a.velocity(), "drive velocity") {
            self.last_drive_vel_ms = v;
        }

        ModuleState {
            speed_ms: self.last_drive_vel_ms,
            angle_rad: wrap_to_pi(self.read_turn_pos() - self.chassis_offset_rad),
        }
    }

    /// Measured drive distance and wheel angle, with the mounting offset
    /// removed.
    pub fn get_position(&mut self) -> ModulePosition {
        if let Some(d) = self.read(|a| a.position(), "drive position") {
            self.last_drive_pos_m = d;
        }

        ModulePosition {
            distance_m: self.last_drive_pos_m,
            angle_rad: wrap_to_pi(self.read_turn_pos() - self.chassis_offset_rad),
        }
    }

    /// Zero the drive distance counter. The wheel angle is not affected.
    pub fn reset_position(&mut self) -> Result<(), SwerveModuleError> {
        self.drv
            .set_encoder_position(0.0)
            .map_err(|e| SwerveModuleError::CommsLost(self.id, e))?;
        self.last_drive_pos_m = 0.0;
        Ok(())
    }

    /// Turn actuator position, holding the previous reading if no fresh one
    /// is available.
    fn read_turn_pos(&mut self) -> f64 {
        match self.str.position() {
            Ok(p) => self.last_turn_pos_rad = p,
            Err(e) => warn!(
                "{:?} module turn position unavailable, holding {:.3} rad: {}",
                self.id, self.last_turn_pos_rad, e
            )
        }
        self.last_turn_pos_rad
    }

    fn read<F>(&self, f: F, what: &str) -> Option<f64>
    where
        F: Fn(&dyn Actuator) -> Result<f64, EqptError>
    {
        match f(self.drv.as_ref()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("{:?} module {} unavailable, holding previous: {}", self.id, what, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};
    use comms_if::eqpt::mech::{Demand, IdleMode, GainSet};
    use crate::eqpt::sim::{SimActuator, SimActuatorHandle};

    fn module_params() -> ModuleParams {
        ModuleParams {
            wheel_diameter_m: 0.0762,
            drive_pinion_teeth: 12,
            drive_motor_free_spin_rpm: 5676.0,
            drive_gains: GainSet { k_p: 0.04, k_ff: 1.0, ..Default::default() },
            drive_current_limit_a: 24.0,
            drive_idle_mode: IdleMode::Brake,
            turn_gains: GainSet { k_p: 1.0, ..Default::default() },
            turn_current_limit_a: 12.0,
            turn_idle_mode: IdleMode::Brake,
            turn_encoder_inverted: true,
        }
    }

    fn module(offset: f64) -> (SwerveModule, SimActuatorHandle, SimActuatorHandle) {
        let (drv, dh) = SimActuator::new(ModuleId::FL.drv_act_id(), 4.8);
        let (str, sh) = SimActuator::new(ModuleId::FL.str_act_id(), 1.0);
        sh.set_true_position(offset);

        let m = SwerveModule::new(
            ModuleId::FL,
            Box::new(drv),
            Box::new(str),
            offset,
            &module_params()
        ).unwrap();

        (m, dh, sh)
    }

    #[test]
    fn test_configures_actuators() {
        let (_, dh, sh) = module(0.0);
        assert_eq!(dh.config().unwrap().current_limit_a, 24.0);
        assert_eq!(sh.config().unwrap().position_wrapping, Some([0.0, TAU]));
    }

    #[test]
    fn test_offset_applied_and_removed() {
        let offset = -FRAC_PI_2;
        let (mut m, dh, sh) = module(offset);

        // Module starts pointing forwards
        assert!(m.get_state().angle_rad.abs() < 1e-9);

        m.set_target(ModuleState { speed_ms: 1.0, angle_rad: 0.3 }).unwrap();
        match sh.demand() {
            Demand::Position(p) => assert!((p - wrap_to_2pi(0.3 + offset)).abs() < 1e-9),
            d => panic!("Unexpected turn demand {:?}", d)
        }
        assert_eq!(dh.demand(), Demand::Velocity(1.0));

        dh.step(0.5);
        sh.step(0.5);

        let state = m.get_state();
        assert!((state.angle_rad - 0.3).abs() < 1e-9);
        assert!((state.speed_ms - 1.0).abs() < 1e-9);

        let pos = m.get_position();
        assert!((pos.distance_m - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_flip_negates_drive() {
        let (mut m, dh, _) = module(0.0);

        let sent = m.set_target(ModuleState { speed_ms: 2.0, angle_rad: PI }).unwrap();
        assert!((sent.speed_ms + 2.0).abs() < 1e-12);
        assert_eq!(dh.demand(), Demand::Velocity(-2.0));
    }

    #[test]
    fn test_stale_reading_holds_previous() {
        let (mut m, dh, sh) = module(0.0);

        m.set_target(ModuleState { speed_ms: 1.0, angle_rad: 0.5 }).unwrap();
        dh.step(1.0);
        sh.step(1.0);
        let before = m.get_position();

        dh.set_stale(true);
        sh.set_stale(true);
        dh.step(1.0);

        let after = m.get_position();
        assert_eq!(before, after);
    }

    #[test]
    fn test_comms_loss_faults_module() {
        let (mut m, dh, sh) = module(0.0);

        m.set_target(ModuleState { speed_ms: 1.0, angle_rad: 0.0 }).unwrap();

        sh.set_connected(false);
        assert!(m.set_target(ModuleState { speed_ms: 1.0, angle_rad: 0.0 }).is_err());
        assert!(m.is_faulted());
        assert_eq!(dh.demand(), Demand::Velocity(0.0));

        // Stays faulted even when comms return
        sh.set_connected(true);
        assert!(matches!(
            m.set_target(ModuleState { speed_ms: 1.0, angle_rad: 0.0 }),
            Err(SwerveModuleError::Faulted(ModuleId::FL))
        ));
        assert_eq!(dh.demand(), Demand::Velocity(0.0));
    }

    #[test]
    fn test_new_zeroes_drive_distance() {
        let (drv, dh) = SimActuator::new(ModuleId::FL.drv_act_id(), 4.8);
        let (str, _) = SimActuator::new(ModuleId::FL.str_act_id(), 1.0);
        dh.set_true_position(3.0);

        let mut m = SwerveModule::new(
            ModuleId::FL,
            Box::new(drv),
            Box::new(str),
            0.0,
            &module_params()
        ).unwrap();

        assert!(m.get_position().distance_m.abs() < 1e-12);
        assert!((dh.true_position() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_position() {
        let (mut m, dh, _) = module(0.0);
        m.set_target(ModuleState { speed_ms: 1.0, angle_rad: 0.0 }).unwrap();
        dh.step(2.0);
        assert!((m.get_position().distance_m - 2.0).abs() < 1e-9);

        m.reset_position().unwrap();
        assert!(m.get_position().distance_m.abs() < 1e-12);
    }
}
