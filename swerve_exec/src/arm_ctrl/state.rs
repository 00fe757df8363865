//! Implementations for the ArmCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use serde::Serialize;

// Internal
use super::{ArmCtrlError, ArmEqpt, Params, ProfileState, TrapezoidProfile};
use crate::{
    eqpt::{Actuator, LimitSwitch},
    pid::PidController,
};
use comms_if::{
    eqpt::mech::Demand,
    tc::arm_ctrl::ArmCmd,
};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Arm control module state
pub struct ArmCtrl {
    params: Params,

    /// Units: seconds
    cycle_period_s: f64,

    actuator: Box<dyn Actuator>,
    limit_switches: Vec<Box<dyn LimitSwitch>>,

    pid: PidController,
    profile: TrapezoidProfile,

    mode: ArmMode,

    /// True once the encoder reference has been set from a limit switch.
    homed: bool,

    /// Always within the soft limits.
    ///
    /// Units: radians
    target_rad: f64,

    /// Current point on the motion profile.
    setpoint: ProfileState,

    /// Normalised power in manual or testing mode.
    open_loop_power: f64,

    /// Last good readings, held when a read fails.
    last_pos_rad: f64,
    last_vel_rads: f64,

    /// Switch state in the previous cycle, for edge detection.
    prev_switch_triggered: bool,

    report: StatusReport,
}

/// Data required to initialise arm control.
pub struct InitData {
    pub params: Params,
    pub eqpt: ArmEqpt,

    /// Units: seconds
    pub cycle_period_s: f64,
}

#[derive(Default)]
pub struct InputData {
    /// Commands to execute this cycle, in order of arrival.
    pub cmds: Vec<ArmCmd>,
}

/// Output data of one Arm Control cycle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OutputData {
    /// Demand sent to the actuator.
    pub demand: Demand,

    pub state: ArmState,
    pub mode: ArmMode,
    pub homed: bool,

    /// Profiled setpoint in automatic mode.
    pub setpoint: ProfileState,
}

/// Status report for ArmCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// True if the output was cut to stop the arm passing a soft limit.
    pub soft_limited: bool,

    /// True if the position reference was reset by a limit switch this
    /// cycle.
    pub rehomed: bool,

    /// True if a limit switch fired while the arm was moving away from home.
    pub rehome_rejected: bool,

    /// True if the arm readings were held from a previous cycle.
    pub stale: bool,

    pub num_rejected_cmds: usize,
}

/// Measured state of the arm joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmState {
    /// Units: radians
    pub position_rad: f64,

    /// Units: radians/second
    pub velocity_rads: f64,

    /// Units: radians
    pub target_rad: f64,
}

/// Operating modes of the arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArmMode {
    /// Driving towards the limit switches, the position is not yet trusted.
    Homing,

    /// Closed loop tracking of the target along a motion profile.
    Automatic,

    /// Direct operator power within the soft limits.
    Manual,

    /// Direct power with no soft limits, for diagnostics.
    Testing,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for ArmCtrl {
    type InitData = InitData;
    type InitError = ArmCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = ArmCtrlError;

    /// Initialise the ArmCtrl module.
    ///
    /// The arm starts in `Homing`, with the target at the home position.
    fn init(init_data: Self::InitData) -> Result<Self, Self::InitError> {
        let InitData { params, eqpt, cycle_period_s } = init_data;
        let ArmEqpt { mut actuator, limit_switches } = eqpt;

        actuator.configure(&params.actuator).map_err(ArmCtrlError::ConfigFailed)?;
        let last_pos_rad = actuator.position().map_err(ArmCtrlError::ConfigFailed)?;

        info!("ArmCtrl initialised, homing required");

        Ok(Self {
            pid: PidController::new(params.pid),
            profile: TrapezoidProfile::new(params.max_vel_rads, params.max_accel_rads2),
            target_rad: params.clamp_to_soft_limits(params.home_pos_rad),
            setpoint: ProfileState {
                pos_rad: last_pos_rad,
                vel_rads: 0.0
            },
            params,
            cycle_period_s,
            actuator,
            limit_switches,
            mode: ArmMode::Homing,
            homed: false,
            open_loop_power: 0.0,
            last_pos_rad,
            last_vel_rads: 0.0,
            prev_switch_triggered: false,
            report: StatusReport::default(),
        })
    }

    /// Perform cyclic processing of Arm Control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        for cmd in input_data.cmds.iter() {
            if let Err(e) = self.handle_cmd(cmd) {
                warn!("ArmCtrl rejected command: {}", e);
                self.report.num_rejected_cmds += 1;
            }
        }

        self.read_feedback();

        // Re-home on the rising edge of either switch
        let triggered = self.poll_limit_switches();
        if triggered && !self.prev_switch_triggered {
            self.on_limit_switch();
        }
        self.prev_switch_triggered = triggered;

        let demand = match self.mode {
            ArmMode::Homing => Demand::Normalised(
                self.params.home_dir * self.params.homing_power
            ),
            ArmMode::Automatic => {
                let volts = self.calc_automatic_volts();
                Demand::Voltage(self.soft_limit(volts))
            },
            ArmMode::Manual => {
                let power = self.open_loop_power;
                Demand::Normalised(self.soft_limit(power))
            },
            ArmMode::Testing => Demand::Normalised(self.open_loop_power),
        };

        self.actuator.set_demand(demand).map_err(ArmCtrlError::CommsLost)?;

        trace!(
            "ArmCtrl: mode {:?}, pos {:.3} rad, target {:.3} rad, demand {:?}",
            self.mode, self.last_pos_rad, self.target_rad, demand
        );

        let output = OutputData {
            demand,
            state: self.get_state(),
            mode: self.mode,
            homed: self.homed,
            setpoint: self.setpoint,
        };

        Ok((output, self.report))
    }
}

impl ArmCtrl {

    /// Set the target angle, clamped into the soft limits.
    ///
    /// Does not change mode, a target set while homing or in manual is
    /// tracked once the arm returns to automatic.
    pub fn set_target(&mut self, pos_rad: f64) {
        let clamped = self.params.clamp_to_soft_limits(pos_rad);
        if clamped != pos_rad {
            debug!("Arm target {:.3} rad clamped to {:.3} rad", pos_rad, clamped);
        }
        self.target_rad = clamped;
    }

    /// Track the target along the motion profile.
    ///
    /// If the arm has not been homed it homes first and enters automatic
    /// once a limit switch fires.
    pub fn run_automatic(&mut self) {
        if !self.homed {
            if self.mode != ArmMode::Homing {
                info!("Arm not homed, homing before automatic");
            }
            self.mode = ArmMode::Homing;
            return
        }

        if self.mode != ArmMode::Automatic {
            self.enter_automatic();
        }
    }

    /// Drive the arm with operator power, within the soft limits.
    pub fn run_manual(&mut self, power: f64) -> Result<(), ArmCtrlError> {
        if !self.homed {
            return Err(ArmCtrlError::NotHomed(ArmCmd::Manual { power }))
        }

        self.mode = ArmMode::Manual;
        self.open_loop_power = power.max(-1.0).min(1.0) * self.params.manual_scale;
        Ok(())
    }

    /// Drive the arm with raw power, ignoring the soft limits.
    pub fn run_testing(&mut self, power: f64) {
        if self.mode != ArmMode::Testing {
            warn!("Arm entering testing mode, soft limits disabled");
        }
        self.mode = ArmMode::Testing;
        self.open_loop_power = power.max(-1.0).min(1.0);
    }

    /// Hold the arm where it is.
    ///
    /// A homed arm holds its measured position in automatic. An arm which
    /// has not been homed has no trusted position to hold, so its output is
    /// removed instead.
    pub fn stop(&mut self) {
        if self.homed {
            self.target_rad = self.params.clamp_to_soft_limits(self.last_pos_rad);
            self.enter_automatic();
            self.setpoint.vel_rads = 0.0;
        }
        else {
            self.mode = ArmMode::Testing;
            self.open_loop_power = 0.0;
        }
    }

    pub fn make_safe(&mut self) {
        self.stop();
    }

    /// Handle a limit switch trigger.
    ///
    /// The position reference is reset to the home angle unless the arm is
    /// moving away from home, in which case the trigger is ignored. Returns
    /// true if the arm was re-homed.
    pub fn on_limit_switch(&mut self) -> bool {
        let toward_home_rads = self.last_vel_rads * self.params.home_dir;
        if toward_home_rads < -self.params.rehome_velocity_eps_rads {
            warn!(
                "Arm limit switch triggered while moving away from home ({:.3} rad/s), ignoring",
                self.last_vel_rads
            );
            self.report.rehome_rejected = true;
            return false
        }

        if let Err(e) = self.actuator.set_encoder_position(self.params.home_pos_rad) {
            warn!("Could not reset the arm encoder reference: {}", e);
            return false
        }

        // Keep the profile at the same physical place so the command does
        // not jump with the reference
        let shift_rad = self.params.home_pos_rad - self.last_pos_rad;
        self.setpoint.pos_rad += shift_rad;
        self.last_pos_rad = self.params.home_pos_rad;
        self.report.rehomed = true;

        if !self.homed {
            info!("Arm homed at {:.3} rad", self.params.home_pos_rad);
            self.homed = true;
        }
        else {
            debug!("Arm re-homed, reference shifted by {:.4} rad", shift_rad);
        }

        if self.mode == ArmMode::Homing {
            self.enter_automatic();
        }

        true
    }

    /// The latest measured arm state.
    pub fn get_state(&self) -> ArmState {
        ArmState {
            position_rad: self.last_pos_rad,
            velocity_rads: self.last_vel_rads,
            target_rad: self.target_rad,
        }
    }

    pub fn mode(&self) -> ArmMode {
        self.mode
    }

    pub fn is_homed(&self) -> bool {
        self.homed
    }

    fn handle_cmd(&mut self, cmd: &ArmCmd) -> Result<(), ArmCtrlError> {
        debug!("ArmCtrl executing {:?}", cmd);

        match *cmd {
            ArmCmd::SetTarget { pos_rad } => {
                if !pos_rad.is_finite() {
                    return Err(ArmCtrlError::InvalidCmd(*cmd))
                }
                self.set_target(pos_rad);
            },
            ArmCmd::Preset { preset } => {
                self.set_target(self.params.presets.get(preset));
                self.run_automatic();
            },
            ArmCmd::Automatic => self.run_automatic(),
            ArmCmd::Manual { power } => {
                if !power.is_finite() {
                    return Err(ArmCtrlError::InvalidCmd(*cmd))
                }
                self.run_manual(power)?;
            },
            ArmCmd::Testing { power } => {
                if !power.is_finite() {
                    return Err(ArmCtrlError::InvalidCmd(*cmd))
                }
                self.run_testing(power);
            },
            ArmCmd::Stop => self.stop(),
        }

        Ok(())
    }

    fn enter_automatic(&mut self) {
        self.mode = ArmMode::Automatic;
        self.setpoint = ProfileState {
            pos_rad: self.last_pos_rad,
            vel_rads: self.last_vel_rads,
        };
        self.pid.reset();
    }

    fn read_feedback(&mut self) {
        match self.actuator.position() {
            Ok(p) => self.last_pos_rad = p,
            Err(e) => {
                warn!("Arm position unavailable, holding {:.3} rad: {}", self.last_pos_rad, e);
                self.report.stale = true;
            }
        }

        match self.actuator.velocity() {
            Ok(v) => self.last_vel_rads = v,
            Err(e) => {
                warn!("Arm velocity unavailable, holding previous: {}", e);
                self.report.stale = true;
            }
        }
    }

    /// True if any switch reports triggered. Switches which cannot be read
    /// count as not triggered.
    fn poll_limit_switches(&self) -> bool {
        let mut triggered = false;
        for (i, s) in self.limit_switches.iter().enumerate() {
            match s.is_triggered() {
                Ok(t) => triggered |= t,
                Err(e) => warn!("Arm limit switch {} unavailable: {}", i, e),
            }
        }
        triggered
    }

    /// Profiled PID plus feedforward, in volts.
    fn calc_automatic_volts(&mut self) -> f64 {
        let dt = self.cycle_period_s;

        let next = self.profile.step(self.setpoint, self.target_rad, dt);
        let accel_rads2 = (next.vel_rads - self.setpoint.vel_rads) / dt;
        self.setpoint = next;

        let pid_v = self.pid.calculate(next.pos_rad, self.last_pos_rad, dt);
        let ff_v = self.params.feedforward.calculate(
            self.last_pos_rad,
            self.params.zero_cos_offset_rad,
            next.vel_rads,
            accel_rads2
        );

        (pid_v + ff_v)
            .max(-self.params.max_voltage_v)
            .min(self.params.max_voltage_v)
    }

    /// Remove any output which would push the arm further past a soft limit.
    fn soft_limit(&mut self, output: f64) -> f64 {
        let past_forward = self.last_pos_rad >= self.params.soft_limit_forward_rad && output > 0.0;
        let past_reverse = self.last_pos_rad <= self.params.soft_limit_reverse_rad && output < 0.0;

        if past_forward || past_reverse {
            self.report.soft_limited = true;
            0.0
        }
        else {
            output
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::FRAC_PI_6;
    use comms_if::tc::arm_ctrl::ArmPreset;
    use crate::{
        eqpt::sim::{SimParams, SimRig},
        kinematics::{ChassisKinematics, ModuleGeometry},
    };

    const DT: f64 = 0.02;

    fn params() -> Params {
        util::params::parse(include_str!("../../../params/arm_ctrl.toml")).unwrap()
    }

    fn setup() -> (ArmCtrl, SimRig) {
        let params = params();
        let sim_params = SimParams {
            drive_free_speed_ms: 4.8,
            arm_free_speed_rads: 2.6535,
            arm_initial_pos_rad: 0.5,
            arm_gravity_v: 0.4,
            arm_zero_cos_offset_rad: -FRAC_PI_6,
        };
        let kin = ChassisKinematics::new(ModuleGeometry::rectangular(0.6731, 0.6731)).unwrap();
        let (rig, _, eqpt) = SimRig::new(
            &sim_params,
            kin,
            [0.0; 4],
            params.home_pos_rad,
            params.home_dir
        );

        let ac = ArmCtrl::init(InitData {
            params,
            eqpt,
            cycle_period_s: DT
        }).unwrap();

        (ac, rig)
    }

    fn run(
        ac: &mut ArmCtrl,
        rig: &mut SimRig,
        cmds: Vec<ArmCmd>,
        cycles: usize
    ) -> (OutputData, StatusReport) {
        let mut result = ac.proc(&InputData { cmds }).unwrap();
        rig.step(DT);
        for _ in 1..cycles {
            result = ac.proc(&InputData::default()).unwrap();
            rig.step(DT);
        }
        result
    }

    fn homed() -> (ArmCtrl, SimRig) {
        let (mut ac, mut rig) = setup();
        run(&mut ac, &mut rig, vec![ArmCmd::Automatic], 300);
        assert!(ac.is_homed());
        (ac, rig)
    }

    fn normalised_demand(out: &OutputData) -> f64 {
        match out.demand {
            Demand::Normalised(p) => p,
            d => panic!("Unexpected arm demand {:?}", d)
        }
    }

    #[test]
    fn test_init_homing() {
        let (mut ac, mut rig) = setup();
        assert_eq!(ac.mode(), ArmMode::Homing);
        assert!(rig.arm.config().is_some());

        let (out, _) = run(&mut ac, &mut rig, vec![], 1);
        assert_eq!(out.demand, Demand::Normalised(-1.0 * 0.15));
        assert!(!out.homed);
    }

    #[test]
    fn test_homing_completes() {
        let (mut ac, mut rig) = setup();

        let mut homed_cycle = None;
        for i in 0..300 {
            let (out, report) = ac.proc(&InputData::default()).unwrap();
            if report.rehomed {
                homed_cycle = Some(i);

                // Home angle reported exactly on the triggering cycle
                assert_eq!(ac.get_state().position_rad, 0.0);
                assert_eq!(rig.arm.encoder_position(), 0.0);
                assert_eq!(out.mode, ArmMode::Automatic);
                break
            }
            rig.step(DT);
        }

        assert!(homed_cycle.is_some());
        assert!(ac.is_homed());
    }

    #[test]
    fn test_target_clamped() {
        let (mut ac, _) = setup();
        let p = params();

        ac.set_target(p.soft_limit_forward_rad + 10.0);
        assert_eq!(ac.get_state().target_rad, p.soft_limit_forward_rad);

        ac.set_target(p.soft_limit_reverse_rad - 10.0);
        assert_eq!(ac.get_state().target_rad, p.soft_limit_reverse_rad);

        ac.set_target(1.0);
        assert_eq!(ac.get_state().target_rad, 1.0);
    }

    #[test]
    fn test_automatic_reaches_preset() {
        let (mut ac, mut rig) = homed();
        let p = params();

        let (out, _) = run(
            &mut ac,
            &mut rig,
            vec![ArmCmd::Preset { preset: ArmPreset::Level }],
            300
        );

        assert_eq!(out.mode, ArmMode::Automatic);
        assert!((out.state.position_rad - p.presets.level).abs() < 0.02);
        assert!((rig.arm.true_position() - p.presets.level).abs() < 0.05);
    }

    #[test]
    fn test_profile_limits_setpoint_velocity() {
        let (mut ac, mut rig) = homed();
        let p = params();

        ac.set_target(3.0);
        let mut prev_vel = 0.0;
        for _ in 0..100 {
            let (out, _) = run(&mut ac, &mut rig, vec![], 1);
            assert!(out.setpoint.vel_rads.abs() <= p.max_vel_rads + 1e-9);
            assert!((out.setpoint.vel_rads - prev_vel).abs() <= p.max_accel_rads2 * DT + 1e-6);
            prev_vel = out.setpoint.vel_rads;
        }
    }

    #[test]
    fn test_spurious_trigger_ignored() {
        let (mut ac, mut rig) = homed();

        // Moving up and away from home
        run(&mut ac, &mut rig, vec![ArmCmd::SetTarget { pos_rad: 2.0 }], 60);
        assert!(ac.get_state().velocity_rads > 0.1);

        rig.limit_switches[0].set_triggered(true);
        let before = rig.arm.encoder_position();
        let (_, report) = ac.proc(&InputData::default()).unwrap();

        assert!(report.rehome_rejected);
        assert!(!report.rehomed);
        assert_eq!(rig.arm.encoder_position(), before);
    }

    #[test]
    fn test_rehome_after_drift_keeps_command_continuous() {
        let (mut ac, mut rig) = homed();
        run(&mut ac, &mut rig, vec![ArmCmd::SetTarget { pos_rad: 1.0 }], 300);

        // Encoder slips and now reads high
        let bias = rig.arm.state().encoder_bias;
        rig.arm.set_encoder_bias(bias + 0.2);
        run(&mut ac, &mut rig, vec![], 100);

        let (mut prev_out, _) = run(&mut ac, &mut rig, vec![ArmCmd::SetTarget { pos_rad: 0.0 }], 1);
        let mut num_rehomes = 0;
        for _ in 0..300 {
            let (out, report) = ac.proc(&InputData::default()).unwrap();
            rig.step(DT);

            if report.rehomed {
                num_rehomes += 1;
                assert_eq!(out.mode, ArmMode::Automatic);
                assert_eq!(out.state.position_rad, 0.0);
                assert_eq!(out.state.target_rad, 0.0);

                // Tracking error and output carry on from the previous cycle
                let err_before = prev_out.setpoint.pos_rad - prev_out.state.position_rad;
                let err_after = out.setpoint.pos_rad - out.state.position_rad;
                assert!((err_after - err_before).abs() < 0.05, "{} -> {}", err_before, err_after);
                assert!((out.demand.value() - prev_out.demand.value()).abs() < 0.3);
            }
            prev_out = out;
        }

        assert!(num_rehomes >= 1);
        assert!((rig.arm.encoder_position() - rig.arm.true_position()).abs() < 0.02);
    }

    #[test]
    fn test_stale_encoder_holds_position() {
        let (mut ac, mut rig) = homed();
        run(&mut ac, &mut rig, vec![ArmCmd::SetTarget { pos_rad: 1.0 }], 300);
        let held = ac.get_state();

        rig.arm.set_stale(true);
        rig.arm.set_true_position(1.5);

        let (out, report) = ac.proc(&InputData::default()).unwrap();
        assert!(report.stale);
        assert_eq!(out.state.position_rad, held.position_rad);
        assert_eq!(out.state.velocity_rads, held.velocity_rads);
        assert_eq!(out.mode, ArmMode::Automatic);

        rig.arm.set_stale(false);
        let (out, report) = ac.proc(&InputData::default()).unwrap();
        assert!(!report.stale);
        assert!((out.state.position_rad - rig.arm.encoder_position()).abs() < 1e-12);
    }

    #[test]
    fn test_manual_requires_homing() {
        let (mut ac, mut rig) = setup();

        let (out, report) = run(&mut ac, &mut rig, vec![ArmCmd::Manual { power: 1.0 }], 1);
        assert_eq!(report.num_rejected_cmds, 1);
        assert_eq!(out.mode, ArmMode::Homing);
    }

    #[test]
    fn test_soft_limits_manual_but_not_testing() {
        let (mut ac, rig) = homed();
        let p = params();

        // Put the arm past the forward limit
        rig.arm.set_true_position(p.soft_limit_forward_rad + 0.1);

        let (out, report) = ac.proc(&InputData { cmds: vec![ArmCmd::Manual { power: 0.5 }] }).unwrap();
        assert_eq!(normalised_demand(&out), 0.0);
        assert!(report.soft_limited);

        let (out, report) = ac.proc(&InputData { cmds: vec![ArmCmd::Manual { power: -0.5 }] }).unwrap();
        assert!((normalised_demand(&out) + 0.5 * p.manual_scale).abs() < 1e-12);
        assert!(!report.soft_limited);

        let (out, report) = ac.proc(&InputData { cmds: vec![ArmCmd::Testing { power: 0.5 }] }).unwrap();
        assert_eq!(out.mode, ArmMode::Testing);
        assert_eq!(normalised_demand(&out), 0.5);
        assert!(!report.soft_limited);
    }

    #[test]
    fn test_stop_holds_position() {
        let (mut ac, mut rig) = homed();

        run(&mut ac, &mut rig, vec![ArmCmd::SetTarget { pos_rad: 2.0 }], 60);
        let (out, _) = run(&mut ac, &mut rig, vec![ArmCmd::Stop], 1);

        assert_eq!(out.mode, ArmMode::Automatic);
        assert!(out.state.target_rad < 2.0);

        // Settles near where it stopped
        let held = out.state.target_rad;
        let (out, _) = run(&mut ac, &mut rig, vec![], 200);
        assert!((out.state.position_rad - held).abs() < 0.1);
    }

    #[test]
    fn test_stop_unhomed_removes_output() {
        let (mut ac, mut rig) = setup();

        let (out, _) = run(&mut ac, &mut rig, vec![ArmCmd::Stop], 1);
        assert_eq!(out.mode, ArmMode::Testing);
        assert_eq!(out.demand, Demand::Normalised(0.0));
    }

    #[test]
    fn test_comms_loss_reported() {
        let (mut ac, rig) = homed();
        let held = ac.get_state();
        rig.arm.set_connected(false);

        match ac.proc(&InputData::default()) {
            Err(ArmCtrlError::CommsLost(_)) => (),
            r => panic!("Expected comms loss, got {:?}", r.map(|(o, _)| o))
        }
        assert_eq!(ac.get_state(), held);
    }
}
