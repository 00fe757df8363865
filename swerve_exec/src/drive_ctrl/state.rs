//! Implementations for the DriveCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use serde::Serialize;

// Internal
use super::{
    ChassisCommandMapper, DriveCtrlError, DriveEqpt, Params, RawAxes,
};
use crate::{
    eqpt::HeadingSensor,
    kinematics::{desaturate, ChassisKinematics, ChassisVelocity, ModulePosition, ModuleState},
    odometry::{ChassisOdometry, Pose2D},
    pid::PidController,
    swerve_module::{SwerveModule, SwerveModuleError},
};
use comms_if::{
    eqpt::mech::{GainSet, MODULE_IDS, NUM_MODULES},
    tc::drive_ctrl::{DriveCmd, NudgeDirection, VirtualGear},
};
use util::{maths::wrap_to_pi, module::State};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive control module state
pub struct DriveCtrl {
    params: Params,

    /// Units: seconds
    cycle_period_s: f64,

    kinematics: ChassisKinematics,
    mapper: ChassisCommandMapper,
    modules: Vec<SwerveModule>,
    heading_sensor: Box<dyn HeadingSensor>,
    odometry: ChassisOdometry,
    heading_pid: PidController,

    mode: DriveMode,
    gear: VirtualGear,

    /// The persisted operator drive command, `None` means stopped.
    drive_cmd: Option<DriveInput>,

    /// Field heading being held, if any.
    ///
    /// Units: radians
    heading_hold_rad: Option<f64>,

    nudge: Option<ActiveNudge>,

    /// Angles of the last module targets, held when a module is asked for
    /// zero speed.
    prev_angles_rad: [f64; NUM_MODULES],

    /// Last good heading sensor reading.
    ///
    /// Units: radians
    last_heading_rad: f64,

    report: StatusReport,
}

/// Data required to initialise drive control.
pub struct InitData {
    pub params: Params,
    pub eqpt: DriveEqpt,

    /// Period of the control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,
}

/// Input data to Drive Control.
#[derive(Default)]
pub struct InputData {
    /// Commands to execute this cycle, in order of arrival.
    pub cmds: Vec<DriveCmd>,
}

/// Output data of one Drive Control cycle.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OutputData {
    pub mode: DriveMode,
    pub gear: VirtualGear,

    /// Chassis velocity demanded this cycle.
    pub chassis_vel: ChassisVelocity,

    /// Chassis velocity measured from the modules at the start of the cycle.
    pub measured_vel: ChassisVelocity,

    /// Offset free targets given to each module.
    pub module_targets: [ModuleState; NUM_MODULES],

    /// Pose estimate after this cycle.
    pub pose: Pose2D,
}

/// Status report for DriveCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// Modules which failed to accept their target.
    pub module_faulted: [bool; NUM_MODULES],

    /// True if the module speeds had to be scaled down.
    pub desaturated: bool,

    /// True if the heading sensor reading was held from a previous cycle.
    pub heading_stale: bool,

    /// Number of commands rejected this cycle.
    pub num_rejected_cmds: usize,

    pub heading_hold_active: bool,
    pub nudge_active: bool,
}

/// Operating modes of the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriveMode {
    /// Following operator commands.
    Drive,

    /// Wheels in an X formation, the chassis resists being pushed.
    Locked,
}

#[derive(Debug, Clone, Copy)]
struct DriveInput {
    axes: RawAxes,
    field_relative: bool,
}

#[derive(Debug, Clone, Copy)]
struct ActiveNudge {
    direction: NudgeDirection,
    remaining_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for DriveCtrl {
    type InitData = InitData;
    type InitError = DriveCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = DriveCtrlError;

    /// Initialise the DriveCtrl module.
    ///
    /// Configures every module's actuators and resets their drive distances.
    fn init(init_data: Self::InitData) -> Result<Self, Self::InitError> {
        let InitData { params, eqpt, cycle_period_s } = init_data;

        if eqpt.modules.len() != NUM_MODULES {
            return Err(DriveCtrlError::WrongNumberOfModules {
                expected: NUM_MODULES,
                found: eqpt.modules.len()
            })
        }

        let kinematics = ChassisKinematics::new(params.geometry.clone())
            .map_err(DriveCtrlError::KinematicsError)?;

        let mut modules = Vec::with_capacity(NUM_MODULES);
        for (id, m) in MODULE_IDS.iter().zip(eqpt.modules.into_iter()) {
            modules.push(SwerveModule::new(
                *id,
                m.drv,
                m.str,
                params.chassis_offsets_rad[id.index()],
                &params.module
            ).map_err(DriveCtrlError::ModuleInitError)?);
        }

        let mut prev_angles_rad = [0f64; NUM_MODULES];
        for (a, m) in prev_angles_rad.iter_mut().zip(modules.iter()) {
            *a = m.desired_state().angle_rad;
        }

        let last_heading_rad = match eqpt.heading.heading_rad() {
            Ok(h) => h,
            Err(e) => {
                warn!("No heading available during DriveCtrl init, assuming zero: {}", e);
                0.0
            }
        };

        let heading_pid = PidController::new(GainSet {
            min_output: -params.max_angular_speed_rads,
            max_output: params.max_angular_speed_rads,
            ..params.heading_hold_gains
        }).with_continuous_input(-std::f64::consts::PI, std::f64::consts::PI);

        Ok(Self {
            mapper: ChassisCommandMapper::new(&params, cycle_period_s),
            odometry: ChassisOdometry::new(kinematics.clone(), Pose2D::default()),
            kinematics,
            modules,
            heading_sensor: eqpt.heading,
            heading_pid,
            params,
            cycle_period_s,
            mode: DriveMode::Drive,
            gear: VirtualGear::default(),
            drive_cmd: None,
            heading_hold_rad: None,
            nudge: None,
            prev_angles_rad,
            last_heading_rad,
            report: StatusReport::default(),
        })
    }

    /// Perform cyclic processing of Drive Control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        self.report = StatusReport::default();

        // Commands take effect at the start of the cycle
        for cmd in input_data.cmds.iter() {
            if let Err(e) = self.handle_cmd(cmd) {
                warn!("DriveCtrl rejected command: {}", e);
                self.report.num_rejected_cmds += 1;
            }
        }

        self.read_heading();
        let measured_vel = self.measured_chassis_vel();

        let (chassis_vel, targets) = match self.mode {
            DriveMode::Locked => (ChassisVelocity::default(), self.kinematics.x_formation()),
            DriveMode::Drive => {
                let vel = self.calc_chassis_vel();
                let mut targets = self.kinematics
                    .forward(&vel, &self.prev_angles_rad)
                    .map_err(DriveCtrlError::KinematicsError)?;
                self.report.desaturated = desaturate(&mut targets, self.params.max_module_speed_ms);
                (vel, targets)
            }
        };

        // Command the modules, a failure only affects the module concerned
        for (i, module) in self.modules.iter_mut().enumerate() {
            match module.set_target(targets[i]) {
                Ok(_) => (),
                Err(SwerveModuleError::Faulted(_)) => {
                    self.report.module_faulted[i] = true;
                },
                Err(e) => {
                    warn!("{}", e);
                    self.report.module_faulted[i] = true;
                }
            }
        }

        for (a, t) in self.prev_angles_rad.iter_mut().zip(targets.iter()) {
            *a = t.angle_rad;
        }

        // Odometry
        let mut positions = [ModulePosition::default(); NUM_MODULES];
        for (p, m) in positions.iter_mut().zip(self.modules.iter_mut()) {
            *p = m.get_position();
        }
        let pose = self.odometry.update(&positions, self.last_heading_rad);

        trace!(
            "DriveCtrl: mode {:?}, vel {:?}, pose {:?}",
            self.mode, chassis_vel, pose
        );

        let output = OutputData {
            mode: self.mode,
            gear: self.gear,
            chassis_vel,
            measured_vel,
            module_targets: targets,
            pose,
        };

        Ok((output, self.report))
    }
}

impl DriveCtrl {

    /// Change the virtual gear.
    pub fn set_virtual_gear(&mut self, gear: VirtualGear) {
        if gear != self.gear {
            debug!("Virtual gear set to {:?}", gear);
        }
        self.gear = gear;
    }

    /// Lock the chassis by pointing all wheels into an X.
    ///
    /// The chassis stays locked until a new `Drive` command is received.
    pub fn wheels_to_x_formation(&mut self) {
        if self.mode != DriveMode::Locked {
            info!("Chassis locked in X formation");
        }
        self.mode = DriveMode::Locked;
        self.clear_motion();
    }

    /// Stop the chassis, holding the current module angles.
    pub fn stop(&mut self) {
        self.clear_motion();
    }

    /// Put the chassis into a safe state.
    pub fn make_safe(&mut self) {
        self.wheels_to_x_formation();
    }

    /// Overwrite the odometry pose estimate.
    pub fn reset_pose(&mut self, pose: Pose2D) {
        self.odometry.reset(pose);
    }

    /// Zero the heading sensor, making the current chassis forwards the new
    /// field forwards.
    ///
    /// The pose estimate keeps its heading.
    pub fn reset_heading(&mut self) {
        match self.heading_sensor.zero() {
            Ok(_) => {
                info!("Heading sensor zeroed");
                self.last_heading_rad = 0.0;
            },
            Err(e) => warn!("Could not zero the heading sensor: {}", e)
        }

        // A held heading was in the old frame
        self.heading_hold_rad = None;
        self.odometry.rebase();
    }

    pub fn pose(&self) -> Pose2D {
        self.odometry.pose()
    }

    pub fn mode(&self) -> DriveMode {
        self.mode
    }

    pub fn gear(&self) -> VirtualGear {
        self.gear
    }

    fn handle_cmd(&mut self, cmd: &DriveCmd) -> Result<(), DriveCtrlError> {
        debug!("DriveCtrl command: {:?}", cmd);

        match *cmd {
            DriveCmd::Drive { x, y, rot, field_relative } => {
                if !(x.is_finite() && y.is_finite() && rot.is_finite()) {
                    return Err(DriveCtrlError::InvalidCmd(*cmd))
                }

                if self.mode != DriveMode::Drive {
                    info!("Chassis unlocked");
                }
                self.mode = DriveMode::Drive;
                self.drive_cmd = Some(DriveInput {
                    axes: RawAxes {
                        x: x.max(-1.0).min(1.0),
                        y: y.max(-1.0).min(1.0),
                        rot: rot.max(-1.0).min(1.0),
                    },
                    field_relative
                });
            },
            DriveCmd::Stop => self.stop(),
            DriveCmd::XFormation => self.wheels_to_x_formation(),
            DriveCmd::SetGear { gear } => self.set_virtual_gear(gear),
            DriveCmd::RotateTo { heading_rad } => {
                if !heading_rad.is_finite() {
                    return Err(DriveCtrlError::InvalidCmd(*cmd))
                }
                self.heading_hold_rad = Some(wrap_to_pi(heading_rad));
                self.heading_pid.reset();
            },
            DriveCmd::Nudge { direction } => {
                if self.mode == DriveMode::Locked {
                    return Err(DriveCtrlError::InvalidCmd(*cmd))
                }
                self.nudge = Some(ActiveNudge {
                    direction,
                    remaining_s: self.params.nudge_duration_s
                });
            },
            DriveCmd::ResetHeading => self.reset_heading(),
            DriveCmd::ResetPose { x_m, y_m, heading_rad } => {
                if !(x_m.is_finite() && y_m.is_finite() && heading_rad.is_finite()) {
                    return Err(DriveCtrlError::InvalidCmd(*cmd))
                }
                self.reset_pose(Pose2D::new(x_m, y_m, heading_rad));
            }
        }

        Ok(())
    }

    /// Chassis velocity from the measured module states.
    fn measured_chassis_vel(&mut self) -> ChassisVelocity {
        let mut states = [ModuleState::default(); NUM_MODULES];
        for (s, m) in states.iter_mut().zip(self.modules.iter_mut()) {
            *s = m.get_state();
        }
        self.kinematics.inverse(&states)
    }

    /// Read the heading sensor, holding the previous reading on failure.
    fn read_heading(&mut self) {
        match self.heading_sensor.heading_rad() {
            Ok(h) if h.is_finite() => self.last_heading_rad = h,
            Ok(h) => {
                warn!("Heading sensor returned {}, holding {:.3} rad", h, self.last_heading_rad);
                self.report.heading_stale = true;
            },
            Err(e) => {
                warn!("Heading unavailable, holding {:.3} rad: {}", self.last_heading_rad, e);
                self.report.heading_stale = true;
            }
        }
    }

    /// Chassis velocity demanded in `DriveMode::Drive`.
    fn calc_chassis_vel(&mut self) -> ChassisVelocity {
        // Nudges override operator input until they time out
        if let Some(mut nudge) = self.nudge {
            let (ux, uy) = nudge.direction.unit_vector();
            nudge.remaining_s -= self.cycle_period_s;
            self.nudge = match nudge.remaining_s > 1e-9 {
                true => Some(nudge),
                false => None
            };
            self.report.nudge_active = true;
            self.mapper.reset_rotation(0.0);

            return ChassisVelocity::new(
                ux * self.params.nudge_speed_ms,
                uy * self.params.nudge_speed_ms,
                0.0
            )
        }

        let (axes, field_relative) = match self.drive_cmd {
            Some(d) => (d.axes, d.field_relative),
            None => (RawAxes::default(), false)
        };

        // Operator rotation cancels the heading hold
        if self.heading_hold_rad.is_some() && self.mapper.rot_active(&axes) {
            debug!("Heading hold cancelled by operator rotation");
            self.heading_hold_rad = None;
        }

        let mut vel = self.mapper.map(&axes, field_relative, self.gear, self.last_heading_rad);

        if let Some(target_rad) = self.heading_hold_rad {
            vel.omega_rads = self.heading_pid.calculate(
                target_rad,
                wrap_to_pi(self.last_heading_rad),
                self.cycle_period_s
            );

            // Rotation ramps from here once the hold ends
            self.mapper.reset_rotation(vel.omega_rads);
            self.report.heading_hold_active = true;
        }

        vel
    }

    /// Clear all motion requests.
    fn clear_motion(&mut self) {
        self.drive_cmd = None;
        self.heading_hold_rad = None;
        self.nudge = None;
        self.mapper.reset_rotation(0.0);
    }
}
