//! Main swerve executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Telecommand processing and handling
//!         - Drive control processing (mapping, kinematics, modules, odometry)
//!         - Arm control processing
//!         - Equipment step (simulation)
//!
//! # Modules
//!
//! All modules (e.g. `drive_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use swerve_lib::{
    arm_ctrl::{self, ArmCtrl},
    data_store::DataStore,
    drive_ctrl::{self, DriveCtrl},
    eqpt::sim::SimRig,
    kinematics::ChassisKinematics,
    params::ExecParams,
    tc_processor,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::WrapErr};
use comms_if::tc::TcResponse;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use util::{
    module::State,
    logger::{logger_init, LevelFilter},
    session::Session,
    script_interpreter::{ScriptInterpreter, PendingTcs},
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of consecutive overruns after which a summary warning is issued.
const CYCLE_OVERRUN_WARN_LIMIT: u64 = 50;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Swerve drive and arm control executable
#[derive(Debug, StructOpt)]
#[structopt(name = "swerve_exec")]
struct Opt {
    /// Telecommand script to execute. Without a script the loop runs idle.
    #[structopt(short, long, parse(from_os_str))]
    script: Option<PathBuf>,

    /// Stop after this many cycles.
    #[structopt(short, long)]
    max_cycles: Option<u128>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Various sources for the telecommands incoming to the exec.
enum TcSource {
    None,
    Script(ScriptInterpreter)
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "swerve_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Swerve Executable\n");
    info!("Session directory: {:?}\n", session.session_root);
    debug!("CLI arguments: {:?}", opt);

    // ---- LOAD PARAMETERS ----

    let exec_params: ExecParams = util::params::load("exec.toml")
        .wrap_err("Could not load exec params")?;
    let drive_params: drive_ctrl::Params = util::params::load("drive_ctrl.toml")
        .wrap_err("Could not load DriveCtrl params")?;
    let arm_params: arm_ctrl::Params = util::params::load("arm_ctrl.toml")
        .wrap_err("Could not load ArmCtrl params")?;

    info!("Exec parameters loaded");

    let cycle_period_s = exec_params.cycle_period_s;
    let cycle_frequency_hz = 1.0 / cycle_period_s;

    // ---- INITIALISE TC SOURCE ----

    let mut tc_source = match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);

            let si = ScriptInterpreter::new(path)
                .wrap_err("Failed to load script")?;

            info!(
                "Loaded script lasts {:.02} s and contains {} TCs\n",
                si.get_duration(),
                si.get_num_tcs()
            );

            TcSource::Script(si)
        },
        None => {
            info!("No script provided, running idle\n");
            TcSource::None
        }
    };

    // ---- INITIALISE EQUIPMENT ----

    let kinematics = ChassisKinematics::new(drive_params.geometry.clone())
        .wrap_err("Invalid module geometry")?;
    let (mut rig, drive_eqpt, arm_eqpt) = SimRig::new(
        &exec_params.sim,
        kinematics,
        drive_params.chassis_offsets_rad,
        arm_params.home_pos_rad,
        arm_params.home_dir
    );
    info!("Simulated equipment initialised");

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let drive_ctrl = DriveCtrl::init(drive_ctrl::InitData {
        params: drive_params,
        eqpt: drive_eqpt,
        cycle_period_s,
    }).wrap_err("Failed to initialise DriveCtrl")?;
    info!("DriveCtrl init complete");

    let arm_ctrl = ArmCtrl::init(arm_ctrl::InitData {
        params: arm_params,
        eqpt: arm_eqpt,
        cycle_period_s,
    }).wrap_err("Failed to initialise ArmCtrl")?;
    info!("ArmCtrl init complete");

    let mut ds = DataStore::new(drive_ctrl, arm_ctrl);

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {

        if let Some(max) = opt.max_cycles {
            if ds.num_cycles >= max {
                info!("Maximum number of cycles ({}) reached, stopping", max);
                break
            }
        }

        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(cycle_frequency_hz);

        // ---- TELECOMMAND PROCESSING ----

        // Script time advances with the cycles so runs are repeatable
        let script_time_s = ds.num_cycles as f64 * cycle_period_s;

        match tc_source {
            TcSource::None => (),
            TcSource::Script(ref mut si) =>
                match si.get_pending_tcs(script_time_s) {
                    PendingTcs::None => (),
                    PendingTcs::Some(tc_vec) => {
                        for tc in tc_vec.iter() {
                            if tc_processor::exec(&mut ds, tc) == TcResponse::CannotExecute {
                                debug!("TC not executed: {:?}", tc);
                            }
                        }
                    }
                    // Exit if end of script reached
                    PendingTcs::EndOfScript => {
                        info!("End of TC script reached, stopping");
                        break
                    }
                }
        };

        // ---- CONTROL ALGORITHM PROCESSING ----

        match ds.drive_ctrl.proc(&ds.drive_ctrl_input) {
            Ok((o, r)) => {
                ds.drive_ctrl_output = Some(o);
                ds.drive_ctrl_status_rpt = r;
            },
            Err(e) => warn!("Error during DriveCtrl processing: {}", e)
        };

        match ds.arm_ctrl.proc(&ds.arm_ctrl_input) {
            Ok((o, r)) => {
                ds.arm_ctrl_output = Some(o);
                ds.arm_ctrl_status_rpt = r;
            },
            Err(e) => warn!("Error during ArmCtrl processing: {}", e)
        };

        if ds.is_1_hz_cycle {
            if let Some(ref o) = ds.drive_ctrl_output {
                info!("Chassis {:?} pose: {:?}", o.mode, o.pose);
            }
            if let Some(ref o) = ds.arm_ctrl_output {
                info!("Arm {:?}: {:?}", o.mode, o.state);
            }
        }

        // ---- EQUIPMENT ----

        rig.step(cycle_period_s);

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(cycle_period_s)
            .checked_sub(cycle_dur)
        {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            },
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period_s
                );
                ds.num_consec_cycle_overruns += 1;

                if ds.num_consec_cycle_overruns == CYCLE_OVERRUN_WARN_LIMIT {
                    warn!(
                        "{} consecutive cycle overruns, the cycle period may be too short",
                        CYCLE_OVERRUN_WARN_LIMIT
                    );
                }
            }
        }

        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    info!("End of execution");

    Ok(())
}
