//! # Telecommand processor module
//!
//! The telecommand processor handles various TCs coming from any source.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};

// Internal
use comms_if::tc::{Tc, TcResponse};
use crate::data_store::{DataStore, SafeModeCause};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Mutates the datastore to send commands to different modules. Commands
/// are queued for the controllers and take effect at the start of their next
/// processing.
///
/// In safe mode only `MakeUnsafe` and `Heartbeat` are executed, everything
/// else gets `TcResponse::CannotExecute`.
pub fn exec(ds: &mut DataStore, tc: &Tc) -> TcResponse {

    if ds.safe {
        match tc {
            Tc::MakeUnsafe | Tc::Heartbeat => (),
            _ => {
                warn!("Cannot execute {:?} in safe mode", tc);
                return TcResponse::CannotExecute
            }
        }
    }

    // Handle different Tcs
    match tc {
        Tc::Heartbeat => (),
        Tc::MakeSafe => {
            debug!("Recieved MakeSafe command");
            ds.make_safe(SafeModeCause::MakeSafeTc);
        },
        Tc::MakeUnsafe => {
            debug!("Recieved MakeUnsafe command");
            ds.make_unsafe(SafeModeCause::MakeSafeTc).ok();
        },
        Tc::DriveCtrl(c) => ds.drive_ctrl_input.cmds.push(*c),
        Tc::ArmCtrl(c) => ds.arm_ctrl_input.cmds.push(*c),
    }

    TcResponse::Ok
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::{arm_ctrl::ArmCmd, drive_ctrl::DriveCmd};
    use util::module::State;
    use crate::{
        arm_ctrl::{self, ArmCtrl, ArmMode},
        drive_ctrl::{self, DriveCtrl, DriveMode},
        eqpt::sim::{SimParams, SimRig},
        kinematics::ChassisKinematics,
    };

    fn data_store() -> (DataStore, SimRig) {
        let drive_params: drive_ctrl::Params = util::params::parse(
            include_str!("../../params/drive_ctrl.toml")
        ).unwrap();
        let arm_params: arm_ctrl::Params = util::params::parse(
            include_str!("../../params/arm_ctrl.toml")
        ).unwrap();

        let sim_params = SimParams {
            drive_free_speed_ms: 4.8,
            arm_free_speed_rads: 2.6535,
            arm_initial_pos_rad: 0.5,
            arm_gravity_v: 0.0,
            arm_zero_cos_offset_rad: 0.0,
        };
        let kin = ChassisKinematics::new(drive_params.geometry.clone()).unwrap();
        let (rig, drive_eqpt, arm_eqpt) = SimRig::new(
            &sim_params,
            kin,
            drive_params.chassis_offsets_rad,
            arm_params.home_pos_rad,
            arm_params.home_dir
        );

        let dc = DriveCtrl::init(drive_ctrl::InitData {
            params: drive_params,
            eqpt: drive_eqpt,
            cycle_period_s: 0.02,
        }).unwrap();
        let ac = ArmCtrl::init(arm_ctrl::InitData {
            params: arm_params,
            eqpt: arm_eqpt,
            cycle_period_s: 0.02,
        }).unwrap();

        (DataStore::new(dc, ac), rig)
    }

    #[test]
    fn test_commands_routed() {
        let (mut ds, _) = data_store();

        assert_eq!(exec(&mut ds, &Tc::DriveCtrl(DriveCmd::Stop)), TcResponse::Ok);
        assert_eq!(exec(&mut ds, &Tc::ArmCtrl(ArmCmd::Automatic)), TcResponse::Ok);
        assert_eq!(exec(&mut ds, &Tc::Heartbeat), TcResponse::Ok);

        assert_eq!(ds.drive_ctrl_input.cmds, vec![DriveCmd::Stop]);
        assert_eq!(ds.arm_ctrl_input.cmds, vec![ArmCmd::Automatic]);
    }

    #[test]
    fn test_safe_mode() {
        let (mut ds, _) = data_store();

        exec(&mut ds, &Tc::DriveCtrl(DriveCmd::Stop));
        assert_eq!(exec(&mut ds, &Tc::MakeSafe), TcResponse::Ok);
        assert!(ds.safe);
        assert!(ds.drive_ctrl_input.cmds.is_empty());
        assert_eq!(ds.drive_ctrl.mode(), DriveMode::Locked);

        // Unhomed arm has its output removed
        assert_eq!(ds.arm_ctrl.mode(), ArmMode::Testing);

        assert_eq!(
            exec(&mut ds, &Tc::DriveCtrl(DriveCmd::XFormation)),
            TcResponse::CannotExecute
        );
        assert_eq!(exec(&mut ds, &Tc::MakeSafe), TcResponse::CannotExecute);
        assert_eq!(exec(&mut ds, &Tc::Heartbeat), TcResponse::Ok);
        assert!(ds.drive_ctrl_input.cmds.is_empty());

        assert_eq!(exec(&mut ds, &Tc::MakeUnsafe), TcResponse::Ok);
        assert!(!ds.safe);

        // Chassis stays locked until driven
        assert_eq!(ds.drive_ctrl.mode(), DriveMode::Locked);
    }

    #[test]
    fn test_cycle_start() {
        let (mut ds, _) = data_store();

        exec(&mut ds, &Tc::DriveCtrl(DriveCmd::Stop));
        ds.cycle_start(50.0);
        assert!(ds.is_1_hz_cycle);
        assert!(ds.drive_ctrl_input.cmds.is_empty());

        ds.num_cycles = 49;
        ds.cycle_start(50.0);
        assert!(!ds.is_1_hz_cycle);

        ds.num_cycles = 100;
        ds.cycle_start(50.0);
        assert!(ds.is_1_hz_cycle);
    }
}
