//! # Data Store
//!
//! Everything the executable carries from one cycle to the next.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{info, warn};

use crate::{arm_ctrl, drive_ctrl};

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Gives the reason the robot has been put into safe mode
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SafeModeCause {
    MakeSafeTc,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    // Safe mode variables
    /// Determines if the robot is in safe mode.
    pub safe: bool,

    /// Gives the reason for the robot being in safe mode.
    pub safe_cause: Option<SafeModeCause>,

    // DriveCtrl
    pub drive_ctrl: drive_ctrl::DriveCtrl,
    pub drive_ctrl_input: drive_ctrl::InputData,
    pub drive_ctrl_output: Option<drive_ctrl::OutputData>,
    pub drive_ctrl_status_rpt: drive_ctrl::StatusReport,

    // ArmCtrl
    pub arm_ctrl: arm_ctrl::ArmCtrl,
    pub arm_ctrl_input: arm_ctrl::InputData,
    pub arm_ctrl_output: Option<arm_ctrl::OutputData>,
    pub arm_ctrl_status_rpt: arm_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    /// Create the store around the initialised controllers.
    pub fn new(drive_ctrl: drive_ctrl::DriveCtrl, arm_ctrl: arm_ctrl::ArmCtrl) -> Self {
        Self {
            num_cycles: 0,
            is_1_hz_cycle: false,
            safe: false,
            safe_cause: None,
            drive_ctrl,
            drive_ctrl_input: drive_ctrl::InputData::default(),
            drive_ctrl_output: None,
            drive_ctrl_status_rpt: drive_ctrl::StatusReport::default(),
            arm_ctrl,
            arm_ctrl_input: arm_ctrl::InputData::default(),
            arm_ctrl_output: None,
            arm_ctrl_status_rpt: arm_ctrl::StatusReport::default(),
            num_consec_cycle_overruns: 0,
        }
    }

    /// Puts the robot into safe mode with the given cause.
    ///
    /// The chassis is locked in an X formation and the arm holds its
    /// position.
    pub fn make_safe(&mut self, cause: SafeModeCause) {
        if !self.safe {
            warn!("Make safe requested, cause: {:?}", cause);
            self.safe = true;
            self.safe_cause = Some(cause);

            // Commands queued before the make safe must not run
            self.drive_ctrl_input.cmds.clear();
            self.arm_ctrl_input.cmds.clear();

            self.drive_ctrl.make_safe();
            self.arm_ctrl.make_safe();
        }
    }

    /// Attempts to disable the safe mode by clearing the given cause.
    ///
    /// Returns `Ok(())` if this cause was cleared and safe mode was disabled, or `Err(())`
    /// otherwise. To remove safe mode the provided cause must match the initial reason for safe
    /// mode being enabled.
    ///
    /// If safe mode was not enabled `Ok(())` is returned
    pub fn make_unsafe(&mut self, cause: SafeModeCause) -> Result<(), ()> {
        if !self.safe {
            return Ok(());
        }

        match self.safe_cause {
            Some(root_cause) => {
                if cause == root_cause {
                    self.safe = false;
                    self.safe_cause = None;
                    info!("Make unsafe requested, root cause match, safe mode disabled");
                    Ok(())
                } else {
                    Err(())
                }
            }
            None => Ok(()),
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64) {
        let cycles_per_s = (cycle_frequency_hz.round() as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_s == 0;

        self.drive_ctrl_input = drive_ctrl::InputData::default();
        self.drive_ctrl_output = None;
        self.drive_ctrl_status_rpt = drive_ctrl::StatusReport::default();

        self.arm_ctrl_input = arm_ctrl::InputData::default();
        self.arm_ctrl_output = None;
        self.arm_ctrl_status_rpt = arm_ctrl::StatusReport::default();
    }
}
