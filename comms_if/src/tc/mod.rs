//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications 
//! interface.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod arm_ctrl;
pub mod drive_ctrl;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Serialize, Deserialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the robot by an operator or a
/// script.
///
/// In JSON the telecommand is represented by its `type` and, if it carries
/// data, a `payload`, for example:
///
/// ```json
/// {"type": "DRIVE_CTRL", "payload": {"Drive": {"x": 1.0, "y": 0.0, "rot": 0.0, "field_relative": true}}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tc {
    /// Keep alive, no action.
    Heartbeat,

    /// Enter safe mode: lock the chassis and hold the arm.
    MakeSafe,

    /// Leave safe mode.
    MakeUnsafe,

    /// Chassis command.
    DriveCtrl(drive_ctrl::DriveCmd),

    /// Arm command.
    ArmCtrl(arm_ctrl::ArmCmd),
}

/// Response to a telecommand.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TcResponse {
    /// The TC was accepted and passed on for execution.
    Ok,

    /// The TC cannot be executed in the current state, for example while
    /// the robot is in safe mode.
    CannotExecute,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {

    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the TC into a JSON packet
    pub fn to_json(&self) -> Result<String, TcParseError> {
        serde_json::to_string(self).map_err(TcParseError::InvalidJson)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use drive_ctrl::{DriveCmd, VirtualGear};
    use arm_ctrl::ArmCmd;

    #[test]
    fn test_from_json() {
        assert_eq!(Tc::from_json(r#"{"type": "MAKE_SAFE"}"#).unwrap(), Tc::MakeSafe);

        assert_eq!(
            Tc::from_json(
                r#"{"type": "DRIVE_CTRL", "payload": {"SetGear": {"gear": "High"}}}"#
            ).unwrap(),
            Tc::DriveCtrl(DriveCmd::SetGear { gear: VirtualGear::High })
        );

        assert_eq!(
            Tc::from_json(
                r#"{"type": "ARM_CTRL", "payload": {"SetTarget": {"pos_rad": 1.2}}}"#
            ).unwrap(),
            Tc::ArmCtrl(ArmCmd::SetTarget { pos_rad: 1.2 })
        );

        assert!(Tc::from_json(r#"{"type": "DRIVE_CTRL"}"#).is_err());
        assert!(Tc::from_json("not json").is_err());
    }

    #[test]
    fn test_json_is_symmetric() {
        let tc = Tc::DriveCtrl(DriveCmd::Drive {
            x: 0.5,
            y: -0.25,
            rot: 0.0,
            field_relative: true,
        });

        assert_eq!(Tc::from_json(&tc.to_json().unwrap()).unwrap(), tc);
    }
}
