//! # Swerve Executable Parameters
//!
//! This module provide parameters for the swerve executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::eqpt::sim::SimParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExecParams {

    /// Target period of one control cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Parameters of the simulated equipment
    pub sim: SimParams,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_exec_params() {
        let p: ExecParams = util::params::parse(include_str!("../../params/exec.toml")).unwrap();
        assert_eq!(p.cycle_period_s, 0.02);
        assert_eq!(p.sim.arm_gravity_v, 0.4);
    }
}
