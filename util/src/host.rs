//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the root of the software
/// checkout. Parameter files and sessions are resolved relative to it.
pub const SW_ROOT_ENV_VAR: &str = "SWERVE_SW_ROOT";

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}
