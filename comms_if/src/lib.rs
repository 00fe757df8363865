//! # Communications interface crate.
//!
//! Provides the interface types shared between the control executable, its
//! command sources and its equipment.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommand definitions
pub mod tc;

/// Identifiers, demands and configuration for equipment (like actuators)
pub mod eqpt;
