//! Shared settings, errors and constants for the caldera workspace.

pub mod config;
pub mod constants;
pub mod error;
