//! Calendar query service layer.

pub mod outcome;
pub mod report;
