//! Query coordination over stored calendar collections.

pub mod caldav;
pub mod error;
pub mod storage;
