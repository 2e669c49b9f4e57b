//! iCalendar (RFC 5545) support.
//!
//! - `core`: content-line model (components, properties, typed values)
//! - `parse`: text to model
//! - `build`: model to text
//! - `object`: one stored calendar object (master + overrides sharing a UID)
//! - `expand`: recurrence expansion and occurrence materialization

pub mod build;
pub mod core;
pub mod expand;
pub mod object;
pub mod parse;
