//! iCalendar core models (RFC 5545).
//!
//! Components keep every property they were parsed with, in order, so an
//! unexpanded object can be returned without loss and an expanded one is a
//! faithful copy with only the recurrence properties rewritten.

mod component;
mod datetime;
mod duration;
mod parameter;
mod property;
mod value;

pub use component::{Component, ComponentKind, ICalendar};
pub use datetime::{DateTime, DateTimeForm, UtcOffset};
pub use duration::Duration;
pub use parameter::Parameter;
pub use property::{ContentLine, Property, names};
pub use value::{Date, Period, Value};
