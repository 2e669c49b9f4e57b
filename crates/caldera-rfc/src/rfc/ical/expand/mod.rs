//! Recurrence expansion, timezone resolution and occurrence
//! materialization.

mod engine;
mod error;
mod materialize;
mod rule;
mod timezone;
mod vtimezone;

pub use engine::{
    Bounds, ExpandOptions, Occurrence, OccurrenceTime, bounds, expand, intersects,
};
pub use error::{ExpandError, ExpandResult};
pub use materialize::{materialize, materialize_calendar};
pub use timezone::{TimeZoneResolver, Zone};
pub use vtimezone::{VTimezone, VTimezoneError};
