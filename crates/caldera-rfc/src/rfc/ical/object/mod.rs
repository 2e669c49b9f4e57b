//! Calendar Object Model: one stored item, its master and overrides.

mod calendar_object;
mod moment;
mod window;

pub use calendar_object::{CalendarObject, Instance, ObjectError};
pub use moment::Moment;
pub use window::TimeWindow;
