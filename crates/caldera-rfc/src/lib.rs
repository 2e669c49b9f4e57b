//! iCalendar handling for caldera: the content-line model, parsing and
//! serialization, the calendar object model, and recurrence expansion.

pub mod rfc;
