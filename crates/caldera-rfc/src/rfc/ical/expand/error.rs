//! Expansion error types.

/// Per-object failures of the recurrence engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpandError {
    /// The RRULE could not be parsed or validated.
    #[error("malformed recurrence rule in {uid}: {reason}")]
    MalformedRecurrence { uid: String, reason: String },

    /// A TZID matches neither a VTIMEZONE in the object nor a known zone.
    #[error("unknown timezone: {tzid}")]
    UnknownTimezone { tzid: String },

    /// The rule produced more candidates near the window than allowed.
    #[error("{uid} produces more than {limit} candidates near the window")]
    CandidateLimit { uid: String, limit: usize },

    /// The component has no DTSTART (or, for VTODO, DUE).
    #[error("{uid} has no start time")]
    MissingStart { uid: String },
}

/// Result type for expansion.
pub type ExpandResult<T> = Result<T, ExpandError>;
