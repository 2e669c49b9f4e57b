//! Per-object results of a calendar query.

use std::borrow::Cow;

use caldera_rfc::rfc::ical::build::serialize;
use caldera_rfc::rfc::ical::core::{ComponentKind, ICalendar};
use caldera_rfc::rfc::ical::expand::ExpandError;
use thiserror::Error;

/// Calendar data returned for a matching object.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    /// The stored text, rule and timezone definitions included.
    Raw(String),
    /// One materialized component per occurrence in the window.
    Expanded(ICalendar),
}

impl ObjectData {
    /// ## Summary
    /// Calendar text for the response body.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Self::Raw(text) => Cow::Borrowed(text),
            Self::Expanded(calendar) => Cow::Owned(serialize(calendar)),
        }
    }

    /// Number of materialized instances, `None` for raw data.
    #[must_use]
    pub fn instance_count(&self) -> Option<usize> {
        match self {
            Self::Raw(_) => None,
            Self::Expanded(calendar) => Some(
                calendar
                    .root
                    .children
                    .iter()
                    .filter(|component| component.kind != Some(ComponentKind::Timezone))
                    .count(),
            ),
        }
    }
}

/// Why one object could not be evaluated. Never aborts sibling objects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObjectFailure {
    #[error("object is missing from the collection")]
    Missing,

    #[error("cannot parse object: {0}")]
    Parse(String),

    #[error(transparent)]
    Expand(#[from] ExpandError),

    #[error("cache unavailable: {0}")]
    Cache(String),
}

/// Outcome for one requested identity.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectOutcome {
    Matched(ObjectData),
    /// Parsed fine but nothing falls inside the window.
    Empty,
    Failed(ObjectFailure),
}

impl ObjectOutcome {
    /// Short status label used in logs and CLI output.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Matched(_) => "matched",
            Self::Empty => "empty",
            Self::Failed(_) => "failed",
        }
    }
}
