//! A stored calendar item: every component sharing one UID.

use serde::{Deserialize, Serialize};

use super::Moment;
use crate::rfc::ical::core::{Component, ComponentKind, names};
use crate::rfc::ical::parse::{ParseError, parse};

/// Reasons a stored item cannot be turned into a `CalendarObject`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid iCalendar data: {0}")]
    Parse(#[from] ParseError),

    #[error("no VEVENT, VTODO or VJOURNAL component")]
    NoComponents,

    #[error("component without UID")]
    MissingUid,

    #[error("components with different UIDs: {first} and {other}")]
    MultipleUids { first: String, other: String },

    #[error("components of different kinds: {first} and {other}")]
    MixedKinds {
        first: ComponentKind,
        other: ComponentKind,
    },

    #[error("more than one master component for UID {uid}")]
    DuplicateMaster { uid: String },

    #[error("RECURRENCE-ID {recurrence_id} is not a date or date-time")]
    InvalidRecurrenceId { recurrence_id: String },

    #[error("more than one override for RECURRENCE-ID {recurrence_id}")]
    DuplicateOverride { recurrence_id: String },
}

/// Which component of an object an occurrence comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instance {
    /// Generated from the master's rule, RDATE or DTSTART.
    Master,
    /// Replaced by the override carrying this RECURRENCE-ID.
    Override(Moment),
}

/// The parsed form of one stored item.
///
/// Holds the master (the component without RECURRENCE-ID), the overrides
/// keyed by their declared RECURRENCE-ID, and the VTIMEZONE definitions.
/// The stored text is kept verbatim for unexpanded responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarObject {
    pub uid: String,
    pub kind: ComponentKind,
    pub fingerprint: String,
    pub master: Option<Component>,
    pub overrides: Vec<(Moment, Component)>,
    pub timezones: Vec<Component>,
    pub text: String,
}

impl CalendarObject {
    /// ## Summary
    /// Parses stored iCalendar text into a `CalendarObject`.
    ///
    /// ## Errors
    /// Returns `ObjectError` if the text does not parse, holds no
    /// schedulable component, or its components disagree on UID or kind,
    /// or repeat a master or a RECURRENCE-ID.
    #[tracing::instrument(skip(text, fingerprint), fields(len = text.len()))]
    pub fn from_text(text: &str, fingerprint: impl Into<String>) -> Result<Self, ObjectError> {
        let ical = parse(text)?;

        let mut identity: Option<(String, ComponentKind)> = None;
        let mut master: Option<Component> = None;
        let mut overrides: Vec<(Moment, Component)> = Vec::new();
        let mut timezones = Vec::new();

        for component in ical.root.children {
            let Some(kind) = component.kind else { continue };
            if kind == ComponentKind::Timezone {
                timezones.push(component);
                continue;
            }
            if !kind.is_schedulable() {
                continue;
            }

            let uid = component.uid().ok_or(ObjectError::MissingUid)?.to_string();
            match &identity {
                None => identity = Some((uid.clone(), kind)),
                Some((first, _)) if *first != uid => {
                    return Err(ObjectError::MultipleUids {
                        first: first.clone(),
                        other: uid,
                    });
                }
                Some((_, first)) if *first != kind => {
                    return Err(ObjectError::MixedKinds {
                        first: *first,
                        other: kind,
                    });
                }
                Some(_) => {}
            }

            match component.recurrence_id() {
                None if master.is_some() => return Err(ObjectError::DuplicateMaster { uid }),
                None => master = Some(component),
                Some(prop) => {
                    let recurrence_id = Moment::from_property(prop).ok_or_else(|| {
                        ObjectError::InvalidRecurrenceId {
                            recurrence_id: prop.raw_value.clone(),
                        }
                    })?;
                    if prop.get_param_value("RANGE").is_some() {
                        tracing::debug!(%recurrence_id, "RANGE on RECURRENCE-ID ignored");
                    }
                    if overrides.iter().any(|(existing, _)| *existing == recurrence_id) {
                        return Err(ObjectError::DuplicateOverride {
                            recurrence_id: recurrence_id.to_string(),
                        });
                    }
                    overrides.push((recurrence_id, component));
                }
            }
        }

        let (uid, kind) = identity.ok_or(ObjectError::NoComponents)?;
        Ok(Self {
            uid,
            kind,
            fingerprint: fingerprint.into(),
            master,
            overrides,
            timezones,
            text: text.to_string(),
        })
    }

    /// Whether the object describes more than one instance: its master
    /// has an RRULE or RDATE, or it carries overrides.
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        !self.overrides.is_empty()
            || self.master.as_ref().is_some_and(|master| {
                master.has_property(names::RRULE) || master.has_property(names::RDATE)
            })
    }

    /// Looks up the component an instance refers to.
    #[must_use]
    pub fn component(&self, instance: &Instance) -> Option<&Component> {
        match instance {
            Instance::Master => self.master.as_ref(),
            Instance::Override(recurrence_id) => self
                .overrides
                .iter()
                .find(|(id, _)| id == recurrence_id)
                .map(|(_, component)| component),
        }
    }
}
