//! Component tree of a parsed iCalendar document (RFC 5545 §3.4-3.6).

use serde::{Deserialize, Serialize};

use super::{Property, property::names};

/// Recognised component names.
///
/// Anything outside this set (including `X-` components) is kept in the tree
/// with kind [`ComponentKind::Unknown`] and its original name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Calendar,
    Event,
    Todo,
    Journal,
    Timezone,
    Alarm,
    /// Observance block inside a VTIMEZONE.
    Standard,
    /// Observance block inside a VTIMEZONE.
    Daylight,
    Unknown,
}

const KIND_NAMES: [(ComponentKind, &str); 8] = [
    (ComponentKind::Calendar, "VCALENDAR"),
    (ComponentKind::Event, "VEVENT"),
    (ComponentKind::Todo, "VTODO"),
    (ComponentKind::Journal, "VJOURNAL"),
    (ComponentKind::Timezone, "VTIMEZONE"),
    (ComponentKind::Alarm, "VALARM"),
    (ComponentKind::Standard, "STANDARD"),
    (ComponentKind::Daylight, "DAYLIGHT"),
];

impl ComponentKind {
    /// Canonical upper-case name, `X-UNKNOWN` for unrecognised kinds.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        KIND_NAMES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or("X-UNKNOWN", |(_, name)| name)
    }

    /// Looks a component name up, ignoring ASCII case.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        KIND_NAMES
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(name))
            .map_or(Self::Unknown, |(kind, _)| *kind)
    }

    /// VEVENT, VTODO and VJOURNAL: the kinds that recur and answer
    /// time-range queries.
    #[must_use]
    pub const fn is_schedulable(self) -> bool {
        matches!(self, Self::Event | Self::Todo | Self::Journal)
    }

    /// `DUE` for VTODO, `DTEND` for everything else.
    #[must_use]
    pub const fn end_property(self) -> &'static str {
        match self {
            Self::Todo => names::DUE,
            _ => names::DTEND,
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `BEGIN:`/`END:` block with its properties and nested blocks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Component {
    pub kind: Option<ComponentKind>,
    /// Name as written in the source, upper-cased.
    pub name: String,
    /// Properties in stored order; serialization keeps this order.
    pub properties: Vec<Property>,
    pub children: Vec<Component>,
}

impl Component {
    #[must_use]
    pub fn new(kind: ComponentKind) -> Self {
        Self::with_kind(kind, kind.as_str().to_owned())
    }

    /// Builds an empty component for a `BEGIN:<name>` line.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into().to_ascii_uppercase();
        Self::with_kind(ComponentKind::parse(&name), name)
    }

    #[must_use]
    pub fn event() -> Self {
        Self::new(ComponentKind::Event)
    }

    fn with_kind(kind: ComponentKind, name: String) -> Self {
        Self {
            kind: Some(kind),
            name,
            ..Self::default()
        }
    }

    pub fn add_property(&mut self, prop: Property) {
        self.properties.push(prop);
    }

    pub fn add_child(&mut self, child: Component) {
        self.children.push(child);
    }

    fn matching<'a, 'b>(
        &'a self,
        name: &'b str,
    ) -> impl Iterator<Item = &'a Property> + use<'a, 'b> {
        self.properties
            .iter()
            .filter(move |p| p.name.eq_ignore_ascii_case(name))
    }

    /// First property called `name` (ASCII case-insensitive).
    #[must_use]
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.matching(name).next()
    }

    /// Every property called `name`, in stored order.
    #[must_use]
    pub fn get_properties(&self, name: &str) -> Vec<&Property> {
        self.matching(name).collect()
    }

    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.matching(name).next().is_some()
    }

    pub fn remove_properties(&mut self, name: &str) {
        self.properties.retain(|p| !p.name.eq_ignore_ascii_case(name));
    }

    /// Puts `prop` where the first same-named property sat, dropping any
    /// further ones. Appends when the name is absent.
    pub fn set_property(&mut self, prop: Property) {
        let Some(slot) = self
            .properties
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(&prop.name))
        else {
            self.properties.push(prop);
            return;
        };

        let mut index = 0;
        self.properties.retain(|p| {
            let keep = index <= slot || !p.name.eq_ignore_ascii_case(&prop.name);
            index += 1;
            keep
        });
        self.properties[slot] = prop;
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.get_property(names::UID).and_then(Property::as_text)
    }

    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        self.get_property(names::SUMMARY).and_then(Property::as_text)
    }

    /// Present only on overridden occurrences.
    #[must_use]
    pub fn recurrence_id(&self) -> Option<&Property> {
        self.get_property(names::RECURRENCE_ID)
    }

    fn children_where(&self, kind: ComponentKind) -> Vec<&Component> {
        self.children.iter().filter(|c| c.kind == Some(kind)).collect()
    }
}

/// A whole `.ics` document: the VCALENDAR root and everything under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ICalendar {
    pub root: Component,
}

impl ICalendar {
    /// Empty VCALENDAR carrying `VERSION:2.0` and the given PRODID.
    #[must_use]
    pub fn new(prodid: impl Into<String>) -> Self {
        let mut root = Component::new(ComponentKind::Calendar);
        root.add_property(Property::text(names::VERSION, "2.0"));
        root.add_property(Property::text(names::PRODID, prodid));
        Self { root }
    }

    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.root.get_property(names::VERSION).and_then(Property::as_text)
    }

    pub fn add_component(&mut self, component: Component) {
        self.root.add_child(component);
    }

    #[must_use]
    pub fn timezones(&self) -> Vec<&Component> {
        self.root.children_where(ComponentKind::Timezone)
    }

    #[must_use]
    pub fn events(&self) -> Vec<&Component> {
        self.root.children_where(ComponentKind::Event)
    }
}

impl Default for ICalendar {
    fn default() -> Self {
        Self::new(caldera_core::constants::PRODID)
    }
}
