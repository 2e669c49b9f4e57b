//! Content lines and typed properties (RFC 5545 §3.1, §3.8).

use serde::{Deserialize, Serialize};

use super::{Date, DateTime, Duration, Parameter, Value, parameter::lookup};

/// One unfolded `NAME;PARAMS:value` line straight out of the lexer.
///
/// `raw_value` is still escaped; typing happens in the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentLine {
    pub name: String,
    pub params: Vec<Parameter>,
    pub raw_value: String,
}

impl ContentLine {
    #[must_use]
    pub fn value_type(&self) -> Option<&str> {
        lookup(&self.params, names::VALUE)
    }

    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        lookup(&self.params, names::TZID)
    }
}

/// A property with its typed value.
///
/// `raw_value` is what the serializer writes, so a property nobody touched
/// goes back out byte-for-byte (modulo folding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Upper-cased.
    pub name: String,
    pub params: Vec<Parameter>,
    pub value: Value,
    pub raw_value: String,
}

impl Property {
    fn build(name: impl Into<String>, params: Vec<Parameter>, value: Value, raw_value: String) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            params,
            value,
            raw_value,
        }
    }

    #[must_use]
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self::build(name, Vec::new(), Value::Text(text.clone()), text)
    }

    /// Zoned values get a `TZID` parameter; UTC and floating values get none.
    #[must_use]
    pub fn datetime(name: impl Into<String>, dt: DateTime) -> Self {
        let params = dt.tzid().map(Parameter::tzid).into_iter().collect();
        let raw = dt.to_string();
        Self::build(name, params, Value::DateTime(dt), raw)
    }

    /// Always tagged `VALUE=DATE`.
    #[must_use]
    pub fn date(name: impl Into<String>, date: Date) -> Self {
        let raw = date.to_string();
        Self::build(
            name,
            vec![Parameter::value_type("DATE")],
            Value::Date(date),
            raw,
        )
    }

    #[must_use]
    pub fn get_param_value(&self, name: &str) -> Option<&str> {
        lookup(&self.params, name)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        self.value.as_text()
    }

    #[must_use]
    pub fn as_datetime(&self) -> Option<&DateTime> {
        self.value.as_datetime()
    }

    #[must_use]
    pub fn as_date(&self) -> Option<&Date> {
        self.value.as_date()
    }

    #[must_use]
    pub fn as_duration(&self) -> Option<&Duration> {
        self.value.as_duration()
    }
}

/// Property and parameter names the expansion core reads or writes.
pub mod names {
    pub const PRODID: &str = "PRODID";
    pub const VERSION: &str = "VERSION";
    pub const SUMMARY: &str = "SUMMARY";
    pub const UID: &str = "UID";

    pub const DTSTART: &str = "DTSTART";
    pub const DTEND: &str = "DTEND";
    pub const DUE: &str = "DUE";
    pub const DURATION: &str = "DURATION";

    pub const RRULE: &str = "RRULE";
    pub const RDATE: &str = "RDATE";
    pub const EXDATE: &str = "EXDATE";
    pub const EXRULE: &str = "EXRULE";
    pub const RECURRENCE_ID: &str = "RECURRENCE-ID";

    pub const TZID: &str = "TZID";
    pub const TZOFFSETFROM: &str = "TZOFFSETFROM";
    pub const TZOFFSETTO: &str = "TZOFFSETTO";

    pub const VALUE: &str = "VALUE";
}
