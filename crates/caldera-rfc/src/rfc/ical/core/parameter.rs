//! Property parameters (RFC 5545 §3.2).

use serde::{Deserialize, Serialize};

/// `NAME=value[,value...]` attached to a property, such as the `TZID` of a
/// zoned `DTSTART`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Upper-cased.
    pub name: String,
    /// Unquoted values; nearly always exactly one.
    pub values: Vec<String>,
}

impl Parameter {
    #[must_use]
    pub fn with_values(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            values,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    #[must_use]
    pub fn tzid(tzid: impl Into<String>) -> Self {
        Self::with_values("TZID", vec![tzid.into()])
    }

    /// `VALUE=<kind>`, e.g. `VALUE=DATE`.
    #[must_use]
    pub fn value_type(kind: impl Into<String>) -> Self {
        Self::with_values("VALUE", vec![kind.into()])
    }
}

/// First value of the parameter called `name` in `params`.
pub(crate) fn lookup<'a>(params: &'a [Parameter], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|param| param.name.eq_ignore_ascii_case(name))
        .and_then(Parameter::value)
}
