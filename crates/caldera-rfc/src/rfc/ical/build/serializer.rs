//! Writes a component tree back out as RFC 5545 text.
//!
//! Properties and sub-components are written in stored order. Values that
//! were parsed are written from their raw text, TEXT values are
//! re-escaped from their unescaped form.

use super::escape::{escape_param_value, escape_text};
use super::fold::fold_line;
use crate::rfc::ical::core::{Component, ICalendar, Property, Value};

/// Serializes an iCalendar document to a string with CRLF line endings.
#[must_use]
pub fn serialize(ical: &ICalendar) -> String {
    serialize_component(&ical.root)
}

/// Serializes a component and all of its children.
#[must_use]
pub fn serialize_component(component: &Component) -> String {
    let mut out = fold_line(&format!("BEGIN:{}", component.name));
    for prop in &component.properties {
        out.push_str(&serialize_property(prop));
    }
    for child in &component.children {
        out.push_str(&serialize_component(child));
    }
    out.push_str(&fold_line(&format!("END:{}", component.name)));
    out
}

/// Serializes a single property as one folded content line.
#[must_use]
pub fn serialize_property(prop: &Property) -> String {
    let mut line = prop.name.clone();
    for param in &prop.params {
        line.push(';');
        line.push_str(&param.name);
        line.push('=');
        let values: Vec<String> = param.values.iter().map(|v| escape_param_value(v)).collect();
        line.push_str(&values.join(","));
    }
    line.push(':');
    match &prop.value {
        Value::Text(text) => line.push_str(&escape_text(text)),
        _ => line.push_str(&prop.raw_value),
    }
    fold_line(&line)
}
