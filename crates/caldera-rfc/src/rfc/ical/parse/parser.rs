//! iCalendar document parser (RFC 5545).
//!
//! Builds the component tree from content lines and types each property
//! value according to its name and `VALUE` parameter.

use super::error::{ParseError, ParseErrorKind, ParseResult};
use super::lexer::{parse_content_line, split_lines};
use super::values::{
    parse_boolean, parse_date, parse_datetime, parse_duration, parse_integer, parse_period,
    parse_utc_offset, split_list, unescape_text,
};
use crate::rfc::ical::core::{Component, ComponentKind, ContentLine, ICalendar, Property, Value};

/// Parses an iCalendar document from a string.
///
/// ## Errors
///
/// Returns an error if the input is not a single well-formed `VCALENDAR`,
/// or if a date, date-time, duration, period or offset value is malformed.
#[tracing::instrument(skip(input), fields(input_len = input.len()))]
pub fn parse(input: &str) -> ParseResult<ICalendar> {
    let lines = split_lines(input);
    if lines.is_empty() {
        return Err(ParseError::new(ParseErrorKind::MissingBegin, 1, 1).with_context("empty input"));
    }
    tracing::trace!(count = lines.len(), "Split content lines");

    // Open components, innermost last.
    let mut stack: Vec<(usize, Component)> = Vec::new();
    let mut root: Option<Component> = None;

    for (line_num, line) in lines {
        let content = parse_content_line(&line, line_num)?;

        if root.is_some() {
            return Err(ParseError::new(ParseErrorKind::TrailingContent, line_num, 1)
                .with_context(content.name));
        }

        match content.name.as_str() {
            "BEGIN" => {
                let name = content.raw_value.trim().to_ascii_uppercase();
                if stack.is_empty() && name != "VCALENDAR" {
                    return Err(ParseError::new(ParseErrorKind::MissingBegin, line_num, 1)
                        .with_context(format!("expected VCALENDAR, got {name}")));
                }
                stack.push((line_num, Component::named(name)));
            }
            "END" => {
                let name = content.raw_value.trim().to_ascii_uppercase();
                let Some((_, component)) = stack.pop() else {
                    return Err(ParseError::new(ParseErrorKind::MissingBegin, line_num, 1)
                        .with_context(format!("END:{name} without BEGIN")));
                };
                if component.name != name {
                    return Err(
                        ParseError::new(ParseErrorKind::MismatchedComponent, line_num, 1)
                            .with_context(format!("expected END:{}, got END:{name}", component.name)),
                    );
                }
                match stack.last_mut() {
                    Some((_, parent)) => parent.add_child(component),
                    None => root = Some(component),
                }
            }
            _ => {
                let Some((_, current)) = stack.last_mut() else {
                    return Err(ParseError::new(ParseErrorKind::MissingBegin, line_num, 1)
                        .with_context(format!("property {} outside a component", content.name)));
                };
                current.add_property(type_property(content, line_num)?);
            }
        }
    }

    if let Some((begin_line, open)) = stack.pop() {
        return Err(ParseError::new(ParseErrorKind::MissingEnd, begin_line, 1)
            .with_context(format!("BEGIN:{} is never closed", open.name)));
    }

    let root = root.ok_or_else(|| ParseError::new(ParseErrorKind::MissingBegin, 1, 1))?;
    debug_assert_eq!(root.kind, Some(ComponentKind::Calendar));
    Ok(ICalendar { root })
}

/// Default value type of a property when no `VALUE` parameter is given.
fn default_value_type(name: &str) -> &'static str {
    match name {
        "DTSTART" | "DTEND" | "DUE" | "RECURRENCE-ID" | "DTSTAMP" | "CREATED"
        | "LAST-MODIFIED" | "COMPLETED" | "EXDATE" | "RDATE" => "DATE-TIME",
        "RRULE" | "EXRULE" => "RECUR",
        "DURATION" | "TRIGGER" => "DURATION",
        "TZOFFSETFROM" | "TZOFFSETTO" => "UTC-OFFSET",
        "SEQUENCE" | "PRIORITY" | "PERCENT-COMPLETE" | "REPEAT" => "INTEGER",
        "URL" | "TZURL" | "ATTACH" => "URI",
        "ATTENDEE" | "ORGANIZER" => "CAL-ADDRESS",
        _ => "TEXT",
    }
}

/// Converts a content line into a typed property.
fn type_property(content: ContentLine, line_num: usize) -> ParseResult<Property> {
    // Column of the value, for error positions.
    let col = content.name.len() + 2;
    let value_type = content
        .value_type()
        .map_or_else(|| default_value_type(&content.name).to_string(), str::to_ascii_uppercase);
    let tzid = content.tzid();
    let raw = content.raw_value.as_str();
    let multi = matches!(content.name.as_str(), "EXDATE" | "RDATE");

    let value = match value_type.as_str() {
        "DATE" if multi => Value::DateList(
            split_list(raw)
                .into_iter()
                .map(|part| parse_date(part.trim(), line_num, col))
                .collect::<ParseResult<_>>()?,
        ),
        "DATE" => Value::Date(parse_date(raw.trim(), line_num, col)?),
        "DATE-TIME" if multi => Value::DateTimeList(
            split_list(raw)
                .into_iter()
                .map(|part| parse_datetime(part.trim(), tzid, line_num, col))
                .collect::<ParseResult<_>>()?,
        ),
        "DATE-TIME" => Value::DateTime(parse_datetime(raw.trim(), tzid, line_num, col)?),
        "PERIOD" => Value::PeriodList(
            split_list(raw)
                .into_iter()
                .map(|part| parse_period(part.trim(), tzid, line_num, col))
                .collect::<ParseResult<_>>()?,
        ),
        "DURATION" => Value::Duration(parse_duration(raw.trim(), line_num, col)?),
        "UTC-OFFSET" => Value::UtcOffset(parse_utc_offset(raw.trim(), line_num, col)?),
        "RECUR" => Value::Recur(raw.to_string()),
        "INTEGER" => Value::Integer(parse_integer(raw, line_num, col)?),
        "BOOLEAN" => Value::Boolean(parse_boolean(raw.trim(), line_num, col)?),
        "URI" | "CAL-ADDRESS" => Value::Uri(raw.to_string()),
        "TEXT" => Value::Text(unescape_text(raw)),
        _ => Value::Unknown(raw.to_string()),
    };

    Ok(Property {
        name: content.name,
        params: content.params,
        value,
        raw_value: content.raw_value,
    })
}
