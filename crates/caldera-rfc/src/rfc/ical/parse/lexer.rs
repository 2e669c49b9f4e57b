//! Content line lexer for iCalendar (RFC 5545 §3.1).

use std::iter::Peekable;
use std::str::CharIndices;

use super::error::{ParseError, ParseErrorKind, ParseResult};
use crate::rfc::ical::core::{ContentLine, Parameter};

/// Splits input into logical content lines, joining folded continuations.
///
/// Accepts CRLF and bare LF. A line starting with SPACE or HTAB continues
/// the previous one with that single whitespace character removed. Blank
/// lines are skipped. Each line is returned with the 1-based physical line
/// number where it starts.
#[must_use]
pub fn split_lines(input: &str) -> Vec<(usize, String)> {
    let mut lines: Vec<(usize, String)> = Vec::new();

    for (index, raw) in input.split('\n').enumerate() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() {
            continue;
        }
        match (line.strip_prefix([' ', '\t']), lines.last_mut()) {
            (Some(continuation), Some((_, previous))) => previous.push_str(continuation),
            (Some(continuation), None) => lines.push((index + 1, continuation.to_string())),
            (None, _) => lines.push((index + 1, line.to_string())),
        }
    }

    lines
}

/// Parses a single unfolded content line.
///
/// Format: `name *(";" param) ":" value`
///
/// ## Errors
/// Returns an error if the name is empty or contains invalid characters,
/// a parameter is malformed, a quoted value is not closed, or the colon
/// separating the value is missing.
pub fn parse_content_line(line: &str, line_num: usize) -> ParseResult<ContentLine> {
    let mut chars = line.char_indices().peekable();

    let name_end = scan_name(&mut chars, line_num, ParseErrorKind::InvalidPropertyName)?;
    if name_end == 0 {
        return Err(ParseError::new(
            ParseErrorKind::MissingPropertyName,
            line_num,
            1,
        ));
    }
    let name = line[..name_end].to_ascii_uppercase();

    let mut params = Vec::new();
    loop {
        match chars.next() {
            Some((i, ':')) => {
                return Ok(ContentLine {
                    name,
                    params,
                    raw_value: line[i + 1..].to_string(),
                });
            }
            Some((_, ';')) => params.push(parse_parameter(&mut chars, line, line_num)?),
            Some((i, c)) => {
                return Err(
                    ParseError::new(ParseErrorKind::InvalidParameter, line_num, i + 1)
                        .with_context(format!("unexpected character '{c}'")),
                );
            }
            None => {
                return Err(ParseError::new(
                    ParseErrorKind::MissingColon,
                    line_num,
                    line.len(),
                ));
            }
        }
    }
}

/// Consumes an iana-token/x-name and returns the byte offset where it ends.
fn scan_name(
    chars: &mut Peekable<CharIndices<'_>>,
    line_num: usize,
    kind: ParseErrorKind,
) -> ParseResult<usize> {
    let mut end = chars.peek().map_or(0, |&(i, _)| i);
    while let Some(&(i, c)) = chars.peek() {
        if matches!(c, ';' | ':' | '=') {
            return Ok(i);
        }
        if !c.is_ascii_alphanumeric() && c != '-' {
            return Err(ParseError::new(kind, line_num, i + 1));
        }
        end = i + c.len_utf8();
        chars.next();
    }
    Ok(end)
}

/// Parses `name=value[,value...]` after a `;`, leaving the following
/// `;` or `:` unconsumed.
fn parse_parameter(
    chars: &mut Peekable<CharIndices<'_>>,
    line: &str,
    line_num: usize,
) -> ParseResult<Parameter> {
    let start = chars.peek().map_or(line.len(), |&(i, _)| i);
    let end = scan_name(chars, line_num, ParseErrorKind::InvalidParameter)?;
    if end == start || !matches!(chars.next(), Some((_, '='))) {
        return Err(ParseError::new(
            ParseErrorKind::InvalidParameter,
            line_num,
            start + 1,
        ));
    }
    let name = &line[start..end];

    let mut values = vec![parse_param_value(chars, line, line_num)?];
    while matches!(chars.peek(), Some(&(_, ','))) {
        chars.next();
        values.push(parse_param_value(chars, line, line_num)?);
    }

    Ok(Parameter::with_values(name, values))
}

/// Parses one parameter value, quoted (with RFC 6868 caret escapes) or bare.
fn parse_param_value(
    chars: &mut Peekable<CharIndices<'_>>,
    line: &str,
    line_num: usize,
) -> ParseResult<String> {
    let Some(&(start, first)) = chars.peek() else {
        return Err(ParseError::new(
            ParseErrorKind::MissingColon,
            line_num,
            line.len(),
        ));
    };

    if first != '"' {
        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            if matches!(c, ',' | ';' | ':') {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }
        return Ok(line[start..end].to_string());
    }

    chars.next();
    let mut value = String::new();
    while let Some((_, c)) = chars.next() {
        match c {
            '"' => return Ok(value),
            '^' => match chars.peek().map(|&(_, next)| next) {
                Some('^') => {
                    value.push('^');
                    chars.next();
                }
                Some('n') => {
                    value.push('\n');
                    chars.next();
                }
                Some('\'') => {
                    value.push('"');
                    chars.next();
                }
                _ => value.push('^'),
            },
            _ => value.push(c),
        }
    }

    Err(ParseError::new(
        ParseErrorKind::UnclosedQuote,
        line_num,
        start + 1,
    ))
}
