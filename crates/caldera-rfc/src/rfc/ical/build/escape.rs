//! Escaping for TEXT values and parameter values.

/// Escapes a TEXT value (RFC 5545 §3.3.11).
#[must_use]
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
    out
}

/// Encodes a parameter value, quoting it when it contains `:`, `;` or `,`
/// and applying RFC 6868 caret encoding inside quotes.
#[must_use]
pub fn escape_param_value(s: &str) -> String {
    let needs_quotes = s.contains([':', ';', ',']);
    let needs_caret = s.contains(['^', '\n', '"']);
    if !needs_quotes && !needs_caret {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '^' => out.push_str("^^"),
            '\n' => out.push_str("^n"),
            '"' => out.push_str("^'"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
