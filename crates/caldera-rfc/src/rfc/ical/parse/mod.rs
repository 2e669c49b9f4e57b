//! iCalendar parsing (RFC 5545).
//!
//! - Lexer: line unfolding and content-line tokenization
//! - Values: DATE, DATE-TIME, DURATION, PERIOD, ... value parsers
//! - Parser: full document parsing into typed structures

mod error;
mod lexer;
mod parser;
mod values;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use lexer::{parse_content_line, split_lines};
pub use parser::parse;
pub use values::{
    parse_date, parse_datetime, parse_duration, parse_period, parse_utc_offset, unescape_text,
};
