//! Escaping for string values in the flat record files.
//!
//! Five characters are escaped with a two-character sequence: backslash,
//! double quote, newline, carriage return and tab. Everything else is
//! written as-is (the files are UTF-8).

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape`]. Scans left to right so an escaped backslash can
/// never be re-read as the start of another sequence. Unknown sequences and
/// a trailing lone backslash are kept verbatim.
pub fn unescape(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Escaped value wrapped in double quotes.
pub fn quote(raw: &str) -> String {
    format!("\"{}\"", escape(raw))
}

/// Byte offset of the quote that closes a string whose body starts at
/// `start`, honoring backslash escapes. `None` when the string never closes.
pub fn find_closing_quote(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut escaped = false;
    for (offset, &b) in bytes.get(start..)?.iter().enumerate() {
        if escaped {
            escaped = false;
        } else if b == b'\\' {
            escaped = true;
        } else if b == b'"' {
            return Some(start + offset);
        }
    }
    None
}
