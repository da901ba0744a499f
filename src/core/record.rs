//! Flat record arrays: `[ { "key": "value", "list": ["a", "b"] }, ... ]`.
//!
//! Only the fixed grammar the data files use is understood. Values are
//! either a quoted string or a list of quoted strings; bare scalars are
//! tolerated and dropped. Anything else makes the enclosing block malformed,
//! and malformed blocks are skipped and counted rather than reported as
//! errors.

use crate::core::codec::{find_closing_quote, quote, unescape};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

/// One record, fields kept in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, key: &str, value: impl Into<String>) -> Self {
        self.insert(key, FieldValue::Text(value.into()));
        self
    }

    pub fn with_list<I, S>(mut self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(key, FieldValue::List(values.into_iter().map(Into::into).collect()));
        self
    }

    /// Replaces an existing field in place, so a repeated key keeps the last value.
    pub fn insert(&mut self, key: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key.to_string(), value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            FieldValue::Text(s) => Some(s),
            FieldValue::List(_) => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.get(key)? {
            FieldValue::List(items) => Some(items),
            FieldValue::Text(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Result of parsing a record array.
#[derive(Debug, Default)]
pub struct ParsedRecords {
    pub records: Vec<Record>,
    /// Blocks that were present but could not be parsed.
    pub skipped: usize,
    /// The text was not wrapped in `[` ... `]` at all.
    pub rejected: bool,
}

/// Splits the body of a record array into `{...}` blocks.
///
/// Depth is only tracked outside quoted strings, so braces and commas inside
/// values never split a record. Returns the blocks plus the number of stray
/// fragments (text outside any block, or a block left unterminated).
pub fn frame_blocks(body: &str) -> (Vec<&str>, usize) {
    let bytes = body.as_bytes();
    let mut blocks = Vec::new();
    let mut stray = 0;
    let mut depth = 0usize;
    let mut block_start = 0;
    let mut in_string = false;
    let mut escaped = false;
    let mut in_stray = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'{' => {
                if depth == 0 {
                    block_start = i;
                    in_stray = false;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    blocks.push(&body[block_start..=i]);
                }
            }
            b'"' if depth > 0 => in_string = true,
            b',' | b' ' | b'\n' | b'\r' | b'\t' if depth == 0 => in_stray = false,
            _ if depth == 0 => {
                if !in_stray {
                    stray += 1;
                    in_stray = true;
                }
                if b == b'"' {
                    in_string = true;
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        stray += 1;
    }
    (blocks, stray)
}

pub fn parse_records(input: &str) -> ParsedRecords {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return ParsedRecords::default();
    }
    if !trimmed.starts_with('[') || !trimmed.ends_with(']') {
        return ParsedRecords {
            rejected: true,
            ..ParsedRecords::default()
        };
    }

    let (blocks, stray) = frame_blocks(&trimmed[1..trimmed.len() - 1]);
    let mut parsed = ParsedRecords {
        skipped: stray,
        ..ParsedRecords::default()
    };
    for block in blocks {
        match parse_record(block) {
            Some(record) => parsed.records.push(record),
            None => parsed.skipped += 1,
        }
    }
    parsed
}

/// Parses one `{...}` block. `None` when the block does not fit the grammar.
pub fn parse_record(block: &str) -> Option<Record> {
    let block = block.trim();
    let inner = block.strip_prefix('{')?.strip_suffix('}')?;
    let mut cursor = Cursor::new(inner);
    let mut record = Record::new();

    cursor.skip_ws();
    if cursor.at_end() {
        return Some(record);
    }
    loop {
        cursor.skip_ws();
        let key = cursor.string()?;
        cursor.skip_ws();
        cursor.expect(b':')?;
        cursor.skip_ws();
        match cursor.peek()? {
            b'"' => record.insert(&key, FieldValue::Text(cursor.string()?)),
            b'[' => record.insert(&key, FieldValue::List(cursor.list()?)),
            _ => cursor.bare_scalar()?,
        }
        cursor.skip_ws();
        if cursor.at_end() {
            return Some(record);
        }
        cursor.expect(b',')?;
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\n' | b'\r' | b'\t')) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        if self.peek()? == byte {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn string(&mut self) -> Option<String> {
        self.expect(b'"')?;
        let end = find_closing_quote(self.text, self.pos)?;
        let value = unescape(&self.text[self.pos..end]);
        self.pos = end + 1;
        Some(value)
    }

    fn list(&mut self) -> Option<Vec<String>> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek()? == b']' {
            self.pos += 1;
            return Some(items);
        }
        loop {
            self.skip_ws();
            items.push(self.string()?);
            self.skip_ws();
            match self.peek()? {
                b',' => self.pos += 1,
                b']' => {
                    self.pos += 1;
                    return Some(items);
                }
                _ => return None,
            }
        }
    }

    /// Consumes `true`, `null`, `42` and the like.
    fn bare_scalar(&mut self) -> Option<()> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'+' | b'.'))
        {
            self.pos += 1;
        }
        (self.pos > start).then_some(())
    }
}

/// Renders records as a pretty-printed array, one field per line.
pub fn render_records(records: &[Record]) -> String {
    let mut out = String::from("[\n");
    for (i, record) in records.iter().enumerate() {
        if i > 0 {
            out.push_str(",\n");
        }
        out.push_str("  {\n");
        let count = record.len();
        for (j, (key, value)) in record.fields().enumerate() {
            out.push_str("    ");
            out.push_str(&quote(key));
            out.push_str(": ");
            match value {
                FieldValue::Text(s) => out.push_str(&quote(s)),
                FieldValue::List(items) => {
                    let quoted: Vec<String> = items.iter().map(|s| quote(s)).collect();
                    out.push('[');
                    out.push_str(&quoted.join(", "));
                    out.push(']');
                }
            }
            if j + 1 < count {
                out.push(',');
            }
            out.push('\n');
        }
        out.push_str("  }");
    }
    out.push_str("\n]\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const USERS: &str = r#"[
  {
    "username": "alice",
    "password": "pw1",
    "followers": ["bob"],
    "following": []
  },
  {
    "username": "bob",
    "password": "pw2",
    "followers": [],
    "following": ["alice"]
  }
]"#;

    #[test]
    fn parses_fixed_shape_records() {
        let parsed = parse_records(USERS);
        assert_eq!(parsed.skipped, 0);
        assert!(!parsed.rejected);
        assert_eq!(parsed.records.len(), 2);

        let alice = &parsed.records[0];
        assert_eq!(alice.text("username"), Some("alice"));
        assert_eq!(alice.list("followers"), Some(&["bob".to_string()][..]));
        assert_eq!(alice.list("following"), Some(&[][..]));
        assert_eq!(alice.text("followers"), None);
    }

    #[test]
    fn values_with_braces_and_commas_stay_in_one_record() {
        let input = r#"[{"text": "a }, { b", "tags": ["x,y", "}"]}, {"text": "second"}]"#;
        let parsed = parse_records(input);
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[0].text("text"), Some("a }, { b"));
        assert_eq!(
            parsed.records[0].list("tags"),
            Some(&["x,y".to_string(), "}".to_string()][..])
        );
        assert_eq!(parsed.records[1].text("text"), Some("second"));
    }

    #[test]
    fn escaped_values_are_unescaped() {
        let input = r#"[{"text": "say \"hi\"\nbye \\ done"}]"#;
        let parsed = parse_records(input);
        assert_eq!(parsed.records[0].text("text"), Some("say \"hi\"\nbye \\ done"));
    }

    #[test]
    fn malformed_blocks_are_skipped_and_counted() {
        let input = r#"[
  {"username": "ok", "password": "x"},
  {"username" "missing colon"},
  {"username": "unterminated},
  {"username": "also ok", "password": "y"}
]"#;
        let parsed = parse_records(input);
        let names: Vec<_> = parsed.records.iter().filter_map(|r| r.text("username")).collect();
        assert_eq!(names, vec!["ok"]);
        // The unterminated string swallows the rest of the array.
        assert!(parsed.skipped >= 2);
    }

    #[test]
    fn stray_text_between_blocks_is_counted() {
        let parsed = parse_records(r#"[{"a": "1"}, garbage, {"a": "2"}]"#);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn bare_scalars_are_ignored() {
        let parsed = parse_records(r#"[{"username": "a", "visible": true, "age": 42}]"#);
        assert_eq!(parsed.skipped, 0);
        let record = &parsed.records[0];
        assert_eq!(record.len(), 1);
        assert_eq!(record.text("username"), Some("a"));
    }

    #[test]
    fn last_duplicate_key_wins() {
        let parsed = parse_records(r#"[{"k": "first", "k": "second"}]"#);
        assert_eq!(parsed.records[0].text("k"), Some("second"));
        assert_eq!(parsed.records[0].len(), 1);
    }

    #[test]
    fn wrapper_problems() {
        let parsed = parse_records(r#"{"username": "a"}"#);
        assert!(parsed.rejected);
        assert!(parsed.records.is_empty());

        let parsed = parse_records("");
        assert!(!parsed.rejected);
        assert!(parsed.records.is_empty());

        let parsed = parse_records("[\n\n]");
        assert!(!parsed.rejected);
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn empty_object_is_a_record() {
        let parsed = parse_records("[{}]");
        assert_eq!(parsed.records.len(), 1);
        assert!(parsed.records[0].is_empty());
    }

    #[test]
    fn render_then_parse_keeps_fields() {
        let records = vec![
            Record::new()
                .with_text("author", "bob")
                .with_text("text", "tricky \"}, {\" text\twith\ttabs")
                .with_list("hashtags", ["one", "two"]),
            Record::new().with_text("author", "eve").with_list("hashtags", Vec::<String>::new()),
        ];
        let rendered = render_records(&records);
        assert!(rendered.starts_with("[\n  {\n    \"author\": \"bob\",\n"));

        let parsed = parse_records(&rendered);
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.records, records);
    }

    #[test]
    fn render_empty_array() {
        let rendered = render_records(&[]);
        let parsed = parse_records(&rendered);
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.skipped, 0);
        assert!(!parsed.rejected);
    }
}
