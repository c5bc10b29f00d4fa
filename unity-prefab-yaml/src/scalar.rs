//! Scalars and flow collections
//!
//! Plain scalars resolve to null, bool, integer, float, or string. A
//! number resolves only when its canonical rendering is exactly the source
//! token, so re-rendered values come back byte-for-byte: `007`, `+5`, and
//! `1.0` stay strings and are written plain. Values under a `guid` key
//! always stay strings: Unity GUIDs such as
//! `0000000000000000e000000000000000` would otherwise read as floats.

use indexmap::IndexMap;
use unity_prefab_core::{PrefabError, Reference, Result, Scalar, Value, keys};

/// Resolve a plain (unquoted) scalar
pub fn resolve_plain(text: &str, key: Option<&str>) -> Value {
    if text.is_empty() || text == "~" {
        return Value::null();
    }
    if key == Some(keys::GUID) {
        return Value::from(text);
    }
    match text {
        "true" => return Value::from(true),
        "false" => return Value::from(false),
        _ => {}
    }
    if is_integer(text)
        && let Ok(i) = text.parse::<i64>()
        && i.to_string() == text
    {
        return Value::from(i);
    }
    if looks_numeric(text)
        && let Ok(f) = text.parse::<f64>()
        && format_float(f) == text
    {
        return Value::from(f);
    }
    Value::from(text)
}

/// Floats as Unity writes them: shortest round-trip form, exponent
/// notation for very small or very large magnitudes, `Infinity`/`NaN`
/// spelled out
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if f != 0.0 && (f.abs() < 1e-4 || f.abs() >= 1e16) {
        format!("{:e}", f)
    } else {
        format!("{}", f)
    }
}

fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Digits with only sign, point, and exponent characters around them
pub fn looks_numeric(text: &str) -> bool {
    text.bytes().any(|b| b.is_ascii_digit())
        && text
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E'))
}

/// True when a plain rendering of `text` would not read back as the same string
pub fn needs_quoting(text: &str, key: Option<&str>, flow: bool) -> bool {
    if text.is_empty() || text != text.trim() {
        return true;
    }
    if !matches!(resolve_plain(text, key), Value::Scalar(Scalar::String(_))) {
        return true;
    }
    let mut chars = text.chars();
    let first = chars.next().unwrap_or(' ');
    // `-`, `?`, and `:` are indicators only when followed by a space
    if matches!(first, '-' | '?' | ':') && chars.next().is_none_or(|c| c == ' ') {
        return true;
    }
    if matches!(
        first,
        ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%' | '@' | '`'
    ) {
        return true;
    }
    if text.contains(": ") || text.ends_with(':') || text.contains(" #") {
        return true;
    }
    if flow && text.contains([',', '[', ']', '{', '}', ':']) {
        return true;
    }
    text.chars().any(char::is_control)
}

/// Quote a string the way Unity does: single quotes unless escapes are required
pub fn quote(text: &str) -> String {
    if text.chars().any(char::is_control) {
        let mut out = String::with_capacity(text.len() + 2);
        out.push('"');
        for c in text.chars() {
            match c {
                '"' => out.push_str("\\\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\0' => out.push_str("\\0"),
                c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
                c => out.push(c),
            }
        }
        out.push('"');
        out
    } else {
        format!("'{}'", text.replace('\'', "''"))
    }
}

/// Fold a multi-line flow scalar into one line following YAML line folding
///
/// Single line breaks become spaces and each empty line becomes `\n`. A
/// line ending in an escaping backslash inside double quotes joins without
/// a space.
pub fn fold_lines(lines: &[&str], double_quoted: bool) -> String {
    let mut out = String::new();
    let mut pending_breaks = 0usize;
    for (i, line) in lines.iter().enumerate() {
        let text = if i == 0 { line.trim_end() } else { line.trim() };
        if i > 0 && text.is_empty() {
            pending_breaks += 1;
            continue;
        }
        if i > 0 {
            if pending_breaks > 0 {
                out.extend(std::iter::repeat_n('\n', pending_breaks));
            } else if double_quoted && ends_with_escape(&out) {
                out.pop();
            } else {
                out.push(' ');
            }
        }
        out.push_str(text);
        pending_breaks = 0;
    }
    out
}

fn ends_with_escape(text: &str) -> bool {
    text.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 1
}

/// Parse the value part of a `key: value` or `- value` line
pub fn parse_inline(text: &str, line: usize, key: Option<&str>) -> Result<Value> {
    let text = text.trim();
    match text.chars().next() {
        Some('{') | Some('[') | Some('"') | Some('\'') => {
            let mut parser = FlowParser::new(text, line);
            let value = parser.parse_value(key)?;
            parser.expect_end()?;
            Ok(value)
        }
        _ => Ok(resolve_plain(text, key)),
    }
}

/// Parse a quoted key at the start of `text`, returning it and the remainder
pub fn parse_quoted_prefix(text: &str, line: usize) -> Result<(String, &str)> {
    let mut parser = FlowParser::new(text, line);
    let key = parser.parse_quoted()?;
    Ok((key, &text[parser.pos..]))
}

/// Recursive-descent parser for flow collections and quoted scalars
struct FlowParser<'a> {
    text: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> FlowParser<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Self { text, pos: 0, line }
    }

    fn error(&self, reason: impl Into<String>) -> PrefabError {
        PrefabError::parse(self.line, reason)
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek()
            && c.is_whitespace()
        {
            self.pos += c.len_utf8();
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.skip_whitespace();
        match self.peek() {
            None => Ok(()),
            Some(c) => Err(self.error(format!("unexpected '{}' after value", c))),
        }
    }

    fn parse_value(&mut self, key: Option<&str>) -> Result<Value> {
        self.skip_whitespace();
        match self.peek() {
            Some('{') => self.parse_mapping(),
            Some('[') => self.parse_sequence(),
            Some('"') | Some('\'') => Ok(Value::from(self.parse_quoted()?)),
            Some(_) => {
                let text = self.take_plain(&[',', '}', ']']);
                Ok(resolve_plain(text, key))
            }
            None => Ok(Value::null()),
        }
    }

    /// Take a plain scalar up to one of `stops`, trimmed
    fn take_plain(&mut self, stops: &[char]) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.text[start..self.pos].trim()
    }

    fn parse_mapping(&mut self) -> Result<Value> {
        self.bump();
        let mut map = IndexMap::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('}') => {
                    self.bump();
                    break;
                }
                None => return Err(self.error("unterminated flow mapping")),
                _ => {}
            }

            let key = match self.peek() {
                Some('"') | Some('\'') => self.parse_quoted()?,
                _ => self.take_plain(&[':', ',', '}']).to_string(),
            };
            self.skip_whitespace();
            if self.bump() != Some(':') {
                return Err(self.error(format!("expected ':' after flow key '{}'", key)));
            }
            self.skip_whitespace();
            let value = match self.peek() {
                Some(',') | Some('}') => Value::null(),
                _ => self.parse_value(Some(&key))?,
            };
            if map.contains_key(&key) {
                return Err(self.error(format!("duplicate key '{}'", key)));
            }
            map.insert(key, value);

            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some('}') => break,
                Some(c) => return Err(self.error(format!("expected ',' or '}}', found '{}'", c))),
                None => return Err(self.error("unterminated flow mapping")),
            }
        }
        Ok(match Reference::from_mapping(&map) {
            Some(reference) => Value::Reference(reference),
            None => Value::Mapping(map),
        })
    }

    fn parse_sequence(&mut self) -> Result<Value> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    break;
                }
                None => return Err(self.error("unterminated flow sequence")),
                _ => {}
            }
            items.push(self.parse_value(None)?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(']') => break,
                Some(c) => return Err(self.error(format!("expected ',' or ']', found '{}'", c))),
                None => return Err(self.error("unterminated flow sequence")),
            }
        }
        Ok(Value::Sequence(items))
    }

    fn parse_quoted(&mut self) -> Result<String> {
        match self.bump() {
            Some('\'') => self.parse_single_quoted(),
            Some('"') => self.parse_double_quoted(),
            _ => Err(self.error("expected a quoted scalar")),
        }
    }

    fn parse_single_quoted(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\'') if self.peek() == Some('\'') => {
                    self.bump();
                    out.push('\'');
                }
                Some('\'') => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated single-quoted scalar")),
            }
        }
    }

    fn parse_double_quoted(&mut self) -> Result<String> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(out),
                Some('\\') => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("unterminated escape sequence"))?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '"' => out.push('"'),
                        '\\' => out.push('\\'),
                        '/' => out.push('/'),
                        ' ' => out.push(' '),
                        'x' => out.push(self.parse_hex_escape(2)?),
                        'u' => out.push(self.parse_hex_escape(4)?),
                        'U' => out.push(self.parse_hex_escape(8)?),
                        other => {
                            return Err(self.error(format!("unknown escape '\\{}'", other)));
                        }
                    }
                }
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated double-quoted scalar")),
            }
        }
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char> {
        let start = self.pos;
        let end = start + digits;
        let hex = self
            .text
            .get(start..end)
            .ok_or_else(|| self.error("truncated hex escape"))?;
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| self.error(format!("invalid hex escape '{}'", hex)))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error(format!("invalid code point {:X}", code)))
    }
}
