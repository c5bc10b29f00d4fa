//! Indentation-scoped body grammar
//!
//! Parses the body of one object block (everything after its header line)
//! into a `Value`. Handles block mappings, block sequences written either
//! indented or at their parent key's indent, flow collections, quoted
//! scalars, and multi-line scalar continuation.

use crate::scalar::{fold_lines, parse_inline, parse_quoted_prefix};
use indexmap::IndexMap;
use unity_prefab_core::{PrefabError, Result, Value};

/// One source line of a block body
#[derive(Debug, Clone)]
struct Line {
    /// 1-based line number in the whole document
    number: usize,
    indent: usize,
    /// Content after the indentation, without the line break
    text: String,
}

impl Line {
    fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

fn is_sequence_item(text: &str) -> bool {
    text == "-" || text.starts_with("- ")
}

/// Split `key: rest`; the key may be quoted
fn split_key(text: &str, line: usize) -> Result<(String, &str)> {
    if text.starts_with('"') || text.starts_with('\'') {
        let (key, rest) = parse_quoted_prefix(text, line)?;
        let rest = rest
            .trim_start()
            .strip_prefix(':')
            .ok_or_else(|| PrefabError::parse(line, format!("expected ':' after key '{}'", key)))?;
        if !rest.is_empty() && !rest.starts_with(' ') {
            return Err(PrefabError::parse(line, "expected a space after ':'"));
        }
        return Ok((key, rest.trim()));
    }

    let bytes = text.as_bytes();
    let colon = bytes
        .iter()
        .enumerate()
        .position(|(i, &b)| b == b':' && bytes.get(i + 1).is_none_or(|&n| n == b' '))
        .ok_or_else(|| PrefabError::parse(line, format!("expected 'key: value', found '{}'", text)))?;
    let key = text[..colon].trim_end();
    if key.is_empty() {
        return Err(PrefabError::parse(line, "empty mapping key"));
    }
    Ok((key.to_string(), text[colon + 1..].trim()))
}

/// True when a sequence item's content opens a nested mapping
fn opens_mapping(text: &str, line: usize) -> bool {
    !text.starts_with('{') && !text.starts_with('[') && split_key(text, line).is_ok()
}

/// Parser over the lines of one block body
pub struct BlockParser {
    lines: Vec<Line>,
    pos: usize,
}

impl BlockParser {
    /// Prepare body lines; `first_line` is the 1-based number of `lines[0]`
    pub fn new<'a, I>(lines: I, first_line: usize) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut parsed = Vec::new();
        for (offset, raw) in lines.into_iter().enumerate() {
            let number = first_line + offset;
            let raw = raw.trim_end_matches(['\n', '\r']);
            let content = raw.trim_start_matches([' ', '\t']);
            let leading = &raw[..raw.len() - content.len()];
            if leading.contains('\t') && !content.is_empty() {
                return Err(PrefabError::parse(number, "tab character in indentation"));
            }
            parsed.push(Line {
                number,
                indent: leading.len(),
                text: content.trim_end().to_string(),
            });
        }
        Ok(Self {
            lines: parsed,
            pos: 0,
        })
    }

    /// Parse the whole body as a single node
    pub fn parse(mut self) -> Result<Value> {
        let Some(first) = self.next_structural() else {
            return Ok(Value::null());
        };
        let indent = self.lines[first].indent;
        let value = self.parse_node(indent)?;
        if let Some(extra) = self.next_structural() {
            let line = &self.lines[extra];
            return Err(PrefabError::parse(
                line.number,
                format!("unexpected content at indent {}", line.indent),
            ));
        }
        Ok(value)
    }

    /// Index of the next non-blank line, advancing past blank ones
    fn next_structural(&mut self) -> Option<usize> {
        while self.pos < self.lines.len() && self.lines[self.pos].is_blank() {
            self.pos += 1;
        }
        (self.pos < self.lines.len()).then_some(self.pos)
    }

    fn parse_node(&mut self, indent: usize) -> Result<Value> {
        match self.next_structural() {
            Some(i) if is_sequence_item(&self.lines[i].text) => self.parse_sequence(indent),
            Some(_) => self.parse_mapping(indent),
            None => Ok(Value::null()),
        }
    }

    fn parse_mapping(&mut self, indent: usize) -> Result<Value> {
        let mut map = IndexMap::new();
        while let Some(i) = self.next_structural() {
            let (number, line_indent) = (self.lines[i].number, self.lines[i].indent);
            if line_indent < indent {
                break;
            }
            if line_indent > indent {
                return Err(PrefabError::parse(
                    number,
                    format!(
                        "inconsistent indentation: expected {} spaces, found {}",
                        indent, line_indent
                    ),
                ));
            }
            if is_sequence_item(&self.lines[i].text) {
                return Err(PrefabError::parse(number, "sequence item where a mapping key was expected"));
            }

            let text = std::mem::take(&mut self.lines[i].text);
            self.pos = i + 1;
            let (key, rest) = split_key(&text, number)?;

            let value = if rest.is_empty() {
                match self.next_structural() {
                    Some(next) if self.lines[next].indent > indent => {
                        let child_indent = self.lines[next].indent;
                        self.parse_node(child_indent)?
                    }
                    // Unity writes sequences at the indent of their key
                    Some(next)
                        if self.lines[next].indent == indent
                            && is_sequence_item(&self.lines[next].text) =>
                    {
                        self.parse_sequence(indent)?
                    }
                    _ => Value::null(),
                }
            } else {
                self.parse_scalar_lines(rest, indent, number, Some(&key))?
            };

            if map.contains_key(&key) {
                return Err(PrefabError::parse(number, format!("duplicate key '{}'", key)));
            }
            map.insert(key, value);
        }
        Ok(Value::Mapping(map))
    }

    fn parse_sequence(&mut self, indent: usize) -> Result<Value> {
        let mut items = Vec::new();
        while let Some(i) = self.next_structural() {
            let (number, line_indent) = (self.lines[i].number, self.lines[i].indent);
            if line_indent != indent || !is_sequence_item(&self.lines[i].text) {
                if line_indent > indent {
                    return Err(PrefabError::parse(
                        number,
                        format!(
                            "inconsistent indentation: expected {} spaces, found {}",
                            indent, line_indent
                        ),
                    ));
                }
                break;
            }

            let text = std::mem::take(&mut self.lines[i].text);
            let after_dash = &text[1..];
            let content = after_dash.trim_start();
            let offset = 1 + after_dash.len() - content.len();

            let item = if content.is_empty() {
                self.pos = i + 1;
                match self.next_structural() {
                    Some(next) if self.lines[next].indent > indent => {
                        let child_indent = self.lines[next].indent;
                        self.parse_node(child_indent)?
                    }
                    _ => Value::null(),
                }
            } else if is_sequence_item(content) || opens_mapping(content, number) {
                // Re-read the item's content as a node starting at its own column
                let child_indent = indent + offset;
                self.lines[i].indent = child_indent;
                self.lines[i].text = content.to_string();
                self.pos = i;
                self.parse_node(child_indent)?
            } else {
                self.pos = i + 1;
                self.parse_scalar_lines(content, indent, number, None)?
            };
            items.push(item);
        }
        Ok(Value::Sequence(items))
    }

    /// Parse an inline value plus any more-indented continuation lines
    fn parse_scalar_lines(
        &mut self,
        first: &str,
        parent_indent: usize,
        number: usize,
        key: Option<&str>,
    ) -> Result<Value> {
        let mut end = self.pos;
        let mut scan = self.pos;
        while scan < self.lines.len() {
            let line = &self.lines[scan];
            if line.is_blank() {
                scan += 1;
                continue;
            }
            if line.indent <= parent_indent {
                break;
            }
            scan += 1;
            end = scan;
        }

        if end == self.pos {
            return parse_inline(first, number, key);
        }

        let continuation = &self.lines[self.pos..end];
        let joined = match first.chars().next() {
            Some('{') | Some('[') => {
                let mut parts = vec![first];
                parts.extend(continuation.iter().map(|line| line.text.as_str()));
                parts.join(" ")
            }
            Some(quote) => {
                let plain = quote != '"' && quote != '\'';
                if plain
                    && let Some(line) = continuation
                        .iter()
                        .find(|line| is_sequence_item(&line.text) || opens_mapping(&line.text, line.number))
                {
                    return Err(PrefabError::parse(
                        line.number,
                        format!(
                            "inconsistent indentation: expected {} spaces, found {}",
                            parent_indent, line.indent
                        ),
                    ));
                }
                let mut parts = vec![first];
                parts.extend(continuation.iter().map(|line| line.text.as_str()));
                fold_lines(&parts, quote == '"')
            }
            None => String::new(),
        };
        self.pos = end;
        parse_inline(&joined, number, key)
    }
}

/// Parse a block body into `(class_name, content)`
pub fn parse_body<'a, I>(lines: I, first_line: usize) -> Result<(String, Value)>
where
    I: IntoIterator<Item = &'a str>,
{
    let value = BlockParser::new(lines, first_line)?.parse()?;
    let Value::Mapping(map) = value else {
        return Err(PrefabError::parse(first_line, "missing class name line"));
    };
    if map.len() != 1 {
        return Err(PrefabError::parse(
            first_line,
            format!("expected a single class mapping, found {} keys", map.len()),
        ));
    }
    let Some((class_name, content)) = map.into_iter().next() else {
        return Err(PrefabError::parse(first_line, "missing class name line"));
    };
    let content = if content.is_null() {
        Value::Mapping(IndexMap::new())
    } else {
        content
    };
    Ok((class_name, content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use unity_prefab_core::Reference;

    fn body(text: &str) -> Result<(String, Value)> {
        parse_body(text.lines(), 2)
    }

    #[test]
    fn test_simple_mapping() {
        let (class_name, content) = body("GameObject:\n  m_Name: Player\n  m_IsActive: 1\n").unwrap();
        assert_eq!(class_name, "GameObject");
        assert_eq!(content.get("m_Name"), Some(&Value::from("Player")));
        assert_eq!(content.get("m_IsActive"), Some(&Value::from(1)));
    }

    #[test]
    fn test_sequence_at_parent_indent() {
        let text = "GameObject:\n  m_Component:\n  - component: {fileID: 4}\n  - component: {fileID: 114}\n  m_Layer: 0\n";
        let (_, content) = body(text).unwrap();
        let components = content.get("m_Component").unwrap().as_sequence().unwrap();
        assert_eq!(components.len(), 2);
        assert_eq!(components[1].reference("component"), Some(&Reference::local(114)));
        assert_eq!(content.get("m_Layer"), Some(&Value::from(0)));
    }

    #[test]
    fn test_indented_sequence_of_mappings() {
        let text = "PrefabInstance:\n  m_Modification:\n    m_Modifications:\n      - target: {fileID: 1}\n        propertyPath: m_Name\n        value: Door\n        objectReference: {fileID: 0}\n      - target: {fileID: 2}\n        propertyPath: m_IsActive\n        value: \n        objectReference: {fileID: 0}\n    m_RemovedComponents: []\n";
        let (_, content) = body(text).unwrap();
        let modification = content.get("m_Modification").unwrap();
        let entries = modification.get("m_Modifications").unwrap().as_sequence().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].get("value"), Some(&Value::from("Door")));
        assert_eq!(entries[1].get("value"), Some(&Value::null()));
        assert_eq!(modification.get("m_RemovedComponents"), Some(&Value::Sequence(vec![])));
    }

    #[test]
    fn test_multiline_plain_scalar() {
        let text = "MonoBehaviour:\n  m_Text: first line\n    continues here\n\n    next paragraph\n  m_Enabled: 1\n";
        let (_, content) = body(text).unwrap();
        assert_eq!(
            content.get("m_Text"),
            Some(&Value::from("first line continues here\nnext paragraph"))
        );
        assert_eq!(content.get("m_Enabled"), Some(&Value::from(1)));
    }

    #[test]
    fn test_multiline_double_quoted_scalar() {
        let text = "MonoBehaviour:\n  m_Text: \"Hello\n    world\\n\"\n";
        let (_, content) = body(text).unwrap();
        assert_eq!(content.get("m_Text"), Some(&Value::from("Hello world\n")));
    }

    #[test]
    fn test_multiline_flow_mapping() {
        let text = "MonoBehaviour:\n  m_Script: {fileID: 11500000, guid: abc,\n    type: 3}\n";
        let (_, content) = body(text).unwrap();
        assert_eq!(
            content.reference("m_Script"),
            Some(&Reference::external(11500000, "abc", 3))
        );
    }

    #[test]
    fn test_nested_mapping_and_empty_values() {
        let text = "Transform:\n  m_LocalRotation: {x: 0, y: 0, z: 0, w: 1}\n  m_Extra:\n    inner:\n      deep: value\n  m_Empty:\n";
        let (_, content) = body(text).unwrap();
        assert_eq!(
            content.get("m_Extra").and_then(|v| v.get("inner")).and_then(|v| v.get("deep")),
            Some(&Value::from("value"))
        );
        assert_eq!(content.get("m_Empty"), Some(&Value::null()));
    }

    #[test]
    fn test_inconsistent_indentation() {
        let err = body("GameObject:\n  m_Name: a\n   m_Layer: 0\n").unwrap_err();
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn test_duplicate_key() {
        let err = body("GameObject:\n  m_Name: a\n  m_Name: b\n").unwrap_err();
        assert_eq!(err.line(), Some(4));
    }

    #[test]
    fn test_missing_class_line() {
        assert!(body("- just a list\n").is_err());
        assert!(body("GameObject: {}\nTransform: {}\n").is_err());
    }

    #[test]
    fn test_tab_indentation_rejected() {
        let err = body("GameObject:\n\tm_Name: a\n").unwrap_err();
        assert_eq!(err.line(), Some(3));
    }
}
