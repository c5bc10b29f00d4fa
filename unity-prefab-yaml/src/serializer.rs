//! Unity YAML serializer
//!
//! Unedited objects are written back from their retained source text.
//! Edited or synthesized objects are rendered the way the Unity editor
//! writes them:
//! - `--- !u!<class_id> &<file_id>[ stripped]` headers
//! - two-space indentation, block sequences at their key's indent
//! - references and small numeric mappings in flow style
//! - the document's own line ending

use crate::constants::{INDENT_SIZE, LineEnding, UNITY_TAG_URI, UNITY_YAML_VERSION};
use crate::scalar::{format_float, looks_numeric, needs_quoting, quote};
use indexmap::IndexMap;
use std::fmt::Write;
use std::fs;
use std::path::Path;
use tracing::instrument;
use unity_prefab_core::{Document, Object, Result, Scalar, Value};

/// Unity YAML serializer
#[derive(Debug, Clone)]
pub struct UnityYamlSerializer {
    /// Line ending override; defaults to the document's own
    line_ending: Option<LineEnding>,
    /// Indent size (Unity uses 2 spaces)
    indent_size: usize,
}

impl UnityYamlSerializer {
    /// Create a new Unity YAML serializer
    pub fn new() -> Self {
        Self {
            line_ending: None,
            indent_size: INDENT_SIZE,
        }
    }

    /// Force a line ending style for rendered objects
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = Some(line_ending);
        self
    }

    /// Serialize a document to a string
    #[instrument(skip_all, fields(objects = document.len()))]
    pub fn serialize_document(&self, document: &Document) -> String {
        let le = self.line_ending.unwrap_or(document.line_ending).as_str();
        let mut out = String::new();

        if document.preamble.is_empty() && !document.from_source && !document.is_empty() {
            self.write_yaml_header(&mut out, le);
        } else {
            out.push_str(&document.preamble);
        }

        let mut skipped = document.skipped().iter().peekable();
        for (position, object) in document.objects().iter().enumerate() {
            while let Some(block) = skipped.next_if(|block| block.position <= position) {
                push_block(&mut out, &block.raw, le);
            }
            match object.raw() {
                Some(raw) => push_block(&mut out, raw, le),
                None => {
                    let rendered = self.render_object(object, le);
                    push_block(&mut out, &rendered, le);
                }
            }
        }
        for block in skipped {
            push_block(&mut out, &block.raw, le);
        }
        out
    }

    /// Write YAML header (version and tags)
    fn write_yaml_header(&self, out: &mut String, le: &str) {
        let _ = write!(
            out,
            "%YAML {}.{}{}%TAG !u! {}{}",
            UNITY_YAML_VERSION.0, UNITY_YAML_VERSION.1, le, UNITY_TAG_URI, le
        );
    }

    /// Render one object, ignoring any retained source text
    pub fn render_object(&self, object: &Object, le: &str) -> String {
        let mut out = String::new();
        let _ = write!(out, "{}{}{}:", object.header(), le, object.class_name);
        match object.serialized_fields() {
            Value::Mapping(map) if !map.is_empty() => {
                out.push_str(le);
                self.write_mapping(&mut out, map, 1, false, le);
            }
            Value::Mapping(_) => {
                let _ = write!(out, " {{}}{}", le);
            }
            other => {
                out.push(' ');
                self.write_inline(&mut out, other, None, false);
                out.push_str(le);
            }
        }
        out
    }

    fn write_indent(&self, out: &mut String, level: usize) {
        out.extend(std::iter::repeat_n(' ', level * self.indent_size));
    }

    /// Write mapping entries at `level`; with `continued` the first key
    /// follows a sequence dash on the current line
    fn write_mapping(
        &self,
        out: &mut String,
        map: &IndexMap<String, Value>,
        level: usize,
        continued: bool,
        le: &str,
    ) {
        for (i, (key, value)) in map.iter().enumerate() {
            if !(continued && i == 0) {
                self.write_indent(out, level);
            }
            self.write_key(out, key);
            out.push(':');
            self.write_entry_value(out, key, value, level, le);
        }
    }

    fn write_key(&self, out: &mut String, key: &str) {
        if needs_quoting(key, None, false) {
            out.push_str(&quote(key));
        } else {
            out.push_str(key);
        }
    }

    /// Value part of a `key:` line, including the line break
    fn write_entry_value(&self, out: &mut String, key: &str, value: &Value, level: usize, le: &str) {
        match value {
            Value::Mapping(map) if !map.is_empty() && !is_flow_mapping(map) => {
                out.push_str(le);
                self.write_mapping(out, map, level + 1, false, le);
            }
            Value::Sequence(items) if !items.is_empty() => {
                out.push_str(le);
                self.write_sequence(out, items, level, le);
            }
            Value::Scalar(Scalar::Null) => {
                out.push(' ');
                out.push_str(le);
            }
            other => {
                out.push(' ');
                self.write_inline(out, other, Some(key), false);
                out.push_str(le);
            }
        }
    }

    /// Block sequence with dashes at `level`
    fn write_sequence(&self, out: &mut String, items: &[Value], level: usize, le: &str) {
        for item in items {
            self.write_indent(out, level);
            out.push('-');
            match item {
                Value::Mapping(map) if !map.is_empty() && !is_flow_mapping(map) => {
                    out.push(' ');
                    self.write_mapping(out, map, level + 1, true, le);
                }
                Value::Sequence(nested) if !nested.is_empty() => {
                    out.push_str(le);
                    self.write_sequence(out, nested, level + 1, le);
                }
                Value::Scalar(Scalar::Null) => out.push_str(le),
                other => {
                    out.push(' ');
                    self.write_inline(out, other, None, false);
                    out.push_str(le);
                }
            }
        }
    }

    /// Single-line rendering
    fn write_inline(&self, out: &mut String, value: &Value, key: Option<&str>, flow: bool) {
        match value {
            Value::Scalar(scalar) => write_scalar(out, scalar, key, flow),
            Value::Reference(reference) => {
                let _ = write!(out, "{}", reference);
            }
            Value::Sequence(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_inline(out, item, None, true);
                }
                out.push(']');
            }
            Value::Mapping(map) => {
                out.push('{');
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if needs_quoting(k, None, true) {
                        out.push_str(&quote(k));
                    } else {
                        out.push_str(k);
                    }
                    out.push_str(": ");
                    self.write_inline(out, v, Some(k), true);
                }
                out.push('}');
            }
        }
    }
}

impl Default for UnityYamlSerializer {
    fn default() -> Self {
        Self::new()
    }
}

fn write_scalar(out: &mut String, scalar: &Scalar, key: Option<&str>, flow: bool) {
    match scalar {
        Scalar::Null => {}
        Scalar::Bool(b) => {
            let _ = write!(out, "{}", b);
        }
        Scalar::Integer(i) => {
            let _ = write!(out, "{}", i);
        }
        Scalar::Float(f) => out.push_str(&format_float(*f)),
        Scalar::String(s) => {
            if needs_quoting(s, key, flow) {
                out.push_str(&quote(s));
            } else {
                out.push_str(s);
            }
        }
    }
}

/// Small mappings of plain numbers (or number-like text such as `1.0`) are written in flow style (`{x: 0, y: 0, z: 0}`)
fn is_flow_mapping(map: &IndexMap<String, Value>) -> bool {
    map.len() <= 4
        && map
            .values()
            .all(|value| match value {
                Value::Scalar(Scalar::Integer(_) | Scalar::Float(_)) => true,
                Value::Scalar(Scalar::String(text)) => looks_numeric(text),
                _ => false,
            })
}

/// Append a block, making sure it starts on a fresh line
fn push_block(out: &mut String, block: &str, le: &str) {
    if !out.is_empty() && !out.ends_with('\n') && !block.is_empty() {
        out.push_str(le);
    }
    out.push_str(block);
}

/// Serialize a document with default settings
pub fn serialize_document(document: &Document) -> String {
    UnityYamlSerializer::new().serialize_document(document)
}

/// Serialize a document and write it to `path`
pub fn save_document<P: AsRef<Path>>(document: &Document, path: P) -> Result<()> {
    fs::write(path, serialize_document(document))?;
    Ok(())
}
