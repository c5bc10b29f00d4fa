//! Object header lines
//!
//! `--- !u!<class_id> &<file_id>[ stripped]`. The file id is a signed
//! 64-bit integer; Unity generates negative ids routinely.

use crate::constants::{ANCHOR_PREFIX, CLASS_TAG_PREFIX, DOCUMENT_START, STRIPPED_MARKER};
use unity_prefab_core::{FileId, PrefabError, Result};

/// Parsed header of one object block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    pub class_id: u32,
    pub file_id: FileId,
    pub stripped: bool,
}

impl ObjectHeader {
    /// Parse a header line (without its line break); `line_number` is 1-based
    pub fn parse(line: &str, line_number: usize) -> Result<Self> {
        let rest = line
            .strip_prefix(DOCUMENT_START)
            .ok_or_else(|| PrefabError::parse(line_number, "expected '---' document start"))?;
        let mut parts = rest.split_whitespace();

        let tag = parts
            .next()
            .ok_or_else(|| PrefabError::parse(line_number, "missing '!u!<class_id>' tag"))?;
        let class_id = tag
            .strip_prefix(CLASS_TAG_PREFIX)
            .ok_or_else(|| PrefabError::parse(line_number, format!("expected '!u!' tag, found '{}'", tag)))?
            .parse::<u32>()
            .map_err(|e| PrefabError::parse(line_number, format!("invalid class id in '{}': {}", tag, e)))?;

        let anchor = parts
            .next()
            .ok_or_else(|| PrefabError::parse(line_number, "missing '&<file_id>' anchor"))?;
        let file_id = anchor
            .strip_prefix(ANCHOR_PREFIX)
            .ok_or_else(|| PrefabError::parse(line_number, format!("expected '&' anchor, found '{}'", anchor)))?
            .parse::<i64>()
            .map_err(|e| PrefabError::parse(line_number, format!("invalid file id in '{}': {}", anchor, e)))?;

        let stripped = match parts.next() {
            None => false,
            Some(STRIPPED_MARKER) => true,
            Some(other) => {
                return Err(PrefabError::parse(
                    line_number,
                    format!("unexpected header token '{}'", other),
                ));
            }
        };
        if let Some(extra) = parts.next() {
            return Err(PrefabError::parse(
                line_number,
                format!("unexpected header token '{}'", extra),
            ));
        }

        Ok(Self {
            class_id,
            file_id,
            stripped,
        })
    }

    /// True for any line that opens a new block
    pub fn is_header_line(line: &str) -> bool {
        line.starts_with(DOCUMENT_START)
    }
}
