//! Unity YAML loader
//!
//! Splits a document on its object headers and parses each block body.
//! Every object keeps its exact source text, so an unedited document
//! serializes back byte for byte.

use crate::block::parse_body;
use crate::header::ObjectHeader;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{debug, instrument, warn};
use unity_prefab_core::{Document, LineEnding, Object, PrefabError, Result, SkippedBlock};

#[cfg(feature = "async")]
use tokio::io::{AsyncRead, AsyncReadExt};

/// How the loader treats a block it cannot parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseMode {
    /// The first error fails the whole document
    #[default]
    Strict,
    /// Malformed blocks are recorded in `Document::skipped` and parsing continues
    BestEffort,
}

/// Unity YAML loader
#[derive(Debug, Clone, Default)]
pub struct UnityYamlLoader {
    mode: ParseMode,
}

impl UnityYamlLoader {
    /// Create a strict loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parse mode
    pub fn with_mode(mut self, mode: ParseMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Load a document from a string
    #[instrument(skip_all, fields(bytes = text.len(), mode = ?self.mode))]
    pub fn load_from_str(&self, text: &str) -> Result<Document> {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let headers: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, line)| ObjectHeader::is_header_line(line))
            .map(|(i, _)| i)
            .collect();

        let preamble_end = headers.first().copied().unwrap_or(lines.len());
        let mut document = Document::new();
        document.preamble = lines[..preamble_end].concat();
        document.line_ending = LineEnding::detect(text);
        document.from_source = true;
        self.check_preamble(&lines[..preamble_end], &mut document)?;

        for (k, &start) in headers.iter().enumerate() {
            let end = headers.get(k + 1).copied().unwrap_or(lines.len());
            let block = &lines[start..end];
            let parsed = parse_object(block, start + 1).and_then(|object| {
                if document.contains(object.file_id) {
                    Err(PrefabError::parse(
                        start + 1,
                        format!("duplicate file id &{}", object.file_id),
                    ))
                } else {
                    Ok(object)
                }
            });

            match parsed {
                Ok(object) => document.insert(object),
                Err(err) if self.mode == ParseMode::BestEffort => {
                    let line = err.line().unwrap_or(start + 1);
                    warn!(line, error = %err, "skipping malformed block");
                    document.push_skipped(SkippedBlock {
                        line,
                        reason: err.to_string(),
                        position: document.len(),
                        raw: block.concat(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        debug!(
            objects = document.len(),
            skipped = document.skipped().len(),
            "parsed document"
        );
        Ok(document)
    }

    /// Load a document from a reader
    pub fn load_from_reader<R: Read>(&self, mut reader: R) -> Result<Document> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        self.load_from_str(&content)
    }

    /// Load a document from an async reader
    #[cfg(feature = "async")]
    pub async fn load_from_async_reader<R: AsyncRead + Unpin>(&self, mut reader: R) -> Result<Document> {
        let mut content = String::new();
        reader.read_to_string(&mut content).await?;
        self.load_from_str(&content)
    }

    /// Load a document from a file, recording its path
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<Document> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        Ok(self.load_from_str(&text)?.with_path(path))
    }

    /// Anything before the first header must be directives, comments, or blank
    fn check_preamble(&self, lines: &[&str], document: &mut Document) -> Result<()> {
        let Some((i, line)) = lines.iter().enumerate().find(|(_, line)| {
            let trimmed = line.trim();
            !(trimmed.is_empty() || trimmed.starts_with('%') || trimmed.starts_with('#'))
        }) else {
            return Ok(());
        };
        let err = PrefabError::parse(i + 1, format!("content before the first object header: '{}'", line.trim()));
        match self.mode {
            ParseMode::Strict => Err(err),
            ParseMode::BestEffort => {
                warn!(line = i + 1, "content before the first object header");
                document.push_skipped(SkippedBlock {
                    line: i + 1,
                    reason: err.to_string(),
                    position: 0,
                    raw: String::new(),
                });
                Ok(())
            }
        }
    }
}

/// Parse one block: its header line followed by the body; `line_number` is the header's 1-based line
fn parse_object(block: &[&str], line_number: usize) -> Result<Object> {
    let Some((header_line, body)) = block.split_first() else {
        return Err(PrefabError::parse(line_number, "empty block"));
    };
    let header = ObjectHeader::parse(header_line.trim_end_matches(['\n', '\r']), line_number)?;
    let (class_name, content) = parse_body(body.iter().copied(), line_number + 1)?;

    let object = Object::from_parts(
        header.file_id,
        header.class_id,
        class_name,
        header.stripped,
        content,
        Some(block.concat()),
    );
    if header.stripped && !object.is_stripped() {
        return Err(PrefabError::parse(
            line_number,
            format!(
                "stripped object &{} has no owning PrefabInstance reference",
                header.file_id
            ),
        ));
    }
    Ok(object)
}

/// Parse a document in strict mode
pub fn parse_document(text: &str) -> Result<Document> {
    UnityYamlLoader::new().load_from_str(text)
}

/// Parse a document with an explicit mode
pub fn parse_document_with(text: &str, mode: ParseMode) -> Result<Document> {
    UnityYamlLoader::new().with_mode(mode).load_from_str(text)
}

/// Load and strictly parse a file
pub fn load_document<P: AsRef<Path>>(path: P) -> Result<Document> {
    UnityYamlLoader::new().load_path(path)
}

/// Strictly parse everything readable from `reader`
pub fn load_from_reader<R: Read>(reader: R) -> Result<Document> {
    UnityYamlLoader::new().load_from_reader(reader)
}

/// Load and strictly parse a file on the tokio runtime
#[cfg(feature = "async")]
pub async fn load_document_async<P: AsRef<Path>>(path: P) -> Result<Document> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await?;
    Ok(parse_document(&text)?.with_path(path))
}
