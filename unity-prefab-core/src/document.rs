//! Document model
//!
//! An ordered sequence of objects with O(1) lookup by identifier. Order is
//! the source order and is what re-serialization follows.

use crate::constants::LineEnding;
use crate::error::{PrefabError, Result};
use crate::object::{FileId, Object};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A block the best-effort parser could not read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBlock {
    /// 1-based line of the failure
    pub line: usize,
    pub reason: String,
    /// Number of objects preceding the block in source order
    pub position: usize,
    /// Source text of the whole block
    pub raw: String,
}

/// A parsed prefab, scene, or asset file
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Text before the first object header (`%YAML`, `%TAG`)
    pub preamble: String,
    /// Line ending used when re-emitting edited objects
    pub line_ending: LineEnding,
    /// Parsed from text; the serializer writes its preamble as found and
    /// never synthesizes a `%YAML` header for it
    pub from_source: bool,
    objects: Vec<Object>,
    index: HashMap<FileId, usize>,
    /// GUID of the asset this document was loaded from
    guid: Option<String>,
    path: Option<PathBuf>,
    skipped: Vec<SkippedBlock>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owning asset GUID
    pub fn with_guid<S: Into<String>>(mut self, guid: S) -> Self {
        self.guid = Some(guid.into().to_lowercase());
        self
    }

    /// Set the source path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn guid(&self) -> Option<&str> {
        self.guid.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append an object; an existing object with the same identifier is replaced in place
    pub fn insert(&mut self, object: Object) {
        match self.index.get(&object.file_id) {
            Some(&pos) => self.objects[pos] = object,
            None => {
                self.index.insert(object.file_id, self.objects.len());
                self.objects.push(object);
            }
        }
    }

    /// Remove an object, keeping the order of the rest
    pub fn remove(&mut self, file_id: FileId) -> Option<Object> {
        let pos = self.index.remove(&file_id)?;
        let object = self.objects.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(object)
    }

    /// Look up an object by identifier
    pub fn get(&self, file_id: FileId) -> Option<&Object> {
        self.index.get(&file_id).map(|&pos| &self.objects[pos])
    }

    pub fn get_mut(&mut self, file_id: FileId) -> Option<&mut Object> {
        self.index.get(&file_id).map(|&pos| &mut self.objects[pos])
    }

    /// Look up an object the caller requires to exist
    pub fn require(&self, file_id: FileId) -> Result<&Object> {
        self.get(file_id)
            .ok_or(PrefabError::ObjectNotFound { file_id })
    }

    pub fn contains(&self, file_id: FileId) -> bool {
        self.index.contains_key(&file_id)
    }

    /// Objects in document order
    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    /// Identifiers in document order
    pub fn file_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.objects.iter().map(|object| object.file_id)
    }

    /// Objects of one class
    pub fn find_by_class(&self, class_id: u32) -> impl Iterator<Item = &Object> {
        self.objects
            .iter()
            .filter(move |object| object.class_id == class_id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Record a block skipped by best-effort parsing
    pub fn push_skipped(&mut self, block: SkippedBlock) {
        self.skipped.push(block);
    }

    pub fn skipped(&self) -> &[SkippedBlock] {
        &self.skipped
    }

    /// True when every block parsed
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    /// Fail unless every block parsed; diff and merge need the full graph
    pub fn ensure_complete(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(PrefabError::IncompleteDocument {
                skipped: self.skipped.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::value::Value;

    fn object(file_id: FileId, class_id: u32) -> Object {
        Object::with_class_id(file_id, class_id, Value::Mapping(Default::default()))
    }

    #[test]
    fn test_document_insert_and_lookup() {
        let mut doc = Document::new();
        assert!(doc.is_empty());

        doc.insert(object(1, 1));
        doc.insert(object(-3742660215815977075, 4));
        doc.insert(object(3, 114));

        assert_eq!(doc.len(), 3);
        assert_eq!(doc.get(-3742660215815977075).unwrap().class_id, 4);
        assert!(doc.require(99).is_err());
        assert_eq!(doc.find_by_class(114).count(), 1);
    }

    #[test]
    fn test_remove_keeps_index_consistent() {
        let mut doc = Document::new();
        doc.insert(object(1, 1));
        doc.insert(object(2, 4));
        doc.insert(object(3, 114));

        assert!(doc.remove(1).is_some());
        assert_eq!(doc.file_ids().collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(doc.get(3).unwrap().class_id, 114);
        assert!(doc.remove(1).is_none());
    }

    #[test]
    fn test_completeness() {
        let mut doc = Document::new().with_guid("ABCDEF");
        assert_eq!(doc.guid(), Some("abcdef"));
        assert!(doc.ensure_complete().is_ok());

        doc.push_skipped(SkippedBlock {
            line: 4,
            reason: "bad".to_string(),
            position: 0,
            raw: String::new(),
        });
        assert!(matches!(
            doc.ensure_complete(),
            Err(PrefabError::IncompleteDocument { skipped: 1 })
        ));
    }
}
