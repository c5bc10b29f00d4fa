//! Document objects
//!
//! One `--- !u!<class_id> &<file_id>` block of a document. Stripped
//! placeholders are a distinct variant so every read goes through the
//! owning PrefabInstance instead of chasing a nullable pointer.

use crate::constants::{class_ids, class_name_for, keys};
use crate::value::{Reference, Value};
use indexmap::IndexMap;
use std::fmt;

/// Signed 64-bit object identifier, unique within one document
pub type FileId = i64;

/// Content of an object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectData {
    /// An object with its own data
    Direct(Value),
    /// A placeholder for an object that lives in a nested prefab
    Stripped {
        /// The owning PrefabInstance
        owner: FileId,
        /// The placeholder's serialized fields, kept only for re-serialization
        placeholder: Value,
    },
}

/// A single object in a document
#[derive(Debug, Clone)]
pub struct Object {
    pub file_id: FileId,
    pub class_id: u32,
    /// Class name line of the block (`GameObject:`)
    pub class_name: String,
    data: ObjectData,
    /// Exact source text of the block, dropped on first mutation
    raw: Option<String>,
}

impl Object {
    /// Create an object with direct content
    pub fn new<S: Into<String>>(file_id: FileId, class_id: u32, class_name: S, content: Value) -> Self {
        Self {
            file_id,
            class_id,
            class_name: class_name.into(),
            data: ObjectData::Direct(content),
            raw: None,
        }
    }

    /// Create an object using the well-known class name for `class_id`
    pub fn with_class_id(file_id: FileId, class_id: u32, content: Value) -> Self {
        let class_name = class_name_for(class_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("UnityClass_{}", class_id));
        Self::new(file_id, class_id, class_name, content)
    }

    /// Build from parsed parts; a stripped block owned by a PrefabInstance
    /// becomes `ObjectData::Stripped`
    pub fn from_parts<S: Into<String>>(
        file_id: FileId,
        class_id: u32,
        class_name: S,
        stripped: bool,
        content: Value,
        raw: Option<String>,
    ) -> Self {
        let data = if stripped {
            match stripped_owner(&content) {
                Some(owner) => ObjectData::Stripped {
                    owner,
                    placeholder: content,
                },
                None => ObjectData::Direct(content),
            }
        } else {
            ObjectData::Direct(content)
        };
        Self {
            file_id,
            class_id,
            class_name: class_name.into(),
            data,
            raw,
        }
    }

    /// Create a stripped placeholder owned by `owner`
    pub fn stripped<S: Into<String>>(file_id: FileId, class_id: u32, class_name: S, owner: FileId) -> Self {
        let mut placeholder = IndexMap::new();
        placeholder.insert(
            keys::PREFAB_INSTANCE.to_string(),
            Value::Reference(Reference::local(owner)),
        );
        Self {
            file_id,
            class_id,
            class_name: class_name.into(),
            data: ObjectData::Stripped {
                owner,
                placeholder: Value::Mapping(placeholder),
            },
            raw: None,
        }
    }

    pub fn data(&self) -> &ObjectData {
        &self.data
    }

    pub fn is_stripped(&self) -> bool {
        matches!(self.data, ObjectData::Stripped { .. })
    }

    /// Owning PrefabInstance of a stripped object
    pub fn stripped_owner(&self) -> Option<FileId> {
        match self.data {
            ObjectData::Stripped { owner, .. } => Some(owner),
            ObjectData::Direct(_) => None,
        }
    }

    /// Primary data; `None` for stripped placeholders
    pub fn content(&self) -> Option<&Value> {
        match &self.data {
            ObjectData::Direct(value) => Some(value),
            ObjectData::Stripped { .. } => None,
        }
    }

    /// Mutable primary data; marks the object as edited
    pub fn content_mut(&mut self) -> Option<&mut Value> {
        match &mut self.data {
            ObjectData::Direct(value) => {
                self.raw = None;
                Some(value)
            }
            ObjectData::Stripped { .. } => None,
        }
    }

    /// Serialized fields regardless of variant
    pub fn serialized_fields(&self) -> &Value {
        match &self.data {
            ObjectData::Direct(value) => value,
            ObjectData::Stripped { placeholder, .. } => placeholder,
        }
    }

    /// Replace the primary data
    pub fn set_content(&mut self, content: Value) {
        self.data = ObjectData::Direct(content);
        self.raw = None;
    }

    /// Retained source text, if the object is unedited
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Property of the primary data
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.content().and_then(|content| content.get(key))
    }

    /// The object name (`m_Name`), if it has one
    pub fn name(&self) -> Option<&str> {
        self.get(keys::NAME).and_then(Value::as_str)
    }

    pub fn is_game_object(&self) -> bool {
        self.class_id == class_ids::GAME_OBJECT
    }

    pub fn is_prefab_instance(&self) -> bool {
        self.class_id == class_ids::PREFAB_INSTANCE
    }

    /// Header line without the line break
    pub fn header(&self) -> String {
        let mut header = format!("--- !u!{} &{}", self.class_id, self.file_id);
        if self.is_stripped() {
            header.push_str(" stripped");
        }
        header
    }

    /// Content equality, ignoring retained source text
    pub fn same_content(&self, other: &Object) -> bool {
        self.class_id == other.class_id && self.class_name == other.class_name && self.data == other.data
    }
}

/// Owner of a stripped block: `m_PrefabInstance` (2018.3+) or `m_PrefabInternal`
fn stripped_owner(content: &Value) -> Option<FileId> {
    [keys::PREFAB_INSTANCE, keys::LEGACY_PREFAB_INTERNAL]
        .iter()
        .filter_map(|key| content.reference(key))
        .find(|reference| !reference.is_null())
        .map(|reference| reference.file_id)
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) &{}", self.class_name, self.class_id, self.file_id)
    }
}
