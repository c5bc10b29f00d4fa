//! Value types
//!
//! This module defines the closed `Value` tree that object content is parsed
//! into, together with Unity's `{fileID, guid, type}` reference form.

use crate::constants::keys;
use crate::error::{PrefabError, Result};
use crate::property_path::{PathSegment, PropertyPath};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A leaf value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// An object reference: `{fileID: N}` in-document, `{fileID: N, guid: G, type: T}` across files
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    #[serde(rename = "fileID")]
    pub file_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ref_type: Option<i32>,
}

impl Reference {
    /// Reference to an object in the same document
    pub fn local(file_id: i64) -> Self {
        Self {
            file_id,
            guid: None,
            ref_type: None,
        }
    }

    /// Reference to an object in another asset
    pub fn external<S: Into<String>>(file_id: i64, guid: S, ref_type: i32) -> Self {
        Self {
            file_id,
            guid: Some(guid.into()),
            ref_type: Some(ref_type),
        }
    }

    /// `fileID: 0` without a GUID conventionally means "no reference"
    pub fn is_null(&self) -> bool {
        self.file_id == 0 && self.guid.is_none()
    }

    /// True when the reference points into the same document
    pub fn is_local(&self) -> bool {
        self.guid.is_none()
    }

    /// Build from a mapping made only of `fileID`, `guid`, and `type`
    pub fn from_mapping(map: &IndexMap<String, Value>) -> Option<Self> {
        if !map.keys().all(|k| k == keys::FILE_ID || k == keys::GUID || k == keys::TYPE) {
            return None;
        }
        let file_id = map.get(keys::FILE_ID)?.as_i64()?;
        let guid = match map.get(keys::GUID) {
            Some(value) => Some(value.scalar_text()?),
            None => None,
        };
        let ref_type = match map.get(keys::TYPE) {
            Some(value) => Some(i32::try_from(value.as_i64()?).ok()?),
            None => None,
        };
        Some(Self {
            file_id,
            guid,
            ref_type,
        })
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{fileID: {}", self.file_id)?;
        if let Some(guid) = &self.guid {
            write!(f, ", guid: {}", guid)?;
        }
        if let Some(ref_type) = self.ref_type {
            write!(f, ", type: {}", ref_type)?;
        }
        write!(f, "}}")
    }
}

/// A node of an object's content tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Reference(Reference),
    Mapping(IndexMap<String, Value>),
    Sequence(Vec<Value>),
}

impl Value {
    pub fn null() -> Self {
        Value::Scalar(Scalar::Null)
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(Scalar::Null))
    }

    /// Get as boolean; Unity writes booleans as `0`/`1`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(Scalar::Bool(b)) => Some(*b),
            Value::Scalar(Scalar::Integer(i)) => Some(*i != 0),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Scalar(Scalar::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Get as float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(Scalar::Float(f)) => Some(*f),
            Value::Scalar(Scalar::Integer(i)) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Text form of any scalar (GUIDs made only of digits parse as numbers)
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Value::Scalar(Scalar::String(s)) => Some(s.clone()),
            Value::Scalar(Scalar::Integer(i)) => Some(i.to_string()),
            Value::Scalar(Scalar::Float(f)) => Some(f.to_string()),
            Value::Scalar(Scalar::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Value::Reference(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Mapping lookup
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|map| map.get(key))
    }

    /// Reference stored under `key`
    pub fn reference(&self, key: &str) -> Option<&Reference> {
        self.get(key).and_then(Value::as_reference)
    }

    /// Address a nested value
    pub fn get_path(&self, path: &PropertyPath) -> Option<&Value> {
        let mut current = self;
        for segment in path.segments() {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Mapping(map)) => map.get(key)?,
                (PathSegment::Index(i), Value::Sequence(seq)) => seq.get(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn get_path_mut(&mut self, path: &PropertyPath) -> Option<&mut Value> {
        let mut current = self;
        for segment in path.segments() {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Mapping(map)) => map.get_mut(key)?,
                (PathSegment::Index(i), Value::Sequence(seq)) => seq.get_mut(*i)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Write a value at `path`; the parent must already exist
    ///
    /// A missing mapping key is appended. An index equal to the sequence
    /// length appends. Returns the previous value, if any.
    pub fn set_path(&mut self, path: &PropertyPath, value: Value) -> Result<Option<Value>> {
        let Some((parent_path, last)) = path.split_last() else {
            return Ok(Some(std::mem::replace(self, value)));
        };
        let parent = self
            .get_path_mut(&parent_path)
            .ok_or_else(|| PrefabError::invalid_path(path.to_string(), "parent does not exist"))?;
        write_child(parent, last, value, path)
    }

    /// Write a value at `path`, creating intermediate mappings on the way
    pub fn overlay_path(&mut self, path: &PropertyPath, value: Value) -> Result<Option<Value>> {
        let Some((_, last)) = path.split_last() else {
            return Ok(Some(std::mem::replace(self, value)));
        };
        let mut current = self;
        for segment in &path.segments()[..path.segments().len() - 1] {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Mapping(map)) => map
                    .entry(key.clone())
                    .or_insert_with(|| Value::Mapping(IndexMap::new())),
                (PathSegment::Index(i), Value::Sequence(seq)) => seq.get_mut(*i).ok_or_else(|| {
                    PrefabError::invalid_path(path.to_string(), "index out of range")
                })?,
                _ => {
                    return Err(PrefabError::invalid_path(
                        path.to_string(),
                        "segment does not match value shape",
                    ));
                }
            };
        }
        write_child(current, last, value, path)
    }

    /// Remove the value at `path`, returning it
    pub fn remove_path(&mut self, path: &PropertyPath) -> Result<Option<Value>> {
        let Some((parent_path, last)) = path.split_last() else {
            return Err(PrefabError::invalid_path("", "cannot remove the root value"));
        };
        let parent = self
            .get_path_mut(&parent_path)
            .ok_or_else(|| PrefabError::invalid_path(path.to_string(), "parent does not exist"))?;
        match (last, parent) {
            (PathSegment::Key(key), Value::Mapping(map)) => Ok(map.shift_remove(key)),
            (PathSegment::Index(i), Value::Sequence(seq)) if *i < seq.len() => {
                Ok(Some(seq.remove(*i)))
            }
            (PathSegment::Index(_), Value::Sequence(_)) => Ok(None),
            _ => Err(PrefabError::invalid_path(
                path.to_string(),
                "segment does not match value shape",
            )),
        }
    }
}

fn write_child(
    parent: &mut Value,
    segment: &PathSegment,
    value: Value,
    path: &PropertyPath,
) -> Result<Option<Value>> {
    match (segment, parent) {
        (PathSegment::Key(key), Value::Mapping(map)) => Ok(map.insert(key.clone(), value)),
        (PathSegment::Index(i), Value::Sequence(seq)) => {
            if *i < seq.len() {
                Ok(Some(std::mem::replace(&mut seq[*i], value)))
            } else if *i == seq.len() {
                seq.push(value);
                Ok(None)
            } else {
                Err(PrefabError::invalid_path(
                    path.to_string(),
                    "index out of range",
                ))
            }
        }
        _ => Err(PrefabError::invalid_path(
            path.to_string(),
            "segment does not match value shape",
        )),
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(fl) => write!(f, "{}", fl),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{}", s),
            Value::Reference(r) => write!(f, "{}", r),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, item) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

// Conversion implementations
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Scalar(Scalar::Bool(b))
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Scalar(Scalar::Integer(i as i64))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Scalar(Scalar::Integer(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Scalar(Scalar::Float(f))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Scalar::String(s))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Scalar::String(s.to_string()))
    }
}

impl From<Reference> for Value {
    fn from(r: Reference) -> Self {
        Value::Reference(r)
    }
}

impl From<Vec<Value>> for Value {
    fn from(seq: Vec<Value>) -> Self {
        Value::Sequence(seq)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Mapping(map)
    }
}
