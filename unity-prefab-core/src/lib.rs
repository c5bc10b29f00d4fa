//! Unity Prefab Core
//!
//! Core data structures for semantic diff and merge of Unity's text
//! serialization format. This crate provides the object model shared by
//! the parser, the reference resolver, and the diff/merge engines.

pub mod constants;
pub mod document;
pub mod error;
pub mod object;
pub mod prefab;
pub mod property_path;
pub mod value;

// Re-export main types
pub use constants::{LineEnding, class_ids, class_name_for, class_names, is_transform_class, keys};
pub use document::{Document, SkippedBlock};
pub use error::{PrefabError, Result};
pub use object::{FileId, Object, ObjectData};
pub use prefab::{MODIFICATIONS_PATH, Modification, ModificationKey, PrefabInstance};
pub use property_path::{PathSegment, PropertyPath};
pub use value::{Reference, Scalar, Value};
