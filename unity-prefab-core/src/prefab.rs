//! PrefabInstance view
//!
//! Typed access to the fields of a class 1001 object: which prefab it
//! instances and the property overrides it applies.

use crate::constants::keys;
use crate::object::{FileId, Object};
use crate::value::{Reference, Value};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of the modification list inside a PrefabInstance
pub const MODIFICATIONS_PATH: &str = "m_Modification.m_Modifications";

/// Identity of a modification: one property of one target object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModificationKey {
    pub target_file_id: FileId,
    pub target_guid: Option<String>,
    pub property_path: String,
}

impl fmt::Display for ModificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}", MODIFICATIONS_PATH, self.target_file_id)?;
        if let Some(guid) = &self.target_guid {
            write!(f, "@{}", guid)?;
        }
        write!(f, "]:{}", self.property_path)
    }
}

/// One property override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    pub target: Reference,
    pub property_path: String,
    pub value: Option<Value>,
    pub object_reference: Option<Reference>,
}

impl Modification {
    /// Read a `{target, propertyPath, value, objectReference}` entry
    pub fn from_value(entry: &Value) -> Option<Self> {
        let target = entry.reference("target")?.clone();
        let property_path = entry.get("propertyPath")?.scalar_text()?;
        let value = entry.get("value").filter(|v| !v.is_null()).cloned();
        let object_reference = entry
            .reference("objectReference")
            .filter(|r| !r.is_null())
            .cloned();
        Some(Self {
            target,
            property_path,
            value,
            object_reference,
        })
    }

    /// Serialized form, in the field order Unity writes
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::new();
        map.insert("target".to_string(), Value::Reference(self.target.clone()));
        map.insert(
            "propertyPath".to_string(),
            Value::from(self.property_path.clone()),
        );
        map.insert(
            "value".to_string(),
            self.value.clone().unwrap_or_else(Value::null),
        );
        map.insert(
            "objectReference".to_string(),
            Value::Reference(
                self.object_reference
                    .clone()
                    .unwrap_or_else(|| Reference::local(0)),
            ),
        );
        Value::Mapping(map)
    }

    pub fn key(&self) -> ModificationKey {
        ModificationKey {
            target_file_id: self.target.file_id,
            target_guid: self.target.guid.as_ref().map(|g| g.to_lowercase()),
            property_path: self.property_path.clone(),
        }
    }

    /// The value the override writes: the object reference when set, else the scalar value
    pub fn effective_value(&self) -> Value {
        match &self.object_reference {
            Some(reference) => Value::Reference(reference.clone()),
            None => self.value.clone().unwrap_or_else(Value::null),
        }
    }
}

/// Typed view of a PrefabInstance object
#[derive(Debug, Clone, PartialEq)]
pub struct PrefabInstance {
    pub file_id: FileId,
    /// GUID of the prefab file being instanced
    pub source_guid: Option<String>,
    /// Transform this instance is parented under
    pub transform_parent: Option<Reference>,
    pub modifications: Vec<Modification>,
    pub removed_components: Vec<Reference>,
}

impl PrefabInstance {
    /// Read the view from a class 1001 object with direct content
    pub fn from_object(object: &Object) -> Option<Self> {
        if !object.is_prefab_instance() {
            return None;
        }
        let content = object.content()?;

        let source_guid = [keys::SOURCE_PREFAB, keys::LEGACY_PARENT_PREFAB]
            .iter()
            .filter_map(|key| content.reference(key))
            .find_map(|reference| reference.guid.as_ref())
            .map(|guid| guid.to_lowercase());

        let modification = content.get(keys::MODIFICATION);
        let transform_parent = modification
            .and_then(|m| m.reference(keys::TRANSFORM_PARENT))
            .filter(|r| !r.is_null())
            .cloned();
        let modifications = modification
            .and_then(|m| m.get(keys::MODIFICATIONS))
            .and_then(Value::as_sequence)
            .map(|entries| entries.iter().filter_map(Modification::from_value).collect())
            .unwrap_or_default();
        let removed_components = modification
            .and_then(|m| m.get(keys::REMOVED_COMPONENTS))
            .and_then(Value::as_sequence)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_reference)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            file_id: object.file_id,
            source_guid,
            transform_parent,
            modifications,
            removed_components,
        })
    }

    /// Override of `m_Name` on any target, used as a display name
    pub fn name_override(&self) -> Option<String> {
        self.modifications
            .iter()
            .find(|m| m.property_path == keys::NAME)
            .and_then(|m| m.value.as_ref())
            .and_then(Value::scalar_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn modification_entry(file_id: i64, path: &str, value: Value) -> Value {
        Modification {
            target: Reference::external(file_id, "ABCDEF0123", 3),
            property_path: path.to_string(),
            value: Some(value),
            object_reference: None,
        }
        .to_value()
    }

    fn prefab_instance_object() -> Object {
        let mut modification = IndexMap::new();
        modification.insert("serializedVersion".to_string(), Value::from(3));
        modification.insert(
            "m_TransformParent".to_string(),
            Value::Reference(Reference::local(400)),
        );
        modification.insert(
            "m_Modifications".to_string(),
            Value::Sequence(vec![
                modification_entry(100, "m_Name", Value::from("Door")),
                modification_entry(200, "m_LocalPosition.x", Value::from(5)),
            ]),
        );
        modification.insert("m_RemovedComponents".to_string(), Value::Sequence(vec![]));

        let mut content = IndexMap::new();
        content.insert("m_Modification".to_string(), Value::Mapping(modification));
        content.insert(
            "m_SourcePrefab".to_string(),
            Value::Reference(Reference::external(100100000, "ABCDEF0123", 3)),
        );
        Object::with_class_id(900, 1001, Value::Mapping(content))
    }

    #[test]
    fn test_prefab_instance_view() {
        let object = prefab_instance_object();
        let instance = PrefabInstance::from_object(&object).unwrap();

        assert_eq!(instance.source_guid.as_deref(), Some("abcdef0123"));
        assert_eq!(instance.transform_parent, Some(Reference::local(400)));
        assert_eq!(instance.modifications.len(), 2);
        assert_eq!(instance.name_override().as_deref(), Some("Door"));
    }

    #[test]
    fn test_modification_entry_round_trip() {
        let entry = modification_entry(200, "m_LocalPosition.x", Value::from(5));
        let modification = Modification::from_value(&entry).unwrap();
        assert_eq!(modification.effective_value(), Value::from(5));
        assert_eq!(modification.to_value(), entry);
        assert_eq!(
            modification.key().to_string(),
            "m_Modification.m_Modifications[200@abcdef0123]:m_LocalPosition.x"
        );
    }

    #[test]
    fn test_non_prefab_object_has_no_view() {
        let object = Object::with_class_id(1, 1, Value::Mapping(IndexMap::new()));
        assert!(PrefabInstance::from_object(&object).is_none());
    }
}
