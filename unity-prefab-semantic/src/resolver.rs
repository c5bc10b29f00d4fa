//! Reference resolution
//!
//! In-document lookups that always follow stripped-object indirection,
//! GUID lookups through the injected index, and hierarchy path labels
//! used to key diff and merge records. Unresolvable references yield
//! `None`; callers fall back to the raw identifier.

use crate::guid_index::GuidIndex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use unity_prefab_core::{Document, FileId, Object, PrefabInstance, Reference, is_transform_class, keys};

/// Resolver over one document
pub struct Resolver<'a> {
    document: &'a Document,
    index: &'a dyn GuidIndex,
    /// GameObject -> its Transform
    transform_of: HashMap<FileId, FileId>,
    /// Transform -> the Transform it is parented under
    father_of: HashMap<FileId, FileId>,
}

impl<'a> Resolver<'a> {
    pub fn new(document: &'a Document, index: &'a dyn GuidIndex) -> Self {
        let mut transform_of = HashMap::new();
        let mut father_of = HashMap::new();
        for object in document.objects() {
            if !is_transform_class(object.class_id) || object.is_stripped() {
                continue;
            }
            if let Some(owner) = local_reference(object, keys::GAME_OBJECT) {
                transform_of.insert(owner, object.file_id);
            }
            if let Some(father) = local_reference(object, keys::FATHER) {
                father_of.insert(object.file_id, father);
            }
        }
        Self {
            document,
            index,
            transform_of,
            father_of,
        }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Direct lookup
    pub fn resolve_in_document(&self, file_id: FileId) -> Option<&'a Object> {
        self.document.get(file_id)
    }

    /// Follow a reference into this document; external and null references yield `None`
    pub fn resolve_reference(&self, reference: &Reference) -> Option<&'a Object> {
        if reference.is_null() || !reference.is_local() {
            return None;
        }
        self.resolve_in_document(reference.file_id)
    }

    /// The GameObject a component belongs to, or the owning PrefabInstance
    /// when the owner is a stripped placeholder. Never returns a stripped object.
    pub fn resolve_owning_object(&self, component: &Object) -> Option<&'a Object> {
        if let Some(owner) = component.stripped_owner() {
            return self.follow_stripped(owner);
        }
        let owner = self.resolve_reference(component.get(keys::GAME_OBJECT)?.as_reference()?)?;
        match owner.stripped_owner() {
            Some(instance) => self.follow_stripped(instance),
            None => Some(owner),
        }
    }

    /// Redirect through stripped placeholders to a non-stripped object
    fn follow_stripped(&self, mut file_id: FileId) -> Option<&'a Object> {
        let mut seen = HashSet::new();
        loop {
            let object = self.resolve_in_document(file_id)?;
            match object.stripped_owner() {
                Some(owner) if seen.insert(file_id) => file_id = owner,
                Some(_) => return None,
                None => return Some(object),
            }
        }
    }

    /// Single-GUID fallback used when no batch result was computed
    pub fn resolve_script_name(&self, guid: &str) -> Option<String> {
        self.index.resolve_one(guid)
    }

    /// Script name of a MonoBehaviour, if its script is known to the index
    pub fn script_name_of(&self, object: &Object) -> Option<String> {
        let script = object.get(keys::SCRIPT)?.as_reference()?;
        self.resolve_script_name(script.guid.as_deref()?)
    }

    /// Display name of an object for labels
    pub fn object_name(&self, object: &Object) -> Option<String> {
        if object.is_prefab_instance() {
            return self.instance_name(object);
        }
        object.name().filter(|name| !name.is_empty()).map(str::to_string)
    }

    fn instance_name(&self, object: &Object) -> Option<String> {
        let instance = PrefabInstance::from_object(object)?;
        if let Some(name) = instance.name_override() {
            return Some(name);
        }
        let name = self.index.resolve_one(instance.source_guid.as_deref()?)?;
        Some(
            Path::new(&name)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or(name),
        )
    }

    /// Slash-separated hierarchy path of the GameObject that owns `file_id`
    ///
    /// Components resolve to their owner; PrefabInstances to their instance
    /// name under the transform they are parented to. Falls back to the
    /// raw identifier label when nothing resolves.
    pub fn object_path(&self, file_id: FileId) -> String {
        let Some(object) = self.resolve_in_document(file_id) else {
            return raw_label(file_id);
        };
        let owner = if object.is_game_object() || object.is_prefab_instance() {
            Some(object)
        } else if is_transform_class(object.class_id) && !object.is_stripped() {
            local_reference(object, keys::GAME_OBJECT).and_then(|id| self.resolve_in_document(id))
        } else {
            self.resolve_owning_object(object)
        };
        let Some(owner) = owner else {
            return raw_label(file_id);
        };

        let mut segments = vec![self.object_name(owner).unwrap_or_else(|| raw_label(owner.file_id))];
        let mut visited = HashSet::new();
        let mut father = self.father_transform(owner);
        while let Some(transform_id) = father {
            if !visited.insert(transform_id) {
                break;
            }
            let Some(node) = self.node_for_transform(transform_id) else {
                break;
            };
            segments.push(self.object_name(node).unwrap_or_else(|| raw_label(node.file_id)));
            father = self.father_transform(node);
        }
        segments.reverse();
        segments.join("/")
    }

    /// Transform a GameObject or PrefabInstance is parented under
    fn father_transform(&self, object: &Object) -> Option<FileId> {
        if object.is_prefab_instance() {
            return PrefabInstance::from_object(object)?
                .transform_parent
                .filter(Reference::is_local)
                .map(|reference| reference.file_id);
        }
        let transform = self.transform_of.get(&object.file_id)?;
        self.father_of.get(transform).copied()
    }

    /// GameObject owning a transform, or the PrefabInstance owning a stripped one
    fn node_for_transform(&self, transform_id: FileId) -> Option<&'a Object> {
        let transform = self.resolve_in_document(transform_id)?;
        match transform.stripped_owner() {
            Some(owner) => self.follow_stripped(owner),
            None => local_reference(transform, keys::GAME_OBJECT).and_then(|id| self.resolve_in_document(id)),
        }
    }
}

/// Non-null in-document reference stored under `key`
pub(crate) fn local_reference(object: &Object, key: &str) -> Option<FileId> {
    object
        .get(key)?
        .as_reference()
        .filter(|reference| !reference.is_null() && reference.is_local())
        .map(|reference| reference.file_id)
}

/// Fallback label for an unresolved object
pub fn raw_label(file_id: FileId) -> String {
    format!("&{}", file_id)
}
