//! Three-way semantic merge
//!
//! Every object in the union of base, ours, and theirs is merged property
//! by property:
//!
//! | ours changed | theirs changed | ours == theirs | result          |
//! |--------------|----------------|----------------|-----------------|
//! | no           | no             |                | base            |
//! | yes          | no             |                | ours            |
//! | no           | yes            |                | theirs          |
//! | yes          | yes            | yes            | the common value|
//! | yes          | yes            | no             | conflict        |
//!
//! Conflicting properties keep their base value in the merged document
//! until `apply_resolution` writes a choice. PrefabInstance modification
//! lists merge per `(target, propertyPath)` instead of per list index.
//! The inputs are never mutated.

use crate::diff::{ChangeKind, ChangeWalker, PropertyChange, PropertyKey, Subject, modification_map};
use crate::guid_index::{GuidIndex, MemoryGuidIndex};
use crate::options::{MergeOptions, SequenceOrder};
use crate::resolver::Resolver;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use unity_prefab_core::{
    Document, FileId, Modification, ModificationKey, Object, PathSegment, PrefabError, PropertyPath, Result, Value,
};

/// Which side an automatic merge took its value from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MergeSide {
    Ours,
    Theirs,
    /// Both sides made the same edit
    Both,
}

/// A change applied to the merged document without user input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoMerge {
    pub side: MergeSide,
    /// The change relative to base
    pub change: PropertyChange,
}

/// The three versions of an object in conflict
#[derive(Debug, Clone)]
pub struct ObjectVersions {
    pub base: Option<Object>,
    pub ours: Option<Object>,
    pub theirs: Option<Object>,
}

/// Where a conflict lives
#[derive(Debug, Clone)]
pub enum ConflictKind {
    /// A property inside the object `key.component_id`
    Property(PropertyPath),
    /// One entry of a PrefabInstance modification list
    Modification(ModificationKey),
    /// The object itself (deleted against modified, or added twice differently)
    Object(Box<ObjectVersions>),
}

/// Edits from both sides that cannot be combined
///
/// For `Property` conflicts the values are the property values; for
/// `Modification` conflicts they are whole modification entries; for
/// `Object` conflicts they are the objects' serialized fields.
#[derive(Debug, Clone)]
pub struct PropertyConflict {
    pub key: PropertyKey,
    pub kind: ConflictKind,
    pub base: Option<Value>,
    pub ours: Option<Value>,
    pub theirs: Option<Value>,
}

/// A user's choice for one conflict
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Base,
    Ours,
    Theirs,
    /// An explicit replacement value
    Value(Value),
}

/// Output of a three-way merge
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub merged: Document,
    pub auto_merged: Vec<AutoMerge>,
    pub conflicts: Vec<PropertyConflict>,
}

impl MergeResult {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Apply a resolution to the conflict at `index` and drop it from the list
    pub fn resolve(&mut self, index: usize, resolution: Resolution) -> Result<()> {
        let conflict = self
            .conflicts
            .get(index)
            .ok_or_else(|| PrefabError::stale(format!("conflict #{}", index)))?;
        apply_resolution(&mut self.merged, conflict, resolution)?;
        self.conflicts.remove(index);
        Ok(())
    }
}

/// Merge with default options
pub fn merge(base: &Document, ours: &Document, theirs: &Document) -> Result<MergeResult> {
    merge_with(base, ours, theirs, &MergeOptions::default())
}

pub fn merge_with(base: &Document, ours: &Document, theirs: &Document, options: &MergeOptions) -> Result<MergeResult> {
    merge_with_index(base, ours, theirs, options, &MemoryGuidIndex::new())
}

/// Merge using `index` to name nested prefab instances in change keys
#[instrument(skip_all, fields(base = base.len(), ours = ours.len(), theirs = theirs.len()))]
pub fn merge_with_index(
    base: &Document,
    ours: &Document,
    theirs: &Document,
    options: &MergeOptions,
    index: &dyn GuidIndex,
) -> Result<MergeResult> {
    base.ensure_complete()?;
    ours.ensure_complete()?;
    theirs.ensure_complete()?;

    let merger = Merger {
        base: Resolver::new(base, index),
        ours: Resolver::new(ours, index),
        theirs: Resolver::new(theirs, index),
        order: &options.sequence_order,
    };
    let mut result = MergeResult {
        merged: base.clone(),
        auto_merged: Vec::new(),
        conflicts: Vec::new(),
    };

    let ids: IndexSet<FileId> = base
        .file_ids()
        .chain(ours.file_ids())
        .chain(theirs.file_ids())
        .collect();
    for id in ids {
        merger.merge_object(id, &mut result);
    }

    info!(
        auto_merged = result.auto_merged.len(),
        conflicts = result.conflicts.len(),
        "merge complete"
    );
    Ok(result)
}

struct Merger<'a> {
    base: Resolver<'a>,
    ours: Resolver<'a>,
    theirs: Resolver<'a>,
    order: &'a SequenceOrder,
}

impl<'a> Merger<'a> {
    fn merge_object(&self, id: FileId, result: &mut MergeResult) {
        let base = self.base.document().get(id);
        let ours = self.ours.document().get(id);
        let theirs = self.theirs.document().get(id);

        match (base, ours, theirs) {
            (Some(b), Some(o), Some(t)) => self.merge_present(b, o, t, result),
            (Some(b), None, None) => {
                result.merged.remove(id);
                self.record_object(result, MergeSide::Both, &self.base, b, ChangeKind::Removed);
            }
            (Some(b), None, Some(t)) | (Some(b), Some(t), None) => {
                let deleted_by = if ours.is_none() { MergeSide::Ours } else { MergeSide::Theirs };
                if t.same_content(b) {
                    result.merged.remove(id);
                    self.record_object(result, deleted_by, &self.base, b, ChangeKind::Removed);
                } else {
                    self.object_conflict(result, &self.base, b, base, ours, theirs);
                }
            }
            (None, Some(o), None) => {
                result.merged.insert(o.clone());
                self.record_object(result, MergeSide::Ours, &self.ours, o, ChangeKind::Added);
            }
            (None, None, Some(t)) => {
                result.merged.insert(t.clone());
                self.record_object(result, MergeSide::Theirs, &self.theirs, t, ChangeKind::Added);
            }
            (None, Some(o), Some(t)) => {
                if o.same_content(t) {
                    result.merged.insert(o.clone());
                    self.record_object(result, MergeSide::Both, &self.ours, o, ChangeKind::Added);
                } else {
                    self.object_conflict(result, &self.ours, o, base, ours, theirs);
                }
            }
            (None, None, None) => {}
        }
    }

    fn merge_present(&self, b: &Object, o: &Object, t: &Object, result: &mut MergeResult) {
        let ours_changed = !o.same_content(b);
        let theirs_changed = !t.same_content(b);
        let subject = Subject::of(&self.base, b);

        match (ours_changed, theirs_changed) {
            (false, false) => {}
            (true, false) => self.take_object(result, subject, b, o, MergeSide::Ours),
            (false, true) => self.take_object(result, subject, b, t, MergeSide::Theirs),
            (true, true) if o.same_content(t) => self.take_object(result, subject, b, o, MergeSide::Both),
            (true, true) => {
                let reshaped = |x: &Object| x.class_id != b.class_id || x.is_stripped() != b.is_stripped();
                if b.is_stripped() || reshaped(o) || reshaped(t) {
                    self.object_conflict(result, &self.base, b, Some(b), Some(o), Some(t));
                    return;
                }

                let mut merge = PropertyMerge::new(
                    subject,
                    self.order,
                    b.serialized_fields().clone(),
                    o.serialized_fields(),
                    t.serialized_fields(),
                );
                merge.merge_value(
                    &PropertyPath::root(),
                    None,
                    Some(b.serialized_fields()),
                    Some(o.serialized_fields()),
                    Some(t.serialized_fields()),
                );
                result.auto_merged.append(&mut merge.auto_merged);
                result.conflicts.append(&mut merge.conflicts);

                // Reuse a side's source text when the merge landed on it
                let content = merge.content;
                if &content == o.serialized_fields() {
                    result.merged.insert(o.clone());
                } else if &content == t.serialized_fields() {
                    result.merged.insert(t.clone());
                } else if &content != b.serialized_fields()
                    && let Some(object) = result.merged.get_mut(b.file_id)
                {
                    object.set_content(content);
                }
            }
        }
    }

    /// One side changed the object; take it whole, keeping its source text
    fn take_object(&self, result: &mut MergeResult, subject: Subject, b: &Object, chosen: &Object, side: MergeSide) {
        let mut walker = ChangeWalker::new(subject, self.order);
        walker.compare(&PropertyPath::root(), None, b.serialized_fields(), chosen.serialized_fields());
        result
            .auto_merged
            .extend(walker.changes.into_iter().map(|change| AutoMerge { side, change }));
        result.merged.insert(chosen.clone());
    }

    fn record_object(
        &self,
        result: &mut MergeResult,
        side: MergeSide,
        resolver: &Resolver<'_>,
        object: &Object,
        kind: ChangeKind,
    ) {
        let content = Some(object.serialized_fields().clone());
        let (old, new) = match kind {
            ChangeKind::Removed => (content, None),
            _ => (None, content),
        };
        result.auto_merged.push(AutoMerge {
            side,
            change: PropertyChange {
                key: Subject::of(resolver, object).key(""),
                kind,
                old,
                new,
            },
        });
    }

    fn object_conflict(
        &self,
        result: &mut MergeResult,
        resolver: &Resolver<'_>,
        labelled: &Object,
        base: Option<&Object>,
        ours: Option<&Object>,
        theirs: Option<&Object>,
    ) {
        let fields = |object: Option<&Object>| object.map(|o| o.serialized_fields().clone());
        debug!(file_id = labelled.file_id, "object-level conflict");
        result.conflicts.push(PropertyConflict {
            key: Subject::of(resolver, labelled).key(""),
            kind: ConflictKind::Object(Box::new(ObjectVersions {
                base: base.cloned(),
                ours: ours.cloned(),
                theirs: theirs.cloned(),
            })),
            base: fields(base),
            ours: fields(ours),
            theirs: fields(theirs),
        });
    }
}

/// Property-level merge of one object present on all three sides
struct PropertyMerge<'a> {
    walker: ChangeWalker<'a>,
    order: &'a SequenceOrder,
    content: Value,
    /// Side trees, consulted for where newly added keys belong
    ours: &'a Value,
    theirs: &'a Value,
    auto_merged: Vec<AutoMerge>,
    conflicts: Vec<PropertyConflict>,
}

impl<'a> PropertyMerge<'a> {
    fn new(subject: Subject, order: &'a SequenceOrder, content: Value, ours: &'a Value, theirs: &'a Value) -> Self {
        Self {
            walker: ChangeWalker::new(subject, order),
            order,
            content,
            ours,
            theirs,
            auto_merged: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    fn merge_value(
        &mut self,
        path: &PropertyPath,
        parent_key: Option<&str>,
        base: Option<&Value>,
        ours: Option<&Value>,
        theirs: Option<&Value>,
    ) {
        let ours_changed = ours != base;
        let theirs_changed = theirs != base;
        match (ours_changed, theirs_changed) {
            (false, false) => {}
            (true, false) => self.take(path, parent_key, base, ours, MergeSide::Ours),
            (false, true) => self.take(path, parent_key, base, theirs, MergeSide::Theirs),
            (true, true) if ours == theirs => self.take(path, parent_key, base, ours, MergeSide::Both),
            (true, true) => self.reconcile(path, parent_key, base, ours, theirs),
        }
    }

    /// Both sides edited differently; descend into containers before giving up
    fn reconcile(
        &mut self,
        path: &PropertyPath,
        parent_key: Option<&str>,
        base: Option<&Value>,
        ours: Option<&Value>,
        theirs: Option<&Value>,
    ) {
        if self.walker.is_modification_list(path) {
            self.merge_modifications(path, base, ours, theirs);
            return;
        }

        match (base, ours, theirs) {
            (None | Some(Value::Mapping(_)), Some(Value::Mapping(o)), Some(Value::Mapping(t))) => {
                let b = base.and_then(Value::as_mapping);
                let keys: IndexSet<&String> = b
                    .into_iter()
                    .flat_map(|b| b.keys())
                    .chain(o.keys())
                    .chain(t.keys())
                    .collect();
                for key in keys {
                    self.merge_value(
                        &path.key(key.as_str()),
                        Some(key.as_str()),
                        b.and_then(|b| b.get(key)),
                        o.get(key),
                        t.get(key),
                    );
                }
            }
            (Some(Value::Sequence(b)), Some(Value::Sequence(o)), Some(Value::Sequence(t)))
                if self.order.ignores_order(parent_key) =>
            {
                let merged = Value::Sequence(merge_multiset(b, o, t));
                self.take(path, parent_key, base, Some(&merged), MergeSide::Both);
            }
            (Some(Value::Sequence(b)), Some(Value::Sequence(o)), Some(Value::Sequence(t)))
                if b.len() == o.len() && o.len() == t.len() =>
            {
                for i in 0..b.len() {
                    self.merge_value(&path.index(i), None, b.get(i), o.get(i), t.get(i));
                }
            }
            _ => self.conflict(ConflictKind::Property(path.clone()), path.to_string(), base, ours, theirs),
        }
    }

    fn take(
        &mut self,
        path: &PropertyPath,
        parent_key: Option<&str>,
        base: Option<&Value>,
        chosen: Option<&Value>,
        side: MergeSide,
    ) {
        self.walker.compare_options(path, parent_key, base, chosen);
        self.auto_merged
            .extend(self.walker.changes.drain(..).map(|change| AutoMerge { side, change }));

        if base.is_none()
            && let Some(value) = chosen
        {
            let order = if side == MergeSide::Theirs { self.theirs } else { self.ours };
            if insert_in_side_order(&mut self.content, order, path, value) {
                return;
            }
        }
        let written = match chosen {
            Some(value) => self.content.overlay_path(path, value.clone()),
            None => self.content.remove_path(path),
        };
        if let Err(err) = written {
            warn!(path = %path, error = %err, "could not write merged value");
        }
    }

    fn conflict(
        &mut self,
        kind: ConflictKind,
        property_path: String,
        base: Option<&Value>,
        ours: Option<&Value>,
        theirs: Option<&Value>,
    ) {
        debug!(path = %property_path, "property conflict");
        self.conflicts.push(PropertyConflict {
            key: self.walker.subject().key(property_path),
            kind,
            base: base.cloned(),
            ours: ours.cloned(),
            theirs: theirs.cloned(),
        });
    }

    /// Three-way merge of modification entries keyed by `(target, propertyPath)`
    fn merge_modifications(
        &mut self,
        path: &PropertyPath,
        base: Option<&Value>,
        ours: Option<&Value>,
        theirs: Option<&Value>,
    ) {
        let empty = Value::Sequence(Vec::new());
        let b = modification_map(base.unwrap_or(&empty));
        let o = modification_map(ours.unwrap_or(&empty));
        let t = modification_map(theirs.unwrap_or(&empty));

        let keys: IndexSet<&ModificationKey> = b.keys().chain(o.keys()).chain(t.keys()).collect();
        let mut merged: IndexMap<ModificationKey, Modification> = IndexMap::new();
        for key in keys {
            let (bm, om, tm) = (b.get(key), o.get(key), t.get(key));
            let chosen = match (om != bm, tm != bm) {
                (false, false) => bm,
                (true, false) => {
                    self.record_modification(key, bm, om, MergeSide::Ours);
                    om
                }
                (false, true) => {
                    self.record_modification(key, bm, tm, MergeSide::Theirs);
                    tm
                }
                (true, true) if om == tm => {
                    self.record_modification(key, bm, om, MergeSide::Both);
                    om
                }
                (true, true) => {
                    let entry = |m: Option<&Modification>| m.map(Modification::to_value);
                    self.conflict(
                        ConflictKind::Modification(key.clone()),
                        key.to_string(),
                        entry(bm).as_ref(),
                        entry(om).as_ref(),
                        entry(tm).as_ref(),
                    );
                    bm
                }
            };
            if let Some(modification) = chosen {
                merged.insert(key.clone(), modification.clone());
            }
        }

        let list = Value::Sequence(merged.values().map(Modification::to_value).collect());
        if let Err(err) = self.content.overlay_path(path, list) {
            warn!(path = %path, error = %err, "could not write merged modifications");
        }
    }

    fn record_modification(
        &mut self,
        key: &ModificationKey,
        base: Option<&Modification>,
        chosen: Option<&Modification>,
        side: MergeSide,
    ) {
        let kind = match (base, chosen) {
            (None, _) => ChangeKind::Added,
            (_, None) => ChangeKind::Removed,
            _ => ChangeKind::Modified,
        };
        self.auto_merged.push(AutoMerge {
            side,
            change: PropertyChange {
                key: self.walker.subject().key(key.to_string()),
                kind,
                old: base.map(Modification::effective_value),
                new: chosen.map(Modification::effective_value),
            },
        });
    }
}

/// Order-insensitive merge: per distinct element, additions from both
/// sides count once when they agree, removals likewise
fn merge_multiset(base: &[Value], ours: &[Value], theirs: &[Value]) -> Vec<Value> {
    let count = |list: &[Value], value: &Value| list.iter().filter(|x| *x == value).count() as isize;
    let mut distinct: Vec<&Value> = Vec::new();
    for value in ours.iter().chain(theirs).chain(base) {
        if !distinct.contains(&value) {
            distinct.push(value);
        }
    }

    let mut merged = Vec::new();
    for value in distinct {
        let b = count(base, value);
        let ours_delta = count(ours, value) - b;
        let theirs_delta = count(theirs, value) - b;
        let n = if ours_delta > 0 && theirs_delta > 0 {
            b + ours_delta.max(theirs_delta)
        } else if ours_delta < 0 && theirs_delta < 0 {
            b + ours_delta.min(theirs_delta)
        } else {
            b + ours_delta + theirs_delta
        };
        merged.extend(std::iter::repeat_n(value.clone(), n.max(0) as usize));
    }
    merged
}

/// Write a conflict's chosen value into the merged document
///
/// Fails with `StaleResolution` when the object, the property's parent,
/// or (for a property that existed in base) the property itself is gone.
pub fn apply_resolution(document: &mut Document, conflict: &PropertyConflict, resolution: Resolution) -> Result<()> {
    match &conflict.kind {
        ConflictKind::Property(path) => resolve_property(document, conflict, path, resolution),
        ConflictKind::Modification(key) => resolve_modification(document, conflict, key, resolution),
        ConflictKind::Object(versions) => resolve_object(document, conflict, versions, resolution),
    }
}

fn chosen_value(conflict: &PropertyConflict, resolution: Resolution) -> Option<Value> {
    match resolution {
        Resolution::Base => conflict.base.clone(),
        Resolution::Ours => conflict.ours.clone(),
        Resolution::Theirs => conflict.theirs.clone(),
        Resolution::Value(value) => Some(value),
    }
}

/// Insert a key the base lacked right after its nearest predecessor on the
/// side that added it; false when the parent mapping is missing
fn insert_in_side_order(content: &mut Value, side: &Value, path: &PropertyPath, value: &Value) -> bool {
    let Some((parent, PathSegment::Key(key))) = path.split_last() else {
        return false;
    };
    let (Some(order), Some(target)) = (
        side.get_path(&parent).and_then(Value::as_mapping),
        content.get_path_mut(&parent).and_then(Value::as_mapping_mut),
    ) else {
        return false;
    };
    let Some(position) = order.get_index_of(key) else {
        return false;
    };
    if target.contains_key(key) {
        return false;
    }

    let at = order
        .keys()
        .take(position)
        .rev()
        .find_map(|previous| target.get_index_of(previous))
        .map_or(0, |index| index + 1);
    target.shift_insert(at, key.clone(), value.clone());
    true
}

fn resolve_property(
    document: &mut Document,
    conflict: &PropertyConflict,
    path: &PropertyPath,
    resolution: Resolution,
) -> Result<()> {
    let stale = || PrefabError::stale(conflict.key.to_string());
    let object = document.get_mut(conflict.key.component_id).ok_or_else(stale)?;
    let fields = object.serialized_fields();
    if let Some((parent, _)) = path.split_last()
        && fields.get_path(&parent).is_none()
    {
        return Err(stale());
    }
    if conflict.base.is_some() && fields.get_path(path).is_none() {
        return Err(stale());
    }

    let chosen = chosen_value(conflict, resolution);
    let content = object.content_mut().ok_or_else(|| {
        PrefabError::invalid_path(path.to_string(), "stripped placeholders have no editable content")
    })?;
    match chosen {
        Some(value) => content.set_path(path, value)?,
        None => content.remove_path(path)?,
    };
    Ok(())
}

fn resolve_modification(
    document: &mut Document,
    conflict: &PropertyConflict,
    key: &ModificationKey,
    resolution: Resolution,
) -> Result<()> {
    let stale = || PrefabError::stale(conflict.key.to_string());
    let chosen = match resolution {
        Resolution::Value(value) => Some(entry_with_value(conflict, value).ok_or_else(stale)?),
        other => chosen_value(conflict, other),
    };

    let path = crate::diff::modifications_path();
    let list = document
        .get_mut(conflict.key.component_id)
        .and_then(Object::content_mut)
        .and_then(|content| content.get_path_mut(&path))
        .and_then(|list| match list {
            Value::Sequence(items) => Some(items),
            _ => None,
        })
        .ok_or_else(stale)?;

    let position = list
        .iter()
        .position(|entry| Modification::from_value(entry).is_some_and(|m| m.key() == *key));
    match (position, chosen) {
        (Some(i), Some(entry)) => list[i] = entry,
        (Some(i), None) => {
            list.remove(i);
        }
        (None, _) if conflict.base.is_some() => return Err(stale()),
        (None, Some(entry)) => list.push(entry),
        (None, None) => {}
    }
    Ok(())
}

/// A conflicting entry with its value replaced; references go to `objectReference`
fn entry_with_value(conflict: &PropertyConflict, value: Value) -> Option<Value> {
    let template = [&conflict.ours, &conflict.theirs, &conflict.base]
        .into_iter()
        .flatten()
        .find_map(Modification::from_value)?;
    let modification = match value {
        Value::Reference(reference) => Modification {
            value: None,
            object_reference: Some(reference),
            ..template
        },
        other => Modification {
            value: Some(other),
            object_reference: None,
            ..template
        },
    };
    Some(modification.to_value())
}

fn resolve_object(
    document: &mut Document,
    conflict: &PropertyConflict,
    versions: &ObjectVersions,
    resolution: Resolution,
) -> Result<()> {
    let id = conflict.key.component_id;
    if versions.base.is_some() != document.contains(id) {
        return Err(PrefabError::stale(conflict.key.to_string()));
    }

    let chosen = match resolution {
        Resolution::Base => versions.base.clone(),
        Resolution::Ours => versions.ours.clone(),
        Resolution::Theirs => versions.theirs.clone(),
        Resolution::Value(value) => {
            let template = versions
                .ours
                .as_ref()
                .or(versions.theirs.as_ref())
                .or(versions.base.as_ref());
            template.map(|template| {
                let mut object = template.clone();
                object.set_content(value);
                object
            })
        }
    };
    match chosen {
        Some(object) => document.insert(object),
        None => {
            document.remove(id);
        }
    }
    Ok(())
}
