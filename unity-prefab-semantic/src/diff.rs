//! Two-way semantic diff
//!
//! Objects are paired by identifier (same-file history) or structurally
//! (independent files), then their value trees are walked key by key.
//! Every change is keyed by `(object_path, component_type, component_id,
//! property_path)` so consumers never see raw YAML lines.

use crate::guid_index::{GuidIndex, MemoryGuidIndex};
use crate::options::{DiffOptions, ObjectMatching, SequenceOrder};
use crate::resolver::Resolver;
use indexmap::IndexMap;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument};
use unity_prefab_core::{
    Document, FileId, MODIFICATIONS_PATH, Modification, ModificationKey, Object, PropertyPath, Result, Value,
};

/// Identity of a compared property
///
/// When the two sides of a matched pair disagree on a label field (a
/// renamed parent, a changed script class, independent file ids), the key
/// carries the lexicographically lower value of each field. The choice is
/// arbitrary but total, so `diff(a, b)` and `diff(b, a)` produce the same
/// keys and merges from either side line up.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PropertyKey {
    /// Hierarchy path of the owning GameObject (`Root/Child`)
    pub object_path: String,
    pub component_type: String,
    pub component_id: FileId,
    /// Unity property path; empty for whole-object changes
    pub property_path: String,
}

impl PropertyKey {
    /// Property path as inspector breadcrumbs (`Local Position > X`)
    pub fn display_property(&self) -> String {
        crate::naming::nicify_property_path(&self.property_path)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.object_path, self.component_type)?;
        if !self.property_path.is_empty() {
            write!(f, ".{}", self.property_path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl ChangeKind {
    pub fn reversed(self) -> Self {
        match self {
            ChangeKind::Added => ChangeKind::Removed,
            ChangeKind::Removed => ChangeKind::Added,
            ChangeKind::Modified => ChangeKind::Modified,
        }
    }
}

/// One property-level difference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyChange {
    pub key: PropertyKey,
    pub kind: ChangeKind,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

impl PropertyChange {
    /// The same change seen from the other side
    pub fn reversed(&self) -> Self {
        Self {
            key: self.key.clone(),
            kind: self.kind.reversed(),
            old: self.new.clone(),
            new: self.old.clone(),
        }
    }

    /// Change to a whole object rather than one of its properties
    pub fn is_object_level(&self) -> bool {
        self.key.property_path.is_empty()
    }

    pub(crate) fn sort_order(a: &Self, b: &Self) -> Ordering {
        a.key.cmp(&b.key).then(a.kind.cmp(&b.kind))
    }
}

impl fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.kind {
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
            ChangeKind::Modified => '~',
        };
        write!(f, "{} {}", sign, self.key)
    }
}

/// Counts of object- and property-level changes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub objects_added: usize,
    pub objects_removed: usize,
    /// Objects with at least one property change
    pub objects_modified: usize,
    pub properties_added: usize,
    pub properties_removed: usize,
    pub properties_modified: usize,
}

impl DiffSummary {
    pub fn from_changes(changes: &[PropertyChange]) -> Self {
        let mut summary = Self::default();
        let mut modified_objects = std::collections::HashSet::new();
        for change in changes {
            if change.is_object_level() {
                match change.kind {
                    ChangeKind::Added => summary.objects_added += 1,
                    ChangeKind::Removed => summary.objects_removed += 1,
                    ChangeKind::Modified => {
                        modified_objects.insert(change.key.component_id);
                    }
                }
                continue;
            }
            modified_objects.insert(change.key.component_id);
            match change.kind {
                ChangeKind::Added => summary.properties_added += 1,
                ChangeKind::Removed => summary.properties_removed += 1,
                ChangeKind::Modified => summary.properties_modified += 1,
            }
        }
        summary.objects_modified = modified_objects.len();
        summary
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "objects: +{} -{} ~{}; properties: +{} -{} ~{}",
            self.objects_added,
            self.objects_removed,
            self.objects_modified,
            self.properties_added,
            self.properties_removed,
            self.properties_modified
        )
    }
}

/// The object a walk reports changes against
#[derive(Debug, Clone)]
pub(crate) struct Subject {
    pub object_path: String,
    pub component_type: String,
    pub component_id: FileId,
    pub instance: bool,
}

impl Subject {
    pub(crate) fn of(resolver: &Resolver<'_>, object: &Object) -> Self {
        Self {
            object_path: resolver.object_path(object.file_id),
            component_type: object.class_name.clone(),
            component_id: object.file_id,
            instance: object.is_prefab_instance(),
        }
    }

    /// Label for a matched pair; each field takes the lower of the two sides
    pub(crate) fn pair(left: Subject, right: Subject) -> Self {
        Self {
            object_path: left.object_path.min(right.object_path),
            component_type: left.component_type.min(right.component_type),
            component_id: left.component_id.min(right.component_id),
            instance: left.instance && right.instance,
        }
    }

    pub(crate) fn key<S: Into<String>>(&self, property_path: S) -> PropertyKey {
        PropertyKey {
            object_path: self.object_path.clone(),
            component_type: self.component_type.clone(),
            component_id: self.component_id,
            property_path: property_path.into(),
        }
    }
}

/// Recursive value-tree comparison shared by diff and merge
pub(crate) struct ChangeWalker<'a> {
    subject: Subject,
    order: &'a SequenceOrder,
    modifications_path: PropertyPath,
    pub changes: Vec<PropertyChange>,
}

impl<'a> ChangeWalker<'a> {
    pub(crate) fn new(subject: Subject, order: &'a SequenceOrder) -> Self {
        Self {
            subject,
            order,
            modifications_path: modifications_path(),
            changes: Vec::new(),
        }
    }

    pub(crate) fn subject(&self) -> &Subject {
        &self.subject
    }

    fn push(&mut self, property_path: String, kind: ChangeKind, old: Option<Value>, new: Option<Value>) {
        self.changes.push(PropertyChange {
            key: self.subject.key(property_path),
            kind,
            old,
            new,
        });
    }

    /// Compare values that may be missing on either side
    pub(crate) fn compare_options(
        &mut self,
        path: &PropertyPath,
        parent_key: Option<&str>,
        left: Option<&Value>,
        right: Option<&Value>,
    ) {
        match (left, right) {
            (Some(left), Some(right)) => self.compare(path, parent_key, left, right),
            (Some(left), None) => self.push(path.to_string(), ChangeKind::Removed, Some(left.clone()), None),
            (None, Some(right)) => self.push(path.to_string(), ChangeKind::Added, None, Some(right.clone())),
            (None, None) => {}
        }
    }

    pub(crate) fn compare(&mut self, path: &PropertyPath, parent_key: Option<&str>, left: &Value, right: &Value) {
        if left == right {
            return;
        }
        if self.is_modification_list(path) {
            self.compare_modifications(left, right);
            return;
        }
        match (left, right) {
            (Value::Mapping(l), Value::Mapping(r)) => {
                for (key, lv) in l {
                    self.compare_options(&path.key(key.as_str()), Some(key.as_str()), Some(lv), r.get(key));
                }
                for (key, rv) in r {
                    if !l.contains_key(key) {
                        self.compare_options(&path.key(key.as_str()), Some(key.as_str()), None, Some(rv));
                    }
                }
            }
            (Value::Sequence(l), Value::Sequence(r)) => {
                if self.order.ignores_order(parent_key) {
                    self.compare_unordered(path, l, r);
                } else {
                    for i in 0..l.len().max(r.len()) {
                        self.compare_options(&path.index(i), None, l.get(i), r.get(i));
                    }
                }
            }
            _ => self.push(
                path.to_string(),
                ChangeKind::Modified,
                Some(left.clone()),
                Some(right.clone()),
            ),
        }
    }

    /// Multiset comparison: equal elements pair greedily in order, the rest
    /// are removed at their left index or added at their right index
    fn compare_unordered(&mut self, path: &PropertyPath, left: &[Value], right: &[Value]) {
        let mut used = vec![false; right.len()];
        for (i, lv) in left.iter().enumerate() {
            let matched = right
                .iter()
                .enumerate()
                .position(|(j, rv)| !used[j] && rv == lv);
            match matched {
                Some(j) => used[j] = true,
                None => self.push(path.index(i).to_string(), ChangeKind::Removed, Some(lv.clone()), None),
            }
        }
        for (j, rv) in right.iter().enumerate() {
            if !used[j] {
                self.push(path.index(j).to_string(), ChangeKind::Added, None, Some(rv.clone()));
            }
        }
    }

    pub(crate) fn is_modification_list(&self, path: &PropertyPath) -> bool {
        self.subject.instance && *path == self.modifications_path
    }

    /// Modifications compare per `(target, propertyPath)`, not per list index
    fn compare_modifications(&mut self, left: &Value, right: &Value) {
        let left = modification_map(left);
        let right = modification_map(right);
        for (key, lm) in &left {
            match right.get(key) {
                Some(rm) if rm == lm => {}
                Some(rm) => self.push(
                    key.to_string(),
                    ChangeKind::Modified,
                    Some(lm.effective_value()),
                    Some(rm.effective_value()),
                ),
                None => self.push(key.to_string(), ChangeKind::Removed, Some(lm.effective_value()), None),
            }
        }
        for (key, rm) in &right {
            if !left.contains_key(key) {
                self.push(key.to_string(), ChangeKind::Added, None, Some(rm.effective_value()));
            }
        }
    }
}

pub(crate) fn modifications_path() -> PropertyPath {
    PropertyPath::parse(MODIFICATIONS_PATH).unwrap_or_default()
}

/// Modification entries keyed by target and property path; later entries win
pub(crate) fn modification_map(list: &Value) -> IndexMap<ModificationKey, Modification> {
    list.as_sequence()
        .into_iter()
        .flatten()
        .filter_map(Modification::from_value)
        .map(|modification| (modification.key(), modification))
        .collect()
}

/// Diff with default options
pub fn diff(left: &Document, right: &Document) -> Result<Vec<PropertyChange>> {
    diff_with(left, right, &DiffOptions::default())
}

pub fn diff_with(left: &Document, right: &Document, options: &DiffOptions) -> Result<Vec<PropertyChange>> {
    diff_with_index(left, right, options, &MemoryGuidIndex::new())
}

/// Diff using `index` to name nested prefab instances in object paths
#[instrument(skip_all, fields(left = left.len(), right = right.len()))]
pub fn diff_with_index(
    left: &Document,
    right: &Document,
    options: &DiffOptions,
    index: &dyn GuidIndex,
) -> Result<Vec<PropertyChange>> {
    left.ensure_complete()?;
    right.ensure_complete()?;

    let left_resolver = Resolver::new(left, index);
    let right_resolver = Resolver::new(right, index);
    let pairing = match options.matching {
        ObjectMatching::Identifier => pair_by_identifier(left, right),
        ObjectMatching::Structural => pair_structurally(&left_resolver, &right_resolver),
    };

    let mut changes = Vec::new();
    for (l, r) in pairing.matched {
        let (Some(l), Some(r)) = (left.get(l), right.get(r)) else {
            continue;
        };
        let subject = Subject::pair(Subject::of(&left_resolver, l), Subject::of(&right_resolver, r));
        if l.class_id != r.class_id || l.is_stripped() != r.is_stripped() {
            changes.push(PropertyChange {
                key: subject.key(""),
                kind: ChangeKind::Modified,
                old: Some(l.serialized_fields().clone()),
                new: Some(r.serialized_fields().clone()),
            });
            continue;
        }
        let mut walker = ChangeWalker::new(subject, &options.sequence_order);
        walker.compare(&PropertyPath::root(), None, l.serialized_fields(), r.serialized_fields());
        changes.append(&mut walker.changes);
    }
    for id in pairing.left_only {
        if let Some(object) = left.get(id) {
            changes.push(PropertyChange {
                key: Subject::of(&left_resolver, object).key(""),
                kind: ChangeKind::Removed,
                old: Some(object.serialized_fields().clone()),
                new: None,
            });
        }
    }
    for id in pairing.right_only {
        if let Some(object) = right.get(id) {
            changes.push(PropertyChange {
                key: Subject::of(&right_resolver, object).key(""),
                kind: ChangeKind::Added,
                old: None,
                new: Some(object.serialized_fields().clone()),
            });
        }
    }

    changes.sort_by(PropertyChange::sort_order);
    debug!(changes = changes.len(), "diff complete");
    Ok(changes)
}

#[derive(Debug, Default)]
struct Pairing {
    matched: Vec<(FileId, FileId)>,
    left_only: Vec<FileId>,
    right_only: Vec<FileId>,
}

fn pair_by_identifier(left: &Document, right: &Document) -> Pairing {
    let mut pairing = Pairing::default();
    for id in left.file_ids() {
        if right.contains(id) {
            pairing.matched.push((id, id));
        } else {
            pairing.left_only.push(id);
        }
    }
    pairing.right_only = right.file_ids().filter(|id| !left.contains(*id)).collect();
    pairing
}

/// Pair by (class, hierarchy path, occurrence) for files with unrelated identifiers
fn pair_structurally(left: &Resolver<'_>, right: &Resolver<'_>) -> Pairing {
    let left_keys = structural_keys(left);
    let mut right_keys = structural_keys(right);
    let mut pairing = Pairing::default();
    for (key, id) in left_keys {
        match right_keys.shift_remove(&key) {
            Some(other) => pairing.matched.push((id, other)),
            None => pairing.left_only.push(id),
        }
    }
    pairing.right_only = right_keys.into_values().collect();
    pairing
}

fn structural_keys(resolver: &Resolver<'_>) -> IndexMap<(String, String, usize), FileId> {
    let mut seen: HashMap<(String, String), usize> = HashMap::new();
    let mut keys = IndexMap::new();
    for object in resolver.document().objects() {
        let base = (object.class_name.clone(), resolver.object_path(object.file_id));
        let ordinal = seen.entry(base.clone()).or_insert(0);
        keys.insert((base.0, base.1, *ordinal), object.file_id);
        *ordinal += 1;
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use unity_prefab_yaml::parse_document;

    const LEFT: &str = "--- !u!1 &1
GameObject:
  m_Name: Root
--- !u!4 &2
Transform:
  m_GameObject: {fileID: 1}
  m_LocalPosition: {x: 0, y: 0, z: 0}
  m_Children:
  - {fileID: 4}
  - {fileID: 6}
  m_Father: {fileID: 0}
";

    #[test]
    fn test_property_change_is_keyed_by_object_path() {
        let left = parse_document(LEFT).unwrap();
        let right = parse_document(&LEFT.replace("{x: 0, y: 0, z: 0}", "{x: 1, y: 0, z: 0}")).unwrap();

        let changes = diff(&left, &right).unwrap();
        assert_eq!(changes.len(), 1);
        let change = &changes[0];
        assert_eq!(change.kind, ChangeKind::Modified);
        assert_eq!(change.key.to_string(), "Root.Transform.m_LocalPosition.x");
        assert_eq!(change.old, Some(Value::from(0)));
        assert_eq!(change.new, Some(Value::from(1)));
    }

    #[test]
    fn test_children_reorder_is_ignored_by_default() {
        let left = parse_document(LEFT).unwrap();
        let swapped = LEFT.replace("  - {fileID: 4}\n  - {fileID: 6}", "  - {fileID: 6}\n  - {fileID: 4}");
        let right = parse_document(&swapped).unwrap();

        assert!(diff(&left, &right).unwrap().is_empty());

        let positional = DiffOptions::default().with_sequence_order(SequenceOrder::Positional);
        let changes = diff_with(&left, &right, &positional).unwrap();
        let paths: Vec<&str> = changes.iter().map(|c| c.key.property_path.as_str()).collect();
        assert_eq!(paths, vec!["m_Children.Array.data[0]", "m_Children.Array.data[1]"]);
    }

    #[test]
    fn test_unmatched_objects_are_single_changes() {
        let left = parse_document(LEFT).unwrap();
        let mut text = LEFT.to_string();
        text.push_str("--- !u!114 &-77\nMonoBehaviour:\n  m_GameObject: {fileID: 1}\n  m_Speed: 2\n");
        let right = parse_document(&text).unwrap();

        let changes = diff(&left, &right).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert!(changes[0].is_object_level());
        assert_eq!(changes[0].key.component_id, -77);
        assert_eq!(changes[0].key.object_path, "Root");

        let summary = DiffSummary::from_changes(&changes);
        assert_eq!(summary.objects_added, 1);
        assert_eq!(summary.properties_added, 0);
    }

    #[test]
    fn test_structural_matching_ignores_identifiers() {
        let left = parse_document(LEFT).unwrap();
        let renumbered = LEFT
            .replace("&1\n", "&100\n")
            .replace("&2\n", "&200\n")
            .replace("m_GameObject: {fileID: 1}", "m_GameObject: {fileID: 100}");
        let right = parse_document(&renumbered).unwrap();

        let by_id = diff(&left, &right).unwrap();
        assert_eq!(DiffSummary::from_changes(&by_id).objects_added, 2);

        let structural = DiffOptions::default().with_matching(ObjectMatching::Structural);
        let changes = diff_with(&left, &right, &structural).unwrap();
        let paths: Vec<&str> = changes.iter().map(|c| c.key.property_path.as_str()).collect();
        assert_eq!(paths, vec!["m_GameObject"]);
    }

    #[test]
    fn test_incomplete_documents_are_rejected() {
        let broken = unity_prefab_yaml::parse_document_with(
            "--- !u!1 &1\nGameObject:\n  m_Name: A\n--- !u!1 &x\nGameObject:\n",
            unity_prefab_yaml::ParseMode::BestEffort,
        )
        .unwrap();
        let left = parse_document(LEFT).unwrap();
        assert!(matches!(
            diff(&left, &broken),
            Err(unity_prefab_core::PrefabError::IncompleteDocument { skipped: 1 })
        ));
    }
}
