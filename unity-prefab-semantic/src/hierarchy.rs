//! Hierarchy reconstruction
//!
//! Rebuilds the GameObject tree the editor shows from a flat document:
//! components attach to their owner (through stripped placeholders),
//! children follow their Transform's `m_Children` order, and nested
//! prefabs expand on request.
//!
//! Expansion of a nested prefab loads its document through the injected
//! `DocumentSource`, builds it, and copies its root into the instance
//! node. Built sub-hierarchies are cached per GUID from one `build` call
//! to the next, so a prefab used N times in a build is parsed once. GUIDs being
//! expanded are tracked on a stack passed down the recursion; meeting one
//! again is a cycle and stops expansion of that node.

use crate::guid_index::{GuidIndex, normalize_guid};
use crate::options::HierarchyOptions;
use crate::resolver::{Resolver, local_reference, raw_label};
use crate::source::DocumentSource;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use unity_prefab_core::{
    Document, FileId, Modification, Object, PrefabError, PrefabInstance, PropertyPath, Reference, Result, Value,
    class_ids, is_transform_class, keys,
};
use unity_prefab_yaml::parse_document;

/// Why a PrefabInstance node was not expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionIssue {
    /// The GUID is already being expanded further up
    Cycle { guid: String },
    /// The GUID index has no path for the GUID
    UnresolvedGuid { guid: String },
    /// The nested document could not be read or parsed
    LoadFailed { guid: String, reason: String },
    /// The instance names no source prefab
    MissingSource,
}

impl fmt::Display for ExpansionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpansionIssue::Cycle { guid } => write!(f, "nested prefab cycle through {}", guid),
            ExpansionIssue::UnresolvedGuid { guid } => write!(f, "unknown prefab GUID {}", guid),
            ExpansionIssue::LoadFailed { guid, reason } => write!(f, "failed to load prefab {}: {}", guid, reason),
            ExpansionIssue::MissingSource => write!(f, "prefab instance has no source prefab"),
        }
    }
}

/// A component attached to a node
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentNode {
    pub file_id: FileId,
    pub class_id: u32,
    /// Class name (`Transform`, `MonoBehaviour`)
    pub type_name: String,
    /// GUID of the script asset, for components with `m_Script`
    pub script_guid: Option<String>,
    /// Script class name from the GUID index
    pub script_name: Option<String>,
    pub properties: Value,
}

impl ComponentNode {
    fn from_object(object: &Object) -> Self {
        let script_guid = object
            .get(keys::SCRIPT)
            .and_then(Value::as_reference)
            .and_then(|script| script.guid.as_deref())
            .map(normalize_guid);
        Self {
            file_id: object.file_id,
            class_id: object.class_id,
            type_name: object.class_name.clone(),
            script_guid,
            script_name: None,
            properties: object.serialized_fields().clone(),
        }
    }

    /// Script name when known, else the class name
    pub fn display_name(&self) -> &str {
        self.script_name.as_deref().unwrap_or(&self.type_name)
    }

    /// Inspector title (`Mesh Renderer`, `Player Controller`)
    pub fn title(&self) -> String {
        crate::naming::component_display_name(&self.type_name, self.script_name.as_deref())
    }
}

/// A GameObject or PrefabInstance in the tree
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyNode {
    /// GameObject id, or PrefabInstance id for instance nodes
    pub file_id: FileId,
    pub name: String,
    pub active: bool,
    pub transform_id: Option<FileId>,
    pub children: Vec<HierarchyNode>,
    pub components: Vec<ComponentNode>,
    pub is_prefab_instance: bool,
    pub source_guid: Option<String>,
    pub modifications: Vec<Modification>,
    pub removed_components: Vec<Reference>,
    /// True once the nested prefab's content has been merged in
    pub nested_loaded: bool,
    pub diagnostic: Option<ExpansionIssue>,
}

impl HierarchyNode {
    fn game_object(object: &Object) -> Self {
        Self {
            file_id: object.file_id,
            name: object.name().map(str::to_string).unwrap_or_else(|| raw_label(object.file_id)),
            active: object.get(keys::IS_ACTIVE).and_then(Value::as_bool).unwrap_or(true),
            transform_id: None,
            children: Vec::new(),
            components: Vec::new(),
            is_prefab_instance: false,
            source_guid: None,
            modifications: Vec::new(),
            removed_components: Vec::new(),
            nested_loaded: false,
            diagnostic: None,
        }
    }

    fn prefab_instance(instance: PrefabInstance) -> Self {
        Self {
            file_id: instance.file_id,
            name: instance.name_override().unwrap_or_default(),
            active: true,
            transform_id: None,
            children: Vec::new(),
            components: Vec::new(),
            is_prefab_instance: true,
            source_guid: instance.source_guid,
            modifications: instance.modifications,
            removed_components: instance.removed_components,
            nested_loaded: false,
            diagnostic: None,
        }
    }

    /// Instance node whose nested content has not been merged in yet
    pub fn needs_expansion(&self) -> bool {
        self.is_prefab_instance && !self.nested_loaded && self.diagnostic.is_none()
    }

    /// Depth-first traversal starting at this node
    pub fn iter(&self) -> Iter<'_> {
        Iter { stack: vec![self] }
    }

    pub fn find_component(&self, file_id: FileId) -> Option<&ComponentNode> {
        self.components.iter().find(|component| component.file_id == file_id)
    }

    /// Direct child by name
    pub fn child(&self, name: &str) -> Option<&HierarchyNode> {
        self.children.iter().find(|child| child.name == name)
    }
}

/// Depth-first, pre-order node iterator
pub struct Iter<'a> {
    stack: Vec<&'a HierarchyNode>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a HierarchyNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// The forest built from one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hierarchy {
    pub roots: Vec<HierarchyNode>,
    /// GUID of the source document
    guid: Option<String>,
}

impl Hierarchy {
    pub fn guid(&self) -> Option<&str> {
        self.guid.as_deref()
    }

    /// Every node, depth first, in display order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: self.roots.iter().rev().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Node at a slash-separated name path (`Root/Child`)
    pub fn find_by_path(&self, path: &str) -> Option<&HierarchyNode> {
        let mut names = path.split('/');
        let first = names.next()?;
        let mut node = self.roots.iter().find(|root| root.name == first)?;
        for name in names {
            node = node.child(name)?;
        }
        Some(node)
    }

    pub fn find_by_path_mut(&mut self, path: &str) -> Option<&mut HierarchyNode> {
        let mut names = path.split('/');
        let first = names.next()?;
        let mut node = self.roots.iter_mut().find(|root| root.name == first)?;
        for name in names {
            node = node.children.iter_mut().find(|child| child.name == name)?;
        }
        Some(node)
    }
}

/// Sub-hierarchies built during one builder's lifetime, keyed by prefab GUID
#[derive(Debug, Default)]
pub struct ExpansionCache {
    built: HashMap<String, Arc<Hierarchy>>,
}

impl ExpansionCache {
    pub fn len(&self) -> usize {
        self.built.len()
    }

    pub fn is_empty(&self) -> bool {
        self.built.is_empty()
    }

    pub fn contains(&self, guid: &str) -> bool {
        self.built.contains_key(&normalize_guid(guid))
    }
}

/// Node under construction
struct Draft {
    node: HierarchyNode,
    /// Transform this node is parented under
    parent_transform: Option<FileId>,
    order: usize,
}

/// Builds hierarchies and expands nested prefabs
///
/// The builder owns its expansion cache, which `build` resets.
pub struct HierarchyBuilder<'a> {
    index: &'a dyn GuidIndex,
    source: &'a dyn DocumentSource,
    options: HierarchyOptions,
    cancel: CancellationToken,
    cache: ExpansionCache,
    documents_loaded: usize,
}

impl<'a> HierarchyBuilder<'a> {
    pub fn new(index: &'a dyn GuidIndex, source: &'a dyn DocumentSource) -> Self {
        Self {
            index,
            source,
            options: HierarchyOptions::default(),
            cancel: CancellationToken::new(),
            cache: ExpansionCache::default(),
            documents_loaded: 0,
        }
    }

    pub fn with_options(mut self, options: HierarchyOptions) -> Self {
        self.options = options;
        self
    }

    /// Checked before every nested expansion
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cache(&self) -> &ExpansionCache {
        &self.cache
    }

    /// Nested documents parsed since the latest `build`
    pub fn documents_loaded(&self) -> usize {
        self.documents_loaded
    }

    /// Build the hierarchy of `document`; nested prefabs stay collapsed
    /// unless `HierarchyOptions::expand_nested` is set
    ///
    /// Every build starts from an empty expansion cache. `expand` and
    /// `expand_all` on the result share the cache of the latest build.
    #[instrument(skip_all, fields(objects = document.len(), guid = document.guid()))]
    pub fn build(&mut self, document: &Document) -> Result<Hierarchy> {
        self.cache = ExpansionCache::default();
        self.documents_loaded = 0;
        let mut hierarchy = self.assemble(document);
        if self.options.expand_nested {
            self.expand_all(&mut hierarchy)?;
        }
        info!(nodes = hierarchy.len(), "built hierarchy");
        Ok(hierarchy)
    }

    /// Expand one PrefabInstance node
    pub fn expand(&mut self, node: &mut HierarchyNode) -> Result<()> {
        self.expand_node(node, &mut Vec::new())
    }

    /// Expand every PrefabInstance node of a hierarchy
    pub fn expand_all(&mut self, hierarchy: &mut Hierarchy) -> Result<()> {
        let mut visited: Vec<String> = hierarchy.guid.iter().cloned().collect();
        for root in &mut hierarchy.roots {
            self.expand_tree(root, &mut visited)?;
        }
        Ok(())
    }

    fn expand_tree(&mut self, node: &mut HierarchyNode, visited: &mut Vec<String>) -> Result<()> {
        if node.needs_expansion() {
            self.expand_node(node, visited)?;
        }
        for child in &mut node.children {
            self.expand_tree(child, visited)?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(node = node.file_id, guid = node.source_guid.as_deref()))]
    fn expand_node(&mut self, node: &mut HierarchyNode, visited: &mut Vec<String>) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(PrefabError::Cancelled);
        }
        if !node.is_prefab_instance || node.nested_loaded {
            return Ok(());
        }
        let Some(guid) = node.source_guid.clone() else {
            node.diagnostic = Some(ExpansionIssue::MissingSource);
            return Ok(());
        };
        if visited.contains(&guid) {
            warn!(guid = %guid, depth = visited.len(), "nested prefab cycle; not expanding");
            node.nested_loaded = false;
            node.diagnostic = Some(ExpansionIssue::Cycle { guid });
            return Ok(());
        }

        let sub = match self.load_nested(&guid, visited)? {
            Ok(sub) => sub,
            Err(issue) => {
                warn!(issue = %issue, "nested prefab not expanded");
                node.diagnostic = Some(issue);
                return Ok(());
            }
        };
        let Some(root) = sub.roots.first() else {
            node.diagnostic = Some(ExpansionIssue::LoadFailed {
                guid,
                reason: "prefab has no root GameObject".to_string(),
            });
            return Ok(());
        };

        graft(node, root, &guid);
        node.nested_loaded = true;
        node.diagnostic = None;
        Ok(())
    }

    /// Cached or freshly built sub-hierarchy for `guid`
    fn load_nested(
        &mut self,
        guid: &str,
        visited: &mut Vec<String>,
    ) -> Result<std::result::Result<Arc<Hierarchy>, ExpansionIssue>> {
        if let Some(sub) = self.cache.built.get(guid) {
            debug!(guid, "nested prefab cache hit");
            return Ok(Ok(Arc::clone(sub)));
        }

        let Some(path) = self.index.resolve_path(guid) else {
            return Ok(Err(ExpansionIssue::UnresolvedGuid { guid: guid.to_string() }));
        };
        let document = match self.load_document(&path, guid) {
            Ok(document) => document,
            Err(err) => {
                return Ok(Err(ExpansionIssue::LoadFailed {
                    guid: guid.to_string(),
                    reason: err.to_string(),
                }));
            }
        };
        self.documents_loaded += 1;

        let mut sub = self.assemble(&document);
        visited.push(guid.to_string());
        let mut expanded = Ok(());
        for root in &mut sub.roots {
            expanded = self.expand_tree(root, visited);
            if expanded.is_err() {
                break;
            }
        }
        visited.pop();
        expanded?;

        let sub = Arc::new(sub);
        self.cache.built.insert(guid.to_string(), Arc::clone(&sub));
        Ok(Ok(sub))
    }

    fn load_document(&self, path: &Path, guid: &str) -> Result<Document> {
        let text = self.source.load(path)?;
        Ok(parse_document(&text)?.with_guid(guid).with_path(path))
    }

    /// Construct the collapsed tree of one document
    fn assemble(&self, document: &Document) -> Hierarchy {
        let resolver = Resolver::new(document, self.index);
        let mut drafts: IndexMap<FileId, Draft> = IndexMap::new();
        // transform id -> node owning it
        let mut transform_owner: HashMap<FileId, FileId> = HashMap::new();

        for (order, object) in document.objects().iter().enumerate() {
            if object.is_game_object() && !object.is_stripped() {
                drafts.insert(
                    object.file_id,
                    Draft {
                        node: HierarchyNode::game_object(object),
                        parent_transform: None,
                        order,
                    },
                );
            } else if let Some(instance) = PrefabInstance::from_object(object) {
                let parent_transform = instance.transform_parent.as_ref().map(|parent| parent.file_id);
                drafts.insert(
                    object.file_id,
                    Draft {
                        node: HierarchyNode::prefab_instance(instance),
                        parent_transform,
                        order,
                    },
                );
            }
        }

        for object in document.objects() {
            if !is_transform_class(object.class_id) {
                continue;
            }
            if object.is_stripped() {
                if let Some(owner) = resolver.resolve_owning_object(object) {
                    transform_owner.insert(object.file_id, owner.file_id);
                }
                continue;
            }
            let Some(game_object) = local_reference(object, keys::GAME_OBJECT) else {
                continue;
            };
            transform_owner.insert(object.file_id, game_object);
            if let Some(draft) = drafts.get_mut(&game_object) {
                draft.node.transform_id = Some(object.file_id);
                draft.parent_transform = local_reference(object, keys::FATHER);
            }
        }

        self.attach_components(document, &resolver, &mut drafts);

        // Parent links
        let mut children_of: HashMap<FileId, Vec<FileId>> = HashMap::new();
        let mut roots = Vec::new();
        for (&id, draft) in &drafts {
            let parent = draft
                .parent_transform
                .and_then(|transform| transform_owner.get(&transform))
                .copied()
                .filter(|parent| *parent != id && drafts.contains_key(parent));
            match parent {
                Some(parent) => children_of.entry(parent).or_default().push(id),
                None => roots.push(id),
            }
        }

        // Child order follows the parent Transform's m_Children list
        for (parent, children) in children_of.iter_mut() {
            let listed = drafts
                .get(parent)
                .and_then(|draft| draft.node.transform_id)
                .and_then(|transform| document.get(transform))
                .and_then(|transform| transform.get(keys::CHILDREN))
                .map(|list| listed_nodes(list, &transform_owner))
                .unwrap_or_default();
            children.sort_by_key(|child| {
                (
                    listed.get(child).copied().unwrap_or(usize::MAX),
                    drafts.get(child).map_or(usize::MAX, |draft| draft.order),
                )
            });
        }
        self.order_roots(document, &drafts, &transform_owner, &mut roots);

        if self.options.resolve_script_names {
            resolve_names(self.index, &mut drafts);
        }
        for draft in drafts.values_mut() {
            if draft.node.name.is_empty() {
                draft.node.name = raw_label(draft.node.file_id);
            }
        }

        let mut nodes: HashMap<FileId, HierarchyNode> =
            drafts.iter().map(|(&id, draft)| (id, draft.node.clone())).collect();
        let mut forest = Vec::new();
        for id in roots {
            if let Some(node) = take_subtree(id, &mut nodes, &children_of) {
                forest.push(node);
            }
        }
        // Nodes caught in a malformed parent cycle surface as extra roots
        for id in drafts.keys() {
            if let Some(node) = take_subtree(*id, &mut nodes, &children_of) {
                warn!(file_id = id, "object unreachable from any root; listing as root");
                forest.push(node);
            }
        }

        debug!(roots = forest.len(), "assembled hierarchy");
        Hierarchy {
            roots: forest,
            guid: document.guid().map(str::to_string),
        }
    }

    /// Components in `m_Component` order, plus components added to nested instances
    fn attach_components(&self, document: &Document, resolver: &Resolver<'_>, drafts: &mut IndexMap<FileId, Draft>) {
        for draft in drafts.values_mut() {
            if draft.node.is_prefab_instance {
                continue;
            }
            let Some(list) = document
                .get(draft.node.file_id)
                .and_then(|object| object.get(keys::COMPONENT))
                .and_then(Value::as_sequence)
            else {
                continue;
            };
            for entry in list {
                let Some(component) = component_reference(entry).and_then(|id| document.get(id)) else {
                    continue;
                };
                if !component.is_stripped() {
                    draft.node.components.push(ComponentNode::from_object(component));
                }
            }
        }

        for object in document.objects() {
            if object.is_stripped() || object.is_game_object() || object.is_prefab_instance() {
                continue;
            }
            let Some(game_object) = local_reference(object, keys::GAME_OBJECT) else {
                continue;
            };
            if !document.get(game_object).is_some_and(Object::is_stripped) {
                continue;
            }
            if let Some(owner) = resolver.resolve_owning_object(object)
                && let Some(draft) = drafts.get_mut(&owner.file_id)
            {
                draft.node.components.push(ComponentNode::from_object(object));
            }
        }
    }

    /// SceneRoots order when present, else `m_RootOrder`, else document order
    fn order_roots(
        &self,
        document: &Document,
        drafts: &IndexMap<FileId, Draft>,
        transform_owner: &HashMap<FileId, FileId>,
        roots: &mut [FileId],
    ) {
        let scene_roots = document
            .find_by_class(class_ids::SCENE_ROOTS)
            .find_map(|object| object.get(keys::ROOTS))
            .map(|list| listed_nodes(list, transform_owner))
            .unwrap_or_default();

        roots.sort_by_key(|id| {
            let draft = drafts.get(id);
            let root_order = draft.and_then(|draft| root_order(document, &draft.node));
            (
                scene_roots.get(id).copied().unwrap_or(usize::MAX),
                root_order.unwrap_or(i64::MAX),
                draft.map_or(usize::MAX, |draft| draft.order),
            )
        });
    }
}

/// Position of every node referenced by a transform list (`m_Children`, `m_Roots`)
fn listed_nodes(list: &Value, transform_owner: &HashMap<FileId, FileId>) -> HashMap<FileId, usize> {
    let mut positions = HashMap::new();
    for (i, entry) in list.as_sequence().into_iter().flatten().enumerate() {
        let Some(reference) = entry.as_reference() else {
            continue;
        };
        let node = transform_owner
            .get(&reference.file_id)
            .copied()
            .unwrap_or(reference.file_id);
        positions.entry(node).or_insert(i);
    }
    positions
}

/// `m_RootOrder` of a GameObject's transform, or of an instance's overrides
fn root_order(document: &Document, node: &HierarchyNode) -> Option<i64> {
    if node.is_prefab_instance {
        return node
            .modifications
            .iter()
            .find(|m| m.property_path == keys::ROOT_ORDER)
            .and_then(|m| m.value.as_ref())
            .and_then(Value::as_i64);
    }
    document
        .get(node.transform_id?)?
        .get(keys::ROOT_ORDER)
        .and_then(Value::as_i64)
}

/// `component: {fileID: N}`, or the pre-2018 `<class_id>: {fileID: N}` form
fn component_reference(entry: &Value) -> Option<FileId> {
    let reference = match entry {
        Value::Reference(reference) => reference,
        Value::Mapping(map) => map.values().find_map(Value::as_reference)?,
        _ => return None,
    };
    (!reference.is_null()).then_some(reference.file_id)
}

/// One batch lookup for every script and source-prefab GUID of the build
fn resolve_names(index: &dyn GuidIndex, drafts: &mut IndexMap<FileId, Draft>) {
    let mut guids = BTreeSet::new();
    for draft in drafts.values() {
        guids.extend(draft.node.components.iter().filter_map(|c| c.script_guid.clone()));
        if draft.node.is_prefab_instance
            && draft.node.name.is_empty()
            && let Some(guid) = &draft.node.source_guid
        {
            guids.insert(guid.clone());
        }
    }
    if guids.is_empty() {
        return;
    }

    let names = index.resolve_many(&guids);
    debug!(requested = guids.len(), resolved = names.len(), "resolved script names");
    for draft in drafts.values_mut() {
        for component in &mut draft.node.components {
            if let Some(guid) = &component.script_guid {
                component.script_name = names.get(guid).cloned();
            }
        }
        if draft.node.is_prefab_instance && draft.node.name.is_empty() {
            draft.node.name = draft
                .node
                .source_guid
                .as_ref()
                .and_then(|guid| names.get(guid))
                .map(|name| {
                    Path::new(name)
                        .file_stem()
                        .map(|stem| stem.to_string_lossy().into_owned())
                        .unwrap_or_else(|| name.clone())
                })
                .unwrap_or_else(|| raw_label(draft.node.file_id));
        }
    }
}

fn take_subtree(
    id: FileId,
    nodes: &mut HashMap<FileId, HierarchyNode>,
    children_of: &HashMap<FileId, Vec<FileId>>,
) -> Option<HierarchyNode> {
    let mut node = nodes.remove(&id)?;
    for child in children_of.get(&id).into_iter().flatten() {
        if let Some(child) = take_subtree(*child, nodes, children_of) {
            node.children.push(child);
        }
    }
    Some(node)
}

/// Copy a nested prefab's root into an instance node and apply its overrides
fn graft(node: &mut HierarchyNode, root: &HierarchyNode, guid: &str) {
    let mut children = root.children.clone();
    let mut components = root.components.clone();
    let mut name = root.name.clone();
    let mut active = root.active;

    for modification in &node.modifications {
        if modification
            .target
            .guid
            .as_deref()
            .is_some_and(|target| normalize_guid(target) != guid)
        {
            continue;
        }
        let target = modification.target.file_id;
        if target == root.file_id {
            apply_game_object_override(&mut name, &mut active, modification);
        } else if let Some(game_object) = find_node_mut(&mut children, target) {
            apply_game_object_override(&mut game_object.name, &mut game_object.active, modification);
        } else if let Some(component) = find_component_mut(&mut components, &mut children, target) {
            apply_component_override(component, modification);
        }
    }

    for removed in &node.removed_components {
        remove_component(&mut components, &mut children, removed.file_id);
    }

    children.append(&mut node.children);
    components.append(&mut node.components);
    node.children = children;
    node.components = components;
    node.name = name;
    node.active = active;
}

fn apply_game_object_override(name: &mut String, active: &mut bool, modification: &Modification) {
    let Some(value) = modification.value.as_ref() else {
        return;
    };
    match modification.property_path.as_str() {
        keys::NAME => {
            if let Some(text) = value.scalar_text() {
                *name = text;
            }
        }
        keys::IS_ACTIVE => {
            if let Some(flag) = value.as_bool() {
                *active = flag;
            }
        }
        _ => {}
    }
}

fn apply_component_override(component: &mut ComponentNode, modification: &Modification) {
    let result = PropertyPath::parse(&modification.property_path)
        .and_then(|path| component.properties.overlay_path(&path, modification.effective_value()));
    if let Err(err) = result {
        debug!(component = component.file_id, error = %err, "modification does not apply");
    }
}

fn find_node_mut(nodes: &mut [HierarchyNode], file_id: FileId) -> Option<&mut HierarchyNode> {
    for node in nodes {
        if node.file_id == file_id {
            return Some(node);
        }
        if let Some(found) = find_node_mut(&mut node.children, file_id) {
            return Some(found);
        }
    }
    None
}

fn find_component_mut<'n>(
    components: &'n mut [ComponentNode],
    children: &'n mut [HierarchyNode],
    file_id: FileId,
) -> Option<&'n mut ComponentNode> {
    if let Some(component) = components.iter_mut().find(|c| c.file_id == file_id) {
        return Some(component);
    }
    for child in children {
        if let Some(component) = find_component_mut(&mut child.components, &mut child.children, file_id) {
            return Some(component);
        }
    }
    None
}

fn remove_component(components: &mut Vec<ComponentNode>, children: &mut [HierarchyNode], file_id: FileId) {
    components.retain(|c| c.file_id != file_id);
    for child in children {
        remove_component(&mut child.components, &mut child.children, file_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid_index::MemoryGuidIndex;
    use crate::source::FsDocumentSource;

    fn build(text: &str) -> Hierarchy {
        let doc = parse_document(text).unwrap();
        let index = MemoryGuidIndex::new();
        let source = FsDocumentSource::new();
        HierarchyBuilder::new(&index, &source).build(&doc).unwrap()
    }

    #[test]
    fn test_children_follow_transform_list_order() {
        let text = "--- !u!1 &1
GameObject:
  m_Component:
  - component: {fileID: 2}
  m_Name: Parent
--- !u!4 &2
Transform:
  m_GameObject: {fileID: 1}
  m_Children:
  - {fileID: 60}
  - {fileID: 20}
  - {fileID: 40}
  m_Father: {fileID: 0}
--- !u!1 &10
GameObject:
  m_Name: A
--- !u!4 &20
Transform:
  m_GameObject: {fileID: 10}
  m_Father: {fileID: 2}
--- !u!1 &30
GameObject:
  m_Name: B
--- !u!4 &40
Transform:
  m_GameObject: {fileID: 30}
  m_Father: {fileID: 2}
--- !u!1 &50
GameObject:
  m_Name: C
--- !u!4 &60
Transform:
  m_GameObject: {fileID: 50}
  m_Father: {fileID: 2}
";
        let hierarchy = build(text);
        assert_eq!(hierarchy.roots.len(), 1);
        let names: Vec<&str> = hierarchy.roots[0].children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "A", "B"]);
        assert_eq!(hierarchy.find_by_path("Parent/B").map(|n| n.file_id), Some(30));
        assert_eq!(hierarchy.len(), 4);
    }

    #[test]
    fn test_root_order_from_scene_roots() {
        let text = "--- !u!1 &1
GameObject:
  m_Name: First
--- !u!4 &2
Transform:
  m_GameObject: {fileID: 1}
  m_Father: {fileID: 0}
  m_RootOrder: 0
--- !u!1 &3
GameObject:
  m_Name: Second
--- !u!4 &4
Transform:
  m_GameObject: {fileID: 3}
  m_Father: {fileID: 0}
  m_RootOrder: 1
--- !u!1660057539 &9
SceneRoots:
  m_Roots:
  - {fileID: 4}
  - {fileID: 2}
";
        let hierarchy = build(text);
        let names: Vec<&str> = hierarchy.roots.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Second", "First"]);

        let without_scene_roots = text.split("--- !u!1660057539").next().unwrap();
        let hierarchy = build(without_scene_roots);
        let names: Vec<&str> = hierarchy.roots.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_components_in_declared_order() {
        let text = "--- !u!1 &1
GameObject:
  m_Component:
  - component: {fileID: 3}
  - component: {fileID: 2}
  m_Name: Lamp
  m_IsActive: 0
--- !u!114 &2
MonoBehaviour:
  m_GameObject: {fileID: 1}
  m_Script: {fileID: 11500000, guid: 5F2B1C9E8D7A4B3C9E0F1A2B3C4D5E6F, type: 3}
--- !u!4 &3
Transform:
  m_GameObject: {fileID: 1}
  m_Father: {fileID: 0}
";
        let hierarchy = build(text);
        let lamp = &hierarchy.roots[0];
        assert!(!lamp.active);
        assert_eq!(lamp.transform_id, Some(3));
        let types: Vec<&str> = lamp.components.iter().map(|c| c.type_name.as_str()).collect();
        assert_eq!(types, vec!["Transform", "MonoBehaviour"]);
        assert_eq!(
            lamp.components[1].script_guid.as_deref(),
            Some("5f2b1c9e8d7a4b3c9e0f1a2b3c4d5e6f")
        );
        assert_eq!(lamp.components[1].display_name(), "MonoBehaviour");
    }

    #[test]
    fn test_parent_cycle_does_not_lose_nodes() {
        let text = "--- !u!1 &1
GameObject:
  m_Name: A
--- !u!4 &2
Transform:
  m_GameObject: {fileID: 1}
  m_Father: {fileID: 4}
--- !u!1 &3
GameObject:
  m_Name: B
--- !u!4 &4
Transform:
  m_GameObject: {fileID: 3}
  m_Father: {fileID: 2}
";
        let hierarchy = build(text);
        assert_eq!(hierarchy.len(), 2);
    }

    #[test]
    fn test_cancelled_expansion() {
        let text = "--- !u!1001 &1
PrefabInstance:
  m_Modification:
    m_TransformParent: {fileID: 0}
    m_Modifications: []
    m_RemovedComponents: []
  m_SourcePrefab: {fileID: 100100000, guid: abc, type: 3}
";
        let doc = parse_document(text).unwrap();
        let index = MemoryGuidIndex::new();
        let source = FsDocumentSource::new();
        let cancel = CancellationToken::new();
        let mut builder = HierarchyBuilder::new(&index, &source).with_cancellation(cancel.clone());
        let mut hierarchy = builder.build(&doc).unwrap();
        assert!(hierarchy.roots[0].needs_expansion());

        cancel.cancel();
        assert!(matches!(builder.expand_all(&mut hierarchy), Err(PrefabError::Cancelled)));
    }

    #[test]
    fn test_unresolved_guid_is_a_diagnostic() {
        let text = "--- !u!1001 &1
PrefabInstance:
  m_Modification:
    m_Modifications: []
  m_SourcePrefab: {fileID: 100100000, guid: abc, type: 3}
";
        let doc = parse_document(text).unwrap();
        let index = MemoryGuidIndex::new();
        let source = FsDocumentSource::new();
        let mut builder = HierarchyBuilder::new(&index, &source);
        let mut hierarchy = builder.build(&doc).unwrap();
        builder.expand(&mut hierarchy.roots[0]).unwrap();

        let node = &hierarchy.roots[0];
        assert!(!node.nested_loaded);
        assert_eq!(
            node.diagnostic,
            Some(ExpansionIssue::UnresolvedGuid {
                guid: "abc".to_string()
            })
        );
        assert_eq!(node.name, "&1");
    }
}
