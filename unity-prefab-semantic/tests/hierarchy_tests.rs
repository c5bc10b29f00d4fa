//! Hierarchy construction and nested-prefab expansion against an in-memory project

use anyhow::Result;
use pretty_assertions::assert_eq;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use unity_prefab_core::{PrefabError, Value};
use unity_prefab_semantic::{
    CancellationToken, DocumentSource, ExpansionIssue, GuidIndex, HierarchyBuilder, HierarchyOptions,
    MemoryGuidIndex,
};
use unity_prefab_yaml::parse_document;

const LAMP_GUID: &str = "4f1c2d3e4b5a69788796a5b4c3d2e1f0";
const SCRIPT_GUID: &str = "7a3c5e9b1d2f4a6c8e0b2d4f6a8c0e1b";
const LOOP_GUID: &str = "aaaabbbbccccddddeeeeffff00001111";

const LAMP: &str = "%YAML 1.1
%TAG !u! tag:unity3d.com,2011:
--- !u!1 &100000
GameObject:
  m_Component:
  - component: {fileID: 400000}
  - component: {fileID: 11400000}
  m_Name: Lamp
  m_IsActive: 1
--- !u!4 &400000
Transform:
  m_GameObject: {fileID: 100000}
  m_Children:
  - {fileID: 400002}
  m_Father: {fileID: 0}
--- !u!114 &11400000
MonoBehaviour:
  m_GameObject: {fileID: 100000}
  m_Script: {fileID: 11500000, guid: 7a3c5e9b1d2f4a6c8e0b2d4f6a8c0e1b, type: 3}
  m_Intensity: 1
--- !u!1 &100002
GameObject:
  m_Component:
  - component: {fileID: 400002}
  m_Name: Bulb
  m_IsActive: 1
--- !u!4 &400002
Transform:
  m_GameObject: {fileID: 100002}
  m_Children: []
  m_Father: {fileID: 400000}
";

const ROOM: &str = "%YAML 1.1
%TAG !u! tag:unity3d.com,2011:
--- !u!1 &1
GameObject:
  m_Component:
  - component: {fileID: 2}
  m_Name: Room
--- !u!4 &2
Transform:
  m_GameObject: {fileID: 1}
  m_Children:
  - {fileID: 21}
  - {fileID: 11}
  m_Father: {fileID: 0}
--- !u!1001 &10
PrefabInstance:
  m_Modification:
    m_TransformParent: {fileID: 2}
    m_Modifications:
    - target: {fileID: 100000, guid: 4F1C2D3E4B5A69788796A5B4C3D2E1F0, type: 3}
      propertyPath: m_Name
      value: LampA
      objectReference: {fileID: 0}
    - target: {fileID: 11400000, guid: 4f1c2d3e4b5a69788796a5b4c3d2e1f0, type: 3}
      propertyPath: m_Intensity
      value: 5
      objectReference: {fileID: 0}
    m_RemovedComponents: []
  m_SourcePrefab: {fileID: 100100000, guid: 4f1c2d3e4b5a69788796a5b4c3d2e1f0, type: 3}
--- !u!4 &11 stripped
Transform:
  m_CorrespondingSourceObject: {fileID: 400000, guid: 4f1c2d3e4b5a69788796a5b4c3d2e1f0, type: 3}
  m_PrefabInstance: {fileID: 10}
--- !u!1001 &20
PrefabInstance:
  m_Modification:
    m_TransformParent: {fileID: 2}
    m_Modifications:
    - target: {fileID: 100000, guid: 4f1c2d3e4b5a69788796a5b4c3d2e1f0, type: 3}
      propertyPath: m_Name
      value: LampB
      objectReference: {fileID: 0}
    - target: {fileID: 100002, guid: 4f1c2d3e4b5a69788796a5b4c3d2e1f0, type: 3}
      propertyPath: m_IsActive
      value: 0
      objectReference: {fileID: 0}
    m_RemovedComponents:
    - {fileID: 11400000, guid: 4f1c2d3e4b5a69788796a5b4c3d2e1f0, type: 3}
  m_SourcePrefab: {fileID: 100100000, guid: 4f1c2d3e4b5a69788796a5b4c3d2e1f0, type: 3}
--- !u!4 &21 stripped
Transform:
  m_CorrespondingSourceObject: {fileID: 400000, guid: 4f1c2d3e4b5a69788796a5b4c3d2e1f0, type: 3}
  m_PrefabInstance: {fileID: 20}
";

/// A prefab whose root holds an instance of itself
const LOOP: &str = "--- !u!1 &100000
GameObject:
  m_Component:
  - component: {fileID: 400000}
  m_Name: Loop
--- !u!4 &400000
Transform:
  m_GameObject: {fileID: 100000}
  m_Children:
  - {fileID: 31}
  m_Father: {fileID: 0}
--- !u!1001 &30
PrefabInstance:
  m_Modification:
    m_TransformParent: {fileID: 400000}
    m_Modifications: []
    m_RemovedComponents: []
  m_SourcePrefab: {fileID: 100100000, guid: aaaabbbbccccddddeeeeffff00001111, type: 3}
--- !u!4 &31 stripped
Transform:
  m_CorrespondingSourceObject: {fileID: 400000, guid: aaaabbbbccccddddeeeeffff00001111, type: 3}
  m_PrefabInstance: {fileID: 30}
";

/// Documents served from memory, counting reads
#[derive(Default)]
struct MemorySource {
    files: Mutex<HashMap<PathBuf, String>>,
    reads: AtomicUsize,
}

impl MemorySource {
    fn with(self, path: &str, text: &str) -> Self {
        self.write(path, text);
        self
    }

    /// Replace a file's contents, as an editor save would
    fn write(&self, path: &str, text: &str) {
        self.files
            .lock()
            .expect("files lock")
            .insert(PathBuf::from(path), text.to_string());
    }
}

impl DocumentSource for MemorySource {
    fn load(&self, path: &Path) -> unity_prefab_core::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .ok()
            .and_then(|files| files.get(path).cloned())
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, path.display().to_string()).into())
    }
}

/// Records every batch request made against the wrapped index
struct RecordingIndex {
    inner: MemoryGuidIndex,
    batches: Mutex<Vec<BTreeSet<String>>>,
}

impl GuidIndex for RecordingIndex {
    fn resolve_many(&self, guids: &BTreeSet<String>) -> HashMap<String, String> {
        if let Ok(mut batches) = self.batches.lock() {
            batches.push(guids.clone());
        }
        self.inner.resolve_many(guids)
    }

    fn resolve_path(&self, guid: &str) -> Option<std::path::PathBuf> {
        self.inner.resolve_path(guid)
    }
}

fn project_index() -> MemoryGuidIndex {
    MemoryGuidIndex::from_entries([
        (LAMP_GUID, "Assets/Prefabs/Lamp.prefab"),
        (SCRIPT_GUID, "Assets/Scripts/LampLight.cs"),
        (LOOP_GUID, "Assets/Prefabs/Loop.prefab"),
    ])
}

fn project_source() -> MemorySource {
    MemorySource::default()
        .with("Assets/Prefabs/Lamp.prefab", LAMP)
        .with("Assets/Prefabs/Loop.prefab", LOOP)
}

#[test]
fn test_instances_stay_collapsed_until_expanded() -> Result<()> {
    let room = parse_document(ROOM)?;
    let index = project_index();
    let source = project_source();
    let mut builder = HierarchyBuilder::new(&index, &source);
    let hierarchy = builder.build(&room)?;

    let room_node = hierarchy.find_by_path("Room").expect("room");
    let names: Vec<&str> = room_node.children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["LampB", "LampA"]);
    for lamp in &room_node.children {
        assert!(lamp.is_prefab_instance);
        assert!(!lamp.nested_loaded);
        assert!(lamp.children.is_empty());
        assert_eq!(lamp.source_guid.as_deref(), Some(LAMP_GUID));
    }
    assert_eq!(source.reads.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_expansion_applies_overrides_per_instance() -> Result<()> {
    let room = parse_document(ROOM)?;
    let index = project_index();
    let source = project_source();
    let mut builder = HierarchyBuilder::new(&index, &source);
    let mut hierarchy = builder.build(&room)?;
    builder.expand_all(&mut hierarchy)?;

    // One parse, two independent copies
    assert_eq!(builder.documents_loaded(), 1);
    assert_eq!(source.reads.load(Ordering::SeqCst), 1);
    assert!(builder.cache().contains(LAMP_GUID));

    let lamp_a = hierarchy.find_by_path("Room/LampA").expect("LampA");
    assert!(lamp_a.nested_loaded);
    assert_eq!(lamp_a.diagnostic, None);
    let light = lamp_a
        .components
        .iter()
        .find(|c| c.file_id == 11400000)
        .expect("light component");
    assert_eq!(light.properties.get("m_Intensity"), Some(&Value::from(5)));
    assert_eq!(light.script_name.as_deref(), Some("LampLight"));
    assert!(hierarchy.find_by_path("Room/LampA/Bulb").expect("bulb").active);

    let lamp_b = hierarchy.find_by_path("Room/LampB").expect("LampB");
    assert!(lamp_b.find_component(11400000).is_none());
    assert!(lamp_b.find_component(400000).is_some());
    assert!(!lamp_b.child("Bulb").expect("bulb").active);
    Ok(())
}

#[test]
fn test_script_names_resolve_in_one_batch() -> Result<()> {
    let lamp = parse_document(LAMP)?;
    let index = RecordingIndex {
        inner: project_index(),
        batches: Mutex::new(Vec::new()),
    };
    let source = project_source();
    let hierarchy = HierarchyBuilder::new(&index, &source).build(&lamp)?;

    let batches = index.batches.lock().map(|b| b.clone()).unwrap_or_default();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].contains(SCRIPT_GUID));

    let root = &hierarchy.roots[0];
    assert_eq!(root.components[1].script_name.as_deref(), Some("LampLight"));
    assert_eq!(root.children[0].name, "Bulb");
    assert_eq!(root.components[1].title(), "Lamp Light");

    let without_names = HierarchyOptions::default().with_script_names(false);
    let hierarchy = HierarchyBuilder::new(&index, &source)
        .with_options(without_names)
        .build(&lamp)?;
    assert_eq!(hierarchy.roots[0].components[1].script_name, None);
    assert_eq!(hierarchy.roots[0].components[1].title(), "Script");
    assert_eq!(index.batches.lock().map(|b| b.len()).unwrap_or_default(), 1);
    Ok(())
}

#[test]
fn test_batch_and_single_lookups_agree() {
    let index = project_index();
    let guids: BTreeSet<String> = [LAMP_GUID, SCRIPT_GUID, "ffffffffffffffffffffffffffffffff"]
        .iter()
        .map(|g| g.to_string())
        .collect();
    let batch = index.resolve_many(&guids);
    let single: HashMap<String, String> = guids
        .iter()
        .filter_map(|g| Some((g.clone(), index.resolve_one(g)?)))
        .collect();
    assert_eq!(batch, single);
    assert_eq!(batch.len(), 2);
}

#[test]
fn test_self_nesting_prefab_terminates() -> Result<()> {
    let index = project_index();
    let source = project_source();

    // Opening the looping prefab itself
    let looping = parse_document(LOOP)?.with_guid(LOOP_GUID);
    let options = HierarchyOptions::default().with_expand_nested(true);
    let mut builder = HierarchyBuilder::new(&index, &source).with_options(options);
    let hierarchy = builder.build(&looping)?;
    let inner = hierarchy.roots[0].children.first().expect("nested instance");
    assert!(!inner.nested_loaded);
    assert_eq!(
        inner.diagnostic,
        Some(ExpansionIssue::Cycle {
            guid: LOOP_GUID.to_string()
        })
    );

    // A scene placing the looping prefab expands one level, then stops
    let scene = parse_document(&LOOP.replace("m_Name: Loop", "m_Name: Scene"))?;
    let mut builder = HierarchyBuilder::new(&index, &source).with_options(options);
    let hierarchy = builder.build(&scene)?;
    let first = &hierarchy.roots[0].children[0];
    assert!(first.nested_loaded);
    assert_eq!(first.name, "Loop");
    let repeated = first.children.first().expect("repeated instance");
    assert!(!repeated.nested_loaded);
    assert!(matches!(repeated.diagnostic, Some(ExpansionIssue::Cycle { .. })));
    assert_eq!(builder.documents_loaded(), 1);
    Ok(())
}

#[test]
fn test_missing_prefab_file_is_a_diagnostic() -> Result<()> {
    let room = parse_document(ROOM)?;
    let index = project_index();
    let source = MemorySource::default();
    let options = HierarchyOptions::default().with_expand_nested(true);
    let hierarchy = HierarchyBuilder::new(&index, &source)
        .with_options(options)
        .build(&room)?;

    let lamp = hierarchy.find_by_path("Room/LampA").expect("LampA");
    assert!(!lamp.nested_loaded);
    assert!(matches!(lamp.diagnostic, Some(ExpansionIssue::LoadFailed { .. })));
    Ok(())
}

#[test]
fn test_cancelled_build_stops_before_loading() -> Result<()> {
    let room = parse_document(ROOM)?;
    let index = project_index();
    let source = project_source();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let options = HierarchyOptions::default().with_expand_nested(true);
    let result = HierarchyBuilder::new(&index, &source)
        .with_options(options)
        .with_cancellation(cancel)
        .build(&room);
    assert!(matches!(result, Err(PrefabError::Cancelled)));
    assert_eq!(source.reads.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_independent_builds_do_not_share_cache() -> Result<()> {
    let room = parse_document(ROOM)?;
    let index = project_index();
    let source = project_source();
    let options = HierarchyOptions::default().with_expand_nested(true);

    for _ in 0..2 {
        let mut builder = HierarchyBuilder::new(&index, &source).with_options(options);
        builder.build(&room)?;
        assert_eq!(builder.documents_loaded(), 1);
    }
    assert_eq!(source.reads.load(Ordering::SeqCst), 2);
    Ok(())
}

#[test]
fn test_rebuild_with_same_builder_sees_file_changes() -> Result<()> {
    let room = parse_document(ROOM)?;
    let index = project_index();
    let source = project_source();
    let options = HierarchyOptions::default().with_expand_nested(true);
    let mut builder = HierarchyBuilder::new(&index, &source).with_options(options);

    let first = builder.build(&room)?;
    assert!(first.find_by_path("Room/LampA/Bulb").is_some());

    source.write("Assets/Prefabs/Lamp.prefab", &LAMP.replace("m_Name: Bulb", "m_Name: Globe"));
    let second = builder.build(&room)?;
    assert!(second.find_by_path("Room/LampA/Globe").is_some());
    assert!(second.find_by_path("Room/LampA/Bulb").is_none());
    assert_eq!(builder.documents_loaded(), 1);
    assert_eq!(source.reads.load(Ordering::SeqCst), 2);

    // Lazy expansion after a build reuses that build's cache
    let mut collapsed = HierarchyBuilder::new(&index, &source);
    let mut hierarchy = collapsed.build(&room)?;
    collapsed.expand(hierarchy.find_by_path_mut("Room/LampA").expect("LampA"))?;
    collapsed.expand(hierarchy.find_by_path_mut("Room/LampB").expect("LampB"))?;
    assert_eq!(collapsed.documents_loaded(), 1);
    assert!(hierarchy.find_by_path("Room/LampB/Globe").is_some());
    Ok(())
}
