//! Unity Prefab
//!
//! Semantic diff and merge for Unity scene and prefab files. Documents
//! are parsed losslessly, objects are addressed by their signed file ids,
//! and comparisons happen per property path instead of per text line.
//!
//! # Examples
//!
//! ```rust,no_run
//! use unity_prefab::{HierarchyBuilder, load_document, merge, project::Project};
//!
//! let project = Project::open("MyGame/Assets/Scenes")?;
//! let scene = project.load_document("Assets/Scenes/Main.unity")?;
//!
//! let mut builder = HierarchyBuilder::new(project.index(), project.source());
//! let mut hierarchy = builder.build(&scene)?;
//! builder.expand_all(&mut hierarchy)?;
//! for node in hierarchy.iter() {
//!     println!("{} ({} components)", node.name, node.components.len());
//! }
//!
//! let base = load_document("base.prefab")?;
//! let ours = load_document("ours.prefab")?;
//! let theirs = load_document("theirs.prefab")?;
//! let result = merge(&base, &ours, &theirs)?;
//! for conflict in &result.conflicts {
//!     println!("conflict at {}", conflict.key);
//! }
//! # Ok::<(), unity_prefab::PrefabError>(())
//! ```

// Re-export from the member crates
pub use unity_prefab_core::{
    Document, FileId, Modification, ModificationKey, Object, ObjectData, PrefabError, PrefabInstance, PropertyPath,
    Reference, Result, Scalar, SkippedBlock, Value, class_ids,
};
pub use unity_prefab_semantic::{
    AutoMerge, CancellationToken, ChangeKind, ConflictKind, DiffOptions, DiffSummary, DocumentSource,
    ExpansionIssue, FsDocumentSource, GuidIndex, GuidStore, Hierarchy, HierarchyBuilder, HierarchyNode,
    HierarchyOptions, LazyGuidIndex, LazyIndexConfig, MemoryGuidIndex, MergeOptions, MergeResult, MergeSide,
    ObjectMatching, PropertyChange, PropertyConflict, PropertyKey, Resolution, Resolver, SequenceOrder,
    apply_resolution, component_display_name, diff, diff_with, merge, merge_with, nicify_property_path,
    nicify_variable_name, property_display_name,
};
pub use unity_prefab_yaml::{
    ParseMode, UnityYamlLoader, UnityYamlSerializer, load_document, parse_document, parse_document_with,
    save_document, serialize_document,
};

#[cfg(feature = "async")]
pub use unity_prefab_yaml::load_document_async;

/// Unity project access on disk
pub mod project {
    use crate::{Document, FsDocumentSource, MemoryGuidIndex, PrefabError, Result, parse_document};
    use serde::Deserialize;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tracing::{debug, info, warn};
    use walkdir::{DirEntry, WalkDir};

    /// Folder every Unity project keeps its assets in
    pub const ASSETS_DIR: &str = "Assets";

    /// Directories Unity generates or tools own; never scanned
    const SKIPPED_DIRS: &[&str] = &["Library", "Temp", "Logs", "obj", "bin", ".git", ".vs"];

    /// The part of a `.meta` file the index needs
    #[derive(Debug, Deserialize)]
    struct MetaFile {
        guid: String,
    }

    /// Nearest ancestor of `start` (itself included) that contains an `Assets` folder
    pub fn find_project_root<P: AsRef<Path>>(start: P) -> Option<PathBuf> {
        start
            .as_ref()
            .ancestors()
            .find(|dir| dir.join(ASSETS_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// GUID of the asset at `path`, read from its `.meta` sidecar
    pub fn read_meta_guid<P: AsRef<Path>>(path: P) -> Result<String> {
        let path = path.as_ref();
        let mut meta = path.as_os_str().to_owned();
        meta.push(".meta");
        parse_meta(&fs::read_to_string(PathBuf::from(meta))?)
    }

    fn parse_meta(text: &str) -> Result<String> {
        let meta: MetaFile =
            serde_yaml::from_str(text).map_err(|e| PrefabError::config(format!("invalid .meta file: {}", e)))?;
        Ok(meta.guid.trim().to_ascii_lowercase())
    }

    fn is_skipped(entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| SKIPPED_DIRS.contains(&name))
    }

    /// Index every `.meta` file under `root`
    ///
    /// Paths are stored relative to `root` (`Assets/Prefabs/Door.prefab`).
    /// Unreadable or malformed `.meta` files are logged and skipped.
    pub fn scan_meta_files<P: AsRef<Path>>(root: P) -> Result<MemoryGuidIndex> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(PrefabError::config(format!("not a directory: {}", root.display())));
        }

        let mut index = MemoryGuidIndex::new();
        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| !is_skipped(entry));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "meta") {
                continue;
            }

            let guid = match fs::read_to_string(path).map_err(PrefabError::from).and_then(|text| parse_meta(&text)) {
                Ok(guid) => guid,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping .meta file");
                    continue;
                }
            };
            let asset = path.with_extension("");
            let relative = asset.strip_prefix(root).unwrap_or(&asset);
            debug!(guid = %guid, asset = %relative.display(), "indexed asset");
            index.insert(&guid, relative);
        }

        info!(root = %root.display(), assets = index.len(), "scanned project");
        Ok(index)
    }

    /// A Unity project: its root, a full GUID index, and file access
    #[derive(Debug, Clone)]
    pub struct Project {
        root: PathBuf,
        index: MemoryGuidIndex,
        source: FsDocumentSource,
    }

    impl Project {
        /// Find the project containing `path` and index it
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
            let path = path.as_ref();
            let root = find_project_root(path)
                .ok_or_else(|| PrefabError::config(format!("no Unity project contains {}", path.display())))?;
            let index = scan_meta_files(&root)?;
            Ok(Self {
                source: FsDocumentSource::with_root(&root),
                root,
                index,
            })
        }

        pub fn root(&self) -> &Path {
            &self.root
        }

        pub fn index(&self) -> &MemoryGuidIndex {
            &self.index
        }

        pub fn source(&self) -> &FsDocumentSource {
            &self.source
        }

        /// Load a document by project-relative or absolute path, tagged with its GUID
        pub fn load_document<P: AsRef<Path>>(&self, path: P) -> Result<Document> {
            let path = path.as_ref();
            let full = if path.is_relative() { self.root.join(path) } else { path.to_path_buf() };
            let document = parse_document(&fs::read_to_string(&full)?)?.with_path(&full);
            match read_meta_guid(&full) {
                Ok(guid) => Ok(document.with_guid(guid)),
                Err(err) => {
                    debug!(path = %full.display(), error = %err, "document has no readable .meta");
                    Ok(document)
                }
            }
        }
    }

}
