//! Unity Prefab Semantic
//!
//! Property-level understanding of Unity scene and prefab documents:
//! reference resolution through stripped placeholders, hierarchy
//! reconstruction with nested-prefab expansion, two-way diff and
//! three-way merge.
//!
//! # Examples
//!
//! ```rust
//! use unity_prefab_semantic::{merge, diff};
//! use unity_prefab_yaml::parse_document;
//!
//! let base = parse_document("--- !u!1 &1\nGameObject:\n  m_Name: Door\n  m_IsActive: 1\n")?;
//! let ours = parse_document("--- !u!1 &1\nGameObject:\n  m_Name: Gate\n  m_IsActive: 1\n")?;
//! let theirs = parse_document("--- !u!1 &1\nGameObject:\n  m_Name: Door\n  m_IsActive: 0\n")?;
//!
//! assert_eq!(diff(&base, &ours)?.len(), 1);
//!
//! let result = merge(&base, &ours, &theirs)?;
//! assert!(!result.has_conflicts());
//! assert_eq!(result.auto_merged.len(), 2);
//! # Ok::<(), unity_prefab_core::PrefabError>(())
//! ```

pub mod diff;
pub mod guid_index;
pub mod hierarchy;
pub mod merge;
pub mod naming;
pub mod options;
pub mod resolver;
pub mod source;

pub use diff::{ChangeKind, DiffSummary, PropertyChange, PropertyKey, diff, diff_with, diff_with_index};
pub use guid_index::{
    GuidIndex, GuidStore, LazyGuidIndex, LazyIndexConfig, MemoryGuidIndex, display_name, normalize_guid,
};
pub use hierarchy::{ComponentNode, ExpansionCache, ExpansionIssue, Hierarchy, HierarchyBuilder, HierarchyNode};
pub use merge::{
    AutoMerge, ConflictKind, MergeResult, MergeSide, ObjectVersions, PropertyConflict, Resolution, apply_resolution,
    merge, merge_with, merge_with_index,
};
pub use naming::{component_display_name, nicify_property_path, nicify_variable_name, property_display_name};
pub use options::{DiffOptions, HierarchyOptions, MergeOptions, ObjectMatching, SequenceOrder};
pub use resolver::{Resolver, raw_label};
pub use source::{DocumentSource, FsDocumentSource};

/// Cancellation signal accepted by `HierarchyBuilder::with_cancellation`
pub use tokio_util::sync::CancellationToken;
