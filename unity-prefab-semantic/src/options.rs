//! Diff, merge, and hierarchy configuration
//!
//! Plain structs with `Default` and `with_*` builders. Diff and merge
//! options can also be read from YAML.

use serde::{Deserialize, Serialize};
use unity_prefab_core::{PrefabError, Result};

/// Reference-list properties whose order the editor does not treat as meaningful
pub const DEFAULT_UNORDERED_KEYS: &[&str] = &["m_Children", "m_Materials", "m_Roots"];

/// How objects of two documents are paired up for comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectMatching {
    /// Same file id; for revisions of one file
    #[default]
    Identifier,
    /// Same class, hierarchy path, and ordinal; for unrelated files whose ids differ
    Structural,
}

/// How sequences are compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceOrder {
    /// Element by element
    Positional,
    /// Every sequence as a multiset
    Unordered,
    /// Multiset comparison only for sequences stored under these keys
    UnorderedFor(Vec<String>),
}

impl Default for SequenceOrder {
    fn default() -> Self {
        SequenceOrder::UnorderedFor(DEFAULT_UNORDERED_KEYS.iter().map(|k| k.to_string()).collect())
    }
}

impl SequenceOrder {
    /// Whether a sequence stored under `key` ignores element order
    pub fn ignores_order(&self, key: Option<&str>) -> bool {
        match self {
            SequenceOrder::Positional => false,
            SequenceOrder::Unordered => true,
            SequenceOrder::UnorderedFor(keys) => key.is_some_and(|key| keys.iter().any(|k| k == key)),
        }
    }
}

/// Diff configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffOptions {
    pub matching: ObjectMatching,
    pub sequence_order: SequenceOrder,
}

impl DiffOptions {
    pub fn with_matching(mut self, matching: ObjectMatching) -> Self {
        self.matching = matching;
        self
    }

    pub fn with_sequence_order(mut self, sequence_order: SequenceOrder) -> Self {
        self.sequence_order = sequence_order;
        self
    }

    /// Read options from YAML; missing fields keep their defaults
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| PrefabError::config(format!("invalid diff options: {}", e)))
    }
}

/// Merge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    /// Sequences compared as multisets count a pure reorder as unchanged
    pub sequence_order: SequenceOrder,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            sequence_order: SequenceOrder::Positional,
        }
    }
}

impl MergeOptions {
    pub fn with_sequence_order(mut self, sequence_order: SequenceOrder) -> Self {
        self.sequence_order = sequence_order;
        self
    }

    /// Read options from YAML; missing fields keep their defaults
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| PrefabError::config(format!("invalid merge options: {}", e)))
    }
}

/// Hierarchy builder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyOptions {
    /// Expand every nested prefab during `build` instead of on request
    pub expand_nested: bool,
    /// Resolve MonoBehaviour script names with one batch lookup per build
    pub resolve_script_names: bool,
}

impl Default for HierarchyOptions {
    fn default() -> Self {
        Self {
            expand_nested: false,
            resolve_script_names: true,
        }
    }
}

impl HierarchyOptions {
    pub fn with_expand_nested(mut self, expand_nested: bool) -> Self {
        self.expand_nested = expand_nested;
        self
    }

    pub fn with_script_names(mut self, resolve_script_names: bool) -> Self {
        self.resolve_script_names = resolve_script_names;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence_order() {
        let order = SequenceOrder::default();
        assert!(order.ignores_order(Some("m_Children")));
        assert!(order.ignores_order(Some("m_Materials")));
        assert!(!order.ignores_order(Some("m_Component")));
        assert!(!order.ignores_order(None));
        assert!(SequenceOrder::Unordered.ignores_order(None));
        assert!(!SequenceOrder::Positional.ignores_order(Some("m_Children")));
    }

    #[test]
    fn test_diff_options_from_yaml() {
        let options = DiffOptions::from_yaml_str("matching: structural\nsequence_order: positional\n").unwrap();
        assert_eq!(options.matching, ObjectMatching::Structural);
        assert_eq!(options.sequence_order, SequenceOrder::Positional);

        let defaults = DiffOptions::from_yaml_str("{}").unwrap();
        assert_eq!(defaults, DiffOptions::default());

        assert!(DiffOptions::from_yaml_str("matching: fuzzy").is_err());
    }

    #[test]
    fn test_merge_options_default_positional() {
        assert_eq!(MergeOptions::default().sequence_order, SequenceOrder::Positional);
        let options = MergeOptions::from_yaml_str("sequence_order: unordered").unwrap();
        assert_eq!(options.sequence_order, SequenceOrder::Unordered);
    }
}
