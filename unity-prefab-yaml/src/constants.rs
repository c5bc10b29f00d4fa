//! Constants for Unity YAML format
//!
//! This module contains Unity-specific constants used in parsing and serialization.

// Re-export from unity-prefab-core
pub use unity_prefab_core::constants::*;

/// Prefix of every object header line (`--- !u!1 &100`)
pub const DOCUMENT_START: &str = "---";

/// Tag prefix carrying the class id
pub const CLASS_TAG_PREFIX: &str = "!u!";

/// Anchor prefix carrying the file id
pub const ANCHOR_PREFIX: &str = "&";

/// Trailing header marker of placeholder objects
pub const STRIPPED_MARKER: &str = "stripped";

/// Indent size Unity writes
pub const INDENT_SIZE: usize = 2;
