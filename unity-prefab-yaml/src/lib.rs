//! Unity Prefab YAML
//!
//! Lossless parsing and serialization of Unity's YAML scene, prefab, and
//! asset format. Each object keeps the exact text it was parsed from, so a
//! document written back without edits is byte-identical to its source.
//!
//! # Examples
//!
//! ```rust
//! use unity_prefab_yaml::{parse_document, serialize_document};
//!
//! let text = "--- !u!1 &-3742660215815977075\nGameObject:\n  m_Name: Player\n";
//! let doc = parse_document(text)?;
//! assert_eq!(doc.get(-3742660215815977075).and_then(|o| o.name()), Some("Player"));
//! assert_eq!(serialize_document(&doc), text);
//! # Ok::<(), unity_prefab_core::PrefabError>(())
//! ```

// Re-export core types
pub use unity_prefab_core::{Document, Object, PrefabError, Result, Value, constants::*};

// Core modules
pub mod block;
pub mod constants;
pub mod header;
pub mod loader;
pub mod scalar;
pub mod serializer;

// Re-export main types
pub use header::ObjectHeader;
pub use loader::{ParseMode, UnityYamlLoader, load_document, load_from_reader, parse_document, parse_document_with};
pub use serializer::{UnityYamlSerializer, save_document, serialize_document};

#[cfg(feature = "async")]
pub use loader::load_document_async;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_functionality() {
        let loader = UnityYamlLoader::new();
        assert_eq!(loader.mode(), ParseMode::Strict);

        let doc = loader.load_from_str("").unwrap();
        assert!(doc.is_empty());
        assert_eq!(serialize_document(&doc), "");
    }
}
