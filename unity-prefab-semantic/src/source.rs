//! Document sources for nested-prefab expansion

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use unity_prefab_core::Result;

/// Loads the text of a document the GUID index pointed at
pub trait DocumentSource: Send + Sync {
    fn load(&self, path: &Path) -> Result<String>;
}

/// Reads documents from disk, resolving relative paths against a project root
#[derive(Debug, Clone, Default)]
pub struct FsDocumentSource {
    root: Option<PathBuf>,
}

impl FsDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths (`Assets/Prefabs/Door.prefab`) against `root`
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn full_path(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl DocumentSource for FsDocumentSource {
    fn load(&self, path: &Path) -> Result<String> {
        let full = self.full_path(path);
        debug!(path = %full.display(), "loading nested document");
        Ok(fs::read_to_string(full)?)
    }
}
