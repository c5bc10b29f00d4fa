//! Error types for prefab parsing, resolution, and merging

use std::io;
use thiserror::Error;

/// Result type alias for prefab operations
pub type Result<T> = std::result::Result<T, PrefabError>;

/// Main error type shared by every crate in the workspace
#[derive(Error, Debug)]
pub enum PrefabError {
    /// IO errors when reading/writing files
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Malformed header or inconsistent structure, with 1-based line context
    #[error("Parse error at line {line}: {reason}")]
    Parse { line: usize, reason: String },

    /// A best-effort document was handed to an operation that needs a full graph
    #[error("Document is incomplete: {skipped} block(s) were skipped while parsing")]
    IncompleteDocument { skipped: usize },

    /// Object lookup by identifier failed where the caller required it
    #[error("Object &{file_id} not found")]
    ObjectNotFound { file_id: i64 },

    /// A conflict resolution targets a path that no longer exists
    #[error("Resolution target '{path}' no longer exists; recompute conflicts before applying")]
    StaleResolution { path: String },

    /// A property path could not be addressed inside a value
    #[error("Invalid property path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// Failure reported by a GUID lookup backend
    #[error("GUID lookup error: {message}")]
    GuidLookup { message: String },

    /// GUID lookup exceeded the caller's bound
    #[error("GUID lookup timed out after {timeout_ms}ms")]
    LookupTimeout { timeout_ms: u64 },

    /// Operation stopped by a cancellation signal
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration could not be read
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PrefabError {
    /// Create a parse error at a 1-based line
    pub fn parse<S: Into<String>>(line: usize, reason: S) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }

    /// Create an invalid path error
    pub fn invalid_path<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a stale resolution error
    pub fn stale<S: Into<String>>(path: S) -> Self {
        Self::StaleResolution { path: path.into() }
    }

    /// Create a GUID lookup error
    pub fn guid_lookup<S: Into<String>>(message: S) -> Self {
        Self::GuidLookup {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Line number for parse errors
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Parse { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PrefabError::parse(3, "bad header");
        assert!(matches!(err, PrefabError::Parse { line: 3, .. }));
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_error_display() {
        let err = PrefabError::stale("Player.Transform.m_LocalPosition.x");
        let msg = format!("{}", err);
        assert!(msg.contains("m_LocalPosition.x"));
        assert!(msg.contains("recompute"));
    }
}
