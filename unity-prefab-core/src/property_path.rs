//! Unity property path addressing
//!
//! Paths use the same syntax Unity writes into prefab modifications:
//! `m_LocalPosition.x`, `m_Materials.Array.data[1]`, `m_Items.Array.data[0].m_Count`.

use crate::error::{PrefabError, Result};
use std::fmt;

/// One step of a property path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Mapping key
    Key(String),
    /// Sequence element
    Index(usize),
}

/// A parsed property path
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PropertyPath {
    segments: Vec<PathSegment>,
}

impl PropertyPath {
    /// The empty path, addressing a whole value
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted Unity property path
    pub fn parse(path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        if path.is_empty() {
            return Ok(Self { segments });
        }

        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            if part.is_empty() {
                return Err(PrefabError::invalid_path(path, "empty segment"));
            }
            if part == "Array" {
                if let Some(next) = parts.peek()
                    && let Some(index) = parse_data_index(next)
                {
                    let index = index.ok_or_else(|| {
                        PrefabError::invalid_path(path, format!("bad index in '{}'", next))
                    })?;
                    segments.push(PathSegment::Index(index));
                    parts.next();
                    continue;
                }
            }
            segments.push(PathSegment::Key(part.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Extend with a mapping key
    pub fn key<S: Into<String>>(&self, key: S) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Key(key.into()));
        next
    }

    /// Extend with a sequence index
    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.segments.push(PathSegment::Index(index));
        next
    }

    /// Split into parent path and last segment
    pub fn split_last(&self) -> Option<(PropertyPath, &PathSegment)> {
        let (last, rest) = self.segments.split_last()?;
        Some((
            PropertyPath {
                segments: rest.to_vec(),
            },
            last,
        ))
    }

    /// First mapping key of the path, if any
    pub fn first_key(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Key(key)) => Some(key),
            _ => None,
        }
    }
}

/// Parse `data[N]`; `Some(None)` means the shape matched but the number did not
fn parse_data_index(segment: &str) -> Option<Option<usize>> {
    let inner = segment.strip_prefix("data[")?.strip_suffix(']')?;
    Some(inner.parse().ok())
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match segment {
                PathSegment::Key(key) => write!(f, "{}", key)?,
                PathSegment::Index(index) => write!(f, "Array.data[{}]", index)?,
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for PropertyPath {
    type Err = PrefabError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple_path() {
        let path = PropertyPath::parse("m_LocalPosition.x").unwrap();
        assert_eq!(
            path.segments(),
            &[
                PathSegment::Key("m_LocalPosition".to_string()),
                PathSegment::Key("x".to_string())
            ]
        );
        assert_eq!(path.first_key(), Some("m_LocalPosition"));
    }

    #[test]
    fn test_parse_array_path() {
        let path = PropertyPath::parse("m_Materials.Array.data[2].m_Color").unwrap();
        assert_eq!(path.segments()[1], PathSegment::Index(2));
        assert_eq!(path.to_string(), "m_Materials.Array.data[2].m_Color");
    }

    #[test]
    fn test_array_size_stays_a_key() {
        let path = PropertyPath::parse("m_Materials.Array.size").unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.segments()[1], PathSegment::Key("Array".to_string()));
    }

    #[test]
    fn test_invalid_paths() {
        assert!(PropertyPath::parse("a..b").is_err());
        assert!(PropertyPath::parse("a.Array.data[x]").is_err());
        assert!(PropertyPath::parse("").unwrap().is_root());
    }
}
