//! Materialized comment paths.
//!
//! The server reports every comment with a dot-separated chain of ids from
//! the thread root to the comment itself, e.g. `"0.41.122"`. The leading `0`
//! is the root sentinel, not a comment id. Ordering must compare the integer
//! sequence element by element so that id 10 sorts after id 9, which plain
//! string comparison gets wrong.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommentPath {
    segments: Vec<i64>,
}

impl CommentPath {
    /// The root sentinel path, `"0"`.
    pub fn root() -> Self {
        Self { segments: vec![0] }
    }

    /// Extends the path by one child comment id.
    pub fn appending(&self, child_id: i64) -> Self {
        let mut segments = self.segments.clone();
        segments.push(child_id);
        Self { segments }
    }

    /// The path of this comment's parent, or `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Number of ancestors below the root sentinel. A top-level comment
    /// (`"0.41"`) has depth 1.
    pub fn depth(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// The comment id this path points at, or `None` for the root sentinel.
    pub fn leaf_id(&self) -> Option<i64> {
        if self.is_root() {
            return None;
        }
        self.segments.last().copied()
    }

    /// True when `self` is the immediate parent of `other`.
    pub fn is_parent_of(&self, other: &CommentPath) -> bool {
        other.parent().as_ref() == Some(self)
    }
}

impl FromStr for CommentPath {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for part in raw.split('.') {
            let id: i64 = part
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid comment path segment {part:?} in {raw:?}"))?;
            segments.push(id);
        }
        if segments.is_empty() {
            bail!("empty comment path");
        }
        if segments[0] != 0 {
            bail!("comment path {raw:?} does not start at the root sentinel");
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for CommentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> CommentPath {
        raw.parse().expect("valid path")
    }

    #[test]
    fn parse_and_display_round_trip() {
        for raw in ["0", "0.1", "0.41.122", "0.9.10.11"] {
            assert_eq!(path(raw).to_string(), raw);
        }
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!("".parse::<CommentPath>().is_err());
        assert!("1.2".parse::<CommentPath>().is_err());
        assert!("0.abc".parse::<CommentPath>().is_err());
        assert!("0..3".parse::<CommentPath>().is_err());
    }

    #[test]
    fn appending_and_parent_are_inverse() {
        let base = path("0.41");
        let child = base.appending(122);
        assert_eq!(child.to_string(), "0.41.122");
        assert_eq!(child.parent(), Some(base));
        assert_eq!(CommentPath::root().parent(), None);
    }

    #[test]
    fn ordering_is_numeric_not_lexicographic() {
        // "0.10" > "0.9" even though the strings compare the other way.
        assert!(path("0.10") > path("0.9"));
        assert!(path("0.9.1") > path("0.9"));
        assert!(path("0.2") < path("0.10"));
    }

    #[test]
    fn depth_and_leaf() {
        assert_eq!(CommentPath::root().depth(), 0);
        assert_eq!(path("0.41").depth(), 1);
        assert_eq!(path("0.41.122").depth(), 2);
        assert_eq!(path("0.41.122").leaf_id(), Some(122));
        assert_eq!(CommentPath::root().leaf_id(), None);
    }

    #[test]
    fn immediate_parent_check() {
        assert!(path("0.1").is_parent_of(&path("0.1.4")));
        assert!(!path("0.1").is_parent_of(&path("0.1.4.9")));
        assert!(!path("0.2").is_parent_of(&path("0.1.4")));
        assert!(CommentPath::root().is_parent_of(&path("0.7")));
    }
}
