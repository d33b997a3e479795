use super::ModelError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Pattern for a valid node name
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.:\-]*$").expect("valid name pattern"));

/// Check whether a string is a valid node name
pub fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// One step in a node path: a name plus a 1-based same-name-sibling index.
///
/// Siblings sharing a name are distinguished by contiguous indices that
/// reflect live position. Index 1 is the common case and is omitted from
/// the textual form, so `a` and `a[1]` denote the same segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathSegment {
    name: String,
    index: u32,
}

impl PathSegment {
    pub fn new(name: &str, index: u32) -> Result<Self, ModelError> {
        if !is_valid_name(name) {
            return Err(ModelError::InvalidName(name.to_string()));
        }
        if index == 0 {
            return Err(ModelError::InvalidPath(format!(
                "{name}[0]: sibling indices are 1-based"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            index,
        })
    }

    /// Segment with the default index of 1
    pub fn named(name: &str) -> Result<Self, ModelError> {
        Self::new(name, 1)
    }

    // For segments rebuilt from already-validated node fields
    pub(crate) fn unchecked(name: &str, index: u32) -> Self {
        Self {
            name: name.to_string(),
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.index == 1 {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}[{}]", self.name, self.index)
        }
    }
}

impl FromStr for PathSegment {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(open) = s.find('[') {
            let close = s
                .strip_suffix(']')
                .ok_or_else(|| ModelError::InvalidPath(s.to_string()))?;
            let name = &s[..open];
            let index: u32 = close[open + 1..]
                .parse()
                .map_err(|_| ModelError::InvalidPath(s.to_string()))?;
            Self::new(name, index)
        } else {
            Self::named(s)
        }
    }
}

impl Serialize for PathSegment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PathSegment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Absolute path addressing a node in a tree.
///
/// The root path is the empty segment sequence and prints as `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodePath {
    segments: Vec<PathSegment>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    pub fn parent(&self) -> Option<NodePath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(NodePath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn join(&self, segment: &PathSegment) -> NodePath {
        let mut segments = self.segments.clone();
        segments.push(segment.clone());
        NodePath { segments }
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// True when `self` is `other` or a descendant of it
    pub fn starts_with(&self, other: &NodePath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// Resolve a relative path against this one. `.` is a no-op segment,
    /// `..` steps to the parent; stepping above the root is an error.
    pub fn resolve(&self, relative: &str) -> Result<NodePath, ModelError> {
        let mut segments = self.segments.clone();
        for part in relative.split('/').filter(|p| !p.is_empty()) {
            match part {
                "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(ModelError::InvalidPath(format!(
                            "{relative}: escapes the root"
                        )));
                    }
                }
                _ => segments.push(part.parse()?),
            }
        }
        Ok(NodePath { segments })
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| ModelError::InvalidPath(format!("{s}: not absolute")))?;
        let mut segments = Vec::new();
        for part in rest.split('/').filter(|p| !p.is_empty()) {
            segments.push(part.parse()?);
        }
        Ok(NodePath { segments })
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_roundtrip() {
        let seg: PathSegment = "item[3]".parse().unwrap();
        assert_eq!(seg.name(), "item");
        assert_eq!(seg.index(), 3);
        assert_eq!(seg.to_string(), "item[3]");

        let seg: PathSegment = "item".parse().unwrap();
        assert_eq!(seg.index(), 1);
        assert_eq!(seg.to_string(), "item");
    }

    #[test]
    fn test_segment_rejects_zero_index() {
        assert!("item[0]".parse::<PathSegment>().is_err());
    }

    #[test]
    fn test_path_parse_and_display() {
        let path: NodePath = "/site/pages/page[2]".parse().unwrap();
        assert_eq!(path.depth(), 3);
        assert_eq!(path.to_string(), "/site/pages/page[2]");
        assert_eq!(path.parent().unwrap().to_string(), "/site/pages");

        let root: NodePath = "/".parse().unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "/");
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_path_requires_absolute() {
        assert!("site/pages".parse::<NodePath>().is_err());
    }

    #[test]
    fn test_resolve_relative() {
        let base: NodePath = "/site/pages".parse().unwrap();
        assert_eq!(
            base.resolve("header/logo").unwrap().to_string(),
            "/site/pages/header/logo"
        );
        assert_eq!(base.resolve("../assets").unwrap().to_string(), "/site/assets");
        assert_eq!(base.resolve("./.").unwrap(), base);
        assert!(base.resolve("../../../nope").is_err());
    }

    #[test]
    fn test_starts_with() {
        let path: NodePath = "/site/pages/home".parse().unwrap();
        let prefix: NodePath = "/site/pages".parse().unwrap();
        assert!(path.starts_with(&prefix));
        assert!(!prefix.starts_with(&path));
        assert!(path.starts_with(&NodePath::root()));
    }

    #[test]
    fn test_invalid_name() {
        assert!("/site/bad name".parse::<NodePath>().is_err());
        assert!(is_valid_name("ok-name_1.x:y"));
        assert!(!is_valid_name(""));
    }
}
