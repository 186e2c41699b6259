//! Absolute prim paths inside a document.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// Absolute, `/`-separated path naming a prim inside a document.
///
/// The root is `/`; every other path is `/A/B/...` where each element is a
/// valid identifier (see [`crate::cache::sanitize_name`]).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrimPath(String);

/// True if `name` is a valid prim name: letters, digits and underscore with a
/// leading letter or underscore.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl PrimPath {
    /// The document root `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse and validate an absolute path.
    pub fn new(path: &str) -> Result<Self> {
        if path == "/" {
            return Ok(Self::root());
        }
        let Some(rest) = path.strip_prefix('/') else {
            return Err(Error::invalid(format!("prim path '{}' is not absolute", path)));
        };
        if rest.split('/').any(|elem| !is_valid_identifier(elem)) {
            return Err(Error::invalid(format!("prim path '{}' has an invalid element", path)));
        }
        Ok(Self(path.to_string()))
    }

    /// Append a child element. `name` must already be a valid identifier.
    pub fn child(&self, name: &str) -> Self {
        assert!(
            is_valid_identifier(name),
            "prim name '{}' is not a valid identifier",
            name
        );
        if self.is_root() {
            Self(format!("/{}", name))
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    /// Parent path, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Last path element; empty for the root.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `self` equals `prefix` or lies beneath it.
    pub fn has_prefix(&self, prefix: &PrimPath) -> bool {
        if prefix.is_root() || self == prefix {
            return true;
        }
        self.0.len() > prefix.0.len()
            && self.0.starts_with(prefix.as_str())
            && self.0.as_bytes()[prefix.0.len()] == b'/'
    }

    /// All proper ancestors, outermost first, excluding the root.
    pub fn ancestors(&self) -> Vec<PrimPath> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(p) = cur {
            if p.is_root() {
                break;
            }
            cur = p.parent();
            out.push(p);
        }
        out.reverse();
        out
    }

    /// Number of path elements (0 for the root).
    pub fn depth(&self) -> usize {
        if self.is_root() {
            0
        } else {
            self.0.matches('/').count()
        }
    }
}

impl TryFrom<String> for PrimPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        PrimPath::new(&value)
    }
}

impl From<PrimPath> for String {
    fn from(value: PrimPath) -> Self {
        value.0
    }
}

impl fmt::Display for PrimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for PrimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_and_parent() {
        let root = PrimPath::root();
        let actor = root.child("Root").child("Cube_3");
        assert_eq!(actor.as_str(), "/Root/Cube_3");
        assert_eq!(actor.name(), "Cube_3");
        assert_eq!(actor.parent().unwrap().as_str(), "/Root");
        assert_eq!(actor.parent().unwrap().parent().unwrap(), root);
        assert!(root.parent().is_none());
        assert_eq!(actor.depth(), 2);
    }

    #[test]
    fn test_prefix() {
        let a = PrimPath::new("/Root/A").unwrap();
        let ab = PrimPath::new("/Root/A/B").unwrap();
        let a_x = PrimPath::new("/Root/A_x").unwrap();
        assert!(ab.has_prefix(&a));
        assert!(a.has_prefix(&a));
        assert!(!a_x.has_prefix(&a));
        assert!(a.has_prefix(&PrimPath::root()));
    }

    #[test]
    fn test_rejects_bad_paths() {
        assert!(PrimPath::new("Root/A").is_err());
        assert!(PrimPath::new("/Root/9lives").is_err());
        assert!(PrimPath::new("/Root//A").is_err());
        assert!(PrimPath::new("/Root/A-B").is_err());
    }

    #[test]
    fn test_ancestors() {
        let p = PrimPath::new("/Root/A/B/C").unwrap();
        let names: Vec<_> = p.ancestors().iter().map(|a| a.as_str().to_string()).collect();
        assert_eq!(names, vec!["/Root", "/Root/A", "/Root/A/B"]);
    }
}
