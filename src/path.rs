//! Declaration paths - stable identity for every C++ declaration
//!
//! Format: `<segment>::<segment>::...`
//!
//! Examples:
//! - `chimera_test::nested_namespace::Dog`
//! - `chimera_test::Integer::add`
//! - `chimera_test::Vector<double, 1>` (template instantiation)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fully qualified path of a declaration.
///
/// Paths are the only way declarations refer to each other in the input:
/// base classes, alias targets and template arguments are all paths that
/// the model resolves by lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct DeclPath {
    segments: Vec<String>,
}

impl DeclPath {
    /// The empty path, naming the translation unit itself
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from already split segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a `::`-separated path. A leading `::` is accepted.
    ///
    /// Separators nested inside template brackets are not split, so
    /// `ns::Map<ns::A, ns::B>::Entry` has three segments.
    pub fn parse(path: &str) -> Result<Self> {
        let path = path.trim();
        let path = path.strip_prefix("::").unwrap_or(path);
        if path.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        let mut depth = 0usize;
        let mut current = String::new();
        let mut chars = path.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '<' => {
                    depth += 1;
                    current.push(c);
                }
                '>' => {
                    depth = depth
                        .checked_sub(1)
                        .ok_or_else(|| Error::InvalidPath(format!("unbalanced '>' in {}", path)))?;
                    current.push(c);
                }
                ':' if depth == 0 && chars.peek() == Some(&':') => {
                    chars.next();
                    if current.trim().is_empty() {
                        return Err(Error::InvalidPath(format!("empty segment in {}", path)));
                    }
                    segments.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            }
        }

        if depth != 0 {
            return Err(Error::InvalidPath(format!("unbalanced '<' in {}", path)));
        }
        if current.trim().is_empty() {
            return Err(Error::InvalidPath(format!("empty segment in {}", path)));
        }
        segments.push(current.trim().to_string());

        Ok(Self { segments })
    }

    /// Append a child segment
    pub fn join(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }

    /// The enclosing path, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment (the unqualified name)
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `self` equals `ancestor` or lies below it
    pub fn starts_with(&self, ancestor: &DeclPath) -> bool {
        self.segments.starts_with(&ancestor.segments)
    }

    /// The `::`-joined form used in rules and diagnostics
    pub fn to_path_string(&self) -> String {
        self.segments.join("::")
    }

    /// Fully qualified C++ spelling, e.g. `::ns::Dog`
    pub fn qualified(&self) -> String {
        format!("::{}", self.to_path_string())
    }

    /// Identifier-safe form used for generated helper names
    pub fn mangled(&self) -> String {
        let mut out = String::with_capacity(self.to_path_string().len());
        let mut last_was_sep = false;
        for c in self.to_path_string().chars() {
            if c.is_ascii_alphanumeric() {
                out.push(c);
                last_was_sep = false;
            } else if !last_was_sep {
                out.push('_');
                last_was_sep = true;
            }
        }
        out.trim_end_matches('_').to_string()
    }
}

impl fmt::Display for DeclPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_path_string())
    }
}

impl FromStr for DeclPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for DeclPath {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_path_string())
    }
}

impl<'de> Deserialize<'de> for DeclPath {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DeclPath::parse(&s).map_err(serde::de::Error::custom)
    }
}
