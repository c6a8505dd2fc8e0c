//! VfsPath - absolute `/`-separated paths spanning disk and archive contents
//!
//! A path never says whether it points inside an archive. `/sdcard/a.zip/b/c.txt`
//! looks exactly like a disk path; archive membership is discovered by the
//! engine by walking ancestors. Everything here is pure string algebra.

use crate::{Result, VfsError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Path of `path` relative to `ancestor`, without a leading separator.
///
/// The ancestor must match on a segment boundary: `/a/b` is an ancestor of
/// `/a/b/c` but not of `/a/bc`. A path is its own ancestor (result is empty).
pub fn relative_to(path: &str, ancestor: &str) -> Result<String> {
    let path_segments = segments(path);
    let ancestor_segments = segments(ancestor);

    if ancestor_segments.len() > path_segments.len()
        || path_segments[..ancestor_segments.len()] != ancestor_segments[..]
    {
        return Err(VfsError::NotAnAncestor {
            path: path.to_string(),
            ancestor: ancestor.to_string(),
        });
    }

    Ok(path_segments[ancestor_segments.len()..].join("/"))
}

/// Concatenate `base` and `relative`, collapsing duplicate separators.
pub fn join(base: &str, relative: &str) -> String {
    let joined = format!("{}/{}", base, relative);
    let mut out = String::with_capacity(joined.len());
    let mut previous_slash = false;

    for c in joined.chars() {
        if c == '/' {
            if !previous_slash {
                out.push(c);
            }
            previous_slash = true;
        } else {
            out.push(c);
            previous_slash = false;
        }
    }

    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Resolve `.` and `..` segments and rebuild the canonical string form.
fn normalize(raw: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in segments(raw) {
        match segment {
            "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    format!("/{}", parts.join("/"))
}

/// An immutable absolute path.
///
/// Always starts with `/`, never ends with one (except the root itself) and has
/// no empty segments. Two paths are equal iff their strings are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VfsPath {
    raw: String,
}

impl VfsPath {
    /// Parse an absolute path
    pub fn new<S: AsRef<str>>(path: S) -> Result<Self> {
        let path = path.as_ref();
        if !path.starts_with('/') {
            return Err(VfsError::InvalidPath(path.to_string()));
        }
        Ok(Self { raw: normalize(path) })
    }

    /// Convert an OS path (must be absolute and valid UTF-8)
    pub fn from_os<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = path
            .to_str()
            .ok_or_else(|| VfsError::InvalidPath(path.to_string_lossy().into_owned()))?;
        Self::new(s)
    }

    pub fn root() -> Self {
        Self { raw: "/".to_string() }
    }

    pub fn is_root(&self) -> bool {
        self.raw == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The path as an OS path, for direct disk access
    pub fn to_path_buf(&self) -> PathBuf {
        PathBuf::from(&self.raw)
    }

    pub fn segments(&self) -> Vec<&str> {
        segments(&self.raw)
    }

    /// Last segment, or an empty string for the root
    pub fn name(&self) -> &str {
        self.raw.rsplit('/').next().unwrap_or("")
    }

    /// Extension of the last segment. Dotfiles such as `.profile` have none.
    pub fn extension(&self) -> Option<&str> {
        match self.name().rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Last segment without its extension
    pub fn stem(&self) -> &str {
        let name = self.name();
        match self.extension() {
            Some(ext) => &name[..name.len() - ext.len() - 1],
            None => name,
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.raw.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(i) => Some(Self { raw: self.raw[..i].to_string() }),
            None => None,
        }
    }

    /// Proper ancestors, closest first, ending with the root
    pub fn ancestors(&self) -> Vec<Self> {
        let mut result = Vec::new();
        let mut current = self.parent();
        while let Some(p) = current {
            current = p.parent();
            result.push(p);
        }
        result
    }

    /// Append a relative path (which may itself contain separators)
    pub fn join(&self, relative: &str) -> Self {
        Self { raw: normalize(&join(&self.raw, relative)) }
    }

    /// Sibling with a different last segment
    pub fn with_name(&self, name: &str) -> Option<Self> {
        self.parent().map(|p| p.join(name))
    }

    pub fn relative_to(&self, ancestor: &VfsPath) -> Result<String> {
        relative_to(&self.raw, &ancestor.raw)
    }

    /// True if `ancestor` is this path or one of its ancestors
    pub fn starts_with(&self, ancestor: &VfsPath) -> bool {
        self.relative_to(ancestor).is_ok()
    }

    /// Re-root this path from `from` onto `to`, if it lives under `from`
    pub fn rebase(&self, from: &VfsPath, to: &VfsPath) -> Option<Self> {
        let rest = self.relative_to(from).ok()?;
        Some(if rest.is_empty() { to.clone() } else { to.join(&rest) })
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl AsRef<str> for VfsPath {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl TryFrom<String> for VfsPath {
    type Error = VfsError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for VfsPath {
    type Error = VfsError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<VfsPath> for String {
    fn from(path: VfsPath) -> Self {
        path.raw
    }
}
