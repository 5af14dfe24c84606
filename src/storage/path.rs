//! Path normalization
//!
//! Turns caller-supplied names into paths rooted at the mount point.

use std::fmt;

/// Path separator used by both backends
pub const SEPARATOR: char = '/';

/// Longest path the card stacks accept without truncating
pub const MAX_PATH_LEN: usize = 128;

/// A path that starts with the separator, relative to the mount root.
///
/// Only produced by [`normalize`] and [`CanonicalPath::join`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalPath(String);

/// Canonicalize a file or directory name.
///
/// Names that already start with the separator are kept as-is, anything else
/// gets exactly one separator prefixed. `..`, `.` and doubled separators are
/// left alone. Never fails: the empty name is the root.
pub fn normalize(name: &str) -> CanonicalPath {
    if name.starts_with(SEPARATOR) {
        CanonicalPath(name.to_string())
    } else {
        let mut path = String::with_capacity(name.len() + 1);
        path.push(SEPARATOR);
        path.push_str(name);
        CanonicalPath(path)
    }
}

impl CanonicalPath {
    pub fn root() -> Self {
        CanonicalPath(SEPARATOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.relative().is_empty()
    }

    /// The path without its leading separators, as the FAT layer and host
    /// directories expect it.
    pub fn relative(&self) -> &str {
        self.0.trim_start_matches(SEPARATOR)
    }

    /// Append an entry name found inside this directory
    pub fn join(&self, name: &str) -> CanonicalPath {
        let mut path = self.0.trim_end_matches(SEPARATOR).to_string();
        path.push(SEPARATOR);
        path.push_str(name);
        CanonicalPath(path)
    }

    /// Split into the parent directory and the final component
    pub fn split_last(&self) -> (CanonicalPath, &str) {
        let relative = self.relative().trim_end_matches(SEPARATOR);
        match relative.rfind(SEPARATOR) {
            Some(idx) => (normalize(&relative[..idx]), &relative[idx + 1..]),
            None => (CanonicalPath::root(), relative),
        }
    }

    pub fn exceeds_backend_limit(&self) -> bool {
        self.0.len() >= MAX_PATH_LEN
    }

    /// Full path as seen under the mount point, for log output
    pub fn under(&self, mount_point: &str) -> String {
        format!("{}{}", mount_point.trim_end_matches(SEPARATOR), self.0)
    }
}

impl fmt::Display for CanonicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
