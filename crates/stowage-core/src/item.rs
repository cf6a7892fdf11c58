//! Item references.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Kind of storage item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ItemKind {
    /// Regular file.
    File,
    /// Directory.
    Directory,
}

impl ItemKind {
    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, ItemKind::Directory)
    }

    /// Check if this is a regular file.
    pub fn is_file(&self) -> bool {
        matches!(self, ItemKind::File)
    }
}

/// A reference to a file or directory in a store.
///
/// Identity is the path: two references with equal paths are the same item,
/// whatever their kind or cached name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReference {
    /// Full path of the item. May be empty for virtual items.
    pub path: PathBuf,
    /// Kind of the item.
    pub kind: ItemKind,
    /// Display name, used when the path is empty.
    name: CompactString,
}

impl ItemReference {
    /// Create a reference from a path and kind.
    pub fn new(path: impl Into<PathBuf>, kind: ItemKind) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| CompactString::new(n.to_string_lossy()))
            .unwrap_or_default();
        Self { path, kind, name }
    }

    /// Create a file reference.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ItemKind::File)
    }

    /// Create a directory reference.
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ItemKind::Directory)
    }

    /// Create a pathless item that is only known by name (e.g. a virtual
    /// item from a drag source).
    pub fn virtual_item(name: impl Into<CompactString>, kind: ItemKind) -> Self {
        Self {
            path: PathBuf::new(),
            kind,
            name: name.into(),
        }
    }

    /// Build a reference by inspecting the filesystem for its kind.
    ///
    /// Missing paths are treated as files.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = if path.is_dir() {
            ItemKind::Directory
        } else {
            ItemKind::File
        };
        Self::new(path, kind)
    }

    /// The item name (final path component).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this item has a non-empty path.
    pub fn has_path(&self) -> bool {
        !self.path.as_os_str().is_empty()
    }

    /// Key identifying this item inside a batch: its path, or its name
    /// when pathless.
    pub fn key(&self) -> PathBuf {
        if self.has_path() {
            self.path.clone()
        } else {
            PathBuf::from(self.name.as_str())
        }
    }

    /// Same item at a different path, keeping the kind.
    pub fn with_path(&self, path: impl Into<PathBuf>) -> Self {
        Self::new(path, self.kind)
    }

    /// Extension of the item name, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(self.name.as_str())
            .extension()
            .and_then(|e| e.to_str())
    }
}

impl PartialEq for ItemReference {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ItemReference {}

impl Hash for ItemReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_path() {
        let a = ItemReference::file("/tmp/a");
        let b = ItemReference::directory("/tmp/a");
        assert_eq!(a, b);
    }

    #[test]
    fn test_virtual_item_key() {
        let item = ItemReference::virtual_item("remote.txt", ItemKind::File);
        assert!(!item.has_path());
        assert_eq!(item.key(), PathBuf::from("remote.txt"));
        assert_eq!(item.name(), "remote.txt");
    }

    #[test]
    fn test_extension() {
        assert_eq!(ItemReference::file("/x/report.pdf").extension(), Some("pdf"));
        assert_eq!(ItemReference::file("/x/Makefile").extension(), None);
    }
}
