//! Trash store abstraction and the adapter the coordinator talks to.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use stowage_core::ItemStatus;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::warn;

/// One entry currently held in a trash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashEntry {
    /// Where the entry lives inside the trash.
    pub trash_path: PathBuf,
    /// Where it was deleted from.
    pub original_path: PathBuf,
    /// When it was deleted, if known.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TrashEntry {
    /// Original file name of the entry.
    pub fn original_name(&self) -> String {
        self.original_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Trash size summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashUsage {
    pub items: usize,
    pub bytes: u64,
}

/// Errors from a trash store.
#[derive(Debug, Error)]
pub enum TrashError {
    #[error("No trash is available on this system")]
    Unavailable,

    #[error("'{0}' is not in the trash")]
    NotInTrash(PathBuf),

    #[error("Trash I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Trash backend error: {message}")]
    Backend { message: String },
}

impl TrashError {
    /// Per-item status for this error.
    pub fn item_status(&self) -> ItemStatus {
        match self {
            Self::Unavailable => ItemStatus::Generic,
            Self::NotInTrash(_) => ItemStatus::NotFound,
            Self::Io { source, .. } => ItemStatus::from(source),
            Self::Backend { .. } => ItemStatus::Unknown,
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A place deleted items can be sent to and restored from.
pub trait TrashStore: Send + Sync {
    /// Whether the trash can hold items.
    fn has_trash(&self) -> bool;

    /// Whether `path` lies inside the trash.
    fn is_under_trash(&self, path: &Path) -> bool;

    /// List everything in the trash.
    fn enumerate(&self) -> BoxFuture<'_, Result<Vec<TrashEntry>, TrashError>>;

    /// Count and size of the trash contents.
    fn usage(&self) -> BoxFuture<'_, Result<TrashUsage, TrashError>>;

    /// Move an item into the trash. Returns its path inside the trash.
    fn send_to_trash<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<PathBuf, TrashError>>;

    /// Move a trashed item to `destination`.
    fn restore<'a>(
        &'a self,
        trash_path: &'a Path,
        destination: &'a Path,
    ) -> BoxFuture<'a, Result<(), TrashError>>;
}

/// Answers trash questions for the coordinator.
#[derive(Clone)]
pub struct TrashAdapter {
    store: Arc<dyn TrashStore>,
}

impl TrashAdapter {
    /// Wrap a trash store.
    pub fn new(store: Arc<dyn TrashStore>) -> Self {
        Self { store }
    }

    /// Whether `path` lies inside the trash.
    pub fn is_under_trash(&self, path: &Path) -> bool {
        self.store.is_under_trash(path)
    }

    /// Whether items can be sent to the trash at all.
    pub fn has_trash(&self) -> bool {
        self.store.has_trash()
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn TrashStore> {
        &self.store
    }

    /// A lazily enumerated view of the trash for one operation.
    pub fn snapshot(&self) -> TrashSnapshot {
        TrashSnapshot {
            store: Arc::clone(&self.store),
            entries: OnceCell::new(),
        }
    }
}

/// Trash contents, enumerated at most once and only when first needed.
pub struct TrashSnapshot {
    store: Arc<dyn TrashStore>,
    entries: OnceCell<Vec<TrashEntry>>,
}

impl TrashSnapshot {
    /// All entries. A failed enumeration is logged and treated as empty.
    pub async fn entries(&self) -> &[TrashEntry] {
        self.entries
            .get_or_init(|| async {
                self.store.enumerate().await.unwrap_or_else(|e| {
                    warn!("Failed to enumerate trash: {}", e);
                    Vec::new()
                })
            })
            .await
    }

    /// Original path of a trashed item, if the trash knows it.
    pub async fn original_path(&self, trash_path: &Path) -> Option<PathBuf> {
        self.entries()
            .await
            .iter()
            .find(|entry| entry.trash_path == trash_path)
            .map(|entry| entry.original_path.clone())
    }

    /// Original file name of a trashed item, if the trash knows it.
    pub async fn resolve_original_name(&self, trash_path: &Path) -> Option<String> {
        self.entries()
            .await
            .iter()
            .find(|entry| entry.trash_path == trash_path)
            .map(TrashEntry::original_name)
    }

    /// Name to show the user for `path`: the original name for trashed
    /// items, else the path's own file name.
    pub async fn display_name(&self, path: &Path) -> String {
        if let Some(name) = self.resolve_original_name(path).await {
            return name;
        }
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
