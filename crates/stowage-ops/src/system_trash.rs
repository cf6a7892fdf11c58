//! The platform trash (freedesktop trash, Windows recycle bin).
//!
//! Listing and restoring are only available where the `trash` crate
//! supports them; elsewhere items can still be sent to the trash but the
//! trash reports itself as empty and restores fail.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use tracing::debug;

use crate::fsutil;
use crate::trash::{TrashEntry, TrashError, TrashStore, TrashUsage};

/// Trash backed by the operating system.
#[derive(Debug, Clone)]
pub struct SystemTrash {
    roots: Vec<PathBuf>,
}

impl Default for SystemTrash {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemTrash {
    /// Create a handle to the platform trash.
    pub fn new() -> Self {
        let mut roots = Vec::new();
        if cfg!(all(unix, not(target_os = "macos"))) {
            if let Some(data) = dirs::data_local_dir() {
                roots.push(data.join("Trash"));
            }
        }
        if cfg!(target_os = "macos") {
            if let Some(home) = dirs::home_dir() {
                roots.push(home.join(".Trash"));
            }
        }
        Self { roots }
    }

    /// Treat additional folders as trash locations (e.g. per-volume trash).
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }
}

fn backend(error: trash::Error) -> TrashError {
    TrashError::Backend {
        message: error.to_string(),
    }
}

async fn blocking<T, F>(f: F) -> Result<T, TrashError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TrashError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TrashError::Backend {
            message: format!("Task failed: {}", e),
        })?
}

#[cfg(any(
    target_os = "windows",
    all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android"))
))]
mod listing {
    use std::path::{Path, PathBuf};

    use chrono::DateTime;
    use trash::TrashItem;
    use trash::os_limited::{list, restore_all};

    use super::backend;
    use crate::fsutil;
    use crate::trash::{TrashEntry, TrashError};

    fn entry(item: &TrashItem) -> TrashEntry {
        TrashEntry {
            trash_path: PathBuf::from(&item.id),
            original_path: item.original_path(),
            deleted_at: DateTime::from_timestamp(item.time_deleted, 0),
        }
    }

    /// Where the item's payload lives. On freedesktop the id is the
    /// `.trashinfo` file, and the payload sits in the sibling `files` dir.
    pub(super) fn payload_path(id: &Path) -> PathBuf {
        let info_dir = id.parent();
        let trash_dir = info_dir.and_then(Path::parent);
        match (trash_dir, id.file_stem()) {
            (Some(trash_dir), Some(stem)) if id.extension().is_some_and(|e| e == "trashinfo") => {
                trash_dir.join("files").join(stem)
            }
            _ => id.to_path_buf(),
        }
    }

    pub(super) fn enumerate() -> Result<Vec<TrashEntry>, TrashError> {
        Ok(list().map_err(backend)?.iter().map(entry).collect())
    }

    pub(super) fn bytes(entries: &[TrashEntry]) -> u64 {
        entries
            .iter()
            .map(|e| fsutil::path_size(&payload_path(&e.trash_path)))
            .sum()
    }

    /// Trash path of the most recent entry deleted from `original`.
    pub(super) fn latest_for(original: &Path) -> Result<Option<PathBuf>, TrashError> {
        Ok(list()
            .map_err(backend)?
            .into_iter()
            .filter(|item| item.original_path() == original)
            .max_by_key(|item| item.time_deleted)
            .map(|item| PathBuf::from(&item.id)))
    }

    pub(super) fn restore(trash_path: &Path, destination: &Path) -> Result<(), TrashError> {
        let item = list()
            .map_err(backend)?
            .into_iter()
            .find(|item| Path::new(&item.id) == trash_path)
            .ok_or_else(|| TrashError::NotInTrash(trash_path.to_path_buf()))?;

        if item.original_path() != destination {
            return Err(TrashError::Backend {
                message: format!(
                    "the system trash only restores to the original location ({})",
                    item.original_path().display()
                ),
            });
        }
        if fsutil::entry_exists(destination) {
            return Err(TrashError::io(
                destination,
                std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            ));
        }

        restore_all(vec![item]).map_err(backend)
    }
}

#[cfg(not(any(
    target_os = "windows",
    all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android"))
)))]
mod listing {
    use std::path::{Path, PathBuf};

    use crate::trash::{TrashEntry, TrashError};

    pub(super) fn enumerate() -> Result<Vec<TrashEntry>, TrashError> {
        Ok(Vec::new())
    }

    pub(super) fn bytes(_entries: &[TrashEntry]) -> u64 {
        0
    }

    pub(super) fn latest_for(_original: &Path) -> Result<Option<PathBuf>, TrashError> {
        Ok(None)
    }

    pub(super) fn restore(trash_path: &Path, _destination: &Path) -> Result<(), TrashError> {
        Err(TrashError::NotInTrash(trash_path.to_path_buf()))
    }
}

impl TrashStore for SystemTrash {
    fn has_trash(&self) -> bool {
        true
    }

    fn is_under_trash(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
            || path
                .components()
                .any(|c| c.as_os_str().eq_ignore_ascii_case("$Recycle.Bin"))
    }

    fn enumerate(&self) -> BoxFuture<'_, Result<Vec<TrashEntry>, TrashError>> {
        Box::pin(blocking(listing::enumerate))
    }

    fn usage(&self) -> BoxFuture<'_, Result<TrashUsage, TrashError>> {
        Box::pin(blocking(|| {
            let entries = listing::enumerate()?;
            Ok(TrashUsage {
                items: entries.len(),
                bytes: listing::bytes(&entries),
            })
        }))
    }

    fn send_to_trash<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<PathBuf, TrashError>> {
        let path = path.to_path_buf();
        Box::pin(blocking(move || {
            if !fsutil::entry_exists(&path) {
                return Err(TrashError::io(
                    &path,
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ));
            }
            trash::delete(&path).map_err(backend)?;

            // Where listing is unsupported the original path stands in.
            let trash_path = listing::latest_for(&path)?.unwrap_or_else(|| path.clone());
            debug!(from = %path.display(), to = %trash_path.display(), "Moved to system trash");
            Ok(trash_path)
        }))
    }

    fn restore<'a>(
        &'a self,
        trash_path: &'a Path,
        destination: &'a Path,
    ) -> BoxFuture<'a, Result<(), TrashError>> {
        let trash_path = trash_path.to_path_buf();
        let destination = destination.to_path_buf();
        Box::pin(blocking(move || listing::restore(&trash_path, &destination)))
    }
}
