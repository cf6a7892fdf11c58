//! A trash kept in an ordinary folder.
//!
//! Layout:
//!
//! ```text
//! <root>/files/<name>        trashed item
//! <root>/info/<name>.json    where it came from and when
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::conflict::unique_path;
use crate::fsutil;
use crate::trash::{TrashEntry, TrashError, TrashStore, TrashUsage};

const FILES_DIR: &str = "files";
const INFO_DIR: &str = "info";
const INFO_EXTENSION: &str = "json";

/// Metadata stored next to each trashed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TrashInfo {
    original_path: PathBuf,
    deleted_at: DateTime<Utc>,
}

/// Trash rooted at a directory of the caller's choosing.
#[derive(Debug, Clone)]
pub struct FolderTrash {
    root: PathBuf,
}

impl FolderTrash {
    /// Use `root` as the trash folder. It is created on first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The trash folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn files_dir(&self) -> PathBuf {
        self.root.join(FILES_DIR)
    }

    fn info_dir(&self) -> PathBuf {
        self.root.join(INFO_DIR)
    }

    fn info_path(&self, trash_path: &Path) -> Option<PathBuf> {
        let name = trash_path.file_name()?;
        let mut info = name.to_os_string();
        info.push(".");
        info.push(INFO_EXTENSION);
        Some(self.info_dir().join(info))
    }

    fn ensure_layout(&self) -> Result<(), TrashError> {
        for dir in [self.files_dir(), self.info_dir()] {
            fs::create_dir_all(&dir).map_err(|e| TrashError::io(&dir, e))?;
        }
        Ok(())
    }

    fn trash_blocking(&self, path: &Path) -> Result<PathBuf, TrashError> {
        if !fsutil::entry_exists(path) {
            return Err(TrashError::io(
                path,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        self.ensure_layout()?;

        let name = path.file_name().ok_or_else(|| TrashError::Backend {
            message: format!("'{}' has no file name", path.display()),
        })?;
        let files = self.files_dir();
        let target = unique_path(&files.join(name), |candidate| {
            fsutil::entry_exists(candidate)
                || self
                    .info_path(candidate)
                    .is_some_and(|info| fsutil::entry_exists(&info))
        });

        let info = TrashInfo {
            original_path: path.to_path_buf(),
            deleted_at: Utc::now(),
        };
        let info_path = self.info_path(&target).ok_or_else(|| TrashError::Backend {
            message: format!("'{}' has no file name", target.display()),
        })?;
        let json = serde_json::to_vec_pretty(&info).map_err(|e| TrashError::Backend {
            message: e.to_string(),
        })?;
        fs::write(&info_path, json).map_err(|e| TrashError::io(&info_path, e))?;

        if let Err(e) = fsutil::move_path(path, &target) {
            let _ = fs::remove_file(&info_path);
            return Err(TrashError::io(path, e));
        }

        debug!(from = %path.display(), to = %target.display(), "Moved to trash");
        Ok(target)
    }

    fn restore_blocking(&self, trash_path: &Path, destination: &Path) -> Result<(), TrashError> {
        if !self.is_under_trash(trash_path) || !fsutil::entry_exists(trash_path) {
            return Err(TrashError::NotInTrash(trash_path.to_path_buf()));
        }
        if fsutil::entry_exists(destination) {
            return Err(TrashError::io(
                destination,
                std::io::Error::from(std::io::ErrorKind::AlreadyExists),
            ));
        }
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|e| TrashError::io(parent, e))?;
        }

        fsutil::move_path(trash_path, destination).map_err(|e| TrashError::io(trash_path, e))?;

        if let Some(info_path) = self.info_path(trash_path) {
            if let Err(e) = fs::remove_file(&info_path) {
                warn!("Failed to remove trash info {}: {}", info_path.display(), e);
            }
        }
        Ok(())
    }

    fn enumerate_blocking(&self) -> Result<Vec<TrashEntry>, TrashError> {
        let files = self.files_dir();
        let read = match fs::read_dir(&files) {
            Ok(read) => read,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TrashError::io(&files, e)),
        };

        let mut entries = Vec::new();
        for entry in read {
            let trash_path = entry.map_err(|e| TrashError::io(&files, e))?.path();
            let info = self
                .info_path(&trash_path)
                .and_then(|info_path| fs::read(info_path).ok())
                .and_then(|bytes| serde_json::from_slice::<TrashInfo>(&bytes).ok());

            // Items without readable metadata are listed under their trash name.
            let (original_path, deleted_at) = match info {
                Some(info) => (info.original_path, Some(info.deleted_at)),
                None => (trash_path.clone(), None),
            };
            entries.push(TrashEntry {
                trash_path,
                original_path,
                deleted_at,
            });
        }

        entries.sort_by(|a, b| a.trash_path.cmp(&b.trash_path));
        Ok(entries)
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

impl TrashStore for FolderTrash {
    fn has_trash(&self) -> bool {
        true
    }

    fn is_under_trash(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
    }

    fn enumerate(&self) -> BoxFuture<'_, Result<Vec<TrashEntry>, TrashError>> {
        let this = self.clone();
        Box::pin(blocking(move || this.enumerate_blocking()))
    }

    fn usage(&self) -> BoxFuture<'_, Result<TrashUsage, TrashError>> {
        let this = self.clone();
        Box::pin(blocking(move || {
            let entries = this.enumerate_blocking()?;
            Ok(TrashUsage {
                items: entries.len(),
                bytes: entries.iter().map(|e| fsutil::path_size(&e.trash_path)).sum(),
            })
        }))
    }

    fn send_to_trash<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<PathBuf, TrashError>> {
        let this = self.clone();
        let path = path.to_path_buf();
        Box::pin(blocking(move || this.trash_blocking(&path)))
    }

    fn restore<'a>(
        &'a self,
        trash_path: &'a Path,
        destination: &'a Path,
    ) -> BoxFuture<'a, Result<(), TrashError>> {
        let this = self.clone();
        let trash_path = trash_path.to_path_buf();
        let destination = destination.to_path_buf();
        Box::pin(blocking(move || {
            this.restore_blocking(&trash_path, &destination)
        }))
    }
}
