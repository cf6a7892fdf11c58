//! Storage executor for the local filesystem.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use stowage_core::{CollisionDecision, ItemReference, ItemStatus, NameCollisionPolicy};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::OPERATION_CHANNEL_SIZE;
use crate::conflict::unique_path;
use crate::executor::{Batch, BatchItem, BatchKind, ItemOutcome, StorageExecutor, StorageFailure};
use crate::fsutil;
use crate::trash::TrashStore;

/// Executes batches against local disks with `std::fs` on the blocking pool.
#[derive(Clone)]
pub struct LocalExecutor {
    trash: Arc<dyn TrashStore>,
    channel_size: usize,
}

impl LocalExecutor {
    /// Create an executor that soft-deletes into `trash`.
    pub fn new(trash: Arc<dyn TrashStore>) -> Self {
        Self {
            trash,
            channel_size: OPERATION_CHANNEL_SIZE,
        }
    }

    /// Override the outcome channel buffer size.
    pub fn with_channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size.max(1);
        self
    }

    async fn run_item(&self, kind: BatchKind, index: usize, item: BatchItem) -> ItemOutcome {
        let source = item.source.clone();
        let result = match kind {
            BatchKind::Copy | BatchKind::Move | BatchKind::CreateLink => {
                blocking(move || transfer(kind, &item)).await.and_then(|r| r)
            }
            BatchKind::Delete { permanently } => self.delete(&item, permanently).await,
            BatchKind::Restore => self.restore(item).await,
        };

        match result {
            Ok(Placed::Done { destination, bytes }) => {
                ItemOutcome::done(index, source, destination, bytes)
            }
            Ok(Placed::Skipped) => ItemOutcome::skipped(index, source),
            Err(failure) => {
                warn!(path = %source.key().display(), "{}", failure);
                ItemOutcome::failed(index, source, failure)
            }
        }
    }

    async fn delete(&self, item: &BatchItem, permanently: bool) -> Result<Placed, StorageFailure> {
        let path = addressable(&item.source)?.to_path_buf();

        if permanently {
            let bytes = blocking({
                let path = path.clone();
                move || {
                    let bytes = fsutil::path_size(&path);
                    fsutil::remove_path(&path)
                        .map(|()| bytes)
                        .map_err(|e| StorageFailure::io("Delete failed", &e))
                }
            })
            .await??;
            return Ok(Placed::Done {
                destination: None,
                bytes,
            });
        }

        let trash_path = self
            .trash
            .send_to_trash(&path)
            .await
            .map_err(|e| StorageFailure::new(e.item_status(), e.to_string()))?;
        Ok(Placed::Done {
            destination: Some(trash_path),
            bytes: 0,
        })
    }

    async fn restore(&self, item: BatchItem) -> Result<Placed, StorageFailure> {
        let trash_path = addressable(&item.source)?.to_path_buf();
        let destination = item.destination.clone().ok_or_else(missing_destination)?;

        let target = blocking(move || {
            place(&trash_path, &destination, item.decision, false)
        })
        .await??;
        let Some(target) = target else {
            return Ok(Placed::Skipped);
        };

        self.trash
            .restore(&item.source.path, &target)
            .await
            .map_err(|e| StorageFailure::new(e.item_status(), e.to_string()))?;
        Ok(Placed::Done {
            destination: Some(target),
            bytes: 0,
        })
    }
}

/// What happened to one item.
enum Placed {
    Done {
        destination: Option<PathBuf>,
        bytes: u64,
    },
    Skipped,
}

async fn blocking<T, F>(f: F) -> Result<T, StorageFailure>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageFailure::new(ItemStatus::Unknown, format!("Task failed: {}", e)))
}

fn addressable(item: &ItemReference) -> Result<&Path, StorageFailure> {
    if item.has_path() {
        Ok(&item.path)
    } else {
        Err(StorageFailure::new(
            ItemStatus::NotFound,
            format!("'{}' has no location on disk", item.name()),
        ))
    }
}

fn missing_destination() -> StorageFailure {
    StorageFailure::new(ItemStatus::Generic, "No destination given")
}

/// Decide where an item lands, applying its collision decision.
///
/// Returns `None` when the item is to be skipped. `duplicate_in_place`
/// controls whether source == destination produces a fresh name (copies)
/// or a skip (moves).
fn place(
    source: &Path,
    destination: &Path,
    decision: CollisionDecision,
    duplicate_in_place: bool,
) -> Result<Option<PathBuf>, StorageFailure> {
    if decision == CollisionDecision::Skip {
        return Ok(None);
    }

    if source == destination {
        return Ok(duplicate_in_place.then(|| unique_path(destination, fsutil::entry_exists)));
    }

    if !fsutil::entry_exists(destination) {
        return Ok(Some(destination.to_path_buf()));
    }

    match decision {
        CollisionDecision::Skip => Ok(None),
        CollisionDecision::GenerateNewName => {
            Ok(Some(unique_path(destination, fsutil::entry_exists)))
        }
        CollisionDecision::ReplaceExisting => {
            fsutil::remove_path(destination)
                .map_err(|e| StorageFailure::io("Failed to replace existing item", &e))?;
            Ok(Some(destination.to_path_buf()))
        }
        CollisionDecision::None => Err(StorageFailure::new(
            ItemStatus::AlreadyExists,
            format!("'{}' already exists", destination.display()),
        )),
    }
}

/// Copy, move or link one item. Runs on the blocking pool.
fn transfer(kind: BatchKind, item: &BatchItem) -> Result<Placed, StorageFailure> {
    let source = addressable(&item.source)?;
    let destination = item.destination.as_deref().ok_or_else(missing_destination)?;

    if !fsutil::entry_exists(source) {
        return Err(StorageFailure::new(
            ItemStatus::NotFound,
            format!("'{}' does not exist", source.display()),
        ));
    }

    let in_place = !matches!(kind, BatchKind::Move);
    let Some(target) = place(source, destination, item.decision, in_place)? else {
        return Ok(Placed::Skipped);
    };

    if kind != BatchKind::CreateLink && source.is_dir() && target.starts_with(source) {
        return Err(StorageFailure::new(
            ItemStatus::Generic,
            format!("Cannot put '{}' inside itself", source.display()),
        ));
    }

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(StorageFailure::new(
                ItemStatus::NotFound,
                format!("Destination folder '{}' does not exist", parent.display()),
            ));
        }
    }

    let bytes = match kind {
        BatchKind::Copy => {
            fsutil::copy_path(source, &target).map_err(|e| StorageFailure::io("Copy failed", &e))?
        }
        BatchKind::Move => {
            fsutil::move_path(source, &target).map_err(|e| StorageFailure::io("Move failed", &e))?
        }
        _ => {
            fsutil::create_link(source, &target)
                .map_err(|e| StorageFailure::io("Failed to create link", &e))?;
            0
        }
    };

    debug!(from = %source.display(), to = %target.display(), ?kind, "Item done");
    Ok(Placed::Done {
        destination: Some(target),
        bytes,
    })
}

fn create_blocking(
    path: &Path,
    is_dir: bool,
    contents: Option<Vec<u8>>,
    policy: NameCollisionPolicy,
) -> Result<PathBuf, StorageFailure> {
    let target = if fsutil::entry_exists(path) {
        match policy {
            NameCollisionPolicy::GenerateUniqueName => unique_path(path, fsutil::entry_exists),
            NameCollisionPolicy::ReplaceExisting => {
                fsutil::remove_path(path)
                    .map_err(|e| StorageFailure::io("Failed to replace existing item", &e))?;
                path.to_path_buf()
            }
            NameCollisionPolicy::FailIfExists => {
                return Err(StorageFailure::new(
                    ItemStatus::AlreadyExists,
                    format!("'{}' already exists", path.display()),
                ));
            }
        }
    } else {
        path.to_path_buf()
    };

    let result = if is_dir {
        fs::create_dir(&target)
    } else {
        fs::write(&target, contents.unwrap_or_default())
    };
    result.map_err(|e| StorageFailure::io("Create failed", &e))?;
    Ok(target)
}

fn rename_blocking(
    source: &Path,
    new_name: &str,
    policy: NameCollisionPolicy,
) -> Result<PathBuf, StorageFailure> {
    let parent = source.parent().unwrap_or(Path::new(""));
    let target = parent.join(new_name);
    if target == source {
        return Ok(target);
    }

    // A case-only change finds the source itself on case-insensitive disks.
    let case_only = source
        .file_name()
        .is_some_and(|old| old.eq_ignore_ascii_case(new_name));

    let target = if !case_only && fsutil::entry_exists(&target) {
        match policy {
            NameCollisionPolicy::GenerateUniqueName => unique_path(&target, fsutil::entry_exists),
            NameCollisionPolicy::ReplaceExisting => {
                fsutil::remove_path(&target)
                    .map_err(|e| StorageFailure::io("Failed to replace existing item", &e))?;
                target
            }
            NameCollisionPolicy::FailIfExists => {
                return Err(StorageFailure::new(
                    ItemStatus::AlreadyExists,
                    format!("'{}' already exists", new_name),
                ));
            }
        }
    } else {
        target
    };

    fs::rename(source, &target).map_err(|e| StorageFailure::io("Rename failed", &e))?;
    Ok(target)
}

impl StorageExecutor for LocalExecutor {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        let path = path.to_path_buf();
        Box::pin(async move {
            blocking(move || fsutil::entry_exists(&path))
                .await
                .unwrap_or(false)
        })
    }

    fn execute(&self, batch: Batch, cancel: CancellationToken) -> mpsc::Receiver<ItemOutcome> {
        let (tx, rx) = mpsc::channel(self.channel_size);
        let this = self.clone();

        tokio::spawn(async move {
            let kind = batch.kind;
            for (index, item) in batch.items.into_iter().enumerate() {
                if cancel.is_cancelled() {
                    debug!(?kind, remaining_from = index, "Batch cancelled");
                    break;
                }

                let outcome = this.run_item(kind, index, item).await;
                if tx.send(outcome).await.is_err() {
                    // Receiver dropped; nobody is listening anymore.
                    break;
                }
            }
        });

        rx
    }

    fn create<'a>(
        &'a self,
        item: &'a ItemReference,
        contents: Option<Vec<u8>>,
        policy: NameCollisionPolicy,
    ) -> BoxFuture<'a, Result<PathBuf, StorageFailure>> {
        Box::pin(async move {
            let path = addressable(item)?.to_path_buf();
            let is_dir = item.kind.is_dir();
            blocking(move || create_blocking(&path, is_dir, contents, policy)).await?
        })
    }

    fn rename<'a>(
        &'a self,
        item: &'a ItemReference,
        new_name: &'a str,
        policy: NameCollisionPolicy,
    ) -> BoxFuture<'a, Result<PathBuf, StorageFailure>> {
        Box::pin(async move {
            let source = addressable(item)?.to_path_buf();
            let new_name = new_name.to_string();
            blocking(move || rename_blocking(&source, &new_name, policy)).await?
        })
    }
}
