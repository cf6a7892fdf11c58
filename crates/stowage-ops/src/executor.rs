//! Storage executor boundary.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use stowage_core::{CollisionDecision, ItemReference, ItemStatus, NameCollisionPolicy};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What a batch does to each of its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Copy,
    Move,
    Delete { permanently: bool },
    Restore,
    CreateLink,
}

/// One unit of work inside a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    /// Item to operate on.
    pub source: ItemReference,
    /// Target path, for kinds that have one.
    pub destination: Option<PathBuf>,
    /// What to do if the target already exists.
    pub decision: CollisionDecision,
}

impl BatchItem {
    /// Item paired with a destination.
    pub fn to(source: ItemReference, destination: PathBuf, decision: CollisionDecision) -> Self {
        Self {
            source,
            destination: Some(destination),
            decision,
        }
    }

    /// Item without a destination (deletes).
    pub fn alone(source: ItemReference) -> Self {
        Self {
            source,
            destination: None,
            decision: CollisionDecision::None,
        }
    }
}

/// An ordered list of items processed with the same kind of operation.
#[derive(Debug, Clone)]
pub struct Batch {
    pub kind: BatchKind,
    pub items: Vec<BatchItem>,
}

impl Batch {
    /// Create a batch.
    pub fn new(kind: BatchKind, items: Vec<BatchItem>) -> Self {
        Self { kind, items }
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Outcome of one batch item, streamed back by the executor.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    /// Position of the item in the batch.
    pub index: usize,
    /// The item as submitted.
    pub source: ItemReference,
    /// Where the item ended up (final name after collision handling, or the
    /// trash path for soft deletes).
    pub destination: Option<PathBuf>,
    /// Item status.
    pub status: ItemStatus,
    /// Bytes moved or copied.
    pub bytes: u64,
    /// Error detail for failed items.
    pub message: Option<String>,
}

impl ItemOutcome {
    /// Successful outcome.
    pub fn done(
        index: usize,
        source: ItemReference,
        destination: Option<PathBuf>,
        bytes: u64,
    ) -> Self {
        Self {
            index,
            source,
            destination,
            status: ItemStatus::Success,
            bytes,
            message: None,
        }
    }

    /// Item skipped by its collision decision.
    pub fn skipped(index: usize, source: ItemReference) -> Self {
        Self {
            index,
            source,
            destination: None,
            status: ItemStatus::Skipped,
            bytes: 0,
            message: None,
        }
    }

    /// Failed outcome.
    pub fn failed(index: usize, source: ItemReference, failure: StorageFailure) -> Self {
        Self {
            index,
            source,
            destination: None,
            status: failure.status,
            bytes: 0,
            message: Some(failure.message),
        }
    }
}

/// A classified storage error.
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct StorageFailure {
    pub status: ItemStatus,
    pub message: String,
}

impl StorageFailure {
    /// Create a failure.
    pub fn new(status: ItemStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Classify an I/O error with some context.
    pub fn io(context: &str, error: &std::io::Error) -> Self {
        Self::new(ItemStatus::from(error), format!("{context}: {error}"))
    }
}

/// Performs the actual I/O against a store.
///
/// Per-item errors are reported as [`ItemStatus`] values inside the stream,
/// never as panics. The executor keeps going after a failed item and checks
/// the cancellation token before starting each item.
pub trait StorageExecutor: Send + Sync {
    /// Whether a path exists in the store.
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool>;

    /// Run a batch, streaming one outcome per item that was started.
    fn execute(&self, batch: Batch, cancel: CancellationToken) -> mpsc::Receiver<ItemOutcome>;

    /// Create a single file or directory, optionally with contents.
    ///
    /// Returns the path actually created.
    fn create<'a>(
        &'a self,
        item: &'a ItemReference,
        contents: Option<Vec<u8>>,
        policy: NameCollisionPolicy,
    ) -> BoxFuture<'a, Result<PathBuf, StorageFailure>>;

    /// Rename an item within its folder.
    ///
    /// Returns the new path.
    fn rename<'a>(
        &'a self,
        item: &'a ItemReference,
        new_name: &'a str,
        policy: NameCollisionPolicy,
    ) -> BoxFuture<'a, Result<PathBuf, StorageFailure>>;
}
