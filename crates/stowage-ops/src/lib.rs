//! File operation orchestration engine for stowage.
//!
//! The [`Coordinator`] is the public entry point. It sequences trash
//! classification, collision resolution, a [`StorageExecutor`] that performs
//! the per-item I/O and streams outcomes over a channel, history recording
//! and stale-reference cleanup. Every entry point is async and cancellable
//! through a [`CancellationToken`](tokio_util::sync::CancellationToken).

mod clipboard;
mod conflict;
mod coordinator;
mod dialog;
mod executor;
mod folder_trash;
mod fsutil;
mod history;
mod local;
mod progress;
mod rename;
mod system_trash;
mod trash;

pub use clipboard::{ClipboardPayload, OperationFlags};
pub use conflict::{
    CollisionResolver, ConflictDialog, ConflictItem, ConflictPrompt, ConflictResponse,
    DialogMode, Resolution, Resolved, ResolvedItem, candidate_name, unique_path,
};
pub use coordinator::{Coordinator, Services};
pub use dialog::{
    Confirmation, ConfirmationDialog, DeleteChoice, DeletePrompt, DeletePromptItem, Detached,
    ExecutableLauncher, Notice, PinnedIndex, Prompt, Selection,
};
pub use executor::{Batch, BatchItem, BatchKind, ItemOutcome, StorageExecutor, StorageFailure};
pub use folder_trash::FolderTrash;
pub use history::{
    HistoryRecorder, HistorySnapshot, forward_request, inverse_request, reverse_record,
    unreversed,
};
pub use local::LocalExecutor;
pub use progress::{BannerEvent, OperationProgress, summary};
pub use rename::{NameError, validate_name};
pub use system_trash::SystemTrash;
pub use trash::{TrashAdapter, TrashEntry, TrashError, TrashSnapshot, TrashStore, TrashUsage};

/// Default channel buffer size for per-item outcomes and banner events.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
