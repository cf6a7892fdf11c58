//! Collaborators the coordinator talks to outside the store: confirmation
//! prompts, pinned-location index, selection and launching executables.

use std::io;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use stowage_core::{ItemReference, OperationKind, ReturnStatus};

use crate::conflict::{ConflictDialog, ConflictPrompt, ConflictResponse, ResolvedItem};

/// Answer to a yes/no/cancel prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Primary,
    Secondary,
    Cancel,
}

/// Questions asked during an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// A rename changes the file extension.
    ChangeExtension {
        name: String,
        from: Option<String>,
        to: Option<String>,
    },
    /// A shortcut could not be created next to its target.
    ShortcutFailed {
        name: String,
        fallback: Option<PathBuf>,
    },
}

/// One row of the delete confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePromptItem {
    pub path: PathBuf,
    /// Name shown to the user (the original name for trashed items).
    pub display_name: String,
}

/// Delete confirmation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePrompt {
    pub items: Vec<DeletePromptItem>,
    pub permanently: bool,
    /// Whether the user may switch between trash and permanent delete.
    pub can_toggle_permanence: bool,
}

/// Answer to a delete confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteChoice {
    Proceed { permanently: bool },
    Cancel,
}

/// Messages shown to the user without expecting an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    InvalidName { name: String },
    AccessDenied { operation: OperationKind },
    Unexpected {
        operation: OperationKind,
        status: ReturnStatus,
    },
}

/// Interactive confirmations and notices.
pub trait ConfirmationDialog: Send + Sync {
    fn confirm_delete<'a>(&'a self, prompt: DeletePrompt) -> BoxFuture<'a, DeleteChoice>;

    fn confirm<'a>(&'a self, prompt: Prompt) -> BoxFuture<'a, Confirmation>;

    fn notify<'a>(&'a self, notice: Notice) -> BoxFuture<'a, ()>;
}

/// Index of pinned/quick-access locations that must forget items that no
/// longer exist where it thinks they do.
pub trait PinnedIndex: Send + Sync {
    fn remove_entry<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>>;
}

/// The caller's current item selection.
pub trait Selection: Send + Sync {
    fn clear_selection(&self);
}

/// Opens items with an executable (drop onto a program).
pub trait ExecutableLauncher: Send + Sync {
    fn open_with<'a>(
        &'a self,
        executable: &'a Path,
        items: &'a [ItemReference],
    ) -> BoxFuture<'a, io::Result<()>>;
}

/// Collaborator for headless use: never prompts, accepts defaults and
/// ignores notices.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl ConflictDialog for Detached {
    fn resolve<'a>(&'a self, prompt: ConflictPrompt) -> BoxFuture<'a, ConflictResponse> {
        let items = prompt
            .items
            .into_iter()
            .map(|item| ResolvedItem {
                source: item.source,
                decision: item.decision,
                custom_name: None,
            })
            .collect();
        Box::pin(async move {
            ConflictResponse {
                cancelled: false,
                items,
            }
        })
    }
}

impl ConfirmationDialog for Detached {
    fn confirm_delete<'a>(&'a self, prompt: DeletePrompt) -> BoxFuture<'a, DeleteChoice> {
        Box::pin(async move {
            DeleteChoice::Proceed {
                permanently: prompt.permanently,
            }
        })
    }

    fn confirm<'a>(&'a self, _prompt: Prompt) -> BoxFuture<'a, Confirmation> {
        Box::pin(async { Confirmation::Primary })
    }

    fn notify<'a>(&'a self, _notice: Notice) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}

impl PinnedIndex for Detached {
    fn remove_entry<'a>(&'a self, _path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

impl Selection for Detached {
    fn clear_selection(&self) {}
}

impl ExecutableLauncher for Detached {
    fn open_with<'a>(
        &'a self,
        executable: &'a Path,
        _items: &'a [ItemReference],
    ) -> BoxFuture<'a, io::Result<()>> {
        Box::pin(async move {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("cannot launch {}", executable.display()),
            ))
        })
    }
}
