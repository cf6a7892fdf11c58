//! Operation request types.

use std::path::PathBuf;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use crate::error::CoreError;
use crate::item::ItemReference;

/// The kind of operation being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize, Deserialize)]
pub enum OperationKind {
    #[strum(to_string = "Create")]
    Create,
    #[strum(to_string = "Delete")]
    Delete,
    #[strum(to_string = "Restore")]
    Restore,
    #[strum(to_string = "Copy")]
    Copy,
    #[strum(to_string = "Move")]
    Move,
    #[strum(to_string = "Rename")]
    Rename,
    #[strum(to_string = "Create shortcut")]
    CreateShortcut,
}

impl OperationKind {
    /// Whether sources and destinations must be positionally paired.
    pub fn is_paired(&self) -> bool {
        matches!(
            self,
            Self::Copy | Self::Move | Self::Restore | Self::CreateShortcut
        )
    }

    /// Past-tense verb for summaries.
    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Create => "Created",
            Self::Delete => "Deleted",
            Self::Restore => "Restored",
            Self::Copy => "Copied",
            Self::Move => "Moved",
            Self::Rename => "Renamed",
            Self::CreateShortcut => "Linked",
        }
    }
}

/// Per-item decision on how to handle an existing destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
pub enum CollisionDecision {
    /// Proceed without special handling; fails if the destination exists.
    None,
    /// Pick a fresh "name (n).ext" destination when the target exists.
    GenerateNewName,
    /// Remove the existing destination first.
    ReplaceExisting,
    /// Leave this item untouched.
    #[default]
    Skip,
}

/// How rename and create handle an existing target name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NameCollisionPolicy {
    /// Pick a unique name.
    #[default]
    GenerateUniqueName,
    /// Replace the existing item.
    ReplaceExisting,
    /// Fail with `AlreadyExists`.
    FailIfExists,
}

/// Options shared by all operation requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct OperationOptions {
    /// Bypass the trash (deletes only).
    #[builder(default = "false")]
    #[serde(default)]
    pub permanently: bool,

    /// Allow interactive dialogs.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub show_dialog: bool,

    /// Record the operation for undo.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub register_history: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self {
            permanently: false,
            show_dialog: true,
            register_history: true,
        }
    }
}

impl OperationOptions {
    /// Create an options builder.
    pub fn builder() -> OperationOptionsBuilder {
        OperationOptionsBuilder::default()
    }

    /// Options for internal follow-up work: no dialogs, no history.
    pub fn silent() -> Self {
        Self {
            permanently: false,
            show_dialog: false,
            register_history: false,
        }
    }
}

/// A request to perform one operation over a batch of items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRequest {
    /// What to do.
    pub kind: OperationKind,
    /// Items to operate on, in order.
    pub sources: Vec<ItemReference>,
    /// Destination paths, positionally paired with `sources` where the kind
    /// requires it. For renames this holds the single target path.
    pub destinations: Vec<PathBuf>,
    /// Behavior switches.
    pub options: OperationOptions,
}

impl OperationRequest {
    /// Create a new request.
    pub fn new(
        kind: OperationKind,
        sources: Vec<ItemReference>,
        destinations: Vec<PathBuf>,
        options: OperationOptions,
    ) -> Self {
        Self {
            kind,
            sources,
            destinations,
            options,
        }
    }

    /// Create a delete request.
    pub fn delete(sources: Vec<ItemReference>, options: OperationOptions) -> Self {
        Self::new(OperationKind::Delete, sources, Vec::new(), options)
    }

    /// Check the structural invariants of the request.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.kind.is_paired() && self.sources.len() != self.destinations.len() {
            return Err(CoreError::MismatchedPairs {
                kind: self.kind,
                sources: self.sources.len(),
                destinations: self.destinations.len(),
            });
        }

        match self.kind {
            OperationKind::Rename if self.sources.len() != 1 || self.destinations.len() != 1 => {
                Err(CoreError::InvalidRequest {
                    message: "rename needs exactly one source and one target".into(),
                })
            }
            OperationKind::Create if self.sources.len() != 1 => Err(CoreError::InvalidRequest {
                message: "create needs exactly one item".into(),
            }),
            _ => Ok(()),
        }
    }

    /// Whether any source carries a non-empty path.
    pub fn has_addressable_source(&self) -> bool {
        self.sources.iter().any(ItemReference::has_path)
    }
}
