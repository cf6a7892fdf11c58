//! Operation status taxonomy and aggregation.

use std::io;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Aggregate status of an operation.
///
/// Variants are declared in severity order, so the derived ordering is the
/// severity ordering. `InProgress` means nothing has been observed yet.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum ReturnStatus {
    #[strum(to_string = "In progress")]
    InProgress,
    #[strum(to_string = "Success")]
    Success,
    #[strum(to_string = "Cancelled")]
    Cancelled,
    #[strum(to_string = "Failed")]
    Failed,
    #[strum(to_string = "Access unauthorized")]
    AccessUnauthorized,
    #[strum(to_string = "Unknown error")]
    UnknownException,
    #[strum(to_string = "Bad argument")]
    BadArgument,
}

impl ReturnStatus {
    /// Whether this status is failure-class (`Failed` or worse).
    pub fn is_failure(&self) -> bool {
        *self >= Self::Failed
    }

    /// Whether the operation completed without failure or cancellation.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Status of a single item as reported by a storage executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum ItemStatus {
    Success,
    /// Item left untouched on purpose (collision decision `Skip`).
    Skipped,
    Cancelled,
    Unauthorized,
    InUse,
    ReadOnly,
    NotFound,
    AlreadyExists,
    NameTooLong,
    NotAFolder,
    NotAFile,
    /// Ordinary I/O failure.
    Generic,
    /// Fault the executor could not classify.
    Unknown,
}

impl ItemStatus {
    /// Map to the aggregate status taxonomy.
    pub fn to_status(self) -> ReturnStatus {
        match self {
            Self::Success | Self::Skipped => ReturnStatus::Success,
            Self::Cancelled => ReturnStatus::Cancelled,
            Self::Unauthorized | Self::InUse | Self::ReadOnly => ReturnStatus::AccessUnauthorized,
            Self::NotFound | Self::AlreadyExists | Self::NameTooLong | Self::Generic => {
                ReturnStatus::Failed
            }
            Self::NotAFolder | Self::NotAFile => ReturnStatus::BadArgument,
            Self::Unknown => ReturnStatus::UnknownException,
        }
    }

    /// Whether the item was actually affected.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<&io::Error> for ItemStatus {
    fn from(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => Self::Unauthorized,
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::AlreadyExists => Self::AlreadyExists,
            io::ErrorKind::ReadOnlyFilesystem => Self::ReadOnly,
            io::ErrorKind::ResourceBusy => Self::InUse,
            io::ErrorKind::NotADirectory => Self::NotAFolder,
            io::ErrorKind::IsADirectory => Self::NotAFile,
            io::ErrorKind::Interrupted => Self::Cancelled,
            io::ErrorKind::Other | io::ErrorKind::Unsupported => Self::Unknown,
            _ => Self::Generic,
        }
    }
}

/// Running aggregate over streamed per-item statuses.
///
/// The aggregate is replaced by a newly observed status only while it is
/// still below `Failed`: the first failure-class status sticks, and later
/// successes cannot hide it.
#[derive(Debug, Clone, Copy)]
pub struct StatusAggregator {
    status: ReturnStatus,
    affected: usize,
}

impl Default for StatusAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusAggregator {
    /// Start a new aggregate in `InProgress`.
    pub fn new() -> Self {
        Self {
            status: ReturnStatus::InProgress,
            affected: 0,
        }
    }

    /// Fold in an aggregate-level status.
    pub fn observe(&mut self, status: ReturnStatus) {
        if self.status < ReturnStatus::Failed {
            self.status = status;
        }
    }

    /// Fold in a per-item status, counting affected items.
    pub fn observe_item(&mut self, status: ItemStatus) {
        if status.is_done() {
            self.affected += 1;
        }
        self.observe(status.to_status());
    }

    /// Current aggregate status.
    pub fn status(&self) -> ReturnStatus {
        self.status
    }

    /// Number of items affected so far.
    pub fn affected(&self) -> usize {
        self.affected
    }

    /// Close the aggregate.
    ///
    /// A batch that saw nothing is a success; a cancelled batch reports
    /// `Cancelled` unless a failure-class status was already recorded.
    pub fn finish(self, cancelled: bool) -> OperationOutcome {
        let status = if cancelled && !self.status.is_failure() {
            ReturnStatus::Cancelled
        } else if self.status == ReturnStatus::InProgress {
            ReturnStatus::Success
        } else {
            self.status
        };
        OperationOutcome::new(status, self.affected)
    }
}

/// Result of a coordinator operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Aggregate status.
    pub status: ReturnStatus,
    /// Number of items actually affected.
    pub items_affected: usize,
}

impl OperationOutcome {
    /// Create a new outcome.
    pub fn new(status: ReturnStatus, items_affected: usize) -> Self {
        Self {
            status,
            items_affected,
        }
    }

    /// Outcome for work that never started because of a status.
    pub fn rejected(status: ReturnStatus) -> Self {
        Self::new(status, 0)
    }

    /// Successful outcome that touched nothing.
    pub fn noop() -> Self {
        Self::new(ReturnStatus::Success, 0)
    }

    /// Whether the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
