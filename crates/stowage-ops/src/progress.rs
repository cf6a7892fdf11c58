//! Progress reporting types for file operations.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stowage_core::{OperationKind, OperationOutcome, ReturnStatus};

/// Progress information for an ongoing operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationProgress {
    /// The type of operation.
    pub kind: OperationKind,
    /// Number of items completed (successfully or not).
    pub items_completed: usize,
    /// Total number of items to process.
    pub items_total: usize,
    /// Number of bytes processed so far.
    pub bytes_processed: u64,
    /// The item most recently processed.
    pub current: Option<PathBuf>,
    /// Aggregate status so far.
    pub status: ReturnStatus,
}

impl OperationProgress {
    /// Create a new progress tracker for an operation.
    pub fn new(kind: OperationKind, items_total: usize) -> Self {
        Self {
            kind,
            items_completed: 0,
            items_total,
            bytes_processed: 0,
            current: None,
            status: ReturnStatus::InProgress,
        }
    }

    /// Get the progress as a percentage (0.0 to 100.0).
    pub fn percentage(&self) -> f64 {
        if self.items_total > 0 {
            (self.items_completed as f64 / self.items_total as f64) * 100.0
        } else {
            0.0
        }
    }

    /// Account for one more processed item.
    pub fn advance(&mut self, current: Option<PathBuf>, bytes: u64, status: ReturnStatus) {
        self.items_completed += 1;
        self.bytes_processed += bytes;
        self.current = current;
        self.status = status;
    }
}

/// Events for a status banner or progress UI.
#[derive(Debug, Clone)]
pub enum BannerEvent {
    /// A batch is about to run.
    Started {
        kind: OperationKind,
        items_total: usize,
    },
    /// An item finished.
    Progress(OperationProgress),
    /// The operation finished.
    Finished {
        kind: OperationKind,
        outcome: OperationOutcome,
    },
}

/// Get a human-readable summary of an operation outcome.
pub fn summary(kind: OperationKind, outcome: &OperationOutcome) -> String {
    let action = kind.past_tense();
    let noun = if outcome.items_affected == 1 { "item" } else { "items" };

    match outcome.status {
        ReturnStatus::Success | ReturnStatus::InProgress => {
            format!("{} {} {}", action, outcome.items_affected, noun)
        }
        ReturnStatus::Cancelled => format!(
            "{} cancelled after {} {}",
            kind, outcome.items_affected, noun
        ),
        status => format!(
            "{} {} {}, finished with {}",
            action, outcome.items_affected, noun, status
        ),
    }
}
