//! Undo/redo history for completed operations.

use std::collections::VecDeque;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use stowage_core::{OperationKind, OperationOptions, OperationRecord, OperationRequest};
use tokio::sync::Mutex;

/// Both history stacks, for saving between sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistorySnapshot {
    /// Undo stack, oldest first.
    pub undo: Vec<OperationRecord>,
    /// Redo stack, next redo last.
    #[serde(default)]
    pub redo: Vec<OperationRecord>,
}

#[derive(Debug, Default)]
struct Stacks {
    undo: VecDeque<OperationRecord>,
    redo: Vec<OperationRecord>,
}

/// Bounded undo log with a redo stack.
///
/// Appending a new record drops the oldest one once `capacity` is reached
/// and clears the redo stack.
#[derive(Debug)]
pub struct HistoryRecorder {
    stacks: Mutex<Stacks>,
    capacity: usize,
}

impl Default for HistoryRecorder {
    fn default() -> Self {
        Self::new(100)
    }
}

impl HistoryRecorder {
    /// Create an empty history holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            stacks: Mutex::new(Stacks::default()),
            capacity: capacity.max(1),
        }
    }

    /// Rebuild a history from saved records (oldest first).
    pub fn from_records(
        records: impl IntoIterator<Item = OperationRecord>,
        capacity: usize,
    ) -> Self {
        let capacity = capacity.max(1);
        let mut undo: VecDeque<OperationRecord> = records.into_iter().collect();
        while undo.len() > capacity {
            undo.pop_front();
        }
        Self {
            stacks: Mutex::new(Stacks {
                undo,
                redo: Vec::new(),
            }),
            capacity,
        }
    }

    /// Rebuild both stacks from a snapshot.
    pub fn from_snapshot(snapshot: HistorySnapshot, capacity: usize) -> Self {
        let mut history = Self::from_records(snapshot.undo, capacity);
        history.stacks.get_mut().redo = snapshot.redo;
        history
    }

    /// Maximum number of undo records.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a new user operation. Clears the redo stack.
    pub async fn append(&self, record: OperationRecord) {
        let mut stacks = self.stacks.lock().await;
        stacks.redo.clear();
        Self::push_bounded(&mut stacks.undo, record, self.capacity);
    }

    /// Put a record back on the undo stack without touching redo (used by
    /// redo and by failed undos).
    pub async fn push_undone(&self, record: OperationRecord) {
        let mut stacks = self.stacks.lock().await;
        Self::push_bounded(&mut stacks.undo, record, self.capacity);
    }

    fn push_bounded(
        undo: &mut VecDeque<OperationRecord>,
        record: OperationRecord,
        capacity: usize,
    ) {
        // Remove oldest entry if at capacity
        while undo.len() >= capacity {
            undo.pop_front();
        }
        undo.push_back(record);
    }

    /// Most recent undoable record.
    pub async fn peek(&self) -> Option<OperationRecord> {
        self.stacks.lock().await.undo.back().cloned()
    }

    /// Take the most recent record for undoing.
    pub async fn pop_for_undo(&self) -> Option<OperationRecord> {
        self.stacks.lock().await.undo.pop_back()
    }

    /// Push a record that can be redone.
    pub async fn push_redo(&self, record: OperationRecord) {
        self.stacks.lock().await.redo.push(record);
    }

    /// Take the most recent undone record for redoing.
    pub async fn pop_for_redo(&self) -> Option<OperationRecord> {
        self.stacks.lock().await.redo.pop()
    }

    /// Whether there is anything to undo.
    pub async fn can_undo(&self) -> bool {
        !self.stacks.lock().await.undo.is_empty()
    }

    /// Whether there is anything to redo.
    pub async fn can_redo(&self) -> bool {
        !self.stacks.lock().await.redo.is_empty()
    }

    /// Number of undo records.
    pub async fn len(&self) -> usize {
        self.stacks.lock().await.undo.len()
    }

    /// Whether the undo stack is empty.
    pub async fn is_empty(&self) -> bool {
        self.stacks.lock().await.undo.is_empty()
    }

    /// Snapshot of the undo stack, oldest first.
    pub async fn records(&self) -> Vec<OperationRecord> {
        self.stacks.lock().await.undo.iter().cloned().collect()
    }

    /// Copy of both stacks.
    pub async fn snapshot(&self) -> HistorySnapshot {
        let stacks = self.stacks.lock().await;
        HistorySnapshot {
            undo: stacks.undo.iter().cloned().collect(),
            redo: stacks.redo.clone(),
        }
    }

    /// Drop all history.
    pub async fn clear(&self) {
        let mut stacks = self.stacks.lock().await;
        stacks.undo.clear();
        stacks.redo.clear();
    }
}

fn paths(items: &[stowage_core::ItemReference]) -> Vec<PathBuf> {
    items.iter().map(|item| item.path.clone()).collect()
}

/// The request that reverses a record, if it can be reversed.
///
/// Undo work never prompts and is never recorded itself.
pub fn inverse_request(record: &OperationRecord) -> Option<OperationRequest> {
    if record.is_empty() {
        return None;
    }

    let quiet = OperationOptions::silent();
    let permanent = OperationOptions {
        permanently: true,
        ..quiet
    };

    let request = match record.kind {
        OperationKind::Copy | OperationKind::Create | OperationKind::CreateShortcut => {
            OperationRequest::delete(record.destinations.clone(), permanent)
        }
        OperationKind::Move | OperationKind::Rename => OperationRequest::new(
            record.kind,
            record.destinations.clone(),
            paths(&record.sources),
            quiet,
        ),
        OperationKind::Delete => {
            if record.destinations.is_empty() {
                return None;
            }
            OperationRequest::new(
                OperationKind::Restore,
                record.destinations.clone(),
                paths(&record.sources),
                quiet,
            )
        }
        OperationKind::Restore => OperationRequest::delete(record.destinations.clone(), quiet),
    };
    Some(request)
}

/// The request that performs a record's operation again.
pub fn forward_request(record: &OperationRecord) -> OperationRequest {
    let quiet = OperationOptions::silent();
    match record.kind {
        OperationKind::Delete => OperationRequest::delete(record.sources.clone(), quiet),
        OperationKind::Create => OperationRequest::new(
            OperationKind::Create,
            record.destinations.clone(),
            Vec::new(),
            quiet,
        ),
        kind => OperationRequest::new(
            kind,
            record.sources.clone(),
            paths(&record.destinations),
            quiet,
        ),
    }
}

/// Express the record of an undo as the original operation, so that redo
/// can replay it from the current locations.
///
/// Returns `None` for kinds whose undo leaves no record (permanent deletes).
pub fn reverse_record(record: &OperationRecord) -> Option<OperationRecord> {
    let kind = match record.kind {
        OperationKind::Move => OperationKind::Move,
        OperationKind::Rename => OperationKind::Rename,
        OperationKind::Delete => OperationKind::Restore,
        OperationKind::Restore => OperationKind::Delete,
        OperationKind::Copy | OperationKind::Create | OperationKind::CreateShortcut => {
            return None;
        }
    };
    Some(OperationRecord {
        kind,
        sources: record.destinations.clone(),
        destinations: record.sources.clone(),
        created_at: record.created_at,
    })
}

/// The part of `record` whose undo did not happen.
///
/// `reversed` holds the paths the inverse request completed from, which
/// are the record's destinations.
pub fn unreversed(record: &OperationRecord, reversed: &[PathBuf]) -> OperationRecord {
    let (sources, destinations) = record
        .sources
        .iter()
        .zip(&record.destinations)
        .filter(|(_, destination)| !reversed.contains(&destination.path))
        .map(|(source, destination)| (source.clone(), destination.clone()))
        .unzip();
    OperationRecord {
        kind: record.kind,
        sources,
        destinations,
        created_at: record.created_at,
    }
}
