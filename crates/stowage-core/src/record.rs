//! History records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::ItemReference;
use crate::operation::OperationKind;

/// A completed, reversible operation.
///
/// `sources` and `destinations` are positionally paired and only contain
/// items that actually completed. Destinations are the final paths, after
/// any collision renaming.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    /// What was done.
    pub kind: OperationKind,
    /// Items the operation started from.
    pub sources: Vec<ItemReference>,
    /// Where each item ended up.
    pub destinations: Vec<ItemReference>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl OperationRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        kind: OperationKind,
        sources: Vec<ItemReference>,
        destinations: Vec<ItemReference>,
    ) -> Self {
        Self {
            kind,
            sources,
            destinations,
            created_at: Utc::now(),
        }
    }

    /// Number of items in the record.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the record covers no items.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Human-readable description.
    pub fn description(&self) -> String {
        match (self.kind, self.sources.first(), self.destinations.first()) {
            (OperationKind::Rename, Some(from), Some(to)) => {
                format!("Renamed '{}' to '{}'", from.name(), to.name())
            }
            (kind, _, _) => format!("{} {} items", kind.past_tense(), self.len()),
        }
    }
}
