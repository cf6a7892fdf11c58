//! Collision detection and resolution for paired operations.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};
use stowage_core::{CollisionDecision, ItemReference, OperationKind};
use tracing::{debug, warn};

use crate::executor::StorageExecutor;

/// When the interactive conflict dialog is shown.
///
/// A `show_dialog` flag converts to `Always` (forced) or `OnConflict`.
/// `Never` is only chosen explicitly, by undo and redo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DialogMode {
    /// Never prompt; conflicts keep the default `GenerateNewName`.
    Never,
    /// Prompt only when at least one destination already exists.
    #[default]
    OnConflict,
    /// Always prompt, even without conflicts.
    Always,
}

impl From<bool> for DialogMode {
    fn from(show_dialog: bool) -> Self {
        if show_dialog {
            Self::Always
        } else {
            Self::OnConflict
        }
    }
}

/// One row of the conflict dialog.
#[derive(Debug, Clone)]
pub struct ConflictItem {
    /// Source key (path, or name for pathless items).
    pub source: PathBuf,
    /// Intended destination.
    pub destination: PathBuf,
    /// File name shown for the destination.
    pub destination_name: String,
    /// Whether the destination already exists.
    pub conflicting: bool,
    /// Pre-selected decision.
    pub decision: CollisionDecision,
}

/// Everything the conflict dialog needs to render.
#[derive(Debug, Clone)]
pub struct ConflictPrompt {
    pub operation: OperationKind,
    pub conflicts_exist: bool,
    pub items: Vec<ConflictItem>,
    /// Decisions the user may pick from.
    pub actions: Vec<CollisionDecision>,
}

impl ConflictPrompt {
    /// Rows that collide with an existing destination.
    pub fn conflicting(&self) -> impl Iterator<Item = &ConflictItem> {
        self.items.iter().filter(|item| item.conflicting)
    }
}

/// The user's answer for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedItem {
    pub source: PathBuf,
    pub decision: CollisionDecision,
    /// Name to give the destination after the transfer.
    pub custom_name: Option<String>,
}

/// The dialog's answer for a whole batch.
#[derive(Debug, Clone, Default)]
pub struct ConflictResponse {
    pub cancelled: bool,
    pub items: Vec<ResolvedItem>,
}

impl ConflictResponse {
    /// A cancelled response.
    pub fn cancel() -> Self {
        Self {
            cancelled: true,
            items: Vec::new(),
        }
    }
}

/// Interactive conflict-resolution collaborator.
pub trait ConflictDialog: Send + Sync {
    /// Ask the user how to resolve the batch. Called at most once per batch.
    fn resolve<'a>(&'a self, prompt: ConflictPrompt) -> BoxFuture<'a, ConflictResponse>;
}

/// Per-item decisions, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub decisions: Vec<CollisionDecision>,
    pub custom_names: Vec<Option<String>>,
    /// Whether the dialog was shown.
    pub prompted: bool,
}

/// Result of collision resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// The user cancelled a batch that had conflicts.
    Cancelled,
    Decided(Resolution),
}

/// Computes per-item collision decisions for paired source/destination lists.
#[derive(Clone)]
pub struct CollisionResolver {
    executor: Arc<dyn StorageExecutor>,
    dialog: Arc<dyn ConflictDialog>,
}

impl CollisionResolver {
    /// Create a resolver.
    pub fn new(executor: Arc<dyn StorageExecutor>, dialog: Arc<dyn ConflictDialog>) -> Self {
        Self { executor, dialog }
    }

    /// Resolve collisions for a paired batch.
    ///
    /// `sources` and `destinations` must have equal lengths.
    pub async fn resolve(
        &self,
        operation: OperationKind,
        sources: &[ItemReference],
        destinations: &[PathBuf],
        mode: DialogMode,
    ) -> Resolved {
        let mut items = Vec::with_capacity(sources.len());
        let mut decisions: IndexMap<PathBuf, (CollisionDecision, Option<String>)> =
            IndexMap::with_capacity(sources.len());

        for (source, destination) in sources.iter().zip(destinations) {
            let key = source.key();
            match decisions.entry(key.clone()) {
                Entry::Occupied(_) => {
                    warn!(
                        source = %key.display(),
                        "Duplicate source in batch, keeping first decision"
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert((CollisionDecision::GenerateNewName, None));
                }
            }

            // Same path on both sides is a duplicate-in-place, not a collision.
            let conflicting = (!source.has_path() || source.path != *destination)
                && self.executor.exists(destination).await;

            items.push(ConflictItem {
                source: key,
                destination: destination.clone(),
                destination_name: destination
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                conflicting,
                decision: if conflicting {
                    CollisionDecision::GenerateNewName
                } else {
                    CollisionDecision::None
                },
            });
        }

        let conflicts_exist = items.iter().any(|item| item.conflicting);
        let prompt_user = match mode {
            DialogMode::Never => false,
            DialogMode::OnConflict => conflicts_exist,
            DialogMode::Always => true,
        };

        if prompt_user {
            let actions = if conflicts_exist {
                vec![
                    CollisionDecision::GenerateNewName,
                    CollisionDecision::ReplaceExisting,
                    CollisionDecision::Skip,
                ]
            } else {
                vec![CollisionDecision::None, CollisionDecision::Skip]
            };

            debug!(
                ?operation,
                items = items.len(),
                conflicts = items.iter().filter(|i| i.conflicting).count(),
                "Asking for conflict resolution"
            );

            let response = self
                .dialog
                .resolve(ConflictPrompt {
                    operation,
                    conflicts_exist,
                    items,
                    actions,
                })
                .await;

            if response.cancelled && conflicts_exist {
                return Resolved::Cancelled;
            }

            decisions.clear();
            for resolved in response.items {
                match decisions.entry(resolved.source) {
                    Entry::Occupied(slot) => {
                        warn!(
                            source = %slot.key().display(),
                            "Conflict dialog returned a duplicate source, keeping first decision"
                        );
                    }
                    Entry::Vacant(slot) => {
                        slot.insert((resolved.decision, resolved.custom_name));
                    }
                }
            }
        }

        // Back to source order; anything the dialog left out is skipped.
        let (decisions, custom_names) = sources
            .iter()
            .map(|source| {
                decisions
                    .get(&source.key())
                    .cloned()
                    .unwrap_or((CollisionDecision::Skip, None))
            })
            .unzip();

        Resolved::Decided(Resolution {
            decisions,
            custom_names,
            prompted: prompt_user,
        })
    }
}

/// File name for the `n`-th candidate of a stem and extension.
///
/// `extension` includes its leading dot, or is empty.
pub fn candidate_name(stem: &str, extension: &str, n: u32) -> String {
    if n == 0 {
        format!("{stem}{extension}")
    } else {
        format!("{stem} ({n}){extension}")
    }
}

/// Split a path's file name into stem and dotted extension.
pub(crate) fn split_name(path: &Path) -> (String, String) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (stem, extension)
}

/// First free path of the form "stem (n).ext" with the smallest unused n.
///
/// Returns `path` itself when it is free.
pub fn unique_path(path: &Path, exists: impl Fn(&Path) -> bool) -> PathBuf {
    if !exists(path) {
        return path.to_path_buf();
    }

    let parent = path.parent().unwrap_or(Path::new(""));
    let (stem, extension) = split_name(path);
    unique_in(parent, &stem, &extension, exists)
}

/// First free "stem (n).ext" inside `parent`, starting at n = 1.
pub(crate) fn unique_in(
    parent: &Path,
    stem: &str,
    extension: &str,
    exists: impl Fn(&Path) -> bool,
) -> PathBuf {
    for n in 1..10_000 {
        let candidate = parent.join(candidate_name(stem, extension, n));
        if !exists(&candidate) {
            return candidate;
        }
    }

    // Fallback: use timestamp
    let timestamp = chrono::Utc::now().timestamp_millis();
    parent.join(format!("{stem}_{timestamp}{extension}"))
}

/// Async variant of [`unique_path`] that asks the executor about existence.
///
/// Names in `claimed` count as taken, so several items of one batch never
/// receive the same name. The chosen path is added to `claimed`.
pub(crate) async fn unique_path_in_store(
    executor: &dyn StorageExecutor,
    parent: &Path,
    stem: &str,
    extension: &str,
    claimed: &mut HashSet<PathBuf>,
) -> PathBuf {
    let mut n = 0;
    loop {
        let candidate = parent.join(candidate_name(stem, extension, n));
        if !claimed.contains(&candidate) && !executor.exists(&candidate).await {
            claimed.insert(candidate.clone());
            return candidate;
        }
        n += 1;
    }
}
