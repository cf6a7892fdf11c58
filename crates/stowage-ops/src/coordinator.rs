//! The operation coordinator: the public entry point of the engine.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use itertools::Itertools;
use stowage_core::{
    CollisionDecision, DeleteConfirmationPolicy, EngineConfig, ItemReference, ItemStatus,
    NameCollisionPolicy, OperationKind, OperationOptions, OperationOutcome, OperationRecord,
    OperationRequest, ReturnStatus, StatusAggregator,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clipboard::{ClipboardPayload, OperationFlags};
use crate::conflict::{
    CollisionResolver, ConflictDialog, DialogMode, Resolved, unique_path_in_store,
};
use crate::dialog::{
    Confirmation, ConfirmationDialog, DeleteChoice, DeletePrompt, DeletePromptItem, Detached,
    ExecutableLauncher, Notice, PinnedIndex, Prompt, Selection,
};
use crate::executor::{Batch, BatchItem, BatchKind, ItemOutcome, StorageExecutor};
use crate::history::{
    HistoryRecorder, forward_request, inverse_request, reverse_record, unreversed,
};
use crate::progress::{BannerEvent, OperationProgress};
use crate::rename::validate_name;
use crate::trash::{TrashAdapter, TrashStore};

/// File name for images pasted from the clipboard.
const BITMAP_NAME_FORMAT: &str = "%m-%d-%y-%H%M%S.png";

/// Collaborators the coordinator is built from.
#[derive(Clone)]
pub struct Services {
    pub executor: Arc<dyn StorageExecutor>,
    pub trash: Arc<dyn TrashStore>,
    pub conflicts: Arc<dyn ConflictDialog>,
    pub dialogs: Arc<dyn ConfirmationDialog>,
    pub pinned: Arc<dyn PinnedIndex>,
    pub selection: Arc<dyn Selection>,
    pub launcher: Arc<dyn ExecutableLauncher>,
}

impl Services {
    /// Services with no pinned index, selection or launcher attached.
    pub fn new(
        executor: Arc<dyn StorageExecutor>,
        trash: Arc<dyn TrashStore>,
        conflicts: Arc<dyn ConflictDialog>,
        dialogs: Arc<dyn ConfirmationDialog>,
    ) -> Self {
        Self {
            executor,
            trash,
            conflicts,
            dialogs,
            pinned: Arc::new(Detached),
            selection: Arc::new(Detached),
            launcher: Arc::new(Detached),
        }
    }

    pub fn with_pinned(mut self, pinned: Arc<dyn PinnedIndex>) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn with_selection(mut self, selection: Arc<dyn Selection>) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn ExecutableLauncher>) -> Self {
        self.launcher = launcher;
        self
    }
}

/// Result of an operation before history and notices are applied.
struct Completed {
    outcome: OperationOutcome,
    record: Option<OperationRecord>,
    /// Source paths of the items that completed.
    done: Vec<PathBuf>,
}

impl Completed {
    fn bare(outcome: OperationOutcome) -> Self {
        Self {
            outcome,
            record: None,
            done: Vec::new(),
        }
    }

    fn status(status: ReturnStatus) -> Self {
        Self::bare(OperationOutcome::rejected(status))
    }
}

/// Everything streamed back for one batch.
struct BatchReport {
    outcomes: Vec<ItemOutcome>,
    cancelled: bool,
    /// Statuses of follow-up work (custom-name renames).
    follow_ups: Vec<ReturnStatus>,
}

impl BatchReport {
    fn completed(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_done())
    }

    fn outcome(&self) -> OperationOutcome {
        let mut aggregate = StatusAggregator::new();
        for outcome in &self.outcomes {
            aggregate.observe_item(outcome.status);
        }
        for status in &self.follow_ups {
            aggregate.observe(*status);
        }
        aggregate.finish(self.cancelled)
    }

    fn done(&self) -> Vec<PathBuf> {
        self.completed().map(|o| o.source.path.clone()).collect()
    }

    /// Completed items paired with where they ended up.
    fn placed_pairs(&self) -> (Vec<ItemReference>, Vec<ItemReference>) {
        self.completed()
            .filter_map(|o| {
                let destination = o.destination.as_ref()?;
                Some((o.source.clone(), o.source.with_path(destination)))
            })
            .unzip()
    }
}

/// Sequences trash classification, collision resolution, execution,
/// history and stale-reference cleanup for every file operation.
///
/// Cheap to clone; clones share history and collaborators.
#[derive(Clone)]
pub struct Coordinator {
    services: Services,
    config: Arc<EngineConfig>,
    history: Arc<HistoryRecorder>,
    progress: Option<mpsc::Sender<BannerEvent>>,
    root: CancellationToken,
    resolver: CollisionResolver,
    trash: TrashAdapter,
}

impl Coordinator {
    /// Create a coordinator with an empty history sized from `config`.
    pub fn new(services: Services, config: EngineConfig) -> Self {
        let history = Arc::new(HistoryRecorder::new(config.history_capacity));
        let resolver =
            CollisionResolver::new(Arc::clone(&services.executor), Arc::clone(&services.conflicts));
        let trash = TrashAdapter::new(Arc::clone(&services.trash));
        Self {
            services,
            config: Arc::new(config),
            history,
            progress: None,
            root: CancellationToken::new(),
            resolver,
            trash,
        }
    }

    /// Share an existing history (e.g. one restored from disk).
    pub fn with_history(mut self, history: Arc<HistoryRecorder>) -> Self {
        self.history = history;
        self
    }

    /// Send banner events to `tx`. Events are dropped when the channel is full.
    pub fn with_progress(mut self, tx: mpsc::Sender<BannerEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn history(&self) -> &Arc<HistoryRecorder> {
        &self.history
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn trash(&self) -> &TrashAdapter {
        &self.trash
    }

    /// A token cancelled by [`Coordinator::shutdown`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Cancel every operation started with a token from
    /// [`Coordinator::cancellation_token`].
    pub fn shutdown(&self) {
        self.root.cancel();
    }

    fn emit(&self, event: BannerEvent) {
        if let Some(tx) = &self.progress {
            let _ = tx.try_send(event);
        }
    }

    async fn forget_pinned(&self, paths: impl IntoIterator<Item = PathBuf>) {
        for path in paths {
            if let Err(e) = self.services.pinned.remove_entry(&path).await {
                debug!(path = %path.display(), "Failed to remove pinned entry: {}", e);
            }
        }
    }

    /// Record history, surface access and unexpected failures, and report
    /// the end of the operation.
    async fn conclude(
        &self,
        kind: OperationKind,
        completed: Completed,
        register_history: bool,
    ) -> OperationOutcome {
        let outcome = completed.outcome;

        if register_history {
            if let Some(record) = completed.record {
                if !record.is_empty() && record.sources.iter().any(ItemReference::has_path) {
                    debug!("History: {}", record.description());
                    self.history.append(record).await;
                }
            }
        }

        match outcome.status {
            ReturnStatus::AccessUnauthorized => {
                self.services
                    .dialogs
                    .notify(Notice::AccessDenied { operation: kind })
                    .await;
            }
            ReturnStatus::UnknownException => {
                self.services
                    .dialogs
                    .notify(Notice::Unexpected {
                        operation: kind,
                        status: outcome.status,
                    })
                    .await;
            }
            _ => {}
        }

        debug!(
            %kind,
            status = %outcome.status,
            affected = outcome.items_affected,
            "Operation finished"
        );
        self.emit(BannerEvent::Finished { kind, outcome });
        outcome
    }

    async fn run_batch(
        &self,
        kind: OperationKind,
        batch: Batch,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let total = batch.len();
        debug!(%kind, items = total, "Starting batch");
        self.emit(BannerEvent::Started {
            kind,
            items_total: total,
        });

        let mut progress = OperationProgress::new(kind, total);
        let mut running = StatusAggregator::new();
        let mut outcomes = Vec::with_capacity(total);

        let mut rx = self.services.executor.execute(batch, cancel.clone());
        while let Some(outcome) = rx.recv().await {
            running.observe_item(outcome.status);
            progress.advance(
                Some(outcome.destination.clone().unwrap_or_else(|| outcome.source.key())),
                outcome.bytes,
                running.status(),
            );
            self.emit(BannerEvent::Progress(progress.clone()));
            outcomes.push(outcome);
        }
        outcomes.sort_by_key(|o| o.index);

        BatchReport {
            outcomes,
            cancelled: cancel.is_cancelled(),
            follow_ups: Vec::new(),
        }
    }

    // ---- create -------------------------------------------------------

    /// Create one file or folder, optionally with contents.
    ///
    /// An existing item at the path makes the new one get a unique name.
    /// Returns the created item on success.
    pub async fn create(
        &self,
        item: &ItemReference,
        contents: Option<Vec<u8>>,
        register_history: bool,
        cancel: &CancellationToken,
    ) -> (OperationOutcome, Option<ItemReference>) {
        let (completed, created) = self.run_create(item, contents, cancel).await;
        let outcome = self
            .conclude(OperationKind::Create, completed, register_history)
            .await;
        (outcome, created)
    }

    async fn run_create(
        &self,
        item: &ItemReference,
        contents: Option<Vec<u8>>,
        cancel: &CancellationToken,
    ) -> (Completed, Option<ItemReference>) {
        if cancel.is_cancelled() {
            return (Completed::status(ReturnStatus::Cancelled), None);
        }
        if !item.has_path() {
            return (Completed::status(ReturnStatus::BadArgument), None);
        }
        if validate_name(item.name(), self.config.alternate_streams_visible).is_err() {
            self.services
                .dialogs
                .notify(Notice::InvalidName {
                    name: item.name().to_string(),
                })
                .await;
            return (Completed::status(ReturnStatus::Failed), None);
        }

        match self
            .services
            .executor
            .create(item, contents, NameCollisionPolicy::GenerateUniqueName)
            .await
        {
            Ok(path) => {
                let created = item.with_path(path);
                let record = OperationRecord::new(
                    OperationKind::Create,
                    vec![item.clone()],
                    vec![created.clone()],
                );
                let completed = Completed {
                    outcome: OperationOutcome::new(ReturnStatus::Success, 1),
                    record: Some(record),
                    done: vec![item.path.clone()],
                };
                (completed, Some(created))
            }
            Err(failure) => {
                warn!(path = %item.path.display(), "{}", failure);
                (Completed::status(failure.status.to_status()), None)
            }
        }
    }

    // ---- delete -------------------------------------------------------

    /// Delete items, to the trash unless `options.permanently` is set or
    /// no trash is available.
    pub async fn delete(
        &self,
        sources: &[ItemReference],
        options: OperationOptions,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let completed = self.run_delete(sources, options, cancel).await;
        self.conclude(OperationKind::Delete, completed, options.register_history)
            .await
    }

    fn wants_delete_confirmation(&self, permanently: bool, can_send_to_trash: bool) -> bool {
        match self.config.delete_confirmation {
            DeleteConfirmationPolicy::Always => true,
            DeleteConfirmationPolicy::PermanentOnly => permanently || !can_send_to_trash,
            DeleteConfirmationPolicy::Never => false,
        }
    }

    async fn run_delete(
        &self,
        sources: &[ItemReference],
        options: OperationOptions,
        cancel: &CancellationToken,
    ) -> Completed {
        if sources.is_empty() {
            return Completed::bare(OperationOutcome::noop());
        }
        if cancel.is_cancelled() {
            return Completed::status(ReturnStatus::Cancelled);
        }

        let snapshot = self.trash.snapshot();
        let (trashed, _live): (Vec<&ItemReference>, Vec<&ItemReference>) = sources
            .iter()
            .partition(|item| item.has_path() && self.trash.is_under_trash(&item.path));
        let can_send_to_trash = self.trash.has_trash() && trashed.is_empty();

        let mut permanently = options.permanently;
        if options.show_dialog && self.wants_delete_confirmation(permanently, can_send_to_trash) {
            let mut items = Vec::with_capacity(sources.len());
            for item in sources {
                let display_name = if trashed.contains(&item) {
                    snapshot.display_name(&item.path).await
                } else {
                    item.name().to_string()
                };
                items.push(DeletePromptItem {
                    path: item.path.clone(),
                    display_name,
                });
            }

            let choice = self
                .services
                .dialogs
                .confirm_delete(DeletePrompt {
                    items,
                    permanently: permanently || !can_send_to_trash,
                    can_toggle_permanence: can_send_to_trash,
                })
                .await;
            match choice {
                DeleteChoice::Cancel => return Completed::status(ReturnStatus::Cancelled),
                DeleteChoice::Proceed { permanently: chosen } => {
                    permanently = chosen || !can_send_to_trash;
                }
            }
        } else {
            permanently |= !can_send_to_trash;
        }

        let batch = Batch::new(
            BatchKind::Delete { permanently },
            sources.iter().cloned().map(BatchItem::alone).collect(),
        );
        let report = self.run_batch(OperationKind::Delete, batch, cancel).await;

        self.forget_pinned(report.completed().map(|o| o.source.path.clone()))
            .await;

        // Permanent deletes cannot be undone and are never recorded.
        let record = (!permanently).then(|| {
            let (sources, destinations) = report.placed_pairs();
            OperationRecord::new(OperationKind::Delete, sources, destinations)
        });

        Completed {
            outcome: report.outcome(),
            record,
            done: report.done(),
        }
    }

    // ---- restore ------------------------------------------------------

    /// Move trashed items back to the given destinations.
    pub async fn restore(
        &self,
        sources: &[ItemReference],
        destinations: &[PathBuf],
        register_history: bool,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let completed = self.run_restore(sources, destinations, cancel).await;
        self.conclude(OperationKind::Restore, completed, register_history)
            .await
    }

    async fn run_restore(
        &self,
        sources: &[ItemReference],
        destinations: &[PathBuf],
        cancel: &CancellationToken,
    ) -> Completed {
        if sources.len() != destinations.len() {
            return Completed::status(ReturnStatus::BadArgument);
        }
        if sources.is_empty() {
            return Completed::bare(OperationOutcome::noop());
        }
        if cancel.is_cancelled() {
            return Completed::status(ReturnStatus::Cancelled);
        }

        let items = sources
            .iter()
            .zip(destinations)
            .map(|(source, destination)| {
                BatchItem::to(source.clone(), destination.clone(), CollisionDecision::None)
            })
            .collect();
        let report = self
            .run_batch(OperationKind::Restore, Batch::new(BatchKind::Restore, items), cancel)
            .await;

        let (sources, destinations) = report.placed_pairs();
        Completed {
            outcome: report.outcome(),
            record: Some(OperationRecord::new(
                OperationKind::Restore,
                sources,
                destinations,
            )),
            done: report.done(),
        }
    }

    // ---- copy / move --------------------------------------------------

    /// Copy each source to its paired destination path.
    ///
    /// The conflict dialog appears whenever a destination exists;
    /// `show_dialog` forces it even when none does.
    pub async fn copy(
        &self,
        sources: &[ItemReference],
        destinations: &[PathBuf],
        show_dialog: impl Into<DialogMode>,
        register_history: bool,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let completed = self
            .run_transfer(OperationKind::Copy, sources, destinations, show_dialog.into(), cancel)
            .await;
        self.conclude(OperationKind::Copy, completed, register_history)
            .await
    }

    /// Move each source to its paired destination path.
    pub async fn move_items(
        &self,
        sources: &[ItemReference],
        destinations: &[PathBuf],
        show_dialog: impl Into<DialogMode>,
        register_history: bool,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let completed = self
            .run_transfer(OperationKind::Move, sources, destinations, show_dialog.into(), cancel)
            .await;
        self.conclude(OperationKind::Move, completed, register_history)
            .await
    }

    async fn run_transfer(
        &self,
        kind: OperationKind,
        sources: &[ItemReference],
        destinations: &[PathBuf],
        mode: DialogMode,
        cancel: &CancellationToken,
    ) -> Completed {
        if sources.len() != destinations.len() {
            return Completed::status(ReturnStatus::BadArgument);
        }
        if sources.is_empty() {
            return Completed::bare(OperationOutcome::noop());
        }
        if cancel.is_cancelled() {
            return Completed::status(ReturnStatus::Cancelled);
        }

        let resolution = match self.resolver.resolve(kind, sources, destinations, mode).await {
            Resolved::Cancelled => {
                debug!(%kind, "Conflict resolution cancelled");
                return Completed::status(ReturnStatus::Cancelled);
            }
            Resolved::Decided(resolution) => resolution,
        };

        self.services.selection.clear_selection();

        let items = sources
            .iter()
            .zip(destinations)
            .zip(&resolution.decisions)
            .map(|((source, destination), decision)| {
                BatchItem::to(source.clone(), destination.clone(), *decision)
            })
            .collect();
        let batch_kind = if kind == OperationKind::Move {
            BatchKind::Move
        } else {
            BatchKind::Copy
        };
        let mut report = self
            .run_batch(kind, Batch::new(batch_kind, items), cancel)
            .await;

        // Names typed into the conflict dialog apply after the transfer.
        for outcome in report.outcomes.iter_mut().filter(|o| o.status.is_done()) {
            let Some(Some(name)) = resolution.custom_names.get(outcome.index) else {
                continue;
            };
            let Some(placed) = outcome.destination.clone() else {
                continue;
            };
            let placed_item = outcome.source.with_path(&placed);
            if placed_item.name() == name.as_str() {
                continue;
            }
            match self
                .services
                .executor
                .rename(&placed_item, name, NameCollisionPolicy::FailIfExists)
                .await
            {
                Ok(renamed) => outcome.destination = Some(renamed),
                Err(failure) => {
                    warn!(path = %placed.display(), "Custom name not applied: {}", failure);
                    report.follow_ups.push(failure.status.to_status());
                }
            }
        }

        if kind == OperationKind::Move {
            self.forget_pinned(report.completed().map(|o| o.source.path.clone()))
                .await;
        }

        let (sources, destinations) = report.placed_pairs();
        Completed {
            outcome: report.outcome(),
            record: Some(OperationRecord::new(kind, sources, destinations)),
            done: report.done(),
        }
    }

    // ---- rename -------------------------------------------------------

    /// Rename an item within its folder.
    ///
    /// An empty name or the current name is a successful no-op.
    pub async fn rename(
        &self,
        source: &ItemReference,
        new_name: &str,
        policy: NameCollisionPolicy,
        register_history: bool,
        show_extension_dialog: bool,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let completed = self
            .run_rename(source, new_name, policy, show_extension_dialog, cancel)
            .await;
        self.conclude(OperationKind::Rename, completed, register_history)
            .await
    }

    async fn run_rename(
        &self,
        source: &ItemReference,
        new_name: &str,
        policy: NameCollisionPolicy,
        show_extension_dialog: bool,
        cancel: &CancellationToken,
    ) -> Completed {
        if new_name.is_empty() || new_name == source.name() {
            return Completed::bare(OperationOutcome::noop());
        }
        if cancel.is_cancelled() {
            return Completed::status(ReturnStatus::Cancelled);
        }
        if validate_name(new_name, self.config.alternate_streams_visible).is_err() {
            self.services
                .dialogs
                .notify(Notice::InvalidName {
                    name: new_name.to_string(),
                })
                .await;
            return Completed::status(ReturnStatus::Failed);
        }

        if source.kind.is_file() && show_extension_dialog && self.config.show_file_extension_warning
        {
            let from = source.extension().map(str::to_lowercase);
            let to = Path::new(new_name)
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase());
            if from != to {
                let answer = self
                    .services
                    .dialogs
                    .confirm(Prompt::ChangeExtension {
                        name: new_name.to_string(),
                        from,
                        to,
                    })
                    .await;
                if answer != Confirmation::Primary {
                    return Completed::status(ReturnStatus::Cancelled);
                }
            }
        }

        match self.services.executor.rename(source, new_name, policy).await {
            Ok(path) => {
                self.forget_pinned([source.path.clone()]).await;
                Completed {
                    outcome: OperationOutcome::new(ReturnStatus::Success, 1),
                    record: Some(OperationRecord::new(
                        OperationKind::Rename,
                        vec![source.clone()],
                        vec![source.with_path(path)],
                    )),
                    done: vec![source.path.clone()],
                }
            }
            Err(failure) => {
                warn!(path = %source.path.display(), "{}", failure);
                Completed::status(failure.status.to_status())
            }
        }
    }

    // ---- shortcuts ----------------------------------------------------

    /// Create a link to each source inside `folder`.
    ///
    /// Links are named from `config.shortcut_template`. A link that cannot
    /// be created offers a retry in `config.shortcut_fallback_dir`.
    pub async fn create_shortcuts(
        &self,
        sources: &[ItemReference],
        folder: &Path,
        register_history: bool,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let completed = self.run_shortcuts_in(sources, folder, cancel).await;
        self.conclude(OperationKind::CreateShortcut, completed, register_history)
            .await
    }

    async fn shortcut_path(
        &self,
        item: &ItemReference,
        folder: &Path,
        claimed: &mut HashSet<PathBuf>,
    ) -> PathBuf {
        let stem = self.config.shortcut_stem(item.name());
        unique_path_in_store(
            self.services.executor.as_ref(),
            folder,
            &stem,
            &self.config.link_extension,
            claimed,
        )
        .await
    }

    async fn run_shortcuts_in(
        &self,
        sources: &[ItemReference],
        folder: &Path,
        cancel: &CancellationToken,
    ) -> Completed {
        if cancel.is_cancelled() {
            return Completed::status(ReturnStatus::Cancelled);
        }

        let mut claimed = HashSet::new();
        let mut pairs = Vec::new();
        for item in sources.iter().filter(|item| item.has_path()) {
            let link = self.shortcut_path(item, folder, &mut claimed).await;
            pairs.push((item.clone(), link));
        }
        self.run_shortcuts(pairs, cancel).await
    }

    async fn run_shortcuts(
        &self,
        pairs: Vec<(ItemReference, PathBuf)>,
        cancel: &CancellationToken,
    ) -> Completed {
        if pairs.is_empty() {
            return Completed::bare(OperationOutcome::noop());
        }

        let items = pairs
            .into_iter()
            .map(|(source, link)| BatchItem::to(source, link, CollisionDecision::GenerateNewName))
            .collect();
        let mut report = self
            .run_batch(
                OperationKind::CreateShortcut,
                Batch::new(BatchKind::CreateLink, items),
                cancel,
            )
            .await;

        let fallback = self.config.shortcut_fallback_dir.clone();
        if let Some(fallback) = fallback.filter(|_| !report.cancelled) {
            let mut claimed = HashSet::new();
            for outcome in report.outcomes.iter_mut() {
                if outcome.status.is_done() || outcome.status == ItemStatus::Skipped {
                    continue;
                }
                let answer = self
                    .services
                    .dialogs
                    .confirm(Prompt::ShortcutFailed {
                        name: outcome.source.name().to_string(),
                        fallback: Some(fallback.clone()),
                    })
                    .await;
                if answer != Confirmation::Primary {
                    continue;
                }

                let link = self
                    .shortcut_path(&outcome.source, &fallback, &mut claimed)
                    .await;
                let retry = Batch::new(
                    BatchKind::CreateLink,
                    vec![BatchItem::to(
                        outcome.source.clone(),
                        link,
                        CollisionDecision::GenerateNewName,
                    )],
                );
                let mut rx = self.services.executor.execute(retry, cancel.clone());
                if let Some(mut retried) = rx.recv().await {
                    retried.index = outcome.index;
                    *outcome = retried;
                }
            }
        }

        let (sources, destinations) = report.placed_pairs();
        Completed {
            outcome: report.outcome(),
            record: Some(OperationRecord::new(
                OperationKind::CreateShortcut,
                sources,
                destinations,
            )),
            done: report.done(),
        }
    }

    // ---- clipboard / drop ---------------------------------------------

    /// Apply a paste or drop of `payload` onto `destination`.
    ///
    /// A destination inside the trash deletes the items. Otherwise copy is
    /// preferred over move, and move over link.
    #[allow(clippy::too_many_arguments)]
    pub async fn dispatch(
        &self,
        flags: OperationFlags,
        payload: &ClipboardPayload,
        destination: &Path,
        show_dialog: bool,
        register_history: bool,
        is_target_executable: bool,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        if self.trash.is_under_trash(destination) {
            if payload.items.is_empty() {
                return OperationOutcome::rejected(ReturnStatus::BadArgument);
            }
            let items = payload
                .items
                .iter()
                .filter(|item| !(item.has_path() && self.trash.is_under_trash(&item.path)))
                .cloned()
                .collect_vec();
            let options = OperationOptions {
                permanently: false,
                show_dialog: true,
                register_history,
            };
            return self.delete(&items, options, cancel).await;
        }

        if flags.contains(OperationFlags::COPY) || flags.is_empty() {
            if payload.items.is_empty() {
                return match &payload.bitmap {
                    Some(png) => {
                        let name = Local::now().format(BITMAP_NAME_FORMAT).to_string();
                        let item = ItemReference::file(destination.join(name));
                        self.create(&item, Some(png.clone()), register_history, cancel)
                            .await
                            .0
                    }
                    None => OperationOutcome::rejected(ReturnStatus::BadArgument),
                };
            }
            let targets = self.drop_targets(&payload.items, destination).await;
            return self
                .copy(&payload.items, &targets, show_dialog, register_history, cancel)
                .await;
        }

        if payload.items.is_empty() {
            return OperationOutcome::rejected(ReturnStatus::BadArgument);
        }

        if flags.contains(OperationFlags::MOVE) {
            let targets = self.drop_targets(&payload.items, destination).await;
            return self
                .move_items(&payload.items, &targets, show_dialog, register_history, cancel)
                .await;
        }

        if flags.contains(OperationFlags::LINK) {
            if is_target_executable {
                return match self
                    .services
                    .launcher
                    .open_with(destination, &payload.items)
                    .await
                {
                    Ok(()) => OperationOutcome::new(ReturnStatus::Success, payload.items.len()),
                    Err(e) => {
                        warn!(executable = %destination.display(), "Failed to open items: {}", e);
                        OperationOutcome::rejected(ReturnStatus::Failed)
                    }
                };
            }
            return self
                .create_shortcuts(&payload.items, destination, register_history, cancel)
                .await;
        }

        OperationOutcome::rejected(ReturnStatus::BadArgument)
    }

    /// Destination paths for dropped items; trashed items land under their
    /// original names.
    async fn drop_targets(&self, items: &[ItemReference], destination: &Path) -> Vec<PathBuf> {
        let snapshot = self.trash.snapshot();
        let mut targets = Vec::with_capacity(items.len());
        for item in items {
            let name = if item.has_path() && self.trash.is_under_trash(&item.path) {
                snapshot
                    .resolve_original_name(&item.path)
                    .await
                    .unwrap_or_else(|| item.name().to_string())
            } else {
                item.name().to_string()
            };
            targets.push(destination.join(name));
        }
        targets
    }

    // ---- requests, undo, redo -----------------------------------------

    /// Run an [`OperationRequest`].
    ///
    /// Renames go to the exact target path and fail if it is taken.
    pub async fn execute(
        &self,
        request: OperationRequest,
        cancel: &CancellationToken,
    ) -> OperationOutcome {
        let kind = request.kind;
        let register_history = request.options.register_history;
        let mode = DialogMode::from(request.options.show_dialog);
        let completed = self.perform(request, mode, cancel).await;
        self.conclude(kind, completed, register_history).await
    }

    /// Run a validated request. `mode` governs the conflict dialog for
    /// copies and moves.
    async fn perform(
        &self,
        request: OperationRequest,
        mode: DialogMode,
        cancel: &CancellationToken,
    ) -> Completed {
        if let Err(e) = request.validate() {
            warn!("Rejected request: {}", e);
            return Completed::status(ReturnStatus::BadArgument);
        }

        let OperationRequest {
            kind,
            sources,
            destinations,
            options,
        } = request;

        match kind {
            OperationKind::Create => self.run_create(&sources[0], None, cancel).await.0,
            OperationKind::Delete => self.run_delete(&sources, options, cancel).await,
            OperationKind::Restore => self.run_restore(&sources, &destinations, cancel).await,
            OperationKind::Copy | OperationKind::Move => {
                self.run_transfer(kind, &sources, &destinations, mode, cancel)
                    .await
            }
            OperationKind::Rename => {
                let Some(name) = destinations[0].file_name() else {
                    return Completed::status(ReturnStatus::BadArgument);
                };
                self.run_rename(
                    &sources[0],
                    &name.to_string_lossy(),
                    NameCollisionPolicy::FailIfExists,
                    options.show_dialog,
                    cancel,
                )
                .await
            }
            OperationKind::CreateShortcut => {
                if cancel.is_cancelled() {
                    return Completed::status(ReturnStatus::Cancelled);
                }
                let pairs = sources
                    .into_iter()
                    .zip(destinations)
                    .filter(|(source, _)| source.has_path())
                    .collect();
                self.run_shortcuts(pairs, cancel).await
            }
        }
    }

    /// Reverse the most recent recorded operation.
    ///
    /// With nothing to undo this is a successful no-op.
    pub async fn undo(&self, cancel: &CancellationToken) -> OperationOutcome {
        let Some(record) = self.history.pop_for_undo().await else {
            return OperationOutcome::noop();
        };
        let Some(inverse) = inverse_request(&record) else {
            warn!("Dropping history entry that cannot be undone: {}", record.description());
            return OperationOutcome::rejected(ReturnStatus::BadArgument);
        };

        debug!("Undo: {}", record.description());
        let kind = inverse.kind;
        let completed = self.perform(inverse, DialogMode::Never, cancel).await;
        let redo = completed.record.as_ref().and_then(reverse_record);
        let remaining = unreversed(&record, &completed.done);
        let outcome = self.conclude(kind, completed, false).await;

        if outcome.is_success() || remaining.is_empty() {
            self.history.push_redo(redo.unwrap_or(record)).await;
        } else {
            // Only the pairs that were not reversed stay undoable.
            self.history.push_undone(remaining).await;
        }
        outcome
    }

    /// Perform the most recently undone operation again.
    ///
    /// With nothing to redo this is a successful no-op.
    pub async fn redo(&self, cancel: &CancellationToken) -> OperationOutcome {
        let Some(record) = self.history.pop_for_redo().await else {
            return OperationOutcome::noop();
        };

        debug!("Redo: {}", record.description());
        let request = forward_request(&record);
        let kind = request.kind;
        let completed = self.perform(request, DialogMode::Never, cancel).await;
        let fresh = completed.record.clone();
        let outcome = self.conclude(kind, completed, false).await;

        match fresh {
            Some(fresh) if outcome.is_success() && !fresh.is_empty() => {
                self.history.push_undone(fresh).await;
            }
            _ if outcome.is_success() => self.history.push_undone(record).await,
            _ => self.history.push_redo(record).await,
        }
        outcome
    }
}
