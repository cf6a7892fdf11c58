//! In-memory collaborators for coordinator tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use stowage_core::{
    CollisionDecision, DeleteConfirmationPolicy, EngineConfig, ItemKind, ItemReference, ItemStatus,
    NameCollisionPolicy,
};
use stowage_ops::{
    Batch, BatchKind, Confirmation, ConfirmationDialog, ConflictDialog, ConflictPrompt,
    ConflictResponse, Coordinator, DeleteChoice, DeletePrompt, ItemOutcome, Notice, PinnedIndex,
    Prompt, ResolvedItem, Services, StorageExecutor, StorageFailure, TrashEntry, TrashError,
    TrashStore, TrashUsage, unique_path,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const TRASH_ROOT: &str = "/trash";

#[derive(Default)]
struct State {
    entries: BTreeMap<PathBuf, ItemKind>,
    trash: Vec<TrashEntry>,
    next_trash_id: usize,
}

/// A fake store: a map of paths plus a trash, with call counters.
pub struct MemoryStore {
    state: Mutex<State>,
    failures: Mutex<HashMap<PathBuf, ItemStatus>>,
    cancel_after: Mutex<Option<usize>>,
    has_trash: bool,
    pub execute_calls: AtomicUsize,
    pub rename_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Self::build(true)
    }

    pub fn without_trash() -> Arc<Self> {
        Self::build(false)
    }

    fn build(has_trash: bool) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            failures: Mutex::new(HashMap::new()),
            cancel_after: Mutex::new(None),
            has_trash,
            execute_calls: AtomicUsize::new(0),
            rename_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        })
    }

    pub fn add_file(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .entries
            .insert(PathBuf::from(path), ItemKind::File);
    }

    pub fn add_dir(&self, path: &str) {
        self.state
            .lock()
            .unwrap()
            .entries
            .insert(PathBuf::from(path), ItemKind::Directory);
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.state.lock().unwrap().entries.contains_key(path.as_ref())
    }

    pub fn trash_entries(&self) -> Vec<TrashEntry> {
        self.state.lock().unwrap().trash.clone()
    }

    /// Make every operation on `path` fail with `status`.
    pub fn fail_on(&self, path: &str, status: ItemStatus) {
        self.failures
            .lock()
            .unwrap()
            .insert(PathBuf::from(path), status);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Cancel the batch token after `n` items have been processed.
    pub fn cancel_after(&self, n: usize) {
        *self.cancel_after.lock().unwrap() = Some(n);
    }

    pub fn executions(&self) -> usize {
        self.execute_calls.load(Ordering::SeqCst)
    }

    fn failure_for(&self, path: &Path) -> Option<StorageFailure> {
        self.failures
            .lock()
            .unwrap()
            .get(path)
            .map(|status| StorageFailure::new(*status, "injected failure"))
    }

    fn run_item(
        &self,
        kind: BatchKind,
        source: &ItemReference,
        destination: Option<&Path>,
        decision: CollisionDecision,
    ) -> Result<Option<PathBuf>, StorageFailure> {
        if let Some(failure) = self.failure_for(&source.path) {
            return Err(failure);
        }
        let mut state = self.state.lock().unwrap();

        if let BatchKind::Delete { permanently } = kind {
            let Some(item_kind) = state.entries.remove(&source.path) else {
                return Err(StorageFailure::new(ItemStatus::NotFound, "missing"));
            };
            // Removes children of directories as well.
            state.entries.retain(|p, _| !p.starts_with(&source.path));
            if permanently {
                state.trash.retain(|e| e.trash_path != source.path);
                return Ok(None);
            }
            state.next_trash_id += 1;
            let trash_path = Path::new(TRASH_ROOT).join(format!("$R{}", state.next_trash_id));
            state.entries.insert(trash_path.clone(), item_kind);
            state.trash.push(TrashEntry {
                trash_path: trash_path.clone(),
                original_path: source.path.clone(),
                deleted_at: None,
            });
            return Ok(Some(trash_path));
        }

        let destination = destination
            .ok_or_else(|| StorageFailure::new(ItemStatus::Generic, "no destination"))?;
        let Some(&item_kind) = state.entries.get(&source.path) else {
            return Err(StorageFailure::new(ItemStatus::NotFound, "missing"));
        };
        if decision == CollisionDecision::Skip {
            return Ok(None);
        }

        let exists = |p: &Path| state.entries.contains_key(p);
        let target = if source.path == destination {
            if kind == BatchKind::Move {
                return Ok(None);
            }
            unique_path(destination, exists)
        } else if exists(destination) {
            match decision {
                CollisionDecision::GenerateNewName => unique_path(destination, exists),
                CollisionDecision::ReplaceExisting => destination.to_path_buf(),
                _ => return Err(StorageFailure::new(ItemStatus::AlreadyExists, "exists")),
            }
        } else {
            destination.to_path_buf()
        };

        match kind {
            BatchKind::Copy | BatchKind::CreateLink => {
                state.entries.insert(target.clone(), item_kind);
            }
            BatchKind::Move => {
                state.entries.remove(&source.path);
                state.entries.insert(target.clone(), item_kind);
            }
            BatchKind::Restore => {
                state.entries.remove(&source.path);
                state.trash.retain(|e| e.trash_path != source.path);
                state.entries.insert(target.clone(), item_kind);
            }
            BatchKind::Delete { .. } => unreachable!(),
        }
        Ok(Some(target))
    }
}

impl StorageExecutor for MemoryStore {
    fn exists<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, bool> {
        let exists = self.contains(path);
        Box::pin(async move { exists })
    }

    fn execute(&self, batch: Batch, cancel: CancellationToken) -> mpsc::Receiver<ItemOutcome> {
        self.execute_calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(batch.len().max(1));
        let cancel_after = *self.cancel_after.lock().unwrap();

        for (index, item) in batch.items.into_iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            let outcome = match self.run_item(
                batch.kind,
                &item.source,
                item.destination.as_deref(),
                item.decision,
            ) {
                Ok(Some(destination)) => {
                    ItemOutcome::done(index, item.source, Some(destination), 0)
                }
                Ok(None) if matches!(batch.kind, BatchKind::Delete { .. }) => {
                    ItemOutcome::done(index, item.source, None, 0)
                }
                Ok(None) => ItemOutcome::skipped(index, item.source),
                Err(failure) => ItemOutcome::failed(index, item.source, failure),
            };
            let _ = tx.try_send(outcome);
            if cancel_after == Some(index + 1) {
                cancel.cancel();
            }
        }
        rx
    }

    fn create<'a>(
        &'a self,
        item: &'a ItemReference,
        _contents: Option<Vec<u8>>,
        policy: NameCollisionPolicy,
    ) -> BoxFuture<'a, Result<PathBuf, StorageFailure>> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let result = (|| {
            if let Some(failure) = self.failure_for(&item.path) {
                return Err(failure);
            }
            let mut state = self.state.lock().unwrap();
            let target = if state.entries.contains_key(&item.path) {
                match policy {
                    NameCollisionPolicy::GenerateUniqueName => {
                        unique_path(&item.path, |p| state.entries.contains_key(p))
                    }
                    NameCollisionPolicy::ReplaceExisting => item.path.clone(),
                    NameCollisionPolicy::FailIfExists => {
                        return Err(StorageFailure::new(ItemStatus::AlreadyExists, "exists"));
                    }
                }
            } else {
                item.path.clone()
            };
            state.entries.insert(target.clone(), item.kind);
            Ok(target)
        })();
        Box::pin(async move { result })
    }

    fn rename<'a>(
        &'a self,
        item: &'a ItemReference,
        new_name: &'a str,
        policy: NameCollisionPolicy,
    ) -> BoxFuture<'a, Result<PathBuf, StorageFailure>> {
        self.rename_calls.fetch_add(1, Ordering::SeqCst);
        let result = (|| {
            if let Some(failure) = self.failure_for(&item.path) {
                return Err(failure);
            }
            let mut state = self.state.lock().unwrap();
            let Some(kind) = state.entries.remove(&item.path) else {
                return Err(StorageFailure::new(ItemStatus::NotFound, "missing"));
            };
            let target = item.path.with_file_name(new_name);
            let target = if state.entries.contains_key(&target) {
                match policy {
                    NameCollisionPolicy::GenerateUniqueName => {
                        unique_path(&target, |p| state.entries.contains_key(p))
                    }
                    NameCollisionPolicy::ReplaceExisting => target,
                    NameCollisionPolicy::FailIfExists => {
                        state.entries.insert(item.path.clone(), kind);
                        return Err(StorageFailure::new(ItemStatus::AlreadyExists, "exists"));
                    }
                }
            } else {
                target
            };
            state.entries.insert(target.clone(), kind);
            Ok(target)
        })();
        Box::pin(async move { result })
    }
}

impl TrashStore for MemoryStore {
    fn has_trash(&self) -> bool {
        self.has_trash
    }

    fn is_under_trash(&self, path: &Path) -> bool {
        path.starts_with(TRASH_ROOT)
    }

    fn enumerate(&self) -> BoxFuture<'_, Result<Vec<TrashEntry>, TrashError>> {
        let entries = self.trash_entries();
        Box::pin(async move { Ok(entries) })
    }

    fn usage(&self) -> BoxFuture<'_, Result<TrashUsage, TrashError>> {
        let items = self.trash_entries().len();
        Box::pin(async move { Ok(TrashUsage { items, bytes: 0 }) })
    }

    fn send_to_trash<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, Result<PathBuf, TrashError>> {
        let result = self
            .run_item(
                BatchKind::Delete { permanently: false },
                &ItemReference::file(path),
                None,
                CollisionDecision::None,
            )
            .map_err(|f| TrashError::Backend { message: f.message })
            .and_then(|p| p.ok_or(TrashError::Unavailable));
        Box::pin(async move { result })
    }

    fn restore<'a>(
        &'a self,
        trash_path: &'a Path,
        destination: &'a Path,
    ) -> BoxFuture<'a, Result<(), TrashError>> {
        let result = self
            .run_item(
                BatchKind::Restore,
                &ItemReference::file(trash_path),
                Some(destination),
                CollisionDecision::None,
            )
            .map(|_| ())
            .map_err(|f| TrashError::Backend { message: f.message });
        Box::pin(async move { result })
    }
}

/// How the fake conflict dialog answers.
#[derive(Clone)]
pub enum ConflictScript {
    /// Keep the pre-selected decisions.
    Accept,
    Cancel,
    /// Explicit answers; sources not listed are left out of the response.
    Answer(Vec<(PathBuf, CollisionDecision, Option<String>)>),
}

pub struct ScriptedConflicts {
    script: Mutex<ConflictScript>,
    pub calls: AtomicUsize,
    pub last_prompt: Mutex<Option<ConflictPrompt>>,
}

impl ScriptedConflicts {
    pub fn new(script: ConflictScript) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConflictDialog for ScriptedConflicts {
    fn resolve<'a>(&'a self, prompt: ConflictPrompt) -> BoxFuture<'a, ConflictResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let response = match self.script.lock().unwrap().clone() {
            ConflictScript::Accept => ConflictResponse {
                cancelled: false,
                items: prompt
                    .items
                    .iter()
                    .map(|item| ResolvedItem {
                        source: item.source.clone(),
                        decision: item.decision,
                        custom_name: None,
                    })
                    .collect(),
            },
            ConflictScript::Cancel => ConflictResponse::cancel(),
            ConflictScript::Answer(answers) => ConflictResponse {
                cancelled: false,
                items: answers
                    .into_iter()
                    .map(|(source, decision, custom_name)| ResolvedItem {
                        source,
                        decision,
                        custom_name,
                    })
                    .collect(),
            },
        };
        *self.last_prompt.lock().unwrap() = Some(prompt);
        Box::pin(async move { response })
    }
}

pub struct ScriptedConfirmations {
    /// `None` proceeds with the permanence offered in the prompt.
    pub delete_choice: Mutex<Option<DeleteChoice>>,
    pub answer: Mutex<Confirmation>,
    pub delete_prompts: Mutex<Vec<DeletePrompt>>,
    pub prompts: Mutex<Vec<Prompt>>,
    pub notices: Mutex<Vec<Notice>>,
}

impl ScriptedConfirmations {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delete_choice: Mutex::new(None),
            answer: Mutex::new(Confirmation::Primary),
            delete_prompts: Mutex::new(Vec::new()),
            prompts: Mutex::new(Vec::new()),
            notices: Mutex::new(Vec::new()),
        })
    }

    pub fn delete_prompt_count(&self) -> usize {
        self.delete_prompts.lock().unwrap().len()
    }
}

impl ConfirmationDialog for ScriptedConfirmations {
    fn confirm_delete<'a>(&'a self, prompt: DeletePrompt) -> BoxFuture<'a, DeleteChoice> {
        let choice = self
            .delete_choice
            .lock()
            .unwrap()
            .unwrap_or(DeleteChoice::Proceed {
                permanently: prompt.permanently,
            });
        self.delete_prompts.lock().unwrap().push(prompt);
        Box::pin(async move { choice })
    }

    fn confirm<'a>(&'a self, prompt: Prompt) -> BoxFuture<'a, Confirmation> {
        let answer = *self.answer.lock().unwrap();
        self.prompts.lock().unwrap().push(prompt);
        Box::pin(async move { answer })
    }

    fn notify<'a>(&'a self, notice: Notice) -> BoxFuture<'a, ()> {
        self.notices.lock().unwrap().push(notice);
        Box::pin(async {})
    }
}

#[derive(Default)]
pub struct RecordingPinned {
    pub removed: Mutex<Vec<PathBuf>>,
}

impl PinnedIndex for RecordingPinned {
    fn remove_entry<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<()>> {
        self.removed.lock().unwrap().push(path.to_path_buf());
        Box::pin(async { Ok(()) })
    }
}

/// A coordinator wired to in-memory fakes.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub conflicts: Arc<ScriptedConflicts>,
    pub dialogs: Arc<ScriptedConfirmations>,
    pub pinned: Arc<RecordingPinned>,
    pub coordinator: Coordinator,
}

impl Harness {
    pub fn new(store: Arc<MemoryStore>, script: ConflictScript) -> Self {
        Self::with_config(store, script, test_config())
    }

    pub fn with_config(
        store: Arc<MemoryStore>,
        script: ConflictScript,
        config: EngineConfig,
    ) -> Self {
        let conflicts = ScriptedConflicts::new(script);
        let dialogs = ScriptedConfirmations::new();
        let pinned = Arc::new(RecordingPinned::default());
        let services = Services::new(
            store.clone(),
            store.clone(),
            conflicts.clone(),
            dialogs.clone(),
        )
        .with_pinned(pinned.clone());
        let coordinator = Coordinator::new(services, config);
        Self {
            store,
            conflicts,
            dialogs,
            pinned,
            coordinator,
        }
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig::builder()
        .delete_confirmation(DeleteConfirmationPolicy::PermanentOnly)
        .shortcut_fallback_dir(Some(PathBuf::from("/fallback")))
        .link_extension(".lnk")
        .build()
        .unwrap()
}

pub fn files(paths: &[&str]) -> Vec<ItemReference> {
    paths.iter().map(|p| ItemReference::file(*p)).collect()
}

pub fn paths(paths: &[&str]) -> Vec<PathBuf> {
    paths.iter().map(PathBuf::from).collect()
}
