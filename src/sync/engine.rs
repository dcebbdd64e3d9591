//! The model synchronization engine.
//!
//! Each open model has one entry holding:
//!
//! - a FIFO write lock (`tokio::sync::Mutex`) owning the command stack;
//!   every update, save, undo, redo and external change runs under it, so
//!   writes to one model apply in arrival order against the latest state
//! - the committed snapshot, swapped atomically when a patch commits, so
//!   readers never observe a half-applied patch
//! - the set of subscribed clients
//!
//! Different models never share a lock.
//!
//! A model is discarded when its last subscriber leaves. If a write is
//! running at that point, the write discards it when it finishes.

use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};

use crate::base::{ClientId, ModelFileType, Uri};
use crate::index::WorkspaceIndex;
use crate::model::{CrossModelRoot, ModelElement, ModelParser, NodeKind, TextFormat};

use super::command_stack::{CommandStack, DEFAULT_UNDO_LIMIT};
use super::diff::Patch;
use super::error::{SyncError, SyncResult};
use super::event::{
    EXTERNAL_SOURCE, ModelSavedEvent, ModelUpdatedEvent, Notification, UpdateReason,
};
use super::persistence::ModelPersistence;

/// Where notifications for one client are delivered.
pub type NotificationSink = mpsc::UnboundedSender<Notification>;

/// A proposed model: a tree or its textual form.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ModelPayload {
    Text(String),
    Tree(Value),
    #[serde(skip)]
    Root(CrossModelRoot),
}

impl From<CrossModelRoot> for ModelPayload {
    fn from(root: CrossModelRoot) -> Self {
        ModelPayload::Root(root)
    }
}

impl ModelPayload {
    fn into_root(self, parser: &dyn ModelParser) -> SyncResult<CrossModelRoot> {
        match self {
            ModelPayload::Text(text) => Ok(parser.parse(&text)?),
            ModelPayload::Tree(mut value) => {
                if let Value::Object(map) = &mut value {
                    map.remove("$type");
                }
                Ok(serde_json::from_value(value)?)
            }
            ModelPayload::Root(root) => Ok(root),
        }
    }
}

/// Observable state of an open model. Unopened models have no status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Loaded,
    /// A write is in flight.
    Updating,
}

#[derive(Debug)]
struct Snapshot {
    root: Arc<CrossModelRoot>,
    value: Value,
}

#[derive(Debug)]
struct ModelEntry {
    uri: Uri,
    history: Mutex<CommandStack>,
    committed: RwLock<Option<Arc<Snapshot>>>,
    subscribers: RwLock<IndexSet<ClientId>>,
}

impl ModelEntry {
    fn new(uri: Uri, undo_limit: usize) -> Self {
        Self {
            uri,
            history: Mutex::new(CommandStack::new(undo_limit)),
            committed: RwLock::new(None),
            subscribers: RwLock::new(IndexSet::new()),
        }
    }

    fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.committed.read().clone()
    }
}

/// Owns the canonical state of every open model.
pub struct ModelSyncEngine {
    index: Arc<WorkspaceIndex>,
    persistence: Arc<dyn ModelPersistence>,
    parser: Arc<dyn ModelParser>,
    undo_limit: usize,
    models: RwLock<FxHashMap<Uri, Arc<ModelEntry>>>,
    clients: RwLock<FxHashMap<ClientId, NotificationSink>>,
}

impl std::fmt::Debug for ModelSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelSyncEngine")
            .field("models", &self.models.read().len())
            .field("clients", &self.clients.read().len())
            .field("undo_limit", &self.undo_limit)
            .finish()
    }
}

impl ModelSyncEngine {
    pub fn new(index: Arc<WorkspaceIndex>, persistence: Arc<dyn ModelPersistence>) -> Self {
        Self {
            index,
            persistence,
            parser: Arc::new(TextFormat),
            undo_limit: DEFAULT_UNDO_LIMIT,
            models: RwLock::new(FxHashMap::default()),
            clients: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn ModelParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_undo_limit(mut self, undo_limit: usize) -> Self {
        self.undo_limit = undo_limit;
        self
    }

    pub fn index(&self) -> &Arc<WorkspaceIndex> {
        &self.index
    }

    // ========================================================================
    // CLIENTS
    // ========================================================================

    /// Register where notifications for `client_id` go. Replaces an earlier sink.
    pub fn connect(&self, client_id: impl Into<ClientId>, sink: NotificationSink) {
        let client_id = client_id.into();
        tracing::debug!("client {} connected", client_id);
        self.clients.write().insert(client_id, sink);
    }

    /// Forget a client and drop its subscriptions.
    ///
    /// Writes the client already started are not affected.
    pub async fn disconnect(&self, client_id: &str) {
        self.clients.write().remove(client_id);
        let entries: Vec<Arc<ModelEntry>> = self.models.read().values().cloned().collect();
        for entry in entries {
            let removed = entry.subscribers.write().shift_remove(client_id);
            if removed {
                self.release(&entry).await;
            }
        }
        tracing::debug!("client {} disconnected", client_id);
    }

    pub fn is_connected(&self, client_id: &str) -> bool {
        self.clients.read().contains_key(client_id)
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Open a model for `client_id`, loading it on first open.
    ///
    /// Returns `Ok(None)` when persistence has no such document.
    pub async fn open(&self, uri: &str, client_id: &str) -> SyncResult<Option<CrossModelRoot>> {
        loop {
            let entry = self.entry_or_insert(uri);
            let history = entry.history.lock().await;
            if !self.is_current(&entry) {
                // Evicted while we waited.
                continue;
            }
            if entry.snapshot().is_none() {
                let loaded = match self.load(uri).await {
                    Ok(Some(loaded)) => loaded,
                    Ok(None) => {
                        drop(history);
                        self.evict_if_unused(&entry);
                        return Ok(None);
                    }
                    Err(err) => {
                        tracing::warn!("failed to open {}: {}", uri, err);
                        drop(history);
                        self.evict_if_unused(&entry);
                        return Err(err);
                    }
                };
                let (root, value) = loaded;
                self.commit(&entry, root, value);
                tracing::debug!("loaded {}", uri);
            }
            entry.subscribers.write().insert(Arc::from(client_id));
            return Ok(entry.snapshot().map(|s| s.root.as_ref().clone()));
        }
    }

    /// Unsubscribe `client_id`. The last close discards the in-memory state.
    pub async fn close(&self, uri: &str, client_id: &str) {
        let Some(entry) = self.entry(uri) else {
            return;
        };
        let removed = entry.subscribers.write().shift_remove(client_id);
        if removed {
            self.release(&entry).await;
        }
    }

    /// The committed model, or the indexed document when it is not open.
    pub fn request(&self, uri: &str) -> Option<CrossModelRoot> {
        if let Some(snapshot) = self.entry(uri).and_then(|entry| entry.snapshot()) {
            return Some(snapshot.root.as_ref().clone());
        }
        self.index
            .document(uri)
            .map(|document| document.root().as_ref().clone())
    }

    /// A node or edge of the system diagram stored at `uri`.
    pub fn request_diagram_node(&self, uri: &str, id: &str) -> Option<ModelElement> {
        let root = self.request(uri)?;
        if root.root_node().map(|node| node.kind()) != Some(NodeKind::SystemDiagram) {
            return None;
        }
        root.walk()
            .into_iter()
            .filter(|node| matches!(node.kind(), NodeKind::EntityNode | NodeKind::RelationshipEdge))
            .find(|node| node.id() == Some(id))
            .map(|node| node.to_element())
    }

    pub fn status(&self, uri: &str) -> Option<ModelStatus> {
        let entry = self.entry(uri)?;
        if entry.snapshot().is_none() {
            return None;
        }
        match entry.history.try_lock() {
            Ok(_) => Some(ModelStatus::Loaded),
            Err(_) => Some(ModelStatus::Updating),
        }
    }

    /// Clients subscribed to `uri`, in subscription order.
    pub fn subscribers(&self, uri: &str) -> Vec<ClientId> {
        self.entry(uri)
            .map(|entry| entry.subscribers.read().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Uris of all open models.
    pub fn open_models(&self) -> Vec<Uri> {
        self.models.read().keys().cloned().collect()
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Replace the model with `payload` on behalf of `client_id`.
    ///
    /// Every other subscriber is notified; the originating client is not.
    /// A payload equal to the committed model changes nothing.
    pub async fn update(
        &self,
        uri: &str,
        client_id: &str,
        payload: impl Into<ModelPayload>,
    ) -> SyncResult<CrossModelRoot> {
        let entry = self.open_entry(uri)?;
        let result = self.update_entry(&entry, client_id, payload.into()).await;
        self.settle(&entry).await;
        result
    }

    async fn update_entry(
        &self,
        entry: &Arc<ModelEntry>,
        client_id: &str,
        payload: ModelPayload,
    ) -> SyncResult<CrossModelRoot> {
        let mut history = entry.history.lock().await;
        let current = entry
            .snapshot()
            .ok_or_else(|| SyncError::NotFound(entry.uri.to_string()))?;
        let proposed = self.proposed_root(&entry.uri, payload)?;

        let Some(root) = self.apply_change(entry, &mut history, &current, &proposed)? else {
            tracing::debug!("update of {} by {}: no changes", entry.uri, client_id);
            return Ok(current.root.as_ref().clone());
        };
        self.broadcast_update(entry, &root, client_id, UpdateReason::Updated);
        Ok(root.as_ref().clone())
    }

    /// Persist `payload` as the content of `uri`.
    ///
    /// On success the payload also becomes the committed model and every
    /// subscriber is notified. On failure nothing changes and nobody is
    /// notified.
    pub async fn save(
        &self,
        uri: &str,
        client_id: &str,
        payload: impl Into<ModelPayload>,
    ) -> SyncResult<()> {
        let entry = self.open_entry(uri)?;
        let result = self.save_entry(&entry, client_id, payload.into()).await;
        self.settle(&entry).await;
        result
    }

    async fn save_entry(
        &self,
        entry: &Arc<ModelEntry>,
        client_id: &str,
        payload: ModelPayload,
    ) -> SyncResult<()> {
        let uri = &*entry.uri;
        let mut history = entry.history.lock().await;
        let current = entry
            .snapshot()
            .ok_or_else(|| SyncError::NotFound(uri.to_string()))?;
        let proposed = self.proposed_root(uri, payload)?;
        let text = self.parser.serialize(&proposed)?;

        if let Err(err) = self.persistence.save(uri, &text).await {
            tracing::warn!("failed to save {}: {}", uri, err);
            return Err(err.into());
        }

        let root = match self.apply_change(entry, &mut history, &current, &proposed)? {
            Some(root) => {
                self.broadcast_update(entry, &root, client_id, UpdateReason::Updated);
                root
            }
            None => current.root.clone(),
        };
        let saved = Notification::Saved(ModelSavedEvent {
            uri: uri.to_string(),
            model: root.as_ref().clone(),
            source_client_id: client_id.to_string(),
        });
        self.broadcast(entry, None, &saved);
        tracing::debug!("saved {}", uri);
        Ok(())
    }

    /// Apply a change made outside the engine, e.g. an edit on disk.
    ///
    /// Returns whether the committed model changed. Unopened documents are
    /// only reindexed. Text that does not parse is skipped and the committed
    /// model stays authoritative.
    pub async fn external_change(&self, uri: &str, text: &str) -> SyncResult<bool> {
        let proposed = match self.parser.parse(text) {
            Ok(root) => root,
            Err(err) => {
                tracing::warn!("skipping external change of {}: {}", uri, err);
                return Err(err.into());
            }
        };
        let Some(entry) = self.entry(uri) else {
            self.index.index_document(Arc::from(uri), Arc::new(proposed));
            return Ok(false);
        };
        let result = self.change_entry(&entry, &proposed).await;
        self.settle(&entry).await;
        result
    }

    async fn change_entry(&self, entry: &Arc<ModelEntry>, proposed: &CrossModelRoot) -> SyncResult<bool> {
        let mut history = entry.history.lock().await;
        let Some(current) = entry.snapshot() else {
            return Ok(false);
        };
        match self.apply_change(entry, &mut history, &current, proposed) {
            Ok(Some(root)) => {
                self.broadcast_update(entry, &root, EXTERNAL_SOURCE, UpdateReason::Changed);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => {
                tracing::warn!("skipping external change of {}: {}", entry.uri, err);
                Err(err)
            }
        }
    }

    /// The document at `uri` was deleted outside the engine.
    ///
    /// Subscribers are told, the model is discarded and the document leaves
    /// the index. Returns whether anything was known about `uri`.
    pub async fn external_delete(&self, uri: &str) -> bool {
        let Some(entry) = self.entry(uri) else {
            return self.index.remove_document(uri).is_some();
        };
        let _history = entry.history.lock().await;
        {
            let mut models = self.models.write();
            if models.get(uri).is_some_and(|e| Arc::ptr_eq(e, &entry)) {
                models.remove(uri);
            }
        }
        self.index.remove_document(uri);
        let snapshot = entry.committed.write().take();
        if let Some(snapshot) = snapshot {
            self.broadcast_update(&entry, &snapshot.root, EXTERNAL_SOURCE, UpdateReason::Deleted);
        }
        tracing::debug!("deleted {}", uri);
        true
    }

    /// Revert the last change. `Ok(None)` when there is nothing to undo.
    pub async fn undo(&self, uri: &str, client_id: &str) -> SyncResult<Option<CrossModelRoot>> {
        self.step(uri, client_id, Step::Undo).await
    }

    /// Re-apply the last undone change.
    pub async fn redo(&self, uri: &str, client_id: &str) -> SyncResult<Option<CrossModelRoot>> {
        self.step(uri, client_id, Step::Redo).await
    }

    async fn step(&self, uri: &str, client_id: &str, step: Step) -> SyncResult<Option<CrossModelRoot>> {
        let entry = self.open_entry(uri)?;
        let result = self.step_entry(&entry, client_id, step).await;
        self.settle(&entry).await;
        result
    }

    async fn step_entry(
        &self,
        entry: &Arc<ModelEntry>,
        client_id: &str,
        step: Step,
    ) -> SyncResult<Option<CrossModelRoot>> {
        let uri = &*entry.uri;
        let mut history = entry.history.lock().await;
        let current = entry
            .snapshot()
            .ok_or_else(|| SyncError::NotFound(uri.to_string()))?;
        let accept = |next: Value| -> SyncResult<Arc<CrossModelRoot>> {
            let root: CrossModelRoot = serde_json::from_value(next.clone())?;
            Ok(self.commit(entry, root, next))
        };
        let root = match step {
            Step::Undo => history.undo(&current.value, accept)?,
            Step::Redo => history.redo(&current.value, accept)?,
        };
        let Some(root) = root else {
            return Ok(None);
        };
        tracing::debug!("{:?} of {} by {}", step, uri, client_id);
        self.broadcast_update(entry, &root, client_id, UpdateReason::Updated);
        Ok(Some(root.as_ref().clone()))
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    /// Decode a payload for `uri`. A suffix naming a model kind pins the
    /// kind of the top-level element.
    fn proposed_root(&self, uri: &str, payload: ModelPayload) -> SyncResult<CrossModelRoot> {
        let root = payload.into_root(self.parser.as_ref())?;
        let expected = ModelFileType::from_uri(uri).and_then(NodeKind::for_file_type);
        if let (Some(expected), Some(node)) = (expected, root.root_node()) {
            if node.kind() != expected {
                return Err(SyncError::InvalidModel(format!(
                    "{uri} holds a {expected}, not a {}",
                    node.kind()
                )));
            }
        }
        Ok(root)
    }

    fn entry(&self, uri: &str) -> Option<Arc<ModelEntry>> {
        self.models.read().get(uri).cloned()
    }

    fn open_entry(&self, uri: &str) -> SyncResult<Arc<ModelEntry>> {
        self.entry(uri)
            .ok_or_else(|| SyncError::NotFound(uri.to_string()))
    }

    fn entry_or_insert(&self, uri: &str) -> Arc<ModelEntry> {
        if let Some(entry) = self.entry(uri) {
            return entry;
        }
        self.models
            .write()
            .entry(Arc::from(uri))
            .or_insert_with_key(|uri| Arc::new(ModelEntry::new(uri.clone(), self.undo_limit)))
            .clone()
    }

    fn is_current(&self, entry: &Arc<ModelEntry>) -> bool {
        self.models
            .read()
            .get(&entry.uri)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
    }

    /// Discard a model nobody is subscribed to and no write is using.
    fn evict_if_unused(&self, entry: &Arc<ModelEntry>) -> bool {
        let mut models = self.models.write();
        if !entry.subscribers.read().is_empty() || entry.history.try_lock().is_err() {
            return false;
        }
        if !models
            .get(&entry.uri)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
        {
            return false;
        }
        models.remove(&entry.uri);
        true
    }

    /// Evict an unused model and point the index back at the persisted document.
    async fn release(&self, entry: &Arc<ModelEntry>) {
        if !self.evict_if_unused(entry) {
            return;
        }
        tracing::debug!("evicted {}", entry.uri);
        let reloaded = self.load(&entry.uri).await;

        // A reopen during the reload owns the index entry from then on.
        let models = self.models.read();
        if models.contains_key(&entry.uri) {
            tracing::debug!("{} reopened while reloading, index left as is", entry.uri);
            return;
        }
        match reloaded {
            Ok(Some((root, _))) => {
                self.index.index_document(entry.uri.clone(), Arc::new(root));
            }
            Ok(None) => {
                self.index.remove_document(&entry.uri);
            }
            Err(err) => {
                tracing::warn!("failed to reload {} after close: {}", entry.uri, err);
            }
        }
    }

    /// Release a model whose last subscriber left while a write was running.
    async fn settle(&self, entry: &Arc<ModelEntry>) {
        if entry.subscribers.read().is_empty() {
            self.release(entry).await;
        }
    }

    async fn load(&self, uri: &str) -> SyncResult<Option<(CrossModelRoot, Value)>> {
        let Some(text) = self.persistence.load(uri).await? else {
            return Ok(None);
        };
        let root = self.parser.parse(&text)?;
        let value = serde_json::to_value(&root)?;
        Ok(Some((root, value)))
    }

    /// Diff `proposed` against `current` and execute the patch, if any.
    fn apply_change(
        &self,
        entry: &ModelEntry,
        history: &mut CommandStack,
        current: &Snapshot,
        proposed: &CrossModelRoot,
    ) -> SyncResult<Option<Arc<CrossModelRoot>>> {
        let proposed_value = serde_json::to_value(proposed)?;
        let Some(patch) = Patch::between(&current.value, &proposed_value) else {
            return Ok(None);
        };
        let operations = patch.len();
        let root = history.execute(
            &current.value,
            patch,
            |next: Value| -> SyncResult<Arc<CrossModelRoot>> {
                let root: CrossModelRoot = serde_json::from_value(next.clone())?;
                Ok(self.commit(entry, root, next))
            },
        )?;
        tracing::debug!("{}: committed {} operations", entry.uri, operations);
        Ok(Some(root))
    }

    /// Publish a new committed state to readers and the index.
    fn commit(&self, entry: &ModelEntry, root: CrossModelRoot, value: Value) -> Arc<CrossModelRoot> {
        let root = Arc::new(root);
        *entry.committed.write() = Some(Arc::new(Snapshot {
            root: root.clone(),
            value,
        }));
        self.index.index_document(entry.uri.clone(), root.clone());
        root
    }

    fn broadcast_update(
        &self,
        entry: &ModelEntry,
        root: &CrossModelRoot,
        source_client_id: &str,
        reason: UpdateReason,
    ) {
        let notification = Notification::Updated(ModelUpdatedEvent {
            uri: entry.uri.to_string(),
            model: root.clone(),
            source_client_id: source_client_id.to_string(),
            reason,
        });
        // Client-originated updates are not echoed back to their source.
        let exclude = (reason == UpdateReason::Updated).then_some(source_client_id);
        self.broadcast(entry, exclude, &notification);
    }

    fn broadcast(&self, entry: &ModelEntry, exclude: Option<&str>, notification: &Notification) {
        let subscribers: Vec<ClientId> = entry
            .subscribers
            .read()
            .iter()
            .filter(|&client| Some(&**client) != exclude)
            .cloned()
            .collect();
        let clients = self.clients.read();
        for client in subscribers {
            match clients.get(&client) {
                Some(sink) => {
                    if sink.send(notification.clone()).is_err() {
                        tracing::trace!("client {} no longer receives notifications", client);
                    }
                }
                None => tracing::trace!("client {} has no notification sink", client),
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Undo,
    Redo,
}
