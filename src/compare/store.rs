//! CompareStore - per-tab compare selection with durable mirroring
//!
//! One store is created per tab and handed to whatever needs it (API state,
//! REPL, bar, toggles). Stores never share memory; they coordinate only
//! through the durable key:
//!
//! 1. a mutation updates the in-memory [`SelectionSet`]
//! 2. the full set is written to durable storage in canonical form
//! 3. same-tab subscribers are notified with the new sequence
//! 4. other tabs receive a storage event, re-read the key and adopt it
//!
//! Durable storage is the source of truth between tabs: a notification only
//! says that the key changed, the value adopted is the one read afterwards.
//! That keeps tabs converging on the last write even when notifications
//! are delivered out of order.
//!
//! Storage failures are logged and never surface to callers; the in-memory
//! selection stays authoritative for the rest of the session.

use super::echo::{EchoGuard, DEFAULT_ECHO_WINDOW_MS};
use super::selection::{compare_href, SelectionSet};
use crate::config::AppConfig;
use crate::error::StorageError;
use crate::storage::{DurableStorage, StorageEvent};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Default durable key for the compare list
pub const DEFAULT_STORAGE_KEY: &str = "emuwtf.compare";

/// Capacity of the async update channel
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Why the selection changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCause {
    /// Mutation made through this tab
    Local,
    /// Value adopted from another tab's write
    Remote,
}

/// Same-tab change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionChanged {
    /// Tab that observed the change
    pub tab: String,
    /// Per-tab change counter; a higher version is a newer selection
    pub version: u64,
    /// Selection after the change
    pub ids: Vec<String>,
    pub cause: ChangeCause,
}

/// Subscriber callback; returning `false` unsubscribes it
type Listener = Arc<dyn Fn(&SelectionChanged) -> bool + Send + Sync>;

/// Settings for one store instance
#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// Tab name, for logs and change events
    pub tab: String,
    /// Durable key shared by all tabs
    pub storage_key: String,
    /// How long an own write is expected to echo back
    pub echo_window: Duration,
}

impl CompareOptions {
    pub fn new(tab: impl Into<String>) -> Self {
        Self {
            tab: tab.into(),
            ..Self::default()
        }
    }

    /// Options for `tab` taken from the application config
    pub fn from_config(tab: impl Into<String>, config: &AppConfig) -> Self {
        Self {
            tab: tab.into(),
            storage_key: config.storage.key.clone(),
            echo_window: Duration::from_millis(config.compare.echo_window_ms),
        }
    }
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            tab: "main".to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            echo_window: Duration::from_millis(DEFAULT_ECHO_WINDOW_MS),
        }
    }
}

struct Inner {
    /// `None` until first use
    selection: Mutex<Option<SelectionSet>>,
    /// Bumped under the selection lock on every change
    version: AtomicU64,
    echo: Mutex<EchoGuard>,
    listeners: RwLock<Vec<(usize, Listener)>>,
    next_listener: AtomicUsize,
    updates: broadcast::Sender<SelectionChanged>,
}

/// Compare selection for one tab
///
/// Cheap to clone; clones share the same tab state. Mutations write to
/// durable storage synchronously, so async callers should run them on a
/// blocking thread.
#[derive(Clone)]
pub struct CompareStore {
    options: Arc<CompareOptions>,
    storage: Arc<dyn DurableStorage>,
    inner: Arc<Inner>,
}

impl CompareStore {
    /// Create a store; the selection is loaded lazily on first use
    pub fn new(storage: Arc<dyn DurableStorage>, options: CompareOptions) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let echo = EchoGuard::new(options.echo_window);

        Self {
            options: Arc::new(options),
            storage,
            inner: Arc::new(Inner {
                selection: Mutex::new(None),
                version: AtomicU64::new(0),
                echo: Mutex::new(echo),
                listeners: RwLock::new(Vec::new()),
                next_listener: AtomicUsize::new(0),
                updates,
            }),
        }
    }

    pub fn tab(&self) -> &str {
        &self.options.tab
    }

    pub fn storage_key(&self) -> &str {
        &self.options.storage_key
    }

    /// Load the selection from durable storage if not loaded yet
    ///
    /// Missing, unreadable or malformed records yield an empty selection.
    pub fn initialize(&self) -> Vec<String> {
        let mut slot = self.inner.selection.lock();
        self.loaded(&mut slot).to_vec()
    }

    /// Append `id` unless already selected
    pub fn add(&self, id: &str) {
        self.mutate("add", |set| {
            let changed = set.add(id);
            (changed, ())
        });
    }

    /// Remove `id` if selected
    pub fn remove(&self, id: &str) {
        self.mutate("remove", |set| {
            let changed = set.remove(id);
            (changed, ())
        });
    }

    /// Flip membership of `id`; returns whether it is selected afterwards
    pub fn toggle(&self, id: &str) -> bool {
        self.mutate("toggle", |set| {
            let before = set.len();
            let selected = set.toggle(id);
            (set.len() != before, selected)
        })
    }

    /// Remove every id
    pub fn clear(&self) {
        self.mutate("clear", |set| {
            let changed = set.clear();
            (changed, ())
        });
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.read(|set| set.contains(id))
    }

    /// Current selection, in insertion order
    pub fn selection(&self) -> Vec<String> {
        self.read(SelectionSet::to_vec)
    }

    pub fn len(&self) -> usize {
        self.read(SelectionSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.read(SelectionSet::is_empty)
    }

    /// Comma-joined ids for the `ids` query parameter
    pub fn serialize(&self) -> String {
        self.read(SelectionSet::serialize)
    }

    /// Link to the comparison view for the current selection
    pub fn compare_href(&self) -> String {
        self.read(|set| compare_href(set.ids()))
    }

    /// Register a same-tab observer
    ///
    /// Returns an id for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, listener: F) -> usize
    where
        F: Fn(&SelectionChanged) + Send + Sync + 'static,
    {
        self.subscribe_while(move |event| {
            listener(event);
            true
        })
    }

    /// Register an observer that stays subscribed while it returns `true`
    pub fn subscribe_while<F>(&self, listener: F) -> usize
    where
        F: Fn(&SelectionChanged) -> bool + Send + Sync + 'static,
    {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove an observer; returns whether it was registered
    pub fn unsubscribe(&self, id: usize) -> bool {
        let mut listeners = self.inner.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Async stream of same-tab change notifications
    pub fn updates(&self) -> broadcast::Receiver<SelectionChanged> {
        self.inner.updates.subscribe()
    }

    /// Apply a storage change notification
    ///
    /// Returns `true` when a new selection was adopted. The echo of this
    /// tab's own write is skipped while it still matches the selection;
    /// anything else re-reads the durable key and adopts its value when it
    /// differs from the selection.
    pub fn handle_storage_event(&self, event: &StorageEvent) -> bool {
        if event.key != self.options.storage_key {
            return false;
        }

        let (adopted, version) = {
            let mut slot = self.inner.selection.lock();
            let set = self.loaded(&mut slot);

            let payload = event.new_value.as_deref();
            if self.inner.echo.lock().is_echo(payload) && Self::encodes_to(set, payload) {
                trace!(tab = %self.options.tab, "Own write echo suppressed");
                return false;
            }

            let incoming = match self.storage.get_item(&self.options.storage_key) {
                Ok(Some(raw)) => self.decode_or_empty(&raw),
                Ok(None) => SelectionSet::new(),
                Err(e) => {
                    warn!(
                        tab = %self.options.tab,
                        "Failed to re-read compare selection, using notified value: {}", e
                    );
                    match payload {
                        Some(raw) => self.decode_or_empty(raw),
                        None => SelectionSet::new(),
                    }
                }
            };

            if *set == incoming {
                trace!(tab = %self.options.tab, "Stored selection matches current one");
                return false;
            }

            *set = incoming;
            (set.to_vec(), self.next_version())
        };

        debug!(
            tab = %self.options.tab,
            count = adopted.len(),
            "Adopted compare selection from another tab"
        );
        self.notify(ChangeCause::Remote, version, adopted);
        true
    }

    /// Follow storage changes made by other tabs
    ///
    /// Spawns a task that applies every notification of the compare key on
    /// the blocking pool. Must be called from within a Tokio runtime.
    pub fn spawn_storage_sync(&self) -> Result<JoinHandle<()>, StorageError> {
        let mut watch = self.storage.watch(&self.options.storage_key)?;
        let store = self.clone();

        Ok(tokio::spawn(async move {
            debug!(tab = %store.options.tab, "Compare storage sync started");
            while let Some(event) = watch.recv().await {
                let worker = store.clone();
                let applied =
                    tokio::task::spawn_blocking(move || worker.handle_storage_event(&event)).await;
                if let Err(e) = applied {
                    warn!(tab = %store.options.tab, "Storage event handler failed: {}", e);
                }
            }
            debug!(tab = %store.options.tab, "Compare storage sync stopped");
        }))
    }

    fn read<R>(&self, f: impl FnOnce(&SelectionSet) -> R) -> R {
        let mut slot = self.inner.selection.lock();
        f(self.loaded(&mut slot))
    }

    /// Run a mutation, persist the result and notify on change
    fn mutate<R>(&self, op: &'static str, f: impl FnOnce(&mut SelectionSet) -> (bool, R)) -> R {
        let (changed, result, ids, version) = {
            let mut slot = self.inner.selection.lock();
            let set = self.loaded(&mut slot);
            let (changed, result) = f(set);
            // Persist under the lock so durable writes keep call order
            self.persist(set);
            let version = if changed { self.next_version() } else { 0 };
            (changed, result, set.to_vec(), version)
        };

        trace!(tab = %self.options.tab, op, changed, count = ids.len(), "Compare mutation");
        if changed {
            self.notify(ChangeCause::Local, version, ids);
        }
        result
    }

    /// Must be called with the selection lock held
    fn next_version(&self) -> u64 {
        self.inner.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn encodes_to(set: &SelectionSet, payload: Option<&str>) -> bool {
        match (set.encode(), payload) {
            (Ok(encoded), Some(payload)) => encoded == payload,
            _ => false,
        }
    }

    fn loaded<'a>(&self, slot: &'a mut Option<SelectionSet>) -> &'a mut SelectionSet {
        slot.get_or_insert_with(|| self.read_durable())
    }

    fn read_durable(&self) -> SelectionSet {
        match self.storage.get_item(&self.options.storage_key) {
            Ok(Some(raw)) => self.decode_or_empty(&raw),
            Ok(None) => SelectionSet::new(),
            Err(e) => {
                warn!(
                    tab = %self.options.tab,
                    "Failed to read compare selection, starting empty: {}", e
                );
                SelectionSet::new()
            }
        }
    }

    fn decode_or_empty(&self, raw: &str) -> SelectionSet {
        SelectionSet::decode(raw).unwrap_or_else(|e| {
            warn!(tab = %self.options.tab, "Ignoring malformed compare record: {}", e);
            SelectionSet::new()
        })
    }

    fn persist(&self, set: &SelectionSet) {
        let payload = match set.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(tab = %self.options.tab, "Failed to encode compare selection, not persisting: {}", e);
                return;
            }
        };

        match self.storage.set_item(&self.options.storage_key, &payload) {
            Ok(()) => self.inner.echo.lock().record_write(payload),
            Err(e) => warn!(
                tab = %self.options.tab,
                "Failed to persist compare selection, keeping it in memory only: {}", e
            ),
        }
    }

    fn notify(&self, cause: ChangeCause, version: u64, ids: Vec<String>) {
        let event = SelectionChanged {
            tab: self.options.tab.clone(),
            version,
            ids,
            cause,
        };

        // Snapshot so listeners may call back into the store
        let listeners: Vec<(usize, Listener)> = self.inner.listeners.read().clone();
        let finished: Vec<usize> = listeners
            .iter()
            .filter(|(_, listener)| !listener(&event))
            .map(|(id, _)| *id)
            .collect();

        if !finished.is_empty() {
            self.inner
                .listeners
                .write()
                .retain(|(id, _)| !finished.contains(id));
        }

        // Best-effort broadcast (ignore if no receivers)
        let _ = self.inner.updates.send(event);
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }
}
