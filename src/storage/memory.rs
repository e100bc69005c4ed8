//! In-process storage backend
//!
//! Behaves like browser local storage: a flat string map with an optional
//! byte quota, and a switch that makes every call fail the way disabled
//! storage does.

use super::{DurableStorage, StorageEvent, StorageWatch};
use crate::error::{Result, StorageError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tracing::trace;

type Watcher = (String, mpsc::UnboundedSender<StorageEvent>);

/// Map-backed [`DurableStorage`]
#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    watchers: Mutex<Vec<Watcher>>,
    /// Maximum total size of keys and values, in bytes
    quota_bytes: Option<usize>,
    disabled: AtomicBool,
}

impl MemoryStorage {
    /// Create an unbounded storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage that rejects writes beyond `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Enable or disable the storage; disabled storage fails every call
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    fn check_enabled(&self) -> Result<()> {
        if self.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable);
        }
        Ok(())
    }

    fn notify(&self, key: &str, new_value: &str) {
        let event = StorageEvent {
            key: key.to_string(),
            new_value: Some(new_value.to_string()),
        };

        // Drop watchers whose receiver is gone
        self.watchers.lock().retain(|(watched, tx)| {
            if watched != key {
                return !tx.is_closed();
            }
            tx.send(event.clone()).is_ok()
        });
    }
}

impl DurableStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.check_enabled()?;
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.check_enabled()?;

        let mut items = self.items.write();
        if let Some(quota) = self.quota_bytes {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        items.insert(key.to_string(), value.to_string());

        trace!("memory storage: set {} ({} bytes)", key, value.len());
        // Still under the write lock, so events follow write order
        self.notify(key, value);
        Ok(())
    }

    fn watch(&self, key: &str) -> Result<StorageWatch> {
        self.check_enabled()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.lock().push((key.to_string(), tx));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_get() {
        let storage = MemoryStorage::new();
        assert!(storage.get_item("k").unwrap().is_none());

        storage.set_item("k", "[\"a\"]").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("[\"a\"]"));

        storage.set_item("k", "[]").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_watch_receives_writes_for_key_only() {
        let storage = MemoryStorage::new();
        let mut rx = storage.watch("compare").unwrap();

        storage.set_item("other", "x").unwrap();
        storage.set_item("compare", "[]").unwrap();
        storage.set_item("compare", "[\"a\"]").unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.key, "compare");
        assert_eq!(first.new_value.as_deref(), Some("[]"));

        let second = rx.try_recv().unwrap();
        assert_eq!(second.new_value.as_deref(), Some("[\"a\"]"));

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_watch_is_pruned() {
        let storage = MemoryStorage::new();
        let rx = storage.watch("compare").unwrap();
        drop(rx);

        storage.set_item("compare", "[]").unwrap();
        assert!(storage.watchers.lock().is_empty());
    }

    #[test]
    fn test_quota_exceeded() {
        let storage = MemoryStorage::with_quota(16);
        storage.set_item("k", "0123456789").unwrap();

        let err = storage.set_item("k", "0123456789abcdefgh").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 16, .. }));

        // Previous value is untouched
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("0123456789"));
    }

    #[test]
    fn test_disabled_storage_fails() {
        let storage = MemoryStorage::new();
        storage.set_disabled(true);

        assert!(matches!(storage.get_item("k"), Err(StorageError::Unavailable)));
        assert!(matches!(storage.set_item("k", "v"), Err(StorageError::Unavailable)));
        assert!(matches!(storage.watch("k"), Err(StorageError::Unavailable)));

        storage.set_disabled(false);
        storage.set_item("k", "v").unwrap();
    }

    #[test]
    fn test_concurrent_writes_notify_in_write_order() {
        let storage = Arc::new(MemoryStorage::new());
        let mut rx = storage.watch("compare").unwrap();

        let writers: Vec<_> = (0..4)
            .map(|writer| {
                let storage = storage.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        storage
                            .set_item("compare", &format!("[\"{}-{}\"]", writer, i))
                            .unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let mut last = None;
        let mut count = 0;
        while let Ok(event) = rx.try_recv() {
            last = event.new_value;
            count += 1;
        }

        assert_eq!(count, 800);
        assert_eq!(last, storage.get_item("compare").unwrap());
    }
}
