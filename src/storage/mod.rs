//! Durable key/value storage shared by every compare tab
//!
//! A [`DurableStorage`] is the origin-scoped string store that all tabs of
//! the compare list write to. It is also the only channel between tabs: a
//! write to a key is reported to every [`watch`](DurableStorage::watch)er of
//! that key, which is how other tabs learn about a new selection.
//!
//! Two backends are provided:
//! - [`SledStorage`]: embedded sled database, survives restarts
//! - [`MemoryStorage`]: in-process map with optional quota and a disabled
//!   switch, used for tests and ephemeral deployments

mod memory;
mod sled_store;

pub use memory::MemoryStorage;
pub use sled_store::SledStorage;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::Result;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Change notification for a watched key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that was written
    pub key: String,
    /// New value, `None` when the key was removed
    pub new_value: Option<String>,
}

/// Receiving end of a key watch
pub type StorageWatch = mpsc::UnboundedReceiver<StorageEvent>;

/// Origin-scoped string key/value store with change notifications
///
/// All methods are synchronous: backends are local and fast. Watch events
/// are delivered for every write to the key, including writes made through
/// the same handle; consumers filter their own echoes.
pub trait DurableStorage: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &'static str;

    /// Read the value stored under `key`
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    ///
    /// Watchers of `key` are notified in the order the writes are applied.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Subscribe to changes of `key`
    ///
    /// The watch stays active until the returned receiver is dropped.
    fn watch(&self, key: &str) -> Result<StorageWatch>;
}

/// Open the storage backend selected in the configuration
pub fn open_storage(config: &StorageConfig, sled_path: &Path) -> anyhow::Result<Arc<dyn DurableStorage>> {
    let storage: Arc<dyn DurableStorage> = match config.backend {
        StorageBackend::Sled => Arc::new(
            SledStorage::open(sled_path)
                .with_context(|| format!("Failed to open storage at {}", sled_path.display()))?,
        ),
        StorageBackend::Memory => Arc::new(match config.quota_bytes {
            Some(quota) => MemoryStorage::with_quota(quota),
            None => MemoryStorage::new(),
        }),
    };

    info!("Durable storage ready (backend: {})", storage.name());
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_memory_backend() {
        let config = StorageConfig {
            backend: StorageBackend::Memory,
            quota_bytes: Some(1024),
            ..StorageConfig::default()
        };
        let storage = open_storage(&config, Path::new("unused")).unwrap();
        assert_eq!(storage.name(), "memory");
    }

    #[test]
    fn test_open_sled_backend() {
        let temp = tempdir().unwrap();
        let config = StorageConfig::default();
        let storage = open_storage(&config, &temp.path().join("sled")).unwrap();
        assert_eq!(storage.name(), "sled");

        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
    }
}
