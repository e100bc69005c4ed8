//! sled-backed storage
//!
//! Every tab of one process shares the same [`sled::Db`] handle (sled holds
//! an exclusive lock on its directory). Watches use sled's prefix
//! subscribers, which report writes from any handle, so a tab also sees its
//! own writes and has to filter them.

use super::{DurableStorage, StorageEvent, StorageWatch};
use crate::error::{Result, StorageError};
use anyhow::Context;
use std::path::Path;
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// How often the watch thread checks whether its receiver is still alive
const WATCH_POLL: Duration = Duration::from_millis(250);

/// [`DurableStorage`] on top of an embedded sled database
#[derive(Clone)]
pub struct SledStorage {
    db: sled::Db,
}

impl SledStorage {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path)
            .with_context(|| format!("Failed to open sled database at: {}", path.display()))?;

        info!("Opened sled storage at: {}", path.display());
        Ok(Self { db })
    }

    /// Temporary database, deleted on drop
    #[cfg(test)]
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    fn decode(bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| StorageError::Encoding(e.to_string()))
    }
}

impl DurableStorage for SledStorage {
    fn name(&self) -> &'static str {
        "sled"
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        match self.db.get(key.as_bytes())? {
            Some(value) => Ok(Some(Self::decode(&value)?)),
            None => Ok(None),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.db.insert(key.as_bytes(), value.as_bytes())?;
        self.db.flush()?;
        trace!("sled storage: set {} ({} bytes)", key, value.len());
        Ok(())
    }

    fn watch(&self, key: &str) -> Result<StorageWatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscriber = self.db.watch_prefix(key.as_bytes());
        let key = key.to_string();

        std::thread::Builder::new()
            .name("storage-watch".to_string())
            .spawn(move || {
                loop {
                    let event = match subscriber.next_timeout(WATCH_POLL) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => {
                            if tx.is_closed() {
                                break;
                            }
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    };

                    let (event_key, new_value) = match event {
                        sled::Event::Insert { key, value } => (key, Some(value)),
                        sled::Event::Remove { key } => (key, None),
                    };

                    // Prefix subscription: skip longer keys sharing the prefix
                    if event_key.as_ref() != key.as_bytes() {
                        continue;
                    }

                    let new_value = match new_value.map(|v| Self::decode(&v)).transpose() {
                        Ok(value) => value,
                        Err(e) => {
                            debug!("Skipping undecodable storage event for {}: {}", key, e);
                            continue;
                        }
                    };

                    let event = StorageEvent {
                        key: key.clone(),
                        new_value,
                    };
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                debug!("Storage watch for '{}' stopped", key);
            })?;

        Ok(rx)
    }
}
