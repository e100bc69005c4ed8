//! Scenario tests for the compare list

use super::*;
use crate::storage::{DurableStorage, MemoryStorage, SledStorage};
use std::sync::Arc;
use std::time::Duration;

fn make_tab(storage: Arc<dyn DurableStorage>, name: &str) -> CompareStore {
    CompareStore::new(storage, CompareOptions::new(name))
}

/// Wait until `check` holds, polling the runtime
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

#[test]
fn test_basic_flow() {
    let store = make_tab(Arc::new(MemoryStorage::new()), "a");
    let bar = CompareBar::new(store.clone());
    assert!(store.initialize().is_empty());

    store.toggle("deck-1");
    assert_eq!(store.selection(), ["deck-1"]);
    assert_eq!(bar.view().map(|v| v.count), Some(1));

    store.toggle("ally-2");
    assert_eq!(store.selection(), ["deck-1", "ally-2"]);
    assert_eq!(bar.view().map(|v| v.count), Some(2));

    store.toggle("deck-1");
    assert_eq!(store.selection(), ["ally-2"]);

    store.clear();
    assert!(store.selection().is_empty());
    assert_eq!(bar.view(), None);
}

#[test]
fn test_reload_restores_selection() {
    let storage: Arc<dyn DurableStorage> = Arc::new(MemoryStorage::new());

    let first = make_tab(storage.clone(), "a");
    first.add("deck-1");
    first.add("ally-2");

    // A fresh tab (page reload) sees the persisted list
    let reloaded = make_tab(storage, "a-reloaded");
    assert_eq!(reloaded.initialize(), ["deck-1", "ally-2"]);
}

#[tokio::test]
async fn test_cross_tab_memory_backend() {
    let storage: Arc<dyn DurableStorage> = Arc::new(MemoryStorage::new());
    let tab_a = make_tab(storage.clone(), "a");
    let tab_b = make_tab(storage.clone(), "b");
    tab_a.initialize();
    tab_b.initialize();

    let sync_a = tab_a.spawn_storage_sync().unwrap();
    let sync_b = tab_b.spawn_storage_sync().unwrap();
    let mut updates_b = tab_b.updates();

    tab_a.add("deck-1");
    assert_eq!(
        storage.get_item(DEFAULT_STORAGE_KEY).unwrap().as_deref(),
        Some(r#"["deck-1"]"#)
    );

    let update = tokio::time::timeout(Duration::from_secs(2), updates_b.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.cause, ChangeCause::Remote);
    assert_eq!(update.tab, "b");
    assert_eq!(update.ids, ["deck-1"]);
    assert_eq!(tab_b.selection(), ["deck-1"]);

    // Tab A's own echo must not produce a remote update there
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tab_a.selection(), ["deck-1"]);

    sync_a.abort();
    sync_b.abort();
}

#[tokio::test]
async fn test_cross_tab_sled_backend() {
    let storage: Arc<dyn DurableStorage> = Arc::new(SledStorage::temporary().unwrap());
    let tab_a = make_tab(storage.clone(), "a");
    let tab_b = make_tab(storage.clone(), "b");
    tab_b.initialize();
    let sync_b = tab_b.spawn_storage_sync().unwrap();

    tab_a.add("deck-1");
    assert!(eventually(|| tab_b.selection() == ["deck-1"]).await);

    tab_a.clear();
    assert!(eventually(|| tab_b.is_empty()).await);

    sync_b.abort();
}

#[tokio::test]
async fn test_own_writes_do_not_loop_back() {
    let storage: Arc<dyn DurableStorage> = Arc::new(SledStorage::temporary().unwrap());
    let tab = make_tab(storage, "a");
    let mut updates = tab.updates();
    let sync = tab.spawn_storage_sync().unwrap();

    tab.add("deck-1");
    tab.add("ally-2");
    tab.remove("deck-1");

    let mut causes = Vec::new();
    while let Ok(Ok(update)) =
        tokio::time::timeout(Duration::from_millis(300), updates.recv()).await
    {
        causes.push(update.cause);
    }

    assert_eq!(causes, [ChangeCause::Local; 3]);
    assert_eq!(tab.selection(), ["ally-2"]);

    sync.abort();
}

#[tokio::test]
async fn test_last_write_wins_across_tabs() {
    let storage: Arc<dyn DurableStorage> = Arc::new(MemoryStorage::new());
    let tab_a = make_tab(storage.clone(), "a");
    let tab_b = make_tab(storage.clone(), "b");
    let sync_a = tab_a.spawn_storage_sync().unwrap();
    let sync_b = tab_b.spawn_storage_sync().unwrap();

    tab_a.add("deck-1");
    tab_b.add("ally-2");

    // Both converge to whatever landed last in storage
    let expected = storage.get_item(DEFAULT_STORAGE_KEY).unwrap().unwrap();
    let expected = SelectionSet::decode(&expected).unwrap().to_vec();
    assert!(eventually(|| tab_a.selection() == expected && tab_b.selection() == expected).await);

    sync_a.abort();
    sync_b.abort();
}

#[tokio::test]
async fn test_bar_watch_follows_other_tab() {
    let storage: Arc<dyn DurableStorage> = Arc::new(MemoryStorage::new());
    let tab_a = make_tab(storage.clone(), "a");
    let tab_b = make_tab(storage, "b");
    let sync_b = tab_b.spawn_storage_sync().unwrap();

    let bar_b = CompareBar::new(tab_b.clone());
    let rx = bar_b.watch();

    tab_a.add("deck-1");
    tab_a.add("ally-2");

    assert!(eventually(|| rx.borrow().as_ref().map(|v| v.count) == Some(2)).await);
    assert_eq!(
        rx.borrow().as_ref().map(|v| v.href.clone()),
        Some("/compare?ids=deck-1,ally-2".to_string())
    );

    sync_b.abort();
}
