//! Compare bar - global overlay with selection count and compare link

use super::selection::compare_href;
use super::store::{CompareStore, SelectionChanged};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

/// Render model of the bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarView {
    pub count: usize,
    pub label: String,
    pub href: String,
    pub clear_label: &'static str,
}

impl BarView {
    /// View for a selection; `None` when nothing is selected
    pub fn for_ids(ids: &[String]) -> Option<Self> {
        if ids.is_empty() {
            return None;
        }

        let count = ids.len();
        let label = if count == 1 {
            "1 device selected".to_string()
        } else {
            format!("{} devices selected", count)
        };

        Some(Self {
            count,
            label,
            href: compare_href(ids),
            clear_label: "Clear",
        })
    }
}

/// Compare bar bound to a tab's store
#[derive(Clone)]
pub struct CompareBar {
    store: CompareStore,
}

impl CompareBar {
    pub fn new(store: CompareStore) -> Self {
        Self { store }
    }

    /// Current view, `None` renders nothing
    pub fn view(&self) -> Option<BarView> {
        BarView::for_ids(&self.store.selection())
    }

    /// Clear action
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Live view, updated on every same-tab or cross-tab change
    ///
    /// The subscription ends once the receiver is dropped.
    pub fn watch(&self) -> watch::Receiver<Option<BarView>> {
        let (tx, rx) = watch::channel(self.view());
        let feed = BarFeed::new(tx);
        self.store.subscribe_while(move |event| feed.apply(event));
        rx
    }
}

/// Feeds change events into a watch channel, newest version only
struct BarFeed {
    tx: watch::Sender<Option<BarView>>,
    last_version: Mutex<u64>,
}

impl BarFeed {
    fn new(tx: watch::Sender<Option<BarView>>) -> Self {
        Self {
            tx,
            last_version: Mutex::new(0),
        }
    }

    /// Returns `false` once nobody is watching
    fn apply(&self, event: &SelectionChanged) -> bool {
        if self.tx.is_closed() {
            return false;
        }

        let mut last = self.last_version.lock();
        // Events can be delivered out of order across threads
        if event.version > *last {
            *last = event.version;
            self.tx.send_replace(BarView::for_ids(&event.ids));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{ChangeCause, CompareOptions};
    use crate::storage::MemoryStorage;
    use std::sync::Arc;

    fn make_bar() -> CompareBar {
        let store = CompareStore::new(Arc::new(MemoryStorage::new()), CompareOptions::new("test"));
        CompareBar::new(store)
    }

    #[test]
    fn test_empty_selection_renders_nothing() {
        assert_eq!(make_bar().view(), None);
    }

    #[test]
    fn test_view_count_and_href() {
        let bar = make_bar();
        bar.store.add("deck-1");

        let view = bar.view().unwrap();
        assert_eq!(view.count, 1);
        assert_eq!(view.label, "1 device selected");
        assert_eq!(view.href, "/compare?ids=deck-1");

        bar.store.add("ally-2");
        let view = bar.view().unwrap();
        assert_eq!(view.count, 2);
        assert_eq!(view.label, "2 devices selected");
        assert_eq!(view.href, "/compare?ids=deck-1,ally-2");
    }

    #[test]
    fn test_clear_action() {
        let bar = make_bar();
        bar.store.add("deck-1");
        bar.clear();
        assert!(bar.store.is_empty());
        assert_eq!(bar.view(), None);
    }

    #[test]
    fn test_watch_tracks_changes() {
        let bar = make_bar();
        let rx = bar.watch();
        assert_eq!(*rx.borrow(), None);

        bar.store.toggle("deck-1");
        assert_eq!(rx.borrow().as_ref().map(|v| v.count), Some(1));

        bar.clear();
        assert_eq!(*rx.borrow(), None);
    }

    #[test]
    fn test_dropped_watch_is_pruned() {
        let bar = make_bar();
        let rx = bar.watch();
        assert_eq!(bar.store.listener_count(), 1);

        drop(rx);
        bar.store.add("deck-1");
        assert_eq!(bar.store.listener_count(), 0);
    }

    #[test]
    fn test_feed_ignores_older_versions() {
        let (tx, rx) = watch::channel(None);
        let feed = BarFeed::new(tx);
        fn event(version: u64, ids: &[&str]) -> SelectionChanged {
            SelectionChanged {
                tab: "test".to_string(),
                version,
                ids: ids.iter().map(|id| id.to_string()).collect(),
                cause: ChangeCause::Local,
            }
        }

        assert!(feed.apply(&event(2, &["deck-1", "ally-2"])));
        assert!(feed.apply(&event(1, &["deck-1"])));

        assert_eq!(rx.borrow().as_ref().map(|v| v.count), Some(2));
    }
}
