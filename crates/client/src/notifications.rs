//! In-app notification store.
//!
//! A single [`NotificationStore`] lives for the whole session and is shared
//! by components and plain code alike. Records are kept newest first. The
//! store is unbounded unless built with [`NotificationStore::with_capacity`],
//! in which case the oldest records are evicted first.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use fleetdeck_shared::NotificationKind;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Identifies a change watcher registered with [`NotificationStore::watch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchId(u64);

type Watcher = Arc<dyn Fn() + Send + Sync>;

struct StoreState {
    /// Newest first.
    items: VecDeque<Notification>,
    capacity: Option<usize>,
    watchers: Vec<(WatchId, Watcher)>,
    next_watch_id: u64,
}

#[derive(Clone)]
pub struct NotificationStore {
    inner: Arc<Mutex<StoreState>>,
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NotificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("NotificationStore")
            .field("len", &state.items.len())
            .field("capacity", &state.capacity)
            .finish()
    }
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Store keeping at most `capacity` records (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self::build(Some(capacity.max(1)))
    }

    fn build(capacity: Option<usize>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreState {
                items: VecDeque::new(),
                capacity,
                watchers: Vec::new(),
                next_watch_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an unread notification and return its id.
    pub fn add(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> String {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        };
        let id = notification.id.clone();

        {
            let mut state = self.lock();
            state.items.push_front(notification);
            if let Some(capacity) = state.capacity {
                while state.items.len() > capacity {
                    if let Some(evicted) = state.items.pop_back() {
                        crate::log_debug!("Evicted notification {}", evicted.id);
                    }
                }
            }
        }

        self.notify();
        id
    }

    /// Remove a notification. Unknown ids are ignored.
    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.lock();
            let before = state.items.len();
            state.items.retain(|n| n.id != id);
            state.items.len() != before
        };
        if removed {
            self.notify();
        }
        removed
    }

    /// Mark one notification read. Returns `false` if it was unknown or
    /// already read.
    pub fn mark_as_read(&self, id: &str) -> bool {
        let changed = {
            let mut state = self.lock();
            match state.items.iter_mut().find(|n| n.id == id) {
                Some(n) if !n.read => {
                    n.read = true;
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.notify();
        }
        changed
    }

    /// Mark everything read and return how many records changed.
    pub fn mark_all_as_read(&self) -> usize {
        let changed = {
            let mut state = self.lock();
            let mut changed = 0;
            for n in state.items.iter_mut().filter(|n| !n.read) {
                n.read = true;
                changed += 1;
            }
            changed
        };
        if changed > 0 {
            self.notify();
        }
        changed
    }

    pub fn reset(&self) {
        let had_items = {
            let mut state = self.lock();
            let had_items = !state.items.is_empty();
            state.items.clear();
            had_items
        };
        if had_items {
            self.notify();
        }
    }

    /// Snapshot of all notifications, newest first.
    pub fn list(&self) -> Vec<Notification> {
        self.lock().items.iter().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.lock().items.iter().find(|n| n.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().items.iter().filter(|n| !n.read).count()
    }

    pub fn toast(&self) -> Toast {
        Toast {
            store: self.clone(),
        }
    }

    /// Call `watcher` after every change to the list.
    pub fn watch(&self, watcher: impl Fn() + Send + Sync + 'static) -> WatchId {
        let mut state = self.lock();
        let id = WatchId(state.next_watch_id);
        state.next_watch_id += 1;
        state.watchers.push((id, Arc::new(watcher)));
        id
    }

    pub fn unwatch(&self, id: WatchId) -> bool {
        let mut state = self.lock();
        let before = state.watchers.len();
        state.watchers.retain(|(w, _)| *w != id);
        state.watchers.len() != before
    }

    fn notify(&self) {
        let watchers: Vec<Watcher> = self.lock().watchers.iter().map(|(_, w)| w.clone()).collect();
        for watcher in watchers {
            watcher();
        }
    }
}

/// Fire-and-forget notification shortcuts, usable from any code that holds
/// a clone (error handlers, background tasks, API clients).
#[derive(Clone, Debug)]
pub struct Toast {
    store: NotificationStore,
}

impl Toast {
    pub fn show(
        &self,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> String {
        self.store.add(kind, title, message)
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.show(NotificationKind::Info, title, message)
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.show(NotificationKind::Success, title, message)
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.show(NotificationKind::Warning, title, message)
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> String {
        self.show(NotificationKind::Error, title, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn save_failed_scenario() {
        let store = NotificationStore::new();
        let id = store.add(NotificationKind::Error, "Save failed", "Network timeout");

        let list = store.list();
        assert_eq!(list.len(), 1);
        assert!(!list[0].read);
        assert_eq!(list[0].kind, NotificationKind::Error);
        assert_eq!(list[0].title, "Save failed");
        assert_eq!(store.unread_count(), 1);

        assert!(store.mark_as_read(&id));
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn ids_are_unique_and_unread_count_tracks_adds() {
        let store = NotificationStore::new();
        let mut ids = HashSet::new();
        for i in 0..500 {
            let before = store.unread_count();
            ids.insert(store.add(NotificationKind::Info, format!("n{i}"), ""));
            assert_eq!(store.unread_count(), before + 1);
        }
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn mark_as_read_is_idempotent() {
        let store = NotificationStore::new();
        let a = store.add(NotificationKind::Info, "a", "");
        store.add(NotificationKind::Info, "b", "");

        assert!(store.mark_as_read(&a));
        assert_eq!(store.unread_count(), 1);
        assert!(!store.mark_as_read(&a));
        assert_eq!(store.unread_count(), 1);
        assert!(!store.mark_as_read("missing"));
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn removing_unknown_id_changes_nothing() {
        let store = NotificationStore::new();
        store.add(NotificationKind::Warning, "Battery low", "Sensor 4 at 8%");
        let before = store.list();

        assert!(!store.remove("no-such-id"));
        assert_eq!(store.list(), before);
    }

    #[test]
    fn remove_and_reset() {
        let store = NotificationStore::new();
        let a = store.add(NotificationKind::Info, "a", "");
        store.add(NotificationKind::Info, "b", "");

        assert!(store.remove(&a));
        assert_eq!(store.get(&a), None);
        assert_eq!(store.len(), 1);

        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn newest_first_ordering() {
        let store = NotificationStore::new();
        store.add(NotificationKind::Info, "first", "");
        store.add(NotificationKind::Info, "second", "");
        store.add(NotificationKind::Info, "third", "");

        let titles: Vec<_> = store.list().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let store = NotificationStore::with_capacity(2);
        store.add(NotificationKind::Info, "first", "");
        store.add(NotificationKind::Info, "second", "");
        store.add(NotificationKind::Info, "third", "");

        let titles: Vec<_> = store.list().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["third", "second"]);
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn mark_all_as_read_counts_changes() {
        let store = NotificationStore::new();
        let a = store.add(NotificationKind::Info, "a", "");
        store.add(NotificationKind::Info, "b", "");
        store.add(NotificationKind::Info, "c", "");
        store.mark_as_read(&a);

        assert_eq!(store.mark_all_as_read(), 2);
        assert_eq!(store.mark_all_as_read(), 0);
        assert_eq!(store.unread_count(), 0);
    }

    fn report_failure(toast: &Toast) {
        toast.error("Save failed", "Network timeout");
    }

    #[test]
    fn toast_works_from_plain_functions() {
        let store = NotificationStore::new();
        let toast = store.toast();

        report_failure(&toast);
        toast.success("Saved", "Dashboard layout stored");
        toast.warning("Offline", "Gateway 2 stopped reporting");
        toast.info("Update", "Firmware 1.4 available");

        let kinds: Vec<_> = store.list().into_iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::Info,
                NotificationKind::Warning,
                NotificationKind::Success,
                NotificationKind::Error,
            ]
        );
    }

    #[test]
    fn watchers_fire_on_change_only() {
        let store = NotificationStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let watch = store.watch(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let id = store.add(NotificationKind::Info, "a", "");
        store.mark_as_read(&id);
        store.mark_as_read(&id);
        store.remove("missing");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(store.unwatch(watch));
        store.reset();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn watcher_can_read_the_store() {
        let store = NotificationStore::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let (s, reader) = (seen.clone(), store.clone());
        store.watch(move || s.store(reader.unread_count(), Ordering::SeqCst));

        store.add(NotificationKind::Info, "a", "");
        store.add(NotificationKind::Info, "b", "");
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
