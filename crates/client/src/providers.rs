//! Context providers wiring the realtime channel and the notification store
//! into the component tree.

use dioxus::prelude::*;
use futures_channel::mpsc::unbounded;
use futures_util::StreamExt;

use crate::auth_session::load_session;
use crate::channel::{spawn_transport, ChannelAdapter};
use crate::config::ClientConfig;
use crate::notifications::{Notification, NotificationStore, Toast};
use crate::storage::LocalStore;

/// Reactive view of the notification store.
#[derive(Clone)]
pub struct NotificationsContext {
    pub store: NotificationStore,
    /// Bumped on every store change; reading it subscribes the component.
    revision: Signal<u64>,
}

impl NotificationsContext {
    /// `revision` must be bumped whenever `store` changes.
    pub fn new(store: NotificationStore, revision: Signal<u64>) -> Self {
        Self { store, revision }
    }

    pub fn list(&self) -> Vec<Notification> {
        let _ = self.revision.read();
        self.store.list()
    }

    pub fn unread_count(&self) -> usize {
        let _ = self.revision.read();
        self.store.unread_count()
    }

    pub fn toast(&self) -> Toast {
        self.store.toast()
    }
}

/// Owns the realtime channel and the notification store for everything
/// below it. The socket is opened once and shut down on unmount.
#[component]
pub fn RealtimeProvider(children: Element) -> Element {
    let config = use_hook(ClientConfig::from_env);
    let adapter = use_hook(ChannelAdapter::new);
    let store = use_hook(|| match config.notification_capacity {
        Some(capacity) => NotificationStore::with_capacity(capacity),
        None => NotificationStore::new(),
    });
    let revision = use_signal(|| 0u64);

    // Store changes may come from the transport thread; hop to the UI
    // thread before touching the signal.
    use_hook(|| {
        let (changed_tx, mut changed_rx) = unbounded::<()>();
        store.watch(move || {
            let _ = changed_tx.unbounded_send(());
        });
        let mut revision = revision;
        spawn(async move {
            while changed_rx.next().await.is_some() {
                *revision.write() += 1;
            }
        });
    });

    use_hook(|| {
        let storage = LocalStore::new();
        let url_config = config.clone();
        spawn_transport(
            adapter.clone(),
            move || {
                let session = load_session(&storage)?;
                url_config.socket_url(Some(&session))
            },
            config.reconnect.clone(),
        );
    });

    use_drop({
        let adapter = adapter.clone();
        move || adapter.shutdown()
    });

    use_context_provider(|| adapter.clone());
    use_context_provider(|| NotificationsContext::new(store.clone(), revision));

    children
}

pub fn use_notifications() -> NotificationsContext {
    use_context::<NotificationsContext>()
}

pub fn use_channel_adapter() -> ChannelAdapter {
    use_context::<ChannelAdapter>()
}
