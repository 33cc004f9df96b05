//! Realtime channel: one socket, many named event streams.
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────────────┐   frames    ┌──────────────────────────┐
//!   │ transport task       │ ──────────▶ │      ChannelAdapter      │
//!   │ (tungstenite / web)  │ ◀────────── │ event name -> listeners  │
//!   └──────────────────────┘   send()    └──────────────────────────┘
//!                                               │ dispatch
//!                          ┌────────────────────┼────────────────────┐
//!                          ▼                    ▼                    ▼
//!                   use_channel_event    use_channel_event     bridge_alerts
//!                    (component A)        (component B)     (NotificationStore)
//! ```
//!
//! Outgoing frames are dropped while the socket is not open; `send` reports
//! whether the frame was handed to the transport. Listeners stay registered
//! across reconnects.

mod hooks;
mod reconnect;
pub mod transport;

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use fleetdeck_shared::ChannelFrame;
use futures_channel::mpsc::UnboundedSender;
use serde_json::Value;

pub use hooks::{use_channel_event, ChannelEventHandle, EventBinding};
pub use reconnect::{
    BackoffPolicy, Clock, ConnectionState, ManualClock, ReconnectConfig, Reconnector, SystemClock,
};
pub use transport::spawn_transport;

/// Callback invoked with the payload of every matching frame.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

struct ListenerEntry {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Listener,
}

struct Registry {
    state: ConnectionState,
    listeners: HashMap<String, Vec<ListenerEntry>>,
    next_listener_id: u64,
    /// The single attached transport sink, tagged with its generation.
    outbound: Option<(u64, UnboundedSender<String>)>,
    next_generation: u64,
    shut_down: bool,
}

/// Shared handle to the realtime channel. Cloning is cheap; all clones talk
/// to the same registry and transport.
#[derive(Clone)]
pub struct ChannelAdapter {
    inner: Arc<Mutex<Registry>>,
}

impl Default for ChannelAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChannelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();
        f.debug_struct("ChannelAdapter")
            .field("state", &registry.state)
            .field("events", &registry.listeners.len())
            .field("shut_down", &registry.shut_down)
            .finish()
    }
}

impl ChannelAdapter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                state: ConnectionState::Closed,
                listeners: HashMap::new(),
                next_listener_id: 0,
                outbound: None,
                next_generation: 0,
                shut_down: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `callback` for `event_name`.
    ///
    /// Registering the same closure several times yields independent
    /// subscriptions; each one removes only itself. After [`shutdown`] the
    /// returned subscription is already inactive and never fires.
    ///
    /// [`shutdown`]: ChannelAdapter::shutdown
    pub fn subscribe(
        &self,
        event_name: &str,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = self.lock();
        let id = registry.next_listener_id;
        registry.next_listener_id += 1;

        if registry.shut_down {
            crate::log_warn!("Refusing '{}' listener: channel shut down", event_name);
            return Subscription {
                registry: Weak::new(),
                event_name: event_name.to_string(),
                id,
                active: Arc::new(AtomicBool::new(false)),
            };
        }

        let active = Arc::new(AtomicBool::new(true));
        registry
            .listeners
            .entry(event_name.to_string())
            .or_default()
            .push(ListenerEntry {
                id,
                active: active.clone(),
                callback: Arc::new(callback),
            });
        crate::log_debug!("Subscribed listener {} to '{}'", id, event_name);

        Subscription {
            registry: Arc::downgrade(&self.inner),
            event_name: event_name.to_string(),
            id,
            active,
        }
    }

    /// Send `payload` tagged with `event_name`.
    ///
    /// Returns `false` when the frame was dropped because the socket is not
    /// open. Nothing is buffered for later delivery.
    pub fn send(&self, event_name: &str, payload: Value) -> bool {
        let text = match ChannelFrame::new(event_name, payload).encode() {
            Ok(text) => text,
            Err(e) => {
                crate::log_error!("Failed to encode '{}' frame: {}", event_name, e);
                return false;
            }
        };

        let registry = self.lock();
        let sink = match &registry.outbound {
            Some((_, sink)) if registry.state.is_open() && !registry.shut_down => sink,
            _ => {
                crate::log_debug!("Dropping '{}' frame: channel not open", event_name);
                return false;
            }
        };
        if sink.unbounded_send(text).is_err() {
            crate::log_debug!("Dropping '{}' frame: transport already closed", event_name);
            return false;
        }
        true
    }

    pub fn is_connected(&self) -> bool {
        self.lock().state.is_open()
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state.clone()
    }

    pub fn listener_count(&self, event_name: &str) -> usize {
        self.lock()
            .listeners
            .get(event_name)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Deliver `payload` to every listener registered for `event_name`, in
    /// registration order. Returns how many listeners ran.
    ///
    /// A listener removed while this dispatch is in progress is skipped, and
    /// a panicking listener does not stop delivery to the rest.
    pub fn dispatch(&self, event_name: &str, payload: &Value) -> usize {
        let snapshot: Vec<(u64, Arc<AtomicBool>, Listener)> = {
            let registry = self.lock();
            match registry.listeners.get(event_name) {
                Some(entries) => entries
                    .iter()
                    .map(|e| (e.id, e.active.clone(), e.callback.clone()))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (id, active, callback) in snapshot {
            if !active.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| callback(payload))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    crate::log_error!(
                        "Listener {} for '{}' panicked: {}",
                        id,
                        event_name,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        delivered
    }

    /// Decode a text frame from the transport and dispatch it.
    pub fn handle_frame(&self, text: &str) -> usize {
        match ChannelFrame::decode(text) {
            Ok(frame) => self.dispatch(&frame.event_name, &frame.payload),
            Err(e) => {
                crate::log_warn!("Ignoring malformed frame: {}", e);
                0
            }
        }
    }

    /// Record a lifecycle state reported by the transport driver.
    pub fn set_state(&self, state: ConnectionState) {
        let mut registry = self.lock();
        if registry.shut_down {
            return;
        }
        registry.state = state;
    }

    /// Attach a freshly opened transport, replacing any previous one.
    ///
    /// Returns the generation to pass to [`detach_transport`], or `None` if
    /// the adapter has been shut down.
    ///
    /// [`detach_transport`]: ChannelAdapter::detach_transport
    pub fn attach_transport(&self, sink: UnboundedSender<String>) -> Option<u64> {
        let mut registry = self.lock();
        if registry.shut_down {
            return None;
        }
        let generation = registry.next_generation;
        registry.next_generation += 1;
        if let Some((old, previous)) = registry.outbound.replace((generation, sink)) {
            crate::log_warn!("Replacing transport generation {} with {}", old, generation);
            previous.close_channel();
        }
        registry.state = ConnectionState::Open;
        Some(generation)
    }

    /// Detach the transport of `generation`. Stale generations are ignored so
    /// a late close from a replaced transport leaves the current one alone.
    pub fn detach_transport(&self, generation: u64) -> bool {
        let mut registry = self.lock();
        let is_current = matches!(&registry.outbound, Some((current, _)) if *current == generation);
        if !is_current {
            return false;
        }
        registry.outbound = None;
        if !registry.shut_down {
            registry.state = ConnectionState::Closed;
        }
        true
    }

    /// Close the transport, drop every listener, and stop transport drivers.
    pub fn shutdown(&self) {
        let mut registry = self.lock();
        registry.shut_down = true;
        registry.state = ConnectionState::Closed;
        if let Some((_, sink)) = registry.outbound.take() {
            sink.close_channel();
        }
        for entry in registry.listeners.values().flatten() {
            entry.active.store(false, Ordering::Release);
        }
        registry.listeners.clear();
        crate::log_info!("Realtime channel shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Registration handle returned by [`ChannelAdapter::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[must_use = "a Subscription is the only way to remove its listener"]
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    event_name: String,
    id: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Remove this listener. Returns `false` if it was already removed.
    pub fn unsubscribe(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        if let Some(inner) = self.registry.upgrade() {
            let mut registry = inner.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entries) = registry.listeners.get_mut(&self.event_name) {
                entries.retain(|e| e.id != self.id);
                if entries.is_empty() {
                    registry.listeners.remove(&self.event_name);
                }
            }
        }
        crate::log_debug!("Unsubscribed listener {} from '{}'", self.id, self.event_name);
        true
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event_name", &self.event_name)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
