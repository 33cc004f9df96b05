//! Component-lifetime subscriptions to channel events.
//!
//! [`EventBinding`] does the bookkeeping and is usable outside Dioxus;
//! [`use_channel_event`] ties one to a component.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use dioxus::prelude::*;
use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::StreamExt;
use serde_json::Value;

use super::{ChannelAdapter, Subscription};

type Handler = Box<dyn Fn(&Value) + Send>;

struct ActiveSubscription<D> {
    event_name: String,
    deps: D,
    subscription: Subscription,
}

/// A re-bindable subscription that always calls the most recent handler.
///
/// The listener registered with the adapter is a fixed trampoline reading the
/// handler out of a shared cell, so swapping the handler never touches the
/// registry. Only a change of event name or dependencies re-subscribes, and
/// the old registration is always removed before the new one is added.
pub struct EventBinding<D = ()> {
    adapter: ChannelAdapter,
    handler: Arc<Mutex<Handler>>,
    active: Option<ActiveSubscription<D>>,
}

impl<D: PartialEq> EventBinding<D> {
    pub fn new(adapter: ChannelAdapter, handler: impl Fn(&Value) + Send + 'static) -> Self {
        Self {
            adapter,
            handler: Arc::new(Mutex::new(Box::new(handler))),
            active: None,
        }
    }

    /// Replace the handler. Must not be called from inside the handler.
    pub fn set_handler(&self, handler: impl Fn(&Value) + Send + 'static) {
        let mut slot = self.handler.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Box::new(handler);
    }

    pub fn is_bound_to(&self, event_name: &str, deps: &D) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.event_name == event_name && a.deps == *deps)
    }

    /// Make sure the binding listens to `event_name` with `deps`.
    /// Returns `true` if a (re-)subscription happened.
    pub fn sync(&mut self, event_name: &str, deps: D) -> bool {
        if self.is_bound_to(event_name, &deps) {
            return false;
        }

        self.deactivate();

        let cell = self.handler.clone();
        let subscription = self.adapter.subscribe(event_name, move |payload| {
            let handler = cell.lock().unwrap_or_else(|e| e.into_inner());
            handler(payload);
        });
        self.active = Some(ActiveSubscription {
            event_name: event_name.to_string(),
            deps,
            subscription,
        });
        true
    }
}

impl<D> EventBinding<D> {
    /// Remove the current registration, if any. Returns `false` when there was
    /// nothing to remove.
    pub fn deactivate(&mut self) -> bool {
        match self.active.take() {
            Some(active) => active.subscription.unsubscribe(),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn event_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.event_name.as_str())
    }

    /// Send on the bound event name. Dropped (returns `false`) while the
    /// binding is inactive or the channel is not open.
    pub fn send(&self, payload: Value) -> bool {
        match &self.active {
            Some(active) => self.adapter.send(&active.event_name, payload),
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.adapter.is_connected()
    }
}

impl<D> Drop for EventBinding<D> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// What [`use_channel_event`] hands back to the component.
#[derive(Clone)]
pub struct ChannelEventHandle {
    adapter: ChannelAdapter,
    event_name: String,
    is_connected: bool,
}

impl ChannelEventHandle {
    pub fn send(&self, payload: Value) -> bool {
        self.adapter.send(&self.event_name, payload)
    }

    /// Connection state sampled when the component last rendered.
    pub fn is_connected(&self) -> bool {
        self.is_connected
    }
}

struct HookState<D> {
    binding: RefCell<EventBinding<D>>,
    handler: RefCell<Option<Box<dyn FnMut(Value)>>>,
    /// Tag of the live subscription. Payloads carrying another tag were
    /// queued by a subscription that has since been replaced or removed.
    epoch: Cell<u64>,
    outbox: UnboundedSender<(u64, Value)>,
}

/// Listen to `event_name` for the lifetime of the calling component.
///
/// `handler` may be a fresh closure on every render; it is swapped in without
/// re-subscribing. The subscription is renewed only when `event_name` or
/// `deps` change, and removed when the component unmounts. Payloads are
/// handed to `handler` on the UI thread, so it may write signals freely.
///
/// ```rust,ignore
/// let mut last = use_signal(|| None::<Value>);
/// let channel = use_channel_event(events::DEVICE_UPDATED, device_id.clone(), move |payload| {
///     last.set(Some(payload));
/// });
/// ```
///
/// Requires a [`ChannelAdapter`] in context (see `RealtimeProvider`).
pub fn use_channel_event<D, F>(event_name: &str, deps: D, handler: F) -> ChannelEventHandle
where
    D: PartialEq + 'static,
    F: FnMut(Value) + 'static,
{
    let adapter = use_context::<ChannelAdapter>();

    let state = use_hook({
        let adapter = adapter.clone();
        move || {
            let (outbox, mut inbox) = unbounded::<(u64, Value)>();
            let state = Rc::new(HookState {
                binding: RefCell::new(EventBinding::<D>::new(adapter, |_| {})),
                handler: RefCell::new(None),
                epoch: Cell::new(0),
                outbox,
            });

            let pump = state.clone();
            spawn(async move {
                while let Some((epoch, payload)) = inbox.next().await {
                    if epoch != pump.epoch.get() {
                        continue;
                    }
                    if let Some(handler) = pump.handler.borrow_mut().as_mut() {
                        handler(payload);
                    }
                }
            });

            state
        }
    });

    *state.handler.borrow_mut() = Some(Box::new(handler));

    {
        let mut binding = state.binding.borrow_mut();
        if !binding.is_bound_to(event_name, &deps) {
            let epoch = state.epoch.get() + 1;
            binding.sync(event_name, deps);
            let outbox = state.outbox.clone();
            binding.set_handler(move |payload| {
                let _ = outbox.unbounded_send((epoch, payload.clone()));
            });
            state.epoch.set(epoch);
        }
    }

    let on_unmount = state.clone();
    use_drop(move || {
        on_unmount.binding.borrow_mut().deactivate();
        on_unmount.epoch.set(u64::MAX);
    });

    ChannelEventHandle {
        is_connected: adapter.is_connected(),
        adapter,
        event_name: event_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(count: &Arc<AtomicUsize>) -> impl Fn(&Value) + Send + 'static {
        let count = count.clone();
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn swapping_handler_keeps_the_registration() {
        let adapter = ChannelAdapter::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut binding = EventBinding::new(adapter.clone(), counting(&first));
        assert!(binding.sync("device.updated", ()));
        adapter.dispatch("device.updated", &Value::Null);

        binding.set_handler(counting(&second));
        assert!(!binding.sync("device.updated", ()));
        adapter.dispatch("device.updated", &Value::Null);

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.listener_count("device.updated"), 1);
    }

    #[test]
    fn dependency_change_resubscribes_without_overlap() {
        let adapter = ChannelAdapter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut binding = EventBinding::new(adapter.clone(), counting(&count));

        for round in 0..100u32 {
            let deps = round / 3;
            binding.sync("telemetry", deps);
            assert_eq!(adapter.listener_count("telemetry"), 1);
        }

        adapter.dispatch("telemetry", &Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_name_change_moves_the_registration() {
        let adapter = ChannelAdapter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut binding = EventBinding::new(adapter.clone(), counting(&count));

        binding.sync("device.updated", ());
        assert!(binding.sync("device.offline", ()));
        assert_eq!(adapter.listener_count("device.updated"), 0);
        assert_eq!(adapter.listener_count("device.offline"), 1);
        assert_eq!(binding.event_name(), Some("device.offline"));

        adapter.dispatch("device.updated", &Value::Null);
        adapter.dispatch("device.offline", &Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deactivate_happens_once_and_drop_cleans_up() {
        let adapter = ChannelAdapter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut binding = EventBinding::new(adapter.clone(), counting(&count));
        binding.sync("a", ());

        assert!(binding.deactivate());
        assert!(!binding.deactivate());
        assert!(!binding.is_active());
        adapter.dispatch("a", &Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // activate again, then let Drop remove it
        binding.sync("a", ());
        assert_eq!(adapter.listener_count("a"), 1);
        drop(binding);
        assert_eq!(adapter.listener_count("a"), 0);
    }

    #[test]
    fn two_bindings_on_one_event_each_fire_once() {
        let adapter = ChannelAdapter::new();
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));

        let mut first = EventBinding::new(adapter.clone(), counting(&a));
        let mut second = EventBinding::new(adapter.clone(), counting(&b));
        first.sync("device.updated", ());
        second.sync("device.updated", ());

        assert_eq!(adapter.dispatch("device.updated", &json!({ "id": "d-1" })), 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn send_uses_the_bound_event_name() {
        let adapter = ChannelAdapter::new();
        let mut binding: EventBinding = EventBinding::new(adapter.clone(), |_| {});
        assert!(!binding.send(json!({})));

        binding.sync("telemetry.watch", ());
        assert!(!binding.is_connected());
        assert!(!binding.send(json!({})));

        let (tx, mut rx) = unbounded();
        adapter.attach_transport(tx).unwrap();
        assert!(binding.is_connected());
        assert!(binding.send(json!({ "deviceId": "d-2" })));

        let text = rx.next().now_or_never().flatten().unwrap();
        assert!(text.contains("\"eventName\":\"telemetry.watch\""));
    }

    #[test]
    fn panicking_handler_keeps_binding_usable() {
        let adapter = ChannelAdapter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let mut binding = EventBinding::new(adapter.clone(), |_| panic!("bad handler"));
        binding.sync("a", ());

        assert_eq!(adapter.dispatch("a", &Value::Null), 0);
        binding.set_handler(counting(&count));
        assert_eq!(adapter.dispatch("a", &Value::Null), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod component_tests {
    use super::*;
    use crate::test_support::settle;
    use serde_json::json;

    #[derive(Clone, Copy)]
    struct Controls {
        show: Signal<bool>,
        deps: Signal<u32>,
        round: Signal<u32>,
    }

    thread_local! {
        static CONTROLS: Cell<Option<Controls>> = const { Cell::new(None) };
        static RECEIVED: RefCell<Vec<(String, Value)>> = const { RefCell::new(Vec::new()) };
    }

    fn controls() -> Controls {
        CONTROLS.with(|c| c.get()).expect("harness rendered")
    }

    fn received() -> Vec<(String, Value)> {
        let mut all = RECEIVED.with(|r| r.borrow().clone());
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    #[component]
    fn Listener(name: String, deps: u32) -> Element {
        use_channel_event("device.updated", deps, move |payload| {
            RECEIVED.with(|r| r.borrow_mut().push((name.clone(), payload)));
        });
        rsx! {}
    }

    #[component]
    fn Harness() -> Element {
        let show = use_signal(|| true);
        let deps = use_signal(|| 0u32);
        let round = use_signal(|| 0u32);
        CONTROLS.with(|c| c.set(Some(Controls { show, deps, round })));

        rsx! {
            if show() {
                Listener { name: format!("a{}", round()), deps: deps() }
                Listener { name: format!("b{}", round()), deps: deps() }
            }
        }
    }

    async fn mount(adapter: &ChannelAdapter) -> VirtualDom {
        let mut dom = VirtualDom::new(Harness).with_root_context(adapter.clone());
        dom.rebuild_in_place();
        settle(&mut dom).await;
        dom
    }

    #[tokio::test]
    async fn two_components_on_one_event_each_fire_once() {
        let adapter = ChannelAdapter::new();
        let mut dom = mount(&adapter).await;
        assert_eq!(adapter.listener_count("device.updated"), 2);

        let payload = json!({ "id": "d-1" });
        assert_eq!(adapter.dispatch("device.updated", &payload), 2);
        settle(&mut dom).await;

        assert_eq!(
            received(),
            vec![("a0".to_string(), payload.clone()), ("b0".to_string(), payload)]
        );
    }

    #[tokio::test]
    async fn rerender_swaps_in_the_fresh_handler() {
        let adapter = ChannelAdapter::new();
        let mut dom = mount(&adapter).await;

        let mut round = controls().round;
        dom.in_runtime(|| round.set(1));
        settle(&mut dom).await;
        assert_eq!(adapter.listener_count("device.updated"), 2);

        adapter.dispatch("device.updated", &Value::Null);
        settle(&mut dom).await;
        let names: Vec<String> = received().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a1", "b1"]);
    }

    #[tokio::test]
    async fn dependency_change_drops_payloads_from_the_old_subscription() {
        let adapter = ChannelAdapter::new();
        let mut dom = mount(&adapter).await;

        // Queued for the pump but not yet handed to the component.
        adapter.dispatch("device.updated", &json!("stale"));
        let mut deps = controls().deps;
        dom.in_runtime(|| deps.set(1));
        let _ = dom.render_immediate_to_vec();
        settle(&mut dom).await;

        assert_eq!(adapter.listener_count("device.updated"), 2);
        assert!(received().is_empty());

        assert_eq!(adapter.dispatch("device.updated", &json!("fresh")), 2);
        settle(&mut dom).await;
        let payloads: Vec<Value> = received().into_iter().map(|(_, p)| p).collect();
        assert_eq!(payloads, vec![json!("fresh"), json!("fresh")]);
    }

    #[tokio::test]
    async fn unmount_removes_the_listeners() {
        let adapter = ChannelAdapter::new();
        let mut dom = mount(&adapter).await;
        assert_eq!(adapter.listener_count("device.updated"), 2);

        let mut show = controls().show;
        dom.in_runtime(|| show.set(false));
        settle(&mut dom).await;

        assert_eq!(adapter.listener_count("device.updated"), 0);
        assert_eq!(adapter.dispatch("device.updated", &Value::Null), 0);
    }
}
