//! Turns device alerts pushed over the realtime channel into notifications.

use fleetdeck_shared::{events, DeviceAlert, DeviceOffline, NotificationKind};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::channel::{use_channel_event, ChannelAdapter, Subscription};
use crate::notifications::NotificationStore;
use crate::providers::use_notifications;

/// Title, body and kind of the notification raised for an alert.
pub fn alert_notification(alert: &DeviceAlert) -> (NotificationKind, String, String) {
    (
        alert.severity.notification_kind(),
        format!("{}: {}", alert.device_name, alert.title),
        alert.message.clone(),
    )
}

pub fn offline_notification(offline: &DeviceOffline) -> (NotificationKind, String, String) {
    let message = match offline.last_seen {
        Some(at) => format!("Last seen {}", at.format("%Y-%m-%d %H:%M UTC")),
        None => "No contact since the dashboard opened".to_string(),
    };
    (
        NotificationKind::Warning,
        format!("{} went offline", offline.device_name),
        message,
    )
}

fn decode<T: DeserializeOwned>(event_name: &str, payload: &Value) -> Option<T> {
    match T::deserialize(payload) {
        Ok(value) => Some(value),
        Err(e) => {
            crate::log_warn!("Ignoring malformed '{}' payload: {}", event_name, e);
            None
        }
    }
}

fn raise_alert(store: &NotificationStore, payload: &Value) {
    if let Some(alert) = decode::<DeviceAlert>(events::DEVICE_ALERT, payload) {
        let (kind, title, message) = alert_notification(&alert);
        store.add(kind, title, message);
    }
}

fn raise_offline(store: &NotificationStore, payload: &Value) {
    if let Some(offline) = decode::<DeviceOffline>(events::DEVICE_OFFLINE, payload) {
        let (kind, title, message) = offline_notification(&offline);
        store.add(kind, title, message);
    }
}

/// Alert forwarding for code outside the component tree.
pub struct AlertBridge {
    subscriptions: Vec<Subscription>,
}

impl AlertBridge {
    pub fn stop(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

pub fn bridge_alerts(adapter: &ChannelAdapter, store: &NotificationStore) -> AlertBridge {
    let alert_store = store.clone();
    let offline_store = store.clone();
    AlertBridge {
        subscriptions: vec![
            adapter.subscribe(events::DEVICE_ALERT, move |payload| {
                raise_alert(&alert_store, payload)
            }),
            adapter.subscribe(events::DEVICE_OFFLINE, move |payload| {
                raise_offline(&offline_store, payload)
            }),
        ],
    }
}

/// Component-scoped version of [`bridge_alerts`].
pub fn use_alert_notifications() {
    let notifications = use_notifications();

    let store = notifications.store.clone();
    use_channel_event(events::DEVICE_ALERT, (), move |payload| {
        raise_alert(&store, &payload)
    });

    let store = notifications.store.clone();
    use_channel_event(events::DEVICE_OFFLINE, (), move |payload| {
        raise_offline(&store, &payload)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn alert_frames_become_notifications() {
        let adapter = ChannelAdapter::new();
        let store = NotificationStore::new();
        let bridge = bridge_alerts(&adapter, &store);

        adapter.handle_frame(
            &json!({
                "eventName": "device.alert",
                "payload": {
                    "deviceId": "d-9",
                    "deviceName": "Chiller 2",
                    "severity": "critical",
                    "title": "Compressor fault",
                    "message": "Pressure above 18 bar"
                }
            })
            .to_string(),
        );

        let list = store.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, NotificationKind::Error);
        assert_eq!(list[0].title, "Chiller 2: Compressor fault");
        assert_eq!(list[0].message, "Pressure above 18 bar");

        bridge.stop();
        assert_eq!(adapter.listener_count(events::DEVICE_ALERT), 0);
        assert_eq!(adapter.listener_count(events::DEVICE_OFFLINE), 0);
    }

    #[test]
    fn offline_frames_become_warnings() {
        let adapter = ChannelAdapter::new();
        let store = NotificationStore::new();
        let _bridge = bridge_alerts(&adapter, &store);

        adapter.dispatch(
            events::DEVICE_OFFLINE,
            &json!({
                "deviceId": "d-1",
                "deviceName": "Gateway 2",
                "lastSeen": "2026-05-04T08:30:00Z"
            }),
        );

        let n = &store.list()[0];
        assert_eq!(n.kind, NotificationKind::Warning);
        assert_eq!(n.title, "Gateway 2 went offline");
        assert_eq!(n.message, "Last seen 2026-05-04 08:30 UTC");
    }

    #[test]
    fn malformed_alert_is_ignored() {
        let adapter = ChannelAdapter::new();
        let store = NotificationStore::new();
        let _bridge = bridge_alerts(&adapter, &store);

        adapter.dispatch(events::DEVICE_ALERT, &json!({ "deviceId": 5 }));
        assert!(store.is_empty());
    }
}
