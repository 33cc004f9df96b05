//! Fleetdeck Client - Main entry point
//!
//! A small dashboard wired to the realtime channel: live device updates,
//! device alerts surfaced as notifications, and the notification center.
//! Supports both web (WASM) and desktop platforms.

#![allow(non_snake_case)]

use anyhow::Context;
use dioxus::prelude::*;
use fleetdeck_client::{
    api_client::ApiClient,
    auth_session::load_session,
    components::NotificationCenter,
    config::ClientConfig,
    storage::LocalStore,
    use_alert_notifications, use_channel_adapter, use_channel_event, use_notifications,
    RealtimeProvider,
};
use fleetdeck_shared::{events, Device, DeviceStatus};

fn main() {
    // Initialize tracing for desktop
    #[cfg(not(target_arch = "wasm32"))]
    {
        use tracing_subscriber::EnvFilter;
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("fleetdeck_client=debug")),
            )
            .init();
    }

    dioxus::launch(App);
}

#[component]
fn App() -> Element {
    rsx! {
        RealtimeProvider {
            Dashboard {}
        }
    }
}

async fn load_devices(client: ApiClient) -> anyhow::Result<Vec<Device>> {
    let page = client
        .list_devices(1, 50)
        .await
        .context("loading device list")?;
    Ok(page.data)
}

#[component]
fn Dashboard() -> Element {
    use_alert_notifications();
    let notifications = use_notifications();
    let mut devices = use_signal(Vec::<Device>::new);

    let toast = notifications.toast();
    let initial = use_resource(move || {
        let toast = toast.clone();
        async move {
            let config = ClientConfig::from_env();
            let session = load_session(&LocalStore::new());
            let client = ApiClient::new()
                .with_base_url(config.api_base_url)
                .with_session(session.as_ref())
                .with_toast(toast);
            load_devices(client).await.map_err(|e| format!("{e:#}"))
        }
    });

    use_effect(move || {
        if let Some(Ok(list)) = &*initial.read() {
            devices.set(list.clone());
        }
    });

    let feed = use_channel_event(events::DEVICE_UPDATED, (), move |payload| {
        match serde_json::from_value::<Device>(payload) {
            Ok(device) => {
                let mut list = devices.write();
                match list.iter_mut().find(|d| d.id == device.id) {
                    Some(existing) => *existing = device,
                    None => list.push(device),
                }
            }
            Err(e) => fleetdeck_client::log_warn!("Ignoring device update: {}", e),
        }
    });

    rsx! {
        div { class: "flex min-h-screen gap-6 bg-slate-900 p-6 text-slate-100",
            main { class: "flex-1",
                header { class: "mb-4 flex items-center justify-between",
                    h1 { class: "text-lg font-semibold", "Devices" }
                    ConnectionBadge { connected: feed.is_connected() }
                }
                DeviceTable { devices: devices() }
            }
            NotificationCenter {}
        }
    }
}

#[component]
fn ConnectionBadge(connected: bool) -> Element {
    let adapter = use_channel_adapter();
    let label = if connected {
        "Live".to_string()
    } else {
        format!("{:?}", adapter.state())
    };
    let color = if connected { "bg-emerald-600" } else { "bg-slate-600" };
    rsx! {
        span { class: "rounded-full px-3 py-1 text-xs {color}", "{label}" }
    }
}

#[component]
fn DeviceTable(devices: Vec<Device>) -> Element {
    if devices.is_empty() {
        return rsx! {
            p { class: "text-sm text-slate-400", "No devices yet" }
        };
    }
    rsx! {
        table { class: "w-full text-left text-sm",
            thead {
                tr {
                    th { "Name" }
                    th { "Type" }
                    th { "Status" }
                    th { "Location" }
                }
            }
            tbody {
                for device in devices {
                    tr { key: "{device.id}",
                        td { "{device.name}" }
                        td { "{device.device_type}" }
                        td { class: status_class(device.status), "{device.status:?}" }
                        td { {device.location.clone().unwrap_or_else(|| "-".to_string())} }
                    }
                }
            }
        }
    }
}

fn status_class(status: DeviceStatus) -> &'static str {
    match status {
        DeviceStatus::Online => "text-emerald-400",
        DeviceStatus::Offline => "text-slate-400",
        DeviceStatus::Maintenance => "text-amber-400",
        DeviceStatus::Error => "text-rose-400",
    }
}
