//! Fleetdeck Client - realtime event delivery for the device dashboard
//!
//! This crate contains the socket channel adapter, the per-component
//! subscription hook, and the notification store the dashboard UI is built
//! on, plus the storage, session and REST plumbing around them.

pub mod logging;

pub mod alerts;
pub mod api_client;
pub mod auth_session;
pub mod channel;
pub mod config;
pub mod notifications;
pub mod providers;
pub mod storage;

pub mod components;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod test_support;

pub use alerts::{bridge_alerts, use_alert_notifications, AlertBridge};
pub use api_client::ApiClient;
pub use auth_session::AuthSession;
pub use channel::{use_channel_event, ChannelAdapter, ChannelEventHandle, ConnectionState, Subscription};
pub use config::ClientConfig;
pub use notifications::{Notification, NotificationStore, Toast};
pub use providers::{use_channel_adapter, use_notifications, NotificationsContext, RealtimeProvider};
