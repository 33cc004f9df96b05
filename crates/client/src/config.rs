//! Client configuration.
//!
//! Desktop builds read overrides from the environment:
//! - `FLEETDECK_API_URL`: REST base URL (default: `http://localhost:8080`, same origin on the web)
//! - `FLEETDECK_SOCKET_PATH`: realtime endpoint path (default: `/ws`)
//! - `FLEETDECK_NOTIFICATION_CAPACITY`: max retained notifications, `0` = unbounded (default: unbounded)
//! - `FLEETDECK_RECONNECT_MAX_ATTEMPTS`: `0` = retry forever (default: 10)
//! - `FLEETDECK_RECONNECT_INITIAL_MS` / `FLEETDECK_RECONNECT_MAX_MS`: backoff bounds

use std::str::FromStr;

use url::Url;

use crate::auth_session::AuthSession;
use crate::channel::ReconnectConfig;

#[cfg(not(target_arch = "wasm32"))]
pub const DEFAULT_API_URL: &str = "http://localhost:8080";
#[cfg(target_arch = "wasm32")]
pub const DEFAULT_API_URL: &str = "";

pub const DEFAULT_SOCKET_PATH: &str = "/ws";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// REST base URL without trailing slash. Empty means "same origin".
    pub api_base_url: String,
    pub socket_path: String,
    pub notification_capacity: Option<usize>,
    pub reconnect: ReconnectConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            notification_capacity: None,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Invalid values are
    /// logged and replaced by their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("FLEETDECK_API_URL") {
            config.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(path) = lookup("FLEETDECK_SOCKET_PATH") {
            let path = path.trim();
            if !path.is_empty() {
                config.socket_path = if path.starts_with('/') {
                    path.to_string()
                } else {
                    format!("/{path}")
                };
            }
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, "FLEETDECK_NOTIFICATION_CAPACITY") {
            config.notification_capacity = (capacity > 0).then_some(capacity);
        }
        if let Some(max) = parse_var(&lookup, "FLEETDECK_RECONNECT_MAX_ATTEMPTS") {
            config.reconnect.max_attempts = max;
        }
        if let Some(initial) = parse_var(&lookup, "FLEETDECK_RECONNECT_INITIAL_MS") {
            config.reconnect.initial_delay_ms = initial;
        }
        if let Some(max_delay) = parse_var(&lookup, "FLEETDECK_RECONNECT_MAX_MS") {
            config.reconnect.max_delay_ms = max_delay;
        }

        config
    }

    /// WebSocket URL of the realtime endpoint, carrying the session token
    /// when one is available.
    pub fn socket_url(&self, session: Option<&AuthSession>) -> Option<String> {
        let base = if self.api_base_url.is_empty() {
            current_origin()?
        } else {
            self.api_base_url.clone()
        };

        let mut url = match Url::parse(&base).and_then(|u| u.join(&self.socket_path)) {
            Ok(url) => url,
            Err(e) => {
                crate::log_warn!("Invalid API base URL '{}': {}", base, e);
                return None;
            }
        };

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        if url.set_scheme(scheme).is_err() {
            crate::log_warn!("Cannot derive a socket URL from '{}'", base);
            return None;
        }

        if let Some(session) = session {
            url.query_pairs_mut().append_pair("token", &session.token);
        }

        Some(url.to_string())
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            crate::log_warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn current_origin() -> Option<String> {
    web_sys::window()?.location().origin().ok()
}

#[cfg(not(target_arch = "wasm32"))]
fn current_origin() -> Option<String> {
    None
}
