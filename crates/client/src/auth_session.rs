//! Persisted user session.
//!
//! The session lives in the key-value store as JSON. Reading it never fails:
//! a missing, corrupt, or expired blob is treated as "logged out".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{self, KeyValueStore};

const SESSION_KEY: &str = "session";

/// Stored session data
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user_id: String,
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Parse a persisted session blob. Returns `None` for anything that is not a
/// usable session.
pub fn parse_session(raw: &str) -> Option<AuthSession> {
    let session = serde_json::from_str::<AuthSession>(raw).ok()?;
    if session.user_id.trim().is_empty() || session.token.trim().is_empty() {
        return None;
    }
    Some(session)
}

/// Read the current session, dropping it if it has expired.
pub fn load_session(store: &impl KeyValueStore) -> Option<AuthSession> {
    let raw = store.get(&storage::namespaced(SESSION_KEY))?;
    let Some(session) = parse_session(&raw) else {
        crate::log_warn!("Discarding unreadable stored session");
        return None;
    };
    if session.is_expired_at(Utc::now()) {
        crate::log_info!("Stored session for {} has expired", session.user_id);
        return None;
    }
    Some(session)
}

pub fn save_session(store: &impl KeyValueStore, session: &AuthSession) -> bool {
    storage::save_json(store, SESSION_KEY, session)
}

pub fn clear_session(store: &impl KeyValueStore) {
    storage::remove(store, SESSION_KEY);
}
