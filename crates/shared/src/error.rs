//! REST response envelopes and the client-side API error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard response envelope returned by every `/api/*` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub success: bool,
}

/// Envelope for list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Attempt to pull a user-facing message out of an error response body.
/// Prefers `message`, falls back to `error`.
pub fn try_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok()?;
    [parsed.message, parsed.error]
        .into_iter()
        .flatten()
        .find(|m| !m.trim().is_empty())
}

/// API error type for client-side use
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    /// The server answered 2xx but with `success: false`.
    #[error("Request rejected: {message}")]
    Rejected { message: String },
}

impl ApiError {
    /// Short text suitable for a toast body.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => "Network unavailable, please try again".to_string(),
            ApiError::Http { status, body } => try_error_message(body)
                .unwrap_or_else(|| format!("Server responded with status {}", status)),
            ApiError::Deserialize(_) => "Unexpected response from server".to_string(),
            ApiError::Rejected { message } => message.clone(),
        }
    }
}
