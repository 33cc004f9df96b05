//! HTTP API client for the device-management backend.
//!
//! Every endpoint answers with an [`ApiResponse`] envelope (or [`Paginated`]
//! for lists). Failures are returned to the caller and, when a [`Toast`] is
//! attached, also surfaced to the user as an error notification.

use fleetdeck_shared::{ApiError, ApiResponse, Device, Paginated};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth_session::AuthSession;
use crate::notifications::Toast;

#[derive(Debug, Clone, Default)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    toast: Option<Toast>,
}

impl ApiClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL for API requests
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Authenticate requests with the session's bearer token.
    pub fn with_session(mut self, session: Option<&AuthSession>) -> Self {
        self.token = session.map(|s| s.token.clone());
        self
    }

    /// Report failed requests through `toast.error`.
    pub fn with_toast(mut self, toast: Toast) -> Self {
        self.toast = Some(toast);
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if self.base_url.is_empty() {
            if path.starts_with('/') {
                path.to_string()
            } else {
                format!("/{path}")
            }
        } else {
            let base = self.base_url.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            format!("{base}/{path}")
        }
    }

    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }

    fn report(&self, what: &str, err: &ApiError) {
        crate::log_error!("{} failed: {}", what, err);
        if let Some(toast) = &self.toast {
            toast.error(format!("{} failed", what), err.user_message());
        }
    }

    async fn fetch_text(&self, rb: RequestBuilder) -> Result<String, ApiError> {
        let resp = self
            .authorize(rb)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let is_success = resp.status().is_success();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("failed to read body: {e}")))?;

        if !is_success {
            return Err(ApiError::Http { status, body: text });
        }
        Ok(text)
    }

    async fn execute<T: DeserializeOwned>(&self, what: &str, rb: RequestBuilder) -> Result<T, ApiError> {
        let result = self
            .fetch_text(rb)
            .await
            .and_then(|text| decode_envelope(&text));
        if let Err(err) = &result {
            self.report(what, err);
        }
        result
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let rb = self.client.get(self.url(path));
        self.execute(&format!("GET {path}"), rb).await
    }

    pub async fn post_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let rb = self.client.post(self.url(path)).json(body);
        self.execute(&format!("POST {path}"), rb).await
    }

    pub async fn put_json<TReq: Serialize, TRes: DeserializeOwned>(
        &self,
        path: &str,
        body: &TReq,
    ) -> Result<TRes, ApiError> {
        let rb = self.client.put(self.url(path)).json(body);
        self.execute(&format!("PUT {path}"), rb).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let rb = self.client.delete(self.url(path));
        self.execute::<serde_json::Value>(&format!("DELETE {path}"), rb)
            .await
            .map(|_| ())
    }

    /// Fetch one page of a list endpoint.
    pub async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        page: u32,
        limit: u32,
    ) -> Result<Paginated<T>, ApiError> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let full = format!("{path}{separator}page={page}&limit={limit}");
        let rb = self.client.get(self.url(&full));
        let result = self.fetch_text(rb).await.and_then(|text| {
            serde_json::from_str::<Paginated<T>>(&text)
                .map_err(|e| ApiError::Deserialize(e.to_string()))
        });
        if let Err(err) = &result {
            self.report(&format!("GET {path}"), err);
        }
        result
    }

    pub async fn list_devices(&self, page: u32, limit: u32) -> Result<Paginated<Device>, ApiError> {
        self.get_page("/api/devices", page, limit).await
    }

    pub async fn get_device(&self, id: &str) -> Result<Device, ApiError> {
        self.get_json(&format!("/api/devices/{id}")).await
    }
}

/// Unwrap the `{ data, message?, success }` envelope. An empty body decodes
/// as JSON `null`.
pub(crate) fn decode_envelope<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    if text.trim().is_empty() {
        return serde_json::from_str("null").map_err(|e| ApiError::Deserialize(e.to_string()));
    }
    let envelope: ApiResponse<serde_json::Value> =
        serde_json::from_str(text).map_err(|e| ApiError::Deserialize(e.to_string()))?;
    if !envelope.success {
        return Err(ApiError::Rejected {
            message: envelope
                .message
                .unwrap_or_else(|| "Request was not successful".to_string()),
        });
    }
    T::deserialize(envelope.data).map_err(|e| ApiError::Deserialize(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationStore;
    use fleetdeck_shared::{DeviceStatus, NotificationKind};

    #[test]
    fn url_joins_base_and_path() {
        let client = ApiClient::new().with_base_url("https://iot.example.com/");
        assert_eq!(client.url("/api/devices"), "https://iot.example.com/api/devices");
        assert_eq!(client.url("api/devices"), "https://iot.example.com/api/devices");
        assert_eq!(client.url("http://other/x"), "http://other/x");
        assert_eq!(ApiClient::new().url("api/devices"), "/api/devices");
    }

    #[test]
    fn envelope_is_unwrapped() {
        let device: Device = decode_envelope(
            r#"{"data":{"id":"d-1","name":"Pump","deviceType":"actuator","status":"maintenance"},"success":true}"#,
        )
        .unwrap();
        assert_eq!(device.status, DeviceStatus::Maintenance);
    }

    #[test]
    fn unsuccessful_envelope_is_rejected() {
        let err = decode_envelope::<Device>(r#"{"data":null,"message":"Device locked","success":false}"#)
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Rejected {
                message: "Device locked".to_string()
            }
        );
    }

    #[test]
    fn empty_body_is_accepted_when_nothing_is_expected() {
        assert_eq!(decode_envelope::<Option<Device>>("").unwrap(), None);
        assert!(matches!(
            decode_envelope::<Device>(""),
            Err(ApiError::Deserialize(_))
        ));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn network_failure_raises_error_toast() {
        let store = NotificationStore::new();
        // port 9 on loopback is not served in test environments
        let client = ApiClient::new()
            .with_base_url("http://127.0.0.1:9")
            .with_toast(store.toast());

        let result = client.get_device("d-1").await;
        assert!(matches!(result, Err(ApiError::Network(_))));

        let list = store.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind, NotificationKind::Error);
        assert_eq!(list[0].title, "GET /api/devices/d-1 failed");
        assert_eq!(list[0].message, "Network unavailable, please try again");
    }
}
