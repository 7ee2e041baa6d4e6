//! Messaging platform bridge.
//!
//! Talks JSON over HTTP to a bridge process that holds the platform
//! identity and keys. Inbound events arrive by long polling `GET /v1/events`;
//! every group operation is a single REST call.

mod conversation;
mod polling;
pub(crate) mod types;


use grouper_core::{config::PlatformConfig, error::GrouperError, error::PlatformError};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;
use types::{decode_error, WireMe};

/// Shared HTTP plumbing used by the platform and by every conversation handle.
#[derive(Clone)]
pub(crate) struct BridgeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BridgeClient {
    pub(crate) fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn builder(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let req = self.client.request(method, self.url(path));
        if self.api_key.is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }

    /// Send a request and decode the JSON body. `Ok(None)` on 404.
    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Option<T>, PlatformError> {
        let mut req = self.builder(method, path);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| PlatformError::with_code(format!("bridge request failed: {e}"), "NETWORK"))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let text = resp.text().await.map_err(|e| {
            PlatformError::with_code(
                format!("bridge: reading {status} body failed: {e}"),
                "NETWORK",
            )
        })?;
        if !status.is_success() {
            return Err(decode_error(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            // Empty 2xx bodies decode as JSON null.
            return serde_json::from_str("null")
                .map(Some)
                .map_err(|e| PlatformError::new(format!("bridge: unexpected empty body: {e}")));
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| PlatformError::new(format!("bridge: failed to parse response: {e}")))
    }

    /// Like [`call`](Self::call) but a 404 is an error.
    pub(crate) async fn call_required<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T, PlatformError> {
        self.call(method, path, body)
            .await?
            .ok_or_else(|| PlatformError::with_code(format!("{path} not found"), "NOT_FOUND"))
    }
}

/// Messaging platform reached through the bridge.
pub struct BridgePlatform {
    http: BridgeClient,
    inbox_id: String,
    address: Option<String>,
    poll_timeout_secs: u64,
    /// Cursor of the last consumed event page.
    cursor: Arc<Mutex<Option<String>>>,
    /// The long-poll task, while running.
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl BridgePlatform {
    /// Connect to the bridge and learn the agent's own identity.
    pub async fn connect(config: &PlatformConfig) -> Result<Self, GrouperError> {
        let http = BridgeClient::new(&config.base_url, &config.api_key);
        let me: WireMe = http.call_required(Method::GET, "/v1/me", None).await?;
        info!(
            "bridge connected as {} ({})",
            me.inbox_id,
            me.address.as_deref().unwrap_or("no address")
        );
        Ok(Self::with_identity(
            http,
            me.inbox_id,
            me.address,
            config.poll_timeout_secs,
        ))
    }

    fn with_identity(
        http: BridgeClient,
        inbox_id: String,
        address: Option<String>,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            http,
            inbox_id,
            address,
            poll_timeout_secs,
            cursor: Arc::new(Mutex::new(None)),
            poller: Mutex::new(None),
        }
    }

    /// Wallet address of the agent, if the bridge reported one.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
}
