//! HTTP name services (ENS and compatible directories).
//!
//! Each service is a URL template with a `{name}` placeholder returning a JSON
//! object; the resolved address is read from a configurable field.

use async_trait::async_trait;
use grouper_core::{config::NameServiceConfig, error::GrouperError, traits::NameService};
use tracing::debug;

/// A name service reached over HTTP.
pub struct HttpNameService {
    client: reqwest::Client,
    name: String,
    url_template: String,
    address_field: String,
}

impl HttpNameService {
    pub fn from_config(config: &NameServiceConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: config.name.clone(),
            url_template: config.url_template.clone(),
            address_field: config.address_field.clone(),
        }
    }

    fn url_for(&self, handle: &str) -> String {
        self.url_template.replace("{name}", handle)
    }
}

/// Pull an address out of a name-service response body.
///
/// Accepts either an object or an array of objects (first match wins), and
/// only returns values that look like `0x` addresses.
pub(crate) fn extract_address(body: &serde_json::Value, field: &str) -> Option<String> {
    let candidate = match body {
        serde_json::Value::Array(items) => items
            .iter()
            .find_map(|item| item.get(field).and_then(|v| v.as_str())),
        other => other.get(field).and_then(|v| v.as_str()),
    }?;
    let candidate = candidate.trim();
    if is_address(candidate) {
        Some(candidate.to_string())
    } else {
        None
    }
}

/// `0x` followed by 40 hex digits.
pub fn is_address(s: &str) -> bool {
    s.len() == 42
        && (s.starts_with("0x") || s.starts_with("0X"))
        && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[async_trait]
impl NameService for HttpNameService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve_handle_to_address(
        &self,
        handle: &str,
    ) -> Result<Option<String>, GrouperError> {
        let url = self.url_for(handle);
        debug!("{}: GET {url}", self.name);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GrouperError::Directory(format!("{} request failed: {e}", self.name)))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GrouperError::Directory(format!(
                "{} returned {status}",
                self.name
            )));
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| {
            GrouperError::Directory(format!("{}: failed to parse response: {e}", self.name))
        })?;

        Ok(extract_address(&body, &self.address_field))
    }
}
