//! vSphere Automation REST client
//!
//! Session-based: one `POST /com/vmware/cis/session` with basic auth, then
//! every call carries the `vmware-api-session-id` header.

use crate::tags::{TagInfo, TaggingApi, VmSummary};
use async_trait::async_trait;
use labelsync_core::config::SourceConfig;
use labelsync_core::{Error, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;

/// Session header expected by the vSphere REST API
const SESSION_HEADER: &str = "vmware-api-session-id";

/// Connection settings
#[derive(Clone)]
pub struct VsphereSettings {
    /// REST base URL (e.g. `https://vcenter.example.com/rest`)
    pub api_url: String,
    pub api_user: String,
    /// ⚠️ NEVER log this value
    pub api_pass: String,
    pub verify_ssl: bool,
    pub timeout: Duration,
}

impl std::fmt::Debug for VsphereSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VsphereSettings")
            .field("api_url", &self.api_url)
            .field("api_user", &self.api_user)
            .field("api_pass", &"<REDACTED>")
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl VsphereSettings {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        match config {
            SourceConfig::Vsphere {
                api_url,
                api_user,
                api_pass,
                verify_ssl,
                timeout_secs,
            } => Ok(Self {
                api_url: api_url.trim_end_matches('/').to_string(),
                api_user: api_user.clone(),
                api_pass: api_pass.clone(),
                verify_ssl: *verify_ssl,
                timeout: Duration::from_secs(*timeout_secs),
            }),
            _ => Err(Error::config("Invalid config for vSphere source")),
        }
    }
}

/// Logged-in vSphere session
pub struct VsphereClient {
    api_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for VsphereClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VsphereClient")
            .field("api_url", &self.api_url)
            .field("session", &"<REDACTED>")
            .finish()
    }
}

impl VsphereClient {
    /// Open a session
    ///
    /// Errors are returned as the client saw them; the source maps them to
    /// `SourceUnavailable`.
    pub async fn login(settings: &VsphereSettings) -> Result<Self> {
        let base = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let response = base
            .post(format!("{}/com/vmware/cis/session", settings.api_url))
            .basic_auth(&settings.api_user, Some(&settings.api_pass))
            .send()
            .await
            .map_err(|e| Error::transport(format!("Login request failed: {}", e)))?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(Error::auth(format!(
                "vSphere rejected user '{}' (HTTP {})",
                settings.api_user, status
            )));
        }
        let body: Value = read_json(response, "Login").await?;
        let session_id = body
            .get("value")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed("Login response carries no session id", body.to_string()))?;

        let mut session = HeaderValue::from_str(session_id)
            .map_err(|_| Error::malformed("Session id is not a valid header value", ""))?;
        session.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, session);

        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        tracing::debug!("Opened vSphere session at {}", settings.api_url);
        Ok(Self {
            api_url: settings.api_url.clone(),
            client,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(format!("{}{}", self.api_url, path))
            .send()
            .await
            .map_err(|e| Error::transport(format!("GET {} failed: {}", path, e)))?;
        let envelope: ValueEnvelope<T> = read_json(response, path).await?;
        Ok(envelope.value)
    }
}

/// Every vSphere REST response wraps its payload in `{"value": ...}`
#[derive(serde::Deserialize)]
struct ValueEnvelope<T> {
    value: T,
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response, context: &str) -> Result<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| Error::transport(format!("{}: failed to read response: {}", context, e)))?;

    if !status.is_success() {
        return Err(Error::http_status(status.as_u16(), format!("{}: {}", context, text)));
    }

    serde_json::from_str(&text).map_err(|e| {
        tracing::warn!("vSphere returned an unexpected body for {}: {}", context, text);
        Error::malformed(e.to_string(), text)
    })
}

#[async_trait]
impl TaggingApi for VsphereClient {
    async fn list_vms(&self) -> Result<Vec<VmSummary>> {
        self.get("/vcenter/vm").await
    }

    async fn attached_tags(&self, vm_id: &str) -> Result<Vec<String>> {
        let path = "/com/vmware/cis/tagging/tag-association?~action=list-attached-tags";
        let response = self
            .client
            .post(format!("{}{}", self.api_url, path))
            .json(&json!({ "object_id": { "type": "VirtualMachine", "id": vm_id } }))
            .send()
            .await
            .map_err(|e| Error::transport(format!("Tag association for {} failed: {}", vm_id, e)))?;
        let envelope: ValueEnvelope<Vec<String>> = read_json(response, path).await?;
        Ok(envelope.value)
    }

    async fn get_tag(&self, tag_id: &str) -> Result<TagInfo> {
        self.get(&format!("/com/vmware/cis/tagging/tag/id:{}", tag_id)).await
    }

    async fn get_category(&self, category_id: &str) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct Category {
            name: String,
        }

        let category: Category = self
            .get(&format!("/com/vmware/cis/tagging/category/id:{}", category_id))
            .await?;
        Ok(category.name)
    }
}
