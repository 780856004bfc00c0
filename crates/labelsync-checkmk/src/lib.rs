// # Checkmk Configuration API
//
// This crate provides the Checkmk REST API implementation of `ConfigApi`.
//
// ## Implementation Status
//
// - ✅ Makes one HTTP request per trait call (plus one read when no etag is supplied)
// - ✅ Full error propagation to the engine (engine handles retries)
// - ✅ HTTP timeout configured (default 30 seconds)
// - ✅ Status codes mapped to the error taxonomy (401/403, 404, 412/428, other)
// - ✅ Etag sent as `If-Match` on every host write
// - ✅ URL and secret discovery from the local site
// - ❌ NO retry logic (owned by SyncEngine)
// - ❌ NO label merging (the full set is sent, merge is owned by SyncEngine)
// - ❌ NO waiting for activation to complete
//
// ## Trust Level: Untrusted (Configuration API)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS calls to the configured Checkmk site only
// - ✅ Read the automation secret of the configured user from the site
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic
// - ❌ Cache host state between calls
//
// ## Security Requirements
//
// - The automation secret NEVER appears in logs or Debug output
// - The factory fails with `Error::Authentication` if no secret is usable
//
// ## API Reference
//
// - Read host: GET `objects/host_config/{host}?effective_attributes=false` (ETag header)
// - List hosts: GET `domain-types/host_config/collections/all`
// - Update host: PUT `objects/host_config/{host}` with `If-Match`
// - Activate: POST `domain-types/activation_run/actions/activate-changes/invoke`

pub mod site;

use async_trait::async_trait;
use labelsync_core::config::ApiConfig;
use labelsync_core::traits::{ConfigApi, ConfigApiFactory};
use labelsync_core::{ActivationHandle, Error, Etag, HostRecord, LabelSet, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved connection settings
///
/// Built from [`ApiConfig::Checkmk`] by [`CheckmkSettings::from_config`],
/// which derives the URL and reads the secret from the local site when
/// they are not configured.
#[derive(Clone)]
pub struct CheckmkSettings {
    /// API base URL, ending in `/check_mk/api/1.0`
    pub url: String,
    /// Automation user
    pub username: String,
    /// Automation secret
    /// ⚠️ NEVER log this value
    pub secret: String,
    /// Verify the server's TLS certificate
    pub verify_ssl: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

// Custom Debug implementation that hides the secret
impl std::fmt::Debug for CheckmkSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckmkSettings")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("secret", &"<REDACTED>")
            .field("verify_ssl", &self.verify_ssl)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CheckmkSettings {
    /// Resolve settings from configuration
    ///
    /// # Returns
    ///
    /// - `Err(Error::Authentication)`: no secret configured and none found in the site
    /// - `Err(Error::Config)`: no URL configured and the site URL cannot be derived
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let ApiConfig::Checkmk {
            url,
            username,
            secret,
            omd_root,
            omd_site,
            verify_ssl,
            timeout_secs,
        } = config
        else {
            return Err(Error::config("Invalid config for Checkmk API"));
        };

        let url = match url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let root = require_omd_root(omd_root)?;
                let site = omd_site
                    .as_deref()
                    .ok_or_else(|| Error::config("omd_site is required to derive the site URL"))?;
                site::resolve_site_url(root, site)?
            }
        };

        let secret = match secret.as_deref().map(str::trim) {
            Some(secret) if !secret.is_empty() => secret.to_string(),
            _ => match omd_root {
                Some(root) => site::resolve_secret(root, username)?,
                None => {
                    return Err(Error::auth(format!(
                        "No automation secret configured for user '{}'",
                        username
                    )));
                }
            },
        };

        Ok(Self {
            url,
            username: username.clone(),
            secret,
            verify_ssl: *verify_ssl,
            timeout: Duration::from_secs(*timeout_secs),
        })
    }
}

fn require_omd_root(omd_root: &Option<PathBuf>) -> Result<&PathBuf> {
    omd_root
        .as_ref()
        .ok_or_else(|| Error::config("omd_root is required to derive the site URL"))
}

/// Checkmk REST API client
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot. All coordination (retries, merging, when to
/// activate) is owned by `SyncEngine`.
///
/// # Security
///
/// The automation secret lives only inside the client's default headers,
/// marked sensitive.
pub struct CheckmkClient {
    /// API base URL
    base_url: String,

    /// Automation user, for logging
    username: String,

    /// HTTP client with authentication headers
    client: reqwest::Client,
}

impl std::fmt::Debug for CheckmkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckmkClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("credentials", &"<REDACTED>")
            .finish()
    }
}

impl CheckmkClient {
    /// Build an authenticated client
    ///
    /// Every request carries `Authorization: Bearer <user> <secret>` and
    /// `Accept: application/json`. Redirects are never followed.
    pub fn authenticate(settings: &CheckmkSettings) -> Result<Self> {
        if settings.secret.is_empty() {
            return Err(Error::auth("Checkmk automation secret cannot be empty"));
        }

        let mut auth = HeaderValue::from_str(&format!(
            "Bearer {} {}",
            settings.username, settings.secret
        ))
        .map_err(|_| Error::auth("Automation user or secret contains invalid characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        if !settings.verify_ssl {
            tracing::warn!("TLS certificate verification disabled for {}", settings.url);
        }

        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .default_headers(headers)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// `objects/host_config/{hostname}` with the hostname escaped as one path segment
    fn host_endpoint(&self, hostname: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.endpoint("objects/host_config"))
            .map_err(|e| Error::config(format!("Invalid API URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::config(format!("API URL {} cannot carry a path", self.base_url)))?
            .push(hostname);
        Ok(url)
    }

    /// Send a request; network failures become transport errors
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| Error::transport(format!("HTTP request failed: {}", e)))
    }

    /// Parse a successful response as JSON
    async fn json_body(response: reqwest::Response) -> Result<Value> {
        let text = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("Failed to read response: {}", e)))?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::warn!("Checkmk returned a non-JSON body: {}", text);
            Error::malformed(e.to_string(), text)
        })
    }

    /// Turn a non-2xx response into an error
    async fn status_error(response: reqwest::Response, context: &str) -> Error {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        map_status(status, context, &body)
    }

    async fn read_host(&self, hostname: &str) -> Result<(HostRecord, Etag)> {
        let request = self
            .client
            .get(self.host_endpoint(hostname)?)
            .query(&[("effective_attributes", "false")]);
        let response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, &format!("Host {}", hostname)).await);
        }

        let etag = response_etag(&response).ok_or_else(|| {
            Error::malformed(format!("No ETag header on host {}", hostname), "")
        })?;
        let body = Self::json_body(response).await?;
        let record = parse_host(&body)
            .ok_or_else(|| Error::malformed(format!("Unexpected host object for {}", hostname), body.to_string()))?;

        tracing::debug!("Read host {} ({} label(s), etag {})", hostname, record.labels.len(), etag);
        Ok((record, etag))
    }
}

#[async_trait]
impl ConfigApi for CheckmkClient {
    async fn get_host(&self, hostname: &str) -> Result<(HostRecord, Etag)> {
        self.read_host(hostname).await
    }

    async fn list_hosts(&self, effective_attributes: bool) -> Result<BTreeMap<String, HostRecord>> {
        let request = self
            .client
            .get(self.endpoint("domain-types/host_config/collections/all"))
            .query(&[(
                "effective_attributes",
                if effective_attributes { "true" } else { "false" },
            )]);
        let response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, "Host collection").await);
        }

        let body = Self::json_body(response).await?;
        let hosts: BTreeMap<String, HostRecord> = body
            .get("value")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(parse_host)
                    .map(|host| (host.hostname.clone(), host))
                    .collect()
            })
            .unwrap_or_default();

        tracing::debug!("Listed {} host(s)", hosts.len());
        Ok(hosts)
    }

    async fn update_host_labels(
        &self,
        hostname: &str,
        labels: &LabelSet,
        etag: Option<&Etag>,
    ) -> Result<Etag> {
        let etag = match etag {
            Some(etag) => etag.clone(),
            None => self.read_host(hostname).await?.1,
        };

        let payload = json!({ "update_attributes": { "labels": labels } });
        let request = self
            .client
            .put(self.host_endpoint(hostname)?)
            .header(header::IF_MATCH, etag.as_str())
            .json(&payload);
        let response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, &format!("Host {}", hostname)).await);
        }

        match response_etag(&response) {
            Some(new_etag) => Ok(new_etag),
            None => {
                tracing::debug!("No ETag on update response for {}", hostname);
                Ok(etag)
            }
        }
    }

    async fn activate_changes(&self, sites: &[String], force_foreign: bool) -> Result<ActivationHandle> {
        let payload = json!({
            "redirect": false,
            "sites": sites,
            "force_foreign_changes": force_foreign,
        });
        let request = self
            .client
            .post(self.endpoint("domain-types/activation_run/actions/activate-changes/invoke"))
            .header(header::IF_MATCH, "*")
            .json(&payload);
        let response = self.send(request).await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, "Activation").await);
        }

        let body = Self::json_body(response).await?;
        Ok(ActivationHandle {
            id: body.get("id").and_then(Value::as_str).map(str::to_string),
            sites: sites.to_vec(),
            body,
        })
    }

    fn api_name(&self) -> &'static str {
        "checkmk"
    }
}

/// Map a non-2xx status to the error taxonomy
pub fn map_status(status: u16, context: &str, body: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "{}: credentials rejected (HTTP {}): {}",
            context, status, body
        )),
        404 => Error::not_found(context.to_string()),
        412 | 428 => Error::conflict(format!(
            "{}: etag rejected (HTTP {}): {}",
            context, status, body
        )),
        _ => Error::http_status(status, format!("{}: {}", context, body)),
    }
}

fn response_etag(response: &reqwest::Response) -> Option<Etag> {
    response
        .headers()
        .get(header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(Etag::new)
}

/// Parse a `host_config` domain object
///
/// ```json
/// {"id": "web01", "extensions": {"folder": "/", "attributes": {"labels": {...}}}}
/// ```
pub fn parse_host(object: &Value) -> Option<HostRecord> {
    let hostname = object.get("id")?.as_str()?;
    let extensions = object.get("extensions")?;
    let folder = extensions
        .get("folder")
        .and_then(Value::as_str)
        .map(str::to_string);
    let attributes = extensions
        .get("attributes")
        .cloned()
        .unwrap_or_else(|| json!({}));
    Some(HostRecord::from_attributes(hostname, folder, attributes))
}

/// Factory for creating Checkmk clients
pub struct CheckmkFactory;

impl ConfigApiFactory for CheckmkFactory {
    fn create(&self, config: &ApiConfig) -> Result<Box<dyn ConfigApi>> {
        let settings = CheckmkSettings::from_config(config)?;
        tracing::info!("Using Checkmk API at {} as {}", settings.url, settings.username);
        Ok(Box::new(CheckmkClient::authenticate(&settings)?))
    }
}

/// Register the Checkmk API with a registry
///
/// # Example
///
/// ```rust
/// use labelsync_core::SourceRegistry;
///
/// let registry = SourceRegistry::new();
/// labelsync_checkmk::register(&registry);
/// assert!(registry.has_api("checkmk"));
/// ```
pub fn register(registry: &labelsync_core::SourceRegistry) {
    registry.register_api("checkmk", Box::new(CheckmkFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn checkmk_config(url: Option<&str>, secret: Option<&str>, omd_root: Option<PathBuf>) -> ApiConfig {
        ApiConfig::Checkmk {
            url: url.map(str::to_string),
            username: "automation".to_string(),
            secret: secret.map(str::to_string),
            omd_root,
            omd_site: Some("mysite".to_string()),
            verify_ssl: true,
            timeout_secs: 5,
        }
    }

    /// Canned HTTP response: status line, extra headers, body
    type Canned = (&'static str, &'static str, &'static str);

    /// Read one HTTP request (head and body) from `socket`
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Serve the canned responses in order, one connection each, and record
    /// every raw request
    async fn serve(responses: Vec<Canned>) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_by_server = Arc::clone(&seen);

        tokio::spawn(async move {
            for (status, headers, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                seen_by_server.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    headers,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });

        (format!("http://{}/mysite/check_mk/api/1.0", addr), seen)
    }

    /// Serve one canned response
    async fn serve_once(status: &'static str, headers: &'static str, body: &'static str) -> (String, Arc<Mutex<Vec<String>>>) {
        serve(vec![(status, headers, body)]).await
    }

    fn request(seen: &Arc<Mutex<Vec<String>>>, index: usize) -> String {
        seen.lock().unwrap()[index].clone()
    }

    fn client_for(url: &str) -> CheckmkClient {
        let settings = CheckmkSettings::from_config(&checkmk_config(Some(url), Some("s3cr3t"), None)).unwrap();
        CheckmkClient::authenticate(&settings).unwrap()
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(map_status(401, "Host a", ""), Error::Authentication(_)));
        assert!(matches!(map_status(403, "Host a", ""), Error::Authentication(_)));
        assert!(matches!(map_status(404, "Host a", ""), Error::NotFound(_)));
        assert!(matches!(map_status(412, "Host a", ""), Error::ConcurrencyConflict(_)));
        assert!(matches!(map_status(428, "Host a", ""), Error::ConcurrencyConflict(_)));
        assert!(matches!(
            map_status(500, "Host a", "boom"),
            Error::Transport { status: Some(500), .. }
        ));
    }

    #[test]
    fn parses_host_object() {
        let object = json!({
            "id": "web01",
            "extensions": {
                "folder": "/linux",
                "attributes": {"ipaddress": "10.0.0.1", "labels": {"hwsw/os": "linux", "team": "ops"}}
            }
        });

        let host = parse_host(&object).unwrap();
        assert_eq!(host.hostname, "web01");
        assert_eq!(host.folder.as_deref(), Some("/linux"));
        assert_eq!(host.labels.len(), 2);
        assert_eq!(host.attributes["ipaddress"], "10.0.0.1");
    }

    #[test]
    fn host_without_labels_has_empty_set() {
        let object = json!({"id": "web01", "extensions": {"attributes": {}}});
        assert!(parse_host(&object).unwrap().labels.is_empty());
        assert!(parse_host(&json!({"title": "no id"})).is_none());
    }

    #[test]
    fn secret_from_site_file() {
        let root = tempfile::tempdir().unwrap();
        let path = site::secret_path(root.path(), "automation");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "from-file\n").unwrap();

        let config = checkmk_config(Some("https://cmk.example.com/mysite/check_mk/api/1.0/"), None, Some(root.path().to_path_buf()));
        let settings = CheckmkSettings::from_config(&config).unwrap();

        assert_eq!(settings.secret, "from-file");
        assert_eq!(settings.url, "https://cmk.example.com/mysite/check_mk/api/1.0");
    }

    #[test]
    fn missing_secret_is_auth_error() {
        let config = checkmk_config(Some("https://cmk.example.com"), None, None);
        assert!(matches!(
            CheckmkSettings::from_config(&config),
            Err(Error::Authentication(_))
        ));

        let factory = CheckmkFactory;
        assert!(matches!(factory.create(&config), Err(Error::Authentication(_))));
    }

    #[test]
    fn url_derived_from_site() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("etc/apache")).unwrap();
        std::fs::write(root.path().join("etc/apache/listen-port.conf"), "Listen 127.0.0.1:5002\n").unwrap();

        let config = checkmk_config(None, Some("s3cr3t"), Some(root.path().to_path_buf()));
        let settings = CheckmkSettings::from_config(&config).unwrap();

        assert_eq!(settings.url, "http://127.0.0.1:5002/mysite/check_mk/api/1.0");
    }

    #[test]
    fn secret_not_exposed_in_debug() {
        let config = checkmk_config(Some("https://cmk.example.com"), Some("secret_token_12345"), None);
        let settings = CheckmkSettings::from_config(&config).unwrap();
        let client = CheckmkClient::authenticate(&settings).unwrap();

        assert!(!format!("{:?}", settings).contains("secret_token_12345"));
        assert!(!format!("{:?}", client).contains("secret_token_12345"));
        assert!(format!("{:?}", client).contains("CheckmkClient"));
    }

    #[tokio::test]
    async fn get_host_reads_etag_and_labels() {
        let (url, seen) = serve_once(
            "200 OK",
            "ETag: \"abc123\"\r\n",
            r#"{"id":"web01","extensions":{"folder":"/","attributes":{"labels":{"hwsw/os":"linux"}}}}"#,
        )
        .await;

        let (host, etag) = client_for(&url).get_host("web01").await.unwrap();

        assert_eq!(etag.as_str(), "\"abc123\"");
        assert_eq!(host.labels.get("hwsw/os").map(String::as_str), Some("linux"));

        let request = request(&seen, 0);
        assert!(request.starts_with("GET /mysite/check_mk/api/1.0/objects/host_config/web01?effective_attributes=false"));
        assert!(request.to_lowercase().contains("authorization: bearer automation s3cr3t"));
    }

    #[tokio::test]
    async fn update_sends_if_match_and_full_label_set() {
        let (url, seen) = serve_once("200 OK", "ETag: \"def456\"\r\n", r#"{"id":"web01"}"#).await;

        let labels: LabelSet = [("hwsw/os".to_string(), "linux".to_string())].into();
        let new_etag = client_for(&url)
            .update_host_labels("web01", &labels, Some(&Etag::new("\"abc123\"")))
            .await
            .unwrap();

        assert_eq!(new_etag.as_str(), "\"def456\"");
        let request = request(&seen, 0);
        assert!(request.starts_with("PUT /mysite/check_mk/api/1.0/objects/host_config/web01"));
        assert!(request.to_lowercase().contains("if-match: \"abc123\""));
        assert!(request.contains(r#"{"update_attributes":{"labels":{"hwsw/os":"linux"}}}"#));
    }

    #[tokio::test]
    async fn stale_etag_is_conflict() {
        let (url, _seen) = serve_once("412 Precondition Failed", "", r#"{"title":"Precondition failed"}"#).await;

        let err = client_for(&url)
            .update_host_labels("web01", &LabelSet::new(), Some(&Etag::new("\"old\"")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ConcurrencyConflict(_)));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let (url, _seen) = serve_once("200 OK", "ETag: \"x\"\r\n", "<html>login</html>").await;

        let err = client_for(&url).get_host("web01").await.unwrap_err();

        match err {
            Error::MalformedResponse { body, .. } => assert_eq!(body, "<html>login</html>"),
            other => panic!("expected malformed response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn activation_posts_sites() {
        let (url, seen) = serve_once("200 OK", "", r#"{"id":"act-42","title":"Activation status"}"#).await;

        let handle = client_for(&url)
            .activate_changes(&["central".to_string()], false)
            .await
            .unwrap();

        assert_eq!(handle.id.as_deref(), Some("act-42"));
        let request = request(&seen, 0);
        assert!(request.starts_with("POST /mysite/check_mk/api/1.0/domain-types/activation_run/actions/activate-changes/invoke"));
        assert!(request.to_lowercase().contains("if-match: *"));
        assert!(request.contains(r#""sites":["central"]"#));
    }

    #[tokio::test]
    async fn hostname_is_escaped_as_one_path_segment() {
        let (url, seen) = serve(vec![
            ("200 OK", "ETag: \"e1\"\r\n", r#"{"id":"web#01?x","extensions":{"attributes":{}}}"#),
            ("200 OK", "ETag: \"e2\"\r\n", r#"{"id":"rack/web%01"}"#),
        ])
        .await;
        let client = client_for(&url);

        let (host, _) = client.get_host("web#01?x").await.unwrap();
        client
            .update_host_labels("rack/web%01", &LabelSet::new(), Some(&Etag::new("\"e0\"")))
            .await
            .unwrap();

        assert_eq!(host.hostname, "web#01?x");
        assert!(request(&seen, 0).starts_with(
            "GET /mysite/check_mk/api/1.0/objects/host_config/web%2301%3Fx?effective_attributes=false "
        ));
        assert!(request(&seen, 1).starts_with("PUT /mysite/check_mk/api/1.0/objects/host_config/rack%2Fweb%2501 "));
    }

    #[tokio::test]
    async fn update_without_etag_reads_the_host_first() {
        let (url, seen) = serve(vec![
            ("200 OK", "ETag: \"fresh\"\r\n", r#"{"id":"web01","extensions":{"attributes":{"labels":{}}}}"#),
            ("200 OK", "ETag: \"next\"\r\n", r#"{"id":"web01"}"#),
        ])
        .await;

        let labels: LabelSet = [("hwsw/os".to_string(), "linux".to_string())].into();
        let new_etag = client_for(&url)
            .update_host_labels("web01", &labels, None)
            .await
            .unwrap();

        assert_eq!(new_etag.as_str(), "\"next\"");
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert!(request(&seen, 0).starts_with("GET /mysite/check_mk/api/1.0/objects/host_config/web01?"));
        let put = request(&seen, 1);
        assert!(put.starts_with("PUT /mysite/check_mk/api/1.0/objects/host_config/web01 "));
        assert!(put.to_lowercase().contains("if-match: \"fresh\""));
    }

    #[tokio::test]
    async fn update_without_etag_stops_when_the_host_is_missing() {
        let (url, seen) = serve_once("404 Not Found", "", r#"{"title":"Not found"}"#).await;

        let err = client_for(&url)
            .update_host_labels("ghost", &LabelSet::new(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_labels_extracts_the_label_attribute() {
        let (url, _seen) = serve_once(
            "200 OK",
            "ETag: \"abc\"\r\n",
            r#"{"id":"web01","extensions":{"attributes":{"ipaddress":"10.0.0.1","labels":{"hwsw/os":"linux","team":"ops"}}}}"#,
        )
        .await;

        let labels = client_for(&url).get_labels("web01").await.unwrap();

        let expected: LabelSet = [
            ("hwsw/os".to_string(), "linux".to_string()),
            ("team".to_string(), "ops".to_string()),
        ]
        .into();
        assert_eq!(labels, expected);
    }

    #[tokio::test]
    async fn list_hosts_parses_the_collection() {
        let (url, seen) = serve_once(
            "200 OK",
            "",
            r#"{"value":[
                {"id":"web01","extensions":{"folder":"/","attributes":{"labels":{"hwsw/os":"linux"}}}},
                {"title":"entry without id","extensions":{}},
                {"id":"db01","extensions":{"folder":"/db","attributes":{}}}
            ]}"#,
        )
        .await;

        let hosts = client_for(&url).list_hosts(true).await.unwrap();

        assert_eq!(hosts.keys().map(String::as_str).collect::<Vec<_>>(), ["db01", "web01"]);
        assert_eq!(hosts["web01"].labels["hwsw/os"], "linux");
        assert_eq!(hosts["db01"].folder.as_deref(), Some("/db"));
        assert!(request(&seen, 0).starts_with(
            "GET /mysite/check_mk/api/1.0/domain-types/host_config/collections/all?effective_attributes=true "
        ));
    }
}
