// # Configuration API Trait
//
// Defines the interface to the monitoring platform's configuration store.
//
// ## Implementations
//
// - Checkmk REST API: `labelsync-checkmk` crate
//
// ## Update Protocol
//
// Host writes are guarded by optimistic concurrency:
//
// ```text
// READ(etag) -> MERGE -> WRITE(etag) -> ok:       DONE
//                                    -> conflict: READ(etag') -> MERGE -> WRITE(etag')
// ```
//
// The retry loop is owned by `SyncEngine`; implementations make exactly one
// request per call and report a stale token as `Error::ConcurrencyConflict`.

use crate::labels::{ActivationHandle, Etag, HostRecord, LabelSet};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Trait for monitoring configuration API implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS calls to the configuration API only
/// - ✅ Read one host before a write when no etag was supplied
///
/// ## Forbidden Capabilities
/// - ❌ Retry conflicts or transport failures (owned by `SyncEngine`)
/// - ❌ Merge labels server-side (the full label set is always sent)
/// - ❌ Activate changes on their own after a write
#[async_trait]
pub trait ConfigApi: Send + Sync {
    /// Read one host and its concurrency token
    ///
    /// # Returns
    ///
    /// - `Ok((HostRecord, Etag))`: the host and the token for the next write
    /// - `Err(Error::NotFound)`: host absent from the configuration
    /// - `Err(Error::Transport)`: non-2xx response or network failure
    async fn get_host(&self, hostname: &str) -> Result<(HostRecord, Etag), crate::Error>;

    /// Current labels of one host
    async fn get_labels(&self, hostname: &str) -> Result<LabelSet, crate::Error> {
        let (host, _etag) = self.get_host(hostname).await?;
        Ok(host.labels)
    }

    /// Every configured host, keyed by hostname
    ///
    /// With `effective_attributes`, attributes inherited from folders are
    /// included, not just those set on the host itself.
    async fn list_hosts(
        &self,
        effective_attributes: bool,
    ) -> Result<BTreeMap<String, HostRecord>, crate::Error>;

    /// Replace the host's `labels` attribute with `labels`
    ///
    /// The full set is sent, never a diff. Without `etag` the implementation
    /// reads the host immediately before writing.
    ///
    /// # Returns
    ///
    /// - `Ok(Etag)`: the token after the write
    /// - `Err(Error::ConcurrencyConflict)`: `etag` is stale; re-read and retry
    /// - `Err(Error::NotFound)` / `Err(Error::Transport)`: as for `get_host`
    async fn update_host_labels(
        &self,
        hostname: &str,
        labels: &LabelSet,
        etag: Option<&Etag>,
    ) -> Result<Etag, crate::Error>;

    /// Trigger activation of all pending changes
    ///
    /// Does not wait for the activation to finish.
    ///
    /// # Parameters
    ///
    /// - `sites`: sites to activate on; empty means every site with changes
    /// - `force_foreign`: also activate changes made by other users
    async fn activate_changes(
        &self,
        sites: &[String],
        force_foreign: bool,
    ) -> Result<ActivationHandle, crate::Error>;

    /// Get the API name (for logging/debugging)
    fn api_name(&self) -> &'static str;
}

/// Helper trait for constructing configuration API clients from configuration
pub trait ConfigApiFactory: Send + Sync {
    /// Create a ConfigApi instance from configuration
    ///
    /// Credential resolution happens here: a factory fails with
    /// `Error::Authentication` when no usable credential is found.
    fn create(&self, config: &crate::config::ApiConfig) -> Result<Box<dyn ConfigApi>, crate::Error>;
}
