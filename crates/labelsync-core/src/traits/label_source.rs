// # Label Source Trait
//
// Defines the interface for pulling labels out of an external inventory.
//
// ## Implementations
//
// - vSphere tags: `labelsync-source-vsphere` crate
// - Flat data file (JSON/YAML): `labelsync-source-file` crate
//
// ## Usage
//
// ```rust,ignore
// use labelsync_core::{LabelSource, Namespace};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* LabelSource implementation */;
//
//     let raw = source.fetch().await?;
//     let labels = source.normalize(raw, Namespace::new("vsphere").as_ref());
//
//     for (host, set) in &labels {
//         println!("{host}: {set:?}");
//     }
//     Ok(())
// }
// ```

use crate::labels::{HostLabels, LabelSet, Namespace, SourceRecord};
use async_trait::async_trait;

/// Trait for label source plugins
///
/// A source has two capabilities:
/// 1. **fetch()**: pull raw tag data out of the inventory
/// 2. **normalize()**: turn that raw data into canonical per-host labels
///
/// # Trust Level: Untrusted
///
/// Sources talk to third-party inventories and must not reach into the
/// monitoring platform:
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/file I/O against their own inventory
/// - ✅ Cache identifier resolutions for the duration of one `fetch()`
///
/// ## Forbidden Capabilities
/// - ❌ Write labels (owned by `SyncEngine` through `ConfigApi`)
/// - ❌ Retry on their own (a failed fetch fails the source for this pass)
/// - ❌ Keep caches across passes
///
/// # Failure
///
/// If authentication or connectivity to the inventory fails, `fetch()`
/// returns `Error::SourceUnavailable`. Partial results are never returned.
#[async_trait]
pub trait LabelSource: Send + Sync {
    /// Fetch raw inventory data
    ///
    /// # Returns
    ///
    /// - `Ok(SourceRecord)`: inventory object id -> raw tag key -> raw value
    /// - `Err(Error::SourceUnavailable)`: inventory unreachable or auth failed
    async fn fetch(&self) -> Result<SourceRecord, crate::Error>;

    /// Normalize raw data into per-host labels
    ///
    /// The default implementation trims keys and values and qualifies keys
    /// with `namespace` when one is given. Keys that are empty after
    /// trimming are dropped.
    fn normalize(&self, record: SourceRecord, namespace: Option<&Namespace>) -> HostLabels {
        normalize_record(record, namespace)
    }

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Default `normalize()` body, usable by plugins that override it
pub fn normalize_record(record: SourceRecord, namespace: Option<&Namespace>) -> HostLabels {
    record
        .into_iter()
        .map(|(host, tags)| {
            let mut labels = LabelSet::new();
            for (key, value) in tags {
                let key = key.trim();
                if key.is_empty() {
                    tracing::warn!("Dropping label with empty key on host {}", host);
                    continue;
                }
                let key = match namespace {
                    Some(ns) => ns.qualify(key),
                    None => key.to_string(),
                };
                labels.insert(key, value.trim().to_string());
            }
            (host, labels)
        })
        .collect()
}

/// Helper trait for constructing label sources from configuration
pub trait LabelSourceFactory: Send + Sync {
    /// Create a LabelSource instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this source
    ///
    /// # Returns
    ///
    /// A boxed LabelSource trait object
    fn create(
        &self,
        config: &crate::config::SourceConfig,
    ) -> Result<Box<dyn LabelSource>, crate::Error>;
}
