// # vSphere Label Source
//
// This crate provides a tag-based label source backed by the vSphere
// Automation REST API.
//
// ## Mapping
//
// - VM name      -> hostname
// - tag category -> label key (qualified with the managed namespace)
// - tag name     -> label value
//
// ## Pass Lifecycle
//
// Every `fetch` opens a new session and starts with empty tag/category
// caches, so no lookup result outlives the pass it was made in. Any failure
// (login, listing, a lookup) fails the whole fetch with `SourceUnavailable`:
// a partial inventory would retire labels on hosts that were not scanned.

pub mod client;
pub mod tags;

pub use client::{VsphereClient, VsphereSettings};
pub use tags::{TagCaches, TagInfo, TaggingApi, VmSummary, collect_vm_tags};

use async_trait::async_trait;
use labelsync_core::config::SourceConfig;
use labelsync_core::traits::{LabelSource, LabelSourceFactory};
use labelsync_core::{Error, Result, SourceRecord, SourceRegistry};

/// Registered source name
const SOURCE_NAME: &str = "vsphere";

/// Tag-based label source
#[derive(Debug)]
pub struct VsphereSource {
    settings: VsphereSettings,
}

impl VsphereSource {
    pub fn new(settings: VsphereSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl LabelSource for VsphereSource {
    async fn fetch(&self) -> Result<SourceRecord> {
        let unavailable = |e: Error| Error::source_unavailable(SOURCE_NAME, e.to_string());

        let client = VsphereClient::login(&self.settings).await.map_err(unavailable)?;
        let caches = TagCaches::new();
        let record = collect_vm_tags(&client, &caches).await.map_err(unavailable)?;

        tracing::info!(
            "Collected tags of {} VM(s) from {} ({} distinct tag(s))",
            record.len(),
            self.settings.api_url,
            caches.tags.len().await
        );
        Ok(record)
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}

/// Factory for creating vSphere sources
pub struct VsphereFactory;

impl LabelSourceFactory for VsphereFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn LabelSource>> {
        let settings = VsphereSettings::from_config(config)?;
        if settings.api_pass.is_empty() {
            tracing::warn!("vSphere password is empty; login will likely fail");
        }
        Ok(Box::new(VsphereSource::new(settings)))
    }
}

/// Register the vSphere source with a registry
pub fn register(registry: &SourceRegistry) {
    registry.register_source(SOURCE_NAME, Box::new(VsphereFactory));
}
