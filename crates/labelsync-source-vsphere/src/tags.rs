//! Tag collection
//!
//! A VM carries tag ids; each tag id resolves to a tag name and a category
//! id, and each category id to a category name. The source record maps
//! `VM name -> category name -> tag name`.
//!
//! Many VMs share the same tags, so tag and category lookups go through
//! [`TagCaches`]: each distinct id is resolved at most once per pass.

use async_trait::async_trait;
use labelsync_core::{ResolutionCache, Result, SourceRecord};
use serde::Deserialize;

/// A VM as listed by the inventory
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VmSummary {
    /// VM identifier (e.g. `vm-1021`)
    pub vm: String,
    /// Display name; becomes the hostname
    pub name: String,
}

/// A resolved tag
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagInfo {
    /// Tag name; becomes the label value
    pub name: String,
    /// Category the tag belongs to
    pub category_id: String,
}

/// The four inventory calls the source needs
#[async_trait]
pub trait TaggingApi: Send + Sync {
    /// Every VM in the inventory
    async fn list_vms(&self) -> Result<Vec<VmSummary>>;

    /// Ids of the tags attached to one VM
    async fn attached_tags(&self, vm_id: &str) -> Result<Vec<String>>;

    /// Resolve a tag id
    async fn get_tag(&self, tag_id: &str) -> Result<TagInfo>;

    /// Resolve a category id to its name
    async fn get_category(&self, category_id: &str) -> Result<String>;
}

/// Per-pass lookup caches
#[derive(Debug, Default)]
pub struct TagCaches {
    pub tags: ResolutionCache<String, TagInfo>,
    pub categories: ResolutionCache<String, String>,
}

impl TagCaches {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Build the source record from the inventory
///
/// VMs are scanned in listing order. When two tags of the same category are
/// attached to one VM, the one listed last wins. A VM without tags is
/// still present, with an empty tag map.
pub async fn collect_vm_tags(api: &dyn TaggingApi, caches: &TagCaches) -> Result<SourceRecord> {
    let vms = api.list_vms().await?;
    tracing::debug!("Inventory lists {} VM(s)", vms.len());

    let mut record = SourceRecord::new();
    for vm in vms {
        let tag_ids = api.attached_tags(&vm.vm).await?;
        let tags = record.entry(vm.name.clone()).or_default();

        for tag_id in tag_ids {
            let tag = caches
                .tags
                .get_or_try_resolve(&tag_id, || api.get_tag(&tag_id))
                .await?;
            let category = caches
                .categories
                .get_or_try_resolve(&tag.category_id, || api.get_category(&tag.category_id))
                .await?;
            tags.insert(category, tag.name);
        }
    }

    Ok(record)
}
