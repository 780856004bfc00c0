//! Plugin-based source and API registry
//!
//! The registry maps type names from the configuration (`type: vsphere`,
//! `type: checkmk`, ...) to factories, so the binary never hardcodes an
//! if-else chain over plugin names.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use labelsync_core::SourceRegistry;
//!
//! let registry = SourceRegistry::new();
//! labelsync_source_vsphere::register(&registry);
//! labelsync_checkmk::register(&registry);
//!
//! let source = registry.create_source(&config.source)?;
//! let api = registry.create_api(&config.api)?;
//! ```
//!
//! ## Registration
//!
//! Plugin crates expose a `register()` function:
//!
//! ```rust,ignore
//! pub fn register(registry: &SourceRegistry) {
//!     registry.register_source("vsphere", Box::new(VsphereFactory));
//! }
//! ```

use crate::config::{ApiConfig, SourceConfig};
use crate::error::{Error, Result};
use crate::traits::{ConfigApi, ConfigApiFactory, LabelSource, LabelSourceFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry for plugin-based source and API creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct SourceRegistry {
    /// Registered label source factories
    sources: RwLock<HashMap<String, Box<dyn LabelSourceFactory>>>,

    /// Registered configuration API factories
    apis: RwLock<HashMap<String, Box<dyn ConfigApiFactory>>>,
}

impl SourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a label source factory
    ///
    /// # Parameters
    ///
    /// - `name`: Source type name (e.g., "vsphere", "file")
    /// - `factory`: Factory object for creating source instances
    pub fn register_source(&self, name: impl Into<String>, factory: Box<dyn LabelSourceFactory>) {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        sources.insert(name.into(), factory);
    }

    /// Register a configuration API factory
    ///
    /// # Parameters
    ///
    /// - `name`: API type name (e.g., "checkmk")
    /// - `factory`: Factory object for creating API clients
    pub fn register_api(&self, name: impl Into<String>, factory: Box<dyn ConfigApiFactory>) {
        let mut apis = self.apis.write().unwrap_or_else(PoisonError::into_inner);
        apis.insert(name.into(), factory);
    }

    /// Create a label source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn LabelSource>)`: Created source instance
    /// - `Err(Error)`: If the source type is not registered or creation fails
    pub fn create_source(&self, config: &SourceConfig) -> Result<Box<dyn LabelSource>> {
        let source_type = config.type_name();
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown source type: {}", source_type)))?;

        factory.create(config)
    }

    /// Create a configuration API client from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ConfigApi>)`: Created client
    /// - `Err(Error)`: If the API type is not registered or creation fails
    ///   (including `Error::Authentication` when no credential is usable)
    pub fn create_api(&self, config: &ApiConfig) -> Result<Box<dyn ConfigApi>> {
        let api_type = config.type_name();
        let apis = self.apis.read().unwrap_or_else(PoisonError::into_inner);

        let factory = apis
            .get(api_type)
            .ok_or_else(|| Error::config(format!("Unknown API type: {}", api_type)))?;

        factory.create(config)
    }

    /// List all registered source types
    pub fn list_sources(&self) -> Vec<String> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// List all registered API types
    pub fn list_apis(&self) -> Vec<String> {
        let apis = self.apis.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = apis.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a source type is registered
    pub fn has_source(&self, name: &str) -> bool {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }

    /// Check if an API type is registered
    pub fn has_api(&self, name: &str) -> bool {
        let apis = self.apis.read().unwrap_or_else(PoisonError::into_inner);
        apis.contains_key(name)
    }
}
