//! Configuration types for the label synchronization system
//!
//! This module defines all configuration structures used throughout the
//! workspace. The binary reads them from YAML:
//!
//! ```yaml
//! source:
//!   type: vsphere
//!   api_url: https://vcenter.example.com/rest
//!   api_user: readonly@vsphere.local
//! api:
//!   type: checkmk
//!   username: automation
//! sync:
//!   label_prefix: vsphere/
//!   enforce_cleanup: true
//!   case:
//!     label: lower
//! ```

use crate::labels::Namespace;
use crate::normalize::TransformSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main labelsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelSyncConfig {
    /// Inventory to source labels from (one per pass)
    pub source: SourceConfig,

    /// Monitoring configuration API to write labels to
    pub api: ApiConfig,

    /// Merge, activation and engine settings
    #[serde(default)]
    pub sync: SyncConfig,
}

impl LabelSyncConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(text: &str) -> Result<Self, crate::Error> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a YAML config file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            crate::Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.source.validate()?;
        self.api.validate()?;
        self.sync.validate()?;
        Ok(())
    }
}

/// Label source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// vSphere tags attached to virtual machines
    Vsphere {
        /// REST base URL (e.g. `https://vcenter.example.com/rest`)
        api_url: String,
        /// User with read permissions on VMs and tags
        api_user: String,
        /// Password for `api_user`
        #[serde(default)]
        api_pass: String,
        /// Verify the server's TLS certificate
        #[serde(default = "default_verify_ssl")]
        verify_ssl: bool,
        /// Per-request timeout (in seconds)
        #[serde(default = "default_request_timeout_secs")]
        timeout_secs: u64,
    },

    /// Flat JSON or YAML file of `{host: {key: value}}`
    File {
        /// Path to the data file
        path: PathBuf,
    },

    /// Custom source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::Vsphere {
                api_url,
                api_user,
                timeout_secs,
                ..
            } => {
                if api_url.is_empty() {
                    return Err(crate::Error::config("vSphere api_url cannot be empty"));
                }
                if !api_url.starts_with("https://") && !api_url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "vSphere api_url must use HTTP or HTTPS scheme. Got: {}",
                        api_url
                    )));
                }
                if api_user.is_empty() {
                    return Err(crate::Error::config("vSphere api_user cannot be empty"));
                }
                validate_timeout(*timeout_secs)
            }
            SourceConfig::File { path } => {
                if path.as_os_str().is_empty() {
                    return Err(crate::Error::config("File source path cannot be empty"));
                }
                Ok(())
            }
            SourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom source factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom source config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the registered source type name
    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::Vsphere { .. } => "vsphere",
            SourceConfig::File { .. } => "file",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Configuration API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiConfig {
    /// Checkmk REST API
    Checkmk {
        /// API base URL; derived from the local site when omitted
        #[serde(default)]
        url: Option<String>,
        /// Automation user
        #[serde(default = "default_automation_user")]
        username: String,
        /// Automation secret; read from the site's secret file when omitted
        #[serde(default)]
        secret: Option<String>,
        /// Site root directory (`$OMD_ROOT`)
        #[serde(default)]
        omd_root: Option<PathBuf>,
        /// Site name (`$OMD_SITE`)
        #[serde(default)]
        omd_site: Option<String>,
        /// Verify the server's TLS certificate
        #[serde(default = "default_verify_ssl")]
        verify_ssl: bool,
        /// Per-request timeout (in seconds)
        #[serde(default = "default_request_timeout_secs")]
        timeout_secs: u64,
    },

    /// Custom configuration API
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ApiConfig {
    /// Validate the API configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ApiConfig::Checkmk {
                url,
                username,
                omd_root,
                timeout_secs,
                ..
            } => {
                if username.is_empty() {
                    return Err(crate::Error::config("Checkmk username cannot be empty"));
                }
                match url {
                    Some(url) if !url.starts_with("https://") && !url.starts_with("http://") => {
                        return Err(crate::Error::config(format!(
                            "Checkmk url must use HTTP or HTTPS scheme. Got: {}",
                            url
                        )));
                    }
                    None if omd_root.is_none() => {
                        return Err(crate::Error::config(
                            "Checkmk url is required when not running inside a site (omd_root unset)",
                        ));
                    }
                    _ => {}
                }
                validate_timeout(*timeout_secs)
            }
            ApiConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom API factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom API config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the registered API type name
    pub fn type_name(&self) -> &str {
        match self {
            ApiConfig::Checkmk { .. } => "checkmk",
            ApiConfig::Custom { factory, .. } => factory,
        }
    }
}

/// What to do with the sourced labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Managed namespace; only labels under it are replaced
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,

    /// Also remove labels whose prefix matches case-insensitively
    #[serde(default)]
    pub enforce_cleanup: bool,

    /// Optional case transform for sourced labels
    #[serde(default)]
    pub case: TransformSpec,

    /// Activation after the pass
    #[serde(default)]
    pub activation: ActivationConfig,

    /// Retry and concurrency limits
    #[serde(default)]
    pub engine: EngineConfig,

    /// Read and merge, but never write or activate
    #[serde(default)]
    pub dry_run: bool,
}

impl SyncConfig {
    /// The managed namespace
    pub fn namespace(&self) -> Result<Namespace, crate::Error> {
        Namespace::new(&self.label_prefix)
            .ok_or_else(|| crate::Error::config("label_prefix cannot be empty"))
    }

    /// Validate the sync configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.namespace()?;
        self.engine.validate()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            label_prefix: default_label_prefix(),
            enforce_cleanup: false,
            case: TransformSpec::default(),
            activation: ActivationConfig::default(),
            engine: EngineConfig::default(),
            dry_run: false,
        }
    }
}

/// Activation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationConfig {
    /// Activate pending changes at the end of the pass
    #[serde(default = "default_activation_enabled")]
    pub enabled: bool,

    /// Sites to activate on; empty means every site with pending changes
    #[serde(default)]
    pub sites: Vec<String>,

    /// Also activate changes made by other users
    #[serde(default)]
    pub force_foreign_changes: bool,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            enabled: default_activation_enabled(),
            sites: Vec::new(),
            force_foreign_changes: false,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Extra write attempts after a concurrency conflict (each preceded by a re-read)
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: usize,

    /// Extra attempts for host reads that fail with a transport error
    #[serde(default = "default_max_read_retries")]
    pub max_read_retries: usize,

    /// Delay between retry attempts (in milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Number of hosts updated concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Capacity of the engine event channel
    ///
    /// When full, events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate numeric ranges
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_conflict_retries > 10 {
            return Err(crate::Error::config(format!(
                "max_conflict_retries must be between 0 and 10. Got: {}",
                self.max_conflict_retries
            )));
        }
        if self.max_read_retries > 10 {
            return Err(crate::Error::config(format!(
                "max_read_retries must be between 0 and 10. Got: {}",
                self.max_read_retries
            )));
        }
        if !(1..=64).contains(&self.concurrency) {
            return Err(crate::Error::config(format!(
                "concurrency must be between 1 and 64. Got: {}",
                self.concurrency
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
            max_read_retries: default_max_read_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            concurrency: default_concurrency(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn validate_timeout(timeout_secs: u64) -> Result<(), crate::Error> {
    if !(1..=600).contains(&timeout_secs) {
        return Err(crate::Error::config(format!(
            "timeout_secs must be between 1 and 600 seconds. Got: {}",
            timeout_secs
        )));
    }
    Ok(())
}

fn default_verify_ssl() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_automation_user() -> String {
    "automation".to_string()
}

fn default_label_prefix() -> String {
    "hwsw/".to_string()
}

fn default_activation_enabled() -> bool {
    true
}

fn default_max_conflict_retries() -> usize {
    3
}

fn default_max_read_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_concurrency() -> usize {
    4
}

fn default_event_channel_capacity() -> usize {
    1000
}
