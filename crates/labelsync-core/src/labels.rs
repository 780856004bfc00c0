//! Label data model
//!
//! Hosts own exactly one [`LabelSet`], stored by the monitoring platform.
//! The engine never persists labels locally: it reads the current set with
//! its [`Etag`], computes a replacement and writes it back conditionally.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Label key to label value
pub type LabelSet = BTreeMap<String, String>;

/// Hostname to the labels sourced for that host
pub type HostLabels = BTreeMap<String, LabelSet>;

/// Raw inventory data: inventory object id to raw tag key to raw tag value
///
/// Shape and key semantics are inventory-specific. Lives for one pass only.
pub type SourceRecord = BTreeMap<String, BTreeMap<String, String>>;

/// The label-key prefix this engine is allowed to add, update and delete
///
/// Always ends with `/`: `Namespace::new("hwsw")` and `Namespace::new("hwsw/")`
/// are the same namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    /// Build a namespace from a configured prefix
    ///
    /// Returns `None` for a prefix that is empty after trimming, since an
    /// empty namespace would claim every label on the host.
    pub fn new(prefix: impl AsRef<str>) -> Option<Self> {
        let prefix = prefix.as_ref().trim();
        if prefix.trim_end_matches('/').is_empty() {
            return None;
        }
        if prefix.ends_with('/') {
            Some(Self(prefix.to_string()))
        } else {
            Some(Self(format!("{prefix}/")))
        }
    }

    /// The prefix, including the trailing `/`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Qualify a bare label name with this namespace
    pub fn qualify(&self, name: &str) -> String {
        format!("{}{}", self.0, name)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Opaque concurrency token returned with a host read
///
/// A write is accepted only if the token still matches the server's current
/// one. Any successful write (ours or another actor's) changes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Etag(String);

impl Etag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A host as stored in the monitoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostRecord {
    /// Unique hostname
    pub hostname: String,
    /// Folder the host lives in, when the API reports one
    pub folder: Option<String>,
    /// All attributes as returned by the API (labels included)
    pub attributes: serde_json::Value,
    /// The host's current, authoritative labels
    pub labels: LabelSet,
}

impl HostRecord {
    /// Build a record, extracting `labels` from the attribute object
    ///
    /// Non-string label values are stringified; a missing or non-object
    /// `labels` attribute yields an empty set.
    pub fn from_attributes(
        hostname: impl Into<String>,
        folder: Option<String>,
        attributes: serde_json::Value,
    ) -> Self {
        let labels = attributes
            .get("labels")
            .and_then(|v| v.as_object())
            .map(|obj| {
                obj.iter()
                    .map(|(k, v)| {
                        let value = match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), value)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            hostname: hostname.into(),
            folder,
            attributes,
            labels,
        }
    }
}

/// Handle for a triggered activation
///
/// Activation runs asynchronously on the platform; the engine never waits
/// for it to complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationHandle {
    /// Platform-assigned activation id, when the response carried one
    pub id: Option<String>,
    /// Sites the activation was requested for (empty means all)
    pub sites: Vec<String>,
    /// Raw response body
    pub body: serde_json::Value,
}
