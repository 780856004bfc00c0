// # File Label Source
//
// Reads labels from a flat data file:
//
// ```yaml
// web01:
//   os: Ubuntu
//   rack: 12
// db01:
//   os: Debian
// ```
//
// The format follows the extension: `.json`, `.yml` or `.yaml`. Keys are raw
// (unqualified); the engine adds the managed namespace. Scalar values are
// stringified, anything else is skipped with a warning.
//
// The file is read once per `fetch`.

use async_trait::async_trait;
use labelsync_core::config::SourceConfig;
use labelsync_core::traits::{LabelSource, LabelSourceFactory};
use labelsync_core::{Error, Result, SourceRecord, SourceRegistry};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Registered source name
const SOURCE_NAME: &str = "file";

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    /// Format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "yml" | "yaml" => Some(FileFormat::Yaml),
            _ => None,
        }
    }
}

/// Label source backed by a JSON or YAML file
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    format: FileFormat,
}

impl FileSource {
    /// Create a source for `path`
    ///
    /// Fails with `Error::Config` for an unsupported extension.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = FileFormat::from_path(&path).ok_or_else(|| {
            Error::config(format!(
                "Unsupported label file {} (expected .json, .yml or .yaml)",
                path.display()
            ))
        })?;
        Ok(Self { path, format })
    }

    fn unavailable(&self, message: impl std::fmt::Display) -> Error {
        Error::source_unavailable(SOURCE_NAME, format!("{}: {}", self.path.display(), message))
    }
}

/// Convert a parsed document into a source record
pub fn record_from_value(document: Value) -> Result<SourceRecord> {
    let Value::Object(hosts) = document else {
        return Err(Error::invalid_input("Label file must map hostnames to label maps"));
    };

    let mut record = SourceRecord::new();
    for (host, labels) in hosts {
        let labels = match labels {
            Value::Object(labels) => labels,
            Value::Null => serde_json::Map::new(),
            other => {
                tracing::warn!("Skipping host {}: expected a label map, got {}", host, other);
                continue;
            }
        };

        let mut tags = BTreeMap::new();
        for (key, value) in labels {
            let value = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    tracing::warn!("Skipping label {} on {}: not a scalar ({})", key, host, other);
                    continue;
                }
            };
            tags.insert(key, value);
        }
        record.insert(host, tags);
    }

    Ok(record)
}

#[async_trait]
impl LabelSource for FileSource {
    async fn fetch(&self) -> Result<SourceRecord> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.unavailable(e))?;

        let document: Value = match self.format {
            FileFormat::Json => serde_json::from_str(&text).map_err(|e| self.unavailable(e))?,
            FileFormat::Yaml => serde_yaml::from_str(&text).map_err(|e| self.unavailable(e))?,
        };

        let record = record_from_value(document).map_err(|e| self.unavailable(e))?;
        tracing::info!("Read labels for {} host(s) from {}", record.len(), self.path.display());
        Ok(record)
    }

    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }
}

/// Factory for creating file sources
pub struct FileFactory;

impl LabelSourceFactory for FileFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn LabelSource>> {
        match config {
            SourceConfig::File { path } => Ok(Box::new(FileSource::new(path.clone())?)),
            _ => Err(Error::config("Invalid config for file source")),
        }
    }
}

/// Register the file source with a registry
pub fn register(registry: &SourceRegistry) {
    registry.register_source(SOURCE_NAME, Box::new(FileFactory));
}
