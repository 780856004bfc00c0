// # labelsync-core
//
// Core library for prefix-scoped host label synchronization.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping host labels in a
// monitoring configuration in line with an external inventory:
// - **LabelSource**: Trait for fetching labels from an inventory
// - **ConfigApi**: Trait for etag-guarded reads and writes of host labels
// - **merge / normalize**: Pure functions over label sets
// - **ResolutionCache**: Single-flight cache for id → name lookups
// - **SyncEngine**: Orchestrates fetch → merge → write → activate
// - **SourceRegistry**: Plugin-based registry for sources and APIs
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Namespace Ownership**: Only labels under the managed prefix are touched
// 3. **Plugin-Based**: Sources and APIs are registered dynamically
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Optimistic Concurrency**: Every write carries the etag it was based on

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod labels;
pub mod merge;
pub mod normalize;
pub mod registry;
pub mod traits;

// Re-export core types for convenience
pub use cache::ResolutionCache;
pub use config::{ActivationConfig, ApiConfig, EngineConfig, LabelSyncConfig, SourceConfig, SyncConfig};
pub use engine::{ActivationOutcome, ActivationSkip, HostOutcome, SyncEngine, SyncEvent, SyncReport};
pub use error::{Error, Result};
pub use labels::{ActivationHandle, Etag, HostLabels, HostRecord, LabelSet, Namespace, SourceRecord};
pub use merge::{merge, retired_keys};
pub use normalize::{CaseTransform, TransformSpec, normalize};
pub use registry::SourceRegistry;
pub use traits::{ConfigApi, ConfigApiFactory, LabelSource, LabelSourceFactory};
