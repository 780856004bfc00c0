//! Core traits for the label synchronization system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`LabelSource`]: Fetch and normalize labels from an external inventory
//! - [`ConfigApi`]: Read and conditionally write host labels, activate changes

pub mod config_api;
pub mod label_source;

pub use config_api::{ConfigApi, ConfigApiFactory};
pub use label_source::{LabelSource, LabelSourceFactory, normalize_record};
