//! Pass results
//!
//! A pass produces one [`HostOutcome`] per sourced host and one
//! [`ActivationOutcome`]. Per-host failures are data here, not errors: the
//! pass itself only fails for pass-level problems.

use crate::error::Error;
use crate::labels::{ActivationHandle, HostLabels, LabelSet};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Result of synchronizing one host
#[derive(Debug)]
pub enum HostOutcome {
    /// New label set written
    Updated {
        /// The label set now stored on the host
        labels: LabelSet,
        /// Managed labels that were removed
        retired: Vec<String>,
        /// Number of writes it took (more than one after conflicts)
        write_attempts: usize,
    },

    /// Dry-run: the host would have been written
    WouldUpdate {
        /// The label set that would have been written
        labels: LabelSet,
        /// Managed labels that would have been removed
        retired: Vec<String>,
    },

    /// Merged labels equal the current labels; nothing written
    Unchanged,

    /// Terminal failure for this host
    Failed {
        /// Last error seen
        error: Error,
        /// Writes attempted before giving up
        write_attempts: usize,
    },
}

impl HostOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, HostOutcome::Failed { .. })
    }

    /// Whether a write reached the platform
    pub fn is_updated(&self) -> bool {
        matches!(self, HostOutcome::Updated { .. })
    }
}

/// Why activation was not attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationSkip {
    /// Activation disabled in the configuration
    Disabled,
    /// Dry-run pass
    DryRun,
    /// No host was written in this pass
    NoChanges,
    /// A host failure aborted the pass
    PassAborted,
}

/// Result of the end-of-pass activation
#[derive(Debug)]
pub enum ActivationOutcome {
    /// Activation request accepted
    Triggered(ActivationHandle),
    /// Activation not attempted
    Skipped(ActivationSkip),
    /// Activation request rejected; host results stand
    Failed(Error),
}

/// Everything a pass did
#[derive(Debug)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Labels after sourcing and processing, per host
    pub sourced: HostLabels,
    /// Outcome per sourced host
    pub hosts: BTreeMap<String, HostOutcome>,
    pub activation: ActivationOutcome,
}

impl SyncReport {
    pub fn updated_count(&self) -> usize {
        self.hosts.values().filter(|o| o.is_updated()).count()
    }

    pub fn unchanged_count(&self) -> usize {
        self.hosts
            .values()
            .filter(|o| matches!(o, HostOutcome::Unchanged))
            .count()
    }

    /// Hosts that ended in a terminal failure, with their error
    pub fn failed_hosts(&self) -> Vec<(&str, &Error)> {
        self.hosts
            .iter()
            .filter_map(|(host, outcome)| match outcome {
                HostOutcome::Failed { error, .. } => Some((host.as_str(), error)),
                _ => None,
            })
            .collect()
    }

    /// No host failed and activation did not fail
    pub fn is_success(&self) -> bool {
        self.failed_hosts().is_empty() && !matches!(self.activation, ActivationOutcome::Failed(_))
    }
}
