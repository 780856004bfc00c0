//! Per-host read-merge-write loop
//!
//! ```text
//! READ(etag) -> MERGE -> unchanged?  -> DONE (Unchanged)
//!                     -> WRITE(etag) -> ok       -> DONE (Updated)
//!                                    -> conflict -> READ(etag') -> ...
//! ```
//!
//! Writes are capped at `1 + max_conflict_retries`. Reads that fail with a
//! transport error are retried up to `max_read_retries` extra times.

use super::{HostOutcome, SyncEvent};
use crate::error::{Error, Result};
use crate::labels::{Etag, HostRecord, LabelSet};
use crate::merge::{merge, retired_keys};
use crate::traits::ConfigApi;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shared, read-only state of every host task in a pass
pub(crate) struct HostWorker {
    pub(crate) api: Arc<dyn ConfigApi>,
    pub(crate) prefix: String,
    pub(crate) enforce_cleanup: bool,
    pub(crate) max_conflict_retries: usize,
    pub(crate) max_read_retries: usize,
    pub(crate) retry_delay: Duration,
    pub(crate) dry_run: bool,
    pub(crate) event_tx: mpsc::Sender<SyncEvent>,
}

impl HostWorker {
    /// Bring one host's managed labels in line with `desired`
    pub(crate) async fn sync_host(&self, hostname: &str, desired: &LabelSet) -> HostOutcome {
        let mut write_attempts = 0;

        loop {
            let (host, etag) = match self.read_host(hostname).await {
                Ok(read) => read,
                Err(e) => return self.failed(hostname, e, write_attempts),
            };

            let merged = merge(&host.labels, desired, &self.prefix, self.enforce_cleanup);
            if merged == host.labels {
                debug!("Host {} already has the sourced labels", hostname);
                self.emit(SyncEvent::HostUnchanged {
                    hostname: hostname.to_string(),
                });
                return HostOutcome::Unchanged;
            }

            let retired: Vec<String> = retired_keys(&host.labels, &merged)
                .into_iter()
                .map(str::to_string)
                .collect();

            if self.dry_run {
                info!(
                    "[DRY-RUN] Would write {} label(s) to {} (retiring: {:?}): {:?}",
                    merged.len(),
                    hostname,
                    retired,
                    merged
                );
                return HostOutcome::WouldUpdate {
                    labels: merged,
                    retired,
                };
            }

            write_attempts += 1;
            match self.write_host(hostname, &merged, &etag).await {
                Ok(_new_etag) => {
                    info!(
                        "Updated labels of {} ({} label(s), {} retired, attempt {})",
                        hostname,
                        merged.len(),
                        retired.len(),
                        write_attempts
                    );
                    self.emit(SyncEvent::HostUpdated {
                        hostname: hostname.to_string(),
                        write_attempts,
                    });
                    return HostOutcome::Updated {
                        labels: merged,
                        retired,
                        write_attempts,
                    };
                }
                Err(e) if is_write_retryable(&e) && write_attempts <= self.max_conflict_retries => {
                    warn!(
                        "Write attempt {} for {} failed: {}; re-reading host",
                        write_attempts, hostname, e
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return self.failed(hostname, e, write_attempts),
            }
        }
    }

    /// Read the host, retrying transport failures
    async fn read_host(&self, hostname: &str) -> Result<(HostRecord, Etag)> {
        let mut attempt = 0;
        loop {
            match self.api.get_host(hostname).await {
                Ok(read) => return Ok(read),
                Err(e) if e.is_transport() && attempt < self.max_read_retries => {
                    attempt += 1;
                    warn!("Read attempt {} for {} failed: {}", attempt, hostname, e);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn write_host(&self, hostname: &str, labels: &LabelSet, etag: &Etag) -> Result<Etag> {
        debug!("Writing {} label(s) to {} (etag {})", labels.len(), hostname, etag);
        self.api.update_host_labels(hostname, labels, Some(etag)).await
    }

    fn failed(&self, hostname: &str, error: Error, write_attempts: usize) -> HostOutcome {
        match &error {
            Error::NotFound(_) => warn!("Host {} not found in configuration, skipping", hostname),
            _ => error!(
                "Failed to update labels of {} after {} write attempt(s): {}",
                hostname, write_attempts, error
            ),
        }
        self.emit(SyncEvent::HostFailed {
            hostname: hostname.to_string(),
            error: error.to_string(),
            write_attempts,
        });
        HostOutcome::Failed {
            error,
            write_attempts,
        }
    }

    fn emit(&self, event: SyncEvent) {
        super::emit_event(&self.event_tx, event);
    }
}

/// Conflicts and transport failures are retried by re-reading; the etag
/// keeps a repeated write from clobbering a concurrent one.
fn is_write_retryable(error: &Error) -> bool {
    matches!(error, Error::ConcurrencyConflict(_)) || error.is_transport()
}
