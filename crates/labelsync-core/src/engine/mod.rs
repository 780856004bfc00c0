//! Label synchronization engine
//!
//! The SyncEngine runs one pass:
//! - Fetch raw labels from the LabelSource and normalize them
//! - Apply the optional case transform to the managed namespace
//! - Update every sourced host through the ConfigApi, a bounded number at a time
//! - Trigger a single activation once every host task has finished
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ LabelSource │─── HostLabels ───┐
//! └─────────────┘                  │
//!                                  ▼
//!                         ┌──────────────┐
//!                         │  SyncEngine  │
//!                         └──────────────┘
//!                                  │
//!         ┌────────────────────────┼────────────────────────┐
//!         │                        │                        │
//!         ▼                        ▼                        ▼
//! ┌──────────────┐        ┌──────────────┐         ┌─────────────┐
//! │ host task ×N │        │  ConfigApi   │         │   Events    │
//! │ (read/merge/ │───────▶│ (get/update/ │         │  (notify)   │
//! │  write)      │        │  activate)   │         └─────────────┘
//! └──────────────┘        └──────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Fetch and normalize; a failing source aborts the pass before any write
//! 2. Spawn one task per host, gated by a semaphore of `concurrency` permits
//! 3. Join every task (the barrier); one host's failure never stops another
//! 4. If any host failed with a pass-fatal error, fail the pass (the report
//!    travels inside the error)
//! 5. Otherwise activate once, if enabled, not a dry run, and something was written

mod host;
mod report;

pub use report::{ActivationOutcome, ActivationSkip, HostOutcome, SyncReport};

use crate::config::{ActivationConfig, SyncConfig};
use crate::error::{Error, Result};
use crate::labels::{HostLabels, Namespace};
use crate::normalize::{TransformSpec, normalize};
use crate::traits::{ConfigApi, LabelSource};
use chrono::Utc;
use host::HostWorker;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Source fetched, host updates about to start
    PassStarted {
        hosts_count: usize,
    },

    /// Labels written to a host
    HostUpdated {
        hostname: String,
        write_attempts: usize,
    },

    /// Host already carried the sourced labels
    HostUnchanged {
        hostname: String,
    },

    /// Host update gave up
    HostFailed {
        hostname: String,
        error: String,
        write_attempts: usize,
    },

    /// Activation request accepted
    ActivationTriggered {
        activation_id: Option<String>,
    },

    /// Activation request rejected
    ActivationFailed {
        error: String,
    },

    /// Every host task finished
    PassFinished {
        updated: usize,
        unchanged: usize,
        failed: usize,
    },
}

/// Core synchronization engine
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::new()`]
/// 2. Call [`SyncEngine::run_pass()`] once per synchronization
/// 3. Inspect the returned [`SyncReport`]
///
/// ## Concurrency
///
/// Host updates run as separate tasks. At most `engine.concurrency` of them
/// talk to the configuration API at the same time.
pub struct SyncEngine {
    /// Where labels come from
    source: Box<dyn LabelSource>,

    /// Managed namespace
    namespace: Namespace,

    /// Optional case transform for sourced labels
    case: TransformSpec,

    /// Activation settings
    activation: ActivationConfig,

    /// Maximum concurrent host tasks
    concurrency: usize,

    /// State shared with every host task
    worker: Arc<HostWorker>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new synchronization engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn LabelSource>,
        api: Arc<dyn ConfigApi>,
        config: SyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.validate()?;
        let namespace = config.namespace()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let worker = HostWorker {
            api,
            prefix: namespace.as_str().to_string(),
            enforce_cleanup: config.enforce_cleanup,
            max_conflict_retries: config.engine.max_conflict_retries,
            max_read_retries: config.engine.max_read_retries,
            retry_delay: Duration::from_millis(config.engine.retry_delay_ms),
            dry_run: config.dry_run,
            event_tx: tx.clone(),
        };

        let engine = Self {
            source,
            namespace,
            case: config.case,
            activation: config.activation,
            concurrency: config.engine.concurrency,
            worker: Arc::new(worker),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The managed namespace
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Run one synchronization pass
    ///
    /// # Returns
    ///
    /// - `Ok(SyncReport)`: Every host was attempted; per-host failures are in the report
    /// - `Err(Error::SourceUnavailable)`: The source failed; nothing was written
    /// - `Err(Error::PassAborted)`: A host failed with a pass-fatal error (the
    ///   configuration API rejected the credentials); nothing was activated
    pub async fn run_pass(&self) -> Result<SyncReport> {
        let started_at = Utc::now();
        let sourced = self.collect_labels().await?;

        info!(
            "Synchronizing {} host(s) from {} (namespace {}{})",
            sourced.len(),
            self.source.source_name(),
            self.namespace,
            if self.worker.dry_run { ", dry-run" } else { "" }
        );
        self.emit_event(SyncEvent::PassStarted {
            hosts_count: sourced.len(),
        });

        let hosts = self.sync_hosts(&sourced).await;

        // Barrier passed: every host task has finished
        let failed = hosts.values().filter(|o| o.is_failed()).count();
        let updated = hosts.values().filter(|o| o.is_updated()).count();
        let unchanged = hosts
            .values()
            .filter(|o| matches!(o, HostOutcome::Unchanged))
            .count();
        self.emit_event(SyncEvent::PassFinished {
            updated,
            unchanged,
            failed,
        });

        if let Some((hostname, message)) = first_fatal_failure(&hosts) {
            error!("Aborting pass after host {}: {}", hostname, message);
            let report = SyncReport {
                started_at,
                finished_at: Utc::now(),
                sourced,
                hosts,
                activation: ActivationOutcome::Skipped(ActivationSkip::PassAborted),
            };
            return Err(Error::PassAborted {
                hostname,
                message,
                report: Box::new(report),
            });
        }

        let activation = self.activate(updated).await;

        Ok(SyncReport {
            started_at,
            finished_at: Utc::now(),
            sourced,
            hosts,
            activation,
        })
    }

    /// Fetch, normalize and case-transform the source labels
    async fn collect_labels(&self) -> Result<HostLabels> {
        let source_name = self.source.source_name();
        debug!("Fetching labels from {}", source_name);

        let record = self.source.fetch().await.map_err(|e| match e {
            e @ Error::SourceUnavailable { .. } => e,
            other => Error::source_unavailable(source_name, other.to_string()),
        })?;

        let labels = self.source.normalize(record, Some(&self.namespace));
        if self.case.is_identity() {
            Ok(labels)
        } else {
            Ok(normalize(labels, &self.case, self.namespace.as_str()))
        }
    }

    /// Update every host, at most `concurrency` at a time, and wait for all of them
    async fn sync_hosts(&self, sourced: &HostLabels) -> BTreeMap<String, HostOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut task_hosts = HashMap::new();

        for (hostname, desired) in sourced {
            let worker = Arc::clone(&self.worker);
            let semaphore = Arc::clone(&semaphore);
            let task_hostname = hostname.clone();
            let desired = desired.clone();

            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = worker.sync_host(&task_hostname, &desired).await;
                (task_hostname, outcome)
            });
            task_hosts.insert(handle.id(), hostname.clone());
        }

        let mut outcomes = BTreeMap::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (hostname, outcome))) => {
                    outcomes.insert(hostname, outcome);
                }
                Err(e) => {
                    let hostname = task_hosts.remove(&e.id()).unwrap_or_default();
                    error!("Host task for {} aborted: {}", hostname, e);
                    outcomes.insert(
                        hostname,
                        HostOutcome::Failed {
                            error: Error::Other(format!("Host task aborted: {}", e)),
                            write_attempts: 0,
                        },
                    );
                }
            }
        }

        outcomes
    }

    /// Trigger the single end-of-pass activation
    async fn activate(&self, updated: usize) -> ActivationOutcome {
        if !self.activation.enabled {
            debug!("Activation disabled");
            return ActivationOutcome::Skipped(ActivationSkip::Disabled);
        }
        if self.worker.dry_run {
            info!("[DRY-RUN] Skipping activation");
            return ActivationOutcome::Skipped(ActivationSkip::DryRun);
        }
        if updated == 0 {
            info!("No host changed, skipping activation");
            return ActivationOutcome::Skipped(ActivationSkip::NoChanges);
        }

        match self
            .worker
            .api
            .activate_changes(&self.activation.sites, self.activation.force_foreign_changes)
            .await
        {
            Ok(handle) => {
                info!(
                    "Activation triggered via {} (id: {})",
                    self.worker.api.api_name(),
                    handle.id.as_deref().unwrap_or("unknown")
                );
                self.emit_event(SyncEvent::ActivationTriggered {
                    activation_id: handle.id.clone(),
                });
                ActivationOutcome::Triggered(handle)
            }
            Err(e) => {
                error!("Activation failed: {}", e);
                self.emit_event(SyncEvent::ActivationFailed {
                    error: e.to_string(),
                });
                ActivationOutcome::Failed(e)
            }
        }
    }

    fn emit_event(&self, event: SyncEvent) {
        emit_event(&self.event_tx, event);
    }
}

/// Send an event without blocking
///
/// When the channel is full the event is dropped with a warning.
fn emit_event(tx: &mpsc::Sender<SyncEvent>, event: SyncEvent) {
    if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event) {
        warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
    }
}

fn first_fatal_failure(hosts: &BTreeMap<String, HostOutcome>) -> Option<(String, String)> {
    hosts.iter().find_map(|(hostname, outcome)| match outcome {
        HostOutcome::Failed { error, .. } if error.is_pass_fatal() => {
            Some((hostname.clone(), error.to_string()))
        }
        _ => None,
    })
}
