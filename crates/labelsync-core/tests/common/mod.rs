//! Test doubles and common utilities for engine contract tests
//!
//! `MockConfigApi` keeps hosts in memory and enforces etags the way a real
//! configuration API does. Faults and concurrent writers are injected per host.

#![allow(dead_code)]

use async_trait::async_trait;
use labelsync_core::error::{Error, Result};
use labelsync_core::{
    ActivationHandle, ConfigApi, Etag, HostRecord, LabelSet, LabelSource, SourceRecord, SyncConfig,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Fault to inject on a host operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Auth,
    Transport,
    NotFound,
}

impl Fault {
    fn to_error(self, hostname: &str) -> Error {
        match self {
            Fault::Auth => Error::auth("401 Unauthorized"),
            Fault::Transport => Error::http_status(502, format!("bad gateway for {hostname}")),
            Fault::NotFound => Error::not_found(format!("Host {hostname}")),
        }
    }
}

struct StoredHost {
    labels: LabelSet,
    version: u64,
}

#[derive(Default)]
struct Faults {
    /// Writes that fail because someone else wrote first
    concurrent_writes: HashMap<String, usize>,
    /// Persistent faults on reads
    read_faults: HashMap<String, Fault>,
    /// Transient read faults: fail this many times, then succeed
    transient_read_faults: HashMap<String, usize>,
    /// Persistent faults on writes
    write_faults: HashMap<String, Fault>,
    /// Fail activation
    activation_fails: bool,
}

/// In-memory configuration API with etag enforcement
#[derive(Default)]
pub struct MockConfigApi {
    hosts: Mutex<BTreeMap<String, StoredHost>>,
    faults: Mutex<Faults>,
    /// Simulated latency of every host call
    latency: Mutex<Duration>,
    read_count: AtomicUsize,
    write_count: AtomicUsize,
    activation_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    activated_sites: Mutex<Vec<String>>,
}

impl MockConfigApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host with the given labels
    pub fn with_host(self, hostname: &str, labels: &[(&str, &str)]) -> Self {
        self.hosts.lock().unwrap().insert(
            hostname.to_string(),
            StoredHost {
                labels: label_set(labels),
                version: 1,
            },
        );
        self
    }

    /// The next `times` writes to `hostname` lose a race against another
    /// writer, which adds `other/writer=<n>` to the host first
    pub fn with_concurrent_writer(self, hostname: &str, times: usize) -> Self {
        self.faults
            .lock()
            .unwrap()
            .concurrent_writes
            .insert(hostname.to_string(), times);
        self
    }

    pub fn with_read_fault(self, hostname: &str, fault: Fault) -> Self {
        self.faults
            .lock()
            .unwrap()
            .read_faults
            .insert(hostname.to_string(), fault);
        self
    }

    /// The first `times` reads of `hostname` fail with a transport error
    pub fn with_transient_read_fault(self, hostname: &str, times: usize) -> Self {
        self.faults
            .lock()
            .unwrap()
            .transient_read_faults
            .insert(hostname.to_string(), times);
        self
    }

    pub fn with_write_fault(self, hostname: &str, fault: Fault) -> Self {
        self.faults
            .lock()
            .unwrap()
            .write_faults
            .insert(hostname.to_string(), fault);
        self
    }

    pub fn with_failing_activation(self) -> Self {
        self.faults.lock().unwrap().activation_fails = true;
        self
    }

    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    pub fn labels(&self, hostname: &str) -> LabelSet {
        self.hosts
            .lock()
            .unwrap()
            .get(hostname)
            .map(|h| h.labels.clone())
            .unwrap_or_default()
    }

    pub fn read_count(&self) -> usize {
        self.read_count.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    pub fn activation_count(&self) -> usize {
        self.activation_count.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn activated_sites(&self) -> Vec<String> {
        self.activated_sites.lock().unwrap().clone()
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn read(&self, hostname: &str) -> Result<(HostRecord, Etag)> {
        {
            let mut faults = self.faults.lock().unwrap();
            if let Some(fault) = faults.read_faults.get(hostname) {
                return Err(fault.to_error(hostname));
            }
            if let Some(remaining) = faults.transient_read_faults.get_mut(hostname) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(Fault::Transport.to_error(hostname));
                }
            }
        }

        let hosts = self.hosts.lock().unwrap();
        let stored = hosts
            .get(hostname)
            .ok_or_else(|| Error::not_found(format!("Host {hostname}")))?;
        let record = HostRecord {
            hostname: hostname.to_string(),
            folder: Some("/".to_string()),
            attributes: serde_json::json!({ "labels": stored.labels }),
            labels: stored.labels.clone(),
        };
        Ok((record, etag_for(stored.version)))
    }

    fn write(&self, hostname: &str, labels: &LabelSet, etag: Option<&Etag>) -> Result<Etag> {
        let mut faults = self.faults.lock().unwrap();
        if let Some(fault) = faults.write_faults.get(hostname) {
            return Err(fault.to_error(hostname));
        }

        let mut hosts = self.hosts.lock().unwrap();
        let stored = hosts
            .get_mut(hostname)
            .ok_or_else(|| Error::not_found(format!("Host {hostname}")))?;

        if let Some(remaining) = faults.concurrent_writes.get_mut(hostname) {
            if *remaining > 0 {
                *remaining -= 1;
                stored
                    .labels
                    .insert("other/writer".to_string(), stored.version.to_string());
                stored.version += 1;
            }
        }

        if let Some(etag) = etag {
            if *etag != etag_for(stored.version) {
                return Err(Error::conflict(format!(
                    "Etag {} is stale for {}",
                    etag, hostname
                )));
            }
        }

        stored.labels = labels.clone();
        stored.version += 1;
        Ok(etag_for(stored.version))
    }
}

#[async_trait]
impl ConfigApi for MockConfigApi {
    async fn get_host(&self, hostname: &str) -> Result<(HostRecord, Etag)> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        let result = self.read(hostname);
        self.leave();
        result
    }

    async fn list_hosts(&self, _effective_attributes: bool) -> Result<BTreeMap<String, HostRecord>> {
        let names: Vec<String> = self.hosts.lock().unwrap().keys().cloned().collect();
        let mut hosts = BTreeMap::new();
        for name in names {
            let (record, _) = self.read(&name)?;
            hosts.insert(name, record);
        }
        Ok(hosts)
    }

    async fn update_host_labels(
        &self,
        hostname: &str,
        labels: &LabelSet,
        etag: Option<&Etag>,
    ) -> Result<Etag> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.enter().await;
        let result = self.write(hostname, labels, etag);
        self.leave();
        result
    }

    async fn activate_changes(&self, sites: &[String], _force_foreign: bool) -> Result<ActivationHandle> {
        self.activation_count.fetch_add(1, Ordering::SeqCst);
        if self.faults.lock().unwrap().activation_fails {
            return Err(Error::http_status(409, "Activation already running"));
        }
        *self.activated_sites.lock().unwrap() = sites.to_vec();
        Ok(ActivationHandle {
            id: Some("activation-1".to_string()),
            sites: sites.to_vec(),
            body: serde_json::json!({ "id": "activation-1" }),
        })
    }

    fn api_name(&self) -> &'static str {
        "mock"
    }
}

/// Source returning a fixed record, or failing
pub struct StaticSource {
    record: Option<SourceRecord>,
    fetch_count: AtomicUsize,
}

impl StaticSource {
    pub fn new(hosts: &[(&str, &[(&str, &str)])]) -> Self {
        let record = hosts
            .iter()
            .map(|(host, labels)| {
                let labels = labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                (host.to_string(), labels)
            })
            .collect();
        Self {
            record: Some(record),
            fetch_count: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            record: None,
            fetch_count: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LabelSource for StaticSource {
    async fn fetch(&self) -> Result<SourceRecord> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.record
            .clone()
            .ok_or_else(|| Error::transport("inventory unreachable"))
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

pub fn label_set(labels: &[(&str, &str)]) -> LabelSet {
    labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn etag_for(version: u64) -> Etag {
    Etag::new(format!("\"v{version}\""))
}

/// Sync configuration with the `hwsw/` namespace and no retry delay
pub fn sync_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.label_prefix = "hwsw/".to_string();
    config.engine.retry_delay_ms = 0;
    config
}
