//! Shared test infrastructure: in-memory collaborators for the correlator.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use geodns_probe::error::{ExportError, GeoError, ProbeError};
use geodns_probe::{
    GeoInfo, GeoLookup, NameserverEntry, PublicIpSource, Resolve, ResolutionOutcome, Sink,
    SiteEntry, TargetRegistry,
};

// --- Constants ---

pub const LOCAL_IP: &str = "198.51.100.7";

// --- Registry builders ---

pub fn nameserver(label: &str, address: &str) -> NameserverEntry {
    NameserverEntry {
        label: label.to_string(),
        address: address.parse().unwrap(),
    }
}

pub fn site(label: &str, hostname: &str) -> SiteEntry {
    SiteEntry {
        label: label.to_string(),
        hostname: hostname.to_string(),
    }
}

pub fn registry(nameservers: Vec<NameserverEntry>, sites: Vec<SiteEntry>) -> Arc<TargetRegistry> {
    Arc::new(TargetRegistry::new(nameservers, sites).expect("valid registry"))
}

pub fn geo(ip: &str, region_code: &str, region_name: &str, postal_code: &str) -> GeoInfo {
    GeoInfo {
        ip: ip.parse().unwrap(),
        region_code: Some(region_code.to_string()),
        region_name: Some(region_name.to_string()),
        postal_code: Some(postal_code.to_string()),
        extra: Default::default(),
    }
}

// --- FakeResolver ---

/// Answers from a fixed table; unknown pairs time out. Records every call.
#[derive(Clone, Default)]
pub struct FakeResolver {
    answers: Arc<HashMap<(IpAddr, String), ResolutionOutcome>>,
    calls: Arc<Mutex<Vec<(IpAddr, String, Option<IpAddr>)>>>,
}

impl FakeResolver {
    pub fn new(answers: Vec<(&str, &str, ResolutionOutcome)>) -> Self {
        let answers = answers
            .into_iter()
            .map(|(ns, host, outcome)| ((ns.parse().unwrap(), host.to_string()), outcome))
            .collect();
        Self {
            answers: Arc::new(answers),
            calls: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<(IpAddr, String, Option<IpAddr>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Resolve for FakeResolver {
    async fn resolve(
        &self,
        nameserver: IpAddr,
        hostname: &str,
        client_ip: Option<IpAddr>,
    ) -> ResolutionOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((nameserver, hostname.to_string(), client_ip));
        self.answers
            .get(&(nameserver, hostname.to_string()))
            .cloned()
            .unwrap_or(ResolutionOutcome::Timeout)
    }
}

pub fn resolved(ip: &str) -> ResolutionOutcome {
    ResolutionOutcome::Resolved {
        ip: ip.parse::<Ipv4Addr>().unwrap(),
    }
}

// --- FakeGeo ---

/// Geo data from a fixed table; unknown addresses fail.
#[derive(Clone, Default)]
pub struct FakeGeo {
    entries: Arc<HashMap<IpAddr, GeoInfo>>,
    lookups: Arc<AtomicUsize>,
}

impl FakeGeo {
    pub fn new(entries: Vec<GeoInfo>) -> Self {
        Self {
            entries: Arc::new(entries.into_iter().map(|g| (g.ip, g)).collect()),
            lookups: Arc::default(),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoLookup for FakeGeo {
    async fn lookup(&self, ip: IpAddr) -> Result<GeoInfo, GeoError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.entries
            .get(&ip)
            .cloned()
            .ok_or_else(|| GeoError::Provider(format!("no data for {ip}")))
    }
}

// --- FakePublicIp ---

/// Reports `LOCAL_IP` once its configured number of failures is used up.
pub struct FakePublicIp {
    ip: Option<IpAddr>,
    failures_left: AtomicUsize,
}

impl FakePublicIp {
    pub fn ok() -> Self {
        Self::failing_first(0)
    }

    pub fn failing() -> Self {
        Self {
            ip: None,
            failures_left: AtomicUsize::new(0),
        }
    }

    /// Fail the first `n` lookups, then succeed.
    pub fn failing_first(n: usize) -> Self {
        Self {
            ip: Some(LOCAL_IP.parse().unwrap()),
            failures_left: AtomicUsize::new(n),
        }
    }
}

#[async_trait]
impl PublicIpSource for FakePublicIp {
    async fn public_ip(&self) -> Result<IpAddr, ProbeError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        match self.ip {
            Some(ip) if !failing => Ok(ip),
            _ => Err(ProbeError::InvalidPublicIp(
                "<html>gateway timeout</html>".to_string(),
            )),
        }
    }
}

// --- Sinks ---

/// Captures every delivered document.
#[derive(Clone, Default)]
pub struct RecordingSink {
    documents: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn documents(&self) -> Vec<String> {
        self.documents.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.documents.lock().unwrap().len()
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, document: &str) -> Result<(), ExportError> {
        self.documents.lock().unwrap().push(document.to_string());
        Ok(())
    }
}

/// Rejects every document.
pub struct FailingSink;

#[async_trait]
impl Sink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    async fn send(&self, _document: &str) -> Result<(), ExportError> {
        Err(ExportError::Rejected {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

// --- Metrics capture ---

/// A counter observed by the debugging recorder.
#[derive(Debug, Clone)]
pub struct CounterEntry {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: u64,
}

impl CounterEntry {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Run `f` with a local debugging recorder and return every counter it touched.
pub fn capture_counters<T>(f: impl FnOnce() -> T) -> (T, Vec<CounterEntry>) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let out = metrics::with_local_recorder(&recorder, f);

    let counters = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(key, _, _, value)| match value {
            DebugValue::Counter(value) => Some(CounterEntry {
                name: key.key().name().to_string(),
                labels: key
                    .key()
                    .labels()
                    .map(|l| (l.key().to_string(), l.value().to_string()))
                    .collect(),
                value,
            }),
            _ => None,
        })
        .collect();

    (out, counters)
}

/// Current-thread runtime so the thread-local recorder sees async emissions.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}
