//! The per-cycle snapshot record and its canonical JSON form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::geo::GeoInfo;
use crate::registry::{NameserverEntry, SiteEntry};

/// Result of one DNS query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// First A record in the answer section.
    Resolved {
        /// Resolved address.
        ip: Ipv4Addr,
    },
    /// No answer before the query timeout.
    Timeout,
    /// Transport or protocol failure.
    Error {
        /// Human-readable cause.
        reason: String,
    },
}

impl ResolutionOutcome {
    /// The resolved address, if any.
    pub fn ip(&self) -> Option<Ipv4Addr> {
        match self {
            ResolutionOutcome::Resolved { ip } => Some(*ip),
            _ => None,
        }
    }

    /// Short label used for metric dimensions and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ResolutionOutcome::Resolved { .. } => "resolved",
            ResolutionOutcome::Timeout => "timeout",
            ResolutionOutcome::Error { .. } => "error",
        }
    }
}

/// The prober's own vantage point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRecord {
    /// Externally visible address of the prober.
    pub ip: IpAddr,
    /// Location of `ip`, when enrichment is enabled and succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoInfo>,
}

/// One (nameserver, site) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRow {
    /// Nameserver label.
    pub nameserver_label: String,
    /// Nameserver address.
    pub nameserver_address: IpAddr,
    /// Site label.
    pub site_label: String,
    /// Hostname that was resolved.
    pub hostname: String,
    /// What the nameserver answered.
    pub outcome: ResolutionOutcome,
    /// Location of the resolved address. Never set unless `outcome` is resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<GeoInfo>,
}

impl ResolutionRow {
    /// Row without geo data.
    pub fn new(nameserver: &NameserverEntry, site: &SiteEntry, outcome: ResolutionOutcome) -> Self {
        Self {
            nameserver_label: nameserver.label.clone(),
            nameserver_address: nameserver.address,
            site_label: site.label.clone(),
            hostname: site.hostname.clone(),
            outcome,
            geo: None,
        }
    }

    /// Attach geo data. Ignored for rows that did not resolve.
    pub fn with_geo(mut self, geo: Option<GeoInfo>) -> Self {
        if self.outcome.ip().is_some() {
            self.geo = geo;
        }
        self
    }
}

/// Atomic result of one full probing cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Start of the cycle.
    pub timestamp: DateTime<Utc>,
    /// The prober itself.
    pub local: LocalRecord,
    /// Nameservers outer, sites inner, in registry order.
    pub resolutions: Vec<ResolutionRow>,
}

impl Snapshot {
    /// Pretty-printed JSON with keys sorted at every level.
    pub fn to_canonical_json(&self) -> Result<String, serde_json::Error> {
        // serde_json::Value objects are BTreeMaps, so the round trip sorts keys.
        let value = serde_json::to_value(self)?;
        serde_json::to_string_pretty(&value)
    }
}
