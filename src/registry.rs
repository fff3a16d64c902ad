//! Nameservers and sites probed on every cycle.
//!
//! The registry is built once at startup and never mutated afterwards; it is
//! shared read-only with the correlator.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use tracing::{debug, info};

use crate::error::ConfigError;

/// Label prefix used for resolvers discovered from the system configuration.
pub const DISCOVERED_LABEL_PREFIX: &str = "local";

/// A labeled DNS server queried directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameserverEntry {
    /// Stable metric/record label, unique within the registry.
    pub label: String,
    /// Server address.
    pub address: IpAddr,
}

/// A labeled hostname resolved against every nameserver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEntry {
    /// Stable metric/record label, unique within the registry.
    pub label: String,
    /// Hostname to resolve.
    pub hostname: String,
}

/// Immutable set of probe targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRegistry {
    nameservers: Vec<NameserverEntry>,
    sites: Vec<SiteEntry>,
}

impl TargetRegistry {
    /// Build a registry, rejecting duplicate labels.
    pub fn new(
        nameservers: Vec<NameserverEntry>,
        sites: Vec<SiteEntry>,
    ) -> Result<Self, ConfigError> {
        ensure_unique("nameserver", nameservers.iter().map(|n| n.label.as_str()))?;
        ensure_unique("site", sites.iter().map(|s| s.label.as_str()))?;
        Ok(Self { nameservers, sites })
    }

    /// Parse the `label,address label,address` form.
    pub fn parse_nameservers(list: &str) -> Result<Vec<NameserverEntry>, ConfigError> {
        parse_pairs(list, "nameserver")?
            .into_iter()
            .map(|(label, address)| {
                let address = address.parse().map_err(|_| {
                    ConfigError::Invalid(format!(
                        "nameserver {label:?} has invalid address {address:?}"
                    ))
                })?;
                Ok(NameserverEntry { label, address })
            })
            .collect()
    }

    /// Parse the `label,hostname label,hostname` form.
    pub fn parse_sites(list: &str) -> Result<Vec<SiteEntry>, ConfigError> {
        Ok(parse_pairs(list, "site")?
            .into_iter()
            .map(|(label, hostname)| SiteEntry { label, hostname })
            .collect())
    }

    /// Append resolvers discovered on the host, labeled `local1`, `local2`, ...
    ///
    /// Labels already taken by configured nameservers are skipped, as are
    /// addresses that are already probed. Only called during startup, before
    /// the registry is shared.
    pub fn append_discovered(mut self, addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        let mut next = 1;
        for address in addresses {
            if let Some(existing) = self.nameservers.iter().find(|n| n.address == address) {
                debug!(%address, label = %existing.label, "system resolver already configured");
                continue;
            }

            let label = loop {
                let candidate = format!("{DISCOVERED_LABEL_PREFIX}{next}");
                next += 1;
                if self.nameservers.iter().all(|n| n.label != candidate) {
                    break candidate;
                }
                debug!(label = %candidate, "discovered label taken, trying next");
            };
            info!(%address, %label, "added system resolver");
            self.nameservers.push(NameserverEntry { label, address });
        }
        self
    }

    /// Nameservers in probe order.
    pub fn nameservers(&self) -> &[NameserverEntry] {
        &self.nameservers
    }

    /// Sites in probe order.
    pub fn sites(&self) -> &[SiteEntry] {
        &self.sites
    }

    /// Number of (nameserver, site) pairs probed per cycle.
    pub fn pair_count(&self) -> usize {
        self.nameservers.len() * self.sites.len()
    }
}

fn parse_pairs(list: &str, kind: &str) -> Result<Vec<(String, String)>, ConfigError> {
    list.split_whitespace()
        .map(|entry| match entry.split_once(',') {
            Some((label, value)) if !label.is_empty() && !value.is_empty() => {
                Ok((label.to_string(), value.to_string()))
            }
            _ => Err(ConfigError::Invalid(format!(
                "{kind} entry {entry:?} is not of the form label,value"
            ))),
        })
        .collect()
}

fn ensure_unique<'a>(
    kind: &str,
    labels: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for label in labels {
        if !seen.insert(label) {
            return Err(ConfigError::Invalid(format!(
                "duplicate {kind} label {label:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nameservers() {
        let entries = TargetRegistry::parse_nameservers("google,8.8.8.8  quad9,9.9.9.9").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label, "google");
        assert_eq!(entries[0].address, "8.8.8.8".parse::<IpAddr>().unwrap());
        assert_eq!(entries[1].label, "quad9");
    }

    #[test]
    fn test_parse_nameserver_rejects_bad_address() {
        let err = TargetRegistry::parse_nameservers("google,not-an-ip").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_parse_sites_requires_comma() {
        assert!(TargetRegistry::parse_sites("example.com").is_err());
        assert!(TargetRegistry::parse_sites(",example.com").is_err());

        let sites = TargetRegistry::parse_sites("home,example.test").unwrap();
        assert_eq!(sites[0].hostname, "example.test");
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let ns = TargetRegistry::parse_nameservers("a,1.1.1.1 a,8.8.8.8").unwrap();
        let sites = TargetRegistry::parse_sites("home,example.test").unwrap();
        assert!(TargetRegistry::new(ns, sites).is_err());
    }

    #[test]
    fn test_append_discovered_labels_sequentially() {
        let ns = TargetRegistry::parse_nameservers("google,8.8.8.8").unwrap();
        let sites = TargetRegistry::parse_sites("home,example.test").unwrap();
        let registry = TargetRegistry::new(ns, sites)
            .unwrap()
            .append_discovered(["127.0.0.53".parse().unwrap(), "10.0.0.1".parse().unwrap()]);

        let labels: Vec<_> = registry.nameservers().iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, ["google", "local1", "local2"]);
        assert_eq!(registry.pair_count(), 3);
    }

    #[test]
    fn test_append_discovered_skips_taken_labels() {
        let ns = TargetRegistry::parse_nameservers("local1,127.0.0.1 local3,8.8.8.8").unwrap();
        let sites = TargetRegistry::parse_sites("home,example.test").unwrap();
        let registry = TargetRegistry::new(ns, sites)
            .unwrap()
            .append_discovered(["10.0.0.2".parse().unwrap(), "10.0.0.3".parse().unwrap()]);

        let labels: Vec<_> = registry.nameservers().iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, ["local1", "local3", "local2", "local4"]);
        assert_eq!(
            registry.nameservers()[2].address,
            "10.0.0.2".parse::<IpAddr>().unwrap()
        );
        ensure_unique("nameserver", labels.into_iter()).unwrap();
    }

    #[test]
    fn test_append_discovered_skips_configured_address() {
        let ns = TargetRegistry::parse_nameservers("google,8.8.8.8").unwrap();
        let sites = TargetRegistry::parse_sites("home,example.test").unwrap();
        let registry = TargetRegistry::new(ns, sites)
            .unwrap()
            .append_discovered(["8.8.8.8".parse().unwrap(), "10.0.0.1".parse().unwrap()]);

        let labels: Vec<_> = registry.nameservers().iter().map(|n| n.label.as_str()).collect();
        assert_eq!(labels, ["google", "local1"]);
        assert_eq!(registry.pair_count(), 2);
    }
}
