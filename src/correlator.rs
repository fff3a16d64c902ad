//! Builds one [`Snapshot`] per cycle from the registry and its collaborators.

use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ProbeError;
use crate::geo::{GeoInfo, GeoLookup};
use crate::public_ip::PublicIpSource;
use crate::registry::TargetRegistry;
use crate::resolver::Resolve;
use crate::snapshot::{LocalRecord, ResolutionRow, Snapshot};

/// Correlates resolutions with geo data into snapshots.
pub struct Correlator {
    registry: Arc<TargetRegistry>,
    resolver: Box<dyn Resolve>,
    public_ip: Box<dyn PublicIpSource>,
    geo: Option<Box<dyn GeoLookup>>,
    client_subnet: bool,
}

impl Correlator {
    /// Create a correlator without geo enrichment or client-subnet hints.
    pub fn new(
        registry: Arc<TargetRegistry>,
        resolver: Box<dyn Resolve>,
        public_ip: Box<dyn PublicIpSource>,
    ) -> Self {
        Self {
            registry,
            resolver,
            public_ip,
            geo: None,
            client_subnet: false,
        }
    }

    /// Enable geo enrichment.
    pub fn with_geo(mut self, geo: Box<dyn GeoLookup>) -> Self {
        self.geo = Some(geo);
        self
    }

    /// Send the prober's public IP as a client-subnet hint on every query.
    pub fn with_client_subnet(mut self, enabled: bool) -> Self {
        self.client_subnet = enabled;
        self
    }

    /// Probed targets.
    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Run every (nameserver, site) pair and assemble the snapshot.
    ///
    /// Fails only when the prober's own public IP cannot be determined.
    pub async fn build_snapshot(&self) -> Result<Snapshot, ProbeError> {
        let timestamp = Utc::now();

        let local_ip = self.public_ip.public_ip().await?;
        let local = LocalRecord {
            ip: local_ip,
            geo: self.locate(local_ip).await,
        };

        let client_ip = self.client_subnet.then_some(local_ip);
        let mut resolutions = Vec::with_capacity(self.registry.pair_count());

        for nameserver in self.registry.nameservers() {
            for site in self.registry.sites() {
                let outcome = self
                    .resolver
                    .resolve(nameserver.address, &site.hostname, client_ip)
                    .await;

                let geo = match outcome.ip() {
                    Some(ip) => self.locate(IpAddr::V4(ip)).await,
                    None => {
                        debug!(
                            nameserver = %nameserver.label,
                            site = %site.label,
                            outcome = outcome.kind(),
                            "resolution failed"
                        );
                        None
                    }
                };

                resolutions.push(ResolutionRow::new(nameserver, site, outcome).with_geo(geo));
            }
        }

        Ok(Snapshot {
            timestamp,
            local,
            resolutions,
        })
    }

    /// Geo data for `ip`, or `None` when disabled or the lookup failed.
    async fn locate(&self, ip: IpAddr) -> Option<GeoInfo> {
        let geo = self.geo.as_ref()?;
        match geo.lookup(ip).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(%ip, error = %e, "geolocation failed, continuing without geo data");
                None
            }
        }
    }
}
