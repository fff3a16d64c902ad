//! Configuration types for geodns-probe.
//!
//! Values come from an optional TOML file layered under the process
//! environment. Everything is read into [`RawConfig`] as optional strings and
//! validated once into the immutable [`Config`] handed to the scheduler.

use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::discovery::DEFAULT_RESOLV_CONF;
use crate::error::ConfigError;
use crate::registry::TargetRegistry;

const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;
const DEFAULT_IPSTACK_URL: &str = "http://api.ipstack.com";
const DEFAULT_PUBLIC_IP_URL: &str = "http://whatismyip.akamai.com";

/// Unvalidated configuration, one field per environment key (lowercased).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `label,address` entries.
    pub nameservers: Option<String>,
    /// `label,hostname` entries.
    pub sites: Option<String>,
    /// Seconds between cycles.
    pub interval: Option<String>,
    /// DNS query timeout in seconds.
    pub timeout: Option<String>,
    /// Timeout for every outbound HTTP call, in seconds.
    pub http_timeout: Option<String>,
    /// Port for the Prometheus endpoint.
    pub prometheus_port: Option<String>,
    /// Geolocation credential.
    pub ipstack_api_key: Option<String>,
    /// Geolocation provider base URL.
    pub ipstack_url: Option<String>,
    /// "What is my IP" endpoint.
    pub public_ip_url: Option<String>,
    /// Document store base URL.
    pub es_endpoint: Option<String>,
    /// Document store index.
    pub es_index: Option<String>,
    /// Attach an EDNS client-subnet hint to queries.
    pub client_subnet: Option<String>,
    /// System resolver file; empty disables discovery.
    pub resolv_conf: Option<String>,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: Option<String>,
}

impl RawConfig {
    /// Read the optional file at `path`, then the environment on top of it.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let raw = builder
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()?;
        Ok(raw)
    }
}

/// Validated, immutable configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Configured nameservers and sites.
    pub registry: TargetRegistry,

    /// Cycle behaviour.
    pub probe: ProbeConfig,

    /// Geo enrichment, if a credential is configured.
    pub geo: Option<GeoConfig>,

    /// Document store forwarding, if configured.
    pub store: Option<StoreConfig>,

    /// Telemetry configuration.
    pub telemetry: TelemetryConfig,
}

/// Cycle timing and query options.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Sleep between cycles.
    pub interval: Duration,
    /// Per DNS query bound.
    pub dns_timeout: Duration,
    /// Per HTTP call bound.
    pub http_timeout: Duration,
    /// Attach the prober's public IP as an EDNS client-subnet hint.
    pub client_subnet: bool,
    /// "What is my IP" endpoint.
    pub public_ip_url: String,
    /// Where to discover system resolvers; `None` disables discovery.
    pub resolv_conf: Option<PathBuf>,
}

/// Geolocation provider settings.
#[derive(Clone)]
pub struct GeoConfig {
    /// Provider access key.
    pub access_key: String,
    /// Provider base URL.
    pub base_url: String,
}

impl std::fmt::Debug for GeoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoConfig")
            .field("access_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Document store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Base URL (e.g. "http://localhost:9200").
    pub endpoint: String,
    /// Index receiving one document per cycle.
    pub index: String,
}

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "geodns_probe=debug,warn").
    pub log_level: String,

    /// Prometheus metrics exporter address.
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            prometheus_addr: None,
        }
    }
}

impl Config {
    /// Load and validate configuration. Resolver discovery is not performed here.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_raw(RawConfig::load(path)?)
    }

    /// Validate raw values.
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let nameservers = non_empty(raw.nameservers).ok_or(ConfigError::Missing("NAMESERVERS"))?;
        let sites = non_empty(raw.sites).ok_or(ConfigError::Missing("SITES"))?;
        let registry = TargetRegistry::new(
            TargetRegistry::parse_nameservers(&nameservers)?,
            TargetRegistry::parse_sites(&sites)?,
        )?;

        let interval = match non_empty(raw.interval) {
            Some(v) => parse_secs(&v).ok_or(ConfigError::Interval(v))?,
            None => DEFAULT_INTERVAL_SECS,
        };
        let dns_timeout = match non_empty(raw.timeout) {
            Some(v) => parse_secs(&v)
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Timeout(v))?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let http_timeout = match non_empty(raw.http_timeout) {
            Some(v) => parse_secs(&v).filter(|secs| *secs > 0).ok_or_else(|| {
                ConfigError::Invalid(format!("HTTP_TIMEOUT must be a positive integer, got {v:?}"))
            })?,
            None => DEFAULT_HTTP_TIMEOUT_SECS,
        };

        let client_subnet = match non_empty(raw.client_subnet) {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                ConfigError::Invalid(format!("CLIENT_SUBNET must be a boolean, got {v:?}"))
            })?,
            None => false,
        };

        let resolv_conf = match raw.resolv_conf {
            Some(path) if path.trim().is_empty() => None,
            Some(path) => Some(PathBuf::from(path)),
            None => Some(PathBuf::from(DEFAULT_RESOLV_CONF)),
        };

        let geo = non_empty(raw.ipstack_api_key).map(|access_key| GeoConfig {
            access_key,
            base_url: non_empty(raw.ipstack_url)
                .unwrap_or_else(|| DEFAULT_IPSTACK_URL.to_string()),
        });

        let store = match (non_empty(raw.es_endpoint), non_empty(raw.es_index)) {
            (Some(endpoint), Some(index)) => Some(StoreConfig { endpoint, index }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid(
                    "ES_ENDPOINT and ES_INDEX must be set together".to_string(),
                ))
            }
        };

        let prometheus_addr = match non_empty(raw.prometheus_port) {
            Some(v) => {
                let port: u16 = v.trim().parse().map_err(|_| {
                    ConfigError::Invalid(format!("PROMETHEUS_PORT must be a port number, got {v:?}"))
                })?;
                Some(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
            }
            None => None,
        };

        Ok(Self {
            registry,
            probe: ProbeConfig {
                interval: Duration::from_secs(interval),
                dns_timeout: Duration::from_secs(dns_timeout),
                http_timeout: Duration::from_secs(http_timeout),
                client_subnet,
                public_ip_url: non_empty(raw.public_ip_url)
                    .unwrap_or_else(|| DEFAULT_PUBLIC_IP_URL.to_string()),
                resolv_conf,
            },
            geo,
            store,
            telemetry: TelemetryConfig {
                log_level: non_empty(raw.log_level).unwrap_or_else(|| "info".to_string()),
                prometheus_addr,
            },
        })
    }

    /// Log which optional features are active.
    pub fn log_features(&self) {
        info!(
            nameservers = self.registry.nameservers().len(),
            sites = self.registry.sites().len(),
            interval_secs = self.probe.interval.as_secs(),
            timeout_secs = self.probe.dns_timeout.as_secs(),
            "probe targets loaded"
        );

        match &self.geo {
            Some(geo) => info!(provider = %geo.base_url, "geolocation enabled"),
            None => info!("geolocation disabled, IPSTACK_API_KEY not set"),
        }
        match self.telemetry.prometheus_addr {
            Some(addr) => info!(%addr, "Prometheus endpoint enabled"),
            None => info!("Prometheus endpoint disabled, PROMETHEUS_PORT not set"),
        }
        match &self.store {
            Some(store) => info!(endpoint = %store.endpoint, index = %store.index, "document store enabled"),
            None => info!("document store disabled, ES_ENDPOINT/ES_INDEX not set"),
        }
        if self.probe.client_subnet {
            info!("client-subnet hint enabled");
        } else {
            info!("client-subnet hint disabled");
        }
        match &self.probe.resolv_conf {
            Some(path) => info!(path = %path.display(), "system resolver discovery enabled"),
            None => info!("system resolver discovery disabled"),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_secs(value: &str) -> Option<u64> {
    value.trim().parse().ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
