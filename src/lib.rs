//! geodns-probe - watch which address each nameserver hands out, and where it lives.
//!
//! This crate periodically resolves a fixed set of hostnames against a fixed
//! set of nameservers (configured ones plus the host's own resolvers),
//! geolocates every answer, and publishes the result as a JSON snapshot on
//! stdout, an optional document-store index, and labeled Prometheus counters.
//! It is meant for diagnosing geo-routed answers from anycast, GeoDNS and CDN
//! steering.
//!
//! ## Features
//!
//! - Direct UDP queries that bypass the host resolver chain
//! - Optional EDNS client-subnet hint carrying the prober's public IP
//! - Optional geo enrichment via an ipstack-compatible API
//! - Optional Elasticsearch-compatible forwarding
//! - Prometheus endpoint for the per-answer counters
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          geodns-probe                            │
//! │                                                                  │
//! │  ┌───────────┐   ┌──────────────────────────────┐                │
//! │  │ Scheduler │──▶│ Correlator                   │                │
//! │  │ (interval)│   │  public IP ──▶ geo           │◀── HTTP        │
//! │  └─────┬─────┘   │  ns×site ──▶ resolve ──▶ geo │◀── UDP :53     │
//! │        │         └──────────────┬───────────────┘                │
//! │        │                        ▼ Snapshot                       │
//! │        │         ┌──────────────────┐  ┌──────────────────┐      │
//! │        └────────▶│ metrics counters │  │ Exporter         │──▶ stdout
//! │                  └──────────────────┘  │                  │──▶ document store
//! │                                        └──────────────────┘      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use geodns_probe::{Config, Correlator, Exporter, HttpPublicIp, Scheduler, UdpResolver};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = Config::load(None).unwrap();
//!     let http = geodns_probe::http::client(config.probe.http_timeout).unwrap();
//!
//!     let correlator = Correlator::new(
//!         Arc::new(config.registry.clone()),
//!         Box::new(UdpResolver::new(config.probe.dns_timeout)),
//!         Box::new(HttpPublicIp::new(http, &config.probe.public_ip_url)),
//!     );
//!
//!     let scheduler = Scheduler::new(correlator, Exporter::stdout(), config.probe.interval);
//!     scheduler.run(async { let _ = tokio::signal::ctrl_c().await; }).await;
//! }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod correlator;
pub mod discovery;
pub mod error;
pub mod export;
pub mod geo;
pub mod http;
pub mod metrics;
pub mod public_ip;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod snapshot;
pub mod telemetry;

// Re-export main types
pub use config::{Config, GeoConfig, ProbeConfig, StoreConfig, TelemetryConfig};
pub use correlator::Correlator;
pub use error::{ConfigError, ExportError, GeoError, ProbeError};
pub use export::{DocumentStoreSink, Exporter, Sink, StdoutSink};
pub use geo::{GeoInfo, GeoLookup, IpstackClient};
pub use public_ip::{HttpPublicIp, PublicIpSource};
pub use registry::{NameserverEntry, SiteEntry, TargetRegistry};
pub use resolver::{Resolve, UdpResolver};
pub use scheduler::Scheduler;
pub use snapshot::{LocalRecord, ResolutionOutcome, ResolutionRow, Snapshot};
