//! geodns-probe binary entry point.

use clap::Parser;
use geodns_probe::{
    discovery, http, telemetry, Config, Correlator, DocumentStoreSink, Exporter, HttpPublicIp,
    IpstackClient, Scheduler, UdpResolver,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Periodically resolve sites against many nameservers and geolocate the answers.
#[derive(Parser, Debug)]
#[command(name = "geodns-probe")]
#[command(version, about, long_about = None)]
struct Args {
    /// Optional configuration file (TOML). Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}. Please check the README for the required variables.");
            return ExitCode::from(e.exit_code());
        }
    };

    // Initialize telemetry
    if let Err(e) = telemetry::init(&config.telemetry) {
        eprintln!("failed to initialize telemetry: {e}");
        return ExitCode::FAILURE;
    }

    let mut registry = config.registry.clone();
    if let Some(path) = &config.probe.resolv_conf {
        match discovery::discover(path) {
            Ok(found) => registry = registry.append_discovered(found),
            Err(e) => warn!(path = %path.display(), error = %e, "could not read system resolvers"),
        }
    }

    config.log_features();
    info!(
        nameservers = registry.nameservers().len(),
        sites = registry.sites().len(),
        "Starting geodns-probe"
    );

    let http = match http::client(config.probe.http_timeout) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };

    let mut correlator = Correlator::new(
        Arc::new(registry),
        Box::new(UdpResolver::new(config.probe.dns_timeout)),
        Box::new(HttpPublicIp::new(http.clone(), &config.probe.public_ip_url)),
    )
    .with_client_subnet(config.probe.client_subnet);
    if let Some(geo) = &config.geo {
        correlator = correlator.with_geo(Box::new(IpstackClient::new(http.clone(), geo)));
    }

    let mut exporter = Exporter::stdout();
    if let Some(store) = &config.store {
        exporter = exporter.with_forward(Box::new(DocumentStoreSink::new(http, store)));
    }

    let scheduler = Scheduler::new(correlator, exporter, config.probe.interval);
    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("geodns-probe shutdown complete");
    ExitCode::SUCCESS
}
