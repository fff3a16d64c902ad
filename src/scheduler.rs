//! Fixed-interval probe loop.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::correlator::Correlator;
use crate::error::ProbeError;
use crate::export::Exporter;
use crate::metrics::{self, CycleResult, Timer};
use crate::snapshot::Snapshot;

/// Drives build, emit and export once per interval.
pub struct Scheduler {
    correlator: Correlator,
    exporter: Exporter,
    interval: Duration,
}

impl Scheduler {
    /// Create a scheduler sleeping `interval` between cycles.
    pub fn new(correlator: Correlator, exporter: Exporter, interval: Duration) -> Self {
        Self {
            correlator,
            exporter,
            interval,
        }
    }

    /// Run one cycle: build the snapshot, emit metrics, export.
    ///
    /// Returns the exported snapshot, or the error that aborted the cycle
    /// before anything was emitted.
    pub async fn run_cycle(&self) -> Result<Snapshot, ProbeError> {
        let timer = Timer::start();

        let snapshot = match self.correlator.build_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                metrics::record_cycle(CycleResult::Aborted, timer.elapsed());
                return Err(e);
            }
        };

        metrics::record_snapshot(&snapshot);

        if let Err(e) = self.exporter.export(&snapshot).await {
            error!(error = %e, "failed to export snapshot");
        }

        metrics::record_cycle(CycleResult::Ok, timer.elapsed());
        debug!(
            resolutions = snapshot.resolutions.len(),
            elapsed_ms = timer.elapsed().as_millis() as u64,
            "cycle complete"
        );
        Ok(snapshot)
    }

    /// Run cycles until `shutdown` resolves.
    ///
    /// A slow cycle delays the next one; missed ticks are not caught up.
    pub async fn run<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.interval.as_secs(),
            pairs = self.correlator.registry().pair_count(),
            "Starting probe loop"
        );

        loop {
            tokio::select! {
                result = self.run_cycle() => {
                    if let Err(e) = result {
                        warn!(error = %e, "cycle aborted, retrying at next interval");
                    }
                }
                _ = &mut shutdown => {
                    info!("shutdown requested during cycle");
                    return;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    return;
                }
            }
        }
    }
}
