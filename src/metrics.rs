//! Metrics instrumentation for geodns-probe.
//!
//! All metrics are prefixed with `geodns_probe.`

use metrics::{counter, describe_counter, describe_histogram, histogram, Label};
use std::time::{Duration, Instant};

use crate::geo::GeoInfo;
use crate::snapshot::{ResolutionOutcome, ResolutionRow, Snapshot};

/// Resolved rows, by answer and target.
pub const RESOLUTION_COUNT: &str = "geodns_probe.resolution.count";
/// Resolved rows with geo data, by answer, target and location.
pub const RESOLUTION_GEO_COUNT: &str = "geodns_probe.resolution.geo.count";
/// Rows that timed out or failed.
pub const RESOLUTION_FAILURE_COUNT: &str = "geodns_probe.resolution.failure.count";
/// Prober location, once per cycle with geo data.
pub const LOCAL_GEO_COUNT: &str = "geodns_probe.local.geo.count";
/// Every DNS query issued.
pub const DNS_REQUEST_ATTEMPTS: &str = "geodns_probe.dns.request.attempts";
/// DNS queries that produced an address.
pub const DNS_REQUEST_SUCCESSES: &str = "geodns_probe.dns.request.successes";
/// DNS query latency.
pub const DNS_REQUEST_DURATION: &str = "geodns_probe.dns.request.duration.seconds";
/// Completed or aborted cycles.
pub const CYCLE_COUNT: &str = "geodns_probe.cycle.count";
/// Cycle latency.
pub const CYCLE_DURATION: &str = "geodns_probe.cycle.duration.seconds";
/// Sink forwarding failures.
pub const EXPORT_FAILURE_COUNT: &str = "geodns_probe.export.failure.count";

/// Register descriptions with the installed recorder.
pub fn describe() {
    describe_counter!(RESOLUTION_COUNT, "Resolutions by answer, nameserver and site");
    describe_counter!(
        RESOLUTION_GEO_COUNT,
        "Resolutions by answer, nameserver, site and answer location"
    );
    describe_counter!(RESOLUTION_FAILURE_COUNT, "Resolutions that timed out or failed");
    describe_counter!(LOCAL_GEO_COUNT, "Cycles by prober public IP and location");
    describe_counter!(DNS_REQUEST_ATTEMPTS, "DNS queries issued");
    describe_counter!(DNS_REQUEST_SUCCESSES, "DNS queries that returned an A record");
    describe_histogram!(DNS_REQUEST_DURATION, "Time spent on a single DNS query");
    describe_counter!(CYCLE_COUNT, "Probe cycles by result");
    describe_histogram!(CYCLE_DURATION, "Time spent building a snapshot");
    describe_counter!(EXPORT_FAILURE_COUNT, "Failed snapshot deliveries by sink");
}

/// Emit the per-row and local counters for a finished snapshot.
pub fn record_snapshot(snapshot: &Snapshot) {
    if let Some(geo) = &snapshot.local.geo {
        let mut labels = vec![Label::new("ip", snapshot.local.ip.to_string())];
        labels.extend(geo_labels(geo));
        counter!(LOCAL_GEO_COUNT, labels).increment(1);
    }

    for row in &snapshot.resolutions {
        match &row.outcome {
            ResolutionOutcome::Resolved { ip } => {
                let mut labels = vec![Label::new("ip", ip.to_string())];
                labels.extend(target_labels(row));
                counter!(RESOLUTION_COUNT, labels.clone()).increment(1);

                if let Some(geo) = &row.geo {
                    labels.extend(geo_labels(geo));
                    counter!(RESOLUTION_GEO_COUNT, labels).increment(1);
                }
            }
            outcome => {
                let mut labels = target_labels(row);
                labels.push(Label::new("outcome", outcome.kind()));
                counter!(RESOLUTION_FAILURE_COUNT, labels).increment(1);
            }
        }
    }
}

fn target_labels(row: &ResolutionRow) -> Vec<Label> {
    vec![
        Label::new("nameserver", row.nameserver_label.clone()),
        Label::new("nameserver_address", row.nameserver_address.to_string()),
        Label::new("site", row.site_label.clone()),
        Label::new("hostname", row.hostname.clone()),
    ]
}

fn geo_labels(geo: &GeoInfo) -> [Label; 3] {
    [
        Label::new("region_code", geo.region_code.clone().unwrap_or_default()),
        Label::new("region_name", geo.region_name.clone().unwrap_or_default()),
        Label::new("postal_code", geo.postal_code.clone().unwrap_or_default()),
    ]
}

/// Record a DNS query. Attempts are counted unconditionally, successes only
/// when an address came back.
pub fn record_dns_request(outcome: &ResolutionOutcome, duration: Duration) {
    counter!(DNS_REQUEST_ATTEMPTS).increment(1);
    if matches!(outcome, ResolutionOutcome::Resolved { .. }) {
        counter!(DNS_REQUEST_SUCCESSES).increment(1);
    }
    histogram!(DNS_REQUEST_DURATION, "outcome" => outcome.kind()).record(duration.as_secs_f64());
}

/// Cycle result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum CycleResult {
    /// Snapshot built and exported.
    Ok,
    /// Cycle abandoned before a snapshot existed.
    Aborted,
}

/// Record the end of a cycle.
pub fn record_cycle(result: CycleResult, duration: Duration) {
    let result_str = match result {
        CycleResult::Ok => "ok",
        CycleResult::Aborted => "aborted",
    };

    counter!(CYCLE_COUNT, "result" => result_str).increment(1);
    histogram!(CYCLE_DURATION).record(duration.as_secs_f64());
}

/// Record a sink that failed to accept a snapshot.
pub fn record_export_failure(sink: &str) {
    counter!(EXPORT_FAILURE_COUNT, "sink" => sink.to_string()).increment(1);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    fn counter_value(entries: &[(String, Vec<(String, String)>, u64)], name: &str) -> u64 {
        entries
            .iter()
            .filter(|(n, _, _)| n == name)
            .map(|(_, _, v)| *v)
            .sum()
    }

    fn counters<F: FnOnce()>(f: F) -> Vec<(String, Vec<(String, String)>, u64)> {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        metrics::with_local_recorder(&recorder, f);

        snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(v) => {
                    let labels = key
                        .key()
                        .labels()
                        .map(|l| (l.key().to_string(), l.value().to_string()))
                        .collect();
                    Some((key.key().name().to_string(), labels, v))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_attempts_and_successes_are_distinct() {
        let entries = counters(|| {
            record_dns_request(
                &ResolutionOutcome::Resolved {
                    ip: "203.0.113.5".parse().unwrap(),
                },
                Duration::from_millis(3),
            );
            record_dns_request(&ResolutionOutcome::Timeout, Duration::from_secs(5));
            record_dns_request(
                &ResolutionOutcome::Error {
                    reason: "SERVFAIL".to_string(),
                },
                Duration::from_millis(7),
            );
        });

        assert_eq!(counter_value(&entries, DNS_REQUEST_ATTEMPTS), 3);
        assert_eq!(counter_value(&entries, DNS_REQUEST_SUCCESSES), 1);
    }

    #[test]
    fn test_cycle_results_labeled() {
        let entries = counters(|| {
            record_cycle(CycleResult::Ok, Duration::from_millis(10));
            record_cycle(CycleResult::Aborted, Duration::from_millis(1));
            record_cycle(CycleResult::Ok, Duration::from_millis(12));
        });

        let ok = entries
            .iter()
            .find(|(n, labels, _)| {
                n == CYCLE_COUNT && labels.contains(&("result".to_string(), "ok".to_string()))
            })
            .map(|(_, _, v)| *v);
        assert_eq!(ok, Some(2));
        assert_eq!(counter_value(&entries, CYCLE_COUNT), 3);
    }
}
