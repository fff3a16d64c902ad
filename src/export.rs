//! Delivery of serialized snapshots to sinks.
//!
//! The primary sink (standard output in production) is always written first.
//! Forwarding sinks are attempted afterwards; their failures are logged and
//! counted but never propagate.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::ExportError;
use crate::metrics;
use crate::snapshot::Snapshot;

/// Destination for serialized snapshots.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Name used in logs and metric labels.
    fn name(&self) -> &str;

    /// Deliver one serialized snapshot.
    async fn send(&self, document: &str) -> Result<(), ExportError>;
}

/// Writes each snapshot to standard output followed by a newline.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

#[async_trait]
impl Sink for StdoutSink {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, document: &str) -> Result<(), ExportError> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(document.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Indexes snapshots into an Elasticsearch-compatible document store.
#[derive(Debug, Clone)]
pub struct DocumentStoreSink {
    http: reqwest::Client,
    url: String,
}

impl DocumentStoreSink {
    /// Create a sink posting to `{endpoint}/{index}/_doc`.
    pub fn new(http: reqwest::Client, config: &StoreConfig) -> Self {
        let url = format!(
            "{}/{}/_doc",
            config.endpoint.trim_end_matches('/'),
            config.index
        );
        Self { http, url }
    }
}

#[async_trait]
impl Sink for DocumentStoreSink {
    fn name(&self) -> &str {
        "document_store"
    }

    async fn send(&self, document: &str) -> Result<(), ExportError> {
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(document.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(url = %self.url, "snapshot indexed");
        Ok(())
    }
}

/// Serializes snapshots and fans them out to sinks.
pub struct Exporter {
    primary: Box<dyn Sink>,
    forwards: Vec<Box<dyn Sink>>,
}

impl Exporter {
    /// Exporter writing to `primary` only.
    pub fn new(primary: Box<dyn Sink>) -> Self {
        Self {
            primary,
            forwards: Vec::new(),
        }
    }

    /// Exporter writing to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(StdoutSink))
    }

    /// Also forward to `sink` after the primary write.
    pub fn with_forward(mut self, sink: Box<dyn Sink>) -> Self {
        self.forwards.push(sink);
        self
    }

    /// Serialize and deliver `snapshot`.
    ///
    /// Errors only if serialization or the primary write fails.
    pub async fn export(&self, snapshot: &Snapshot) -> Result<(), ExportError> {
        let document = snapshot.to_canonical_json()?;

        if let Err(e) = self.primary.send(&document).await {
            metrics::record_export_failure(self.primary.name());
            return Err(e);
        }

        for sink in &self.forwards {
            if let Err(e) = sink.send(&document).await {
                metrics::record_export_failure(sink.name());
                warn!(sink = sink.name(), error = %e, "failed to forward snapshot");
            }
        }

        Ok(())
    }
}
