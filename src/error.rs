//! Error types for geodns-probe.

use thiserror::Error;

/// Errors raised while loading and validating startup configuration.
///
/// Every variant is fatal. The binary exits with [`ConfigError::exit_code`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required key is absent or empty.
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    /// The cycle interval is not an integer number of seconds.
    #[error("interval must be an integer number of seconds, got {0:?}")]
    Interval(String),

    /// The DNS query timeout is not a positive integer number of seconds.
    #[error("timeout must be a positive integer number of seconds, got {0:?}")]
    Timeout(String),

    /// Any other malformed value.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The configuration source itself could not be read or deserialized.
    #[error("configuration source error: {0}")]
    Source(#[from] config::ConfigError),
}

impl ConfigError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConfigError::Interval(_) => 2,
            ConfigError::Timeout(_) => 3,
            ConfigError::Missing(_) | ConfigError::Invalid(_) | ConfigError::Source(_) => 1,
        }
    }
}

/// Errors that can occur while running a probe cycle.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// IO error (sockets, files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// DNS protocol error
    #[error("DNS protocol error: {0}")]
    Proto(#[from] hickory_proto::ProtoError),

    /// The "what is my IP" service answered with something that is not an address.
    #[error("Invalid public IP response: {0:?}")]
    InvalidPublicIp(String),
}

/// Errors from the geolocation provider.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Transport or status failure.
    #[error("geolocation request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered but reported a failure in the body.
    #[error("geolocation provider error: {0}")]
    Provider(String),

    /// The body was not the expected JSON object.
    #[error("malformed geolocation response: {0}")]
    Malformed(String),
}

/// Errors raised while exporting a snapshot.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Snapshot could not be serialized.
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Writing to a local stream failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failure talking to a remote sink.
    #[error("sink request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote sink answered with a non-success status.
    #[error("sink rejected document with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
}
