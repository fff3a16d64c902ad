//! Shared HTTP client construction.

use std::time::Duration;

use crate::error::ProbeError;

/// Build the client used for every outbound HTTP call.
///
/// `timeout` bounds the whole request, connect through body.
pub fn client(timeout: Duration) -> Result<reqwest::Client, ProbeError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
