//! Discovery of the prober's externally visible address.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::error::ProbeError;

/// Source of the prober's own public IP.
#[async_trait]
pub trait PublicIpSource: Send + Sync {
    /// Current externally visible address.
    async fn public_ip(&self) -> Result<IpAddr, ProbeError>;
}

/// Plain-text "what is my IP" endpoint, such as whatismyip.akamai.com.
#[derive(Debug, Clone)]
pub struct HttpPublicIp {
    http: reqwest::Client,
    url: String,
}

impl HttpPublicIp {
    /// Create a source querying `url`.
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PublicIpSource for HttpPublicIp {
    async fn public_ip(&self) -> Result<IpAddr, ProbeError> {
        let body = self
            .http
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let trimmed = body.trim();
        trimmed
            .parse()
            .map_err(|_| ProbeError::InvalidPublicIp(trimmed.to_string()))
    }
}
