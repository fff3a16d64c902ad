//! IP geolocation enrichment.
//!
//! Enrichment is optional: the correlator only holds a [`GeoLookup`] when a
//! provider credential is configured. Lookups are never cached; an address
//! seen in consecutive cycles is queried again each time.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::IpAddr;
use tracing::debug;

use crate::config::GeoConfig;
use crate::error::GeoError;

/// Coarse location of an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    /// The address that was located.
    pub ip: IpAddr,
    /// Region code (e.g. "CA").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
    /// Region name (e.g. "California").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_name: Option<String>,
    /// Postal code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Remaining scalar fields reported by the provider.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl GeoInfo {
    /// Build from a provider JSON object, dropping nested structures.
    ///
    /// `queried` is used when the provider does not echo a parsable `ip`.
    pub fn from_provider(queried: IpAddr, mut body: Map<String, Value>) -> Self {
        let ip = body
            .remove("ip")
            .and_then(|v| v.as_str().and_then(|s| s.parse().ok()))
            .unwrap_or(queried);
        let region_code = take_string(&mut body, "region_code");
        let region_name = take_string(&mut body, "region_name");
        let postal_code = take_string(&mut body, "zip");

        let extra = body
            .into_iter()
            .filter(|(_, v)| !v.is_object() && !v.is_array())
            .collect();

        Self {
            ip,
            region_code,
            region_name,
            postal_code,
            extra,
        }
    }
}

fn take_string(body: &mut Map<String, Value>, key: &str) -> Option<String> {
    match body.remove(key)? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Source of geolocation data.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Locate `ip`.
    async fn lookup(&self, ip: IpAddr) -> Result<GeoInfo, GeoError>;
}

/// ipstack-compatible HTTP geolocation client.
#[derive(Debug, Clone)]
pub struct IpstackClient {
    http: reqwest::Client,
    base_url: String,
    access_key: String,
}

impl IpstackClient {
    /// Create a client. `http` must already carry the request timeout.
    pub fn new(http: reqwest::Client, config: &GeoConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_key: config.access_key.clone(),
        }
    }
}

#[async_trait]
impl GeoLookup for IpstackClient {
    async fn lookup(&self, ip: IpAddr) -> Result<GeoInfo, GeoError> {
        let url = format!("{}/{}", self.base_url, ip);

        let body: Value = self
            .http
            .get(&url)
            .query(&[("access_key", self.access_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let body = match body {
            Value::Object(body) => body,
            other => return Err(GeoError::Malformed(format!("expected object, got {other}"))),
        };

        if body.get("success").and_then(Value::as_bool) == Some(false) {
            let info = body
                .get("error")
                .and_then(|e| e.get("info"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(GeoError::Provider(info));
        }

        debug!(%ip, "geolocated address");
        Ok(GeoInfo::from_provider(ip, body))
    }
}
