//! Startup check of the host's public IP and country.
//!
//! Gemini is not served everywhere. This only logs; it never blocks startup.

use serde::Deserialize;
use tracing::{info, warn};

/// Countries known to work with the Gemini API.
pub const SUPPORTED_COUNTRIES: &[&str] = &["US", "DE", "GB", "FR"];

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct IpInfo {
    pub ip: Option<String>,
    pub country: Option<String>,
}

impl IpInfo {
    pub fn is_supported_region(&self) -> bool {
        self.country
            .as_deref()
            .is_some_and(|c| SUPPORTED_COUNTRIES.contains(&c))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("lookup returned {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),
}

pub async fn lookup(client: &reqwest::Client, url: &str) -> Result<IpInfo, GeoError> {
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(GeoError::Status(status));
    }

    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Look up the public IP and log it, warning when the region looks unsupported.
/// Returns what was found, or `None` when the lookup failed.
pub async fn log_region_advisory(client: &reqwest::Client, url: &str) -> Option<IpInfo> {
    match lookup(client, url).await {
        Ok(info) => {
            info!(
                "Running from IP: {}, country: {}",
                info.ip.as_deref().unwrap_or("unknown"),
                info.country.as_deref().unwrap_or("unknown")
            );
            if !info.is_supported_region() {
                warn!("The country of this IP address may not be supported by the Gemini API");
            }
            Some(info)
        }
        Err(e) => {
            warn!("Could not determine public IP address: {e}");
            None
        }
    }
}
