//! Public IP discovery via an ipinfo-style JSON endpoint.

use super::{IpDiscovery, ProviderError};
use crate::config::IpDiscoveryConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    #[serde(default)]
    ip: Option<String>,
}

/// Discovers the public address by asking ipinfo.io.
pub struct IpInfoProvider {
    config: IpDiscoveryConfig,
    client: Client,
}

impl IpInfoProvider {
    pub fn new(config: IpDiscoveryConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl IpDiscovery for IpInfoProvider {
    async fn current_ip(&self) -> Result<String, ProviderError> {
        debug!(url = %self.config.url, "Discovering public IP");

        let response = self
            .client
            .get(&self.config.url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }

        if !response.status().is_success() {
            return Err(ProviderError::InvalidResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body: IpInfoResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        match body.ip.map(|ip| ip.trim().to_string()) {
            Some(ip) if !ip.is_empty() => {
                debug!(ip = %ip, "Public IP discovered");
                Ok(ip)
            }
            _ => Err(ProviderError::InvalidResponse(
                "response has no 'ip' field".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "ipinfo"
    }
}
