//! IPQualityScore fraud-score provider.

use super::{FraudReport, FraudScoreLookup, ProviderError};
use crate::config::IpQualityScoreConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// IPQualityScore API response.
///
/// Everything except `success` is optional: the caller only trusts the body
/// when `success` is true, and missing detail fields are tolerated.
#[derive(Debug, Deserialize)]
struct IpQualityScoreResponse {
    success: bool,

    #[serde(default)]
    message: Option<String>,

    #[serde(default)]
    fraud_score: Option<f64>,

    #[serde(rename = "ISP", default)]
    isp: Option<String>,

    #[serde(default)]
    organization: Option<String>,

    #[serde(default)]
    country_code: Option<String>,

    #[serde(default)]
    region: Option<String>,

    #[serde(default)]
    city: Option<String>,

    #[serde(default)]
    usage_type: Option<String>,
}

impl IpQualityScoreResponse {
    fn into_report(self) -> FraudReport {
        FraudReport {
            fraud_score: self
                .fraud_score
                .filter(|s| s.is_finite())
                .map(|s| s.round().clamp(0.0, 100.0) as u8),
            isp: self.isp,
            organization: self.organization,
            country_code: self.country_code,
            region: self.region,
            city: self.city,
            usage_type: self.usage_type,
        }
    }
}

/// IPQualityScore reputation provider.
pub struct IpQualityScoreProvider {
    config: IpQualityScoreConfig,
    client: Client,
}

impl IpQualityScoreProvider {
    pub fn new(config: IpQualityScoreConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self { config, client })
    }

    /// Lookup URL with the key and address embedded as path segments.
    fn lookup_url(&self, ip: &str, api_key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            api_key,
            ip
        )
    }
}

#[async_trait]
impl FraudScoreLookup for IpQualityScoreProvider {
    async fn lookup(&self, ip: &str, api_key: &str) -> Result<FraudReport, ProviderError> {
        debug!(ip = %ip, "Querying IPQualityScore");

        let response = self.client.get(self.lookup_url(ip, api_key)).send().await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("IPQualityScore rate limit exceeded");
            return Err(ProviderError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::InvalidResponse(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let api_response: IpQualityScoreResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        if !api_response.success {
            let message = api_response
                .message
                .unwrap_or_else(|| "no message".to_string());
            return Err(ProviderError::Rejected(message));
        }

        let report = api_response.into_report();

        debug!(
            ip = %ip,
            fraud_score = ?report.fraud_score,
            isp = ?report.isp,
            country = ?report.country_code,
            usage_type = ?report.usage_type,
            "IPQualityScore lookup complete"
        );

        Ok(report)
    }

    fn name(&self) -> &str {
        "ipqualityscore"
    }
}
