//! AbuseIPDB blocklist provider.

use super::{AbuseLookup, ProviderError};
use crate::config::AbuseIPDBConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Reports older than this many days are ignored.
pub const MAX_AGE_DAYS: u32 = 90;

/// Extract `data.abuseConfidenceScore`, treating anything missing or
/// malformed as 0.
fn confidence_from_body(body: &Value) -> u8 {
    body.pointer("/data/abuseConfidenceScore")
        .and_then(Value::as_u64)
        .map(|score| score.min(100) as u8)
        .unwrap_or(0)
}

fn total_reports_from_body(body: &Value) -> u64 {
    body.pointer("/data/totalReports")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// AbuseIPDB blocklist provider.
pub struct AbuseIPDBProvider {
    config: AbuseIPDBConfig,
    client: Client,
}

impl AbuseIPDBProvider {
    /// Create a new AbuseIPDB provider.
    pub fn new(config: AbuseIPDBConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl AbuseLookup for AbuseIPDBProvider {
    async fn confidence_score(&self, ip: &str, api_key: &str) -> Result<u8, ProviderError> {
        debug!(ip = %ip, "Querying AbuseIPDB");

        let max_age = MAX_AGE_DAYS.to_string();
        let response = self
            .client
            .get(&self.config.url)
            .query(&[("ipAddress", ip), ("maxAgeInDays", max_age.as_str())])
            .header("Key", api_key)
            .header("Accept", "application/json")
            .send()
            .await?;

        // Check for rate limiting
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("AbuseIPDB rate limit exceeded");
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

        let body: Value = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("Failed to parse response: {}", e))
        })?;

        let score = confidence_from_body(&body);

        debug!(
            ip = %ip,
            score = score,
            reports = total_reports_from_body(&body),
            "AbuseIPDB lookup complete"
        );

        Ok(score)
    }

    fn name(&self) -> &str {
        "abuseipdb"
    }
}
