//! External lookup clients.
//!
//! Each client sits behind a small async trait so the poll cycle can be
//! exercised against stubs without touching the network.

pub mod abuseipdb;
pub mod ipinfo;
pub mod ipqualityscore;
pub mod spamhaus;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use std::fmt;

/// Fraud scores strictly above this value are classified as high risk.
pub const HIGH_RISK_THRESHOLD: u8 = 75;

/// Fraud-score lookup result.
///
/// Only `fraud_score` feeds the snapshot; the remaining fields are
/// informational and may be absent when the upstream schema drifts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FraudReport {
    /// Fraud score (0-100, higher = worse).
    pub fraud_score: Option<u8>,
    pub isp: Option<String>,
    pub organization: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    /// Usage type (e.g. "Residential", "Data Center").
    pub usage_type: Option<String>,
}

impl FraudReport {
    /// Risk classification of this report, if a score was returned.
    pub fn risk(&self) -> Option<RiskLevel> {
        self.fraud_score.map(RiskLevel::from_score)
    }
}

/// Risk classification derived from a fraud score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    High,
}

impl RiskLevel {
    /// Classify a fraud score against [`HIGH_RISK_THRESHOLD`].
    pub fn from_score(score: u8) -> Self {
        if score > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::High => "High Risk",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether an address appears on a blocklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingStatus {
    Listed,
    NotListed,
}

impl ListingStatus {
    /// AbuseIPDB semantics: any non-zero confidence counts as listed.
    pub fn from_confidence(score: u8) -> Self {
        if score > 0 {
            ListingStatus::Listed
        } else {
            ListingStatus::NotListed
        }
    }

    pub fn from_listed(listed: bool) -> Self {
        if listed {
            ListingStatus::Listed
        } else {
            ListingStatus::NotListed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ListingStatus::Listed => "Listed",
            ListingStatus::NotListed => "Not Listed",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ListingStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Error from a lookup client.
#[derive(Debug)]
pub enum ProviderError {
    /// HTTP request failed.
    Http(reqwest::Error),
    /// Timeout.
    Timeout,
    /// Rate limited.
    RateLimited,
    /// Invalid response.
    InvalidResponse(String),
    /// The service answered but reported failure (e.g. `success: false`).
    Rejected(String),
    /// DNS resolution failed.
    Dns(String),
    /// Other error.
    Other(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Http(e) => write!(f, "HTTP error: {}", e),
            ProviderError::Timeout => write!(f, "Request timed out"),
            ProviderError::RateLimited => write!(f, "Rate limited"),
            ProviderError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
            ProviderError::Rejected(msg) => write!(f, "Lookup rejected: {}", msg),
            ProviderError::Dns(msg) => write!(f, "DNS error: {}", msg),
            ProviderError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            // Request URLs can carry API keys as path segments.
            ProviderError::Http(e.without_url())
        }
    }
}

/// Discovers the host's current public IP address.
#[async_trait]
pub trait IpDiscovery: Send + Sync {
    async fn current_ip(&self) -> Result<String, ProviderError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Looks up a fraud score for an address.
#[async_trait]
pub trait FraudScoreLookup: Send + Sync {
    async fn lookup(&self, ip: &str, api_key: &str) -> Result<FraudReport, ProviderError>;

    fn name(&self) -> &str;
}

/// Queries an authenticated HTTP blocklist for an abuse confidence score.
#[async_trait]
pub trait AbuseLookup: Send + Sync {
    /// Confidence score in `0..=100`.
    async fn confidence_score(&self, ip: &str, api_key: &str) -> Result<u8, ProviderError>;

    fn name(&self) -> &str;
}

/// Checks an address against a DNS blocklist.
///
/// Lookup failures are reported as "not listed"; there is no error path.
#[async_trait]
pub trait DnsBlocklistLookup: Send + Sync {
    async fn is_listed(&self, ip: &str) -> bool;

    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_boundary() {
        assert_eq!(RiskLevel::from_score(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(75), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(76), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(100), RiskLevel::High);
    }

    #[test]
    fn test_risk_labels() {
        assert_eq!(RiskLevel::from_score(75).label(), "Low Risk");
        assert_eq!(RiskLevel::from_score(76).to_string(), "High Risk");
    }

    #[test]
    fn test_listing_from_confidence() {
        assert_eq!(ListingStatus::from_confidence(0), ListingStatus::NotListed);
        assert_eq!(ListingStatus::from_confidence(1), ListingStatus::Listed);
        assert_eq!(ListingStatus::from_confidence(100), ListingStatus::Listed);
    }

    #[test]
    fn test_listing_labels() {
        assert_eq!(ListingStatus::Listed.to_string(), "Listed");
        assert_eq!(ListingStatus::NotListed.to_string(), "Not Listed");
        assert_eq!(ListingStatus::from_listed(true), ListingStatus::Listed);
        assert_eq!(ListingStatus::from_listed(false), ListingStatus::NotListed);
    }

    #[test]
    fn test_listing_serializes_as_label() {
        let json = serde_json::to_string(&ListingStatus::NotListed).unwrap();
        assert_eq!(json, "\"Not Listed\"");
    }

    #[test]
    fn test_fraud_report_risk() {
        assert_eq!(FraudReport::default().risk(), None);
        let report = FraudReport {
            fraud_score: Some(80),
            ..FraudReport::default()
        };
        assert_eq!(report.risk(), Some(RiskLevel::High));
    }

    #[tokio::test]
    async fn test_http_error_drops_url() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err: ProviderError = reqwest::get(format!("http://{}/ip/SECRETKEY/1.2.3.4", addr))
            .await
            .unwrap_err()
            .into();

        assert!(matches!(err, ProviderError::Http(_)));
        assert!(!err.to_string().contains("SECRETKEY"));
        assert!(!format!("{:?}", err).contains("SECRETKEY"));
    }

    #[test]
    fn test_provider_error_display() {
        assert_eq!(ProviderError::Timeout.to_string(), "Request timed out");
        assert_eq!(
            ProviderError::Rejected("invalid key".to_string()).to_string(),
            "Lookup rejected: invalid key"
        );
    }
}
