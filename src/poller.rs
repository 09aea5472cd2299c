//! The poll cycle: discover, look up, publish, record.

use crate::config::{ApiKeys, Config};
use crate::poll_log::PollLog;
use crate::providers::abuseipdb::AbuseIPDBProvider;
use crate::providers::ipinfo::IpInfoProvider;
use crate::providers::ipqualityscore::IpQualityScoreProvider;
use crate::providers::spamhaus::SpamhausProvider;
use crate::providers::{
    AbuseLookup, DnsBlocklistLookup, FraudReport, FraudScoreLookup, IpDiscovery, ListingStatus,
    ProviderError,
};
use crate::snapshot::{display_or_na, Snapshot, SnapshotCell};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Which lookup a cycle failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStage {
    IpDiscovery,
    FraudScore,
    HttpBlocklist,
}

impl fmt::Display for PollStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollStage::IpDiscovery => write!(f, "IP discovery"),
            PollStage::FraudScore => write!(f, "fraud score lookup"),
            PollStage::HttpBlocklist => write!(f, "AbuseIPDB lookup"),
        }
    }
}

/// Why a poll cycle did not produce a snapshot.
#[derive(Debug)]
pub enum PollError {
    /// One or both API keys are not configured. Holds the env var names.
    MissingApiKeys(Vec<&'static str>),
    /// A lookup failed; the previous snapshot stays published.
    Provider {
        stage: PollStage,
        source: ProviderError,
    },
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollError::MissingApiKeys(missing) => {
                write!(f, "API keys not found: {}", missing.join(", "))
            }
            PollError::Provider { stage, source } => write!(f, "{} failed: {}", stage, source),
        }
    }
}

impl PollError {
    /// One-line message for the `--once` report.
    pub fn summary(&self) -> String {
        match self {
            PollError::MissingApiKeys(missing) => format!(
                "Error: API keys not found. Please set the {} environment variable{}.",
                missing.join(" and "),
                if missing.len() == 1 { "" } else { "s" }
            ),
            PollError::Provider {
                stage: PollStage::FraudScore,
                source: ProviderError::Rejected(message),
            } => format!("Error checking IP reputation: {}", message),
            other => format!("Error: {}", other),
        }
    }
}

impl std::error::Error for PollError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::MissingApiKeys(_) => None,
            PollError::Provider { source, .. } => Some(source),
        }
    }
}

/// Outcome of a successful cycle: the published snapshot plus the
/// fraud-score details that are not part of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub snapshot: Snapshot,
    pub fraud: FraudReport,
}

impl fmt::Display for PollReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = &self.snapshot;
        let ip = snapshot.current_ip_display();
        let fraud = &self.fraud;

        writeln!(f, "Current IP: {}", ip)?;
        writeln!(f, "Reputation Status for IP {}:", ip)?;
        writeln!(f, "Fraud Score: {}", snapshot.fraud_score_display())?;
        writeln!(f, "ISP: {}", display_or_na(&fraud.isp))?;
        writeln!(f, "Organization: {}", display_or_na(&fraud.organization))?;
        writeln!(f, "Country: {}", display_or_na(&fraud.country_code))?;
        writeln!(f, "Region: {}", display_or_na(&fraud.region))?;
        writeln!(f, "City: {}", display_or_na(&fraud.city))?;
        writeln!(f, "Usage Type: {}", display_or_na(&fraud.usage_type))?;
        writeln!(f, "Risk Status: {}", snapshot.risk_label())?;
        writeln!(f, "AbuseIPDB Status: {}", snapshot.abuseipdb_display())?;
        writeln!(f, "Spamhaus Status: {}", snapshot.spamhaus_display())?;
        writeln!(f, "Last Refresh: {}", snapshot.last_refresh_display())
    }
}

/// The four lookup clients a cycle uses.
pub struct Providers {
    pub ip_discovery: Box<dyn IpDiscovery>,
    pub fraud_score: Box<dyn FraudScoreLookup>,
    pub http_blocklist: Box<dyn AbuseLookup>,
    pub dns_blocklist: Box<dyn DnsBlocklistLookup>,
}

impl Providers {
    /// Build the production clients.
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        Ok(Self {
            ip_discovery: Box::new(IpInfoProvider::new(config.ip_discovery.clone())?),
            fraud_score: Box::new(IpQualityScoreProvider::new(config.ipqualityscore.clone())?),
            http_blocklist: Box::new(AbuseIPDBProvider::new(config.abuseipdb.clone())?),
            dns_blocklist: Box::new(SpamhausProvider::with_system_resolver(
                config.spamhaus.clone(),
            )?),
        })
    }
}

/// Runs poll cycles and publishes their results.
pub struct Poller {
    api_keys: ApiKeys,
    providers: Providers,
    state: Arc<SnapshotCell>,
    log: Arc<PollLog>,
}

impl Poller {
    pub fn new(
        api_keys: ApiKeys,
        providers: Providers,
        state: Arc<SnapshotCell>,
        log: Arc<PollLog>,
    ) -> Self {
        Self {
            api_keys,
            providers,
            state,
            log,
        }
    }

    /// Run one cycle.
    ///
    /// On success the new snapshot is already published and recorded. On
    /// error nothing is published.
    pub async fn poll(&self) -> Result<PollReport, PollError> {
        let Some((ipqs_key, abuseipdb_key)) = self.api_keys.both() else {
            return Err(PollError::MissingApiKeys(self.api_keys.missing()));
        };

        let discovery = &self.providers.ip_discovery;
        let current_ip = discovery
            .current_ip()
            .await
            .map_err(|source| PollError::Provider {
                stage: PollStage::IpDiscovery,
                source,
            })?;
        debug!(provider = discovery.name(), ip = %current_ip, "Current IP");

        let report = self
            .providers
            .fraud_score
            .lookup(&current_ip, ipqs_key)
            .await
            .map_err(|source| PollError::Provider {
                stage: PollStage::FraudScore,
                source,
            })?;

        let confidence = self
            .providers
            .http_blocklist
            .confidence_score(&current_ip, abuseipdb_key)
            .await
            .map_err(|source| PollError::Provider {
                stage: PollStage::HttpBlocklist,
                source,
            })?;

        let dns_listed = self.providers.dns_blocklist.is_listed(&current_ip).await;

        let now = Utc::now();
        let snapshot = Snapshot {
            current_ip: Some(current_ip),
            fraud_score: report.fraud_score,
            abuseipdb_status: Some(ListingStatus::from_confidence(confidence)),
            spamhaus_listed: Some(ListingStatus::from_listed(dns_listed)),
            last_refresh: Some(now.date_naive()),
        };

        self.state.replace(snapshot.clone());

        info!(
            ip = %snapshot.current_ip_display(),
            fraud_score = %snapshot.fraud_score_display(),
            risk = snapshot.risk_label(),
            abuseipdb = %snapshot.abuseipdb_display(),
            abuse_confidence = confidence,
            spamhaus = %snapshot.spamhaus_display(),
            isp = ?report.isp,
            organization = ?report.organization,
            country = ?report.country_code,
            region = ?report.region,
            city = ?report.city,
            usage_type = ?report.usage_type,
            "Poll cycle complete"
        );

        if let Err(e) = self.log.record(now, &snapshot) {
            warn!(
                directory = %self.log.directory().display(),
                error = %e,
                "Failed to append to poll log"
            );
        }

        Ok(PollReport {
            snapshot,
            fraud: report,
        })
    }

    /// Run one cycle and log its outcome. Returns whether it succeeded.
    pub async fn run_cycle(&self) -> bool {
        match self.poll().await {
            Ok(_) => true,
            Err(e @ PollError::MissingApiKeys(_)) => {
                error!(
                    error = %e,
                    "Please set the IPQUALITYSCORE_API_KEY and ABUSEIPDB_API_KEY environment variables"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "Poll cycle failed, keeping last snapshot");
                false
            }
        }
    }
}
