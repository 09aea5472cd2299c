//! Stub lookup clients shared by unit tests.

use crate::config::{ApiKeys, PollLogConfig};
use crate::poll_log::PollLog;
use crate::poller::Providers;
use crate::providers::{
    AbuseLookup, DnsBlocklistLookup, FraudReport, FraudScoreLookup, IpDiscovery, ProviderError,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Shared call counter.
#[derive(Clone, Default)]
pub struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the stubs answer.
pub struct Scenario {
    pub keys: ApiKeys,
    pub ip: Option<&'static str>,
    pub discovery_delay: Option<Duration>,
    pub fraud_score: Option<u8>,
    pub fraud_fails: bool,
    pub confidence: u8,
    pub dns_listed: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            keys: ApiKeys::new("ipqs-key", "abuse-key"),
            ip: Some("203.0.113.5"),
            discovery_delay: None,
            fraud_score: Some(80),
            fraud_fails: false,
            confidence: 5,
            dns_listed: true,
        }
    }
}

/// Observations recorded by the stubs.
#[derive(Clone, Default)]
pub struct Probes {
    /// Calls per client: discovery, fraud score, HTTP blocklist, DNS blocklist.
    pub calls: [Calls; 4],
    pub fraud_key: Arc<Mutex<Option<String>>>,
    pub abuse_key: Arc<Mutex<Option<String>>>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl Probes {
    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(Calls::count).sum()
    }
}

struct StubDiscovery {
    ip: Option<&'static str>,
    delay: Option<Duration>,
    probes: Probes,
}

#[async_trait]
impl IpDiscovery for StubDiscovery {
    async fn current_ip(&self) -> Result<String, ProviderError> {
        self.probes.calls[0].hit();
        let now = self.probes.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probes.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.probes.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.ip
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Other("unreachable".to_string()))
    }

    fn name(&self) -> &str {
        "stub-discovery"
    }
}

struct StubFraud {
    score: Option<u8>,
    fail: bool,
    probes: Probes,
}

#[async_trait]
impl FraudScoreLookup for StubFraud {
    async fn lookup(&self, _ip: &str, api_key: &str) -> Result<FraudReport, ProviderError> {
        self.probes.calls[1].hit();
        if let Ok(mut key) = self.probes.fraud_key.lock() {
            *key = Some(api_key.to_string());
        }
        if self.fail {
            return Err(ProviderError::Rejected("bad key".to_string()));
        }
        Ok(FraudReport {
            fraud_score: self.score,
            isp: Some("Example ISP".to_string()),
            ..FraudReport::default()
        })
    }

    fn name(&self) -> &str {
        "stub-fraud"
    }
}

struct StubAbuse {
    confidence: u8,
    probes: Probes,
}

#[async_trait]
impl AbuseLookup for StubAbuse {
    async fn confidence_score(&self, _ip: &str, api_key: &str) -> Result<u8, ProviderError> {
        self.probes.calls[2].hit();
        if let Ok(mut key) = self.probes.abuse_key.lock() {
            *key = Some(api_key.to_string());
        }
        Ok(self.confidence)
    }

    fn name(&self) -> &str {
        "stub-abuse"
    }
}

struct StubDnsbl {
    listed: bool,
    probes: Probes,
}

#[async_trait]
impl DnsBlocklistLookup for StubDnsbl {
    async fn is_listed(&self, _ip: &str) -> bool {
        self.probes.calls[3].hit();
        self.listed
    }

    fn name(&self) -> &str {
        "stub-dnsbl"
    }
}

/// Build stub providers for a scenario.
pub fn stub_providers(scenario: &Scenario) -> (Providers, Probes) {
    let probes = Probes::default();
    let providers = Providers {
        ip_discovery: Box::new(StubDiscovery {
            ip: scenario.ip,
            delay: scenario.discovery_delay,
            probes: probes.clone(),
        }),
        fraud_score: Box::new(StubFraud {
            score: scenario.fraud_score,
            fail: scenario.fraud_fails,
            probes: probes.clone(),
        }),
        http_blocklist: Box::new(StubAbuse {
            confidence: scenario.confidence,
            probes: probes.clone(),
        }),
        dns_blocklist: Box::new(StubDnsbl {
            listed: scenario.dns_listed,
            probes: probes.clone(),
        }),
    };
    (providers, probes)
}

/// Poll log in a fresh temporary directory.
pub fn temp_poll_log() -> (TempDir, Arc<PollLog>) {
    let dir = TempDir::new().unwrap();
    let log = PollLog::open(&PollLogConfig {
        directory: dir.path().to_path_buf(),
        file_prefix: "ip_reputation".to_string(),
        max_files: 30,
    })
    .unwrap();
    (dir, Arc::new(log))
}
