//! DNS blocklist provider (Spamhaus ZEN and compatible zones).
//!
//! An IPv4 address `a.b.c.d` is looked up as `d.c.b.a.<zone>`; any A record
//! inside 127.0.0.0/8 means the address is listed.

use super::{DnsBlocklistLookup, ProviderError};
use crate::config::SpamhausConfig;
use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, warn};

/// Failure of a single A-record lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsLookupError {
    /// NXDOMAIN or an empty answer.
    NotFound,
    /// Any other resolution failure.
    Failed(String),
}

impl std::fmt::Display for DnsLookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DnsLookupError::NotFound => write!(f, "no such record"),
            DnsLookupError::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DnsLookupError {}

/// A-record resolver used by [`SpamhausProvider`].
#[async_trait]
pub trait DnsResolve: Send + Sync {
    async fn lookup_a(&self, name: &str) -> Result<Vec<Ipv4Addr>, DnsLookupError>;
}

/// System resolver backed by hickory.
pub struct HickoryResolver {
    resolver: TokioResolver,
}

impl HickoryResolver {
    /// Create a resolver from the system configuration (`/etc/resolv.conf`).
    pub fn from_system() -> Result<Self, ProviderError> {
        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| ProviderError::Dns(format!("failed to create resolver: {e}")))?
            .build();
        Ok(Self { resolver })
    }
}

#[async_trait]
impl DnsResolve for HickoryResolver {
    async fn lookup_a(&self, name: &str) -> Result<Vec<Ipv4Addr>, DnsLookupError> {
        match self.resolver.ipv4_lookup(name).await {
            Ok(lookup) => Ok(lookup.iter().map(|record| record.0).collect()),
            Err(e) if e.is_no_records_found() => Err(DnsLookupError::NotFound),
            Err(e) => Err(DnsLookupError::Failed(e.to_string())),
        }
    }
}

/// Build the DNSBL query name for a dotted-quad IPv4 address.
///
/// Returns `None` for anything that is not an IPv4 address.
pub fn reverse_query_name(ip: &str, zone: &str) -> Option<String> {
    let addr: Ipv4Addr = ip.trim().parse().ok()?;
    let [a, b, c, d] = addr.octets();
    Some(format!("{d}.{c}.{b}.{a}.{}", zone.trim().trim_matches('.')))
}

/// Whether any answer is a DNSBL listing code.
fn is_listing_answer(addresses: &[Ipv4Addr]) -> bool {
    addresses.iter().any(Ipv4Addr::is_loopback)
}

/// DNS blocklist provider.
pub struct SpamhausProvider {
    config: SpamhausConfig,
    resolver: Box<dyn DnsResolve>,
}

impl SpamhausProvider {
    pub fn new(config: SpamhausConfig, resolver: Box<dyn DnsResolve>) -> Self {
        Self { config, resolver }
    }

    /// Create a provider using the system resolver.
    pub fn with_system_resolver(config: SpamhausConfig) -> Result<Self, ProviderError> {
        Ok(Self::new(config, Box::new(HickoryResolver::from_system()?)))
    }
}

#[async_trait]
impl DnsBlocklistLookup for SpamhausProvider {
    async fn is_listed(&self, ip: &str) -> bool {
        let Some(query) = reverse_query_name(ip, &self.config.zone) else {
            debug!(ip = %ip, "Not an IPv4 address, skipping DNSBL lookup");
            return false;
        };

        debug!(query = %query, "Querying DNS blocklist");

        let timeout = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(timeout, self.resolver.lookup_a(&query)).await {
            Ok(Ok(addresses)) => {
                let listed = is_listing_answer(&addresses);
                debug!(query = %query, answers = ?addresses, listed, "DNSBL lookup complete");
                listed
            }
            Ok(Err(DnsLookupError::NotFound)) => {
                debug!(query = %query, "DNSBL returned NXDOMAIN");
                false
            }
            Ok(Err(e)) => {
                warn!(query = %query, error = %e, "Error checking DNS blocklist");
                false
            }
            Err(_) => {
                warn!(query = %query, timeout_ms = self.config.timeout_ms, "DNS blocklist lookup timed out");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "spamhaus"
    }
}
