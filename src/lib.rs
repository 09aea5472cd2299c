//! IP reputation watcher.
//!
//! Periodically checks this host's public IP address against reputation
//! services and blocklists, keeps the latest result in memory, records each
//! poll to a rotating log, and serves both over a minimal HTTP surface.
//!
//! # Features
//!
//! - **IP Discovery** - Find the current public address via ipinfo.io
//! - **Fraud Score** - Query IPQualityScore and classify the risk
//! - **AbuseIPDB** - Check the address against AbuseIPDB (90-day window)
//! - **Spamhaus** - DNS blocklist lookup against `zen.spamhaus.org`
//! - **Scheduling** - Immediate poll at startup, then every 24 hours
//! - **Poll Log** - Daily-rotated history with 30 days of retention
//!
//! # Example Configuration
//!
//! ```yaml
//! schedule:
//!   interval_seconds: 86400
//!
//! ipqualityscore:
//!   api_key: "${IPQUALITYSCORE_API_KEY}"
//!
//! abuseipdb:
//!   api_key: "${ABUSEIPDB_API_KEY}"
//!
//! spamhaus:
//!   zone: "zen.spamhaus.org"
//! ```

pub mod config;
pub mod poll_log;
pub mod poller;
pub mod providers;
pub mod scheduler;
pub mod server;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use poller::{PollReport, Poller};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use server::StatusServer;
pub use snapshot::{Snapshot, SnapshotCell};
