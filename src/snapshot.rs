//! The latest poll result and the cell that publishes it.

use crate::providers::{ListingStatus, RiskLevel};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::sync::{Arc, RwLock};

/// Placeholder shown for values that have not been polled yet.
pub const NOT_AVAILABLE: &str = "N/A";

/// Result of the most recent successful poll cycle.
///
/// Immutable once built; a new cycle produces a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    #[serde(serialize_with = "or_not_available")]
    pub current_ip: Option<String>,

    #[serde(serialize_with = "or_not_available")]
    pub fraud_score: Option<u8>,

    #[serde(serialize_with = "or_not_available")]
    pub abuseipdb_status: Option<ListingStatus>,

    #[serde(serialize_with = "or_not_available")]
    pub spamhaus_listed: Option<ListingStatus>,

    /// UTC day of the refresh.
    #[serde(serialize_with = "or_not_available")]
    pub last_refresh: Option<NaiveDate>,
}

impl Snapshot {
    /// The "nothing polled yet" snapshot.
    pub fn initial() -> Self {
        Self {
            current_ip: None,
            fraud_score: None,
            abuseipdb_status: None,
            spamhaus_listed: None,
            last_refresh: None,
        }
    }

    pub fn risk(&self) -> Option<RiskLevel> {
        self.fraud_score.map(RiskLevel::from_score)
    }

    /// "High Risk", "Low Risk", or "N/A" without a score.
    pub fn risk_label(&self) -> &'static str {
        self.risk().map_or(NOT_AVAILABLE, |r| r.label())
    }

    pub fn current_ip_display(&self) -> String {
        display_or_na(&self.current_ip)
    }

    pub fn fraud_score_display(&self) -> String {
        display_or_na(&self.fraud_score)
    }

    pub fn abuseipdb_display(&self) -> String {
        display_or_na(&self.abuseipdb_status)
    }

    pub fn spamhaus_display(&self) -> String {
        display_or_na(&self.spamhaus_listed)
    }

    pub fn last_refresh_display(&self) -> String {
        self.last_refresh
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::initial()
    }
}

pub(crate) fn display_or_na<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

fn or_not_available<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(v) => v.serialize(serializer),
        None => serializer.serialize_str(NOT_AVAILABLE),
    }
}

/// Single-writer cell holding the current snapshot.
///
/// Readers get an `Arc` to a complete snapshot; the writer swaps the whole
/// `Arc`, so a reader never sees fields from two different cycles.
pub struct SnapshotCell {
    current: RwLock<Arc<Snapshot>>,
}

impl SnapshotCell {
    /// Create a cell holding [`Snapshot::initial`].
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::initial())
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Get the current snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Publish a new snapshot, returning the one it replaced.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let next = Arc::new(snapshot);
        match self.current.write() {
            Ok(mut guard) => std::mem::replace(&mut *guard, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn polled(ip: &str, score: u8) -> Snapshot {
        Snapshot {
            current_ip: Some(ip.to_string()),
            fraud_score: Some(score),
            abuseipdb_status: Some(ListingStatus::from_confidence(score)),
            spamhaus_listed: Some(ListingStatus::NotListed),
            last_refresh: NaiveDate::from_ymd_opt(2024, 5, 1),
        }
    }

    #[test]
    fn test_initial_displays_na() {
        let snapshot = Snapshot::initial();
        assert_eq!(snapshot, Snapshot::initial());
        assert_eq!(snapshot.current_ip_display(), "N/A");
        assert_eq!(snapshot.fraud_score_display(), "N/A");
        assert_eq!(snapshot.abuseipdb_display(), "N/A");
        assert_eq!(snapshot.spamhaus_display(), "N/A");
        assert_eq!(snapshot.last_refresh_display(), "N/A");
        assert_eq!(snapshot.risk_label(), "N/A");
    }

    #[test]
    fn test_initial_serializes_na() {
        let json = serde_json::to_value(Snapshot::initial()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "current_ip": "N/A",
                "fraud_score": "N/A",
                "abuseipdb_status": "N/A",
                "spamhaus_listed": "N/A",
                "last_refresh": "N/A",
            })
        );
    }

    #[test]
    fn test_polled_serialization() {
        let json = serde_json::to_value(polled("203.0.113.5", 80)).unwrap();
        assert_eq!(json["current_ip"], "203.0.113.5");
        assert_eq!(json["fraud_score"], 80);
        assert_eq!(json["abuseipdb_status"], "Listed");
        assert_eq!(json["spamhaus_listed"], "Not Listed");
        assert_eq!(json["last_refresh"], "2024-05-01");
    }

    #[test]
    fn test_risk_label() {
        assert_eq!(polled("1.2.3.4", 75).risk_label(), "Low Risk");
        assert_eq!(polled("1.2.3.4", 76).risk_label(), "High Risk");
    }

    #[test]
    fn test_cell_replace() {
        let cell = SnapshotCell::new();
        assert_eq!(*cell.current(), Snapshot::initial());

        let previous = cell.replace(polled("1.2.3.4", 10));
        assert_eq!(*previous, Snapshot::initial());
        assert_eq!(cell.current().current_ip.as_deref(), Some("1.2.3.4"));
    }

    #[test]
    fn test_reader_keeps_old_snapshot_after_replace() {
        let cell = SnapshotCell::new();
        let held = cell.current();
        cell.replace(polled("1.2.3.4", 10));
        assert_eq!(*held, Snapshot::initial());
        assert_ne!(*cell.current(), Snapshot::initial());
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let cell = Arc::new(SnapshotCell::with_snapshot(polled("10.0.0.0", 0)));

        let writer = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for i in 1..=200u8 {
                    cell.replace(polled(&format!("10.0.0.{}", i), i % 101));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..500 {
                        let snap = cell.current();
                        let ip = snap.current_ip.clone().unwrap();
                        let octet: u8 = ip.rsplit('.').next().unwrap().parse().unwrap();
                        // Every field must come from the same cycle.
                        assert_eq!(snap.fraud_score, Some(octet % 101));
                        assert_eq!(
                            snap.abuseipdb_status,
                            Some(ListingStatus::from_confidence(octet % 101))
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
