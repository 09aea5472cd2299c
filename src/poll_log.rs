//! Append-only poll history, rotated daily.
//!
//! Files are named `<prefix>.<YYYY-MM-DD>.log` and rotate at UTC midnight;
//! the appender prunes anything beyond `max_files`.

use crate::config::PollLogConfig;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

const FILE_SUFFIX: &str = "log";

/// Format one history line for a completed cycle.
pub fn format_entry(at: DateTime<Utc>, snapshot: &Snapshot) -> String {
    format!(
        "{} - Current IP: {}, Fraud Score: {}, AbuseIPDB Status: {}, Spamhaus Status: {}",
        at.format("%Y-%m-%d %H:%M:%S"),
        snapshot.current_ip_display(),
        snapshot.fraud_score_display(),
        snapshot.abuseipdb_display(),
        snapshot.spamhaus_display(),
    )
}

/// Rotating poll history file.
pub struct PollLog {
    writer: Mutex<RollingFileAppender>,
    directory: PathBuf,
    prefix: String,
}

impl PollLog {
    /// Open (creating the directory if needed) the poll log.
    pub fn open(config: &PollLogConfig) -> io::Result<Self> {
        std::fs::create_dir_all(&config.directory)?;

        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(&config.file_prefix)
            .filename_suffix(FILE_SUFFIX)
            .max_log_files(config.max_files)
            .build(&config.directory)
            .map_err(io::Error::other)?;

        debug!(
            directory = %config.directory.display(),
            prefix = %config.file_prefix,
            max_files = config.max_files,
            "Poll log opened"
        );

        Ok(Self {
            writer: Mutex::new(appender),
            directory: config.directory.clone(),
            prefix: config.file_prefix.clone(),
        })
    }

    /// Append a single line and flush it.
    pub fn append(&self, line: &str) -> io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::other("poll log writer poisoned"))?;
        writeln!(writer, "{}", line.trim_end())?;
        writer.flush()
    }

    /// Append the history line for a completed cycle.
    pub fn record(&self, at: DateTime<Utc>, snapshot: &Snapshot) -> io::Result<()> {
        self.append(&format_entry(at, snapshot))
    }

    /// Full retained history, oldest file first.
    pub fn read_all(&self) -> io::Result<String> {
        let mut content = String::new();
        for path in self.log_files()? {
            content.push_str(&std::fs::read_to_string(&path)?);
        }
        Ok(content)
    }

    /// Retained log files in chronological order.
    pub fn log_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.directory)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && self.is_log_file(path))
            .collect();
        files.sort();
        Ok(files)
    }

    fn is_log_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| {
                name.starts_with(&format!("{}.", self.prefix))
                    && name.ends_with(&format!(".{}", FILE_SUFFIX))
            })
            .unwrap_or(false)
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ListingStatus;
    use chrono::{NaiveDate, TimeZone};
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> PollLogConfig {
        PollLogConfig {
            directory: dir.path().join("logs"),
            file_prefix: "ip_reputation".to_string(),
            max_files: 30,
        }
    }

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            current_ip: Some("203.0.113.5".to_string()),
            fraud_score: Some(80),
            abuseipdb_status: Some(ListingStatus::Listed),
            spamhaus_listed: Some(ListingStatus::NotListed),
            last_refresh: NaiveDate::from_ymd_opt(2024, 5, 1),
        }
    }

    #[test]
    fn test_format_entry() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(
            format_entry(at, &sample_snapshot()),
            "2024-05-01 12:30:00 - Current IP: 203.0.113.5, Fraud Score: 80, \
             AbuseIPDB Status: Listed, Spamhaus Status: Not Listed"
        );
    }

    #[test]
    fn test_format_entry_missing_score() {
        let mut snapshot = sample_snapshot();
        snapshot.fraud_score = None;
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert!(format_entry(at, &snapshot).contains("Fraud Score: N/A,"));
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let log = PollLog::open(&config).unwrap();
        assert!(config.directory.is_dir());
        assert_eq!(log.directory(), config.directory.as_path());
        assert_eq!(log.read_all().unwrap(), "");
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let log = PollLog::open(&config_in(&dir)).unwrap();

        log.append("first line").unwrap();
        log.record(Utc::now(), &sample_snapshot()).unwrap();

        let content = log.read_all().unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "first line");
        assert!(lines[1].ends_with("Spamhaus Status: Not Listed"));

        let files = log.log_files().unwrap();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("ip_reputation."));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn test_read_all_orders_files_and_ignores_others() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        std::fs::create_dir_all(&config.directory).unwrap();
        std::fs::write(
            config.directory.join("ip_reputation.2020-01-02.log"),
            "second day\n",
        )
        .unwrap();
        std::fs::write(
            config.directory.join("ip_reputation.2020-01-01.log"),
            "first day\n",
        )
        .unwrap();
        std::fs::write(config.directory.join("unrelated.txt"), "noise\n").unwrap();

        let log = PollLog::open(&config).unwrap();
        let content = log.read_all().unwrap();
        assert!(content.starts_with("first day\nsecond day\n"));
        assert!(!content.contains("noise"));
    }
}
