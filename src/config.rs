//! Configuration types for the IP reputation watcher.

use crate::scheduler::MAX_INTERVAL;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the IPQualityScore API key.
pub const IPQUALITYSCORE_KEY_ENV: &str = "IPQUALITYSCORE_API_KEY";
/// Environment variable holding the AbuseIPDB API key.
pub const ABUSEIPDB_KEY_ENV: &str = "ABUSEIPDB_API_KEY";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// HTTP status surface.
    #[serde(default)]
    pub server: ServerSettings,

    /// Poll scheduling.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Rotating poll log.
    #[serde(default)]
    pub poll_log: PollLogConfig,

    /// Public IP discovery endpoint.
    #[serde(default)]
    pub ip_discovery: IpDiscoveryConfig,

    /// IPQualityScore fraud-score lookups.
    #[serde(default)]
    pub ipqualityscore: IpQualityScoreConfig,

    /// AbuseIPDB blocklist lookups.
    #[serde(default)]
    pub abuseipdb: AbuseIPDBConfig,

    /// Spamhaus DNS blocklist lookups.
    #[serde(default)]
    pub spamhaus: SpamhausConfig,
}

/// HTTP status surface settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSettings {
    /// Address to bind.
    #[serde(default = "default_listen_address")]
    pub listen_address: IpAddr,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Text color for the status page.
    #[serde(default = "default_text_color")]
    pub text_color: String,

    /// Background color for the status page.
    #[serde(default = "default_background_color")]
    pub background_color: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            port: default_port(),
            text_color: default_text_color(),
            background_color: default_background_color(),
        }
    }
}

fn default_listen_address() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    5000
}

fn default_text_color() -> String {
    "#000000".to_string()
}

fn default_background_color() -> String {
    "#FFFFFF".to_string()
}

/// Poll scheduling.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Seconds between poll cycles.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

fn default_interval() -> u64 {
    24 * 60 * 60
}

/// Rotating poll log settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollLogConfig {
    /// Directory holding the log files.
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,

    /// File name prefix; files are named `<prefix>.<date>.log`.
    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,

    /// Number of daily files to keep.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for PollLogConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            file_prefix: default_log_prefix(),
            max_files: default_max_files(),
        }
    }
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_prefix() -> String {
    "ip_reputation".to_string()
}

fn default_max_files() -> usize {
    30
}

/// Public IP discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IpDiscoveryConfig {
    /// JSON endpoint returning an `ip` field.
    #[serde(default = "default_ip_discovery_url")]
    pub url: String,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for IpDiscoveryConfig {
    fn default() -> Self {
        Self {
            url: default_ip_discovery_url(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_ip_discovery_url() -> String {
    "https://ipinfo.io/json".to_string()
}

/// IPQualityScore settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IpQualityScoreConfig {
    /// API key (supports ${ENV_VAR} syntax). Empty means unset.
    #[serde(default)]
    pub api_key: String,

    /// API base URL; the key and IP are appended as path segments.
    #[serde(default = "default_ipqs_base_url")]
    pub base_url: String,

    /// API request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for IpQualityScoreConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_ipqs_base_url(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_ipqs_base_url() -> String {
    "https://ipqualityscore.com/api/json/ip".to_string()
}

/// AbuseIPDB settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AbuseIPDBConfig {
    /// API key (supports ${ENV_VAR} syntax). Empty means unset.
    #[serde(default)]
    pub api_key: String,

    /// Check endpoint.
    #[serde(default = "default_abuseipdb_url")]
    pub url: String,

    /// API request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for AbuseIPDBConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: default_abuseipdb_url(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_abuseipdb_url() -> String {
    "https://api.abuseipdb.com/api/v2/check".to_string()
}

/// Spamhaus DNSBL settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpamhausConfig {
    /// Blocklist zone appended to the reversed address.
    #[serde(default = "default_zone")]
    pub zone: String,

    /// Lookup timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

impl Default for SpamhausConfig {
    fn default() -> Self {
        Self {
            zone: default_zone(),
            timeout_ms: default_timeout(),
        }
    }
}

fn default_zone() -> String {
    "zen.spamhaus.org".to_string()
}

fn default_timeout() -> u64 {
    15_000
}

/// API keys required by a poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    pub ipqualityscore: Option<String>,
    pub abuseipdb: Option<String>,
}

impl ApiKeys {
    pub fn new(ipqualityscore: &str, abuseipdb: &str) -> Self {
        Self {
            ipqualityscore: non_empty(ipqualityscore),
            abuseipdb: non_empty(abuseipdb),
        }
    }

    /// Both keys, or `None` if either is missing.
    pub fn both(&self) -> Option<(&str, &str)> {
        match (&self.ipqualityscore, &self.abuseipdb) {
            (Some(ipqs), Some(abuse)) => Some((ipqs.as_str(), abuse.as_str())),
            _ => None,
        }
    }

    /// Environment variable names of the keys that are missing.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.ipqualityscore.is_none() {
            missing.push(IPQUALITYSCORE_KEY_ENV);
        }
        if self.abuseipdb.is_none() {
            missing.push(ABUSEIPDB_KEY_ENV);
        }
        missing
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let expanded = expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from defaults and well-known environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Config::default();

        if let Ok(key) = std::env::var(IPQUALITYSCORE_KEY_ENV) {
            config.ipqualityscore.api_key = key;
        }
        if let Ok(key) = std::env::var(ABUSEIPDB_KEY_ENV) {
            config.abuseipdb.api_key = key;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid PORT '{}': {}", port, e))?;
        }
        if let Ok(color) = std::env::var("TEXT_COLOR") {
            config.server.text_color = color;
        }
        if let Ok(color) = std::env::var("BACKGROUND_COLOR") {
            config.server.background_color = color;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    ///
    /// Missing API keys are not an error here: the poll cycle reports them
    /// on every run so the status surface stays up.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.schedule.interval_seconds == 0 {
            anyhow::bail!("schedule.interval_seconds must be greater than 0");
        }

        if self.schedule.interval() > MAX_INTERVAL {
            anyhow::bail!(
                "schedule.interval_seconds must be at most {}",
                MAX_INTERVAL.as_secs()
            );
        }

        if self.poll_log.max_files == 0 {
            anyhow::bail!("poll_log.max_files must be greater than 0");
        }

        if self.poll_log.file_prefix.trim().is_empty() {
            anyhow::bail!("poll_log.file_prefix must not be empty");
        }

        if self.spamhaus.zone.trim().trim_matches('.').is_empty() {
            anyhow::bail!("spamhaus.zone must not be empty");
        }

        for (name, url) in [
            ("ip_discovery.url", &self.ip_discovery.url),
            ("ipqualityscore.base_url", &self.ipqualityscore.base_url),
            ("abuseipdb.url", &self.abuseipdb.url),
        ] {
            if let Err(e) = reqwest::Url::parse(url) {
                anyhow::bail!("Invalid {} '{}': {}", name, url, e);
            }
        }

        Ok(())
    }

    /// API keys as configured.
    pub fn api_keys(&self) -> ApiKeys {
        ApiKeys::new(&self.ipqualityscore.api_key, &self.abuseipdb.api_key)
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r##"# IP Reputation Watch Configuration

server:
  listen_address: "0.0.0.0"
  port: 5000
  text_color: "#000000"
  background_color: "#FFFFFF"

schedule:
  interval_seconds: 86400      # Poll once a day

poll_log:
  directory: "logs"
  file_prefix: "ip_reputation" # logs/ip_reputation.YYYY-MM-DD.log
  max_files: 30                # Keep 30 days of history

ip_discovery:
  url: "https://ipinfo.io/json"
  timeout_ms: 15000

ipqualityscore:
  api_key: "${IPQUALITYSCORE_API_KEY}"  # Use environment variable
  base_url: "https://ipqualityscore.com/api/json/ip"
  timeout_ms: 15000

abuseipdb:
  api_key: "${ABUSEIPDB_API_KEY}"       # Use environment variable
  url: "https://api.abuseipdb.com/api/v2/check"
  timeout_ms: 15000

spamhaus:
  zone: "zen.spamhaus.org"
  timeout_ms: 15000
"##
        .to_string()
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    let re = match regex::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return content.to_string(),
    };

    re.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .into_owned()
}
