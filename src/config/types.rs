use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Forum-Tracker
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub reply: ReplyConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
}

/// The discussion board being watched
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Root URL of the board, also the keep-alive target
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Polling behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Seconds between scheduled poll cycles
    #[serde(rename = "poll-interval-secs", default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Maximum number of resources checked in parallel within one cycle
    #[serde(rename = "max-concurrent-checks", default = "default_max_concurrent")]
    pub max_concurrent_checks: u32,

    /// How many of the newest forum topics are considered per check
    #[serde(rename = "forum-topic-window", default = "default_topic_window")]
    pub forum_topic_window: usize,

    /// Seconds between keep-alive fetches of the site root
    #[serde(rename = "keepalive-interval-secs", default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,

    #[serde(rename = "keepalive-enabled", default = "default_true")]
    pub keepalive_enabled: bool,
}

/// HTTP timeouts
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Timeout for one GET attempt with one credential set
    #[serde(rename = "attempt-timeout-secs", default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,

    /// Hard ceiling for a whole fetch across all credential sets
    #[serde(rename = "fetch-ceiling-secs", default = "default_fetch_ceiling")]
    pub fetch_ceiling_secs: u64,

    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

/// Reply submission and verification
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyConfig {
    /// Number of re-fetches used to confirm a submitted reply is visible
    #[serde(rename = "verify-attempts", default = "default_verify_attempts")]
    pub verify_attempts: u32,

    /// Delay before each verification re-fetch (milliseconds)
    #[serde(rename = "verify-delay-ms", default = "default_verify_delay")]
    pub verify_delay_ms: u64,

    /// Number of leading words of the message used as the verification snippet
    #[serde(rename = "snippet-words", default = "default_snippet_words")]
    pub snippet_words: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// One credential set: a label and the cookie tokens that identify a session
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialEntry {
    pub label: String,

    /// Cookie name to value, e.g. `xf_user`, `xf_session`, `xf_tfa_trust`
    pub tokens: BTreeMap<String, String>,
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

impl HttpConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn fetch_ceiling(&self) -> Duration {
        Duration::from_secs(self.fetch_ceiling_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl ReplyConfig {
    pub fn verify_delay(&self) -> Duration {
        Duration::from_millis(self.verify_delay_ms)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_concurrent_checks: default_max_concurrent(),
            forum_topic_window: default_topic_window(),
            keepalive_interval_secs: default_keepalive_interval(),
            keepalive_enabled: true,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: default_attempt_timeout(),
            fetch_ceiling_secs: default_fetch_ceiling(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            verify_attempts: default_verify_attempts(),
            verify_delay_ms: default_verify_delay(),
            snippet_words: default_snippet_words(),
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; ForumTracker/1.0)".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_max_concurrent() -> u32 {
    8
}

fn default_topic_window() -> usize {
    8
}

fn default_keepalive_interval() -> u64 {
    600
}

fn default_attempt_timeout() -> u64 {
    20
}

fn default_fetch_ceiling() -> u64 {
    45
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_verify_attempts() -> u32 {
    3
}

fn default_verify_delay() -> u64 {
    2000
}

fn default_snippet_words() -> usize {
    4
}

fn default_true() -> bool {
    true
}
