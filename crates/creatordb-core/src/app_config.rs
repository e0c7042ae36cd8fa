use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Knobs for the harvesting subsystem. Loadable without a database URL so
/// dry runs work on a bare machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvesterSettings {
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Hard cap on page fetches per harvest, including the first page.
    pub max_pages: usize,
    /// Hard cap on items returned per harvest.
    pub max_items: usize,
    /// Pause after every successful page fetch.
    pub page_delay_ms: u64,
    /// Wall-clock budget for one whole harvest.
    pub deadline_secs: u64,
    pub max_depth: usize,
    pub max_concurrent_accounts: usize,
    pub safe_merge_enabled: bool,
    /// A fresh counter at or below this never replaces a stored one above it.
    pub safe_merge_threshold: u64,
    /// Where re-hosted avatars go. `None` disables re-hosting.
    pub media_dir: Option<PathBuf>,
    pub media_base_url: String,
    pub instagram_base_url: String,
    pub tiktok_base_url: String,
    pub youtube_base_url: String,
}

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

impl Default for HarvesterSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 20,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_pages: 5,
            max_items: 500,
            page_delay_ms: 400,
            deadline_secs: 120,
            max_depth: 24,
            max_concurrent_accounts: 2,
            safe_merge_enabled: true,
            safe_merge_threshold: 0,
            media_dir: None,
            media_base_url: "/media".to_string(),
            instagram_base_url: "https://www.instagram.com".to_string(),
            tiktok_base_url: "https://www.tiktok.com".to_string(),
            youtube_base_url: "https://www.youtube.com".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub accounts_path: PathBuf,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub harvester: HarvesterSettings,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("accounts_path", &self.accounts_path)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("harvester", &self.harvester)
            .finish()
    }
}
