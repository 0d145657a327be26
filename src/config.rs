// Global configuration constants - single source of truth

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub struct Config;

impl Config {
    // Admission limits
    pub const MAX_URL_LENGTH: usize = 300;
    pub const MAX_QUERY_LENGTH: usize = 100;

    // Content fingerprinting
    pub const SIMHASH_BITS: u32 = 64;
    pub const SIMHASH_THRESHOLD: u32 = 6;

    // Page processing
    pub const MAX_CONTENT_SIZE: usize = 2_000_000;
    pub const MIN_TEXT_LENGTH: usize = 200;

    // Politeness and workers
    pub const POLITENESS_DELAY_MS: u64 = 500;
    pub const DEFAULT_WORKERS: usize = 8;
    pub const REQUEST_TIMEOUT_SECS: u64 = 20;
    pub const MAX_RETRIES: u32 = 2;
    pub const RETRY_BACKOFF_MS: u64 = 500;

    // Persistence
    pub const DB_FILE_NAME: &'static str = "frontier.redb";
}

pub const DEFAULT_SEED_URLS: &[&str] = &[
    "https://www.ics.uci.edu",
    "https://www.cs.uci.edu",
    "https://www.informatics.uci.edu",
    "https://www.stat.uci.edu",
];

/// Runtime settings for one crawl process. Serialized into the startup log.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlerConfig {
    pub data_dir: PathBuf,
    pub seed_urls: Vec<String>,
    pub politeness_delay: Duration,
    pub workers: usize,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub min_text_length: usize,
    pub near_duplicate_detection: bool,
}

impl CrawlerConfig {
    /// Location of the durable frontier database.
    pub fn save_path(&self) -> PathBuf {
        self.data_dir.join(Config::DB_FILE_NAME)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            seed_urls: DEFAULT_SEED_URLS.iter().map(|s| s.to_string()).collect(),
            politeness_delay: Duration::from_millis(Config::POLITENESS_DELAY_MS),
            workers: Config::DEFAULT_WORKERS,
            user_agent: "DomainCrawler/1.0".to_string(),
            request_timeout_secs: Config::REQUEST_TIMEOUT_SECS,
            min_text_length: Config::MIN_TEXT_LENGTH,
            near_duplicate_detection: true,
        }
    }
}
