use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Config, CrawlerConfig, DEFAULT_SEED_URLS};

/// Command line surface of the crawler.
/// Exit codes: 0=success, 2=invalid arguments, 3=state or I/O error, 4=crawl error
#[derive(Parser, Debug)]
#[command(name = "domain_crawler")]
#[command(about = "A polite, restartable crawler restricted to a fixed set of domains")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl from the seeds, or resume the saved frontier in the data directory.
    Crawl {
        #[arg(
            short,
            long,
            default_value = "./data",
            help = "Directory holding the frontier database and logs"
        )]
        data_dir: PathBuf,

        #[arg(long, help = "Discard any saved frontier and start from the seeds")]
        restart: bool,

        #[arg(short, long, default_value_t = Config::DEFAULT_WORKERS, help = "Worker threads")]
        workers: usize,

        #[arg(
            long,
            default_value_t = Config::POLITENESS_DELAY_MS,
            help = "Minimum delay between requests to the same host, in milliseconds"
        )]
        delay_ms: u64,

        #[arg(
            short,
            long,
            default_value = "DomainCrawler/1.0",
            help = "User agent string for requests"
        )]
        user_agent: String,

        #[arg(
            short,
            long,
            default_value_t = Config::REQUEST_TIMEOUT_SECS,
            help = "Request timeout in seconds"
        )]
        timeout: u64,

        #[arg(long = "seed", help = "Seed URL, repeatable (defaults to the allowed domains' home pages)")]
        seeds: Vec<String>,

        #[arg(long, help = "Follow links from near-duplicate pages")]
        no_near_duplicates: bool,
    },

    /// Print crawl statistics from the saved frontier without crawling.
    Report {
        #[arg(
            short,
            long,
            default_value = "./data",
            help = "Directory holding the frontier database"
        )]
        data_dir: PathBuf,

        #[arg(long, default_value_t = 50, help = "Number of most common words to list")]
        top: usize,

        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
}

impl Cli {
    /// On error, clap prints help and exits with code 2 (usage error).
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

/// Runtime settings for a `crawl` invocation.
pub fn crawler_config(
    data_dir: PathBuf,
    workers: usize,
    delay_ms: u64,
    user_agent: String,
    timeout: u64,
    seeds: Vec<String>,
    no_near_duplicates: bool,
) -> CrawlerConfig {
    let seed_urls = if seeds.is_empty() {
        DEFAULT_SEED_URLS.iter().map(|s| s.to_string()).collect()
    } else {
        seeds
    };

    CrawlerConfig {
        data_dir,
        seed_urls,
        politeness_delay: Duration::from_millis(delay_ms),
        workers: workers.max(1),
        user_agent,
        request_timeout_secs: timeout,
        near_duplicate_detection: !no_near_duplicates,
        ..CrawlerConfig::default()
    }
}
