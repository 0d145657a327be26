pub mod admission;
pub mod cli;
pub mod config;
pub mod fingerprint;
pub mod frontier;
pub mod logging;
pub mod network;
pub mod page;
pub mod report;
pub mod state;
pub mod tokenizer;
pub mod url_utils;
pub mod worker;

// Re-export main types for library usage
pub use admission::{is_valid, Rejection};
pub use config::{Config, CrawlerConfig};
pub use fingerprint::ContentDeduplicator;
pub use frontier::{Frontier, FrontierError, FrontierStats};
pub use network::{FetchError, Fetcher, HttpClient};
pub use page::{HtmlLinkExtractor, LinkExtractor, PageOutcome, Response};
pub use report::Report;
pub use state::{CrawlerState, StateError};
pub use worker::{CrawlError, CrawlSummary, Crawler};
