use domain_crawler::cli::{self, Cli, Commands};
use domain_crawler::config::{Config, CrawlerConfig};
use domain_crawler::fingerprint::ContentDeduplicator;
use domain_crawler::frontier::{Frontier, FrontierError};
use domain_crawler::logging::{self, LoggingError};
use domain_crawler::network::{FetchError, HttpClient};
use domain_crawler::page::HtmlLinkExtractor;
use domain_crawler::report::Report;
use domain_crawler::state::{CrawlerState, StateError};
use domain_crawler::worker::{CrawlError, Crawler};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

const REPORT_TOP_WORDS: usize = 50;

#[derive(Error, Debug)]
pub enum MainError {
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Frontier error: {0}")]
    Frontier(#[from] FrontierError),

    #[error("No saved frontier at {}", .0.display())]
    MissingState(PathBuf),

    #[error("Report error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Crawler error: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Crawler task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl MainError {
    fn exit_code(&self) -> i32 {
        match self {
            MainError::Fetch(_) | MainError::Crawl(_) | MainError::Join(_) => 4,
            _ => 3,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), MainError> {
    match cli.command {
        Commands::Crawl {
            data_dir,
            restart,
            workers,
            delay_ms,
            user_agent,
            timeout,
            seeds,
            no_near_duplicates,
        } => {
            let config = cli::crawler_config(
                data_dir,
                workers,
                delay_ms,
                user_agent,
                timeout,
                seeds,
                no_near_duplicates,
            );
            run_crawl(config, restart).await
        }

        Commands::Report {
            data_dir,
            top,
            json,
        } => run_report(data_dir, top, json),
    }
}

async fn run_crawl(config: CrawlerConfig, restart: bool) -> Result<(), MainError> {
    std::fs::create_dir_all(&config.data_dir)?;
    let _log_guards = logging::init_logging_in_data_dir(&config.data_dir)?;
    tracing::info!(config = %serde_json::to_string(&config)?, "Effective crawl configuration");

    println!(
        "Crawling {} seed(s) with {} workers, {}ms per-host delay, data: {}",
        config.seed_urls.len(),
        config.workers,
        config.politeness_delay.as_millis(),
        config.data_dir.display()
    );

    let frontier = Frontier::initialize(&config, restart)?;
    let fetcher = HttpClient::from_config(&config, tokio::runtime::Handle::current())?;
    let crawler = Arc::new(Crawler::new(
        frontier,
        Box::new(fetcher),
        Box::new(HtmlLinkExtractor),
        ContentDeduplicator::new(),
        config,
    ));

    let c = crawler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nReceived Ctrl+C, finishing in-flight pages...");
            tracing::info!("Shutdown requested");
            c.stop();
        }
    });

    let worker_crawler = crawler.clone();
    let summary = tokio::task::spawn_blocking(move || worker_crawler.run()).await??;
    println!("{}", summary);

    let report = crawler.frontier().report(REPORT_TOP_WORDS)?;
    println!("{}", report);
    Ok(())
}

fn run_report(data_dir: PathBuf, top: usize, json: bool) -> Result<(), MainError> {
    let path = data_dir.join(Config::DB_FILE_NAME);
    if !path.exists() {
        return Err(MainError::MissingState(path));
    }

    let state = CrawlerState::open(&path)?;
    let report = Report::from_state(&state, top)?;
    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
