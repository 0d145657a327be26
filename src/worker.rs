use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::CrawlerConfig;
use crate::fingerprint::ContentDeduplicator;
use crate::frontier::{Frontier, FrontierError, FrontierStats};
use crate::network::Fetcher;
use crate::page::{self, LinkExtractor};

const PROGRESS_INTERVAL: u64 = 100;
const IDLE_WAIT: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Frontier error: {0}")]
    Frontier(#[from] FrontierError),

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub processed: u64,
    pub failed_fetches: u64,
    pub duration: Duration,
    /// True if the crawl ended because of `Crawler::stop` rather than an empty frontier
    pub interrupted: bool,
    pub stats: FrontierStats,
}

impl std::fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Processed {} urls ({} failed fetches) in {:.1}s | {}",
            self.processed,
            self.failed_fetches,
            self.duration.as_secs_f64(),
            self.stats
        )
    }
}

/// Blocking worker pool driving the frontier until it drains or is stopped.
pub struct Crawler {
    frontier: Frontier,
    fetcher: Box<dyn Fetcher>,
    extractor: Box<dyn LinkExtractor>,
    dedup: ContentDeduplicator,
    config: CrawlerConfig,
    stopped: AtomicBool,
}

/// Shared between the workers of one `run`.
struct RunState {
    /// Workers currently holding or looking for a URL
    active: AtomicUsize,
    processed: AtomicU64,
    failed_fetches: AtomicU64,
    first_error: Mutex<Option<CrawlError>>,
}

impl Crawler {
    pub fn new(
        frontier: Frontier,
        fetcher: Box<dyn Fetcher>,
        extractor: Box<dyn LinkExtractor>,
        dedup: ContentDeduplicator,
        config: CrawlerConfig,
    ) -> Self {
        Self {
            frontier,
            fetcher,
            extractor,
            dedup,
            config,
            stopped: AtomicBool::new(false),
        }
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    /// Ask every worker to exit after its current URL.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Run `config.workers` threads until the frontier is drained, `stop` is called, or
    /// a durable write fails. The first such failure is returned.
    pub fn run(&self) -> Result<CrawlSummary, CrawlError> {
        let started = Instant::now();
        let run = RunState {
            active: AtomicUsize::new(0),
            processed: AtomicU64::new(0),
            failed_fetches: AtomicU64::new(0),
            first_error: Mutex::new(None),
        };
        let workers = self.config.workers.max(1);

        tracing::info!(
            "Starting crawl with {} workers, {} urls queued",
            workers,
            self.frontier.pending()
        );

        std::thread::scope(|s| {
            for id in 0..workers {
                let run = &run;
                let spawned = std::thread::Builder::new()
                    .name(format!("crawler-worker-{}", id))
                    .spawn_scoped(s, move || self.worker_loop(run));
                if let Err(e) = spawned {
                    self.stop();
                    return Err(CrawlError::Spawn(e));
                }
            }
            Ok(())
        })?;

        if let Some(e) = run.first_error.into_inner() {
            return Err(e);
        }

        let summary = CrawlSummary {
            processed: run.processed.load(Ordering::SeqCst),
            failed_fetches: run.failed_fetches.load(Ordering::SeqCst),
            duration: started.elapsed(),
            interrupted: self.is_stopped(),
            stats: self.frontier.stats()?,
        };
        tracing::info!("Crawl finished: {}", summary);
        Ok(summary)
    }

    fn worker_loop(&self, run: &RunState) {
        while !self.is_stopped() {
            // Counted as active before popping, so an idle peer never sees an empty
            // queue and zero active workers while a URL is still in hand.
            run.active.fetch_add(1, Ordering::SeqCst);
            let url = match self.frontier.get_next_url() {
                Some(url) => url,
                None => {
                    let was_last = run.active.fetch_sub(1, Ordering::SeqCst) == 1;
                    if was_last && self.frontier.is_empty() {
                        tracing::info!("Frontier is empty, stopping worker");
                        break;
                    }
                    std::thread::sleep(IDLE_WAIT);
                    continue;
                }
            };

            let result = self.process_url(&url, run);
            run.active.fetch_sub(1, Ordering::SeqCst);

            if let Err(e) = result {
                tracing::error!(url = %url, error = %e, "Durable store failure, stopping crawl");
                run.first_error.lock().get_or_insert(e);
                self.stop();
                break;
            }

            let processed = run.processed.fetch_add(1, Ordering::SeqCst) + 1;
            if processed % PROGRESS_INTERVAL == 0 {
                match self.frontier.stats() {
                    Ok(stats) => tracing::info!("Progress: {} processed | {}", processed, stats),
                    Err(e) => tracing::warn!(error = %e, "Could not read frontier stats"),
                }
            }
        }
    }

    fn process_url(&self, url: &str, run: &RunState) -> Result<(), CrawlError> {
        self.frontier.wait_for_politeness(url);

        let response = match self.fetcher.fetch(url) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, error = %e, "Fetch failed");
                run.failed_fetches.fetch_add(1, Ordering::SeqCst);
                self.frontier.mark_url_complete(url, 0)?;
                return Ok(());
            }
        };

        tracing::debug!(url, status = response.status, "Downloaded");
        let outcome = page::scrape(
            url,
            &response,
            self.extractor.as_ref(),
            &self.dedup,
            &self.config,
        );

        for link in &outcome.links {
            self.frontier.add_url(link)?;
        }
        self.frontier.mark_url_complete(url, outcome.words.len())?;
        self.frontier.log_word_frequency(&outcome.words)?;
        self.frontier.log_domain_count(url)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::FetchError;
    use crate::page::{HtmlLinkExtractor, Response};
    use std::collections::HashMap;
    use tempfile::TempDir;

    const ROOT_TEXT: &str = "The school of information and computer sciences hosts research \
        groups in algorithms, compilers, operating systems, databases and distributed computing. \
        Faculty publish widely and supervise doctoral students in every research group.";
    const A_TEXT: &str = "Admissions office: applicants submit transcripts, recommendation \
        letters and personal statements before the december deadline. Financial aid packages \
        include fellowships, teaching assistantships and tuition waivers for eligible students.";
    const B_TEXT: &str = "Campus map and parking: visitors purchase daily permits at kiosks \
        near the main entrance. Shuttle buses connect residential halls, libraries, the \
        engineering quad and the student center every fifteen minutes during weekdays.";

    struct MapFetcher {
        pages: HashMap<String, Response>,
        calls: AtomicUsize,
    }

    impl MapFetcher {
        fn new(pages: &[(&str, String)]) -> Self {
            let pages = pages
                .iter()
                .map(|(url, body)| {
                    (
                        url.to_string(),
                        Response {
                            status: 200,
                            url: url.to_string(),
                            content: Some(body.clone().into_bytes()),
                            content_type: Some("text/html".to_string()),
                        },
                    )
                })
                .collect();
            Self {
                pages,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Fetcher for MapFetcher {
        fn fetch(&self, url: &str) -> Result<Response, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::NetworkError(format!("no route to {}", url)))
        }
    }

    fn site() -> MapFetcher {
        MapFetcher::new(&[
            (
                "https://www.ics.uci.edu/",
                format!(
                    "<html><body><p>{}</p><a href=\"/a\">A</a><a href=\"/b/\">B</a>\
                     <a href=\"/missing\">Gone</a><a href=\"https://google.com/\">G</a>\
                     </body></html>",
                    ROOT_TEXT
                ),
            ),
            (
                "https://www.ics.uci.edu/a",
                format!(
                    "<html><body><p>{}</p><a href=\"/b\">B</a><a href=\"/\">Home</a>\
                     </body></html>",
                    A_TEXT
                ),
            ),
            (
                "https://www.ics.uci.edu/b",
                format!("<html><body><p>{}</p></body></html>", B_TEXT),
            ),
        ])
    }

    fn test_config(dir: &TempDir) -> CrawlerConfig {
        CrawlerConfig {
            data_dir: dir.path().to_path_buf(),
            seed_urls: vec!["https://www.ics.uci.edu".to_string()],
            politeness_delay: Duration::from_millis(1),
            workers: 3,
            ..CrawlerConfig::default()
        }
    }

    fn crawler(dir: &TempDir, fetcher: MapFetcher) -> Crawler {
        let config = test_config(dir);
        let frontier = Frontier::initialize(&config, true).unwrap();
        Crawler::new(
            frontier,
            Box::new(fetcher),
            Box::new(HtmlLinkExtractor),
            ContentDeduplicator::new(),
            config,
        )
    }

    #[test]
    fn test_crawl_drains_site() {
        let dir = TempDir::new().unwrap();
        let crawler = crawler(&dir, site());
        let summary = crawler.run().unwrap();

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.failed_fetches, 1);
        assert!(!summary.interrupted);
        assert_eq!(summary.stats.discovered, 4);
        assert_eq!(summary.stats.completed, 4);
        assert_eq!(summary.stats.queued, 0);

        let report = crawler.frontier().report(5).unwrap();
        assert_eq!(report.unique_pages, 4);
        assert_eq!(report.subdomains, vec![("www.ics.uci.edu".to_string(), 3)]);
        assert!(report.longest_page.is_some());
    }

    #[test]
    fn test_resume_after_finished_crawl_is_empty() {
        let dir = TempDir::new().unwrap();
        let crawler = crawler(&dir, site());
        crawler.run().unwrap();
        drop(crawler);

        let config = test_config(&dir);
        let frontier = Frontier::initialize(&config, false).unwrap();
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_fetch_count_matches_discovered() {
        let dir = TempDir::new().unwrap();
        let fetcher = site();
        let config = test_config(&dir);
        let frontier = Frontier::initialize(&config, true).unwrap();
        let fetcher = std::sync::Arc::new(fetcher);

        struct Shared(std::sync::Arc<MapFetcher>);
        impl Fetcher for Shared {
            fn fetch(&self, url: &str) -> Result<Response, FetchError> {
                self.0.fetch(url)
            }
        }

        let crawler = Crawler::new(
            frontier,
            Box::new(Shared(fetcher.clone())),
            Box::new(HtmlLinkExtractor),
            ContentDeduplicator::new(),
            config,
        );
        crawler.run().unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_stop_before_run() {
        let dir = TempDir::new().unwrap();
        let crawler = crawler(&dir, site());
        crawler.stop();
        let summary = crawler.run().unwrap();

        assert!(summary.interrupted);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.stats.queued, 1);
    }
}
