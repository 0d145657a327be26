use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::admission;
use crate::config::CrawlerConfig;
use crate::report::Report;
use crate::state::{CrawlerState, StateError};
use crate::tokenizer;
use crate::url_utils;

#[derive(Error, Debug)]
pub enum FrontierError {
    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Invalid seed URL: {0}")]
    InvalidSeed(String),
}

/// Frontier owning the durable URL records, the in-memory ready queue and the
/// per-host politeness clock.
///
/// The three pieces are guarded independently: a slow durable write never blocks a
/// queue pop, and neither touches the politeness clock.
pub struct Frontier {
    /// Durable records and aggregates
    store: Mutex<CrawlerState>,
    /// Not-yet-dispatched URLs, a cache of incomplete records
    queue: Mutex<VecDeque<String>>,
    /// Host -> earliest next access
    domain_clock: DashMap<String, Instant>,
    politeness_delay: Duration,
}

impl Frontier {
    /// Open the frontier described by `config`.
    ///
    /// With `restart`, any existing save file is discarded and the queue is seeded.
    /// Otherwise incomplete, still-admissible records are reloaded onto the queue; an
    /// empty store is seeded as a first run.
    pub fn initialize(config: &CrawlerConfig, restart: bool) -> Result<Self, FrontierError> {
        let save_path = config.save_path();
        let exists = save_path.exists();

        let state = if restart {
            if exists {
                tracing::info!("Found save file {}, deleting it", save_path.display());
            }
            CrawlerState::recreate(&save_path)?
        } else {
            if !exists {
                tracing::info!(
                    "Did not find save file {}, starting from seed",
                    save_path.display()
                );
            }
            CrawlerState::open(&save_path)?
        };
        tracing::debug!("Frontier database open at {}", state.path().display());

        let frontier = Self {
            store: Mutex::new(state),
            queue: Mutex::new(VecDeque::new()),
            domain_clock: DashMap::new(),
            politeness_delay: config.politeness_delay,
        };

        if restart {
            frontier.add_seeds(&config.seed_urls)?;
        } else {
            let total = frontier.load_saved()?;
            if total == 0 {
                frontier.add_seeds(&config.seed_urls)?;
            }
        }

        Ok(frontier)
    }

    /// Queue every incomplete record that still passes admission. Returns the total
    /// number of records found.
    fn load_saved(&self) -> Result<u64, FrontierError> {
        let mut pending = Vec::new();
        let total = {
            let store = self.store.lock();
            store.for_each_url(|record| {
                if !record.completed && admission::is_valid(&record.url) {
                    pending.push(record.url);
                }
            })?;
            store.url_count()?
        };

        tracing::info!(
            "Found {} urls to be downloaded from {} total urls discovered",
            pending.len(),
            total
        );
        self.queue.lock().extend(pending);
        Ok(total)
    }

    fn add_seeds(&self, seeds: &[String]) -> Result<(), FrontierError> {
        for seed in seeds {
            if url_utils::normalize_url(seed).is_none() {
                return Err(FrontierError::InvalidSeed(seed.clone()));
            }
            self.add_url(seed)?;
        }
        Ok(())
    }

    /// Pop one URL to fetch. No URL is handed to two callers.
    pub fn get_next_url(&self) -> Option<String> {
        self.queue.lock().pop_front()
    }

    /// Record and queue `url` if its normalized form has never been seen.
    ///
    /// Returns true if the URL was new. Completed URLs are not re-admitted.
    pub fn add_url(&self, url: &str) -> Result<bool, FrontierError> {
        let normalized = match url_utils::normalize_url(url) {
            Some(normalized) => normalized,
            None => {
                tracing::warn!(url, "Skipping unparseable URL");
                return Ok(false);
            }
        };
        let hash = url_utils::url_hash(&normalized);

        let inserted = self.store.lock().insert_url_if_absent(&hash, &normalized)?;
        if inserted {
            self.queue.lock().push_back(normalized);
        }
        Ok(inserted)
    }

    /// Durably mark `url` completed and update the longest-page aggregate.
    pub fn mark_url_complete(&self, url: &str, word_count: usize) -> Result<(), FrontierError> {
        let normalized = url_utils::normalize_url(url).unwrap_or_else(|| url.to_string());
        let hash = url_utils::url_hash(&normalized);

        let existed = self
            .store
            .lock()
            .mark_completed(&hash, &normalized, word_count as u64)?;
        if !existed {
            tracing::error!("Completed url {}, but have not seen it before", url);
        }
        Ok(())
    }

    /// Block until `url`'s host may be accessed again, then push that host's next
    /// slot out by the politeness delay.
    pub fn wait_for_politeness(&self, url: &str) {
        let host = match url_utils::extract_host(url) {
            Some(host) => host,
            None => {
                tracing::warn!(url, "No host for politeness check, not waiting");
                return;
            }
        };

        let wait = {
            let now = Instant::now();
            let mut available_at = self.domain_clock.entry(host.clone()).or_insert(now);
            let wait = available_at.saturating_duration_since(now);
            *available_at = (*available_at).max(now) + self.politeness_delay;
            wait
        };

        if !wait.is_zero() {
            tracing::debug!(
                "Politeness delay: sleeping {:.2}s for {}",
                wait.as_secs_f64(),
                host
            );
            std::thread::sleep(wait);
        }
    }

    /// Set `url`'s host clock to now.
    pub fn record_domain_access(&self, url: &str) {
        match url_utils::extract_host(url) {
            Some(host) => {
                self.domain_clock.insert(host, Instant::now());
            }
            None => tracing::warn!(url, "No host to record access for"),
        }
    }

    /// Count each non-stopword token once in the global word frequencies.
    pub fn log_word_frequency<S: AsRef<str>>(&self, tokens: &[S]) -> Result<(), FrontierError> {
        let words: Vec<&str> = tokens
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| !tokenizer::is_stopword(t))
            .collect();
        self.store.lock().increment_words(&words)?;
        Ok(())
    }

    /// Count one page for `url`'s host.
    pub fn log_domain_count(&self, url: &str) -> Result<(), FrontierError> {
        match url_utils::extract_host(url) {
            Some(host) => self.store.lock().increment_subdomain(&host)?,
            None => tracing::warn!(url, "No host to count page against"),
        }
        Ok(())
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Check if the frontier is empty (no more work to do)
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    pub fn report(&self, top_k: usize) -> Result<Report, FrontierError> {
        Ok(Report::from_state(&self.store.lock(), top_k)?)
    }

    pub fn stats(&self) -> Result<FrontierStats, FrontierError> {
        let (discovered, completed) = {
            let store = self.store.lock();
            (store.url_count()?, store.completed_count()?)
        };
        Ok(FrontierStats {
            discovered,
            completed,
            queued: self.pending(),
            tracked_hosts: self.domain_clock.len(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct FrontierStats {
    pub discovered: u64,
    pub completed: u64,
    pub queued: usize,
    pub tracked_hosts: usize,
}

impl std::fmt::Display for FrontierStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Frontier: {} discovered, {} completed, {} queued, {} hosts",
            self.discovered, self.completed, self.queued, self.tracked_hosts
        )
    }
}
