//! Crawl report built from the durable aggregates.

use serde::Serialize;
use std::fmt;

use crate::state::{CrawlerState, StateError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub unique_pages: u64,
    pub longest_page: Option<(String, u64)>,
    /// Most frequent non-stopwords, highest count first, ties broken alphabetically
    pub top_words: Vec<(String, u64)>,
    /// Page counts per host, sorted by host
    pub subdomains: Vec<(String, u64)>,
}

impl Report {
    pub fn from_state(state: &CrawlerState, top_k: usize) -> Result<Self, StateError> {
        let mut words = state.word_frequencies()?;
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(top_k);

        let mut subdomains = state.subdomain_counts()?;
        subdomains.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self {
            unique_pages: state.url_count()?,
            longest_page: state
                .longest_page()?
                .map(|page| (page.url, page.word_count)),
            top_words: words,
            subdomains,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of unique pages: {}", self.unique_pages)?;
        match &self.longest_page {
            Some((url, words)) => writeln!(f, "Longest page: {} ({} words)", url, words)?,
            None => writeln!(f, "Longest page: none")?,
        }

        writeln!(f, "{} most common words:", self.top_words.len())?;
        for (word, count) in &self.top_words {
            writeln!(f, "  {}: {}", word, count)?;
        }

        writeln!(f, "{} subdomains found:", self.subdomains.len())?;
        for (host, count) in &self.subdomains {
            writeln!(f, "  {}, {}", host, count)?;
        }
        Ok(())
    }
}
