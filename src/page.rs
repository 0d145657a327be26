//! Turning one fetched response into admitted links and page words.

use scraper::{Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

use crate::admission;
use crate::config::{Config, CrawlerConfig};
use crate::fingerprint::{self, ContentDeduplicator};
use crate::tokenizer;
use crate::url_utils;

/// What the fetcher hands back for a requested URL.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub status: u16,
    /// Final URL after redirects
    pub url: String,
    pub content: Option<Vec<u8>>,
    pub content_type: Option<String>,
}

impl Response {
    /// Body of a 200 HTML response within the size limit.
    pub fn usable_body(&self) -> Option<&[u8]> {
        if self.status != 200 {
            return None;
        }
        let body = self.content.as_deref().filter(|b| !b.is_empty())?;
        let is_html = self
            .content_type
            .as_deref()
            .map(url_utils::is_html_content_type)
            .unwrap_or(false);
        if !is_html || body.len() > Config::MAX_CONTENT_SIZE {
            return None;
        }
        Some(body)
    }
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid base URL {0}: {1}")]
    InvalidBase(String, url::ParseError),

    #[error("Markup error: {0}")]
    Markup(String),
}

/// Plain text and absolute, fragment-free links of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub text: String,
    pub links: Vec<String>,
}

pub trait LinkExtractor: Send + Sync {
    fn extract(&self, body: &[u8], base_url: &str) -> Result<ExtractedPage, ExtractError>;
}

/// HTML extractor backed by the `scraper` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlLinkExtractor;

const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

impl LinkExtractor for HtmlLinkExtractor {
    fn extract(&self, body: &[u8], base_url: &str) -> Result<ExtractedPage, ExtractError> {
        let base = Url::parse(base_url)
            .map_err(|e| ExtractError::InvalidBase(base_url.to_string(), e))?;
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        let text = document
            .root_element()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        let selector =
            Selector::parse("a[href]").map_err(|e| ExtractError::Markup(e.to_string()))?;
        let mut seen = HashSet::new();
        let mut links = Vec::new();
        for element in document.select(&selector) {
            let href = match element.value().attr("href") {
                Some(href) => href.trim(),
                None => continue,
            };
            let lower = href.to_ascii_lowercase();
            if href.is_empty() || SKIPPED_SCHEMES.iter().any(|s| lower.starts_with(s)) {
                continue;
            }
            let absolute = match base.join(href) {
                Ok(absolute) => absolute,
                Err(e) => {
                    tracing::debug!(href, error = %e, "Skipping unresolvable link");
                    continue;
                }
            };
            let link = url_utils::strip_fragment(absolute.as_str()).to_string();
            if !link.is_empty() && seen.insert(link.clone()) {
                links.push(link);
            }
        }

        Ok(ExtractedPage { text, links })
    }
}

/// Admitted links and tokens of one fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOutcome {
    pub links: Vec<String>,
    pub words: Vec<String>,
}

/// Process one response: extract, tokenize, drop thin and duplicate pages, and admit links.
///
/// Thin or duplicate pages keep their words but contribute no links.
pub fn scrape(
    url: &str,
    response: &Response,
    extractor: &dyn LinkExtractor,
    dedup: &ContentDeduplicator,
    config: &CrawlerConfig,
) -> PageOutcome {
    let body = match response.usable_body() {
        Some(body) => body,
        None => return PageOutcome::default(),
    };

    let base = if response.url.is_empty() { url } else { response.url.as_str() };
    let page = match extractor.extract(body, base) {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(url, error = %e, "Error extracting links");
            return PageOutcome::default();
        }
    };

    let words = tokenizer::tokenize(&page.text);

    if page.text.chars().count() < config.min_text_length {
        tracing::debug!(url, "Page text too short, not following links");
        return PageOutcome { links: Vec::new(), words };
    }

    if dedup.exact_duplicate(&page.text) {
        tracing::debug!(url, "Exact duplicate page");
        return PageOutcome { links: Vec::new(), words };
    }

    if config.near_duplicate_detection && dedup.near_duplicate(fingerprint::compute_simhash(&words))
    {
        tracing::debug!(url, "Near duplicate page");
        return PageOutcome { links: Vec::new(), words };
    }

    // Admission runs on the form the frontier will store and queue.
    let mut seen = HashSet::new();
    let links = page
        .links
        .iter()
        .filter_map(|link| url_utils::normalize_url(link))
        .filter(|link| seen.insert(link.clone()))
        .filter(|link| admission::is_valid(link))
        .collect();

    PageOutcome { links, words }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILLER: &str = "Research in the department spans algorithms, databases, networks, \
        security, machine learning, human computer interaction, software engineering and \
        theory, with faculty advising graduate and undergraduate students across many labs.";

    fn html_response(url: &str, body: &str) -> Response {
        Response {
            status: 200,
            url: url.to_string(),
            content: Some(body.as_bytes().to_vec()),
            content_type: Some("text/html; charset=utf-8".to_string()),
        }
    }

    fn page_with_links(extra: &str) -> String {
        format!(
            "<html><body><p>{} {}</p>\
             <a href=\"/about\">About</a>\
             <a href=\"/about#team\">Team</a>\
             <a href=\"https://google.com/\">Elsewhere</a>\
             <a href=\"/slides.pdf\">Slides</a>\
             <a href=\"mailto:dean@ics.uci.edu\">Mail</a>\
             <a href=\"people\">People</a>\
             </body></html>",
            FILLER, extra
        )
    }

    #[test]
    fn test_extractor_text_and_links() {
        let page = HtmlLinkExtractor
            .extract(
                page_with_links("").as_bytes(),
                "https://www.ics.uci.edu/dept/",
            )
            .unwrap();

        assert!(page.text.starts_with("Research in the department"));
        assert_eq!(
            page.links,
            vec![
                "https://www.ics.uci.edu/about".to_string(),
                "https://google.com/".to_string(),
                "https://www.ics.uci.edu/slides.pdf".to_string(),
                "https://www.ics.uci.edu/dept/people".to_string(),
            ]
        );
    }

    #[test]
    fn test_extractor_invalid_base() {
        assert!(matches!(
            HtmlLinkExtractor.extract(b"<html></html>", "relative/path"),
            Err(ExtractError::InvalidBase(_, _))
        ));
    }

    #[test]
    fn test_scrape_admits_links() {
        let dedup = ContentDeduplicator::new();
        let config = CrawlerConfig::default();
        let url = "https://www.ics.uci.edu/dept/";
        let outcome = scrape(
            url,
            &html_response(url, &page_with_links("")),
            &HtmlLinkExtractor,
            &dedup,
            &config,
        );

        assert_eq!(
            outcome.links,
            vec![
                "https://www.ics.uci.edu/about".to_string(),
                "https://www.ics.uci.edu/dept/people".to_string(),
            ]
        );
        assert!(outcome.words.contains(&"algorithms".to_string()));
        assert!(outcome.words.contains(&"about".to_string()));
    }

    #[test]
    fn test_scrape_checks_normalized_links() {
        let dedup = ContentDeduplicator::new();
        let config = CrawlerConfig::default();
        let url = "https://www.ics.uci.edu/";
        let body = format!(
            "<html><body><p>{}</p>\
             <a href=\"/slides.pdf/\">Slides</a>\
             <a href=\"/research/\">Research</a>\
             <a href=\"/Research?b=2&amp;a=1\">Sorted</a>\
             </body></html>",
            FILLER
        );
        let outcome = scrape(
            url,
            &html_response(url, &body),
            &HtmlLinkExtractor,
            &dedup,
            &config,
        );

        assert_eq!(
            outcome.links,
            vec![
                "https://www.ics.uci.edu/research".to_string(),
                "https://www.ics.uci.edu/Research?a=1&b=2".to_string(),
            ]
        );
        for link in &outcome.links {
            assert_eq!(url_utils::normalize_url(link).as_deref(), Some(link.as_str()));
            assert!(admission::is_valid(link));
        }
    }

    #[test]
    fn test_scrape_unusable_responses() {
        let dedup = ContentDeduplicator::new();
        let config = CrawlerConfig::default();
        let url = "https://www.ics.uci.edu/";
        let good = html_response(url, &page_with_links(""));

        let not_found = Response { status: 404, ..good.clone() };
        let no_body = Response { content: None, ..good.clone() };
        let json = Response {
            content_type: Some("application/json".to_string()),
            ..good.clone()
        };
        let huge = Response {
            content: Some(vec![b'a'; Config::MAX_CONTENT_SIZE + 1]),
            ..good.clone()
        };

        for response in [not_found, no_body, json, huge] {
            let outcome = scrape(url, &response, &HtmlLinkExtractor, &dedup, &config);
            assert_eq!(outcome, PageOutcome::default());
        }
    }

    #[test]
    fn test_scrape_short_page_keeps_words() {
        let dedup = ContentDeduplicator::new();
        let config = CrawlerConfig::default();
        let url = "https://www.ics.uci.edu/";
        let outcome = scrape(
            url,
            &html_response(url, "<html><body>Tiny page <a href=\"/x\">x</a></body></html>"),
            &HtmlLinkExtractor,
            &dedup,
            &config,
        );
        assert!(outcome.links.is_empty());
        assert_eq!(outcome.words, vec!["tiny", "page", "x"]);
    }

    #[test]
    fn test_scrape_exact_duplicate_drops_links() {
        let dedup = ContentDeduplicator::new();
        let config = CrawlerConfig::default();
        let body = page_with_links("");

        let first = scrape(
            "https://www.ics.uci.edu/a",
            &html_response("https://www.ics.uci.edu/a", &body),
            &HtmlLinkExtractor,
            &dedup,
            &config,
        );
        let second = scrape(
            "https://www.ics.uci.edu/b",
            &html_response("https://www.ics.uci.edu/b", &body),
            &HtmlLinkExtractor,
            &dedup,
            &config,
        );

        assert!(!first.links.is_empty());
        assert!(second.links.is_empty());
        assert_eq!(first.words, second.words);
    }

    #[test]
    fn test_scrape_near_duplicate_drops_links() {
        let dedup = ContentDeduplicator::new();
        let config = CrawlerConfig::default();

        let first = scrape(
            "https://www.ics.uci.edu/a",
            &html_response("https://www.ics.uci.edu/a", &page_with_links("Copyright 2023")),
            &HtmlLinkExtractor,
            &dedup,
            &config,
        );
        assert!(!first.links.is_empty());

        // Footer year changed: not exact, but near-identical tokens
        let near = page_with_links("Copyright 2024");
        let disabled = CrawlerConfig {
            near_duplicate_detection: false,
            ..CrawlerConfig::default()
        };
        let unchecked = scrape(
            "https://www.ics.uci.edu/b",
            &html_response("https://www.ics.uci.edu/b", &near),
            &HtmlLinkExtractor,
            &dedup,
            &disabled,
        );
        assert!(!unchecked.links.is_empty());

        let checked = scrape(
            "https://www.ics.uci.edu/c",
            &html_response("https://www.ics.uci.edu/c", &page_with_links("Copyright 2025")),
            &HtmlLinkExtractor,
            &dedup,
            &config,
        );
        assert!(checked.links.is_empty());
    }

    struct FailingExtractor;

    impl LinkExtractor for FailingExtractor {
        fn extract(&self, _body: &[u8], _base_url: &str) -> Result<ExtractedPage, ExtractError> {
            Err(ExtractError::Markup("broken".to_string()))
        }
    }

    #[test]
    fn test_scrape_extractor_failure_is_soft() {
        let dedup = ContentDeduplicator::new();
        let url = "https://www.ics.uci.edu/";
        let outcome = scrape(
            url,
            &html_response(url, &page_with_links("")),
            &FailingExtractor,
            &dedup,
            &CrawlerConfig::default(),
        );
        assert_eq!(outcome, PageOutcome::default());
    }
}
