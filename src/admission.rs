//! Admission filter deciding whether a discovered URL may ever be queued.
//!
//! Checks run in a fixed order and stop at the first failure. A URL that does not
//! parse is rejected and logged; every other rejection is silent.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use crate::config::Config;
use crate::url_utils;

/// Domain suffixes the crawl is restricted to.
pub const ALLOWED_DOMAINS: &[&str] = &[
    ".ics.uci.edu",
    ".cs.uci.edu",
    ".informatics.uci.edu",
    ".stat.uci.edu",
];

/// Path fragments known to generate unbounded URL spaces.
const TRAP_FRAGMENTS: &[&str] = &[
    "wiki.ics.uci.edu/doku.php",
    "grape.ics.uci.edu/wiki",
    "/events",
    "/event",
    "/~eppstein/junkyard",
    "/~dechter/publications",
];

lazy_static! {
    static ref TRAP_KEYWORDS: Regex =
        Regex::new(r"calendar|login|signup|reply|share").expect("Invalid trap keyword regex");

    static ref DATE_PATTERNS: [Regex; 3] = [
        Regex::new(r"\b[0-9]{4}[-/.][0-9]{1,2}[-/.][0-9]{1,2}\b").expect("Invalid full date regex"),
        Regex::new(r"\b[0-9]{8}\b").expect("Invalid compact date regex"),
        Regex::new(r"\b[0-9]{4}[-/.][0-9]{1,2}\b").expect("Invalid year-month regex"),
    ];

    static ref PAGINATION: Regex =
        Regex::new(r"page=[0-9]+|p=[0-9]+").expect("Invalid pagination regex");

    static ref DISALLOWED_EXTENSION: Regex = Regex::new(concat!(
        r"\.(css|js|bmp|gif|jpe?g|ico",
        r"|png|tiff?|mid|mp2|mp3|mp4",
        r"|wav|avi|mov|mpeg|ram|m4v|mkv|ogg|ogv|pdf",
        r"|ps|eps|tex|ppt|pptx|doc|docx|xls|xlsx|names",
        r"|data|dat|exe|bz2|tar|msi|bin|7z|psd|dmg|iso",
        r"|epub|dll|cnf|tgz|sha1",
        r"|thmx|mso|arff|rtf|jar|csv|json",
        r"|rm|smil|wmv|swf|wma|zip|rar|gz)$"
    ))
    .expect("Invalid extension regex");
}

/// Why a URL was refused admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unparseable,
    Scheme,
    Domain,
    TooLong,
    Trap,
    DatePattern,
    DateQuery,
    Pagination,
    QueryTooLong,
    FileType,
}

/// Returns true if `url` is in scope, not a trap and not a non-HTML resource.
pub fn is_valid(url: &str) -> bool {
    check(url).is_ok()
}

/// Same as [`is_valid`] but reports the first failing check.
pub fn check(url: &str) -> Result<(), Rejection> {
    let parsed = match Url::parse(url) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(url, error = %e, "Rejecting unparseable URL");
            return Err(Rejection::Unparseable);
        }
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Rejection::Scheme);
    }

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    if !is_allowed_host(&host) {
        return Err(Rejection::Domain);
    }

    if url.chars().count() > Config::MAX_URL_LENGTH {
        return Err(Rejection::TooLong);
    }

    let url_lower = url.to_lowercase();
    if TRAP_KEYWORDS.is_match(&url_lower)
        || TRAP_FRAGMENTS.iter().any(|trap| url_lower.contains(trap))
    {
        return Err(Rejection::Trap);
    }

    let query = raw_query(url).to_lowercase();
    let path = parsed.path();

    if !query.is_empty() {
        if DATE_PATTERNS.iter().any(|re| re.is_match(&query)) {
            return Err(Rejection::DatePattern);
        }
        // "dates" is covered by "date"
        if query
            .split('&')
            .any(|param| param.contains("date") || param.contains("ical"))
        {
            return Err(Rejection::DateQuery);
        }
    }

    if DATE_PATTERNS.iter().any(|re| re.is_match(path)) {
        return Err(Rejection::DatePattern);
    }

    if PAGINATION.is_match(&url_lower) {
        return Err(Rejection::Pagination);
    }

    if query.chars().count() > Config::MAX_QUERY_LENGTH {
        return Err(Rejection::QueryTooLong);
    }

    if DISALLOWED_EXTENSION.is_match(&path.to_lowercase()) || DISALLOWED_EXTENSION.is_match(&query)
    {
        return Err(Rejection::FileType);
    }

    Ok(())
}

/// Query exactly as written in `url`, without percent-encoding added by the parser.
fn raw_query(url: &str) -> &str {
    url_utils::strip_fragment(url)
        .split_once('?')
        .map(|(_, query)| query)
        .unwrap_or_default()
}

/// A host is in scope if it is a subdomain of an allowed suffix or the suffix itself
/// without its leading dot.
fn is_allowed_host(host: &str) -> bool {
    ALLOWED_DOMAINS
        .iter()
        .any(|suffix| host.ends_with(suffix) || host == &suffix[1..])
}
