//! URL utilities shared by the admission filter, the frontier and page processing.

use sha2::{Digest, Sha256};
use url::Url;

/// Lowercased host component of `url`, or `None` if it does not parse or has no host.
pub fn extract_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_ascii_lowercase()))
}

/// Canonical form used as the identity of a URL record.
///
/// Scheme and host are lowercased and default ports dropped by the parser; on top
/// of that the fragment is removed, a trailing slash on a non-root path is
/// trimmed and query parameters are sorted.
pub fn normalize_url(url: &str) -> Option<String> {
    let mut normalized = Url::parse(url.trim()).ok()?;

    normalized.set_fragment(None);

    let path = normalized.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }

    if let Some(query) = normalized.query().map(|q| q.to_string()) {
        let mut params: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
        if params.is_empty() {
            normalized.set_query(None);
        } else {
            params.sort_unstable();
            normalized.set_query(Some(&params.join("&")));
        }
    }

    Some(normalized.to_string())
}

/// Stable key for a normalized URL (hex SHA-256), identical across runs and builds.
pub fn url_hash(normalized: &str) -> String {
    let digest = Sha256::digest(normalized.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn strip_fragment(url: &str) -> &str {
    match url.find('#') {
        Some(pos) => &url[..pos],
        None => url,
    }
}

pub fn is_html_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    lower.contains("text/html") || lower.starts_with("application/xhtml+xml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_host() {
        assert_eq!(
            extract_host("https://Vision.ICS.uci.edu/path"),
            Some("vision.ics.uci.edu".to_string())
        );
        assert_eq!(extract_host("invalid"), None);
        assert_eq!(extract_host("mailto:someone@ics.uci.edu"), None);
    }

    #[test]
    fn test_normalize_case_and_trailing_slash() {
        assert_eq!(
            normalize_url("http://EX.edu/a/"),
            normalize_url("http://ex.edu/a")
        );
        assert_eq!(normalize_url("http://ex.edu/a").unwrap(), "http://ex.edu/a");
    }

    #[test]
    fn test_normalize_default_port_and_fragment() {
        assert_eq!(
            normalize_url("https://ics.uci.edu:443/about#team").unwrap(),
            "https://ics.uci.edu/about"
        );
        assert_eq!(
            normalize_url("https://ics.uci.edu").unwrap(),
            normalize_url("https://ics.uci.edu/").unwrap()
        );
    }

    #[test]
    fn test_normalize_sorts_query() {
        assert_eq!(
            normalize_url("https://ics.uci.edu/search?b=2&a=1").unwrap(),
            "https://ics.uci.edu/search?a=1&b=2"
        );
        assert_eq!(
            normalize_url("https://ics.uci.edu/search?").unwrap(),
            "https://ics.uci.edu/search"
        );
    }

    #[test]
    fn test_normalize_keeps_path_case() {
        assert_eq!(
            normalize_url("https://ics.uci.edu/~Eppstein/Pubs").unwrap(),
            "https://ics.uci.edu/~Eppstein/Pubs"
        );
    }

    #[test]
    fn test_normalize_invalid() {
        assert_eq!(normalize_url("not a url"), None);
    }

    #[test]
    fn test_url_hash_is_stable() {
        let a = url_hash("https://ics.uci.edu/about");
        assert_eq!(a, url_hash("https://ics.uci.edu/about"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, url_hash("https://ics.uci.edu/about/us"));
    }

    #[test]
    fn test_strip_fragment() {
        assert_eq!(strip_fragment("https://a.edu/x#y"), "https://a.edu/x");
        assert_eq!(strip_fragment("https://a.edu/x"), "https://a.edu/x");
    }

    #[test]
    fn test_is_html_content_type() {
        assert!(is_html_content_type("text/html"));
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(!is_html_content_type("application/json"));
        assert!(!is_html_content_type("image/png"));
    }
}
