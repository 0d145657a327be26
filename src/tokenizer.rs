//! Word tokenizer and stopword set used for page word counts and global word frequencies.

use lazy_static::lazy_static;
use std::collections::HashSet;

const STOPWORDS_LIST: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "cannot", "could", "couldn", "d", "did", "didn", "do", "does", "doesn",
    "doing", "don", "down", "during", "each", "few", "for", "from", "further", "had", "hadn",
    "has", "hasn", "have", "haven", "having", "he", "her", "here", "hers", "herself", "him",
    "himself", "his", "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself", "let",
    "ll", "m", "me", "more", "most", "mustn", "my", "myself", "no", "nor", "not", "of", "off",
    "on", "once", "only", "or", "other", "ought", "our", "ours", "ourselves", "out", "over",
    "own", "re", "s", "same", "shan", "she", "should", "shouldn", "so", "some", "such", "t",
    "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these",
    "they", "this", "those", "through", "to", "too", "under", "until", "up", "ve", "very", "was",
    "wasn", "we", "were", "weren", "what", "when", "where", "which", "while", "who", "whom",
    "why", "with", "won", "would", "wouldn", "you", "your", "yours", "yourself", "yourselves",
];

lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = STOPWORDS_LIST.iter().copied().collect();
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

/// Split `text` into lowercased runs of ASCII alphanumerics.
///
/// Any other character (punctuation, whitespace, non-ASCII letters) separates
/// tokens. Each distinct token is returned once, at its first position.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut seen = HashSet::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            push_token(&mut tokens, &mut seen, std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        push_token(&mut tokens, &mut seen, current);
    }

    tokens
}

fn push_token(tokens: &mut Vec<String>, seen: &mut HashSet<String>, token: String) {
    if seen.insert(token.clone()) {
        tokens.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        assert_eq!(
            tokenize("Hello, World! hello again"),
            vec!["hello", "world", "again"]
        );
    }

    #[test]
    fn test_tokenize_trailing_token() {
        assert_eq!(tokenize("one two"), vec!["one", "two"]);
    }

    #[test]
    fn test_tokenize_non_ascii_splits() {
        assert_eq!(tokenize("café_au-lait x2"), vec!["caf", "au", "lait", "x2"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("  ... !!! ").is_empty());
    }

    #[test]
    fn test_stopwords() {
        assert!(is_stopword("the"));
        assert!(is_stopword("yourselves"));
        assert!(!is_stopword("crawler"));
    }
}
