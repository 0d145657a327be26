//! Content fingerprinting: exact-text hashes and SimHash near-duplicate detection.
//!
//! One `ContentDeduplicator` is built per crawl process and shared by reference
//! between workers. Both seen-sets live for the whole process and are never pruned.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use crate::config::Config;

const TEXT_HASH_BASE: u64 = 31;
const WORD_HASH_BASE: u64 = 131;

/// Lowercase, collapse whitespace runs to one space and trim.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Polynomial rolling hash modulo 2^64 over the characters of `text`.
fn polynomial_hash(text: &str, base: u64) -> u64 {
    text.chars()
        .fold(0u64, |h, ch| h.wrapping_mul(base).wrapping_add(ch as u64))
}

pub fn text_hash(normalized: &str) -> u64 {
    polynomial_hash(normalized, TEXT_HASH_BASE)
}

pub fn hash_word(word: &str) -> u64 {
    polynomial_hash(word, WORD_HASH_BASE)
}

/// SimHash over `tokens`, each distinct token weighted by its occurrence count.
///
/// A bit is set only when its weighted sum is strictly positive.
pub fn compute_simhash<S: AsRef<str>>(tokens: &[S]) -> u64 {
    let mut weights: HashMap<&str, i64> = HashMap::new();
    for token in tokens {
        *weights.entry(token.as_ref()).or_insert(0) += 1;
    }

    let mut vector = [0i64; Config::SIMHASH_BITS as usize];
    for (word, weight) in weights {
        let word_hash = hash_word(word);
        for (bit, sum) in vector.iter_mut().enumerate() {
            if word_hash & (1u64 << bit) != 0 {
                *sum += weight;
            } else {
                *sum -= weight;
            }
        }
    }

    vector
        .iter()
        .enumerate()
        .filter(|(_, sum)| **sum > 0)
        .fold(0u64, |fingerprint, (bit, _)| fingerprint | (1u64 << bit))
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// Process-wide duplicate detection state.
pub struct ContentDeduplicator {
    exact_hashes: Mutex<HashSet<u64>>,
    // Linear scan per lookup; fine at single-crawl scale.
    simhashes: Mutex<Vec<u64>>,
    threshold: u32,
}

impl ContentDeduplicator {
    pub fn new() -> Self {
        Self::with_threshold(Config::SIMHASH_THRESHOLD)
    }

    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            exact_hashes: Mutex::new(HashSet::new()),
            simhashes: Mutex::new(Vec::new()),
            threshold,
        }
    }

    /// True if the normalized text was seen before; otherwise records it and returns false.
    pub fn exact_duplicate(&self, text: &str) -> bool {
        let hash = text_hash(&normalize_text(text));
        !self.exact_hashes.lock().insert(hash)
    }

    /// True if a recorded fingerprint is within the Hamming threshold of `fingerprint`;
    /// otherwise records it and returns false.
    pub fn near_duplicate(&self, fingerprint: u64) -> bool {
        let mut seen = self.simhashes.lock();
        if seen
            .iter()
            .any(|&other| hamming_distance(fingerprint, other) <= self.threshold)
        {
            return true;
        }
        seen.push(fingerprint);
        false
    }

    pub fn near_duplicate_tokens<S: AsRef<str>>(&self, tokens: &[S]) -> bool {
        self.near_duplicate(compute_simhash(tokens))
    }

    pub fn exact_count(&self) -> usize {
        self.exact_hashes.lock().len()
    }

    pub fn fingerprint_count(&self) -> usize {
        self.simhashes.lock().len()
    }
}

impl Default for ContentDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}
