//! Order-preserving URL accumulation with a delivery cap.

use std::collections::HashSet;

/// Collects image URLs in first-seen order, capped at a target count.
///
/// Every distinct candidate is tallied even after the cap is reached, so a
/// harvest can report how much material a results page actually offered.
/// Candidates without an `http` scheme prefix are dropped outright.
pub struct UrlAccumulator {
    target: usize,
    seen: HashSet<String>,
    urls: Vec<String>,
}

impl UrlAccumulator {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            seen: HashSet::new(),
            urls: Vec::new(),
        }
    }

    /// Offer one candidate. Returns true if it was appended to the output.
    pub fn offer(&mut self, url: &str) -> bool {
        if !url.starts_with("http") {
            return false;
        }
        if !self.seen.insert(url.to_string()) {
            return false;
        }
        if self.urls.len() >= self.target {
            return false;
        }
        self.urls.push(url.to_string());
        true
    }

    pub fn offer_all<I, S>(&mut self, candidates: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for c in candidates {
            self.offer(c.as_ref());
        }
    }

    /// True once the output holds `target` URLs.
    pub fn is_full(&self) -> bool {
        self.urls.len() >= self.target
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Distinct http(s) candidates observed, including those beyond the cap.
    pub fn distinct_seen(&self) -> usize {
        self.seen.len()
    }

    pub fn finish(self) -> Vec<String> {
        self.urls
    }
}
