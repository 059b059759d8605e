//! Exclusion filter: substring patterns that suppress capture of matching URLs.

use crate::error::{Result, TraceError};
use parking_lot::RwLock;

/// A mutable set of URL substrings.
///
/// Patterns keep insertion order for display; order has no effect on
/// [`ExclusionFilter::test`].
#[derive(Debug, Default)]
pub struct ExclusionFilter {
    patterns: RwLock<Vec<String>>,
}

impl ExclusionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from initial patterns, skipping blanks and duplicates.
    pub fn with_patterns<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let filter = Self::new();
        for pattern in patterns {
            let _ = filter.add(pattern.as_ref());
        }
        filter
    }

    /// Add a pattern. Returns `Ok(true)` if the set changed, `Ok(false)` if
    /// it was already present.
    pub fn add(&self, pattern: &str) -> Result<bool> {
        let pattern = validate(pattern)?;
        let mut patterns = self.patterns.write();
        if patterns.iter().any(|p| p == pattern) {
            return Ok(false);
        }
        patterns.push(pattern.to_string());
        Ok(true)
    }

    /// Remove a pattern. Returns `Ok(true)` if the set changed, `Ok(false)`
    /// if it was not present.
    pub fn remove(&self, pattern: &str) -> Result<bool> {
        let pattern = validate(pattern)?;
        let mut patterns = self.patterns.write();
        let before = patterns.len();
        patterns.retain(|p| p != pattern);
        Ok(patterns.len() != before)
    }

    /// True if any pattern occurs in `url`.
    pub fn test(&self, url: &str) -> bool {
        self.patterns.read().iter().any(|p| url.contains(p.as_str()))
    }

    pub fn patterns(&self) -> Vec<String> {
        self.patterns.read().clone()
    }

    pub fn len(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.read().is_empty()
    }
}

fn validate(pattern: &str) -> Result<&str> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(TraceError::MutationRejected(
            "Pattern is required".to_string(),
        ));
    }
    Ok(trimmed)
}
