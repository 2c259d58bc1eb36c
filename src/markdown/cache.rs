//! Bounded LRU cache of sanitized markdown output.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::trace;

/// Sanitized HTML keyed by trimmed markdown source.
///
/// Bounded twice: at most `capacity` entries, and sources longer than
/// `max_entry_chars` characters are never stored.
pub struct MarkdownCache {
    entries: LruCache<String, String>,
    max_entry_chars: usize,
}

impl MarkdownCache {
    pub fn new(capacity: NonZeroUsize, max_entry_chars: usize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            max_entry_chars,
        }
    }

    /// Whether `source` may be stored at all.
    pub fn is_eligible(&self, source: &str) -> bool {
        // Byte length bounds char count from above, so skip the scan when it fits.
        source.len() <= self.max_entry_chars || source.chars().count() <= self.max_entry_chars
    }

    /// Look up `source`, marking it most recently used on a hit.
    pub fn get(&mut self, source: &str) -> Option<&String> {
        self.entries.get(source)
    }

    /// Store `html` for `source`; evicts the least recently used entry when
    /// full. Ineligible sources are ignored.
    pub fn insert(&mut self, source: &str, html: String) {
        if !self.is_eligible(source) {
            return;
        }
        if let Some((evicted, _)) = self.entries.push(source.to_string(), html)
            && evicted != source
        {
            trace!(
                component = "markdown_cache",
                operation = "evict",
                evicted_len = evicted.len(),
                "Evicted least recently used entry"
            );
        }
    }

    /// Peek without touching recency.
    pub fn contains(&self, source: &str) -> bool {
        self.entries.contains(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(cap: usize, max_chars: usize) -> MarkdownCache {
        MarkdownCache::new(NonZeroUsize::new(cap).unwrap(), max_chars)
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut c = cache(2, 100);
        c.insert("a", "A".into());
        c.insert("b", "B".into());
        assert_eq!(c.get("a").map(String::as_str), Some("A"));
        c.insert("c", "C".into());
        assert!(c.contains("a"));
        assert!(!c.contains("b"));
        assert!(c.contains("c"));
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn oversized_sources_are_never_stored() {
        let mut c = cache(4, 3);
        c.insert("abcd", "x".into());
        assert!(c.is_empty());
        c.insert("abc", "x".into());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn eligibility_counts_characters() {
        let c = cache(1, 3);
        assert!(c.is_eligible("日本語"));
        assert!(!c.is_eligible("日本語x"));
    }

    #[test]
    fn reinsert_replaces_value_without_growing() {
        let mut c = cache(2, 100);
        c.insert("a", "1".into());
        c.insert("a", "2".into());
        assert_eq!(c.len(), 1);
        assert_eq!(c.get("a").map(String::as_str), Some("2"));
    }
}
