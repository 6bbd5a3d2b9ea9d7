use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks start instants of in-flight requests, keyed by request URL
///
/// A second start for the same key overwrites the first (last start wins).
#[derive(Debug, Default)]
pub struct TimingTracker {
    starts: HashMap<String, Instant>,
}

impl TimingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current instant as the start of `key`
    pub fn record_start(&mut self, key: impl Into<String>) {
        self.starts.insert(key.into(), Instant::now());
    }

    /// Remove the entry for `key` and return the time elapsed since its start
    pub fn resolve(&mut self, key: &str) -> Option<Duration> {
        self.starts.remove(key).map(|started| started.elapsed())
    }

    /// Number of unresolved entries
    pub fn pending(&self) -> usize {
        self.starts.len()
    }

    /// Drop entries that started more than `max_age` ago, returning how many were removed
    pub fn evict_older_than(&mut self, max_age: Duration) -> usize {
        let before = self.starts.len();
        self.starts.retain(|_, started| started.elapsed() <= max_age);
        let evicted = before - self.starts.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} stale pending timings", evicted);
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_removes_entry() {
        let mut tracker = TimingTracker::new();
        tracker.record_start("https://example.com/api");
        assert_eq!(tracker.pending(), 1);

        assert!(tracker.resolve("https://example.com/api").is_some());
        assert_eq!(tracker.pending(), 0);
        assert!(tracker.resolve("https://example.com/api").is_none());
    }

    #[test]
    fn test_resolve_unknown_key_is_absent() {
        let mut tracker = TimingTracker::new();
        assert!(tracker.resolve("https://example.com/missing").is_none());
    }

    #[test]
    fn test_last_start_wins() {
        let mut tracker = TimingTracker::new();
        tracker.record_start("https://example.com/a");
        std::thread::sleep(Duration::from_millis(20));
        tracker.record_start("https://example.com/a");

        assert_eq!(tracker.pending(), 1);
        let elapsed = tracker.resolve("https://example.com/a").unwrap();
        assert!(elapsed < Duration::from_millis(20));
    }

    #[test]
    fn test_evict_older_than() {
        let mut tracker = TimingTracker::new();
        tracker.record_start("https://example.com/old");
        std::thread::sleep(Duration::from_millis(30));
        tracker.record_start("https://example.com/new");

        let evicted = tracker.evict_older_than(Duration::from_millis(15));
        assert_eq!(evicted, 1);
        assert!(tracker.resolve("https://example.com/old").is_none());
        assert!(tracker.resolve("https://example.com/new").is_some());
    }
}
