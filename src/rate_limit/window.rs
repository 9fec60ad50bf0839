//! Sliding window of recorded send timestamps.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Ordered timestamps of recent sends, oldest first.
///
/// The window retains one long span of history; shorter spans are answered by
/// filtering against the caller's `now`. Not thread-safe on its own, the
/// limiter guards it behind its own lock.
#[derive(Debug)]
pub(crate) struct RequestWindow {
    timestamps: VecDeque<Instant>,
    span: Duration,
}

impl RequestWindow {
    pub(crate) fn new(span: Duration) -> Self {
        RequestWindow {
            timestamps: VecDeque::new(),
            span,
        }
    }

    /// Drops entries that have aged out of the retained span.
    pub(crate) fn prune(&mut self, now: Instant) {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) >= self.span {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records a send at `now`.
    pub(crate) fn push(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    pub(crate) fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Sends younger than `span`, counted against the caller's `now`.
    pub(crate) fn count_within(&self, now: Instant, span: Duration) -> usize {
        self.timestamps
            .iter()
            .filter(|t| now.duration_since(**t) < span)
            .count()
    }

    /// Oldest send younger than `span`, if any.
    pub(crate) fn oldest_within(&self, now: Instant, span: Duration) -> Option<Instant> {
        self.timestamps
            .iter()
            .find(|t| now.duration_since(**t) < span)
            .copied()
    }

    /// Oldest retained send.
    pub(crate) fn oldest(&self) -> Option<Instant> {
        self.timestamps.front().copied()
    }

    /// Timestamp at `index`, counting from the oldest retained send.
    pub(crate) fn get(&self, index: usize) -> Option<Instant> {
        self.timestamps.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_window_starts_empty() {
        let window = RequestWindow::new(Duration::from_secs(120));
        assert_eq!(window.len(), 0);
        assert!(window.oldest().is_none());
    }

    #[tokio::test]
    async fn test_push_and_count() {
        let mut window = RequestWindow::new(Duration::from_secs(120));
        let now = Instant::now();

        window.push(now);
        window.push(now);

        assert_eq!(window.len(), 2);
        assert_eq!(window.count_within(now, Duration::from_secs(1)), 2);
        assert_eq!(window.oldest(), Some(now));
    }

    #[tokio::test]
    async fn test_prune_drops_aged_entries() {
        tokio::time::pause();

        let mut window = RequestWindow::new(Duration::from_secs(120));
        window.push(Instant::now());

        tokio::time::advance(Duration::from_secs(60)).await;
        window.push(Instant::now());

        tokio::time::advance(Duration::from_secs(61)).await;
        window.prune(Instant::now());

        // First entry is 121s old and gone, second is 61s old and kept
        assert_eq!(window.len(), 1);
    }

    #[tokio::test]
    async fn test_count_within_shorter_span() {
        tokio::time::pause();

        let mut window = RequestWindow::new(Duration::from_secs(120));
        window.push(Instant::now());

        tokio::time::advance(Duration::from_secs(2)).await;
        window.push(Instant::now());

        let now = Instant::now();
        assert_eq!(window.len(), 2);
        assert_eq!(window.count_within(now, Duration::from_secs(1)), 1);
        assert_eq!(window.count_within(now, Duration::from_secs(120)), 2);
    }

    #[tokio::test]
    async fn test_oldest_within_skips_aged_entries() {
        tokio::time::pause();

        let mut window = RequestWindow::new(Duration::from_secs(120));
        let first = Instant::now();
        window.push(first);

        tokio::time::advance(Duration::from_millis(1500)).await;
        let second = Instant::now();
        window.push(second);

        let now = Instant::now();
        assert_eq!(window.oldest_within(now, Duration::from_secs(1)), Some(second));
        assert_eq!(window.oldest_within(now, Duration::from_secs(120)), Some(first));
    }

    #[tokio::test]
    async fn test_get_indexes_from_oldest() {
        tokio::time::pause();

        let mut window = RequestWindow::new(Duration::from_secs(120));
        let first = Instant::now();
        window.push(first);

        tokio::time::advance(Duration::from_secs(1)).await;
        let second = Instant::now();
        window.push(second);

        assert_eq!(window.get(0), Some(first));
        assert_eq!(window.get(1), Some(second));
        assert_eq!(window.get(2), None);
    }
}
