//! Consumer counters, updated lock-free by every worker.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct ConsumerStats {
    fetched: AtomicU64,
    fetch_errors: AtomicU64,
    duplicates_dropped: AtomicU64,
    delivered: AtomicU64,
    handler_failures: AtomicU64,
    expired_dropped: AtomicU64,
}

/// Point-in-time copy of [`ConsumerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConsumerStatsSnapshot {
    pub fetched: u64,
    pub fetch_errors: u64,
    pub duplicates_dropped: u64,
    /// Messages the handler accepted
    pub delivered: u64,
    pub handler_failures: u64,
    pub expired_dropped: u64,
}

impl ConsumerStats {
    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_error(&self) {
        self.fetch_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicates_dropped(&self, count: usize) {
        if count > 0 {
            self.duplicates_dropped
                .fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_failure(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired_dropped(&self) {
        self.expired_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ConsumerStatsSnapshot {
        ConsumerStatsSnapshot {
            fetched: self.fetched.load(Ordering::Relaxed),
            fetch_errors: self.fetch_errors.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            handler_failures: self.handler_failures.load(Ordering::Relaxed),
            expired_dropped: self.expired_dropped.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = ConsumerStats::default();
        stats.record_fetched();
        stats.record_fetched();
        stats.record_fetch_error();
        stats.record_duplicates_dropped(3);
        stats.record_duplicates_dropped(0);
        stats.record_delivered();
        stats.record_handler_failure();
        stats.record_expired_dropped();

        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot,
            ConsumerStatsSnapshot {
                fetched: 2,
                fetch_errors: 1,
                duplicates_dropped: 3,
                delivered: 1,
                handler_failures: 1,
                expired_dropped: 1,
            }
        );

        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["duplicates_dropped"], 3);
    }
}
