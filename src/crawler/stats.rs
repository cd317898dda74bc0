//! Collection counters
//!
//! Incremented concurrently by every unit of work and read only for progress
//! reporting and the final summary.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared processed/error/skipped counters
#[derive(Debug, Default)]
pub struct CollectionStats {
    processed: AtomicU64,
    errors: AtomicU64,
    skipped: AtomicU64,
}

impl CollectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a kept record and returns the new processed count
    pub fn record_processed(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_error(&self) -> u64 {
        self.errors.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_skipped(&self) -> u64 {
        self.skipped.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Reads all three counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CollectionStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub processed: u64,
    pub errors: u64,
    pub skipped: u64,
}

impl StatsSnapshot {
    /// Units that reached a verdict
    pub fn total(&self) -> u64 {
        self.processed + self.errors + self.skipped
    }

    /// `processed / (processed + errors)` as a percentage; 0 when nothing was fetched
    pub fn success_rate(&self) -> f64 {
        let attempted = self.processed + self.errors;
        if attempted > 0 {
            (self.processed as f64 / attempted as f64) * 100.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_increment_independently() {
        let stats = CollectionStats::new();
        assert_eq!(stats.record_processed(), 1);
        assert_eq!(stats.record_processed(), 2);
        assert_eq!(stats.record_error(), 1);
        assert_eq!(stats.record_skipped(), 1);

        let snapshot = stats.snapshot();
        assert_eq!(
            snapshot,
            StatsSnapshot {
                processed: 2,
                errors: 1,
                skipped: 1
            }
        );
        assert_eq!(snapshot.total(), 4);
    }

    #[test]
    fn test_success_rate() {
        let snapshot = StatsSnapshot {
            processed: 3,
            errors: 1,
            skipped: 10,
        };
        assert!((snapshot.success_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(StatsSnapshot::default().success_rate(), 0.0);
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = Arc::new(CollectionStats::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_processed();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot().processed, 8000);
    }
}
