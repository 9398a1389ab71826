//! Interval-based progress logging.

use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts processed items and logs a line each time the count passes a multiple of the
/// interval. Shareable between threads.
///
/// # Example
/// ```
/// use umiec_lib::progress::ProgressTracker;
///
/// let tracker = ProgressTracker::new("Loaded reads").with_interval(100);
/// for _ in 0..250 {
///     tracker.add(1); // logs at 100 and 200
/// }
/// tracker.finish(); // logs "Loaded reads 250 (complete)"
/// ```
pub struct ProgressTracker {
    interval: u64,
    message: String,
    count: AtomicU64,
}

impl ProgressTracker {
    /// Creates a tracker with an interval of 100,000.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { interval: 100_000, message: message.into(), count: AtomicU64::new(0) }
    }

    /// Sets the logging interval; zero is treated as one.
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Adds `n` items, logging every interval boundary crossed.
    ///
    /// Returns true if the new count sits exactly on a boundary.
    pub fn add(&self, n: u64) -> bool {
        let before = self.count.fetch_add(n, Ordering::Relaxed);
        let after = before + n;
        for milestone in (before / self.interval + 1)..=(after / self.interval) {
            info!("{} {}", self.message, milestone * self.interval);
        }
        after > 0 && after % self.interval == 0
    }

    /// Logs the final count unless the last boundary already reported it.
    pub fn finish(&self) {
        let count = self.count();
        if count > 0 && count % self.interval != 0 {
            info!("{} {} (complete)", self.message, count);
        }
    }

    /// The current count.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}
