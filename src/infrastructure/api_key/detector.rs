//! Suspicious activity detection
//!
//! Sliding window count of authentication failures per key prefix. State is
//! process-local and starts empty on every restart; the audit log is the
//! durable record.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

/// Per-prefix failure window
#[derive(Debug)]
pub struct SuspiciousActivityDetector {
    failures: DashMap<String, VecDeque<DateTime<Utc>>>,
    threshold: usize,
    window: Duration,
}

impl SuspiciousActivityDetector {
    pub const DEFAULT_THRESHOLD: usize = 5;
    pub const DEFAULT_WINDOW_SECS: i64 = 15 * 60;

    pub fn new(threshold: usize, window: Duration) -> Self {
        Self {
            failures: DashMap::new(),
            threshold,
            window,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record one failed attempt for `prefix` at `now`
    pub fn record_failure(&self, prefix: &str, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        let mut entry = self.failures.entry(prefix.to_string()).or_default();

        // Callers race to this point, so keep the sequence ordered
        let position = entry.partition_point(|at| *at <= now);
        entry.insert(position, now);

        prune(&mut entry, cutoff);
    }

    /// Whether `prefix` has reached the failure threshold within the window
    pub fn is_suspicious(&self, prefix: &str, now: DateTime<Utc>) -> bool {
        self.failure_count(prefix, now) >= self.threshold
    }

    /// Number of failures for `prefix` inside the window ending at `now`
    pub fn failure_count(&self, prefix: &str, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;

        match self.failures.get_mut(prefix) {
            Some(mut entry) => {
                prune(&mut entry, cutoff);
                entry.len()
            }
            None => 0,
        }
    }

    /// Forget every failure recorded for `prefix`. Returns how many were dropped.
    pub fn reset(&self, prefix: &str) -> usize {
        self.failures
            .remove(prefix)
            .map(|(_, failures)| failures.len())
            .unwrap_or(0)
    }

    /// Drop prefixes whose failures have all aged out. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.window;
        let before = self.failures.len();

        self.failures.retain(|_, entry| {
            prune(entry, cutoff);
            !entry.is_empty()
        });

        before.saturating_sub(self.failures.len())
    }

    /// Number of prefixes currently tracked
    pub fn tracked_prefixes(&self) -> usize {
        self.failures.len()
    }
}

impl Default for SuspiciousActivityDetector {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_THRESHOLD,
            Duration::seconds(Self::DEFAULT_WINDOW_SECS),
        )
    }
}

fn prune(entries: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
    while entries.front().is_some_and(|at| *at <= cutoff) {
        entries.pop_front();
    }
}
