//! Lock-free run statistics the orchestrator and drivers report into.
//!
//! Atomic counters with a snapshot method, updated from worker context
//! without locking and read back once a run completes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Typed events drivers emit; the engine never inspects its own counters
/// directly, only through this event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsEvent {
    PageSuccess,
    PageError,
    PageSkipped,
    Blocked,
    EntriesAdded(u64),
}

#[derive(Debug, Default)]
pub struct Stats {
    page_success: AtomicU64,
    page_error: AtomicU64,
    page_skipped: AtomicU64,
    blocked: AtomicU64,
    entries_added: AtomicU64,
}

impl Stats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: StatsEvent) {
        match event {
            StatsEvent::PageSuccess => self.page_success.fetch_add(1, Ordering::Relaxed),
            StatsEvent::PageError => self.page_error.fetch_add(1, Ordering::Relaxed),
            StatsEvent::PageSkipped => self.page_skipped.fetch_add(1, Ordering::Relaxed),
            StatsEvent::Blocked => self.blocked.fetch_add(1, Ordering::Relaxed),
            StatsEvent::EntriesAdded(n) => self.entries_added.fetch_add(n, Ordering::Relaxed),
        };
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            page_success: self.page_success.load(Ordering::Relaxed),
            page_error: self.page_error.load(Ordering::Relaxed),
            page_skipped: self.page_skipped.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            entries_added: self.entries_added.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub page_success: u64,
    pub page_error: u64,
    pub page_skipped: u64,
    pub blocked: u64,
    pub entries_added: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let stats = Stats::new();
        stats.record(StatsEvent::PageSuccess);
        stats.record(StatsEvent::PageSuccess);
        stats.record(StatsEvent::Blocked);
        stats.record(StatsEvent::EntriesAdded(5));

        let snap = stats.snapshot();
        assert_eq!(snap.page_success, 2);
        assert_eq!(snap.blocked, 1);
        assert_eq!(snap.entries_added, 5);
        assert_eq!(snap.page_error, 0);
    }
}
