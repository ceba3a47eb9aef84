//! Activity log and poll metrics for the diagnostics snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Entries kept in the activity ring.
pub const ACTIVITY_CAPACITY: usize = 400;

/// Entries returned in a diagnostics snapshot.
pub const RECENT_ACTIVITY: usize = 12;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub at: DateTime<Utc>,
    pub kind: String,
    pub detail: String,
}

/// Bounded ring of recent scheduler activity. Oldest entries fall off.
pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(ACTIVITY_CAPACITY)
    }
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(ACTIVITY_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ActivityEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, kind: impl Into<String>, detail: impl Into<String>) {
        let mut entries = self.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(ActivityEntry {
            at: Utc::now(),
            kind: kind.into(),
            detail: detail.into(),
        });
    }

    /// The newest `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ActivityEntry> {
        let entries = self.lock();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Poll-loop counters
#[derive(Debug, Default)]
pub struct PollMetrics {
    /// Cycles that ran to completion (or failed their snapshot)
    pub cycles_run: AtomicU64,
    /// Timer triggers skipped because a cycle was in flight
    pub skipped_busy: AtomicU64,
    /// Timer triggers skipped by the minimum-interval guard
    pub skipped_interval: AtomicU64,
    /// Forced triggers that gave up waiting
    pub forced_timeouts: AtomicU64,
    /// Cycles aborted because the tab query failed
    pub cycle_errors: AtomicU64,

    pub tabs_opened: AtomicU64,
    pub tabs_closed: AtomicU64,
    pub open_failures: AtomicU64,
    pub close_failures: AtomicU64,

    /// Resolutions where no source reported anything
    pub empty_resolutions: AtomicU64,

    start_time: Option<Instant>,
}

impl PollMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn cycle_ran(&self) {
        self.cycles_run.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cycle_failed(&self) {
        self.cycle_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped_busy(&self) {
        self.skipped_busy.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped_interval(&self) {
        self.skipped_interval.fetch_add(1, Ordering::Relaxed);
    }

    pub fn forced_timeout(&self) {
        self.forced_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resolution_empty(&self) {
        self.empty_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tabs(&self, opened: usize, closed: usize, open_failures: usize, close_failures: usize) {
        self.tabs_opened.fetch_add(opened as u64, Ordering::Relaxed);
        self.tabs_closed.fetch_add(closed as u64, Ordering::Relaxed);
        self.open_failures
            .fetch_add(open_failures as u64, Ordering::Relaxed);
        self.close_failures
            .fetch_add(close_failures as u64, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            cycles: CycleMetrics {
                run: self.cycles_run.load(Ordering::Relaxed),
                skipped_busy: self.skipped_busy.load(Ordering::Relaxed),
                skipped_interval: self.skipped_interval.load(Ordering::Relaxed),
                forced_timeouts: self.forced_timeouts.load(Ordering::Relaxed),
                errors: self.cycle_errors.load(Ordering::Relaxed),
            },
            tabs: TabMetrics {
                opened: self.tabs_opened.load(Ordering::Relaxed),
                closed: self.tabs_closed.load(Ordering::Relaxed),
                open_failures: self.open_failures.load(Ordering::Relaxed),
                close_failures: self.close_failures.load(Ordering::Relaxed),
            },
            empty_resolutions: self.empty_resolutions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub cycles: CycleMetrics,
    pub tabs: TabMetrics,
    pub empty_resolutions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleMetrics {
    pub run: u64,
    pub skipped_busy: u64,
    pub skipped_interval: u64,
    pub forced_timeouts: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabMetrics {
    pub opened: u64,
    pub closed: u64,
    pub open_failures: u64,
    pub close_failures: u64,
}
