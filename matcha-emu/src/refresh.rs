//! Refresh batching.
//!
//! Pushing every screen mutation straight to the views would melt the
//! display under high-volume output, so dirty regions accumulate
//! behind two deadlines: a short one giving low latency for sparse
//! interactive output, and a ceiling guaranteeing that a continuous
//! burst still repaints at a bounded interval. Whichever deadline
//! passes first flushes the batch and rearms both.
//!
//! There are no timer threads: the host event loop calls `poll` with
//! the current instant.

use std::time::{Duration, Instant};

use matcha_core::screen::Dirty;

/// Latency deadline restarted on every dirty mark.
pub const SHORT_DELAY: Duration = Duration::from_millis(10);
/// Throughput ceiling armed once per burst.
pub const LONG_DELAY: Duration = Duration::from_millis(40);

/// One flushed batch handed to the views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshBatch {
    pub dirty: Dirty,
    pub lines: usize,
    pub columns: usize,
}

#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    short_delay: Duration,
    long_delay: Duration,
    short_deadline: Option<Instant>,
    long_deadline: Option<Instant>,
    pending: Dirty,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::with_delays(SHORT_DELAY, LONG_DELAY)
    }

    pub fn with_delays(short_delay: Duration, long_delay: Duration) -> Self {
        RefreshCoordinator {
            short_delay,
            long_delay,
            short_deadline: None,
            long_deadline: None,
            pending: Dirty::default(),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_clean()
    }

    /// Accumulate a dirty region. The short deadline restarts; the
    /// ceiling arms only at the first mark of a burst.
    pub fn mark(&mut self, dirty: Dirty, now: Instant) {
        if dirty.is_clean() {
            return;
        }
        self.pending.merge(dirty);
        self.short_deadline = Some(now + self.short_delay);
        self.long_deadline.get_or_insert(now + self.long_delay);
    }

    /// The earliest instant at which `poll` would flush, if anything
    /// is pending. Hosts use this to schedule their next wakeup.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.short_deadline, self.long_deadline) {
            (Some(s), Some(l)) => Some(s.min(l)),
            (Some(s), None) => Some(s),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        }
    }

    /// Flush if either deadline has passed. Resets both deadlines and
    /// the dirty state atomically.
    pub fn poll(&mut self, now: Instant) -> Option<Dirty> {
        let due = self
            .next_deadline()
            .map(|deadline| now >= deadline)
            .unwrap_or(false);
        if due && self.has_pending() {
            Some(self.flush())
        } else {
            None
        }
    }

    /// Flush unconditionally (connect, resize).
    pub fn flush(&mut self) -> Dirty {
        self.short_deadline = None;
        self.long_deadline = None;
        std::mem::take(&mut self.pending)
    }
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
