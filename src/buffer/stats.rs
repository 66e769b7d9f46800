//! Buffer pool statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by the buffer pool.
///
/// Atomics with `Relaxed` ordering: each counter only needs to be exact on
/// its own, not consistent with the others.
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub evictions: AtomicU64,
    pub pages_read: AtomicU64,
    pub pages_written: AtomicU64,
    /// Pages handed out by `new_page`.
    pub pages_allocated: AtomicU64,
    /// Pages returned through `free_page`.
    pub pages_freed: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Non-atomic copy for display and assertions.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
            pages_freed: self.pages_freed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`BufferPoolStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_allocated: u64,
    pub pages_freed: u64,
}

impl StatsSnapshot {
    /// Cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Pages allocated and not yet freed since the pool was created.
    pub fn live_pages(&self) -> i64 {
        self.pages_allocated as i64 - self.pages_freed as i64
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, allocated: {}, freed: {}, hit_rate: {:.2}% }}",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_allocated,
            self.pages_freed,
            self.hit_rate() * 100.0
        )
    }
}
