//! Acquisition loop counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct LoopMetrics {
    /// Buffers evaluated
    cycles: AtomicU64,
    /// Polls that returned no buffer
    empty_polls: AtomicU64,
    /// Cycle records sent to the consumer
    published: AtomicU64,
    /// Playback files loaded after the first
    playback_reloads: AtomicU64,
    /// Settings snapshots applied
    settings_updates: AtomicU64,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_empty_poll(&self) {
        self.empty_polls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_playback_reload(&self) {
        self.playback_reloads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_settings_update(&self) {
        self.settings_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LoopMetricsSnapshot {
        LoopMetricsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            playback_reloads: self.playback_reloads.load(Ordering::Relaxed),
            settings_updates: self.settings_updates.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.cycles.store(0, Ordering::Relaxed);
        self.empty_polls.store(0, Ordering::Relaxed);
        self.published.store(0, Ordering::Relaxed);
        self.playback_reloads.store(0, Ordering::Relaxed);
        self.settings_updates.store(0, Ordering::Relaxed);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopMetricsSnapshot {
    pub cycles: u64,
    pub empty_polls: u64,
    pub published: u64,
    pub playback_reloads: u64,
    pub settings_updates: u64,
}
