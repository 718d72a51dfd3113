//! Process-wide counters: the only mutable state shared between
//! requests besides the store and cache pools.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    pub routes_total: AtomicU64,
    pub routes_failed: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_route_attempt(&self) {
        self.routes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_route_failure(&self) {
        self.routes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            routes_total: self.routes_total.load(Ordering::Relaxed),
            routes_failed: self.routes_failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub routes_total: u64,
    pub routes_failed: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}
