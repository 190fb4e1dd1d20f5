//! Global atomic counters for Hashwire observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a pipeline run).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations, no locking.
pub struct Metrics {
    provider_calls: AtomicU64,
    provider_failures: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    extraction_failures: AtomicU64,
    stages_completed: AtomicU64,
    stages_failed: AtomicU64,
    runs_started: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            provider_calls: AtomicU64::new(0),
            provider_failures: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            extraction_failures: AtomicU64::new(0),
            stages_completed: AtomicU64::new(0),
            stages_failed: AtomicU64::new(0),
            runs_started: AtomicU64::new(0),
        }
    }

    fn bump(counter: &AtomicU64, name: &'static str) {
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = name, "counter incremented");
    }

    pub fn inc_provider_calls(&self) {
        Self::bump(&self.provider_calls, "provider_calls");
    }

    /// Any rejected provider attempt: error, timeout or out-of-range value.
    pub fn inc_provider_failures(&self) {
        Self::bump(&self.provider_failures, "provider_failures");
    }

    pub fn inc_cache_hits(&self) {
        Self::bump(&self.cache_hits, "cache_hits");
    }

    pub fn inc_cache_misses(&self) {
        Self::bump(&self.cache_misses, "cache_misses");
    }

    pub fn inc_extraction_failures(&self) {
        Self::bump(&self.extraction_failures, "extraction_failures");
    }

    pub fn inc_stages_completed(&self) {
        Self::bump(&self.stages_completed, "stages_completed");
    }

    pub fn inc_stages_failed(&self) {
        Self::bump(&self.stages_failed, "stages_failed");
    }

    pub fn inc_runs_started(&self) {
        Self::bump(&self.runs_started, "runs_started");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a run, daemon shutdown)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            provider_calls = self.provider_calls(),
            provider_failures = self.provider_failures(),
            cache_hits = self.cache_hits(),
            cache_misses = self.cache_misses(),
            extraction_failures = self.extraction_failures(),
            stages_completed = self.stages_completed(),
            stages_failed = self.stages_failed(),
            runs_started = self.runs_started(),
        );
    }

    pub fn provider_calls(&self) -> u64 {
        self.provider_calls.load(Ordering::Relaxed)
    }

    pub fn provider_failures(&self) -> u64 {
        self.provider_failures.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    pub fn extraction_failures(&self) -> u64 {
        self.extraction_failures.load(Ordering::Relaxed)
    }

    pub fn stages_completed(&self) -> u64 {
        self.stages_completed.load(Ordering::Relaxed)
    }

    pub fn stages_failed(&self) -> u64 {
        self.stages_failed.load(Ordering::Relaxed)
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        for counter in [
            &self.provider_calls,
            &self.provider_failures,
            &self.cache_hits,
            &self.cache_misses,
            &self.extraction_failures,
            &self.stages_completed,
            &self.stages_failed,
            &self.runs_started,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        assert_eq!(m.provider_calls(), 0);
        m.inc_provider_calls();
        m.inc_provider_calls();
        assert_eq!(m.provider_calls(), 2);

        m.inc_cache_hits();
        assert_eq!(m.cache_hits(), 1);

        m.inc_stages_failed();
        m.inc_stages_failed();
        m.inc_stages_failed();
        assert_eq!(m.stages_failed(), 3);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_provider_failures();
        m.inc_cache_misses();
        m.inc_extraction_failures();
        m.inc_stages_completed();
        m.inc_runs_started();
        m.reset();
        assert_eq!(m.provider_failures(), 0);
        assert_eq!(m.cache_misses(), 0);
        assert_eq!(m.extraction_failures(), 0);
        assert_eq!(m.stages_completed(), 0);
        assert_eq!(m.runs_started(), 0);
    }
}
