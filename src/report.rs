//! Pipeline statistics and periodic reporting

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::info;

/// Shared counters for the whole pipeline. Plain relaxed atomics: the
/// numbers feed logs and calibration, nothing load-bearing reads them.
#[derive(Debug)]
pub struct PipelineStats {
    start_time: Instant,
    pub pairs_scanned: AtomicU64,
    pub candidates_emitted: AtomicU64,
    pub candidates_dropped: AtomicU64,
    pub forced_rechecks: AtomicU64,
    pub requotes_completed: AtomicU64,
    pub requote_failures: AtomicU64,
    pub stale_drops: AtomicU64,
    pub confirmed: AtomicU64,
    pub recovered: AtomicU64,
    pub false_positives: AtomicU64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            pairs_scanned: AtomicU64::new(0),
            candidates_emitted: AtomicU64::new(0),
            candidates_dropped: AtomicU64::new(0),
            forced_rechecks: AtomicU64::new(0),
            requotes_completed: AtomicU64::new(0),
            requote_failures: AtomicU64::new(0),
            stale_drops: AtomicU64::new(0),
            confirmed: AtomicU64::new(0),
            recovered: AtomicU64::new(0),
            false_positives: AtomicU64::new(0),
        }
    }

    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_minutes(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64() / 60.0
    }

    /// Stage-1 precision so far: confirmed / (confirmed + false positives).
    pub fn confirmation_rate(&self) -> Option<f64> {
        let confirmed = self.confirmed.load(Ordering::Relaxed);
        let false_positives = self.false_positives.load(Ordering::Relaxed);
        let total = confirmed + false_positives;
        if total == 0 {
            None
        } else {
            Some(confirmed as f64 / total as f64 * 100.0)
        }
    }

    pub fn print_summary(&self) {
        let scanned = self.pairs_scanned.load(Ordering::Relaxed);
        let emitted = self.candidates_emitted.load(Ordering::Relaxed);
        let dropped = self.candidates_dropped.load(Ordering::Relaxed);

        info!("📊 Pipeline statistics:");
        info!("   Uptime: {:.1} min", self.uptime_minutes());
        info!("   Pairs scanned: {}", scanned);
        info!("   Candidates: {} emitted, {} dropped on backpressure", emitted, dropped);

        let forced = self.forced_rechecks.load(Ordering::Relaxed);
        if forced > 0 {
            info!("   Forced rechecks: {}", forced);
        }

        info!(
            "   Re-quotes: {} completed, {} failed, {} stale",
            self.requotes_completed.load(Ordering::Relaxed),
            self.requote_failures.load(Ordering::Relaxed),
            self.stale_drops.load(Ordering::Relaxed),
        );
        info!(
            "   Decisions: {} confirmed, {} recovered, {} false positives",
            self.confirmed.load(Ordering::Relaxed),
            self.recovered.load(Ordering::Relaxed),
            self.false_positives.load(Ordering::Relaxed),
        );
        if let Some(rate) = self.confirmation_rate() {
            info!("   Stage-1 precision: {:.1}%", rate);
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_rate_needs_decisions() {
        let stats = PipelineStats::new();
        assert!(stats.confirmation_rate().is_none());

        PipelineStats::bump(&stats.confirmed);
        PipelineStats::bump(&stats.confirmed);
        PipelineStats::bump(&stats.confirmed);
        PipelineStats::bump(&stats.false_positives);
        let rate = stats.confirmation_rate().unwrap();
        assert!((rate - 75.0).abs() < f64::EPSILON);
    }
}
