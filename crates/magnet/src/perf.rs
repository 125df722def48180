// perf.rs - Timing instrumentation for the definition index
//
// Controlled via the MAGNET_PERF environment variable.
//
// Usage:
//   MAGNET_PERF=1 magnet --stdio        # log scan/query durations
//   MAGNET_PERF=verbose magnet --stdio  # also warn when a threshold is exceeded

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

static PERF_ENABLED: OnceLock<bool> = OnceLock::new();
static PERF_VERBOSE: OnceLock<bool> = OnceLock::new();

/// Check if performance timing is enabled
pub fn is_enabled() -> bool {
    *PERF_ENABLED.get_or_init(|| {
        std::env::var("MAGNET_PERF")
            .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
            .unwrap_or(false)
    })
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    *PERF_VERBOSE.get_or_init(|| {
        std::env::var("MAGNET_PERF")
            .map(|v| v.to_lowercase() == "verbose")
            .unwrap_or(false)
    })
}

/// RAII timing guard that logs duration on drop
///
/// ```
/// use magnet::perf::TimingGuard;
///
/// let _guard = TimingGuard::new("scan");
/// // ... do work ...
/// ```
pub struct TimingGuard {
    start: Instant,
    name: &'static str,
    threshold_warn_ms: Option<u64>,
    enabled: bool,
}

impl TimingGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            name,
            threshold_warn_ms: None,
            enabled: is_enabled(),
        }
    }

    /// Create a timing guard that warns (in verbose mode) past `threshold_ms`.
    pub fn with_threshold(name: &'static str, threshold_ms: u64) -> Self {
        Self {
            threshold_warn_ms: Some(threshold_ms),
            ..Self::new(name)
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Consume the guard without logging and return the duration.
    pub fn finish(self) -> Duration {
        let elapsed = self.start.elapsed();
        std::mem::forget(self);
        elapsed
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }

        let elapsed = self.start.elapsed();
        log::info!("[PERF] {} completed in {:?}", self.name, elapsed);

        if let Some(threshold) = self.threshold_warn_ms {
            if elapsed.as_millis() > threshold as u128 && is_verbose() {
                log::warn!(
                    "[PERF] {} exceeded threshold ({}ms > {}ms)",
                    self.name,
                    elapsed.as_millis(),
                    threshold
                );
            }
        }
    }
}

static SCANS: AtomicU64 = AtomicU64::new(0);
static DISCARDED_LOADS: AtomicU64 = AtomicU64::new(0);

/// Count one completed document scan.
pub fn record_scan() {
    SCANS.fetch_add(1, Ordering::Relaxed);
}

/// Count one load whose result was superseded before it landed.
pub fn record_discarded_load() {
    DISCARDED_LOADS.fetch_add(1, Ordering::Relaxed);
}

/// Snapshot of the process-wide counters: (scans, discarded loads).
pub fn counters() -> (u64, u64) {
    (
        SCANS.load(Ordering::Relaxed),
        DISCARDED_LOADS.load(Ordering::Relaxed),
    )
}

/// Log the counters when timing is enabled.
pub fn log_summary() {
    if !is_enabled() {
        return;
    }
    let (scans, discarded) = counters();
    log::info!("[PERF] {} scans, {} superseded loads discarded", scans, discarded);
}
