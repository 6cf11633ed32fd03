//! Cadence throttle.
//!
//! Bounds how often sample-ready signals turn into recorded samples. Purely
//! time based: the content of the sample is never consulted, and a rejected
//! signal is simply dropped.

use tracing::trace;

/// Longest interval between admissions: one day.
pub const MAX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

/// Slowest supported target rate, one sample per [`MAX_INTERVAL_MS`].
pub const MIN_SAMPLES_PER_MINUTE: f64 = 60_000.0 / MAX_INTERVAL_MS as f64;

/// Admits at most one sample per `min_interval_ms`.
#[derive(Debug, Clone)]
pub struct CadenceThrottle {
    min_interval_ms: u64,
    last_recorded_ms: Option<u64>,
}

impl CadenceThrottle {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_recorded_ms: None,
        }
    }

    /// Throttle for a target rate in samples per minute.
    ///
    /// The interval is capped at [`MAX_INTERVAL_MS`]; zero, negative and
    /// non-finite rates get the cap too.
    pub fn from_rate(samples_per_minute: f64) -> Self {
        let interval_ms = 60_000.0 / samples_per_minute;
        if interval_ms.is_finite() && interval_ms >= 0.0 {
            Self::new((interval_ms.ceil() as u64).min(MAX_INTERVAL_MS))
        } else {
            Self::new(MAX_INTERVAL_MS)
        }
    }

    /// Admit a sample at `now_ms`, recording the admission time on success.
    ///
    /// A clock that steps backwards never admits before the interval has
    /// elapsed from the last admission.
    pub fn admit(&mut self, now_ms: u64) -> bool {
        if let Some(last) = self.last_recorded_ms {
            let elapsed = now_ms.saturating_sub(last);
            if now_ms < last || elapsed < self.min_interval_ms {
                trace!(now_ms, last, "sample throttled");
                return false;
            }
        }
        self.last_recorded_ms = Some(now_ms);
        true
    }

    /// Forget the last admission. The next call to `admit` always succeeds.
    pub fn reset(&mut self) {
        self.last_recorded_ms = None;
    }

    pub fn last_recorded_ms(&self) -> Option<u64> {
        self.last_recorded_ms
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }
}
