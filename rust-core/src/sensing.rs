//! Collaborator interfaces: sensing subsystem, classifier and clock.
//!
//! The recorder is handed these at construction instead of reaching for
//! process-wide singletons. Inbound lifecycle notifications from the sensing
//! subsystem arrive as [`SensingSignal`] values on a queue.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::types::{ClassifierResults, RawSample, RecordingState, Sample};

/// The physical sampling layer.
///
/// All commands are fire-and-forget: implementations must not block the
/// caller waiting for the hardware to react.
pub trait SensingSubsystem: Send + Sync {
    fn recording_state(&self) -> RecordingState;

    fn start_recording(&self);

    fn stop_recording(&self);

    /// Whether the subsystem may drop to low-power sampling while the
    /// device is stationary.
    fn set_prefer_low_power_while_stationary(&self, prefer: bool);

    /// Length of one low-power sleep cycle in milliseconds. Also the
    /// shortest unmonitored interval worth representing as a data gap.
    fn sleep_cycle_duration_ms(&self) -> u64;
}

/// Activity classifier.
pub trait Classifier: Send + Sync {
    /// Classify a sample. `None` means no classification was possible.
    fn classify(&self, sample: &Sample, filtered: bool) -> Option<ClassifierResults>;
}

/// Source of wall-clock time in Unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Manually driven clock for replays and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Notifications emitted by the sensing subsystem.
#[derive(Debug, Clone, PartialEq)]
pub enum SensingSignal {
    /// A new sample is available.
    SampleReady(RawSample),
    /// The subsystem is about to drop into low-power sampling.
    WillEnterLowPower,
    /// The subsystem's recording state changed.
    RecordingStateChanged(RecordingState),
}
