//! In-crate fakes for the recorder's collaborators.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::sensing::{Classifier, Clock, SensingSubsystem};
use crate::store::{MemoryStore, TimelineStore};
use crate::timeline::ItemId;
use crate::types::{ActivityType, ClassifierResults, ClassifierScore, RecordingState, Sample};

pub const TEST_SLEEP_CYCLE_MS: u64 = 60_000;

/// Sensing subsystem that records every command it receives.
///
/// `start_recording` switches straight to active, `stop_recording` to off.
#[derive(Debug)]
pub struct FakeSensing {
    state: Mutex<RecordingState>,
    prefer_low_power: Mutex<Option<bool>>,
    sleep_cycle_ms: u64,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    preference_calls: AtomicUsize,
}

impl FakeSensing {
    pub fn new(state: RecordingState) -> Self {
        Self {
            state: Mutex::new(state),
            prefer_low_power: Mutex::new(None),
            sleep_cycle_ms: TEST_SLEEP_CYCLE_MS,
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            preference_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_state(&self, state: RecordingState) {
        *self.state.lock().unwrap() = state;
    }

    pub fn prefer_low_power(&self) -> Option<bool> {
        *self.prefer_low_power.lock().unwrap()
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn preference_calls(&self) -> usize {
        self.preference_calls.load(Ordering::SeqCst)
    }
}

impl SensingSubsystem for FakeSensing {
    fn recording_state(&self) -> RecordingState {
        *self.state.lock().unwrap()
    }

    fn start_recording(&self) {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        self.set_state(RecordingState::Active);
    }

    fn stop_recording(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.set_state(RecordingState::Off);
    }

    fn set_prefer_low_power_while_stationary(&self, prefer: bool) {
        self.preference_calls.fetch_add(1, Ordering::SeqCst);
        *self.prefer_low_power.lock().unwrap() = Some(prefer);
    }

    fn sleep_cycle_duration_ms(&self) -> u64 {
        self.sleep_cycle_ms
    }
}

/// Sensing subsystem that reads the store from inside its callbacks, the
/// way a host that inspects the timeline on every command would.
///
/// Records the current item id it sees on every preference call and every
/// forced start.
#[derive(Debug)]
pub struct ChainObservingSensing {
    pub inner: FakeSensing,
    store: Mutex<Option<Arc<MemoryStore>>>,
    seen: Mutex<Vec<Option<ItemId>>>,
}

impl ChainObservingSensing {
    pub fn new(state: RecordingState) -> Self {
        Self {
            inner: FakeSensing::new(state),
            store: Mutex::new(None),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn observe(&self, store: Arc<MemoryStore>) {
        *self.store.lock().unwrap() = Some(store);
    }

    /// Current item ids seen, one per callback, in call order.
    pub fn seen(&self) -> Vec<Option<ItemId>> {
        self.seen.lock().unwrap().clone()
    }

    fn look(&self) {
        let store = self.store.lock().unwrap().clone();
        if let Some(store) = store {
            let current = store.read(|timeline| timeline.current_item_id());
            self.seen.lock().unwrap().push(current);
        }
    }
}

impl SensingSubsystem for ChainObservingSensing {
    fn recording_state(&self) -> RecordingState {
        self.inner.recording_state()
    }

    fn start_recording(&self) {
        self.look();
        self.inner.start_recording();
    }

    fn stop_recording(&self) {
        self.inner.stop_recording();
    }

    fn set_prefer_low_power_while_stationary(&self, prefer: bool) {
        self.look();
        self.inner.set_prefer_low_power_while_stationary(prefer);
    }

    fn sleep_cycle_duration_ms(&self) -> u64 {
        self.inner.sleep_cycle_duration_ms()
    }
}

/// Classifier that answers with one fixed activity type.
#[derive(Debug)]
pub struct FixedClassifier {
    pub activity_type: ActivityType,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Classifier for FixedClassifier {
    fn classify(&self, _sample: &Sample, filtered: bool) -> Option<ClassifierResults> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let score = if filtered { 0.9 } else { 0.6 };
        Some(ClassifierResults::new(vec![ClassifierScore {
            activity_type: self.activity_type,
            score,
        }]))
    }
}

/// Clock that moves forward by a fixed step every time it is read.
#[derive(Debug)]
pub struct SteppingClock {
    next_ms: AtomicU64,
    step_ms: u64,
}

impl SteppingClock {
    pub fn new(start_ms: u64, step_ms: u64) -> Self {
        Self {
            next_ms: AtomicU64::new(start_ms),
            step_ms,
        }
    }
}

impl Clock for SteppingClock {
    fn now_ms(&self) -> u64 {
        self.next_ms.fetch_add(self.step_ms, Ordering::SeqCst)
    }
}
