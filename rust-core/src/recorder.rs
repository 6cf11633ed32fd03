//! Timeline recorder: wires the throttle, gatekeeper, gap bridge and
//! segmentation engine to the store and the sensing subsystem.
//!
//! # Data flow
//!
//! 1. **Sample ready**: a signal arrives from the sensing subsystem
//! 2. **Throttle**: dropped unless the cadence interval has elapsed
//! 3. **Materialize**: the store creates the sample, tagged low power if
//!    the subsystem is; the classifier (if any) fills in filtered and
//!    unfiltered results
//! 4. **Gatekeeper**: low-power preference updated before the mutation, so
//!    it never lags the sample that justified it
//! 5. **Segmentation**: under the store's mutation scope
//! 6. **Events**: new-item / item-updated published
//! 7. **Gatekeeper**: evaluated again against the mutated chain
//!
//! The sensing subsystem is only ever called with the store unlocked, so
//! its callbacks may read the timeline.
//!
//! Signals are handled one at a time. [`TimelineRecorder::run`] drains a
//! queue of [`SensingSignal`]s in arrival order.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace};

use crate::cadence::CadenceThrottle;
use crate::config::RecorderConfig;
use crate::data_gap;
use crate::error::RecorderError;
use crate::events::{EventBus, ItemUpdate, TimelineEvent};
use crate::export::TimelineExport;
use crate::segmentation::{SegmentAction, SegmentationConfig, SegmentationEngine};
use crate::sensing::{Classifier, Clock, SensingSignal, SensingSubsystem, SystemClock};
use crate::sleep_mode::{SleepModeDecision, SleepModeGatekeeper};
use crate::store::TimelineStore;
use crate::timeline::{ItemId, TimelineItem};
use crate::types::{RawSample, RecordingState};

/// Incremental timeline recorder.
pub struct TimelineRecorder<S: TimelineStore> {
    store: Arc<S>,
    sensing: Arc<dyn SensingSubsystem>,
    classifier: Option<Arc<dyn Classifier>>,
    clock: Arc<dyn Clock>,
    config: RecorderConfig,

    // Stages
    throttle: CadenceThrottle,
    gatekeeper: SleepModeGatekeeper,
    segmentation: SegmentationEngine,

    events: EventBus,
}

impl<S: TimelineStore> TimelineRecorder<S> {
    /// Create a recorder over `store`, driving `sensing`.
    ///
    /// No classifier is attached and time comes from the wall clock; see
    /// [`with_classifier`](Self::with_classifier) and
    /// [`with_clock`](Self::with_clock).
    pub fn new(
        store: Arc<S>,
        sensing: Arc<dyn SensingSubsystem>,
        config: RecorderConfig,
    ) -> Result<Self, RecorderError> {
        config.validate()?;

        Ok(Self {
            throttle: CadenceThrottle::from_rate(config.samples_per_minute),
            gatekeeper: SleepModeGatekeeper::new(config.keeper_thresholds()),
            segmentation: SegmentationEngine::new(SegmentationConfig::from(&config)),
            events: EventBus::new(config.event_capacity),
            store,
            sensing,
            classifier: None,
            clock: Arc::new(SystemClock),
            config,
        })
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // =========================================================================
    // RECORDING LIFECYCLE
    // =========================================================================

    /// Start recording. Bridges any data gap since the last item first.
    ///
    /// Returns false if already recording.
    pub fn start_recording(&mut self) -> bool {
        if self.is_recording() {
            debug!("start_recording while already recording");
            return false;
        }

        let now_ms = self.clock.now_ms();
        let min_gap_ms = self.sensing.sleep_cycle_duration_ms();
        if let Some(gap) = data_gap::bridge_if_needed(self.store.as_ref(), now_ms, min_gap_ms) {
            self.publish_new_item(gap);
        }

        self.sensing.start_recording();
        info!(now_ms, "recording started");
        true
    }

    /// Stop recording. The chain is left as it is; the next start bridges
    /// the resulting gap. Returns false if not recording.
    pub fn stop_recording(&mut self) -> bool {
        if !self.is_recording() {
            debug!("stop_recording while not recording");
            return false;
        }

        self.sensing.stop_recording();
        self.throttle.reset();
        info!("recording stopped");
        true
    }

    /// Whether the sensing subsystem is recording in any mode.
    pub fn is_recording(&self) -> bool {
        self.sensing.recording_state() != RecordingState::Off
    }

    // =========================================================================
    // SIGNALS
    // =========================================================================

    /// Handle one signal from the sensing subsystem.
    pub fn handle_signal(&mut self, signal: SensingSignal) {
        match signal {
            SensingSignal::SampleReady(raw) => {
                self.sample_ready(raw);
            }
            SensingSignal::WillEnterLowPower => {
                if self.is_recording() {
                    self.update_sleep_preference();
                }
            }
            SensingSignal::RecordingStateChanged(state) => {
                debug!(?state, "recording state changed");
                if state.is_low_power() && self.is_recording() {
                    self.update_sleep_preference();
                }
            }
        }
    }

    /// Run a sample-ready signal through throttle, classification and
    /// segmentation.
    ///
    /// Returns what segmentation did, or `None` if the sample was dropped
    /// before reaching it.
    pub fn sample_ready(&mut self, raw: RawSample) -> Option<SegmentAction> {
        if !self.is_recording() {
            trace!(timestamp_ms = raw.timestamp_ms, "sample dropped: not recording");
            return None;
        }
        if !self.throttle.admit(self.clock.now_ms()) {
            return None;
        }

        let recording_state = self.sensing.recording_state();
        let mut sample = self.store.create_sample(raw);
        if !recording_state.is_active() && sample.recording_state.is_active() {
            sample.recording_state = recording_state;
        }
        if let Some(classifier) = &self.classifier {
            sample.classifier_results = classifier.classify(&sample, true);
            sample.unfiltered_classifier_results = classifier.classify(&sample, false);
        }

        self.update_sleep_preference();

        let segmentation = &mut self.segmentation;
        let action = self.store.process(|timeline| segmentation.process(timeline, sample));
        self.publish(&action);

        self.update_sleep_preference();
        Some(action)
    }

    /// Drain `signals` in arrival order until the sender side closes.
    pub async fn run(mut self, mut signals: mpsc::Receiver<SensingSignal>) -> Self {
        while let Some(signal) = signals.recv().await {
            self.handle_signal(signal);
        }
        debug!("signal queue closed");
        self
    }

    fn update_sleep_preference(&mut self) -> SleepModeDecision {
        let recording_state = self.sensing.recording_state();
        let gatekeeper = &self.gatekeeper;
        let allow = self
            .store
            .read(|timeline| gatekeeper.allows_low_power(timeline.current_item()));
        self.gatekeeper
            .apply_preference(allow, recording_state, self.sensing.as_ref())
    }

    // =========================================================================
    // EVENTS
    // =========================================================================

    fn publish(&self, action: &SegmentAction) {
        match action {
            SegmentAction::Created { item_id, .. } => self.publish_new_item(*item_id),
            SegmentAction::Appended { item_id, evicted } => {
                if self.events.subscriber_count() == 0 {
                    return;
                }
                let update = self
                    .store
                    .read(|timeline| timeline.item(*item_id).map(|item| ItemUpdate::new(item, evicted.clone())));
                if let Some(update) = update {
                    self.events.publish(TimelineEvent::TimelineItemUpdated(update));
                }
            }
            SegmentAction::Ignored { .. } => {}
        }
    }

    fn publish_new_item(&self, item_id: ItemId) {
        let wanted = self.events.subscriber_count() > 0;
        let snapshot = self
            .store
            .read(|timeline| timeline.item(item_id).map(|item| (item.kind, wanted.then(|| item.clone()))));
        let Some((kind, item)) = snapshot else {
            return;
        };

        info!(item_id = %item_id, kind = kind.as_str(), "new timeline item");
        if let Some(item) = item {
            self.events.publish(TimelineEvent::NewTimelineItem(item));
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Snapshot of the item currently open for appending.
    pub fn current_item(&self) -> Option<TimelineItem> {
        self.store.read(|timeline| timeline.current_item().cloned())
    }

    /// Snapshot of the current item, only if it is a visit.
    pub fn current_visit(&self) -> Option<TimelineItem> {
        self.store.read(|timeline| timeline.current_visit().cloned())
    }

    /// Export the whole chain as of now.
    pub fn export(&self) -> TimelineExport {
        let thresholds = self.config.keeper_thresholds();
        let now_ms = self.clock.now_ms();
        self.store
            .read(|timeline| TimelineExport::from_timeline(timeline, &thresholds, now_ms))
    }

    /// Subscribe to new-item and item-updated events.
    pub fn subscribe(&self) -> broadcast::Receiver<TimelineEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn segmentation(&self) -> &SegmentationEngine {
        &self.segmentation
    }

    pub fn gatekeeper(&self) -> &SleepModeGatekeeper {
        &self.gatekeeper
    }
}
