//! Timeline segmentation.
//!
//! Decides, for every recorded sample, whether it extends the current
//! timeline item or closes it and starts a new one.
//!
//! Design: decision table + mutation step
//! - `decide` is a pure match over {current item kind, sample movement}
//! - `process` carries the decision out against the chain, inside the
//!   store's mutation scope
//! - Superseded items are never reopened
//!
//! Moving-to-moving is the only subtle transition. A change of activity type
//! normally closes the path, except when both the path's last sample and the
//! new sample are faster than the mode-shift speed: at those speeds the
//! classifier flip-flopping between e.g. car and train is noise, not a real
//! change of transport.

use tracing::debug;

use crate::config::RecorderConfig;
use crate::item_factory;
use crate::store::Timeline;
use crate::timeline::{ItemId, ItemKind, TimelineItem};
use crate::types::{Sample, SampleId};

/// Configuration for timeline segmentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationConfig {
    /// Speed (m/s) both edge samples must exceed for an activity type
    /// change to be ignored.
    pub mode_shift_speed_mps: f64,

    /// Non-active samples a visit may retain while in low-power sampling.
    pub sleep_sample_retention: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            mode_shift_speed_mps: 13.9,
            sleep_sample_retention: 10,
        }
    }
}

impl From<&RecorderConfig> for SegmentationConfig {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            mode_shift_speed_mps: config.mode_shift_speed_mps,
            sleep_sample_retention: config.sleep_sample_retention,
        }
    }
}

/// Why a new item was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// There was no current item.
    FirstItem,
    /// The current item is a data gap; anything after a gap starts fresh.
    AfterDataGap,
    /// Visit followed by a moving sample.
    StartedMoving,
    /// Path followed by a stationary sample.
    StoppedMoving,
    /// Path followed by a moving sample of a different activity type.
    ActivityChanged,
}

/// Why a sample was not recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The sample is already part of the current item.
    Duplicate,
    /// The sample is older than the end of the current item.
    OutOfOrder,
}

/// What segmentation did with a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentAction {
    /// Sample appended to the current item, after evicting `evicted`.
    Appended {
        item_id: ItemId,
        evicted: Vec<SampleId>,
    },
    /// Current item closed; a new item seeded by the sample is now current.
    Created {
        item_id: ItemId,
        previous_item_id: Option<ItemId>,
        reason: CloseReason,
    },
    /// Sample dropped without touching the chain.
    Ignored { reason: IgnoreReason },
}

impl SegmentAction {
    /// Item the sample ended up in, if any.
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            SegmentAction::Appended { item_id, .. } | SegmentAction::Created { item_id, .. } => {
                Some(*item_id)
            }
            SegmentAction::Ignored { .. } => None,
        }
    }
}

/// Outcome of the decision table, before it touches the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Append,
    Close(CloseReason),
    Ignore(IgnoreReason),
}

/// Timeline segmentation state machine.
///
/// The state itself lives in the chain (the current item's kind); this
/// struct carries configuration and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct SegmentationEngine {
    config: SegmentationConfig,

    // Diagnostics
    total_samples: u64,
    items_created: u64,
    samples_evicted: u64,
    samples_ignored: u64,
}

impl SegmentationEngine {
    pub fn new(config: SegmentationConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Process one sample against the current item.
    ///
    /// Must run inside the store's mutation scope.
    pub fn process(&mut self, timeline: &mut Timeline, sample: Sample) -> SegmentAction {
        self.total_samples += 1;

        match self.decide(timeline.current_item(), &sample) {
            Decision::Ignore(reason) => {
                self.samples_ignored += 1;
                debug!(sample_id = ?sample.id, timestamp_ms = sample.timestamp_ms, ?reason, "sample ignored");
                SegmentAction::Ignored { reason }
            }
            Decision::Close(reason) => self.close_and_create(timeline, sample, reason),
            Decision::Append => self.append(timeline, sample),
        }
    }

    fn decide(&self, current: Option<&TimelineItem>, sample: &Sample) -> Decision {
        let Some(current) = current else {
            return Decision::Close(CloseReason::FirstItem);
        };

        // Samples are time ordered, so a repeat that is not older than the
        // end can only sit in the trailing run sharing the end timestamp.
        let is_duplicate = current
            .samples()
            .iter()
            .rev()
            .take_while(|s| s.timestamp_ms == sample.timestamp_ms)
            .any(|s| s.id == sample.id);
        if is_duplicate {
            return Decision::Ignore(IgnoreReason::Duplicate);
        }
        if current.end_ms().is_some_and(|end| sample.timestamp_ms < end) {
            return Decision::Ignore(IgnoreReason::OutOfOrder);
        }

        match (current.kind, sample.is_stationary()) {
            (ItemKind::DataGap, _) => Decision::Close(CloseReason::AfterDataGap),
            (ItemKind::Path, true) => Decision::Close(CloseReason::StoppedMoving),
            (ItemKind::Visit, false) => Decision::Close(CloseReason::StartedMoving),
            (ItemKind::Visit, true) => Decision::Append,
            (ItemKind::Path, false) => {
                if sample.effective_activity_type() == current.moving_activity_type()
                    || self.above_mode_shift_speed(current, sample)
                {
                    Decision::Append
                } else {
                    Decision::Close(CloseReason::ActivityChanged)
                }
            }
        }
    }

    /// Both the path's last sample and the new sample move faster than the
    /// mode-shift speed. Missing speeds never qualify.
    fn above_mode_shift_speed(&self, path: &TimelineItem, sample: &Sample) -> bool {
        let threshold = self.config.mode_shift_speed_mps;
        match (path.last_sample().and_then(Sample::speed), sample.speed()) {
            (Some(edge_speed), Some(sample_speed)) => edge_speed > threshold && sample_speed > threshold,
            _ => false,
        }
    }

    fn close_and_create(&mut self, timeline: &mut Timeline, sample: Sample, reason: CloseReason) -> SegmentAction {
        let previous_item_id = timeline.current_item_id();
        let item_id = item_factory::create_item(timeline, sample);
        if let Some(previous) = previous_item_id {
            timeline.link(previous, item_id);
        }
        self.items_created += 1;

        debug!(item_id = %item_id, ?previous_item_id, ?reason, "closed current item");
        SegmentAction::Created {
            item_id,
            previous_item_id,
            reason,
        }
    }

    fn append(&mut self, timeline: &mut Timeline, sample: Sample) -> SegmentAction {
        let Some(item_id) = timeline.current_item_id() else {
            // decide() only appends when there is a current item
            return self.close_and_create(timeline, sample, CloseReason::FirstItem);
        };

        let evicted = if sample.recording_state.is_active() {
            Vec::new()
        } else {
            self.enforce_sleep_retention(timeline, item_id)
        };
        self.samples_evicted += evicted.len() as u64;

        timeline.append_sample(item_id, sample);
        if !evicted.is_empty() {
            debug!(item_id = %item_id, evicted = evicted.len(), "evicted low-power samples");
        }
        SegmentAction::Appended { item_id, evicted }
    }

    /// Make room for one more non-active sample in a visit, evicting the
    /// oldest non-active samples first.
    ///
    /// Keys on each sample's own recording-state tag. The recorder tags a
    /// sample with the subsystem's state when that state is not active, so
    /// the tag is never more active than the recorder was.
    fn enforce_sleep_retention(&self, timeline: &mut Timeline, item_id: ItemId) -> Vec<SampleId> {
        let Some(item) = timeline.item(item_id) else {
            return Vec::new();
        };
        if !item.is_visit() {
            return Vec::new();
        }

        let sleeping: Vec<SampleId> = item
            .samples()
            .iter()
            .filter(|s| !s.recording_state.is_active())
            .map(|s| s.id)
            .collect();

        let keep = self.config.sleep_sample_retention.saturating_sub(1);
        let excess = sleeping.len().saturating_sub(keep);

        sleeping
            .into_iter()
            .take(excess)
            .filter(|id| timeline.remove_sample(item_id, *id).is_some())
            .collect()
    }

    /// Total samples handed to `process`.
    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    /// Items created, including the first one.
    pub fn items_created(&self) -> u64 {
        self.items_created
    }

    pub fn samples_evicted(&self) -> u64 {
        self.samples_evicted
    }

    pub fn samples_ignored(&self) -> u64 {
        self.samples_ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityType, LocationFix, RawSample, RecordingState};

    fn sample(raw: RawSample) -> Sample {
        Sample::from_raw(raw)
    }

    fn moving_at(ts: u64, activity: ActivityType, speed: Option<f64>) -> Sample {
        let mut raw = RawSample::moving(ts).with_activity(activity);
        if let Some(speed) = speed {
            raw = raw.with_location(LocationFix::new(0.0, 0.0, 10.0, speed));
        }
        sample(raw)
    }

    fn sleeping_at(ts: u64) -> Sample {
        sample(RawSample::stationary(ts).with_recording_state(RecordingState::LowPower))
    }

    fn current(timeline: &Timeline) -> &TimelineItem {
        timeline.current_item().expect("current item")
    }

    #[test]
    fn test_segmentation_config_default() {
        let config = SegmentationConfig::default();
        assert_eq!(config.sleep_sample_retention, 10);
        assert!(config.mode_shift_speed_mps > 0.0);
    }

    #[test]
    fn test_first_sample_creates_item() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        let action = engine.process(&mut timeline, sample(RawSample::stationary(0)));
        assert!(matches!(
            action,
            SegmentAction::Created { reason: CloseReason::FirstItem, previous_item_id: None, .. }
        ));
        assert!(current(&timeline).is_visit());
        assert_eq!(engine.items_created(), 1);
    }

    #[test]
    fn test_stationary_then_moving_creates_linked_path() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        let visit = engine.process(&mut timeline, sample(RawSample::stationary(0))).item_id();
        let action = engine.process(&mut timeline, sample(RawSample::moving(10_000)));

        let path = action.item_id();
        assert!(matches!(action, SegmentAction::Created { reason: CloseReason::StartedMoving, .. }));
        assert!(current(&timeline).is_path());

        let visit_item = timeline.item(visit.expect("visit id")).expect("visit");
        assert_eq!(visit_item.next_item_id(), path);
        assert_eq!(visit_item.sample_count(), 1);
        assert_eq!(current(&timeline).previous_item_id(), visit);
        assert_eq!(current(&timeline).sample_count(), 1);
    }

    #[test]
    fn test_moving_then_stationary_creates_visit() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        engine.process(&mut timeline, sample(RawSample::moving(0)));
        let action = engine.process(&mut timeline, sample(RawSample::stationary(6_000)));

        assert!(matches!(action, SegmentAction::Created { reason: CloseReason::StoppedMoving, .. }));
        assert!(current(&timeline).is_visit());
    }

    #[test]
    fn test_stationary_samples_extend_visit() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        for ts in [0, 6_000, 12_000] {
            engine.process(&mut timeline, sample(RawSample::stationary(ts)));
        }

        assert_eq!(timeline.len(), 1);
        assert_eq!(current(&timeline).sample_count(), 3);
    }

    #[test]
    fn test_same_activity_extends_path() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        engine.process(&mut timeline, moving_at(0, ActivityType::Walking, Some(1.4)));
        let action = engine.process(&mut timeline, moving_at(6_000, ActivityType::Walking, Some(1.2)));

        assert!(matches!(action, SegmentAction::Appended { .. }));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_fast_activity_change_is_absorbed() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        engine.process(&mut timeline, moving_at(0, ActivityType::Car, Some(25.0)));
        let action = engine.process(&mut timeline, moving_at(6_000, ActivityType::Train, Some(27.0)));

        assert!(matches!(action, SegmentAction::Appended { .. }));
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_slow_activity_change_closes_path() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        engine.process(&mut timeline, moving_at(0, ActivityType::Car, Some(25.0)));
        let action = engine.process(&mut timeline, moving_at(6_000, ActivityType::Walking, Some(1.5)));

        assert!(matches!(action, SegmentAction::Created { reason: CloseReason::ActivityChanged, .. }));
        assert_eq!(timeline.len(), 2);
        assert!(current(&timeline).is_path());
    }

    #[test]
    fn test_threshold_speed_is_not_above_threshold() {
        let mut engine = SegmentationEngine::new(SegmentationConfig {
            mode_shift_speed_mps: 10.0,
            ..Default::default()
        });
        let mut timeline = Timeline::new();

        engine.process(&mut timeline, moving_at(0, ActivityType::Car, Some(10.0)));
        let action = engine.process(&mut timeline, moving_at(6_000, ActivityType::Bus, Some(30.0)));

        assert!(matches!(action, SegmentAction::Created { .. }));
    }

    #[test]
    fn test_missing_speed_falls_through_to_close() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        engine.process(&mut timeline, moving_at(0, ActivityType::Car, Some(30.0)));
        let action = engine.process(&mut timeline, moving_at(6_000, ActivityType::Train, None));
        assert!(matches!(action, SegmentAction::Created { .. }));

        // Negative speed means invalid, not slow
        let action = engine.process(&mut timeline, moving_at(12_000, ActivityType::Bus, Some(-1.0)));
        assert!(matches!(action, SegmentAction::Created { .. }));
        assert_eq!(timeline.len(), 3);
    }

    #[test]
    fn test_data_gap_is_always_closed() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();
        let gap = timeline.create_data_gap(sample(RawSample::gap_boundary(0)));

        let action = engine.process(&mut timeline, sample(RawSample::stationary(1_000)));
        assert!(matches!(
            action,
            SegmentAction::Created { reason: CloseReason::AfterDataGap, previous_item_id: Some(id), .. } if id == gap
        ));
        assert_eq!(timeline.item(gap).and_then(|i| i.next_item_id()), action.item_id());
    }

    #[test]
    fn test_low_power_retention_keeps_newest() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        engine.process(&mut timeline, sample(RawSample::stationary(0)));
        for i in 1..=25u64 {
            engine.process(&mut timeline, sleeping_at(i * 1_000));
        }

        let visit = current(&timeline);
        let sleeping: Vec<u64> = visit
            .samples()
            .iter()
            .filter(|s| !s.recording_state.is_active())
            .map(|s| s.timestamp_ms)
            .collect();

        assert_eq!(sleeping.len(), 10);
        assert_eq!(sleeping, (16..=25).map(|i| i * 1_000).collect::<Vec<_>>());
        // The active seed is never evicted
        assert_eq!(visit.start_ms(), Some(0));
        assert_eq!(engine.samples_evicted(), 15);
    }

    #[test]
    fn test_active_samples_are_not_capped() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        for i in 0..30u64 {
            engine.process(&mut timeline, sample(RawSample::stationary(i * 1_000)));
        }
        assert_eq!(current(&timeline).sample_count(), 30);
        assert_eq!(engine.samples_evicted(), 0);
    }

    #[test]
    fn test_duplicate_and_out_of_order_are_ignored() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        let first = sample(RawSample::stationary(10_000));
        engine.process(&mut timeline, first.clone());

        let action = engine.process(&mut timeline, first);
        assert_eq!(action, SegmentAction::Ignored { reason: IgnoreReason::Duplicate });

        let action = engine.process(&mut timeline, sample(RawSample::moving(5_000)));
        assert_eq!(action, SegmentAction::Ignored { reason: IgnoreReason::OutOfOrder });

        assert_eq!(timeline.len(), 1);
        assert_eq!(current(&timeline).sample_count(), 1);
        assert_eq!(engine.samples_ignored(), 2);
        assert_eq!(engine.total_samples(), 3);
    }

    #[test]
    fn test_duplicate_found_among_samples_sharing_end_timestamp() {
        let mut engine = SegmentationEngine::default();
        let mut timeline = Timeline::new();

        for i in 0..1_000u64 {
            engine.process(&mut timeline, sample(RawSample::stationary(i * 1_000)));
        }
        let tied = sample(RawSample::stationary(1_000_000));
        engine.process(&mut timeline, tied.clone());
        engine.process(&mut timeline, sample(RawSample::stationary(1_000_000)));

        // Not the last sample, but tied with it
        let action = engine.process(&mut timeline, tied);
        assert_eq!(action, SegmentAction::Ignored { reason: IgnoreReason::Duplicate });

        // A repeat of an older sample is caught by its timestamp
        let oldest = current(&timeline).samples()[0].clone();
        let action = engine.process(&mut timeline, oldest);
        assert_eq!(action, SegmentAction::Ignored { reason: IgnoreReason::OutOfOrder });

        assert_eq!(current(&timeline).sample_count(), 1_002);
    }
}
