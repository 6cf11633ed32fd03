//! Timeline items: visits, paths and data gaps.
//!
//! A timeline item is a contiguous stretch of samples that share one
//! character. Items form a doubly linked chain by id; the chain itself is
//! owned by the store (see [`crate::store::Timeline`]).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ActivityType, Sample, SampleId};

/// Stable identity of a timeline item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub Uuid);

impl ItemId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Variant of a timeline item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Contiguous stationary dwell.
    Visit,
    /// Contiguous movement.
    Path,
    /// Placeholder for an interval with no recorded samples.
    DataGap,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Visit => "visit",
            ItemKind::Path => "path",
            ItemKind::DataGap => "data_gap",
        }
    }
}

/// Thresholds a Visit must meet to be worth keeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeeperThresholds {
    pub min_duration_ms: u64,
    pub min_samples: usize,
}

impl Default for KeeperThresholds {
    fn default() -> Self {
        Self {
            min_duration_ms: 120_000,
            min_samples: 2,
        }
    }
}

/// A visit, path or data gap and the samples it owns.
///
/// Samples are kept in insertion order, which is chronological order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: ItemId,
    pub kind: ItemKind,
    samples: Vec<Sample>,
    previous_item_id: Option<ItemId>,
    next_item_id: Option<ItemId>,
}

impl TimelineItem {
    /// Create an item seeded with its first sample.
    pub fn new(kind: ItemKind, seed: Sample) -> Self {
        Self {
            id: ItemId::new(),
            kind,
            samples: vec![seed],
            previous_item_id: None,
            next_item_id: None,
        }
    }

    pub fn is_visit(&self) -> bool {
        self.kind == ItemKind::Visit
    }

    pub fn is_path(&self) -> bool {
        self.kind == ItemKind::Path
    }

    pub fn is_data_gap(&self) -> bool {
        self.kind == ItemKind::DataGap
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn first_sample(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last_sample(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn start_ms(&self) -> Option<u64> {
        self.first_sample().map(|s| s.timestamp_ms)
    }

    pub fn end_ms(&self) -> Option<u64> {
        self.last_sample().map(|s| s.timestamp_ms)
    }

    /// Span between first and last sample, zero for a single sample.
    pub fn duration_ms(&self) -> u64 {
        match (self.start_ms(), self.end_ms()) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        }
    }

    pub fn previous_item_id(&self) -> Option<ItemId> {
        self.previous_item_id
    }

    pub fn next_item_id(&self) -> Option<ItemId> {
        self.next_item_id
    }

    pub(crate) fn set_previous_item_id(&mut self, id: Option<ItemId>) {
        self.previous_item_id = id;
    }

    pub(crate) fn set_next_item_id(&mut self, id: Option<ItemId>) {
        self.next_item_id = id;
    }

    /// Append a sample at the end of the item.
    pub(crate) fn add(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Remove a sample by id. Returns the removed sample.
    pub(crate) fn remove(&mut self, sample_id: SampleId) -> Option<Sample> {
        let index = self.samples.iter().position(|s| s.id == sample_id)?;
        Some(self.samples.remove(index))
    }

    /// Whether this item justifies low-power sampling while it is current.
    ///
    /// Only visits can be worth keeping in this sense.
    pub fn is_worth_keeping(&self, thresholds: &KeeperThresholds) -> bool {
        self.is_visit()
            && self.samples.len() >= thresholds.min_samples
            && self.duration_ms() >= thresholds.min_duration_ms
    }

    /// Dominant moving activity type of a path.
    ///
    /// Most frequent non-stationary effective activity type among the
    /// samples. Ties go to the type seen most recently. Always `None` for
    /// visits and data gaps.
    pub fn moving_activity_type(&self) -> Option<ActivityType> {
        if !self.is_path() {
            return None;
        }

        // type -> (count, index of latest occurrence)
        let mut tally: HashMap<ActivityType, (usize, usize)> = HashMap::new();
        for (index, sample) in self.samples.iter().enumerate() {
            if let Some(activity) = sample.effective_activity_type().filter(ActivityType::is_moving) {
                let entry = tally.entry(activity).or_insert((0, index));
                entry.0 += 1;
                entry.1 = index;
            }
        }

        tally
            .into_iter()
            .max_by_key(|(_, (count, latest))| (*count, *latest))
            .map(|(activity, _)| activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawSample;

    fn sample_at(ts: u64) -> Sample {
        Sample::from_raw(RawSample::stationary(ts))
    }

    fn moving_with(ts: u64, activity: ActivityType) -> Sample {
        Sample::from_raw(RawSample::moving(ts).with_activity(activity))
    }

    #[test]
    fn test_item_timestamps_follow_samples() {
        let mut visit = TimelineItem::new(ItemKind::Visit, sample_at(1_000));
        assert_eq!(visit.start_ms(), Some(1_000));
        assert_eq!(visit.end_ms(), Some(1_000));
        assert_eq!(visit.duration_ms(), 0);

        visit.add(sample_at(61_000));
        assert_eq!(visit.end_ms(), Some(61_000));
        assert_eq!(visit.duration_ms(), 60_000);
        assert_eq!(visit.sample_count(), 2);
    }

    #[test]
    fn test_remove_by_id() {
        let seed = sample_at(0);
        let seed_id = seed.id;
        let mut visit = TimelineItem::new(ItemKind::Visit, seed);
        visit.add(sample_at(10));

        let removed = visit.remove(seed_id).expect("seed should be removable");
        assert_eq!(removed.timestamp_ms, 0);
        assert_eq!(visit.start_ms(), Some(10));
        assert!(visit.remove(seed_id).is_none());
    }

    #[test]
    fn test_worth_keeping_requires_visit_and_thresholds() {
        let thresholds = KeeperThresholds::default();

        let mut visit = TimelineItem::new(ItemKind::Visit, sample_at(0));
        assert!(!visit.is_worth_keeping(&thresholds));

        visit.add(sample_at(119_999));
        assert!(!visit.is_worth_keeping(&thresholds));

        visit.add(sample_at(120_000));
        assert!(visit.is_worth_keeping(&thresholds));

        let mut path = TimelineItem::new(ItemKind::Path, sample_at(0));
        path.add(sample_at(500_000));
        assert!(!path.is_worth_keeping(&thresholds));
    }

    #[test]
    fn test_moving_activity_type_majority() {
        let mut path = TimelineItem::new(ItemKind::Path, moving_with(0, ActivityType::Walking));
        path.add(moving_with(1, ActivityType::Car));
        path.add(moving_with(2, ActivityType::Car));
        path.add(moving_with(3, ActivityType::Walking));
        path.add(moving_with(4, ActivityType::Car));

        assert_eq!(path.moving_activity_type(), Some(ActivityType::Car));
    }

    #[test]
    fn test_moving_activity_type_tie_goes_to_latest() {
        let mut path = TimelineItem::new(ItemKind::Path, moving_with(0, ActivityType::Bus));
        path.add(moving_with(1, ActivityType::Train));
        assert_eq!(path.moving_activity_type(), Some(ActivityType::Train));

        path.add(moving_with(2, ActivityType::Bus));
        assert_eq!(path.moving_activity_type(), Some(ActivityType::Bus));
    }

    #[test]
    fn test_moving_activity_type_ignores_stationary_and_untyped() {
        let mut path = TimelineItem::new(ItemKind::Path, Sample::from_raw(RawSample::moving(0)));
        assert_eq!(path.moving_activity_type(), None);

        path.add(moving_with(1, ActivityType::Stationary));
        assert_eq!(path.moving_activity_type(), None);

        path.add(moving_with(2, ActivityType::Cycling));
        assert_eq!(path.moving_activity_type(), Some(ActivityType::Cycling));

        let visit = TimelineItem::new(ItemKind::Visit, moving_with(0, ActivityType::Car));
        assert_eq!(visit.moving_activity_type(), None);
    }
}
