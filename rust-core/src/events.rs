//! Outward timeline events backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the recorder's publish side. Publishing never blocks and
//! never fails: with no subscribers the event is dropped, and a subscriber
//! that falls behind observes `RecvError::Lagged` instead of slowing the
//! recorder down.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::timeline::{ItemId, ItemKind, TimelineItem};
use crate::types::{Sample, SampleId};

/// Default buffer capacity for the broadcast channel.
pub const DEFAULT_CAPACITY: usize = 256;

/// A change to the timeline that downstream consumers may care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "item", rename_all = "snake_case")]
pub enum TimelineEvent {
    /// A new item became current. Carries a snapshot of the item.
    NewTimelineItem(TimelineItem),
    /// A sample was added to the current item.
    TimelineItemUpdated(ItemUpdate),
}

impl TimelineEvent {
    pub fn item_id(&self) -> ItemId {
        match self {
            TimelineEvent::NewTimelineItem(item) => item.id,
            TimelineEvent::TimelineItemUpdated(update) => update.item_id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            TimelineEvent::NewTimelineItem(item) => item.kind,
            TimelineEvent::TimelineItemUpdated(update) => update.kind,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimelineEvent::NewTimelineItem(_) => "timeline.item.new",
            TimelineEvent::TimelineItemUpdated(_) => "timeline.item.updated",
        }
    }
}

/// Delta for one append: the item's new extent and the sample that caused
/// it. Independent of how many samples the item holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub item_id: ItemId,
    pub kind: ItemKind,
    pub sample_count: usize,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    /// The appended sample.
    pub sample: Option<Sample>,
    /// Low-power samples evicted to make room for it.
    pub evicted: Vec<SampleId>,
}

impl ItemUpdate {
    pub fn new(item: &TimelineItem, evicted: Vec<SampleId>) -> Self {
        Self {
            item_id: item.id,
            kind: item.kind,
            sample_count: item.sample_count(),
            start_ms: item.start_ms(),
            end_ms: item.end_ms(),
            sample: item.last_sample().cloned(),
            evicted,
        }
    }
}

/// In-process fan-out event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TimelineEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: TimelineEvent) {
        // A send error only means there are no receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<TimelineEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
