//! Timeline storage.
//!
//! The store owns the item chain. All mutation goes through
//! [`TimelineStore::process`], which gives the caller exclusive access to the
//! [`Timeline`] for the duration of one closure: the single-writer critical
//! section every item and sample change happens in.
//!
//! Durable storage is someone else's problem. [`MemoryStore`] is the
//! in-process implementation used by default and in tests; a persistent
//! store wraps its own [`Timeline`] the same way and flushes after `process`.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use crate::timeline::{ItemId, ItemKind, TimelineItem};
use crate::types::{RawSample, Sample, SampleId};

/// The chain of timeline items.
///
/// The current item is always the most recently created one, so a chain
/// restored from disk resumes exactly where it left off.
#[derive(Debug, Default)]
pub struct Timeline {
    items: HashMap<ItemId, TimelineItem>,
    /// Creation order. Items are created chronologically, so the tail is
    /// the most recent item.
    order: Vec<ItemId>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn item(&self, id: ItemId) -> Option<&TimelineItem> {
        self.items.get(&id)
    }

    // =========================================================================
    // CREATION
    // =========================================================================

    /// Create a visit seeded by `seed`. The new item is unlinked.
    pub fn create_visit(&mut self, seed: Sample) -> ItemId {
        self.insert(TimelineItem::new(ItemKind::Visit, seed))
    }

    /// Create a path seeded by `seed`. The new item is unlinked.
    pub fn create_path(&mut self, seed: Sample) -> ItemId {
        self.insert(TimelineItem::new(ItemKind::Path, seed))
    }

    /// Create a data gap seeded by `seed`. The new item is unlinked.
    pub fn create_data_gap(&mut self, seed: Sample) -> ItemId {
        self.insert(TimelineItem::new(ItemKind::DataGap, seed))
    }

    fn insert(&mut self, item: TimelineItem) -> ItemId {
        let id = item.id;
        self.items.insert(id, item);
        self.order.push(id);
        id
    }

    // =========================================================================
    // LINKAGE
    // =========================================================================

    /// Point `id`'s previous-item reference at `previous`, leaving the
    /// previous item's next reference alone.
    pub(crate) fn set_previous(&mut self, id: ItemId, previous: Option<ItemId>) {
        if let Some(item) = self.items.get_mut(&id) {
            item.set_previous_item_id(previous);
        }
    }

    /// Link `previous` and `next` in both directions.
    pub fn link(&mut self, previous: ItemId, next: ItemId) {
        if let Some(item) = self.items.get_mut(&previous) {
            item.set_next_item_id(Some(next));
        }
        if let Some(item) = self.items.get_mut(&next) {
            item.set_previous_item_id(Some(previous));
        }
    }

    // =========================================================================
    // SAMPLES
    // =========================================================================

    pub(crate) fn append_sample(&mut self, id: ItemId, sample: Sample) -> bool {
        match self.items.get_mut(&id) {
            Some(item) => {
                item.add(sample);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_sample(&mut self, id: ItemId, sample_id: SampleId) -> Option<Sample> {
        self.items.get_mut(&id)?.remove(sample_id)
    }

    // =========================================================================
    // CURRENT ITEM
    // =========================================================================

    /// The item open for appending: the most recent one.
    pub fn current_item_id(&self) -> Option<ItemId> {
        self.order.last().copied()
    }

    pub fn current_item(&self) -> Option<&TimelineItem> {
        self.most_recent_item()
    }

    /// The current item, only if it is a visit.
    pub fn current_visit(&self) -> Option<&TimelineItem> {
        self.current_item().filter(|item| item.is_visit())
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn most_recent_item(&self) -> Option<&TimelineItem> {
        self.order.last().and_then(|id| self.items.get(id))
    }

    pub fn first_item(&self) -> Option<&TimelineItem> {
        self.order.first().and_then(|id| self.items.get(id))
    }

    /// All items in chain order.
    ///
    /// Walks next-links from every head (an item with no previous item), in
    /// creation order of the heads.
    pub fn items_in_order(&self) -> Vec<&TimelineItem> {
        let mut ordered = Vec::with_capacity(self.items.len());
        let mut seen = HashSet::with_capacity(self.items.len());

        for head in self.order.iter().filter_map(|id| self.items.get(id)) {
            if head.previous_item_id().is_some() {
                continue;
            }
            let mut cursor = Some(head);
            while let Some(item) = cursor {
                if !seen.insert(item.id) {
                    break;
                }
                ordered.push(item);
                cursor = item.next_item_id().and_then(|id| self.items.get(&id));
            }
        }

        ordered
    }
}

/// Storage collaborator for the recorder.
pub trait TimelineStore: Send + Sync {
    /// Run `mutation` with exclusive access to the chain.
    ///
    /// Calls are applied one at a time and never interleave.
    fn process<R>(&self, mutation: impl FnOnce(&mut Timeline) -> R) -> R;

    /// Run a read-only query against the chain.
    fn read<R>(&self, query: impl FnOnce(&Timeline) -> R) -> R;

    /// Materialize a raw sample from the sensing subsystem.
    fn create_sample(&self, raw: RawSample) -> Sample {
        Sample::from_raw(raw)
    }

    /// Snapshot of the most recently created item.
    fn most_recent_item(&self) -> Option<TimelineItem> {
        self.read(|timeline| timeline.most_recent_item().cloned())
    }
}

/// In-process store. The mutex is the single-writer critical section.
#[derive(Debug, Default)]
pub struct MemoryStore {
    timeline: Mutex<Timeline>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing chain, e.g. one restored from disk.
    pub fn with_timeline(timeline: Timeline) -> Self {
        Self {
            timeline: Mutex::new(timeline),
        }
    }
}

impl TimelineStore for MemoryStore {
    fn process<R>(&self, mutation: impl FnOnce(&mut Timeline) -> R) -> R {
        // Mutators leave the chain consistent between calls, so poisoning is recoverable.
        let mut guard = self.timeline.lock().unwrap_or_else(PoisonError::into_inner);
        mutation(&mut *guard)
    }

    fn read<R>(&self, query: impl FnOnce(&Timeline) -> R) -> R {
        let guard = self.timeline.lock().unwrap_or_else(PoisonError::into_inner);
        query(&*guard)
    }
}
