//! Timeline item factory.
//!
//! Builds the right kind of item for a seed sample and makes it current.
//! The new item's previous-item reference points at whatever was current
//! before; the old item's next reference is left for the caller to finalize.

use tracing::debug;

use crate::store::Timeline;
use crate::timeline::{ItemId, ItemKind};
use crate::types::Sample;

/// Kind of item a seed sample starts.
pub fn kind_for_seed(seed: &Sample) -> ItemKind {
    if seed.is_stationary() {
        ItemKind::Visit
    } else {
        ItemKind::Path
    }
}

/// Create a visit or path from `seed`, link its previous reference and make
/// it current. Must run inside the store's mutation scope.
pub fn create_item(timeline: &mut Timeline, seed: Sample) -> ItemId {
    let previous = timeline.current_item_id();
    let kind = kind_for_seed(&seed);
    let timestamp_ms = seed.timestamp_ms;

    let id = match kind {
        ItemKind::Visit => timeline.create_visit(seed),
        _ => timeline.create_path(seed),
    };
    timeline.set_previous(id, previous);

    debug!(item_id = %id, kind = kind.as_str(), timestamp_ms, "created timeline item");
    id
}
