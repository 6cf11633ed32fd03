//! Data-gap bridging.
//!
//! When recording (re)starts after an unmonitored interval, the chain gets a
//! placeholder item spanning the interval, bounded by two samples tagged
//! `RecordingState::Off`: one at the end of the last known item and one at
//! restart time. The placeholder becomes current, so the next real sample
//! always opens a fresh item after it.

use tracing::{debug, info};

use crate::store::{Timeline, TimelineStore};
use crate::timeline::{ItemId, TimelineItem};
use crate::types::{RawSample, Sample};

/// Start of the interval worth bridging after `last`, if there is one.
///
/// No gap when there is no previous item, it has no end, it is itself a
/// data gap, or less than `min_gap_ms` has passed since it ended.
pub fn gap_start_ms(last: Option<&TimelineItem>, now_ms: u64, min_gap_ms: u64) -> Option<u64> {
    let last = last?;
    if last.is_data_gap() {
        return None;
    }
    let end_ms = last.end_ms()?;
    if now_ms.saturating_sub(end_ms) < min_gap_ms {
        return None;
    }
    Some(end_ms)
}

/// Insert a data gap after the most recent item if the elapsed time since
/// it ended is at least `min_gap_ms`. Returns the new gap's id.
pub fn bridge_if_needed<S: TimelineStore>(store: &S, now_ms: u64, min_gap_ms: u64) -> Option<ItemId> {
    let Some(start_ms) = store.read(|timeline| gap_start_ms(timeline.most_recent_item(), now_ms, min_gap_ms)) else {
        debug!(now_ms, min_gap_ms, "no data gap to bridge");
        return None;
    };

    let start = store.create_sample(RawSample::gap_boundary(start_ms));
    let end = store.create_sample(RawSample::gap_boundary(now_ms));

    let gap = store.process(|timeline| insert_gap(timeline, start, end, now_ms, min_gap_ms))?;
    info!(item_id = %gap, start_ms, end_ms = now_ms, "bridged data gap");
    Some(gap)
}

fn insert_gap(timeline: &mut Timeline, start: Sample, end: Sample, now_ms: u64, min_gap_ms: u64) -> Option<ItemId> {
    // Re-check under the mutation scope: another writer may have moved the
    // chain on since the read.
    let last = timeline.most_recent_item()?;
    if gap_start_ms(Some(last), now_ms, min_gap_ms) != Some(start.timestamp_ms) {
        return None;
    }
    let last_id = last.id;

    let gap = timeline.create_data_gap(start);
    timeline.link(last_id, gap);
    timeline.append_sample(gap, end);
    Some(gap)
}
