//! Timeline export.
//!
//! Structured JSON snapshot of the recorded chain for downstream consumers
//! (sync, review UIs, offline analysis). The export is self-contained: each
//! item carries its own times, kind and classification, plus chain totals.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::store::Timeline;
use crate::timeline::{ItemId, ItemKind, KeeperThresholds, TimelineItem};

/// Complete chain export.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineExport {
    /// Export time (Unix ms).
    pub exported_at_ms: u64,
    pub current_item_id: Option<ItemId>,
    /// Items in chain order, oldest first.
    pub items: Vec<ItemExport>,
    pub summary: TimelineSummary,
}

/// One timeline item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemExport {
    pub id: ItemId,
    pub kind: ItemKind,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    /// RFC 3339, UTC.
    pub start: Option<String>,
    pub end: Option<String>,
    pub duration_ms: u64,
    pub sample_count: usize,
    /// Dominant moving activity type, paths only.
    pub activity_type: Option<String>,
    pub worth_keeping: bool,
    pub previous_item_id: Option<ItemId>,
    pub next_item_id: Option<ItemId>,
}

/// Totals across the chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimelineSummary {
    pub visit_count: usize,
    pub path_count: usize,
    pub data_gap_count: usize,
    pub total_samples: usize,
    pub stationary_duration_ms: u64,
    pub moving_duration_ms: u64,
    pub gap_duration_ms: u64,
}

impl TimelineExport {
    /// Snapshot `timeline` in chain order.
    pub fn from_timeline(timeline: &Timeline, thresholds: &KeeperThresholds, exported_at_ms: u64) -> Self {
        let items: Vec<ItemExport> = timeline
            .items_in_order()
            .into_iter()
            .map(|item| ItemExport::from_item(item, thresholds))
            .collect();
        let summary = TimelineSummary::from_items(&items);

        Self {
            exported_at_ms,
            current_item_id: timeline.current_item_id(),
            items,
            summary,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Single-line JSON for streaming.
    pub fn to_compact_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl ItemExport {
    pub fn from_item(item: &TimelineItem, thresholds: &KeeperThresholds) -> Self {
        Self {
            id: item.id,
            kind: item.kind,
            start_ms: item.start_ms(),
            end_ms: item.end_ms(),
            start: item.start_ms().and_then(rfc3339),
            end: item.end_ms().and_then(rfc3339),
            duration_ms: item.duration_ms(),
            sample_count: item.sample_count(),
            activity_type: item.moving_activity_type().map(|a| a.as_str().to_string()),
            worth_keeping: item.is_worth_keeping(thresholds),
            previous_item_id: item.previous_item_id(),
            next_item_id: item.next_item_id(),
        }
    }
}

impl TimelineSummary {
    fn from_items(items: &[ItemExport]) -> Self {
        let mut summary = Self::default();
        for item in items {
            summary.total_samples += item.sample_count;
            match item.kind {
                ItemKind::Visit => {
                    summary.visit_count += 1;
                    summary.stationary_duration_ms += item.duration_ms;
                }
                ItemKind::Path => {
                    summary.path_count += 1;
                    summary.moving_duration_ms += item.duration_ms;
                }
                ItemKind::DataGap => {
                    summary.data_gap_count += 1;
                    summary.gap_duration_ms += item.duration_ms;
                }
            }
        }
        summary
    }
}

fn rfc3339(timestamp_ms: u64) -> Option<String> {
    let millis = i64::try_from(timestamp_ms).ok()?;
    let time: DateTime<Utc> = DateTime::from_timestamp_millis(millis)?;
    Some(time.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// ============================================================================
// TESTS
// ============================================================================
