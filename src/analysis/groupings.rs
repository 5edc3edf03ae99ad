/// Per-bridge grouping of a flat event snapshot.
///
/// `group_by_bridge` takes the flat list of `BridgeEvent`s supplied by the
/// event store and organizes them into one `BridgeHistory` per bridge,
/// chronologically ordered, so the engines can ask "what did Fremont do
/// this week?" without filtering the whole snapshot every time.
///
/// Ordering is canonical (open time, then close time, then duration) and
/// the map is a `BTreeMap`, so the same snapshot in any order always
/// produces the same grouping.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::BridgeEvent;

/// All events for one bridge, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeHistory {
    pub bridge_id: i64,
    pub bridge_name: String,
    pub events: Vec<BridgeEvent>,
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// Total order used everywhere events need a deterministic sequence.
pub fn chronological(a: &BridgeEvent, b: &BridgeEvent) -> Ordering {
    a.open_time
        .cmp(&b.open_time)
        .then_with(|| a.entity_id.cmp(&b.entity_id))
        .then_with(|| a.close_time.cmp(&b.close_time))
        .then_with(|| a.minutes_open.total_cmp(&b.minutes_open))
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Groups events by `entity_id`.
///
/// The bridge name is taken from the chronologically first event, so a
/// rename partway through the history does not make the result depend on
/// input order.
pub fn group_by_bridge(events: &[BridgeEvent]) -> BTreeMap<i64, BridgeHistory> {
    let mut sorted: Vec<&BridgeEvent> = events.iter().collect();
    sorted.sort_by(|a, b| chronological(a, b));

    let mut grouped: BTreeMap<i64, BridgeHistory> = BTreeMap::new();

    for event in sorted {
        let history = grouped
            .entry(event.entity_id)
            .or_insert_with(|| BridgeHistory {
                bridge_id: event.entity_id,
                bridge_name: event.entity_name.clone(),
                events: Vec::new(),
            });
        history.events.push(event.clone());
    }

    grouped
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
