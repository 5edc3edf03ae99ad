/// Cascade detection: "when bridge A opens, bridge B tends to follow".
///
/// For every ordered pair of distinct bridges `(A, B)` we count how many of
/// A's openings are followed by a B opening within `(a, a + W]`, where `W`
/// is the configured trigger window. The conditional frequency is the edge
/// strength; the mean delay is taken over matched openings only. Edges below
/// the minimum strength (and every zero-strength edge) are dropped.
///
/// The scan is a pure function of the snapshot: no clock, no randomness, and
/// output is sorted by `(trigger, target)`. `(A, B)` and `(B, A)` are
/// computed independently and need not agree.
///
/// Work is O(bridges² · openings · log openings). Large snapshots can use
/// `detect_cascades_cancellable` so a caller can abandon a scan that a newer
/// snapshot has made stale.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::analysis::groupings::chronological;
use crate::config::CascadeConfig;
use crate::model::{BridgeEvent, BridgeInfluence, CascadeEdge};

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag a caller flips to abandon a running scan.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

struct BridgeOpenings {
    name: String,
    /// Ascending
    opens: Vec<DateTime<Utc>>,
}

/// Detects every cascade edge in the snapshot.
pub fn detect_cascades(events: &[BridgeEvent], config: &CascadeConfig) -> Vec<CascadeEdge> {
    scan(events, config, None).unwrap_or_default()
}

/// Same as `detect_cascades`, but checks `token` between trigger bridges and
/// returns `None` once it has been cancelled.
pub fn detect_cascades_cancellable(
    events: &[BridgeEvent],
    config: &CascadeConfig,
    token: &CancellationToken,
) -> Option<Vec<CascadeEdge>> {
    scan(events, config, Some(token))
}

fn scan(
    events: &[BridgeEvent],
    config: &CascadeConfig,
    token: Option<&CancellationToken>,
) -> Option<Vec<CascadeEdge>> {
    let openings = collect_openings(events);
    let window = Duration::try_minutes(config.trigger_window_minutes).unwrap_or(Duration::MAX);
    let mut edges = Vec::new();

    for (&trigger_id, trigger) in &openings {
        if token.is_some_and(CancellationToken::is_cancelled) {
            debug!("Cascade scan cancelled before bridge {}", trigger_id);
            return None;
        }

        for (&target_id, target) in &openings {
            if trigger_id == target_id {
                continue;
            }

            let (matched, delay_sum_minutes) = match_openings(&trigger.opens, &target.opens, window);
            let trigger_openings = trigger.opens.len() as u32;
            let strength = matched as f64 / trigger_openings.max(1) as f64;

            if matched == 0 || strength < config.min_strength {
                continue;
            }

            edges.push(CascadeEdge {
                trigger_bridge_id: trigger_id,
                trigger_bridge_name: trigger.name.clone(),
                target_bridge_id: target_id,
                target_bridge_name: target.name.clone(),
                cascade_strength: strength,
                delay_minutes: delay_sum_minutes / matched as f64,
                trigger_openings,
                matched_openings: matched,
            });
        }
    }

    debug!(
        "Cascade scan over {} bridges retained {} edges (window {} min, min strength {})",
        openings.len(),
        edges.len(),
        config.trigger_window_minutes,
        config.min_strength
    );

    Some(edges)
}

/// Sorted opening times per bridge, keyed by id. Names come from each
/// bridge's chronologically first event.
fn collect_openings(events: &[BridgeEvent]) -> BTreeMap<i64, BridgeOpenings> {
    let mut sorted: Vec<&BridgeEvent> = events.iter().collect();
    sorted.sort_by(|a, b| chronological(a, b));

    let mut openings: BTreeMap<i64, BridgeOpenings> = BTreeMap::new();
    for event in sorted {
        openings
            .entry(event.entity_id)
            .or_insert_with(|| BridgeOpenings {
                name: event.entity_name.clone(),
                opens: Vec::new(),
            })
            .opens
            .push(event.open_time);
    }
    openings
}

/// For each trigger opening, find the first target opening strictly after
/// it; it matches if it lands inside the window.
fn match_openings(
    trigger_opens: &[DateTime<Utc>],
    target_opens: &[DateTime<Utc>],
    window: Duration,
) -> (u32, f64) {
    let mut matched = 0u32;
    let mut delay_sum_minutes = 0.0;

    for &a in trigger_opens {
        let next = target_opens.partition_point(|&b| b <= a);
        if let Some(&b) = target_opens.get(next) {
            if a.checked_add_signed(window).is_none_or(|limit| b <= limit) {
                matched += 1;
                delay_sum_minutes += (b - a).num_milliseconds() as f64 / 60_000.0;
            }
        }
    }

    (matched, delay_sum_minutes)
}

// ---------------------------------------------------------------------------
// Graph queries
// ---------------------------------------------------------------------------

pub fn edges_from(edges: &[CascadeEdge], bridge_id: i64) -> Vec<&CascadeEdge> {
    edges
        .iter()
        .filter(|e| e.trigger_bridge_id == bridge_id)
        .collect()
}

pub fn edges_into(edges: &[CascadeEdge], bridge_id: i64) -> Vec<&CascadeEdge> {
    edges
        .iter()
        .filter(|e| e.target_bridge_id == bridge_id)
        .collect()
}

/// Sum of outgoing edge strengths per trigger bridge, normalized so the most
/// influential bridge scores 1.0. Sorted by score (descending), then id.
/// Bridges with no outgoing edges are absent.
pub fn bridge_influence(edges: &[CascadeEdge]) -> Vec<BridgeInfluence> {
    let mut totals: BTreeMap<i64, (String, f64)> = BTreeMap::new();
    for edge in edges {
        totals
            .entry(edge.trigger_bridge_id)
            .or_insert_with(|| (edge.trigger_bridge_name.clone(), 0.0))
            .1 += edge.cascade_strength;
    }

    let max_total = totals.values().map(|(_, total)| *total).fold(0.0, f64::max);

    let mut influence: Vec<BridgeInfluence> = totals
        .into_iter()
        .map(|(bridge_id, (bridge_name, outgoing_strength))| BridgeInfluence {
            bridge_id,
            bridge_name,
            outgoing_strength,
            influence_score: if max_total > 0.0 {
                outgoing_strength / max_total
            } else {
                0.0
            },
        })
        .collect();

    influence.sort_by(|a, b| {
        b.influence_score
            .total_cmp(&a.influence_score)
            .then(a.bridge_id.cmp(&b.bridge_id))
    });
    influence
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
