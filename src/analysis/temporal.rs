/// Temporal aggregation: buckets openings into calendar cells.
///
/// Each bridge's openings are counted per `(year, month, day_of_week, hour)`
/// slot of the configured calendar, and every cell gets a probability of
/// opening, an expected duration and a confidence score.
///
/// # Probability
///
/// The denominator is the number of local calendar days between the
/// bridge's earliest and latest accepted event, inclusive. Every spanned day
/// contains one occurrence of every hour, so this is an hour-of-day rate; it
/// deliberately ignores the month and weekday granularity of the cell. The
/// ratio is capped at 1.0 because several openings in the same hour of a
/// short span would otherwise exceed it.
///
/// # Confidence
///
/// Mean of a sample-size term (`count / 10`, capped at 1) and a variability
/// term that penalizes a wide longest/shortest spread relative to the
/// average. A single opening carries no variability signal, so its
/// variability term is 0.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::analysis::groupings::group_by_bridge;
use crate::calendar::AnalyticsCalendar;
use crate::model::{AnalyticsCell, BridgeEvent, CellKey};

/// Openings needed before the sample-size term reaches 1.0
const SAMPLE_SATURATION: f64 = 10.0;

/// Spread (relative to the average) that drives variability confidence to 0
const VARIABILITY_SCALE: f64 = 10.0;

/// Openings per local hour of day, summed over every cell of one bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyActivity {
    pub hour: u32,
    pub opening_count: u32,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Builds every analytics cell for the snapshot in one pass.
///
/// `calculated_at` is stamped on each cell as `last_calculated`; the engine
/// never reads the clock itself. Events with a negative or non-finite
/// duration, or whose timestamp cannot be placed on the calendar, are
/// skipped.
pub fn aggregate_events(
    events: &[BridgeEvent],
    calendar: &AnalyticsCalendar,
    calculated_at: DateTime<Utc>,
) -> BTreeMap<CellKey, AnalyticsCell> {
    let mut cells = BTreeMap::new();
    let mut skipped = 0usize;

    for history in group_by_bridge(events).values() {
        let mut bridge_cells: BTreeMap<CellKey, AnalyticsCell> = BTreeMap::new();
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut latest: Option<DateTime<Utc>> = None;

        for event in &history.events {
            if !event.minutes_open.is_finite() || event.minutes_open < 0.0 {
                warn!(
                    "Skipping {} opening at {}: invalid duration {}",
                    history.bridge_name, event.open_time, event.minutes_open
                );
                skipped += 1;
                continue;
            }

            let Some(slot) = calendar.slot(event.open_time) else {
                warn!(
                    "Skipping {} opening at {}: timestamp outside calendar range",
                    history.bridge_name, event.open_time
                );
                skipped += 1;
                continue;
            };

            let key = CellKey {
                bridge_id: history.bridge_id,
                year: slot.year,
                month: slot.month,
                day_of_week: slot.day_of_week,
                hour: slot.hour,
            };

            let cell = bridge_cells
                .entry(key)
                .or_insert_with(|| empty_cell(key, calculated_at));
            record_opening(cell, event.minutes_open);

            // History is chronological, so the first accepted event is the earliest
            earliest.get_or_insert(event.open_time);
            latest = Some(event.open_time);
        }

        let days_spanned = match (earliest, latest) {
            (Some(first), Some(last)) => calendar.days_spanned(first, last),
            _ => 0,
        };

        for cell in bridge_cells.values_mut() {
            finalize_cell(cell, days_spanned);
        }
        cells.extend(bridge_cells);
    }

    debug!(
        "Aggregated {} events into {} cells ({} skipped)",
        events.len(),
        cells.len(),
        skipped
    );

    cells
}

fn empty_cell(key: CellKey, calculated_at: DateTime<Utc>) -> AnalyticsCell {
    AnalyticsCell {
        bridge_id: key.bridge_id,
        year: key.year,
        month: key.month,
        day_of_week: key.day_of_week,
        hour: key.hour,
        opening_count: 0,
        total_minutes_open: 0.0,
        average_minutes_per_opening: 0.0,
        longest_opening_minutes: 0.0,
        shortest_opening_minutes: 0.0,
        probability_of_opening: 0.0,
        expected_duration_minutes: 0.0,
        confidence: 0.0,
        last_calculated: calculated_at,
    }
}

fn record_opening(cell: &mut AnalyticsCell, minutes_open: f64) {
    cell.opening_count += 1;
    cell.total_minutes_open += minutes_open;

    if cell.opening_count == 1 {
        cell.longest_opening_minutes = minutes_open;
        cell.shortest_opening_minutes = minutes_open;
    } else {
        cell.longest_opening_minutes = cell.longest_opening_minutes.max(minutes_open);
        cell.shortest_opening_minutes = cell.shortest_opening_minutes.min(minutes_open);
    }

    cell.average_minutes_per_opening = cell.total_minutes_open / cell.opening_count as f64;
}

fn finalize_cell(cell: &mut AnalyticsCell, days_spanned: i64) {
    cell.probability_of_opening = opening_probability(cell.opening_count, days_spanned);
    cell.expected_duration_minutes = cell.average_minutes_per_opening;
    cell.confidence = cell_confidence(
        cell.opening_count,
        cell.longest_opening_minutes,
        cell.shortest_opening_minutes,
        cell.average_minutes_per_opening,
    );
}

fn opening_probability(opening_count: u32, days_spanned: i64) -> f64 {
    let denominator = days_spanned.max(1) as f64;
    (opening_count as f64 / denominator).clamp(0.0, 1.0)
}

fn cell_confidence(opening_count: u32, longest: f64, shortest: f64, average: f64) -> f64 {
    let sample = (opening_count as f64 / SAMPLE_SATURATION).min(1.0);

    let variability = if opening_count > 1 {
        let spread = (longest - shortest) / average.max(1.0);
        (1.0 - spread / VARIABILITY_SCALE).max(0.0)
    } else {
        0.0
    };

    ((sample + variability) / 2.0).clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub fn find_cell<'a>(
    cells: &'a BTreeMap<CellKey, AnalyticsCell>,
    key: &CellKey,
) -> Option<&'a AnalyticsCell> {
    cells.get(key)
}

/// All cells of one bridge in key order.
pub fn cells_for_bridge(
    cells: &BTreeMap<CellKey, AnalyticsCell>,
    bridge_id: i64,
) -> Vec<&AnalyticsCell> {
    cells
        .range(bridge_range(bridge_id))
        .map(|(_, cell)| cell)
        .collect()
}

/// Hours of day with the most openings for a bridge, busiest first
/// (ties go to the earlier hour).
pub fn busiest_hours(
    cells: &BTreeMap<CellKey, AnalyticsCell>,
    bridge_id: i64,
    limit: usize,
) -> Vec<HourlyActivity> {
    let mut by_hour: BTreeMap<u32, u32> = BTreeMap::new();
    for cell in cells_for_bridge(cells, bridge_id) {
        *by_hour.entry(cell.hour).or_insert(0) += cell.opening_count;
    }

    let mut activity: Vec<HourlyActivity> = by_hour
        .into_iter()
        .map(|(hour, opening_count)| HourlyActivity {
            hour,
            opening_count,
        })
        .collect();
    activity.sort_by(|a, b| b.opening_count.cmp(&a.opening_count).then(a.hour.cmp(&b.hour)));
    activity.truncate(limit);
    activity
}

fn bridge_range(bridge_id: i64) -> std::ops::RangeInclusive<CellKey> {
    let low = CellKey {
        bridge_id,
        year: i32::MIN,
        month: 0,
        day_of_week: 0,
        hour: 0,
    };
    let high = CellKey {
        bridge_id,
        year: i32::MAX,
        month: u32::MAX,
        day_of_week: u32::MAX,
        hour: u32::MAX,
    };
    low..=high
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
