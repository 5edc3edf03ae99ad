/// Prediction composer.
///
/// Folds the temporal cell for "now" together with the bridge's streak
/// record and any cascade edges pointing at it into one
/// `BridgePrediction`. Missing upstream data never fails: without a
/// matching cell the composer returns the configured low-confidence
/// default.
///
/// Signals only ever push the probability up, and each one can claim at
/// most its configured share of the remaining probability mass:
///
/// ```text
/// p = cell probability
/// p += (1 - p) * streak_weight  * streak confidence   (opening is due)
/// p += (1 - p) * cascade_weight * edge strength       (upstream trigger just opened)
/// ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::analysis::cascade::edges_into;
use crate::analysis::temporal::{busiest_hours, cells_for_bridge};
use crate::calendar::{AnalyticsCalendar, CalendarSlot};
use crate::config::AnalyticsConfig;
use crate::model::{
    AnalyticsCell, BridgeEvent, BridgePrediction, CascadeEdge, CellKey, StreakRecord,
};

/// How many of a bridge's busiest hours get called out in the reasoning
const BUSIEST_HOURS_NOTED: usize = 3;

/// Upstream results the composer draws on. Every field may be empty.
#[derive(Debug, Clone, Copy)]
pub struct PredictionInputs<'a> {
    pub cells: &'a BTreeMap<CellKey, AnalyticsCell>,
    pub streaks: &'a [StreakRecord],
    pub cascades: &'a [CascadeEdge],
    /// Recent openings of any bridge, used to spot active cascade triggers
    pub recent_events: &'a [BridgeEvent],
}

/// Cell chosen for the current slot.
struct MatchedCell<'a> {
    cell: &'a AnalyticsCell,
    /// Borrowed from an earlier year because the current one had no data
    from_earlier_year: bool,
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Prediction for one bridge at `now`.
pub fn predict(
    bridge_id: i64,
    now: DateTime<Utc>,
    inputs: &PredictionInputs<'_>,
    calendar: &AnalyticsCalendar,
    config: &AnalyticsConfig,
) -> BridgePrediction {
    let weights = &config.prediction;

    let Some(slot) = calendar.slot(now) else {
        return default_prediction(bridge_id, now, config, "Current time is outside the calendar range");
    };
    let Some(matched) = match_cell(inputs.cells, bridge_id, slot) else {
        return default_prediction(
            bridge_id,
            now,
            config,
            "No historical openings recorded for this time slot",
        );
    };

    let cell = matched.cell;
    let mut probability = cell.probability_of_opening;
    let mut confidence = cell.confidence;
    let mut reasons = vec![format!(
        "Opened in this hour on {:.0}% of days ({} openings on record, {})",
        cell.probability_of_opening * 100.0,
        cell.opening_count,
        if matched.from_earlier_year {
            format!("borrowed from {}", cell.year)
        } else {
            format!("{}", cell.year)
        }
    )];
    if matched.from_earlier_year {
        confidence *= 0.5;
    }

    let busiest = busiest_hours(inputs.cells, bridge_id, BUSIEST_HOURS_NOTED);
    if busiest.iter().any(|h| h.hour == slot.hour) {
        reasons.push("This is one of the bridge's busiest hours".to_string());
    }

    if let Some(streak) = inputs
        .streaks
        .iter()
        .find(|s| s.bridge_id == bridge_id && s.streak_count > 0)
    {
        // `None` when the horizon runs past the end of the calendar
        let horizon_end = Duration::try_minutes(weights.streak_horizon_minutes)
            .and_then(|horizon| now.checked_add_signed(horizon));
        let due = streak.current_streak_hours >= streak.average_streak_hours
            || streak
                .next_predicted_opening
                .is_some_and(|next| horizon_end.is_none_or(|end| next <= end));

        if due {
            probability += (1.0 - probability) * weights.streak_weight * streak.confidence_level;
            reasons.push(format!(
                "Quiet for {:.1}h; the typical gap of {:.1}h says an opening is due",
                streak.current_streak_hours, streak.average_streak_hours
            ));
        } else {
            reasons.push(format!(
                "Quiet for {:.1}h against a typical gap of {:.1}h",
                streak.current_streak_hours, streak.average_streak_hours
            ));
        }

        confidence = (1.0 - weights.streak_weight) * confidence
            + weights.streak_weight * streak.confidence_level;
    }

    let window = Duration::try_minutes(config.cascade.trigger_window_minutes).unwrap_or(Duration::MAX);
    if let Some((edge, minutes_ago)) = strongest_active_trigger(
        inputs.cascades,
        inputs.recent_events,
        bridge_id,
        now,
        window,
    ) {
        probability += (1.0 - probability) * weights.cascade_weight * edge.cascade_strength;
        reasons.push(format!(
            "{} opened {} min ago and is followed by this bridge {:.0}% of the time, after about {:.0} min",
            edge.trigger_bridge_name,
            minutes_ago,
            edge.cascade_strength * 100.0,
            edge.delay_minutes
        ));
    }

    BridgePrediction {
        bridge_id,
        generated_at: now,
        probability: probability.clamp(0.0, 1.0),
        expected_duration_minutes: cell.expected_duration_minutes.max(0.0),
        confidence: confidence.clamp(0.0, 1.0),
        reasoning: reasons.join(". "),
    }
}

/// One prediction per bridge, in the order given.
pub fn predict_all(
    bridge_ids: &[i64],
    now: DateTime<Utc>,
    inputs: &PredictionInputs<'_>,
    calendar: &AnalyticsCalendar,
    config: &AnalyticsConfig,
) -> Vec<BridgePrediction> {
    bridge_ids
        .iter()
        .map(|&id| predict(id, now, inputs, calendar, config))
        .collect()
}

fn default_prediction(
    bridge_id: i64,
    now: DateTime<Utc>,
    config: &AnalyticsConfig,
    reason: &str,
) -> BridgePrediction {
    BridgePrediction {
        bridge_id,
        generated_at: now,
        probability: config.prediction.default_probability,
        expected_duration_minutes: config.prediction.default_expected_duration_minutes,
        confidence: 0.0,
        reasoning: reason.to_string(),
    }
}

/// Exact `(year, month, weekday, hour)` match, else the same
/// `(month, weekday, hour)` from the most recent earlier year.
fn match_cell(
    cells: &BTreeMap<CellKey, AnalyticsCell>,
    bridge_id: i64,
    slot: CalendarSlot,
) -> Option<MatchedCell<'_>> {
    let key = CellKey {
        bridge_id,
        year: slot.year,
        month: slot.month,
        day_of_week: slot.day_of_week,
        hour: slot.hour,
    };
    if let Some(cell) = cells.get(&key) {
        return Some(MatchedCell {
            cell,
            from_earlier_year: false,
        });
    }

    cells_for_bridge(cells, bridge_id)
        .into_iter()
        .filter(|c| {
            c.year < slot.year
                && c.month == slot.month
                && c.day_of_week == slot.day_of_week
                && c.hour == slot.hour
        })
        .max_by_key(|c| c.year)
        .map(|cell| MatchedCell {
            cell,
            from_earlier_year: true,
        })
}

/// Strongest incoming edge whose trigger bridge opened in `(now - window, now]`,
/// with how many minutes ago that opening was.
fn strongest_active_trigger<'a>(
    cascades: &'a [CascadeEdge],
    recent_events: &[BridgeEvent],
    bridge_id: i64,
    now: DateTime<Utc>,
    window: Duration,
) -> Option<(&'a CascadeEdge, i64)> {
    let mut best: Option<(&CascadeEdge, i64)> = None;
    let window_start = now.checked_sub_signed(window);

    for edge in edges_into(cascades, bridge_id) {
        let latest_trigger = recent_events
            .iter()
            .filter(|e| e.entity_id == edge.trigger_bridge_id)
            .map(|e| e.open_time)
            .filter(|&open| window_start.is_none_or(|start| open > start) && open <= now)
            .max();

        if let Some(open) = latest_trigger {
            let stronger = best.is_none_or(|(b, _)| edge.cascade_strength > b.cascade_strength);
            if stronger {
                best = Some((edge, (now - open).num_minutes()));
            }
        }
    }

    best
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
