/// Streak analytics: how long has each bridge stayed closed?
///
/// A streak is the quiet interval between one opening's effective close
/// and the next opening, inside a lookback window ending at `now`. From the
/// observed streaks we derive the current, longest and average streak, a
/// confidence score, and a naive next-opening estimate (`now + average`).
///
/// # Confidence
///
/// `0.5 * density + 0.5 * consistency`, where density is
/// `streak_count / density_saturation` (capped at 1) and consistency is
/// `1 / (1 + coefficient_of_variation)` of the streak lengths. Consistency
/// needs at least two streaks; with fewer it is 0.
///
/// No data is never an error: a bridge without events in the window gets a
/// record whose current streak spans the whole window and whose derived
/// fields sit at zero / `None`.

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::analysis::groupings::{chronological, group_by_bridge};
use crate::calendar::AnalyticsCalendar;
use crate::config::StreakConfig;
use crate::model::{BridgeEvent, HistoricalStreak, StreakRecord, WeeklyChampion};

/// Share of the record a current streak must reach to count as "near record"
const NEAR_RECORD_RATIO: f64 = 0.8;

// ---------------------------------------------------------------------------
// Per-bridge streaks
// ---------------------------------------------------------------------------

/// Computes the streak record for one bridge.
///
/// `events` may contain other bridges; only those matching `bridge_id`
/// are considered.
pub fn compute_streak(
    bridge_id: i64,
    bridge_name: &str,
    events: &[BridgeEvent],
    lookback: Duration,
    now: DateTime<Utc>,
    config: &StreakConfig,
) -> StreakRecord {
    analyze_bridge(bridge_id, bridge_name, events, lookback, now, config).record
}

/// One streak record per bridge present anywhere in the snapshot, ordered
/// by bridge id. Bridges that were quiet for the whole window are included.
pub fn compute_all_streaks(
    events: &[BridgeEvent],
    lookback: Duration,
    now: DateTime<Utc>,
    config: &StreakConfig,
) -> Vec<StreakRecord> {
    group_by_bridge(events)
        .values()
        .map(|history| {
            compute_streak(
                history.bridge_id,
                &history.bridge_name,
                &history.events,
                lookback,
                now,
                config,
            )
        })
        .collect()
}

struct BridgeStreaks {
    record: StreakRecord,
    /// Latest effective close inside the window, if any event fell in it
    quiet_since: Option<DateTime<Utc>>,
}

fn analyze_bridge(
    bridge_id: i64,
    bridge_name: &str,
    events: &[BridgeEvent],
    lookback: Duration,
    now: DateTime<Utc>,
    config: &StreakConfig,
) -> BridgeStreaks {
    // A lookback reaching past the calendar's start covers all history
    let window_start = now.checked_sub_signed(lookback);

    let mut in_window: Vec<&BridgeEvent> = events
        .iter()
        .filter(|e| e.entity_id == bridge_id)
        .filter(|e| window_start.is_none_or(|start| e.open_time >= start) && e.open_time <= now)
        .collect();
    in_window.sort_by(|a, b| chronological(a, b));

    let mut streaks: Vec<HistoricalStreak> = Vec::new();
    let mut last_close: Option<DateTime<Utc>> = None;

    for event in &in_window {
        if let Some(close) = last_close {
            let gap = event.open_time - close;
            // An opening that starts before the previous one closed is not a quiet interval
            if gap >= Duration::zero() {
                streaks.push(HistoricalStreak {
                    start_date: close,
                    duration_hours: hours(gap),
                });
            }
        }
        let close = event.effective_close_time();
        last_close = Some(last_close.map_or(close, |prev| prev.max(close)));
    }

    let current_streak_hours = match last_close {
        Some(close) => hours(now - close).max(0.0),
        None => hours(lookback),
    };

    let durations: Vec<f64> = streaks.iter().map(|s| s.duration_hours).collect();
    let streak_count = durations.len() as u32;
    let longest_streak_hours = durations.iter().copied().fold(0.0, f64::max);
    let average_streak_hours = mean(&durations).unwrap_or(0.0);

    let next_predicted_opening = if streak_count > 0 {
        Duration::try_seconds((average_streak_hours * 3600.0).round() as i64)
            .and_then(|average| now.checked_add_signed(average))
    } else {
        None
    };

    streaks.reverse();

    debug!(
        "Bridge {} ({}): {} streaks, current {:.1}h, longest {:.1}h",
        bridge_id, bridge_name, streak_count, current_streak_hours, longest_streak_hours
    );

    BridgeStreaks {
        record: StreakRecord {
            bridge_id,
            bridge_name: bridge_name.to_string(),
            current_streak_hours,
            longest_streak_hours,
            average_streak_hours,
            streak_count,
            confidence_level: streak_confidence(&durations, config.density_saturation),
            next_predicted_opening,
            historical_patterns: streaks,
        },
        quiet_since: last_close,
    }
}

fn hours(duration: Duration) -> f64 {
    duration.num_seconds() as f64 / 3600.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn streak_confidence(durations: &[f64], density_saturation: u32) -> f64 {
    if durations.is_empty() {
        return 0.0;
    }

    let density = (durations.len() as f64 / density_saturation.max(1) as f64).min(1.0);
    let consistency = if durations.len() >= 2 {
        consistency(durations)
    } else {
        0.0
    };

    (0.5 * density + 0.5 * consistency).clamp(0.0, 1.0)
}

/// `1 / (1 + cv)`; identical streaks score 1.0.
fn consistency(durations: &[f64]) -> f64 {
    let Some(avg) = mean(durations) else {
        return 0.0;
    };
    let variance =
        durations.iter().map(|d| (d - avg).powi(2)).sum::<f64>() / durations.len() as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        1.0
    } else if avg <= 0.0 {
        0.0
    } else {
        1.0 / (1.0 + std_dev / avg)
    }
}

// ---------------------------------------------------------------------------
// Weekly champion
// ---------------------------------------------------------------------------

/// The bridge with the longest current streak over the champion window
/// (`champion_lookback_days`, 7 by default). Ties go to the lowest bridge id.
/// `None` only when the snapshot has no bridges at all.
pub fn weekly_champion(
    events: &[BridgeEvent],
    now: DateTime<Utc>,
    calendar: &AnalyticsCalendar,
    config: &StreakConfig,
) -> Option<WeeklyChampion> {
    let lookback = Duration::try_days(config.champion_lookback_days).unwrap_or(Duration::MAX);

    let mut best: Option<BridgeStreaks> = None;
    for history in group_by_bridge(events).values() {
        let candidate = analyze_bridge(
            history.bridge_id,
            &history.bridge_name,
            &history.events,
            lookback,
            now,
            config,
        );
        let beats_best = best.as_ref().is_none_or(|b| {
            candidate.record.current_streak_hours > b.record.current_streak_hours
        });
        if beats_best {
            best = Some(candidate);
        }
    }

    best.map(|champion| {
        let historical_context = champion_context(
            &champion.record,
            champion.quiet_since,
            config.champion_lookback_days,
            calendar,
        );
        WeeklyChampion {
            bridge_name: champion.record.bridge_name,
            bridge_id: champion.record.bridge_id,
            streak_hours: champion.record.current_streak_hours,
            confidence_level: champion.record.confidence_level,
            historical_context,
        }
    })
}

fn champion_context(
    record: &StreakRecord,
    quiet_since: Option<DateTime<Utc>>,
    lookback_days: i64,
    calendar: &AnalyticsCalendar,
) -> String {
    let Some(since) = quiet_since else {
        return format!("No openings recorded in the past {} days", lookback_days);
    };

    let closed_since = format!("Closed since {}", calendar.describe(since));
    let current = record.current_streak_hours;
    let longest = record.longest_streak_hours;

    if record.streak_count == 0 || longest <= 0.0 {
        format!("{}; no earlier quiet stretch this period to compare", closed_since)
    } else if current >= longest {
        format!(
            "{}; a new record, beating the previous best of {:.1}h",
            closed_since, longest
        )
    } else if current >= longest * NEAR_RECORD_RATIO {
        format!("{}; near the record of {:.1}h", closed_since, longest)
    } else {
        format!(
            "{}; typical, the record this period is {:.1}h",
            closed_since, longest
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
