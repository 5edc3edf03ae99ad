/// Shared data types for the bridge opening analytics engine.
///
/// `BridgeEvent` is the only input record. Everything else in this module is
/// derived by one of the engines under `analysis` and handed back to callers
/// by value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single historical drawbridge opening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeEvent {
    pub entity_id: i64,
    pub entity_name: String,
    /// Almost always "Bridge" in the Seattle feed.
    pub entity_type: String,
    pub open_time: DateTime<Utc>,
    /// `None` while the bridge is still open.
    pub close_time: Option<DateTime<Utc>>,
    pub minutes_open: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl BridgeEvent {
    /// The moment the span went back down, or `open_time` for an
    /// unterminated opening.
    pub fn effective_close_time(&self) -> DateTime<Utc> {
        self.close_time.unwrap_or(self.open_time)
    }

    pub fn is_open(&self) -> bool {
        self.close_time.is_none()
    }
}

// ---------------------------------------------------------------------------
// Temporal aggregation
// ---------------------------------------------------------------------------

/// Bucket identity: one bridge at one calendar slot.
///
/// `day_of_week` runs Sunday = 1 through Saturday = 7; `hour` is the local
/// hour of day in the configured calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub bridge_id: i64,
    pub year: i32,
    pub month: u32,
    pub day_of_week: u32,
    pub hour: u32,
}

/// Opening statistics for one `CellKey`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsCell {
    pub bridge_id: i64,
    pub year: i32,
    pub month: u32,
    pub day_of_week: u32,
    pub hour: u32,

    pub opening_count: u32,
    pub total_minutes_open: f64,
    pub average_minutes_per_opening: f64,
    pub longest_opening_minutes: f64,
    pub shortest_opening_minutes: f64,

    pub probability_of_opening: f64,
    pub expected_duration_minutes: f64,
    pub confidence: f64,

    pub last_calculated: DateTime<Utc>,
}

impl AnalyticsCell {
    pub fn key(&self) -> CellKey {
        CellKey {
            bridge_id: self.bridge_id,
            year: self.year,
            month: self.month,
            day_of_week: self.day_of_week,
            hour: self.hour,
        }
    }
}

// ---------------------------------------------------------------------------
// Streaks
// ---------------------------------------------------------------------------

/// One completed quiet interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalStreak {
    /// When the bridge closed and the quiet interval began.
    pub start_date: DateTime<Utc>,
    pub duration_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub bridge_id: i64,
    pub bridge_name: String,
    pub current_streak_hours: f64,
    pub longest_streak_hours: f64,
    pub average_streak_hours: f64,
    pub streak_count: u32,
    pub confidence_level: f64,
    pub next_predicted_opening: Option<DateTime<Utc>>,
    /// Most recent first.
    pub historical_patterns: Vec<HistoricalStreak>,
}

/// The bridge that has stayed closed the longest over the champion window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyChampion {
    pub bridge_name: String,
    pub bridge_id: i64,
    pub streak_hours: f64,
    pub confidence_level: f64,
    pub historical_context: String,
}

// ---------------------------------------------------------------------------
// Cascades
// ---------------------------------------------------------------------------

/// "When `trigger` opens, `target` tends to open shortly after."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CascadeEdge {
    pub trigger_bridge_id: i64,
    pub trigger_bridge_name: String,
    pub target_bridge_id: i64,
    pub target_bridge_name: String,
    /// Fraction of trigger openings followed by a target opening in the window.
    pub cascade_strength: f64,
    /// Mean delay over matched openings only.
    pub delay_minutes: f64,
    pub trigger_openings: u32,
    pub matched_openings: u32,
}

/// Outgoing cascade weight of one bridge relative to the most influential one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeInfluence {
    pub bridge_id: i64,
    pub bridge_name: String,
    pub outgoing_strength: f64,
    pub influence_score: f64,
}

// ---------------------------------------------------------------------------
// Predictions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgePrediction {
    pub bridge_id: i64,
    pub generated_at: DateTime<Utc>,
    pub probability: f64,
    pub expected_duration_minutes: f64,
    pub confidence: f64,
    pub reasoning: String,
}

/// Everything one engine run produces for a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub cells: Vec<AnalyticsCell>,
    pub streaks: Vec<StreakRecord>,
    pub weekly_champion: Option<WeeklyChampion>,
    pub cascades: Vec<CascadeEdge>,
    pub influence: Vec<BridgeInfluence>,
    pub predictions: Vec<BridgePrediction>,
}

impl AnalyticsReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
