/// Analytics configuration loader - parses analytics.toml
///
/// Keeps window lengths, thresholds, and composer weights out of the code
/// so they can be tuned without recompiling. Every section and every key is
/// optional; anything missing falls back to `Default`.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::calendar::AnalyticsCalendar;
use crate::error::AnalyticsError;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "analytics.toml";

/// Longest streak lookback accepted, in days (about ten years)
pub const MAX_LOOKBACK_DAYS: i64 = 3650;

/// Longest cascade trigger window or streak horizon accepted, in minutes (one week)
pub const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub calendar: CalendarConfig,
    pub streaks: StreakConfig,
    pub cascade: CascadeConfig,
    pub prediction: PredictionConfig,
    pub engine: EngineConfig,
}

/// Calendar used for bucketing and local-time descriptions
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Minutes east of UTC (Seattle standard time is -480)
    pub utc_offset_minutes: i32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: -480,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreakConfig {
    /// Lookback window for per-bridge streak records
    pub lookback_days: i64,

    /// Lookback window for the weekly champion
    pub champion_lookback_days: i64,

    /// Streak count at which data-density confidence reaches 1.0
    pub density_saturation: u32,
}

impl Default for StreakConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            champion_lookback_days: 7,
            density_saturation: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Target must open within this many minutes after the trigger
    pub trigger_window_minutes: i64,

    /// Edges with a lower conditional frequency are dropped
    pub min_strength: f64,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            trigger_window_minutes: 30,
            min_strength: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    /// Returned when no analytics cell matches the current slot
    pub default_probability: f64,
    pub default_expected_duration_minutes: f64,

    /// Share of the remaining probability mass a confident streak signal can claim
    pub streak_weight: f64,

    /// Share of the remaining probability mass a cascade signal can claim
    pub cascade_weight: f64,

    /// A predicted opening this close to "now" counts as imminent
    pub streak_horizon_minutes: i64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            default_probability: 0.1,
            default_expected_duration_minutes: 15.0,
            streak_weight: 0.3,
            cascade_weight: 0.5,
            streak_horizon_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { worker_threads: 3 }
    }
}

impl AnalyticsConfig {
    /// Rejects values the engines cannot work with.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        self.calendar()?;

        for (name, days) in [
            ("lookback_days", self.streaks.lookback_days),
            ("champion_lookback_days", self.streaks.champion_lookback_days),
        ] {
            if !(1..=MAX_LOOKBACK_DAYS).contains(&days) {
                return Err(AnalyticsError::InvalidConfig(format!(
                    "streaks.{} {} is outside 1..={} days",
                    name, days, MAX_LOOKBACK_DAYS
                )));
            }
        }
        if self.streaks.density_saturation == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "streaks.density_saturation must be positive".to_string(),
            ));
        }
        if !(1..=MAX_WINDOW_MINUTES).contains(&self.cascade.trigger_window_minutes) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "cascade.trigger_window_minutes {} is outside 1..={}",
                self.cascade.trigger_window_minutes, MAX_WINDOW_MINUTES
            )));
        }
        if !(0.0..=1.0).contains(&self.cascade.min_strength) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "cascade.min_strength {} is outside [0, 1]",
                self.cascade.min_strength
            )));
        }

        let p = &self.prediction;
        for (name, value) in [
            ("default_probability", p.default_probability),
            ("streak_weight", p.streak_weight),
            ("cascade_weight", p.cascade_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AnalyticsError::InvalidConfig(format!(
                    "prediction.{} {} is outside [0, 1]",
                    name, value
                )));
            }
        }
        if p.default_expected_duration_minutes < 0.0 {
            return Err(AnalyticsError::InvalidConfig(
                "prediction.default_expected_duration_minutes must not be negative".to_string(),
            ));
        }
        if !(0..=MAX_WINDOW_MINUTES).contains(&p.streak_horizon_minutes) {
            return Err(AnalyticsError::InvalidConfig(format!(
                "prediction.streak_horizon_minutes {} is outside 0..={}",
                p.streak_horizon_minutes, MAX_WINDOW_MINUTES
            )));
        }
        if self.engine.worker_threads == 0 {
            return Err(AnalyticsError::InvalidConfig(
                "engine.worker_threads must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Calendar described by the `[calendar]` section.
    pub fn calendar(&self) -> Result<AnalyticsCalendar, AnalyticsError> {
        AnalyticsCalendar::from_offset_minutes(self.calendar.utc_offset_minutes)
    }
}

/// Loads `analytics.toml` from the current working directory.
pub fn load_config() -> Result<AnalyticsConfig, AnalyticsError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<AnalyticsConfig, AnalyticsError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| AnalyticsError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    let config = load_config_from_str(&contents)?;
    log::debug!("Loaded analytics configuration from {}", path.display());
    Ok(config)
}

/// Parses and validates configuration text.
pub fn load_config_from_str(contents: &str) -> Result<AnalyticsConfig, AnalyticsError> {
    let config: AnalyticsConfig = toml::from_str(contents)?;
    config.validate()?;
    Ok(config)
}
