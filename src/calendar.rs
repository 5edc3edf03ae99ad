/// Explicit calendar used to turn UTC timestamps into local calendar slots.
///
/// Every engine that needs a weekday, an hour, or a local date takes an
/// `AnalyticsCalendar` argument instead of asking the host for its timezone,
/// so results are identical on every machine.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone,
    Timelike, Utc,
};

use crate::error::AnalyticsError;

/// Local calendar position of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarSlot {
    pub year: i32,
    pub month: u32,
    /// Sunday = 1 ... Saturday = 7
    pub day_of_week: u32,
    pub hour: u32,
}

/// Fixed-offset calendar. Daylight saving transitions are not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsCalendar {
    offset: FixedOffset,
}

impl AnalyticsCalendar {
    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    /// Builds a calendar from an offset in minutes east of UTC
    /// (Seattle standard time is `-480`).
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, AnalyticsError> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(|offset| Self { offset })
            .ok_or(AnalyticsError::InvalidUtcOffset(minutes))
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local wall-clock time for a UTC instant, or `None` when shifting by
    /// the offset leaves chrono's representable range.
    pub fn local_datetime(&self, ts: DateTime<Utc>) -> Option<NaiveDateTime> {
        ts.naive_utc()
            .checked_add_signed(Duration::seconds(self.offset.local_minus_utc() as i64))
    }

    pub fn local_date(&self, ts: DateTime<Utc>) -> Option<NaiveDate> {
        self.local_datetime(ts).map(|dt| dt.date())
    }

    pub fn slot(&self, ts: DateTime<Utc>) -> Option<CalendarSlot> {
        let local = self.local_datetime(ts)?;
        Some(CalendarSlot {
            year: local.year(),
            month: local.month(),
            day_of_week: local.weekday().number_from_sunday(),
            hour: local.hour(),
        })
    }

    /// Interprets a local wall-clock time in this calendar.
    pub fn to_utc(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        self.offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Number of local calendar days from `first` to `last`, inclusive.
    /// Returns 0 if either end cannot be placed on the calendar.
    pub fn days_spanned(&self, first: DateTime<Utc>, last: DateTime<Utc>) -> i64 {
        match (self.local_date(first), self.local_date(last)) {
            (Some(a), Some(b)) => (b - a).num_days().abs() + 1,
            _ => 0,
        }
    }

    /// Short human label such as "Tue 14:05".
    pub fn describe(&self, ts: DateTime<Utc>) -> String {
        match self.local_datetime(ts) {
            Some(local) => local.format("%a %H:%M").to_string(),
            None => ts.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

impl Default for AnalyticsCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_uses_sunday_as_day_one() {
        let calendar = AnalyticsCalendar::utc();
        // 2025-03-02 is a Sunday
        let sunday = Utc.with_ymd_and_hms(2025, 3, 2, 9, 30, 0).unwrap();
        let saturday = Utc.with_ymd_and_hms(2025, 3, 8, 23, 59, 0).unwrap();

        assert_eq!(calendar.slot(sunday).unwrap().day_of_week, 1);
        assert_eq!(calendar.slot(saturday).unwrap().day_of_week, 7);
        assert_eq!(calendar.slot(saturday).unwrap().hour, 23);
    }

    #[test]
    fn test_offset_shifts_hour_and_weekday() {
        let pacific = AnalyticsCalendar::from_offset_minutes(-480).unwrap();
        // 03:00 UTC Monday is 19:00 Sunday in PST
        let ts = Utc.with_ymd_and_hms(2025, 3, 3, 3, 0, 0).unwrap();
        let slot = pacific.slot(ts).unwrap();

        assert_eq!(slot.hour, 19);
        assert_eq!(slot.day_of_week, 1);
        assert_eq!(slot.month, 3);
        assert_eq!(slot.year, 2025);
    }

    #[test]
    fn test_offset_reports_configured_minutes() {
        let pacific = AnalyticsCalendar::from_offset_minutes(-480).unwrap();
        assert_eq!(pacific.offset().local_minus_utc(), -8 * 3600);
        assert_eq!(AnalyticsCalendar::utc().offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_year_boundary_follows_local_calendar() {
        let pacific = AnalyticsCalendar::from_offset_minutes(-480).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 2, 0, 0).unwrap();
        let slot = pacific.slot(ts).unwrap();
        assert_eq!(slot.year, 2024);
        assert_eq!(slot.month, 12);
    }

    #[test]
    fn test_invalid_offset_rejected() {
        assert!(matches!(
            AnalyticsCalendar::from_offset_minutes(24 * 60),
            Err(AnalyticsError::InvalidUtcOffset(1440))
        ));
        assert!(AnalyticsCalendar::from_offset_minutes(i32::MAX).is_err());
    }

    #[test]
    fn test_days_spanned_is_inclusive() {
        let calendar = AnalyticsCalendar::utc();
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 0, 5, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 3, 3, 23, 0, 0).unwrap();
        assert_eq!(calendar.days_spanned(a, b), 3);
        assert_eq!(calendar.days_spanned(a, a), 1);
    }

    #[test]
    fn test_to_utc_round_trips_local_time() {
        let pacific = AnalyticsCalendar::from_offset_minutes(-480).unwrap();
        let local = NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let utc = pacific.to_utc(local).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2025, 3, 4, 14, 0, 0).unwrap());
        assert_eq!(pacific.local_datetime(utc), Some(local));
    }

    #[test]
    fn test_describe_formats_local_weekday_and_time() {
        let pacific = AnalyticsCalendar::from_offset_minutes(-480).unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 3, 4, 22, 5, 0).unwrap();
        assert_eq!(pacific.describe(ts), "Tue 14:05");
    }
}
