/// City of Seattle bridge-opening records.
///
/// The open-data feed returns a JSON array of flat records, one per
/// opening. See `fixtures.rs` for annotated examples.
///
/// Record shape:
///   entitytype    - "Bridge"
///   entityname    - e.g. "Fremont Bridge"
///   entityid      - numeric id, delivered as a STRING
///   opendatetime  - local wall-clock time, no offset ("2025-03-04T06:12:00.000")
///   closedatetime - same format, absent or empty while the span is still up
///   minutesopen   - duration as a STRING
///   latitude, longitude - as STRINGs
///
/// Every value may arrive as a string or a number depending on the export,
/// so all fields are read leniently and converted here.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::calendar::AnalyticsCalendar;
use crate::error::IngestError;
use crate::model::BridgeEvent;

// ---------------------------------------------------------------------------
// Serde structures
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct OpenDataRecord {
    #[serde(rename = "entitytype", default, deserialize_with = "lenient_string")]
    entity_type: Option<String>,
    #[serde(rename = "entityname", default, deserialize_with = "lenient_string")]
    entity_name: Option<String>,
    #[serde(rename = "entityid", default, deserialize_with = "lenient_string")]
    entity_id: Option<String>,
    #[serde(rename = "opendatetime", default, deserialize_with = "lenient_string")]
    open_date_time: Option<String>,
    #[serde(rename = "closedatetime", default, deserialize_with = "lenient_string")]
    close_date_time: Option<String>,
    #[serde(rename = "minutesopen", default, deserialize_with = "lenient_string")]
    minutes_open: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    latitude: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    longitude: Option<String>,
}

/// Accepts a JSON string or number; anything else (including null and
/// blank strings) becomes `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses an open-data JSON array into `BridgeEvent`s.
///
/// Local timestamps are placed on `calendar`. Records that cannot be
/// turned into a valid event (missing id, malformed timestamp, close
/// before open, negative duration) are skipped with a warning.
///
/// # Errors
/// - `IngestError::ParseError` - the payload is not a JSON array of objects.
/// - `IngestError::NoDataAvailable` - the array was empty or every record was rejected.
pub fn parse_open_data(
    json: &str,
    calendar: &AnalyticsCalendar,
) -> Result<Vec<BridgeEvent>, IngestError> {
    let records: Vec<OpenDataRecord> = serde_json::from_str(json)
        .map_err(|e| IngestError::ParseError(format!("JSON deserialization failed: {}", e)))?;

    if records.is_empty() {
        return Err(IngestError::NoDataAvailable(
            "Open-data response contained no records".to_string(),
        ));
    }

    let total = records.len();
    let mut events = Vec::with_capacity(total);

    for (index, record) in records.into_iter().enumerate() {
        match to_event(record, calendar) {
            Ok(event) => events.push(event),
            Err(reason) => warn!("Skipping open-data record {}: {}", index, reason),
        }
    }

    if events.is_empty() {
        return Err(IngestError::NoDataAvailable(format!(
            "All {} records were rejected",
            total
        )));
    }

    debug!("Parsed {} of {} open-data records", events.len(), total);
    Ok(events)
}

fn to_event(record: OpenDataRecord, calendar: &AnalyticsCalendar) -> Result<BridgeEvent, String> {
    let raw_id = record.entity_id.ok_or("missing entityid")?;
    let entity_id: i64 = raw_id
        .parse()
        .map_err(|e| format!("invalid entityid '{}': {}", raw_id, e))?;

    let raw_open = record.open_date_time.ok_or("missing opendatetime")?;
    let open_time = parse_timestamp(&raw_open, calendar)
        .ok_or_else(|| format!("malformed opendatetime '{}'", raw_open))?;

    let close_time = match record.close_date_time {
        Some(raw) => Some(
            parse_timestamp(&raw, calendar)
                .ok_or_else(|| format!("malformed closedatetime '{}'", raw))?,
        ),
        None => None,
    };

    if let Some(close) = close_time {
        if close < open_time {
            return Err(format!("closedatetime precedes opendatetime for entity {}", entity_id));
        }
    }

    let minutes_open = match record.minutes_open.as_deref().map(str::parse::<f64>) {
        Some(Ok(minutes)) => minutes,
        // Derive from the timestamps when the duration is missing or garbled
        _ => close_time
            .map(|close| (close - open_time).num_seconds() as f64 / 60.0)
            .unwrap_or(0.0),
    };

    if !minutes_open.is_finite() || minutes_open < 0.0 {
        return Err(format!("invalid minutesopen {} for entity {}", minutes_open, entity_id));
    }

    let entity_name = record
        .entity_name
        .unwrap_or_else(|| format!("Bridge {}", entity_id));

    Ok(BridgeEvent {
        entity_id,
        entity_name,
        entity_type: record.entity_type.unwrap_or_else(|| "Bridge".to_string()),
        open_time,
        close_time,
        minutes_open,
        latitude: parse_coordinate(record.latitude.as_deref()),
        longitude: parse_coordinate(record.longitude.as_deref()),
    })
}

/// Local naive timestamps go through the calendar; anything carrying an
/// explicit offset is taken at face value.
fn parse_timestamp(raw: &str, calendar: &AnalyticsCalendar) -> Option<DateTime<Utc>> {
    if let Ok(local) = raw.parse::<NaiveDateTime>() {
        return calendar.to_utc(local);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_coordinate(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;
    use chrono::TimeZone;

    fn pacific() -> AnalyticsCalendar {
        AnalyticsCalendar::from_offset_minutes(-480).unwrap()
    }

    #[test]
    fn test_parse_fremont_single_record() {
        let events = parse_open_data(fixture_fremont_json(), &pacific())
            .expect("fixture should parse");

        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.entity_id, 3);
        assert_eq!(event.entity_name, "Fremont Bridge");
        assert_eq!(event.entity_type, "Bridge");
        // 06:12 PST is 14:12 UTC
        assert_eq!(event.open_time, Utc.with_ymd_and_hms(2025, 3, 4, 14, 12, 0).unwrap());
        assert_eq!(
            event.close_time,
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 14, 19, 0).unwrap())
        );
        assert!((event.minutes_open - 7.0).abs() < 1e-9);
        assert!((event.latitude - 47.647).abs() < 1e-6);
        assert!((event.longitude + 122.3497).abs() < 1e-6);
    }

    #[test]
    fn test_parse_multi_bridge_keeps_unterminated_opening() {
        let events = parse_open_data(fixture_multi_bridge_json(), &pacific())
            .expect("fixture should parse");

        assert_eq!(events.len(), 4);
        let still_open: Vec<_> = events.iter().filter(|e| e.is_open()).collect();
        assert_eq!(still_open.len(), 1);
        assert_eq!(still_open[0].entity_name, "Ballard Bridge");
        assert_eq!(still_open[0].minutes_open, 0.0);
    }

    #[test]
    fn test_numeric_fields_accepted() {
        let events = parse_open_data(fixture_multi_bridge_json(), &pacific())
            .expect("fixture should parse");
        let university = events
            .iter()
            .find(|e| e.entity_id == 6)
            .expect("University Bridge should be present");
        assert!((university.minutes_open - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_minutes_derived_from_timestamps() {
        let events = parse_open_data(fixture_multi_bridge_json(), &pacific())
            .expect("fixture should parse");
        let spokane = events
            .iter()
            .find(|e| e.entity_id == 7)
            .expect("Spokane St should be present");
        assert!((spokane.minutes_open - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_bad_records_are_skipped_not_fatal() {
        let events = parse_open_data(fixture_with_bad_records_json(), &pacific())
            .expect("good records should survive");
        assert_eq!(events.len(), 1, "only the well-formed record should remain");
        assert_eq!(events[0].entity_id, 2);
    }

    #[test]
    fn test_offset_timestamp_taken_at_face_value() {
        let json = r#"[{"entityid": "4", "entityname": "Montlake Bridge",
            "opendatetime": "2025-03-04T10:00:00Z", "minutesopen": "5"}]"#;
        let events = parse_open_data(json, &pacific()).expect("should parse");
        assert_eq!(events[0].open_time, Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_empty_array_is_no_data() {
        let result = parse_open_data("[]", &pacific());
        assert!(matches!(result, Err(IngestError::NoDataAvailable(_))));
    }

    #[test]
    fn test_all_rejected_is_no_data() {
        let json = r#"[{"entityname": "Nameless", "opendatetime": "garbage"}]"#;
        let result = parse_open_data(json, &pacific());
        assert!(matches!(result, Err(IngestError::NoDataAvailable(_))));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let result = parse_open_data("{ not json", &pacific());
        match result {
            Err(IngestError::ParseError(msg)) => assert!(msg.contains("JSON")),
            other => panic!("expected ParseError, got {:?}", other),
        }
    }
}
