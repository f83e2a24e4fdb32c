//! Timestamp handling for the stored RFC 3339 strings.

use chrono::{DateTime, Utc};

/// Parses a timestamp as stored in the database back into UTC.
pub fn parse_stored(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

/// Stored timestamp rendered for messages, `DD.MM.YYYY HH:MM`. Falls
/// back to the raw string if it does not parse, so display code never
/// has to handle the error.
pub fn format_stored(raw: &str) -> String {
    match parse_stored(raw) {
        Ok(dt) => dt.format("%d.%m.%Y %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn roundtrips_stored_timestamps() {
        let dt = Utc.with_ymd_and_hms(2025, 3, 18, 19, 0, 0).unwrap();
        let stored = dt.to_rfc3339();
        assert_eq!(parse_stored(&stored).unwrap(), dt);
        assert_eq!(format_stored(&stored), "18.03.2025 19:00");
    }

    #[test]
    fn format_falls_back_on_garbage() {
        assert_eq!(format_stored("not-a-date"), "not-a-date");
    }
}
