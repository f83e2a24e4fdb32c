//! Input validation for user- and admin-supplied values.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};

/// Parses an admin-supplied training date, `DD.MM.YYYY`.
///
/// Sessions run on the club schedule only: Tuesdays at 19:00 and
/// Saturdays at 11:00. The date must be in the future.
pub fn validate_training_date(
    input: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, String> {
    let day = NaiveDate::parse_from_str(input.trim(), "%d.%m.%Y")
        .map_err(|_| "Invalid date format, expected DD.MM.YYYY".to_string())?;

    let start = match day.weekday() {
        Weekday::Tue => day.and_hms_opt(19, 0, 0),
        Weekday::Sat => day.and_hms_opt(11, 0, 0),
        _ => return Err("Trainings run on Tuesdays (19:00) and Saturdays (11:00) only".to_string()),
    }
    .ok_or_else(|| "Invalid date".to_string())?
    .and_utc();

    if start <= now {
        return Err("The date must be in the future".to_string());
    }
    Ok(start)
}

/// OSD nicknames end up on the video feed, so keep them short and plain.
pub fn validate_nickname(input: &str) -> Result<String, String> {
    let nickname = input.trim();
    let length = nickname.chars().count();
    if !(2..=32).contains(&length) {
        return Err("The nickname must be 2 to 32 characters".to_string());
    }
    if !nickname
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ')
    {
        return Err("Only letters, digits, spaces, '_' and '-' are allowed".to_string());
    }
    Ok(nickname.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> DateTime<Utc> {
        // A Monday.
        Utc.with_ymd_and_hms(2025, 3, 17, 12, 0, 0).unwrap()
    }

    #[test]
    fn accepts_tuesday_at_19() {
        let dt = validate_training_date("18.03.2025", clock()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 3, 18, 19, 0, 0).unwrap());
    }

    #[test]
    fn accepts_saturday_at_11() {
        let dt = validate_training_date("22.03.2025", clock()).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 3, 22, 11, 0, 0).unwrap());
    }

    #[test]
    fn rejects_other_weekdays() {
        assert!(validate_training_date("19.03.2025", clock()).is_err());
    }

    #[test]
    fn rejects_past_dates() {
        assert!(validate_training_date("11.03.2025", clock()).is_err());
    }

    #[test]
    fn rejects_bad_format() {
        assert!(validate_training_date("2025-03-18", clock()).is_err());
    }

    #[test]
    fn nickname_bounds() {
        assert!(validate_nickname("Maverick").is_ok());
        assert!(validate_nickname("a").is_err());
        assert!(validate_nickname("<script>").is_err());
        assert_eq!(validate_nickname("  Ace  ").unwrap(), "Ace");
    }

    #[test]
    fn nickname_length_counts_characters_not_bytes() {
        // 20 Cyrillic letters are 40 bytes but well within the limit.
        assert!(validate_nickname(&"б".repeat(20)).is_ok());
        // A single two-byte letter is still too short.
        assert!(validate_nickname("Ж").is_err());
        assert!(validate_nickname(&"б".repeat(33)).is_err());
    }
}
