use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// All user-facing timestamps are WIB (UTC+7), matching where the bot's
/// guilds live. Stored values are WIB wall-clock without offset.
const UTC_OFFSET_HOURS: i32 = 7;

fn offset() -> FixedOffset {
    FixedOffset::east_opt(UTC_OFFSET_HOURS * 3600).expect("valid utc offset")
}

pub fn now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset())
}

pub fn now_naive() -> NaiveDateTime {
    now().naive_local()
}

pub fn today() -> NaiveDate {
    now().date_naive()
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date {input:?}, expected YYYY-MM-DD"))
}

pub fn parse_date_time(date: &str, time: &str) -> Result<NaiveDateTime> {
    let combined = format!("{} {}", date.trim(), time.trim());
    NaiveDateTime::parse_from_str(&combined, "%Y-%m-%d %H:%M")
        .map_err(|_| anyhow!("invalid time {combined:?}, expected YYYY-MM-DD HH:MM"))
}

/// Half-open [midnight, next midnight) window for a calendar day.
pub fn day_bounds(day: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = day.and_hms_opt(0, 0, 0).expect("midnight exists");
    (start, start + Duration::days(1))
}

pub fn format_hms(total_secs: i64) -> String {
    let secs = total_secs.max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_iso_dates() {
        assert_eq!(
            parse_date("2025-03-09").unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
        );
        assert_eq!(
            parse_date(" 2025-12-31 ").unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
        assert!(parse_date("31-12-2025").is_err());
        assert!(parse_date("soon").is_err());
    }

    #[test]
    fn parses_date_plus_time() {
        let dt = parse_date_time("2025-03-09", "14:05").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2025-03-09 14:05:00");
        assert!(parse_date_time("2025-03-09", "25:00").is_err());
    }

    #[test]
    fn day_bounds_cover_one_day() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let (start, end) = day_bounds(day);
        assert_eq!(end - start, Duration::days(1));
        assert_eq!(start.date(), day);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(59), "00:00:59");
        assert_eq!(format_hms(3661), "01:01:01");
        assert_eq!(format_hms(-5), "00:00:00");
    }
}
