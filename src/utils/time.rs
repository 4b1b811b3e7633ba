use anyhow::{anyhow, bail, Result};
use chrono::{Duration, NaiveDate};

/// This is the standard way of converting a date to a progress key in timecraft.
pub fn date_to_day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Formats a duration as hours and minutes, e.g. `1h 30m`. Seconds are truncated and negative
/// durations are shown as `0m`.
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    match (hours, minutes) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Formats seconds as a running clock, `HH:MM:SS`.
pub fn format_clock(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Converts stored progress seconds, clamping values past the representable range.
pub fn duration_from_seconds(seconds: u64) -> Duration {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Parses durations like `1h30m`, `45m`, `90s` or a bare number of minutes.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    if value.is_empty() {
        bail!("Empty duration");
    }
    let too_large = || anyhow!("Duration {value} is too large");
    if let Ok(minutes) = value.parse::<i64>() {
        return Duration::try_minutes(minutes).ok_or_else(too_large);
    }

    let mut total = Duration::zero();
    let mut number = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let amount = number
            .parse::<i64>()
            .map_err(|_| anyhow!("Can't parse {value} into a duration"))?;
        number.clear();
        let part = match c {
            'h' => Duration::try_hours(amount),
            'm' => Duration::try_minutes(amount),
            's' => Duration::try_seconds(amount),
            _ => bail!("Unknown duration unit {c} in {value}"),
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(too_large)?;
    }
    if !number.is_empty() {
        bail!("Missing unit after {number} in {value}");
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::{
        date_to_day_key, duration_from_seconds, format_clock, format_duration, parse_duration,
    };

    #[test]
    fn day_key_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(date_to_day_key(date), "2025-03-07");
    }

    #[test]
    fn formats_hours_and_minutes() {
        assert_eq!(format_duration(Duration::seconds(59)), "0m");
        assert_eq!(format_duration(Duration::minutes(90)), "1h 30m");
        assert_eq!(format_duration(Duration::hours(2)), "2h");
        assert_eq!(format_duration(Duration::seconds(-30)), "0m");
    }

    #[test]
    fn formats_running_clock() {
        assert_eq!(format_clock(0), "00:00:00");
        assert_eq!(format_clock(3725), "01:02:05");
        assert_eq!(format_clock(100 * 3600), "100:00:00");
    }

    #[test]
    fn parses_compound_durations() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::minutes(90));
        assert_eq!(parse_duration("90s").unwrap(), Duration::seconds(90));
        assert_eq!(parse_duration("45").unwrap(), Duration::minutes(45));
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("1h30").is_err());
    }

    #[test]
    fn oversized_durations_are_errors() {
        assert!(parse_duration("9999999999999999h").is_err());
        assert!(parse_duration("9999999999999999").is_err());
        assert!(parse_duration("99999999999999999999m").is_err());
        assert!(parse_duration("2562047788015h2562047788015h").is_err());
    }

    #[test]
    fn huge_progress_seconds_are_clamped() {
        assert_eq!(duration_from_seconds(90), Duration::seconds(90));
        assert_eq!(duration_from_seconds(u64::MAX), Duration::MAX);
        assert_eq!(duration_from_seconds(i64::MAX as u64), Duration::MAX);
    }
}
