//! Human-readable durations (e.g. "24h", "90m").

use std::time::Duration;
use thiserror::Error;

/// Error parsing a duration string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid duration '{input}' - expected format like '24h', '90m', '3600s', or '1d'")]
pub struct DurationParseError {
    input: String,
}

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Parse a duration with an optional `s`, `m`, `h` or `d` suffix.
///
/// Bare numbers are seconds.
///
/// ```
/// use std::time::Duration;
/// use popgrid::config::parse_duration;
///
/// assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
/// assert_eq!(parse_duration("90m").unwrap(), Duration::from_secs(5_400));
/// assert_eq!(parse_duration("3600").unwrap(), Duration::from_secs(3_600));
/// ```
pub fn parse_duration(s: &str) -> Result<Duration, DurationParseError> {
    let invalid = || DurationParseError {
        input: s.to_string(),
    };
    let lower = s.trim().to_ascii_lowercase();

    let (number, unit) = match lower.char_indices().last() {
        Some((i, 's')) => (&lower[..i], 1),
        Some((i, 'm')) => (&lower[..i], MINUTE),
        Some((i, 'h')) => (&lower[..i], HOUR),
        Some((i, 'd')) => (&lower[..i], DAY),
        Some(_) => (lower.as_str(), 1),
        None => return Err(invalid()),
    };

    let value: u64 = number.trim().parse().map_err(|_| invalid())?;
    value
        .checked_mul(unit)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

/// Format a duration with the largest exact unit.
///
/// ```
/// use std::time::Duration;
/// use popgrid::config::format_duration;
///
/// assert_eq!(format_duration(Duration::from_secs(86_400)), "1d");
/// assert_eq!(format_duration(Duration::from_secs(5_400)), "90m");
/// assert_eq!(format_duration(Duration::from_secs(61)), "61s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    [(DAY, "d"), (HOUR, "h"), (MINUTE, "m")]
        .iter()
        .find(|(unit, _)| secs >= *unit && secs % unit == 0)
        .map(|(unit, suffix)| format!("{}{}", secs / unit, suffix))
        .unwrap_or_else(|| format!("{}s", secs))
}
