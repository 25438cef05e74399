//! Human-readable byte sizes (e.g. "8KB", "1MB").

use thiserror::Error;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '8KB', '1MB', or '4096'")]
pub struct SizeParseError {
    input: String,
}

const KB: usize = 1024;
const MB: usize = 1024 * KB;
const GB: usize = 1024 * MB;

/// Suffixes in match order; longer forms first so "KB" wins over "B".
const SUFFIXES: [(&str, usize); 7] = [
    ("GB", GB),
    ("MB", MB),
    ("KB", KB),
    ("G", GB),
    ("M", MB),
    ("K", KB),
    ("B", 1),
];

/// Parse a human-readable size into bytes.
///
/// Bare numbers are bytes; `K`/`KB`, `M`/`MB` and `G`/`GB` are binary
/// multiples. Case and surrounding whitespace are ignored.
///
/// # Examples
///
/// ```
/// use popgrid::config::parse_size;
///
/// assert_eq!(parse_size("8KB").unwrap(), 8 * 1024);
/// assert_eq!(parse_size("1 mb").unwrap(), 1024 * 1024);
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// ```
pub fn parse_size(s: &str) -> Result<usize, SizeParseError> {
    let invalid = || SizeParseError {
        input: s.to_string(),
    };
    let upper = s.trim().to_ascii_uppercase();

    let (number, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, multiplier)| {
            upper
                .strip_suffix(suffix)
                .map(|number| (number.trim(), *multiplier))
        })
        .unwrap_or((upper.as_str(), 1));

    if number.is_empty() {
        return Err(invalid());
    }
    let value: usize = number.parse().map_err(|_| invalid())?;
    value.checked_mul(multiplier).ok_or_else(invalid)
}

/// Format a byte count using the largest exact binary unit.
///
/// ```
/// use popgrid::config::format_size;
///
/// assert_eq!(format_size(8 * 1024), "8KB");
/// assert_eq!(format_size(1000), "1000");
/// ```
pub fn format_size(bytes: usize) -> String {
    [(GB, "GB"), (MB, "MB"), (KB, "KB")]
        .iter()
        .find(|(unit, _)| bytes >= *unit && bytes % unit == 0)
        .map(|(unit, suffix)| format!("{}{}", bytes / unit, suffix))
        .unwrap_or_else(|| bytes.to_string())
}

/// Format a byte count for display, with one decimal for large values.
pub fn format_bytes(bytes: u64) -> String {
    let bytes_f = bytes as f64;
    if bytes >= GB as u64 {
        format!("{:.1} GB", bytes_f / GB as f64)
    } else if bytes >= MB as u64 {
        format!("{:.1} MB", bytes_f / MB as f64)
    } else if bytes >= KB as u64 {
        format!("{:.1} KB", bytes_f / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("8kb").unwrap(), 8 * 1024);
        assert_eq!(parse_size("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("1GB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size("512B").unwrap(), 512);
        assert_eq!(parse_size(" 16 KB ").unwrap(), 16 * 1024);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_size("").is_err());
        assert!(parse_size("KB").is_err());
        assert!(parse_size("1.5MB").is_err());
        assert!(parse_size("-1KB").is_err());
        assert!(parse_size("2TB").is_err());
    }

    #[test]
    fn test_format_round_trips() {
        for s in ["8KB", "1MB", "3GB", "1000"] {
            assert_eq!(format_size(parse_size(s).unwrap()), s);
        }
    }

    #[test]
    fn test_format_bytes_for_display() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
