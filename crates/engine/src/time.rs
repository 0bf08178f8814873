pub use media_ffmpeg::{Rational, rescale};

/// Timeline base `(1, 1_000_000)`.
pub const TIMELINE_TIME_BASE: Rational = Rational::MICROS;

/// Converts timeline ticks to seconds.
pub fn ticks_to_seconds(t_tl: i64) -> f64 {
    t_tl as f64 / f64::from(TIMELINE_TIME_BASE.den)
}

/// Converts seconds to timeline ticks, rounding to the nearest tick.
///
/// Non-finite input maps to zero.
pub fn seconds_to_ticks(seconds: f64) -> i64 {
    if !seconds.is_finite() {
        return 0;
    }
    (seconds * f64::from(TIMELINE_TIME_BASE.den)).round() as i64
}

/// Formats timeline ticks as `HH:MM:SS`, truncating sub-second precision.
///
/// # Example
/// ```
/// use engine::time::format_timecode;
///
/// assert_eq!(format_timecode(3_725_900_000), "01:02:05");
/// assert_eq!(format_timecode(-5), "00:00:00");
/// ```
pub fn format_timecode(t_tl: i64) -> String {
    let total_seconds = t_tl.max(0) / i64::from(TIMELINE_TIME_BASE.den);
    let hours = total_seconds / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Parses `SS`, `MM:SS` or `HH:MM:SS` (each optionally fractional in the
/// last field) into timeline ticks.
///
/// # Example
/// ```
/// use engine::time::parse_timecode;
///
/// assert_eq!(parse_timecode("1:30"), Some(90_000_000));
/// assert_eq!(parse_timecode("12.5"), Some(12_500_000));
/// assert_eq!(parse_timecode("1:xx"), None);
/// ```
pub fn parse_timecode(input: &str) -> Option<i64> {
    let fields: Vec<&str> = input.trim().split(':').collect();
    if fields.is_empty() || fields.len() > 3 {
        return None;
    }

    let (last, leading) = fields.split_last()?;
    let seconds = last.parse::<f64>().ok()?;
    if !seconds.is_finite() || seconds < 0.0 || (!leading.is_empty() && seconds >= 60.0) {
        return None;
    }

    let mut whole_seconds = 0_i64;
    for (index, field) in leading.iter().enumerate() {
        let value = field.parse::<u32>().ok()?;
        // Minutes are bounded when hours are present.
        if index == 1 && value >= 60 {
            return None;
        }
        whole_seconds = whole_seconds * 60 + i64::from(value);
    }

    Some(seconds_to_ticks(whole_seconds as f64 * 60.0 + seconds))
}
