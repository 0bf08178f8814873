use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MediaFfmpegError, Result};

/// A positive `num/den` fraction: a stream time base or a frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    /// One microsecond, the unit of timeline ticks.
    pub const MICROS: Self = Self {
        num: 1,
        den: 1_000_000,
    };

    /// Fails with [`MediaFfmpegError::InvalidRational`] unless both terms are positive.
    ///
    /// # Example
    /// ```
    /// use media_ffmpeg::Rational;
    ///
    /// assert_eq!(Rational::new(1, 48_000).expect("valid").den, 48_000);
    /// assert!(Rational::new(0, 1).is_err());
    /// ```
    pub fn new(num: i32, den: i32) -> Result<Self> {
        match (num, den) {
            (n, d) if n > 0 && d > 0 => Ok(Self { num, den }),
            _ => Err(MediaFfmpegError::InvalidRational { num, den }),
        }
    }

    /// Reads ffprobe's `30000/1001` notation.
    ///
    /// # Example
    /// ```
    /// use media_ffmpeg::Rational;
    ///
    /// assert_eq!(Rational::parse("30000/1001").expect("valid").num, 30_000);
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        input.parse()
    }
}

impl FromStr for Rational {
    type Err = MediaFfmpegError;

    fn from_str(input: &str) -> Result<Self> {
        let malformed = || MediaFfmpegError::Parse {
            context: "rational",
            value: input.to_string(),
        };
        let (num, den) = input.split_once('/').ok_or_else(malformed)?;
        let num = num.trim().parse::<i32>().map_err(|_| malformed())?;
        let den = den.trim().parse::<i32>().map_err(|_| malformed())?;
        Self::new(num, den)
    }
}

impl Display for Rational {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Converts `ts` between time bases, rounding half away from zero and
/// saturating at the `i64` range.
///
/// # Example
/// ```
/// use media_ffmpeg::{rescale, Rational};
///
/// let src = Rational::new(1, 90_000).expect("valid");
/// assert_eq!(rescale(90_000, src, Rational::MICROS), 1_000_000);
/// ```
pub fn rescale(ts: i64, from: Rational, to: Rational) -> i64 {
    let scaled = i128::from(ts) * i128::from(from.num) * i128::from(to.den);
    let divisor = i128::from(from.den) * i128::from(to.num);
    let half = divisor / 2;
    let rounded = if scaled >= 0 {
        (scaled + half) / divisor
    } else {
        (scaled - half) / divisor
    };
    i64::try_from(rounded).unwrap_or(if rounded < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::{Rational, rescale};

    #[test]
    fn zero_or_missing_terms_are_rejected() {
        assert!(Rational::parse("0/0").is_err());
        assert!(Rational::parse("25/0").is_err());
        assert!(Rational::parse("25").is_err());
        assert!(Rational::parse("a/b").is_err());
    }

    #[test]
    fn ntsc_frame_duration_rounds_to_nearest_microsecond() {
        let tb = Rational::new(1, 30_000).expect("valid rational");
        assert_eq!(rescale(1_001, tb, Rational::MICROS), 33_367);
        assert_eq!(rescale(-1_001, tb, Rational::MICROS), -33_367);
    }

    #[test]
    fn microseconds_map_back_into_stream_ticks() {
        let tb = Rational::new(1, 12_800).expect("valid rational");
        assert_eq!(rescale(2_500_000, Rational::MICROS, tb), 32_000);
    }

    #[test]
    fn huge_values_saturate() {
        let tb = Rational::new(1, 1).expect("valid rational");
        assert_eq!(rescale(i64::MAX, tb, Rational::MICROS), i64::MAX);
    }

    #[test]
    fn formats_as_ffmpeg_fraction() {
        assert_eq!(Rational::new(1, 15_360).expect("valid").to_string(), "1/15360");
    }
}
