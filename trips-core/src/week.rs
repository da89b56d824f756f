//! Week buckets used to group trips for the weekly average.
//!
//! A bucket is the calendar year plus a zero-based, Monday-start week number:
//! week `01` begins on the first Monday of the year and any earlier days fall
//! into week `00`. This is the rule SQLite applies for `strftime('%Y-%W', ..)`,
//! which the aggregate query groups by, so buckets computed here always agree
//! with the database.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use thiserror::Error;

const DATE_LEN: usize = 10;
const MINUTES_LEN: usize = 16;
const SECONDS_LEN: usize = 19;

/// A `(year, week-of-year)` pair.
///
/// # Examples
///
/// ```
/// use trips_core::WeekBucket;
///
/// let sunday = WeekBucket::from_timestamp("2023-01-01")?;
/// let monday = WeekBucket::from_timestamp("2023-01-02 08:15:00")?;
/// assert_eq!(sunday.to_string(), "2023-00");
/// assert_eq!(monday.to_string(), "2023-01");
/// # Ok::<(), trips_core::WeekBucketError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekBucket {
    /// Calendar year of the timestamp.
    pub year: i32,
    /// Week number in `0..=53`.
    pub week: u32,
}

impl WeekBucket {
    /// Bucket for a calendar date.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        let days_since_monday = date.weekday().num_days_from_monday();
        Self {
            year: date.year(),
            week: (date.ordinal0() + 7 - days_since_monday) / 7,
        }
    }

    /// Parse a timestamp and return its bucket.
    ///
    /// Accepted forms are `YYYY-MM-DD`, optionally followed by a space or `T`
    /// and `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fff`. Fields must be zero-padded.
    pub fn from_timestamp(text: &str) -> Result<Self, WeekBucketError> {
        let malformed = || WeekBucketError::Malformed {
            text: text.to_owned(),
        };
        if !has_timestamp_shape(text.as_bytes()) {
            return Err(malformed());
        }
        let (date_part, time_part) = text.split_at_checked(DATE_LEN).ok_or_else(malformed)?;
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|source| {
            WeekBucketError::InvalidDate {
                text: text.to_owned(),
                source,
            }
        })?;
        if let Some(time) = time_part.get(1..) {
            let format = if time.len() == MINUTES_LEN - DATE_LEN - 1 {
                "%H:%M"
            } else {
                "%H:%M:%S%.f"
            };
            let parsed = NaiveTime::parse_from_str(time, format).map_err(|source| {
                WeekBucketError::InvalidDate {
                    text: text.to_owned(),
                    source,
                }
            })?;
            // chrono encodes second 60 as an overflowing nanosecond count;
            // SQLite yields NULL for it.
            if parsed.nanosecond() >= 1_000_000_000 {
                return Err(WeekBucketError::LeapSecond {
                    text: text.to_owned(),
                });
            }
        }
        Ok(Self::from_date(date))
    }
}

impl fmt::Display for WeekBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.week)
    }
}

/// Checks the fixed-width layout SQLite requires before handing the text to
/// `chrono`, which is more lenient about padding.
fn has_timestamp_shape(bytes: &[u8]) -> bool {
    let digits_at = |positions: &[usize]| {
        positions
            .iter()
            .all(|&pos| bytes.get(pos).is_some_and(u8::is_ascii_digit))
    };
    let byte_is = |pos: usize, expected: u8| bytes.get(pos) == Some(&expected);

    let date_ok = digits_at(&[0, 1, 2, 3, 5, 6, 8, 9]) && byte_is(4, b'-') && byte_is(7, b'-');
    if !date_ok {
        return false;
    }
    match bytes.len() {
        DATE_LEN => true,
        MINUTES_LEN | SECONDS_LEN => time_shape(bytes),
        len if len > SECONDS_LEN + 1 => {
            time_shape(bytes)
                && byte_is(SECONDS_LEN, b'.')
                && bytes
                    .get(SECONDS_LEN + 1..)
                    .is_some_and(|fraction| fraction.iter().all(u8::is_ascii_digit))
        }
        _ => false,
    }
}

fn time_shape(bytes: &[u8]) -> bool {
    let separator_ok = matches!(bytes.get(DATE_LEN), Some(b' ' | b'T'));
    let digit = |pos: usize| bytes.get(pos).is_some_and(u8::is_ascii_digit);
    let minutes_ok = digit(11) && digit(12) && bytes.get(13) == Some(&b':') && digit(14) && digit(15);
    let seconds_ok =
        bytes.len() == MINUTES_LEN || (bytes.get(16) == Some(&b':') && digit(17) && digit(18));
    separator_ok && minutes_ok && seconds_ok
}

/// Errors raised when a timestamp cannot be bucketed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WeekBucketError {
    /// The text does not follow the accepted timestamp layout.
    #[error("timestamp {text:?} is not in YYYY-MM-DD[ HH:MM[:SS[.fff]]] form")]
    Malformed {
        /// Rejected timestamp.
        text: String,
    },
    /// The layout is right but the date or time does not exist.
    #[error("timestamp {text:?} is not a valid calendar date or time")]
    InvalidDate {
        /// Rejected timestamp.
        text: String,
        /// Parser error returned by `chrono`.
        #[source]
        source: chrono::ParseError,
    },
    /// The time names a leap second, which the store cannot bucket.
    #[error("timestamp {text:?} has a seconds field of 60")]
    LeapSecond {
        /// Rejected timestamp.
        text: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2023-01-01", 2023, 0)]
    #[case("2023-01-02", 2023, 1)]
    #[case("2023-01-08 23:59:59", 2023, 1)]
    #[case("2023-01-30 10:00", 2023, 5)]
    #[case("2023-02-05T12:00:00", 2023, 5)]
    #[case("2023-02-06 00:00:00.250", 2023, 6)]
    #[case("2024-01-01", 2024, 1)]
    #[case("2024-12-31 18:45:00", 2024, 53)]
    #[case("2018-05-28 09:03:40", 2018, 22)]
    fn buckets_known_calendar_dates(#[case] text: &str, #[case] year: i32, #[case] week: u32) {
        let bucket = WeekBucket::from_timestamp(text).expect("timestamp should parse");
        assert_eq!(bucket, WeekBucket { year, week });
    }

    #[rstest]
    #[case("")]
    #[case("2023-1-05")]
    #[case("2023/01/05")]
    #[case("2023-01-05 9:03")]
    #[case("2023-01-05 09:03:4")]
    #[case("2023-01-05 09:03:40.")]
    #[case("2023-01-05 09:03:40Z")]
    #[case("yesterday")]
    fn rejects_malformed_layouts(#[case] text: &str) {
        let err = WeekBucket::from_timestamp(text).expect_err("layout should be rejected");
        assert!(matches!(err, WeekBucketError::Malformed { .. }), "{err:?}");
    }

    #[rstest]
    #[case("2023-02-30")]
    #[case("2023-13-01 10:00")]
    #[case("2023-01-05 25:00:00")]
    fn rejects_impossible_dates(#[case] text: &str) {
        let err = WeekBucket::from_timestamp(text).expect_err("date should be rejected");
        assert!(matches!(err, WeekBucketError::InvalidDate { .. }), "{err:?}");
    }

    #[rstest]
    #[case("2023-01-30 23:59:60")]
    #[case("2023-01-05T23:59:60.500")]
    fn rejects_leap_seconds(#[case] text: &str) {
        let err = WeekBucket::from_timestamp(text).expect_err("leap second should be rejected");
        assert_eq!(
            err,
            WeekBucketError::LeapSecond {
                text: text.to_owned()
            }
        );
    }

    #[rstest]
    fn displays_zero_padded_week() {
        let bucket = WeekBucket {
            year: 2023,
            week: 5,
        };
        assert_eq!(bucket.to_string(), "2023-05");
    }
}
