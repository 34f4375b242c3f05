//! Time frames and period derivation.
//!
//! Every analyzer run works on a single bounded time frame: the previous
//! completed day, week or month relative to a computation date.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Far-future sentinel used when a frame has no end bound (Sept 2286).
const FAR_FUTURE_SECS: i64 = 10_000_000_000;

/// Errors raised when building a time frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeFrameError {
    #[error("at least one bound must be provided")]
    MissingBounds,
    #[error("start and end out of sequence ({start} >= {end})")]
    OutOfSequence {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// An immutable time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FrameBounds")]
pub struct TimeFrame {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Serialized form of a frame, checked on the way in.
#[derive(Deserialize)]
struct FrameBounds {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl TryFrom<FrameBounds> for TimeFrame {
    type Error = TimeFrameError;

    fn try_from(bounds: FrameBounds) -> Result<Self, Self::Error> {
        TimeFrame::new(bounds.start, bounds.end)
    }
}

impl TimeFrame {
    /// Create a time frame from optional bounds.
    ///
    /// Either bound can be omitted but not both. A missing start defaults to
    /// the epoch, a missing end to a far-future instant.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, TimeFrameError> {
        if start.is_none() && end.is_none() {
            return Err(TimeFrameError::MissingBounds);
        }
        let start = start.unwrap_or(DateTime::UNIX_EPOCH);
        let end = end.unwrap_or_else(far_future);
        if start >= end {
            return Err(TimeFrameError::OutOfSequence { start, end });
        }
        Ok(Self { start, end })
    }

    /// Start of the frame.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the frame.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Length of the frame.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Check if a timestamp falls within this frame (both bounds included).
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

fn far_future() -> DateTime<Utc> {
    Utc.timestamp_opt(FAR_FUTURE_SECS, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Analysis period granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Day, Period::Week, Period::Month];

    /// Name used in output variable names and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        }
    }

    /// Start of the period containing `t`.
    pub fn floor(self, t: DateTime<Utc>) -> DateTime<Utc> {
        let date = t.date_naive();
        let first_day = match self {
            Period::Day => date,
            Period::Week => date - Duration::days(i64::from(date.weekday().num_days_from_monday())),
            Period::Month => date.with_day(1).unwrap_or(date),
        };
        midnight(first_day)
    }

    /// Last millisecond of the period containing `t`.
    pub fn ceil(self, t: DateTime<Utc>) -> DateTime<Utc> {
        let floor = self.floor(t);
        let next = match self {
            Period::Day => floor + Duration::days(1),
            Period::Week => floor + Duration::weeks(1),
            Period::Month => floor
                .checked_add_months(Months::new(1))
                .unwrap_or(floor + Duration::days(31)),
        };
        next - Duration::milliseconds(1)
    }

    /// The previous completed period relative to a computation date.
    ///
    /// One day is subtracted from the computation date before flooring, so
    /// the period still in progress on that date is never selected.
    pub fn previous_frame(self, computation_date: Option<DateTime<Utc>>) -> TimeFrame {
        let reference = computation_date.unwrap_or_else(Utc::now) - Duration::days(1);
        TimeFrame {
            start: self.floor(reference),
            end: self.ceil(reference),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.name() == s.trim().to_lowercase())
            .ok_or_else(|| format!("invalid period '{s}' (expected day, week or month)"))
    }
}

/// Midnight UTC of a calendar date.
pub fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_frame_requires_a_bound() {
        assert_eq!(TimeFrame::new(None, None), Err(TimeFrameError::MissingBounds));

        let open_end = TimeFrame::new(Some(at(2016, 7, 1, 0, 0)), None).unwrap();
        assert!(open_end.end() > at(2200, 1, 1, 0, 0));

        let open_start = TimeFrame::new(None, Some(at(2016, 7, 1, 0, 0))).unwrap();
        assert_eq!(open_start.start(), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_frame_out_of_sequence() {
        let t = at(2016, 7, 1, 0, 0);
        assert!(matches!(
            TimeFrame::new(Some(t), Some(t)),
            Err(TimeFrameError::OutOfSequence { .. })
        ));
        assert!(TimeFrame::new(Some(t + Duration::hours(1)), Some(t)).is_err());
        assert!(TimeFrame::new(Some(t), Some(t + Duration::milliseconds(1))).is_ok());
    }

    #[test]
    fn test_deserialized_frame_is_checked() {
        let frame: TimeFrame = serde_json::from_str(
            r#"{"start": "2016-07-16T00:00:00Z", "end": "2016-07-17T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(frame.duration(), Duration::days(1));

        let reversed = serde_json::from_str::<TimeFrame>(
            r#"{"start": "2016-07-17T00:00:00Z", "end": "2016-07-16T00:00:00Z"}"#,
        );
        assert!(reversed.unwrap_err().to_string().contains("out of sequence"));
        assert!(serde_json::from_str::<TimeFrame>("{}").is_err());
    }

    #[test]
    fn test_previous_day() {
        let frame = Period::Day.previous_frame(Some(at(2016, 7, 17, 0, 0)));
        assert_eq!(frame.start(), at(2016, 7, 16, 0, 0));
        assert_eq!(
            frame.end(),
            at(2016, 7, 17, 0, 0) - Duration::milliseconds(1)
        );

        // early-morning invocation still selects the previous day
        let frame = Period::Day.previous_frame(Some(at(2016, 7, 17, 0, 5)));
        assert_eq!(frame.start(), at(2016, 7, 16, 0, 0));
    }

    #[test]
    fn test_previous_week_and_month() {
        // 2016-07-18 is a Monday
        let week = Period::Week.previous_frame(Some(at(2016, 7, 18, 8, 0)));
        assert_eq!(week.start(), at(2016, 7, 11, 0, 0));
        assert_eq!(week.end(), at(2016, 7, 18, 0, 0) - Duration::milliseconds(1));

        let month = Period::Month.previous_frame(Some(at(2016, 8, 1, 6, 0)));
        assert_eq!(month.start(), at(2016, 7, 1, 0, 0));
        assert_eq!(month.end(), at(2016, 8, 1, 0, 0) - Duration::milliseconds(1));
    }

    #[test]
    fn test_floor_is_idempotent() {
        for period in Period::ALL {
            let once = period.floor(at(2016, 2, 29, 13, 42));
            assert_eq!(period.floor(once), once);
        }
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("day".parse::<Period>().unwrap(), Period::Day);
        assert_eq!("Month".parse::<Period>().unwrap(), Period::Month);
        assert!("year".parse::<Period>().is_err());
        assert_eq!(Period::Week.to_string(), "week");
    }
}
