//! Numeric sampled signals.

use super::{insert_ordered, upper_index, BooleanSignal, Extend, Point, SignalError};
use crate::core::timeframe::TimeFrame;
use chrono::{DateTime, Duration, Utc};

/// A sampled numeric function of time.
///
/// Samples are kept in ascending order. Duplicate timestamps are tolerated,
/// the latest inserted sample wins on lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericSignal {
    points: Vec<Point<f64>>,
}

impl NumericSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a signal from (possibly unordered) samples.
    pub fn from_points<I, P>(points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point<f64>>,
    {
        let mut signal = Self::new();
        for p in points {
            let p = p.into();
            signal.add_point(p.timestamp, p.value);
        }
        signal
    }

    /// Insert a sample, keeping ascending order.
    pub fn add_point(&mut self, timestamp: DateTime<Utc>, value: f64) {
        insert_ordered(&mut self.points, Point::new(timestamp, value));
    }

    pub fn points(&self) -> &[Point<f64>] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn first(&self) -> Option<Point<f64>> {
        self.points.first().copied()
    }

    pub fn last(&self) -> Option<Point<f64>> {
        self.points.last().copied()
    }

    /// Samples with duplicate timestamps collapsed (last write wins).
    pub fn samples(&self) -> Vec<Point<f64>> {
        let mut samples: Vec<Point<f64>> = Vec::with_capacity(self.points.len());
        for p in &self.points {
            match samples.last_mut() {
                Some(last) if last.timestamp == p.timestamp => last.value = p.value,
                _ => samples.push(*p),
            }
        }
        samples
    }

    /// Value of the signal at `t`.
    ///
    /// Without interpolation this is a step lookup (latest sample at or
    /// before `t`). With interpolation, values between two samples are
    /// linearly interpolated. Lookups outside the sampled range use the
    /// nearest boundary sample. Returns `None` for an empty signal.
    pub fn value_at(&self, t: DateTime<Utc>, interpolate: bool) -> Option<f64> {
        let first = self.points.first()?;
        let idx = upper_index(&self.points, t);
        if idx == 0 {
            return Some(first.value);
        }

        let prev = self.points[idx - 1];
        if !interpolate || idx == self.points.len() || prev.timestamp == t {
            return Some(prev.value);
        }

        // latest write at the next timestamp
        let next = self.points[upper_index(&self.points, self.points[idx].timestamp) - 1];
        let span = seconds(next.timestamp - prev.timestamp);
        if span <= 0.0 {
            return Some(prev.value);
        }
        let elapsed = seconds(t - prev.timestamp);
        Some(prev.value + (next.value - prev.value) * elapsed / span)
    }

    /// Successive differences `v(t_i) - v(t_{i-1})`, stamped at `t_i`.
    pub fn differentiate(&self) -> NumericSignal {
        let samples = self.samples();
        NumericSignal {
            points: samples
                .windows(2)
                .map(|pair| Point::new(pair[1].timestamp, pair[1].value - pair[0].value))
                .collect(),
        }
    }

    /// Boolean signal holding `predicate(value)` at each sample.
    pub fn to_boolean<F>(&self, predicate: F) -> BooleanSignal
    where
        F: Fn(f64) -> bool,
    {
        BooleanSignal::from_points(
            self.points
                .iter()
                .map(|p| Point::new(p.timestamp, predicate(p.value))),
        )
        .normalized()
    }

    /// `true` while the value is at or above `threshold`.
    pub fn trigger(&self, threshold: f64) -> BooleanSignal {
        self.to_boolean(|v| v >= threshold)
    }

    /// `true` while the value is not zero.
    pub fn non_zero(&self) -> BooleanSignal {
        self.to_boolean(|v| v != 0.0)
    }

    /// Copy of the signal with its first and/or last sample duplicated out
    /// to the frame bounds.
    pub fn extend(&self, frame: &TimeFrame, direction: Extend) -> NumericSignal {
        let mut extended = self.clone();
        let (Some(first), Some(last)) = (self.first(), self.last()) else {
            return extended;
        };
        if matches!(direction, Extend::Start | Extend::Both) && first.timestamp > frame.start() {
            extended.points.insert(0, Point::new(frame.start(), first.value));
        }
        if matches!(direction, Extend::End | Extend::Both) && last.timestamp < frame.end() {
            extended.points.push(Point::new(frame.end(), last.value));
        }
        extended
    }

    /// Evenly spaced samples from `start`, each holding the signal's value
    /// at that instant (zero-order hold), up to the last sample.
    pub fn re_sample(
        &self,
        period: Duration,
        start: DateTime<Utc>,
    ) -> Result<NumericSignal, SignalError> {
        if period <= Duration::zero() {
            return Err(SignalError::NonPositivePeriod);
        }
        let (first, last) = match (self.first(), self.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(SignalError::Empty),
        };
        if start < first.timestamp {
            return Err(SignalError::NotCovered {
                start,
                first: first.timestamp,
            });
        }

        let mut points = Vec::new();
        let mut t = start;
        while t <= last.timestamp {
            if let Some(value) = self.value_at(t, false) {
                points.push(Point::new(t, value));
            }
            t = t.checked_add_signed(period).ok_or(SignalError::OutOfRange)?;
        }
        Ok(NumericSignal { points })
    }

    /// Combine two signals sample by sample (by position).
    ///
    /// Timestamps are taken from `self`. The combiner may drop a sample by
    /// returning `None`.
    pub fn zip_with<F>(&self, other: &NumericSignal, combine: F) -> NumericSignal
    where
        F: Fn(f64, f64) -> Option<f64>,
    {
        NumericSignal {
            points: self
                .points
                .iter()
                .zip(other.points.iter())
                .filter_map(|(a, b)| combine(a.value, b.value).map(|v| Point::new(a.timestamp, v)))
                .collect(),
        }
    }
}

/// Length of a duration in seconds, at nanosecond resolution when it fits.
fn seconds(d: Duration) -> f64 {
    match d.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => d.num_milliseconds() as f64 / 1e3,
    }
}
