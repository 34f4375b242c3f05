//! Timestamped signal algebra.
//!
//! Signals are ordered point sequences. [`BooleanSignal`] is a
//! right-continuous step function (edges), [`NumericSignal`] a sampled
//! function supporting interpolated lookup. All operators are pure: they
//! return new signals and never mutate their receivers.

mod boolean;
mod numeric;

pub use boolean::BooleanSignal;
pub use numeric::NumericSignal;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single timestamped value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<V> {
    pub timestamp: DateTime<Utc>,
    pub value: V,
}

impl<V> Point<V> {
    pub fn new(timestamp: DateTime<Utc>, value: V) -> Self {
        Self { timestamp, value }
    }
}

impl<V> From<(DateTime<Utc>, V)> for Point<V> {
    fn from((timestamp, value): (DateTime<Utc>, V)) -> Self {
        Self { timestamp, value }
    }
}

/// Which Boolean transition triggers a delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edge {
    #[default]
    Rising,
    Falling,
}

impl Edge {
    /// The value a point must carry to qualify as this edge.
    pub fn target(self) -> bool {
        matches!(self, Edge::Rising)
    }
}

/// Direction(s) in which a numeric signal is extended to its frame bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extend {
    Start,
    End,
    Both,
}

/// Errors raised by signal operators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SignalError {
    #[error("signal has no samples")]
    Empty,
    #[error("resampling period must be positive")]
    NonPositivePeriod,
    #[error("resampling start {start} precedes first sample at {first}")]
    NotCovered {
        start: DateTime<Utc>,
        first: DateTime<Utc>,
    },
    #[error("timestamp out of the representable range")]
    OutOfRange,
}

/// Insert a point after every existing point sharing its timestamp, so the
/// latest insertion wins on lookup.
fn insert_ordered<V>(points: &mut Vec<Point<V>>, point: Point<V>) {
    let idx = points.partition_point(|p| p.timestamp <= point.timestamp);
    points.insert(idx, point);
}

/// Index one past the last point at or before `t`.
fn upper_index<V>(points: &[Point<V>], t: DateTime<Utc>) -> usize {
    points.partition_point(|p| p.timestamp <= t)
}
