//! Boolean step signals.

use super::{insert_ordered, upper_index, Edge, Point, SignalError};
use chrono::{DateTime, Duration, Utc};

/// A right-continuous Boolean step function.
///
/// The value at `t` is the value of the latest point with `timestamp <= t`,
/// or the initial value (default `false`) before the first point. Raw
/// signals built from events may hold redundant points; the algebra
/// operators always produce normalized signals (one point per value change).
#[derive(Debug, Clone, Default)]
pub struct BooleanSignal {
    initial: bool,
    points: Vec<Point<bool>>,
}

impl BooleanSignal {
    /// An empty signal, `false` everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal holding the same value everywhere.
    pub fn constant(value: bool) -> Self {
        Self {
            initial: value,
            points: Vec::new(),
        }
    }

    /// Build a signal from (possibly unordered) points.
    pub fn from_points<I, P>(points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point<bool>>,
    {
        let mut signal = Self::new();
        for p in points {
            let p = p.into();
            signal.add_point(p.timestamp, p.value);
        }
        signal
    }

    /// Insert a point, keeping ascending order.
    pub fn add_point(&mut self, timestamp: DateTime<Utc>, value: bool) {
        insert_ordered(&mut self.points, Point::new(timestamp, value));
    }

    /// Value before the first point.
    pub fn initial(&self) -> bool {
        self.initial
    }

    /// Raw points, in insertion-stable ascending order.
    pub fn points(&self) -> &[Point<bool>] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Value of the signal at `t`.
    pub fn value_at(&self, t: DateTime<Utc>) -> bool {
        match upper_index(&self.points, t) {
            0 => self.initial,
            idx => self.points[idx - 1].value,
        }
    }

    /// Points with duplicate timestamps collapsed (last write wins).
    pub fn samples(&self) -> Vec<Point<bool>> {
        let mut samples: Vec<Point<bool>> = Vec::with_capacity(self.points.len());
        for p in &self.points {
            match samples.last_mut() {
                Some(last) if last.timestamp == p.timestamp => last.value = p.value,
                _ => samples.push(*p),
            }
        }
        samples
    }

    /// The value changes of the signal, one point per change.
    pub fn edges(&self) -> Vec<Point<bool>> {
        let mut edges: Vec<Point<bool>> = Vec::new();
        let mut current = self.initial;
        for p in self.samples() {
            if p.value != current {
                edges.push(p);
                current = p.value;
            }
        }
        edges
    }

    /// Rising edge instants.
    pub fn rising_edges(&self) -> impl Iterator<Item = DateTime<Utc>> {
        self.edges()
            .into_iter()
            .filter(|p| p.value)
            .map(|p| p.timestamp)
    }

    /// Equivalent signal without redundant points.
    pub fn normalized(&self) -> Self {
        Self {
            initial: self.initial,
            points: self.edges(),
        }
    }

    /// Logical negation.
    pub fn logic_not(&self) -> Self {
        Self {
            initial: !self.initial,
            points: self
                .edges()
                .into_iter()
                .map(|p| Point::new(p.timestamp, !p.value))
                .collect(),
        }
    }

    /// Logical conjunction.
    pub fn logic_and(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a && b)
    }

    /// Logical disjunction.
    pub fn logic_or(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a || b)
    }

    /// Pointwise combination of two signals.
    ///
    /// The breakpoints of both operands are merged, each operand is
    /// evaluated at every breakpoint, and an edge is emitted only where the
    /// combined value changes.
    pub fn combine<F>(&self, other: &Self, op: F) -> Self
    where
        F: Fn(bool, bool) -> bool,
    {
        let mut breakpoints: Vec<DateTime<Utc>> = self
            .points
            .iter()
            .chain(other.points.iter())
            .map(|p| p.timestamp)
            .collect();
        breakpoints.sort_unstable();
        breakpoints.dedup();

        let initial = op(self.initial, other.initial);
        let mut current = initial;
        let mut points = Vec::new();
        for t in breakpoints {
            let value = op(self.value_at(t), other.value_at(t));
            if value != current {
                points.push(Point::new(t, value));
                current = value;
            }
        }
        Self { initial, points }
    }

    /// Left-fold a set of signals with `logic_or`. Empty input gives `false`.
    pub fn any<'a, I>(signals: I) -> Self
    where
        I: IntoIterator<Item = &'a BooleanSignal>,
    {
        signals
            .into_iter()
            .fold(Self::constant(false), |acc, s| acc.logic_or(s))
    }

    /// Left-fold a set of signals with `logic_and`. Empty input gives `true`.
    pub fn all<'a, I>(signals: I) -> Self
    where
        I: IntoIterator<Item = &'a BooleanSignal>,
    {
        signals
            .into_iter()
            .fold(Self::constant(true), |acc, s| acc.logic_and(s))
    }

    /// One-shot timer driven by the signal's qualifying points.
    ///
    /// Each point carrying the edge's target value switches the output on,
    /// and the output switches off `duration` later. When `restartable` is
    /// false, triggers arriving while the output is already on are ignored;
    /// when true, each trigger pushes the switch-off to `trigger + duration`.
    /// Points sharing a timestamp count once, with their latest value.
    pub fn delay(
        &self,
        duration: Duration,
        edge: Edge,
        restartable: bool,
    ) -> Result<Self, SignalError> {
        if duration <= Duration::zero() {
            return Ok(Self::new());
        }

        let mut intervals: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
        for p in self.samples() {
            if p.value != edge.target() {
                continue;
            }
            let t = p.timestamp;
            let off = t.checked_add_signed(duration).ok_or(SignalError::OutOfRange)?;
            match intervals.last_mut() {
                // a trigger exactly at switch-off starts a touching interval
                Some(last) if t < last.1 && restartable => last.1 = last.1.max(off),
                Some(last) if t < last.1 => {}
                Some(last) if t == last.1 => last.1 = off,
                _ => intervals.push((t, off)),
            }
        }

        let mut points = Vec::with_capacity(intervals.len() * 2);
        for (on, off) in intervals {
            points.push(Point::new(on, true));
            points.push(Point::new(off, false));
        }
        Ok(Self {
            initial: false,
            points,
        })
    }

    /// Total time the signal is `true` within `[from, to)`.
    pub fn integrate(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
        if to <= from {
            return Duration::zero();
        }

        let mut total = Duration::zero();
        let mut current = self.value_at(from);
        let mut since = from;
        let start = upper_index(&self.points, from);
        for p in self.points[start..].iter().take_while(|p| p.timestamp < to) {
            if current {
                total += p.timestamp - since;
            }
            since = p.timestamp;
            current = p.value;
        }
        if current {
            total += to - since;
        }
        total
    }
}

impl PartialEq for BooleanSignal {
    /// Semantic equality: same value at every instant.
    fn eq(&self, other: &Self) -> bool {
        self.initial == other.initial && self.edges() == other.edges()
    }
}
