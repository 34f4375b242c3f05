//! Raw sensor event types.
//!
//! Events are `(variable name, timestamp, value)` triples as stored by the
//! building's event store. Values are loosely typed and cast on demand to
//! the kind of signal the consuming computation declared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw event value, as found in the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl EventValue {
    /// Cast to a Boolean level.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EventValue::Bool(b) => Some(*b),
            EventValue::Number(n) => Some(*n != 0.0),
            EventValue::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "on" | "1" | "yes" => Some(true),
                "false" | "off" | "0" | "no" => Some(false),
                _ => None,
            },
        }
    }

    /// Cast to a numeric sample.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EventValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            EventValue::Number(n) => Some(*n),
            EventValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// A single timed event for a named variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    /// Name of the variable the event belongs to
    pub var_name: String,
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
    /// Raw value
    pub value: EventValue,
}

impl SensorEvent {
    pub fn new(var_name: impl Into<String>, timestamp: DateTime<Utc>, value: EventValue) -> Self {
        Self {
            var_name: var_name.into(),
            timestamp,
            value,
        }
    }

    pub fn boolean(var_name: impl Into<String>, timestamp: DateTime<Utc>, value: bool) -> Self {
        Self::new(var_name, timestamp, EventValue::Bool(value))
    }

    pub fn numeric(var_name: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self::new(var_name, timestamp, EventValue::Number(value))
    }
}

/// Kind of signal a variable's events are turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Boolean,
    Numeric,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_casting() {
        assert_eq!(EventValue::Bool(true).as_bool(), Some(true));
        assert_eq!(EventValue::Number(0.0).as_bool(), Some(false));
        assert_eq!(EventValue::Number(2.0).as_bool(), Some(true));
        assert_eq!(EventValue::Text("On".into()).as_bool(), Some(true));
        assert_eq!(EventValue::Text("closed".into()).as_bool(), None);
    }

    #[test]
    fn test_numeric_casting() {
        assert_eq!(EventValue::Bool(true).as_f64(), Some(1.0));
        assert_eq!(EventValue::Text(" 21.5 ".into()).as_f64(), Some(21.5));
        assert_eq!(EventValue::Text("n/a".into()).as_f64(), None);
    }

    #[test]
    fn test_event_json_shape() {
        let event: SensorEvent = serde_json::from_str(
            r#"{"var_name":"motion_1","timestamp":"2016-07-16T08:00:00Z","value":true}"#,
        )
        .unwrap();
        assert_eq!(event.var_name, "motion_1");
        assert_eq!(event.value, EventValue::Bool(true));

        let event: SensorEvent = serde_json::from_str(
            r#"{"var_name":"temp","timestamp":"2016-07-16T08:00:00Z","value":"21.5"}"#,
        )
        .unwrap();
        assert_eq!(event.value.as_f64(), Some(21.5));
    }
}
