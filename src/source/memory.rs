//! In-memory event source.
//!
//! Holds a fixed set of events and answers queries by filtering them. Used
//! directly by tests and as the backing store of file-based sources.

use crate::core::TimeFrame;
use crate::source::types::SensorEvent;
use crate::source::{EventSource, SourceError};
use std::collections::HashSet;

/// An event source over events held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSource {
    events: Vec<SensorEvent>,
}

impl MemoryEventSource {
    /// Create a new source holding the given events.
    pub fn new(events: Vec<SensorEvent>) -> Self {
        Self { events }
    }

    /// Add an event.
    pub fn push(&mut self, event: SensorEvent) {
        self.events.push(event);
    }

    /// Number of events held.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<SensorEvent> for MemoryEventSource {
    fn from_iter<I: IntoIterator<Item = SensorEvent>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl EventSource for MemoryEventSource {
    fn get_events(
        &self,
        time_frame: &TimeFrame,
        names: &HashSet<String>,
    ) -> Result<Vec<SensorEvent>, SourceError> {
        Ok(self
            .events
            .iter()
            .filter(|e| names.contains(&e.var_name) && time_frame.contains(e.timestamp))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FlushStatus;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_filters_by_name_and_frame() {
        let t0 = Utc.with_ymd_and_hms(2016, 7, 16, 0, 0, 0).unwrap();
        let frame = TimeFrame::new(Some(t0), Some(t0 + chrono::Duration::hours(1))).unwrap();
        let source: MemoryEventSource = vec![
            SensorEvent::boolean("m1", t0, true),
            SensorEvent::boolean("m1", t0 + chrono::Duration::hours(2), true),
            SensorEvent::boolean("m2", t0, true),
            SensorEvent::numeric("t", t0 + chrono::Duration::hours(1), 20.0),
        ]
        .into_iter()
        .collect();

        let names: HashSet<String> = ["m1", "t"].iter().map(|s| s.to_string()).collect();
        let events = source.get_events(&frame, &names).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.var_name != "m2"));
        assert_eq!(source.flush_if_connected().unwrap(), FlushStatus::NotConnected);
    }
}
