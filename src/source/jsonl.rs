//! JSON-lines event store export.
//!
//! Each non-blank line holds one [`SensorEvent`] object. The whole file is
//! loaded up front; queries are answered from memory.

use crate::core::TimeFrame;
use crate::source::memory::MemoryEventSource;
use crate::source::types::SensorEvent;
use crate::source::{EventSource, SourceError};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// An event source backed by a JSON-lines file.
#[derive(Debug, Clone)]
pub struct JsonlEventSource {
    path: PathBuf,
    events: MemoryEventSource,
}

impl JsonlEventSource {
    /// Load all events from the file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|e| SourceError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let events = Self::parse(&content).map_err(|(line, message)| SourceError::Parse {
            path: path.display().to_string(),
            line,
            message,
        })?;
        tracing::info!(path = %path.display(), events = events.len(), "event store loaded");
        Ok(Self { path, events })
    }

    fn parse(content: &str) -> Result<MemoryEventSource, (usize, String)> {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str::<SensorEvent>(line).map_err(|e| (i + 1, e.to_string()))
            })
            .collect()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for JsonlEventSource {
    fn get_events(
        &self,
        time_frame: &TimeFrame,
        names: &HashSet<String>,
    ) -> Result<Vec<SensorEvent>, SourceError> {
        self.events.get_events(time_frame, names)
    }
}
