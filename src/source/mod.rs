//! Event source access.
//!
//! The raw event store is an external collaborator. Analyzers consume it
//! through the [`EventSource`] trait, queried by time frame and variable
//! names.

pub mod jsonl;
pub mod memory;
pub mod types;

use crate::core::TimeFrame;
use std::collections::HashSet;

// Re-export commonly used types
pub use jsonl::JsonlEventSource;
pub use memory::MemoryEventSource;
pub use types::{EventValue, SensorEvent, SignalKind};

/// Errors raised by event sources.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("parse error on {path} line {line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },
}

/// Outcome of a pre-query flush of a live event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStatus {
    /// Pending events were written to the store
    Flushed,
    /// No live bus is attached; the store is read as is
    NotConnected,
}

/// Read-only access to timed sensor events.
pub trait EventSource: Send + Sync {
    /// Events within the time frame (bounds included) whose variable name
    /// belongs to `names`, in no particular order.
    fn get_events(
        &self,
        time_frame: &TimeFrame,
        names: &HashSet<String>,
    ) -> Result<Vec<SensorEvent>, SourceError>;

    /// Flush a live event bus, if one is attached, before querying.
    fn flush_if_connected(&self) -> Result<FlushStatus, SourceError> {
        Ok(FlushStatus::NotConnected)
    }
}
