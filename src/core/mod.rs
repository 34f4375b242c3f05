//! Core value types for periodic analytics.
//!
//! This module contains:
//! - Time frames and period derivation
//! - The timestamped signal algebra every indicator is built from
//! - Indicator definitions

pub mod indicator;
pub mod signal;
pub mod timeframe;

// Re-export commonly used types
pub use indicator::{IndicatorDefinition, IndicatorError};
pub use signal::{BooleanSignal, Edge, Extend, NumericSignal, Point, SignalError};
pub use timeframe::{Period, TimeFrame, TimeFrameError};
