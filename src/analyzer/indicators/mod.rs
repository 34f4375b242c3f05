//! Built-in building indicators.
//!
//! Each indicator is a [`Computation`](super::Computation) built from the
//! signal algebra. Ratio indicators divide the time a condition holds by the
//! length of the analyzed period.

pub mod misuse;
pub mod occupancy;
pub mod shading;
pub mod window_temperature;

use crate::core::{
    BooleanSignal, Edge, IndicatorDefinition, IndicatorError, Period, SignalError, TimeFrame,
};
use crate::warehouse::VariableDefinition;
use chrono::Duration;

pub use misuse::WorkstationMisuse;
pub use occupancy::RoomOccupancy;
pub use shading::ShadeLightingCorrelation;
pub use window_temperature::WindowOpenTemperature;

/// Default time a motion detection keeps a room marked as occupied.
pub const DEFAULT_MOTION_GATE_DELAY_SECS: f64 = 300.0;

/// `<indicator>_<period>`
pub(crate) fn period_output_name(indicator: &IndicatorDefinition, period: Period) -> String {
    format!("{}_{}", indicator.name(), period)
}

/// The single ratio output of a ratio indicator.
pub(crate) fn ratio_output(
    indicator: &IndicatorDefinition,
    period: Period,
) -> Vec<VariableDefinition> {
    vec![VariableDefinition::new(
        period_output_name(indicator, period),
        "ratio",
    )]
}

/// Share of the frame during which `condition` is true.
pub(crate) fn ratio(condition: &BooleanSignal, frame: &TimeFrame) -> f64 {
    let total = frame.duration().num_milliseconds();
    if total <= 0 {
        return 0.0;
    }
    condition.integrate(frame.start(), frame.end()).num_milliseconds() as f64 / total as f64
}

/// Turn motion pulses into presence: every detection keeps the output on
/// for `gate_delay`, restarted by later detections.
pub(crate) fn presence(
    motion: &BooleanSignal,
    gate_delay: Duration,
) -> Result<BooleanSignal, SignalError> {
    motion.delay(gate_delay, Edge::Rising, true)
}

/// Longest duration parameter accepted, one leap year.
pub const MAX_DURATION_SECS: f64 = 366.0 * 86_400.0;

/// Parameter in seconds, as a duration.
pub(crate) fn seconds_param(
    indicator: &IndicatorDefinition,
    name: &str,
    default: f64,
) -> Result<Duration, IndicatorError> {
    let secs = indicator.f64_param_or(name, default)?;
    if !(secs.is_finite() && secs > 0.0 && secs <= MAX_DURATION_SECS) {
        return Err(IndicatorError::InvalidParameter {
            name: name.to_string(),
            expected: "a positive number of seconds, at most one year",
        });
    }
    Ok(Duration::milliseconds((secs * 1000.0).round() as i64))
}
