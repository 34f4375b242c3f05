//! Room temperature response to window openings.

use crate::analyzer::{
    AnalyzerError, Computation, InputSpec, OutputSet, OutputValue, ProcessContext, SignalSet,
};
use crate::core::{
    BooleanSignal, IndicatorDefinition, IndicatorError, NumericSignal, Period, SignalError,
};
use crate::warehouse::VariableDefinition;
use chrono::{DateTime, Duration, Utc};
use statrs::statistics::Statistics;

/// Minutes after an opening at which the temperature is sampled.
pub const DEFAULT_ANALYSIS_DELAYS_MIN: [u32; 3] = [10, 15, 30];

/// Average room temperature variation a few minutes after a window opens.
///
/// Every opening of any of the room's windows is an analysis point. For
/// each configured delay, the output is the mean of the interpolated
/// temperature differences between the opening and `delay` minutes later.
#[derive(Debug, Clone)]
pub struct WindowOpenTemperature {
    window_state_names: Vec<String>,
    room_temperature_name: String,
    analysis_delays_min: Vec<u32>,
}

impl WindowOpenTemperature {
    pub fn from_definition(indicator: &IndicatorDefinition) -> Result<Self, IndicatorError> {
        indicator.require(&["window_state_names", "room_temperature_name"])?;
        Ok(Self {
            window_state_names: indicator.str_list_param("window_state_names")?,
            room_temperature_name: indicator.str_param("room_temperature_name")?,
            analysis_delays_min: indicator
                .u32_list_param_or("analysis_delays_min", &DEFAULT_ANALYSIS_DELAYS_MIN)?,
        })
    }

    pub(crate) fn factory(
        indicator: &IndicatorDefinition,
    ) -> Result<Box<dyn Computation>, IndicatorError> {
        Ok(Box::new(Self::from_definition(indicator)?))
    }

    fn output_name(indicator: &IndicatorDefinition, delay: u32, period: Period) -> String {
        format!("{}_{}_{}", indicator.name(), delay, period)
    }

    /// Temperature deltas per delay, one entry per opening.
    pub fn variations(
        &self,
        window: &BooleanSignal,
        temperature: &NumericSignal,
    ) -> Result<(Vec<DateTime<Utc>>, Vec<Vec<f64>>), AnalyzerError> {
        let openings: Vec<DateTime<Utc>> = window.rising_edges().collect();
        let mut columns: Vec<Vec<f64>> =
            vec![Vec::with_capacity(openings.len()); self.analysis_delays_min.len()];

        for &opened_at in &openings {
            let reference = temperature
                .value_at(opened_at, true)
                .ok_or_else(|| AnalyzerError::Computation("empty temperature signal".to_string()))?;
            for (column, &delay) in columns.iter_mut().zip(&self.analysis_delays_min) {
                let later = opened_at
                    .checked_add_signed(Duration::minutes(i64::from(delay)))
                    .ok_or(SignalError::OutOfRange)?;
                if let Some(value) = temperature.value_at(later, true) {
                    column.push(value - reference);
                }
            }
        }
        Ok((openings, columns))
    }
}

impl Computation for WindowOpenTemperature {
    fn inputs(&self) -> Vec<InputSpec> {
        self.window_state_names
            .iter()
            .map(InputSpec::boolean)
            .chain(std::iter::once(InputSpec::numeric(&self.room_temperature_name)))
            .collect()
    }

    fn check_inputs(&self, inputs: &SignalSet) -> Result<(), AnalyzerError> {
        if inputs.numeric(&self.room_temperature_name).is_none() {
            return Err(AnalyzerError::DataUnavailable(vec![self.room_temperature_name.clone()]));
        }
        if inputs.present_boolean(&self.window_state_names).is_empty() {
            return Err(AnalyzerError::DataUnavailable(self.window_state_names.clone()));
        }
        Ok(())
    }

    fn outputs(&self, indicator: &IndicatorDefinition, period: Period) -> Vec<VariableDefinition> {
        self.analysis_delays_min
            .iter()
            .map(|&delay| {
                VariableDefinition::new(Self::output_name(indicator, delay, period), "temperature")
                    .with_unit("degC")
            })
            .collect()
    }

    fn process(
        &self,
        ctx: &ProcessContext<'_>,
        inputs: &SignalSet,
        outputs: &mut OutputSet,
    ) -> Result<(), AnalyzerError> {
        let temperature = inputs.require_numeric(&self.room_temperature_name)?;
        let window = BooleanSignal::any(inputs.present_boolean(&self.window_state_names));
        tracing::debug!(edges = window.len(), "aggregated window state");

        let (openings, columns) = self.variations(&window, temperature)?;
        if openings.is_empty() {
            return Err(AnalyzerError::Computation(
                "no window opening in period, temperature variations cannot be averaged"
                    .to_string(),
            ));
        }
        tracing::debug!(openings = openings.len(), "window openings");

        for (column, &delay) in columns.iter().zip(&self.analysis_delays_min) {
            let mean = column.iter().mean();
            outputs.set(
                &Self::output_name(ctx.indicator, delay, ctx.period),
                OutputValue::Scalar(mean),
            )?;
        }
        Ok(())
    }
}
