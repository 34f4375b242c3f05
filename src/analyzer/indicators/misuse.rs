//! Workstation misuse ratio.

use super::{
    period_output_name, presence, ratio, ratio_output, seconds_param,
    DEFAULT_MOTION_GATE_DELAY_SECS,
};
use crate::analyzer::{
    AnalyzerError, Computation, InputSpec, OutputSet, OutputValue, ProcessContext, SignalSet,
};
use crate::core::{BooleanSignal, IndicatorDefinition, IndicatorError, Period};
use crate::warehouse::VariableDefinition;
use chrono::Duration;

/// Share of the period during which a workstation draws energy while
/// nobody is present.
///
/// Usage is any change of one of the cumulative energy counters; presence
/// comes from the gated motion sensor.
#[derive(Debug, Clone)]
pub struct WorkstationMisuse {
    motion_variable_name: String,
    energy_variable_names: Vec<String>,
    gate_delay: Duration,
}

impl WorkstationMisuse {
    pub fn from_definition(indicator: &IndicatorDefinition) -> Result<Self, IndicatorError> {
        indicator.require(&["motion_variable_name", "energy_variable_names"])?;
        Ok(Self {
            motion_variable_name: indicator.str_param("motion_variable_name")?,
            energy_variable_names: indicator.str_list_param("energy_variable_names")?,
            gate_delay: seconds_param(
                indicator,
                "motion_gate_delay_secs",
                DEFAULT_MOTION_GATE_DELAY_SECS,
            )?,
        })
    }

    pub(crate) fn factory(
        indicator: &IndicatorDefinition,
    ) -> Result<Box<dyn Computation>, IndicatorError> {
        Ok(Box::new(Self::from_definition(indicator)?))
    }

    /// `true` while energy is used and nobody is present.
    pub fn misuse(&self, inputs: &SignalSet) -> Result<BooleanSignal, AnalyzerError> {
        let motion = inputs.require_boolean(&self.motion_variable_name)?;
        let present = presence(motion, self.gate_delay)?;

        let usages: Vec<BooleanSignal> = inputs
            .present_numeric(&self.energy_variable_names)
            .into_iter()
            .map(|energy| energy.differentiate().non_zero())
            .collect();
        let in_use = BooleanSignal::any(&usages);

        Ok(present.logic_not().logic_and(&in_use))
    }
}

impl Computation for WorkstationMisuse {
    fn inputs(&self) -> Vec<InputSpec> {
        std::iter::once(InputSpec::boolean(&self.motion_variable_name))
            .chain(self.energy_variable_names.iter().map(InputSpec::numeric))
            .collect()
    }

    fn check_inputs(&self, inputs: &SignalSet) -> Result<(), AnalyzerError> {
        let mut missing = Vec::new();
        if inputs.boolean(&self.motion_variable_name).is_none() {
            missing.push(self.motion_variable_name.clone());
        }
        if inputs.present_numeric(&self.energy_variable_names).is_empty() {
            missing.extend(self.energy_variable_names.iter().cloned());
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AnalyzerError::DataUnavailable(missing))
        }
    }

    fn outputs(&self, indicator: &IndicatorDefinition, period: Period) -> Vec<VariableDefinition> {
        ratio_output(indicator, period)
    }

    fn process(
        &self,
        ctx: &ProcessContext<'_>,
        inputs: &SignalSet,
        outputs: &mut OutputSet,
    ) -> Result<(), AnalyzerError> {
        let misused = self.misuse(inputs)?;
        outputs.set(
            &period_output_name(ctx.indicator, ctx.period),
            OutputValue::Scalar(ratio(&misused, ctx.time_frame)),
        )
    }
}
