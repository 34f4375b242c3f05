//! Room occupancy ratio.

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

/// Share of the period during which a room is occupied.
///
/// Motion detections of every sensor of the room are turned into presence
/// intervals (gate delay, restartable) and OR-ed together. One sensor with
/// data is enough.
#[derive(Debug, Clone)]
pub struct RoomOccupancy {
    motion_variable_names: Vec<String>,
    gate_delay: Duration,
}

impl RoomOccupancy {
    pub fn from_definition(indicator: &IndicatorDefinition) -> Result<Self, IndicatorError> {
        Ok(Self {
            motion_variable_names: indicator.str_list_param("motion_variable_names")?,
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

    /// Presence signal built from the sensors having data.
    pub fn occupancy(&self, inputs: &SignalSet) -> Result<BooleanSignal, AnalyzerError> {
        let presences = inputs
            .present_boolean(&self.motion_variable_names)
            .into_iter()
            .map(|motion| presence(motion, self.gate_delay))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BooleanSignal::any(&presences))
    }
}

impl Computation for RoomOccupancy {
    fn inputs(&self) -> Vec<InputSpec> {
        self.motion_variable_names.iter().map(InputSpec::boolean).collect()
    }

    fn check_inputs(&self, inputs: &SignalSet) -> Result<(), AnalyzerError> {
        if inputs.present_boolean(&self.motion_variable_names).is_empty() {
            return Err(AnalyzerError::DataUnavailable(
                self.motion_variable_names.clone(),
            ));
        }
        Ok(())
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
        let occupied = self.occupancy(inputs)?;
        let value = ratio(&occupied, ctx.time_frame);
        tracing::debug!(ratio = value, "room occupancy");
        outputs.set(
            &period_output_name(ctx.indicator, ctx.period),
            OutputValue::Scalar(value),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TimeFrame;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::{json, Map};

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 7, 16, h, m, 0).unwrap()
    }

    fn definition() -> IndicatorDefinition {
        let mut params = Map::new();
        params.insert("motion_variable_names".into(), json!(["m1", "m2"]));
        IndicatorDefinition::new("WU1", None, None, params).unwrap()
    }

    #[test]
    fn test_requires_motion_names() {
        let def = IndicatorDefinition::new("WU1", None, None, Map::new()).unwrap();
        assert_eq!(
            RoomOccupancy::from_definition(&def).unwrap_err(),
            IndicatorError::MissingParameters(vec!["motion_variable_names".into()])
        );
    }

    #[test]
    fn test_one_sensor_is_enough() {
        let c = RoomOccupancy::from_definition(&definition()).unwrap();
        let mut inputs = SignalSet::new();
        assert!(c.check_inputs(&inputs).unwrap_err().is_soft());
        inputs.insert_boolean("m2", BooleanSignal::from_points([(t(8, 0), true)]));
        assert!(c.check_inputs(&inputs).is_ok());
    }

    #[test]
    fn test_occupancy_ratio() {
        let c = RoomOccupancy::from_definition(&definition()).unwrap();
        let mut inputs = SignalSet::new();
        // m1: 08:00 and 08:03 keep presence until 08:08
        inputs.insert_boolean(
            "m1",
            BooleanSignal::from_points([(t(8, 0), true), (t(8, 3), true)]),
        );
        // m2: 12:00 alone, presence until 12:05
        inputs.insert_boolean("m2", BooleanSignal::from_points([(t(12, 0), true)]));

        let frame = TimeFrame::new(Some(t(0, 0)), Some(t(0, 0) + Duration::days(1))).unwrap();
        let def = definition();
        let ctx = ProcessContext {
            indicator: &def,
            period: Period::Day,
            time_frame: &frame,
        };
        let mut outputs = OutputSet::new(c.outputs(&def, Period::Day));
        c.process(&ctx, &inputs, &mut outputs).unwrap();

        let expected = 13.0 / (24.0 * 60.0);
        match outputs.get("WU1_day") {
            Some(OutputValue::Scalar(v)) => assert!((v - expected).abs() < 1e-9),
            other => panic!("unexpected output: {other:?}"),
        }
    }
}
