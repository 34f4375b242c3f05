//! Shade and artificial lighting correlation ratio.

use super::{period_output_name, ratio, ratio_output, seconds_param};
use crate::analyzer::{
    AnalyzerError, Computation, InputSpec, OutputSet, OutputValue, ProcessContext, SignalSet,
};
use crate::core::{BooleanSignal, Extend, IndicatorDefinition, IndicatorError, Period, TimeFrame};
use crate::warehouse::VariableDefinition;
use chrono::Duration;

pub const DEFAULT_SHADE_ATTENUATION_THRESHOLD: f64 = 0.8;
pub const DEFAULT_LIGHTING_ON_LUX_THRESHOLD: f64 = 2500.0;
pub const DEFAULT_NATURAL_LIGHTING_OK_THRESHOLD: f64 = 3000.0;
pub const DEFAULT_RESAMPLE_PERIOD_SECS: f64 = 300.0;

/// Share of the period during which the shade is closed and the lights are
/// on although natural light would be sufficient.
///
/// The shade position is inferred from the attenuation between the outdoor
/// reference and the illuminance behind the shade, both re-sampled on the
/// same grid.
#[derive(Debug, Clone)]
pub struct ShadeLightingCorrelation {
    lux_out_ref_name: String,
    lux_shade_name: String,
    lux_lighting_name: String,
    shade_attenuation_threshold: f64,
    lighting_on_lux_threshold: f64,
    natural_lighting_ok_threshold: f64,
    resample_period: Duration,
}

impl ShadeLightingCorrelation {
    pub fn from_definition(indicator: &IndicatorDefinition) -> Result<Self, IndicatorError> {
        indicator.require(&["lux_out_ref_name", "lux_shade_name", "lux_lighting_name"])?;
        Ok(Self {
            lux_out_ref_name: indicator.str_param("lux_out_ref_name")?,
            lux_shade_name: indicator.str_param("lux_shade_name")?,
            lux_lighting_name: indicator.str_param("lux_lighting_name")?,
            shade_attenuation_threshold: indicator.f64_param_or(
                "shade_attenuation_threshold",
                DEFAULT_SHADE_ATTENUATION_THRESHOLD,
            )?,
            lighting_on_lux_threshold: indicator.f64_param_or(
                "lighting_on_lux_threshold",
                DEFAULT_LIGHTING_ON_LUX_THRESHOLD,
            )?,
            natural_lighting_ok_threshold: indicator.f64_param_or(
                "natural_lighting_ok_threshold",
                DEFAULT_NATURAL_LIGHTING_OK_THRESHOLD,
            )?,
            resample_period: seconds_param(
                indicator,
                "resample_period_secs",
                DEFAULT_RESAMPLE_PERIOD_SECS,
            )?,
        })
    }

    pub(crate) fn factory(
        indicator: &IndicatorDefinition,
    ) -> Result<Box<dyn Computation>, IndicatorError> {
        Ok(Box::new(Self::from_definition(indicator)?))
    }

    /// `true` while the three conditions hold together.
    pub fn correlation(
        &self,
        inputs: &SignalSet,
        frame: &TimeFrame,
    ) -> Result<BooleanSignal, AnalyzerError> {
        let lux_out = inputs
            .require_numeric(&self.lux_out_ref_name)?
            .extend(frame, Extend::Both);
        let lux_shade = inputs
            .require_numeric(&self.lux_shade_name)?
            .extend(frame, Extend::Both);
        let lux_lighting = inputs.require_numeric(&self.lux_lighting_name)?;

        let out_sampled = lux_out.re_sample(self.resample_period, frame.start())?;
        let shade_sampled = lux_shade.re_sample(self.resample_period, frame.start())?;

        // no attenuation can be computed while the reference is dark
        let attenuation = out_sampled.zip_with(&shade_sampled, |out, shade| {
            (out != 0.0).then(|| shade / out)
        });

        let shade_closed = attenuation.trigger(self.shade_attenuation_threshold);
        let lights_on = lux_lighting.trigger(self.lighting_on_lux_threshold);
        let natural_light_ok = lux_out.trigger(self.natural_lighting_ok_threshold);

        Ok(BooleanSignal::all([&shade_closed, &lights_on, &natural_light_ok]))
    }
}

impl Computation for ShadeLightingCorrelation {
    fn inputs(&self) -> Vec<InputSpec> {
        vec![
            InputSpec::numeric(&self.lux_out_ref_name),
            InputSpec::numeric(&self.lux_shade_name),
            InputSpec::numeric(&self.lux_lighting_name),
        ]
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
        let correlated = self.correlation(inputs, ctx.time_frame)?;
        outputs.set(
            &period_output_name(ctx.indicator, ctx.period),
            OutputValue::Scalar(ratio(&correlated, ctx.time_frame)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NumericSignal;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::{json, Map};

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2016, 7, 16, h, m, 0).unwrap()
    }

    fn definition() -> IndicatorDefinition {
        let mut params = Map::new();
        params.insert("lux_out_ref_name".into(), json!("out"));
        params.insert("lux_shade_name".into(), json!("shade"));
        params.insert("lux_lighting_name".into(), json!("lamp"));
        IndicatorDefinition::new("WU2", None, None, params).unwrap()
    }

    #[test]
    fn test_defaults() {
        let c = ShadeLightingCorrelation::from_definition(&definition()).unwrap();
        assert_eq!(c.shade_attenuation_threshold, 0.8);
        assert_eq!(c.lighting_on_lux_threshold, 2500.0);
        assert_eq!(c.natural_lighting_ok_threshold, 3000.0);
        assert_eq!(c.resample_period, Duration::minutes(5));
        assert!(c.check_inputs(&SignalSet::new()).unwrap_err().is_soft());
    }

    #[test]
    fn test_correlation_window() {
        let c = ShadeLightingCorrelation::from_definition(&definition()).unwrap();
        let frame = TimeFrame::new(
            Some(t(0, 0)),
            Some(t(0, 0) + Duration::days(1) - Duration::milliseconds(1)),
        )
        .unwrap();

        let mut inputs = SignalSet::new();
        // bright outside all day long
        inputs.insert_numeric(
            "out",
            NumericSignal::from_points([(t(6, 0), 5000.0), (t(20, 0), 5000.0)]),
        );
        // shade reading close to outside from 10:00 to 12:00
        inputs.insert_numeric(
            "shade",
            NumericSignal::from_points([(t(6, 0), 1000.0), (t(10, 0), 4500.0), (t(12, 0), 1000.0)]),
        );
        // lamp on from 11:00 to 14:00
        inputs.insert_numeric(
            "lamp",
            NumericSignal::from_points([(t(0, 0), 0.0), (t(11, 0), 3000.0), (t(14, 0), 0.0)]),
        );

        let result = c.correlation(&inputs, &frame).unwrap();
        assert!(!result.value_at(t(10, 30)));
        assert!(result.value_at(t(11, 30)));
        assert!(!result.value_at(t(12, 30)));

        let def = definition();
        let mut outputs = OutputSet::new(c.outputs(&def, Period::Day));
        let ctx = ProcessContext {
            indicator: &def,
            period: Period::Day,
            time_frame: &frame,
        };
        c.process(&ctx, &inputs, &mut outputs).unwrap();
        match outputs.get("WU2_day") {
            Some(OutputValue::Scalar(v)) => {
                let expected = 3_600_000.0 / frame.duration().num_milliseconds() as f64;
                assert!((v - expected).abs() < 1e-9)
            }
            other => panic!("unexpected output: {other:?}"),
        }
    }
}
