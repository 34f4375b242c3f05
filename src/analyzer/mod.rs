//! Analyzers: one indicator computation bound to a period.
//!
//! An [`Analyzer`] pulls the inputs of its indicator from an
//! [`EventSource`], declares the output variables, runs the signal algebra
//! of its [`Computation`] and stores the results through a
//! [`WarehouseSink`]. Its lifecycle is linear:
//!
//! ```text
//! Created → LoadingInputs → CreatingOutputs → Processing → Storing → Done
//!                 │
//!                 └─→ Skipped (no data)          any step ─→ Failed
//! ```

pub mod indicators;
pub mod registry;

use crate::core::{
    BooleanSignal, IndicatorDefinition, NumericSignal, Period, Point, SignalError, TimeFrame,
};
use crate::source::{EventSource, FlushStatus, SensorEvent, SignalKind, SourceError};
use crate::warehouse::{
    KnownVariables, SeriesRecord, VariableDefinition, WarehouseError, WarehouseSink,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

pub use registry::{ComputationFactory, ComputationRegistry, BUILTIN_NAMESPACE};

/// Errors raised while running an analyzer.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// Required inputs have no data for the period (soft failure)
    #[error("missing data for required input(s): {}", .0.join(", "))]
    DataUnavailable(Vec<String>),
    #[error("computation error: {0}")]
    Computation(String),
    #[error("signal error: {0}")]
    Signal(#[from] SignalError),
    #[error("event source error: {0}")]
    Source(#[from] SourceError),
    #[error(transparent)]
    Remote(#[from] WarehouseError),
    #[error("output '{0}' was not declared")]
    UndeclaredOutput(String),
}

impl AnalyzerError {
    /// Soft failures end the job as skipped rather than failed.
    pub fn is_soft(&self) -> bool {
        matches!(self, AnalyzerError::DataUnavailable(_))
    }
}

/// Lifecycle state of an analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerState {
    Created,
    LoadingInputs,
    Skipped,
    CreatingOutputs,
    Processing,
    Storing,
    Done,
    Failed,
}

impl AnalyzerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AnalyzerState::Skipped | AnalyzerState::Done | AnalyzerState::Failed
        )
    }
}

impl fmt::Display for AnalyzerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalyzerState::Created => "created",
            AnalyzerState::LoadingInputs => "loading_inputs",
            AnalyzerState::Skipped => "skipped",
            AnalyzerState::CreatingOutputs => "creating_outputs",
            AnalyzerState::Processing => "processing",
            AnalyzerState::Storing => "storing",
            AnalyzerState::Done => "done",
            AnalyzerState::Failed => "failed",
        };
        f.pad(name)
    }
}

/// A named input and the kind of signal it is loaded as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSpec {
    pub name: String,
    pub kind: SignalKind,
}

impl InputSpec {
    pub fn boolean(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SignalKind::Boolean,
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SignalKind::Numeric,
        }
    }
}

/// Input signals of one run, keyed by variable name.
#[derive(Debug, Clone, Default)]
pub struct SignalSet {
    boolean: HashMap<String, BooleanSignal>,
    numeric: HashMap<String, NumericSignal>,
}

impl SignalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build signals from raw events.
    ///
    /// Events for undeclared variables, outside the frame, or whose value
    /// cannot be cast to the declared kind are dropped.
    pub fn from_events<I>(specs: &[InputSpec], time_frame: &TimeFrame, events: I) -> Self
    where
        I: IntoIterator<Item = SensorEvent>,
    {
        let kinds: HashMap<&str, SignalKind> =
            specs.iter().map(|s| (s.name.as_str(), s.kind)).collect();
        let mut set = Self::new();

        for event in events {
            let Some(kind) = kinds.get(event.var_name.as_str()) else {
                tracing::debug!(variable = %event.var_name, "ignoring event for undeclared variable");
                continue;
            };
            if !time_frame.contains(event.timestamp) {
                tracing::debug!(variable = %event.var_name, timestamp = %event.timestamp, "ignoring out-of-window event");
                continue;
            }
            match kind {
                SignalKind::Boolean => match event.value.as_bool() {
                    Some(v) => set
                        .boolean
                        .entry(event.var_name)
                        .or_default()
                        .add_point(event.timestamp, v),
                    None => tracing::debug!(variable = %event.var_name, value = ?event.value, "not a boolean value"),
                },
                SignalKind::Numeric => match event.value.as_f64() {
                    Some(v) => set
                        .numeric
                        .entry(event.var_name)
                        .or_default()
                        .add_point(event.timestamp, v),
                    None => tracing::debug!(variable = %event.var_name, value = ?event.value, "not a numeric value"),
                },
            }
        }
        set
    }

    pub fn insert_boolean(&mut self, name: impl Into<String>, signal: BooleanSignal) {
        self.boolean.insert(name.into(), signal);
    }

    pub fn insert_numeric(&mut self, name: impl Into<String>, signal: NumericSignal) {
        self.numeric.insert(name.into(), signal);
    }

    pub fn boolean(&self, name: &str) -> Option<&BooleanSignal> {
        self.boolean.get(name)
    }

    pub fn numeric(&self, name: &str) -> Option<&NumericSignal> {
        self.numeric.get(name)
    }

    /// A Boolean input that must be present.
    pub fn require_boolean(&self, name: &str) -> Result<&BooleanSignal, AnalyzerError> {
        self.boolean(name)
            .ok_or_else(|| AnalyzerError::DataUnavailable(vec![name.to_string()]))
    }

    /// A numeric input that must be present.
    pub fn require_numeric(&self, name: &str) -> Result<&NumericSignal, AnalyzerError> {
        self.numeric(name)
            .ok_or_else(|| AnalyzerError::DataUnavailable(vec![name.to_string()]))
    }

    /// The Boolean inputs present among `names`, in the given order.
    pub fn present_boolean<'a>(&'a self, names: &[String]) -> Vec<&'a BooleanSignal> {
        names.iter().filter_map(|n| self.boolean(n)).collect()
    }

    /// The numeric inputs present among `names`, in the given order.
    pub fn present_numeric<'a>(&'a self, names: &[String]) -> Vec<&'a NumericSignal> {
        names.iter().filter_map(|n| self.numeric(n)).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.boolean.contains_key(name) || self.numeric.contains_key(name)
    }

    /// The names of `specs` with no signal in this set.
    pub fn missing(&self, specs: &[InputSpec]) -> Vec<String> {
        specs
            .iter()
            .filter(|s| !self.contains(&s.name))
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.boolean.is_empty() && self.numeric.is_empty()
    }

    pub fn len(&self) -> usize {
        self.boolean.len() + self.numeric.len()
    }
}

/// A computed output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Scalar(f64),
    Series(Vec<Point<f64>>),
}

/// Declared outputs of a run and the values recorded for them.
#[derive(Debug, Clone, Default)]
pub struct OutputSet {
    declared: Vec<VariableDefinition>,
    values: HashMap<String, OutputValue>,
}

impl OutputSet {
    pub fn new(declared: Vec<VariableDefinition>) -> Self {
        Self {
            declared,
            values: HashMap::new(),
        }
    }

    /// Record the value of a declared output.
    pub fn set(&mut self, name: &str, value: OutputValue) -> Result<(), AnalyzerError> {
        if !self.declared.iter().any(|d| d.name == name) {
            return Err(AnalyzerError::UndeclaredOutput(name.to_string()));
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&OutputValue> {
        self.values.get(name)
    }

    pub fn declared(&self) -> &[VariableDefinition] {
        &self.declared
    }

    /// Recorded values, in declaration order.
    pub fn values(&self) -> Vec<(String, OutputValue)> {
        self.declared
            .iter()
            .filter_map(|d| self.values.get(&d.name).map(|v| (d.name.clone(), v.clone())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What a computation sees while processing.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    pub indicator: &'a IndicatorDefinition,
    pub period: Period,
    pub time_frame: &'a TimeFrame,
}

/// A concrete indicator computation over the signal algebra.
pub trait Computation: Send + Sync + fmt::Debug {
    /// The variables the computation reads, with their signal kind.
    fn inputs(&self) -> Vec<InputSpec>;

    /// Check that enough inputs have data. By default all are required.
    fn check_inputs(&self, inputs: &SignalSet) -> Result<(), AnalyzerError> {
        let missing = inputs.missing(&self.inputs());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AnalyzerError::DataUnavailable(missing))
        }
    }

    /// The output variables produced for an indicator and period.
    fn outputs(&self, indicator: &IndicatorDefinition, period: Period) -> Vec<VariableDefinition>;

    /// Compute the outputs from the inputs.
    fn process(
        &self,
        ctx: &ProcessContext<'_>,
        inputs: &SignalSet,
        outputs: &mut OutputSet,
    ) -> Result<(), AnalyzerError>;
}

/// Parameters shared by all analyzers, set in the batch configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerParams {
    /// Warehouse site the outputs belong to
    pub site_id: u32,
}

impl AnalyzerParams {
    pub const KEYS: [&'static str; 1] = ["site_id"];
}

/// A resolved job: which computation, with which parameters, for which
/// indicator. Consumed once by the runner.
#[derive(Debug)]
pub struct AnalyzerJob {
    /// Fully-qualified computation key
    pub kind: String,
    pub params: AnalyzerParams,
    pub indicator: IndicatorDefinition,
    pub computation: Box<dyn Computation>,
}

/// Result of a completed (done or skipped) run.
#[derive(Debug, Clone)]
pub struct AnalyzerReport {
    pub state: AnalyzerState,
    pub outputs: Vec<(String, OutputValue)>,
}

/// One indicator computation bound to a period and its collaborators.
pub struct Analyzer {
    job: AnalyzerJob,
    period: Period,
    time_frame: TimeFrame,
    source: Arc<dyn EventSource>,
    sink: Arc<dyn WarehouseSink>,
    state: AnalyzerState,
}

impl Analyzer {
    /// Bind a job to the previous completed period relative to
    /// `computation_date` (now if absent).
    pub fn new(
        job: AnalyzerJob,
        period: Period,
        computation_date: Option<DateTime<Utc>>,
        source: Arc<dyn EventSource>,
        sink: Arc<dyn WarehouseSink>,
    ) -> Self {
        Self {
            job,
            period,
            time_frame: period.previous_frame(computation_date),
            source,
            sink,
            state: AnalyzerState::Created,
        }
    }

    pub fn state(&self) -> AnalyzerState {
        self.state
    }

    pub fn time_frame(&self) -> &TimeFrame {
        &self.time_frame
    }

    pub fn indicator(&self) -> &IndicatorDefinition {
        &self.job.indicator
    }

    /// Run the whole lifecycle.
    ///
    /// Returns the report of a `Done` or `Skipped` run; any other error
    /// leaves the analyzer `Failed`.
    pub fn run(
        &mut self,
        known_variables: &KnownVariables,
        outputs_timestamp: Option<DateTime<Utc>>,
    ) -> Result<AnalyzerReport, AnalyzerError> {
        tracing::info!(
            computation = %self.job.kind,
            period = %self.time_frame,
            "analyzing period"
        );
        match self.run_steps(known_variables, outputs_timestamp) {
            Ok(outputs) => {
                self.state = AnalyzerState::Done;
                Ok(AnalyzerReport {
                    state: self.state,
                    outputs: outputs.values(),
                })
            }
            Err(e) if e.is_soft() => {
                tracing::warn!(error = %e, "cannot compute indicator");
                self.state = AnalyzerState::Skipped;
                Ok(AnalyzerReport {
                    state: self.state,
                    outputs: Vec::new(),
                })
            }
            Err(e) => {
                tracing::error!(step = %self.state, error = %e, "analyzer failed");
                self.state = AnalyzerState::Failed;
                Err(e)
            }
        }
    }

    fn run_steps(
        &mut self,
        known_variables: &KnownVariables,
        outputs_timestamp: Option<DateTime<Utc>>,
    ) -> Result<OutputSet, AnalyzerError> {
        self.transition(AnalyzerState::LoadingInputs);
        let inputs = self.load_inputs()?;
        if inputs.is_empty() {
            return Err(AnalyzerError::DataUnavailable(
                self.job.indicator.input_variable_names().to_vec(),
            ));
        }
        self.job.computation.check_inputs(&inputs)?;

        self.transition(AnalyzerState::CreatingOutputs);
        let mut outputs = self.create_outputs(known_variables)?;

        self.transition(AnalyzerState::Processing);
        self.process_inputs(&inputs, &mut outputs)?;

        self.transition(AnalyzerState::Storing);
        self.store_outputs(&outputs, outputs_timestamp.unwrap_or_else(Utc::now))?;
        Ok(outputs)
    }

    fn transition(&mut self, state: AnalyzerState) {
        tracing::info!(state = %state, "analyzer step");
        self.state = state;
    }

    /// Pull the indicator's inputs for the analyzed frame.
    pub fn load_inputs(&self) -> Result<SignalSet, AnalyzerError> {
        match self.source.flush_if_connected()? {
            FlushStatus::Flushed => tracing::debug!("event bus flushed"),
            FlushStatus::NotConnected => tracing::debug!("no event bus attached"),
        }

        let specs = self.job.computation.inputs();
        let names: HashSet<String> = specs.iter().map(|s| s.name.clone()).collect();
        let events = self.source.get_events(&self.time_frame, &names)?;
        let inputs = SignalSet::from_events(&specs, &self.time_frame, events);
        tracing::info!(loaded = inputs.len(), declared = specs.len(), "inputs loaded");
        Ok(inputs)
    }

    /// Declare the output variables to the warehouse (if not known yet).
    pub fn create_outputs(
        &self,
        known_variables: &KnownVariables,
    ) -> Result<OutputSet, AnalyzerError> {
        let definitions = self
            .job
            .computation
            .outputs(&self.job.indicator, self.period);
        known_variables.declare_if_absent(
            self.sink.as_ref(),
            self.job.params.site_id,
            &definitions,
        )?;
        Ok(OutputSet::new(definitions))
    }

    /// Run the computation.
    pub fn process_inputs(
        &self,
        inputs: &SignalSet,
        outputs: &mut OutputSet,
    ) -> Result<(), AnalyzerError> {
        let ctx = ProcessContext {
            indicator: &self.job.indicator,
            period: self.period,
            time_frame: &self.time_frame,
        };
        self.job.computation.process(&ctx, inputs, outputs)
    }

    /// Push the recorded outputs to the warehouse.
    pub fn store_outputs(
        &self,
        outputs: &OutputSet,
        timestamp: DateTime<Utc>,
    ) -> Result<(), AnalyzerError> {
        let mut points: Vec<(String, f64)> = Vec::new();
        let mut series: Vec<SeriesRecord> = Vec::new();
        for (name, value) in outputs.values() {
            match value {
                OutputValue::Scalar(v) => points.push((name, v)),
                OutputValue::Series(pts) => series.push(SeriesRecord {
                    name,
                    points: pts.iter().map(|p| (p.timestamp, p.value)).collect(),
                }),
            }
        }

        if points.is_empty() && series.is_empty() {
            tracing::warn!("no output to store");
            return Ok(());
        }
        let site_id = self.job.params.site_id;
        if !points.is_empty() {
            self.sink.store_points(site_id, &points, timestamp)?;
        }
        if !series.is_empty() {
            self.sink.store_series(site_id, &series)?;
        }
        Ok(())
    }
}
