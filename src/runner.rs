//! Batch execution of resolved analyzer jobs.
//!
//! Jobs are independent: a failing job is logged and counted, the others
//! still run and keep their stored outputs. With more than one worker, jobs
//! are spread over a bounded pool of threads fed through a channel; outcomes
//! are reported in job order either way.

use crate::analyzer::{Analyzer, AnalyzerJob, AnalyzerState, OutputValue};
use crate::core::Period;
use crate::source::EventSource;
use crate::warehouse::{KnownVariables, WarehouseSink};
use chrono::{DateTime, Utc};
use crossbeam_channel::unbounded;
use std::sync::Arc;
use uuid::Uuid;

/// Runner errors.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Some jobs failed; the summary holds every outcome
    #[error("{executed} indicator(s) computation completed with {failed} error(s)")]
    Aggregate {
        executed: usize,
        failed: usize,
        summary: Box<RunSummary>,
    },
}

/// Runner options.
#[derive(Debug, Clone, Copy)]
pub struct RunnerOptions {
    /// Worker threads; 1 runs the jobs one after the other
    pub workers: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

/// What happened to one job.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub indicator: String,
    pub kind: String,
    pub state: AnalyzerState,
    pub outputs: Vec<(String, OutputValue)>,
    pub error: Option<String>,
}

/// Outcome of a whole batch.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub batch_id: Uuid,
    pub executed: usize,
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
    pub outcomes: Vec<JobOutcome>,
}

impl RunSummary {
    fn new(batch_id: Uuid, outcomes: Vec<JobOutcome>) -> Self {
        let count = |state| outcomes.iter().filter(|o| o.state == state).count();
        Self {
            batch_id,
            executed: outcomes.len(),
            done: count(AnalyzerState::Done),
            skipped: count(AnalyzerState::Skipped),
            failed: count(AnalyzerState::Failed),
            outcomes,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Executes analyzer jobs against shared collaborators.
pub struct Runner {
    source: Arc<dyn EventSource>,
    sink: Arc<dyn WarehouseSink>,
    options: RunnerOptions,
}

impl Runner {
    pub fn new(source: Arc<dyn EventSource>, sink: Arc<dyn WarehouseSink>) -> Self {
        Self {
            source,
            sink,
            options: RunnerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every job for the period preceding `computation_date` (now if
    /// absent). Outputs are stamped with the computation date.
    pub fn run(
        &self,
        jobs: Vec<AnalyzerJob>,
        period: Period,
        computation_date: Option<DateTime<Utc>>,
    ) -> Result<RunSummary, RunnerError> {
        let batch_id = Uuid::new_v4();
        let span = tracing::info_span!("batch", id = %batch_id, period = %period);
        let _enter = span.enter();

        let known_variables = KnownVariables::new();
        let batch = Batch {
            period,
            computation_date,
            outputs_timestamp: computation_date.unwrap_or_else(Utc::now),
            known_variables: &known_variables,
        };

        let workers = self.options.workers.max(1).min(jobs.len().max(1));
        tracing::info!(jobs = jobs.len(), workers, "starting batch");
        let outcomes = if workers == 1 {
            jobs.into_iter().map(|job| self.run_job(job, &batch)).collect()
        } else {
            self.run_pool(jobs, &batch, workers)
        };

        let summary = RunSummary::new(batch_id, outcomes);
        if summary.is_success() {
            tracing::info!(
                executed = summary.executed,
                done = summary.done,
                skipped = summary.skipped,
                "batch completed"
            );
            Ok(summary)
        } else {
            let err = RunnerError::Aggregate {
                executed: summary.executed,
                failed: summary.failed,
                summary: Box::new(summary),
            };
            tracing::error!("{err}");
            Err(err)
        }
    }

    fn run_pool(
        &self,
        jobs: Vec<AnalyzerJob>,
        batch: &Batch<'_>,
        workers: usize,
    ) -> Vec<JobOutcome> {
        let (job_tx, job_rx) = unbounded::<(usize, AnalyzerJob)>();
        let (outcome_tx, outcome_rx) = unbounded::<(usize, JobOutcome)>();
        for entry in jobs.into_iter().enumerate() {
            // the receiver lives until the end of this function
            let _ = job_tx.send(entry);
        }
        drop(job_tx);

        let parent = tracing::Span::current();
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let outcome_tx = outcome_tx.clone();
                let parent = parent.clone();
                scope.spawn(move || {
                    let _enter = parent.enter();
                    for (index, job) in job_rx.iter() {
                        let outcome = self.run_job(job, batch);
                        if outcome_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(outcome_tx);

        let mut outcomes: Vec<(usize, JobOutcome)> = outcome_rx.iter().collect();
        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn run_job(&self, job: AnalyzerJob, batch: &Batch<'_>) -> JobOutcome {
        let indicator = job.indicator.name().to_string();
        let kind = job.kind.clone();
        let span = tracing::info_span!("analyzer", indicator = %indicator);
        let _enter = span.enter();

        let mut analyzer = Analyzer::new(
            job,
            batch.period,
            batch.computation_date,
            Arc::clone(&self.source),
            Arc::clone(&self.sink),
        );
        match analyzer.run(batch.known_variables, Some(batch.outputs_timestamp)) {
            Ok(report) => JobOutcome {
                indicator,
                kind,
                state: report.state,
                outputs: report.outputs,
                error: None,
            },
            Err(e) => JobOutcome {
                indicator,
                kind,
                state: analyzer.state(),
                outputs: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Per-batch values shared by all jobs.
struct Batch<'a> {
    period: Period,
    computation_date: Option<DateTime<Utc>>,
    outputs_timestamp: DateTime<Utc>,
    known_variables: &'a KnownVariables,
}
