//! Integration tests for batch execution

mod common;

use chrono::{TimeZone, Utc};
use common::RecordingWarehouse;
use periodic_analytics::{
    AnalyzerState, BatchConfig, ComputationRegistry, ConfigResolver, JsonlEventSource, Period,
    Runner, RunnerError, RunnerOptions,
};
use std::fs;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const EVENTS: &str = r#"
{"var_name": "room1.motion", "timestamp": "2016-07-16T08:00:00Z", "value": true}
{"var_name": "room1.motion", "timestamp": "2016-07-16T08:03:00Z", "value": "on"}
{"var_name": "room1.window", "timestamp": "2016-07-16T09:00:00Z", "value": false}
{"var_name": "room1.temp", "timestamp": "2016-07-16T09:00:00Z", "value": 21.0}
{"var_name": "desk.motion", "timestamp": "2016-07-16T09:00:00Z", "value": 1}
{"var_name": "desk.pc", "timestamp": "2016-07-16T08:00:00Z", "value": 10.0}
{"var_name": "desk.pc", "timestamp": "2016-07-16T09:00:00Z", "value": 11.0}
{"var_name": "desk.pc", "timestamp": "2016-07-16T10:00:00Z", "value": 12.0}
{"var_name": "desk.pc", "timestamp": "2016-07-16T11:00:00Z", "value": 12.0}
{"var_name": "desk.pc", "timestamp": "2016-07-17T11:00:00Z", "value": 99.0}
"#;

const BATCH: &str = r#"{
    "defaults": {"analyzer_params": {"site_id": 3}, "analyzers_module": "building"},
    "event_store": {"path": "events.jsonl"},
    "analyzers": [
        {"name": "WU1", "analyzer": {"class": "RoomOccupancy"},
         "indicator_params": {"motion_variable_names": ["room1.motion", "room2.motion"]}},
        {"name": "WU3", "analyzer": {"class": "WindowOpenTemperature"},
         "indicator_params": {"window_state_names": ["room1.window"], "room_temperature_name": "room1.temp"}},
        {"name": "STU6", "analyzer": {"class": "WorkstationMisuse"},
         "indicator_params": {"motion_variable_name": "desk.motion", "energy_variable_names": ["desk.pc"]}}
    ]
}"#;

struct Fixture {
    _dir: tempfile::TempDir,
    config: BatchConfig,
    source: Arc<JsonlEventSource>,
}

fn fixture(batch: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("events.jsonl"), EVENTS).unwrap();
    fs::write(dir.path().join("batch.json"), batch).unwrap();

    let config = BatchConfig::load(dir.path().join("batch.json")).unwrap();
    let events = config.event_store_path().unwrap();
    let source = Arc::new(JsonlEventSource::open(events).unwrap());
    Fixture {
        _dir: dir,
        config,
        source,
    }
}

fn computation_date() -> Option<chrono::DateTime<Utc>> {
    Some(Utc.with_ymd_and_hms(2016, 7, 17, 3, 0, 0).unwrap())
}

fn ratio(minutes: f64) -> f64 {
    minutes * 60_000.0 / (86_400_000.0 - 1.0)
}

#[test]
fn test_partial_failure_is_isolated() {
    for workers in [1, 3] {
        let fixture = fixture(BATCH);
        let registry = ComputationRegistry::builtin();
        let jobs = ConfigResolver::new(&registry).resolve(&fixture.config).unwrap();
        assert_eq!(jobs.len(), 3);

        let sink = Arc::new(RecordingWarehouse::default());
        let runner = Runner::new(fixture.source.clone(), sink.clone())
            .with_options(RunnerOptions { workers });

        let err = runner.run(jobs, Period::Day, computation_date()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "3 indicator(s) computation completed with 1 error(s)"
        );
        let RunnerError::Aggregate {
            executed,
            failed,
            summary,
        } = err;
        assert_eq!((executed, failed), (3, 1));

        let states: Vec<AnalyzerState> = summary.outcomes.iter().map(|o| o.state).collect();
        assert_eq!(
            states,
            [AnalyzerState::Done, AnalyzerState::Failed, AnalyzerState::Done]
        );
        assert!(summary.outcomes[1]
            .error
            .as_deref()
            .unwrap()
            .contains("no window opening"));

        // outputs of the jobs that succeeded are stored
        let wu1 = sink.stored_value("WU1_day").unwrap();
        assert!((wu1 - ratio(8.0)).abs() < 1e-9);
        let stu6 = sink.stored_value("STU6_day").unwrap();
        assert!((stu6 - ratio(115.0)).abs() < 1e-9);
        assert!(sink.stored_value("WU3_10_day").is_none());

        // the failed job still declared its outputs before processing
        let declared: Vec<String> = sink
            .declared
            .lock()
            .unwrap()
            .iter()
            .map(|(_, d)| d.name.clone())
            .collect();
        assert!(declared.contains(&"WU3_30_day".to_string()));
        assert_eq!(sink.list_calls.load(Ordering::SeqCst), 1);

        // stamped with the computation date
        let stamps: Vec<_> = sink.stored.lock().unwrap().iter().map(|(_, _, ts, _)| *ts).collect();
        assert!(stamps.iter().all(|ts| Some(*ts) == computation_date()));
    }
}

#[test]
fn test_missing_data_is_skipped_not_failed() {
    let batch = r#"{
        "defaults": {"analyzer_params": {"site_id": 3}, "analyzers_module": "building"},
        "event_store": {"path": "events.jsonl"},
        "analyzers": [
            {"name": "WU1", "analyzer": {"class": "RoomOccupancy"},
             "indicator_params": {"motion_variable_names": ["room9.motion"]}},
            {"name": "WU2", "analyzer": {"class": "ShadeLightingCorrelation"},
             "indicator_params": {"lux_out_ref_name": "out", "lux_shade_name": "shade", "lux_lighting_name": "lamp"}}
        ]
    }"#;
    let fixture = fixture(batch);
    let registry = ComputationRegistry::builtin();
    let jobs = ConfigResolver::new(&registry).resolve(&fixture.config).unwrap();

    let sink = Arc::new(RecordingWarehouse::default());
    let summary = Runner::new(fixture.source.clone(), sink.clone())
        .run(jobs, Period::Day, computation_date())
        .unwrap();

    assert_eq!(summary.executed, 2);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.failed, 0);
    assert!(sink.stored_names().is_empty());
    assert_eq!(sink.declare_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_previous_period_only() {
    // the 2016-07-17 sample must not be seen when analyzing 2016-07-16
    let fixture = fixture(BATCH);
    let registry = ComputationRegistry::builtin();
    let jobs: Vec<_> = ConfigResolver::new(&registry)
        .resolve(&fixture.config)
        .unwrap()
        .into_iter()
        .filter(|j| j.indicator.name() == "STU6")
        .collect();

    let sink = Arc::new(RecordingWarehouse::default());
    let summary = Runner::new(fixture.source.clone(), sink.clone())
        .run(jobs, Period::Day, computation_date())
        .unwrap();
    assert_eq!(summary.done, 1);
    let stu6 = sink.stored_value("STU6_day").unwrap();
    assert!((stu6 - ratio(115.0)).abs() < 1e-9);
}
