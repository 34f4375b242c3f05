//! Periodic Analytics - behavioral indicators for buildings.
//!
//! This library derives periodic indicators (room occupancy, workstation
//! misuse, shading and lighting correlation, window opening effects) from
//! raw sensor event streams, and publishes them to a remote data warehouse.
//!
//! # Principles
//!
//! - **Closed periods only**: a run analyzes the previous completed day,
//!   week or month, never the one in progress
//! - **Pure algebra**: indicators are built from timestamped signal
//!   operators that never mutate their inputs
//! - **Independent jobs**: a failing indicator never stops the others, and
//!   stored outputs are never rolled back
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Periodic Analytics                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Config    │──▶│  Resolver   │──▶│   Runner    │       │
//! │  │  (batch)    │   │ (registry)  │   │   (jobs)    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │               │
//! │                                             ▼               │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Event     │──▶│  Analyzer   │──▶│  Warehouse  │       │
//! │  │   Source    │   │  (signals)  │   │    Sink     │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use periodic_analytics::{
//!     BatchConfig, BlockingWarehouseClient, ComputationRegistry, ConfigResolver,
//!     JsonlEventSource, Period, Runner,
//! };
//! use std::sync::Arc;
//!
//! let config = BatchConfig::load("batch.json").expect("invalid configuration");
//! let registry = ComputationRegistry::builtin();
//! let jobs = ConfigResolver::new(&registry).resolve(&config).expect("unresolvable jobs");
//!
//! let source = JsonlEventSource::open("events.jsonl").expect("event store");
//! let sink = BlockingWarehouseClient::new(config.warehouse.to_client_config(true)).expect("client");
//! let runner = Runner::new(Arc::new(source), Arc::new(sink));
//! let summary = runner.run(jobs, Period::Day, None);
//! ```

pub mod analyzer;
pub mod config;
pub mod core;
pub mod resolver;
pub mod runner;
pub mod source;
pub mod warehouse;

// Re-export key types at crate root for convenience
pub use analyzer::{
    Analyzer, AnalyzerError, AnalyzerJob, AnalyzerParams, AnalyzerState, Computation,
    ComputationRegistry, OutputValue,
};
pub use config::{BatchConfig, ConfigError};
pub use core::{BooleanSignal, IndicatorDefinition, NumericSignal, Period, TimeFrame};
pub use resolver::ConfigResolver;
pub use runner::{JobOutcome, RunSummary, Runner, RunnerError, RunnerOptions};
pub use source::{EventSource, JsonlEventSource, MemoryEventSource, SensorEvent};
pub use warehouse::{
    BlockingWarehouseClient, KnownVariables, WarehouseClient, WarehouseConfig, WarehouseError,
    WarehouseSink,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
