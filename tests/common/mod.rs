//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use periodic_analytics::warehouse::{
    SeriesRecord, VariableDefinition, WarehouseError, WarehouseSink,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Warehouse sink keeping everything in memory.
#[derive(Default)]
pub struct RecordingWarehouse {
    pub known: Mutex<HashMap<u32, Vec<String>>>,
    pub declared: Mutex<Vec<(u32, VariableDefinition)>>,
    pub stored: Mutex<Vec<(u32, String, DateTime<Utc>, f64)>>,
    pub list_calls: AtomicUsize,
    pub declare_calls: AtomicUsize,
}

impl RecordingWarehouse {
    pub fn stored_value(&self, name: &str) -> Option<f64> {
        self.stored
            .lock()
            .unwrap()
            .iter()
            .find(|(_, n, _, _)| n == name)
            .map(|(_, _, _, v)| *v)
    }

    pub fn stored_names(&self) -> Vec<String> {
        self.stored
            .lock()
            .unwrap()
            .iter()
            .map(|(_, n, _, _)| n.clone())
            .collect()
    }
}

impl WarehouseSink for RecordingWarehouse {
    fn list_variables(&self, site_id: u32) -> Result<Vec<String>, WarehouseError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .known
            .lock()
            .unwrap()
            .get(&site_id)
            .cloned()
            .unwrap_or_default())
    }

    fn declare_variables(
        &self,
        site_id: u32,
        definitions: &[VariableDefinition],
    ) -> Result<(), WarehouseError> {
        self.declare_calls.fetch_add(1, Ordering::SeqCst);
        let mut declared = self.declared.lock().unwrap();
        let mut known = self.known.lock().unwrap();
        for d in definitions {
            declared.push((site_id, d.clone()));
            known.entry(site_id).or_default().push(d.name.clone());
        }
        Ok(())
    }

    fn store_series(&self, site_id: u32, records: &[SeriesRecord]) -> Result<(), WarehouseError> {
        let mut stored = self.stored.lock().unwrap();
        for r in records {
            for (ts, v) in &r.points {
                stored.push((site_id, r.name.clone(), *ts, *v));
            }
        }
        Ok(())
    }
}

/// A request received by the fake warehouse server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: &'static str,
    pub site_id: u32,
    pub resource: &'static str,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Default)]
pub struct FakeState {
    pub varlist: Mutex<Vec<String>>,
    pub requests: Mutex<Vec<Recorded>>,
    /// Number of upcoming series uploads answered with 503
    pub series_failures: AtomicUsize,
}

impl FakeState {
    fn record(
        &self,
        method: &'static str,
        site_id: u32,
        resource: &'static str,
        headers: &HeaderMap,
        body: Bytes,
    ) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(Recorded {
            method,
            site_id,
            resource,
            content_type: header("content-type"),
            content_disposition: header("content-disposition"),
            body: body.to_vec(),
        });
    }
}

/// In-process HTTP warehouse, served from a background thread.
pub struct FakeWarehouse {
    pub base_url: String,
    pub state: Arc<FakeState>,
}

impl FakeWarehouse {
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, resource: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.resource == resource)
            .count()
    }
}

async fn varlist(
    State(state): State<Arc<FakeState>>,
    Path(site_id): Path<u32>,
    headers: HeaderMap,
) -> Json<Value> {
    state.record("GET", site_id, "varlist", &headers, Bytes::new());
    let names = state.varlist.lock().unwrap().clone();
    Json(json!({ "varlist": names }))
}

async fn vardefs(
    State(state): State<Arc<FakeState>>,
    Path(site_id): Path<u32>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if site_id == 400 {
        return StatusCode::BAD_REQUEST;
    }
    state.record("PUT", site_id, "vardefs", &headers, body);
    StatusCode::OK
}

async fn series(
    State(state): State<Arc<FakeState>>,
    Path(site_id): Path<u32>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let failing = state
        .series_failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if failing {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    state.record("PUT", site_id, "series", &headers, body);
    StatusCode::OK
}

/// Start a fake warehouse knowing `known` variables for every site.
pub fn spawn_warehouse(known: &[&str]) -> FakeWarehouse {
    let state = Arc::new(FakeState::default());
    *state.varlist.lock().unwrap() = known.iter().map(|s| s.to_string()).collect();

    let app = Router::new()
        .route("/api/sites/:site_id/varlist", get(varlist))
        .route("/api/sites/:site_id/vardefs", put(vardefs))
        .route("/api/sites/:site_id/series", put(series))
        .with_state(state.clone());

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().expect("server runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind fake warehouse");
            tx.send(listener.local_addr().expect("local addr"))
                .expect("report address");
            axum::serve(listener, app).await.expect("serve fake warehouse");
        });
    });
    let addr = rx.recv().expect("fake warehouse address");

    FakeWarehouse {
        base_url: format!("http://{addr}/api"),
        state,
    }
}
