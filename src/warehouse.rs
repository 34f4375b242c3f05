//! Data warehouse client for publishing computed indicators.
//!
//! The warehouse catalogs variables per site and stores timestamped points.
//! Analyzers reach it through the [`WarehouseSink`] trait; the HTTP
//! implementation is [`BlockingWarehouseClient`], a synchronous facade over
//! the async [`WarehouseClient`].

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::time::Duration;

/// Default warehouse API root.
pub const DEFAULT_BASE_URL: &str = "http://pdw.performerproject.eu/api/dss";

/// Warehouse configuration.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Attempts per request (network errors and 5xx are retried)
    pub max_attempts: u32,
    /// Pause between attempts, multiplied by the attempt number
    pub retry_delay: Duration,
    /// Log PUT requests instead of sending them
    pub dry_run: bool,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            dry_run: false,
        }
    }
}

impl WarehouseConfig {
    /// Create a configuration for the given API root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// URL of a site-scoped resource.
    pub fn site_url(&self, site_id: u32, path: &str) -> String {
        format!("{}/sites/{}/{}", self.base_url, site_id, path)
    }

    /// Variable list endpoint.
    pub fn varlist_url(&self, site_id: u32) -> String {
        self.site_url(site_id, "varlist")
    }

    /// Variable definitions upload endpoint.
    pub fn vardefs_url(&self, site_id: u32) -> String {
        self.site_url(site_id, "vardefs")
    }

    /// Points upload endpoint.
    pub fn series_url(&self, site_id: u32) -> String {
        self.site_url(site_id, "series")
    }
}

/// Warehouse error types.
#[derive(Debug, thiserror::Error)]
pub enum WarehouseError {
    /// Client construction error
    #[error("warehouse client error: {0}")]
    Client(String),
    /// Network/HTTP error
    #[error("warehouse network error: {0}")]
    Network(String),
    /// Server returned an error response
    #[error("warehouse server error ({status}): {message}")]
    Server { status: u16, message: String },
    /// JSON serialization error
    #[error("warehouse serialization error: {0}")]
    Serialization(String),
    /// Archive building error
    #[error("archive error: {0}")]
    Archive(String),
}

/// Definition of a warehouse variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub unit: String,
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            unit: "none".to_string(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// Points of one variable to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    pub name: String,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

/// Variable list reply.
#[derive(Debug, Deserialize)]
struct VarList {
    #[serde(default)]
    varlist: Option<Vec<String>>,
}

/// Publishing side of the warehouse.
pub trait WarehouseSink: Send + Sync {
    /// Names of the variables already defined for the site.
    fn list_variables(&self, site_id: u32) -> Result<Vec<String>, WarehouseError>;

    /// Define variables, unconditionally.
    fn declare_variables(
        &self,
        site_id: u32,
        definitions: &[VariableDefinition],
    ) -> Result<(), WarehouseError>;

    /// Append points to the series of one or more variables.
    fn store_series(&self, site_id: u32, records: &[SeriesRecord]) -> Result<(), WarehouseError>;

    /// Store one point per variable, all stamped with `timestamp`.
    fn store_points(
        &self,
        site_id: u32,
        points: &[(String, f64)],
        timestamp: DateTime<Utc>,
    ) -> Result<(), WarehouseError> {
        let records: Vec<SeriesRecord> = points
            .iter()
            .map(|(name, value)| SeriesRecord {
                name: name.clone(),
                points: vec![(timestamp, *value)],
            })
            .collect();
        self.store_series(site_id, &records)
    }
}

/// Batch-scoped cache of the variables known to the warehouse, per site.
///
/// Filled lazily with one variable list request per site, then appended to
/// after each declaration. The lock is held across the declaration request
/// so a single writer updates the cache at a time. Never persisted.
#[derive(Debug, Default)]
pub struct KnownVariables {
    sites: Mutex<HashMap<u32, HashSet<String>>>,
}

impl KnownVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the variables not yet known for the site.
    ///
    /// Returns the number of variables actually declared.
    pub fn declare_if_absent(
        &self,
        sink: &dyn WarehouseSink,
        site_id: u32,
        definitions: &[VariableDefinition],
    ) -> Result<usize, WarehouseError> {
        let mut sites = self
            .sites
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !sites.contains_key(&site_id) {
            tracing::info!(site_id, "getting existing variables list");
            let names = sink.list_variables(site_id)?;
            if names.is_empty() {
                tracing::warn!(site_id, "no variable defined yet");
            } else {
                tracing::info!(site_id, count = names.len(), "variable(s) already defined");
            }
            sites.insert(site_id, names.into_iter().collect());
        }
        let known = sites.entry(site_id).or_default();

        let missing: Vec<VariableDefinition> = definitions
            .iter()
            .filter(|d| !known.contains(&d.name))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }

        sink.declare_variables(site_id, &missing)?;
        for d in &missing {
            tracing::info!(site_id, variable = %d.name, "variable created");
            known.insert(d.name.clone());
        }
        Ok(missing.len())
    }

    /// Whether a variable is known for the site.
    pub fn contains(&self, site_id: u32, name: &str) -> bool {
        self.sites
            .lock()
            .map(|sites| sites.get(&site_id).is_some_and(|s| s.contains(name)))
            .unwrap_or(false)
    }
}

/// Bundle one `<name>.tsv` file per variable into a deflated zip archive.
///
/// Each line holds `<rfc3339 timestamp>\t<value>`.
pub fn build_archive(records: &[SeriesRecord]) -> Result<Vec<u8>, WarehouseError> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for record in records {
        zip.start_file(format!("{}.tsv", record.name), options)
            .map_err(|e| WarehouseError::Archive(e.to_string()))?;
        for (timestamp, value) in &record.points {
            writeln!(
                zip,
                "{}\t{}",
                timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                value
            )
            .map_err(|e| WarehouseError::Archive(e.to_string()))?;
        }
    }

    let cursor = zip
        .finish()
        .map_err(|e| WarehouseError::Archive(e.to_string()))?;
    Ok(cursor.into_inner())
}

/// Async HTTP client for the warehouse.
pub struct WarehouseClient {
    config: WarehouseConfig,
    client: reqwest::Client,
}

impl WarehouseClient {
    /// Create a new warehouse client.
    pub fn new(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WarehouseError::Client(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Get the variables defined for a site.
    pub async fn list_variables(&self, site_id: u32) -> Result<Vec<String>, WarehouseError> {
        let url = self.config.varlist_url(site_id);
        let response = self.send_with_retry(|| self.client.get(&url)).await?;
        let list: VarList = response
            .json()
            .await
            .map_err(|e| WarehouseError::Serialization(e.to_string()))?;
        Ok(list.varlist.unwrap_or_default())
    }

    /// Upload variable definitions.
    pub async fn declare_variables(
        &self,
        site_id: u32,
        definitions: &[VariableDefinition],
    ) -> Result<(), WarehouseError> {
        let url = self.config.vardefs_url(site_id);
        let body = serde_json::to_vec(definitions)
            .map_err(|e| WarehouseError::Serialization(e.to_string()))?;

        if self.config.dry_run {
            tracing::info!(
                url = %url,
                data = %String::from_utf8_lossy(&body),
                "DRY RUN: simulating PUT request"
            );
            return Ok(());
        }

        self.send_with_retry(|| {
            self.client
                .put(&url)
                .header("Content-Type", "application/json")
                .header("Content-Disposition", "attachment;filename=vardefs.json")
                .body(body.clone())
        })
        .await?;
        Ok(())
    }

    /// Upload series records as a zip archive.
    pub async fn store_series(
        &self,
        site_id: u32,
        records: &[SeriesRecord],
    ) -> Result<(), WarehouseError> {
        let url = self.config.series_url(site_id);
        let archive = build_archive(records)?;
        tracing::info!(
            site_id,
            points = ?records.iter().map(|r| (&r.name, r.points.len())).collect::<Vec<_>>(),
            "storing points"
        );

        if self.config.dry_run {
            tracing::info!(url = %url, bytes = archive.len(), "DRY RUN: simulating PUT request");
            return Ok(());
        }

        self.send_with_retry(|| {
            self.client
                .put(&url)
                .header("Content-Type", "application/zip")
                .header("Content-Disposition", "attachment;filename=temp.zip")
                .body(archive.clone())
        })
        .await?;
        tracing::info!(site_id, "points stored");
        Ok(())
    }

    /// Send a request, retrying network errors and server-side failures.
    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response, WarehouseError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let error = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown error".to_string());
                    let error = WarehouseError::Server {
                        status: status.as_u16(),
                        message,
                    };
                    if !status.is_server_error() {
                        return Err(error);
                    }
                    error
                }
                Err(e) => WarehouseError::Network(e.to_string()),
            };

            if attempt >= attempts {
                return Err(error);
            }
            tracing::warn!(attempt, attempts, error = %error, "warehouse request failed, retrying");
            tokio::time::sleep(self.config.retry_delay * attempt).await;
            attempt += 1;
        }
    }
}

/// Blocking warehouse client for use in synchronous contexts.
pub struct BlockingWarehouseClient {
    inner: WarehouseClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingWarehouseClient {
    /// Create a new blocking warehouse client.
    pub fn new(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| WarehouseError::Client(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: WarehouseClient::new(config)?,
            runtime,
        })
    }

    pub fn config(&self) -> &WarehouseConfig {
        self.inner.config()
    }
}

impl WarehouseSink for BlockingWarehouseClient {
    fn list_variables(&self, site_id: u32) -> Result<Vec<String>, WarehouseError> {
        self.runtime.block_on(self.inner.list_variables(site_id))
    }

    fn declare_variables(
        &self,
        site_id: u32,
        definitions: &[VariableDefinition],
    ) -> Result<(), WarehouseError> {
        self.runtime
            .block_on(self.inner.declare_variables(site_id, definitions))
    }

    fn store_series(&self, site_id: u32, records: &[SeriesRecord]) -> Result<(), WarehouseError> {
        self.runtime.block_on(self.inner.store_series(site_id, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_warehouse_urls() {
        let config = WarehouseConfig::new("http://127.0.0.1:8080/api/dss/");
        assert_eq!(
            config.varlist_url(3),
            "http://127.0.0.1:8080/api/dss/sites/3/varlist"
        );
        assert_eq!(
            config.vardefs_url(3),
            "http://127.0.0.1:8080/api/dss/sites/3/vardefs"
        );
        assert_eq!(
            config.series_url(1),
            "http://127.0.0.1:8080/api/dss/sites/1/series"
        );
    }

    #[test]
    fn test_variable_definition_json() {
        let def = VariableDefinition::new("WU3_10_day", "temperature").with_unit("degC");
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "WU3_10_day", "type": "temperature", "unit": "degC"})
        );
        assert_eq!(VariableDefinition::new("x", "ratio").unit, "none");
    }

    #[test]
    fn test_archive_layout() {
        let ts: DateTime<Utc> = "2016-07-17T00:00:00Z".parse().unwrap();
        let records = vec![
            SeriesRecord {
                name: "WU1_day".to_string(),
                points: vec![(ts, 0.25)],
            },
            SeriesRecord {
                name: "WU2_day".to_string(),
                points: vec![(ts, 0.5), (ts, 0.75)],
            },
        ];
        let bytes = build_archive(&records).unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut content = String::new();
        archive
            .by_name("WU1_day.tsv")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "2016-07-17T00:00:00Z\t0.25\n");

        content.clear();
        archive
            .by_name("WU2_day.tsv")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    /// Sink counting calls, with a preset variable list.
    #[derive(Default)]
    struct CountingSink {
        existing: Vec<String>,
        lists: AtomicUsize,
        declares: AtomicUsize,
    }

    impl WarehouseSink for CountingSink {
        fn list_variables(&self, _site_id: u32) -> Result<Vec<String>, WarehouseError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            Ok(self.existing.clone())
        }

        fn declare_variables(
            &self,
            _site_id: u32,
            _definitions: &[VariableDefinition],
        ) -> Result<(), WarehouseError> {
            self.declares.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn store_series(
            &self,
            _site_id: u32,
            _records: &[SeriesRecord],
        ) -> Result<(), WarehouseError> {
            Ok(())
        }
    }

    #[test]
    fn test_known_variables_declare_once() {
        let sink = CountingSink {
            existing: vec!["WU1_day".to_string()],
            ..Default::default()
        };
        let known = KnownVariables::new();

        let existing = [VariableDefinition::new("WU1_day", "ratio")];
        assert_eq!(known.declare_if_absent(&sink, 3, &existing).unwrap(), 0);

        let fresh = [VariableDefinition::new("WU2_day", "ratio")];
        assert_eq!(known.declare_if_absent(&sink, 3, &fresh).unwrap(), 1);
        assert_eq!(known.declare_if_absent(&sink, 3, &fresh).unwrap(), 0);

        assert_eq!(sink.lists.load(Ordering::SeqCst), 1);
        assert_eq!(sink.declares.load(Ordering::SeqCst), 1);
        assert!(known.contains(3, "WU2_day"));
        assert!(!known.contains(1, "WU2_day"));
    }
}
