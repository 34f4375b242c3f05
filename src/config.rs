//! Batch configuration documents.
//!
//! A batch document lists the analyzer entries of one run, plus optional
//! defaults, a template import and connection settings. Entries are kept as
//! raw JSON objects until resolution, since template references are
//! expanded with a shallow merge.

use crate::core::IndicatorError;
use crate::warehouse::{WarehouseConfig, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory name under the user configuration directory.
pub const APP_DIR: &str = "periodic-analytics";

/// Configuration errors. Any of them aborts the batch before a job runs.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {message}")]
    Io { path: String, message: String },
    #[error("parse error in {path}: {message}")]
    Parse { path: String, message: String },
    #[error("imported document not found: {0}")]
    ImportNotFound(String),
    #[error("invalid imported document {path}: {message}")]
    InvalidImport { path: String, message: String },
    #[error("unresolved definition reference ({0})")]
    UnresolvedReference(String),
    #[error("relative class name used ({0}) and analyzers_module not configured")]
    MissingModule(String),
    #[error("unknown computation '{0}'")]
    UnknownComputation(String),
    #[error("invalid analyzer entry '{name}': {message}")]
    InvalidEntry { name: String, message: String },
    #[error("invalid indicator '{name}': {source}")]
    Indicator {
        name: String,
        #[source]
        source: IndicatorError,
    },
}

/// Document-level defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Defaults {
    /// Analyzer parameters applied to every entry (entries win)
    #[serde(default)]
    pub analyzer_params: Map<String, Value>,
    /// Namespace used to qualify short computation names
    #[serde(default)]
    pub analyzers_module: Option<String>,
}

/// Warehouse connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout
    #[serde(default = "default_timeout", rename = "timeout_secs", with = "duration_serde")]
    pub timeout: Duration,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for WarehouseSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl WarehouseSettings {
    /// Client configuration for these settings.
    pub fn to_client_config(&self, dry_run: bool) -> WarehouseConfig {
        WarehouseConfig {
            timeout: self.timeout,
            max_attempts: self.max_attempts.max(1),
            dry_run,
            ..WarehouseConfig::new(self.base_url.clone())
        }
    }
}

/// Event store export location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStoreSettings {
    pub path: PathBuf,
}

/// An analyzer entry, after template expansion.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerEntry {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub skip: bool,
    pub analyzer: AnalyzerSpec,
    #[serde(default)]
    pub indicator_params: Map<String, Value>,
}

/// Which computation an entry runs, and its analyzer parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzerSpec {
    pub class: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// A batch configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub defaults: Defaults,

    /// Template document, relative to this document's directory
    #[serde(default)]
    pub import: Option<PathBuf>,

    #[serde(default)]
    pub warehouse: WarehouseSettings,

    #[serde(default)]
    pub event_store: Option<EventStoreSettings>,

    /// Raw analyzer entries, in execution order
    #[serde(default)]
    pub analyzers: Vec<Map<String, Value>>,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl BatchConfig {
    /// Load a batch document from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let config = Self::parse(&content, base_dir).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), entries = config.analyzers.len(), "batch configuration loaded");
        Ok(config)
    }

    /// Parse a batch document held in memory.
    pub fn parse(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self, serde_json::Error> {
        let mut config: BatchConfig = serde_json::from_str(content)?;
        config.base_dir = base_dir.into();
        Ok(config)
    }

    /// Resolve a path relative to the document's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Load the template document, empty if none is imported.
    pub fn load_templates(&self) -> Result<Map<String, Value>, ConfigError> {
        let Some(import) = &self.import else {
            return Ok(Map::new());
        };
        let path = self.resolve_path(import);
        if !path.exists() {
            return Err(ConfigError::ImportNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let invalid = |message: String| ConfigError::InvalidImport {
            path: path.display().to_string(),
            message,
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(templates)) => Ok(templates),
            Ok(_) => Err(invalid("expected an object mapping names to definitions".to_string())),
            Err(e) => Err(invalid(e.to_string())),
        }
    }

    /// Event store export path, if configured.
    pub fn event_store_path(&self) -> Option<PathBuf> {
        self.event_store.as_ref().map(|s| self.resolve_path(&s.path))
    }

    /// Find a configuration file given on the command line.
    ///
    /// Relative paths are tried against the working directory, then against
    /// the user configuration directory.
    pub fn locate(path: &Path) -> Option<PathBuf> {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        if path.is_absolute() {
            return None;
        }
        default_dir()
            .map(|dir| dir.join(path))
            .filter(|candidate| candidate.exists())
    }
}

/// `<config_dir>/periodic-analytics`
pub fn default_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
