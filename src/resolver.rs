//! Turns a batch document into runnable analyzer jobs.
//!
//! Per entry, in document order:
//! 1. skip it if flagged `skip`
//! 2. expand `ref` against the imported templates (entry keys win)
//! 3. find the computation, qualifying short names with the default module
//! 4. merge default analyzer parameters with the entry's (entry wins)
//! 5. build the indicator definition and the computation

use crate::analyzer::{AnalyzerJob, AnalyzerParams, ComputationRegistry};
use crate::config::{AnalyzerEntry, BatchConfig, ConfigError};
use crate::core::IndicatorDefinition;
use serde_json::{Map, Value};

/// Resolves batch entries against a computation registry.
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    registry: &'a ComputationRegistry,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(registry: &'a ComputationRegistry) -> Self {
        Self { registry }
    }

    /// Resolve every entry of the document. Fails on the first error.
    pub fn resolve(&self, config: &BatchConfig) -> Result<Vec<AnalyzerJob>, ConfigError> {
        let templates = config.load_templates()?;
        let mut jobs = Vec::with_capacity(config.analyzers.len());

        for (index, raw) in config.analyzers.iter().enumerate() {
            let name = entry_name(raw, index);
            if raw.get("skip").and_then(Value::as_bool).unwrap_or(false) {
                tracing::info!(indicator = %name, "analyzer skipped by configuration");
                continue;
            }
            let merged = expand_reference(raw, &templates)?;
            let entry: AnalyzerEntry = serde_json::from_value(Value::Object(merged)).map_err(|e| {
                ConfigError::InvalidEntry {
                    name: name.clone(),
                    message: e.to_string(),
                }
            })?;
            jobs.push(self.resolve_entry(config, entry)?);
        }

        tracing::info!(jobs = jobs.len(), "configuration resolved");
        Ok(jobs)
    }

    fn resolve_entry(
        &self,
        config: &BatchConfig,
        entry: AnalyzerEntry,
    ) -> Result<AnalyzerJob, ConfigError> {
        let kind = qualify(&entry.analyzer.class, config.defaults.analyzers_module.as_deref())?;
        let factory = self
            .registry
            .get(&kind)
            .ok_or_else(|| ConfigError::UnknownComputation(kind.clone()))?;

        let params = merge_params(&config.defaults.analyzer_params, &entry.analyzer.params);
        let ignored: Vec<&String> = params
            .keys()
            .filter(|k| !AnalyzerParams::KEYS.contains(&k.as_str()))
            .collect();
        if !ignored.is_empty() {
            tracing::warn!(indicator = %entry.name, ?ignored, "ignoring unknown analyzer parameters");
        }
        let params: AnalyzerParams =
            serde_json::from_value(Value::Object(params)).map_err(|e| ConfigError::InvalidEntry {
                name: entry.name.clone(),
                message: format!("analyzer params: {e}"),
            })?;

        let indicator_error = |source| ConfigError::Indicator {
            name: entry.name.clone(),
            source,
        };
        let indicator = IndicatorDefinition::new(
            entry.name.clone(),
            entry.label.clone(),
            entry.description.clone(),
            entry.indicator_params.clone(),
        )
        .map_err(indicator_error)?;
        let computation = factory(&indicator).map_err(indicator_error)?;
        let indicator =
            indicator.with_inputs(computation.inputs().into_iter().map(|s| s.name).collect());

        tracing::debug!(indicator = %indicator.name(), computation = %kind, "analyzer resolved");
        Ok(AnalyzerJob {
            kind,
            params,
            indicator,
            computation,
        })
    }
}

fn entry_name(raw: &Map<String, Value>, index: usize) -> String {
    raw.get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{}", index + 1))
}

/// Shallow merge of the referenced template under the entry.
fn expand_reference(
    raw: &Map<String, Value>,
    templates: &Map<String, Value>,
) -> Result<Map<String, Value>, ConfigError> {
    let Some(reference) = raw.get("ref") else {
        return Ok(raw.clone());
    };
    let reference = reference.as_str().unwrap_or_default();
    let template = match templates.get(reference) {
        Some(Value::Object(template)) => template,
        _ => return Err(ConfigError::UnresolvedReference(reference.to_string())),
    };
    let mut merged = template.clone();
    merged.extend(raw.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(merged)
}

/// Fully-qualified computation key.
fn qualify(class: &str, module: Option<&str>) -> Result<String, ConfigError> {
    if class.contains('.') {
        return Ok(class.to_string());
    }
    match module {
        Some(module) if !module.is_empty() => Ok(format!("{module}.{class}")),
        _ => Err(ConfigError::MissingModule(class.to_string())),
    }
}

fn merge_params(defaults: &Map<String, Value>, entry: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = defaults.clone();
    merged.extend(entry.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
