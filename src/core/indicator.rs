//! Indicator definitions.
//!
//! An indicator definition is pure data: a name, human-readable metadata and
//! the parameters of the computation that produces it. Typed parameter
//! accessors report missing or mistyped values as [`IndicatorError`].

use serde::Serialize;
use serde_json::{Map, Value};

/// Errors raised while reading indicator parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    #[error("indicator name must not be empty")]
    EmptyName,
    #[error("missing mandatory parameters [{}]", .0.join(", "))]
    MissingParameters(Vec<String>),
    #[error("parameter '{name}' must be {expected}")]
    InvalidParameter { name: String, expected: &'static str },
}

/// A named, parameterized indicator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorDefinition {
    name: String,
    label: String,
    description: String,
    input_variable_names: Vec<String>,
    parameters: Map<String, Value>,
}

impl IndicatorDefinition {
    /// Create a definition. The label defaults to the name.
    pub fn new(
        name: impl Into<String>,
        label: Option<String>,
        description: Option<String>,
        parameters: Map<String, Value>,
    ) -> Result<Self, IndicatorError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IndicatorError::EmptyName);
        }
        Ok(Self {
            label: label.unwrap_or_else(|| name.clone()),
            description: description.unwrap_or_default(),
            name,
            input_variable_names: Vec::new(),
            parameters,
        })
    }

    /// Attach the input variable names declared by the computation.
    pub fn with_inputs(mut self, names: Vec<String>) -> Self {
        self.input_variable_names = names;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_variable_names(&self) -> &[String] {
        &self.input_variable_names
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Fail with every missing name at once.
    pub fn require(&self, names: &[&str]) -> Result<(), IndicatorError> {
        let missing: Vec<String> = names
            .iter()
            .filter(|n| self.parameters.get(**n).map_or(true, Value::is_null))
            .map(|n| n.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(IndicatorError::MissingParameters(missing))
        }
    }

    /// A mandatory non-empty string parameter.
    pub fn str_param(&self, name: &str) -> Result<String, IndicatorError> {
        self.require(&[name])?;
        match self.parameters.get(name) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            _ => Err(invalid(name, "a non-empty string")),
        }
    }

    /// A mandatory non-empty list of strings.
    pub fn str_list_param(&self, name: &str) -> Result<Vec<String>, IndicatorError> {
        self.require(&[name])?;
        let items = self
            .parameters
            .get(name)
            .and_then(Value::as_array)
            .ok_or_else(|| invalid(name, "a list of strings"))?;
        let names: Option<Vec<String>> = items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect();
        match names {
            Some(names) if !names.is_empty() => Ok(names),
            _ => Err(invalid(name, "a non-empty list of strings")),
        }
    }

    /// An optional number, falling back to `default` when absent or null.
    pub fn f64_param_or(&self, name: &str, default: f64) -> Result<f64, IndicatorError> {
        match self.parameters.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| invalid(name, "a number")),
        }
    }

    /// An optional list of positive integers, falling back to `default`.
    pub fn u32_list_param_or(
        &self,
        name: &str,
        default: &[u32],
    ) -> Result<Vec<u32>, IndicatorError> {
        match self.parameters.get(name) {
            None | Some(Value::Null) => Ok(default.to_vec()),
            Some(Value::Array(items)) => {
                let values: Option<Vec<u32>> = items
                    .iter()
                    .map(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()).filter(|&n| n > 0))
                    .collect();
                values
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| invalid(name, "a non-empty list of positive integers"))
            }
            Some(_) => Err(invalid(name, "a non-empty list of positive integers")),
        }
    }
}

fn invalid(name: &str, expected: &'static str) -> IndicatorError {
    IndicatorError::InvalidParameter {
        name: name.to_string(),
        expected,
    }
}
