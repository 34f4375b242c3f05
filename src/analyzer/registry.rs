//! Computation registry: maps configuration keys to factories.
//!
//! Keys are fully qualified (`<namespace>.<Name>`). The resolver expands
//! short names against the batch default namespace before lookup.

use super::indicators::{
    RoomOccupancy, ShadeLightingCorrelation, WindowOpenTemperature, WorkstationMisuse,
};
use super::Computation;
use crate::core::{IndicatorDefinition, IndicatorError};
use std::collections::BTreeMap;
use std::fmt;

/// Namespace of the built-in building indicators.
pub const BUILTIN_NAMESPACE: &str = "building";

/// Builds a computation from its indicator parameters.
pub type ComputationFactory =
    fn(&IndicatorDefinition) -> Result<Box<dyn Computation>, IndicatorError>;

/// Registry of available computations.
#[derive(Clone, Default)]
pub struct ComputationRegistry {
    factories: BTreeMap<String, ComputationFactory>,
}

impl ComputationRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in building indicators.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(qualified("RoomOccupancy"), RoomOccupancy::factory);
        registry.register(qualified("WorkstationMisuse"), WorkstationMisuse::factory);
        registry.register(qualified("ShadeLightingCorrelation"), ShadeLightingCorrelation::factory);
        registry.register(qualified("WindowOpenTemperature"), WindowOpenTemperature::factory);
        registry
    }

    /// Register a factory, returning the one it replaces.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        factory: ComputationFactory,
    ) -> Option<ComputationFactory> {
        self.factories.insert(key.into(), factory)
    }

    pub fn get(&self, key: &str) -> Option<ComputationFactory> {
        self.factories.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.factories.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for ComputationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputationRegistry")
            .field("keys", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn qualified(name: &str) -> String {
    format!("{BUILTIN_NAMESPACE}.{name}")
}
