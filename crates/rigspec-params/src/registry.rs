//! [`InterfaceRegistry`] – explicit lookup service for interface contracts.
//!
//! The registry is built once per validation run and passed by reference to
//! whoever needs it; there is no global instance, so parallel runs never
//! interfere.  Once built it is only read.

use std::collections::BTreeMap;

use rigspec_types::{ConfigError, InterfaceMismatch};
use tracing::debug;

use crate::interface::{check_compatible, InterfaceSpec};
use crate::store::ParameterSet;

/// Catalog of [`InterfaceSpec`]s keyed by name.
#[derive(Debug, Clone, Default)]
pub struct InterfaceRegistry {
    specs: BTreeMap<String, InterfaceSpec>,
}

impl InterfaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry holding every interface of a resolved parameter set.
    pub fn from_parameters(params: &ParameterSet) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for spec in params.interfaces().values() {
            registry.register(spec.clone())?;
        }
        Ok(registry)
    }

    /// Register an interface.
    ///
    /// Re-registering an identical definition is a no-op.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateInterface`] when the name is already bound to
    /// a different definition.
    pub fn register(&mut self, spec: InterfaceSpec) -> Result<(), ConfigError> {
        match self.specs.get(&spec.name) {
            Some(existing) if *existing == spec => Ok(()),
            Some(_) => Err(ConfigError::DuplicateInterface { name: spec.name }),
            None => {
                debug!(interface = %spec.name, kind = spec.kind.name(), "interface registered");
                self.specs.insert(spec.name.clone(), spec);
                Ok(())
            }
        }
    }

    /// Look up an interface by name.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownInterface`] when no interface has that name.
    pub fn lookup(&self, name: &str) -> Result<&InterfaceSpec, ConfigError> {
        self.specs
            .get(name)
            .ok_or_else(|| ConfigError::UnknownInterface(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// Iterate over all registered interfaces in name order.
    pub fn iter(&self) -> impl Iterator<Item = &InterfaceSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Bind-time compatibility check for two interfaces joined by a mate.
    ///
    /// An unregistered name is reported as a mismatch against the other side.
    pub fn check_pair(&self, left: &str, right: &str) -> Result<(), InterfaceMismatch> {
        let missing = |name: &str| InterfaceMismatch {
            left: left.to_string(),
            right: right.to_string(),
            reason: format!("interface '{name}' is not registered"),
        };
        let a = self.specs.get(left).ok_or_else(|| missing(left))?;
        let b = self.specs.get(right).ok_or_else(|| missing(right))?;
        check_compatible(a, b)
    }
}
