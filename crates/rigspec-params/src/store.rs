//! [`ParameterStore`] – layered parameter documents resolved into an
//! immutable [`ParameterSet`] snapshot.
//!
//! Layers are applied in insertion order; a later layer overrides an earlier
//! one key by key (dimensions, tolerances, design rules) or record by record
//! (materials, cable types, actuators).  Interfaces are immutable once
//! declared: a later layer may repeat an interface verbatim but not redefine
//! it.
//!
//! Resolution is a pure function of the layers: the same documents always
//! produce the same snapshot and the same fingerprint.
//!
//! # Example
//!
//! ```
//! use rigspec_params::ParameterStore;
//!
//! let mut store = ParameterStore::new();
//! store.add_toml("base", r#"
//! [dimensions.plate]
//! length = { value = 0.4, unit = "m", min = 0.3, max = 0.5 }
//! "#).unwrap();
//!
//! let params = store.resolve_all().unwrap();
//! assert_eq!(params.number("dimensions.plate.length").unwrap(), 400.0);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use rigspec_types::{ConfigError, Range};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::document::{
    ActuatorRecord, CableTypeRecord, ChoiceRecord, Leaf, MaterialRecord, ParameterDocument,
    RuleRecord, ScalarRecord,
};
use crate::interface::InterfaceSpec;
use crate::registry::InterfaceRegistry;
use crate::rules::DesignRules;
use crate::units::{Dimension, Unit};

// ────────────────────────────────────────────────────────────────────────────
// Resolved records
// ────────────────────────────────────────────────────────────────────────────

/// A resolved parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    /// Numeric value in the canonical unit of its dimension.
    Number(f64),
    /// Enumerated value.
    Choice(String),
}

/// A resolved parameter: value, canonical unit, declared range and the
/// layer that supplied it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub value: ParamValue,
    pub unit: Option<Unit>,
    pub range: Option<Range>,
    pub layer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// kg/m³
    pub density: f64,
    /// MPa
    pub yield_strength: f64,
    /// GPa
    pub elastic_modulus: f64,
    /// W/(m·K)
    pub thermal_conductivity: f64,
    /// °C
    pub max_service_temperature: f64,
    /// mm
    pub min_thickness: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CableTypeSpec {
    pub name: String,
    pub gauge_awg: u32,
    /// mm
    pub insulation: f64,
    /// mm
    pub min_bend_radius: f64,
    /// A
    pub max_current: f64,
}

impl CableTypeSpec {
    /// Bare conductor diameter from the AWG formula, mm.
    pub fn conductor_diameter(&self) -> f64 {
        0.127 * 92f64.powf((36.0 - f64::from(self.gauge_awg)) / 39.0)
    }

    /// Estimated outer diameter (conductor plus two insulation walls), mm.
    pub fn outer_diameter(&self) -> f64 {
        self.conductor_diameter() + 2.0 * self.insulation
    }

    /// Cross-sectional area of the whole cable, mm².
    pub fn cross_section(&self) -> f64 {
        let r = self.outer_diameter() / 2.0;
        std::f64::consts::PI * r * r
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorSpec {
    pub name: String,
    /// N·m
    pub rated_peak_torque: f64,
    /// °C
    pub max_winding_temperature: f64,
    /// °C/W
    pub thermal_resistance: f64,
    /// rad/s
    pub duty_speed: f64,
    /// A
    pub peak_current: f64,
    /// `(load %, efficiency)` points sorted by load.
    pub efficiency_curve: Vec<(f64, f64)>,
}

// ────────────────────────────────────────────────────────────────────────────
// ParameterSet
// ────────────────────────────────────────────────────────────────────────────

/// Immutable snapshot of all resolved parameters for one build.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSet {
    values: BTreeMap<String, Parameter>,
    materials: BTreeMap<String, Material>,
    cable_types: BTreeMap<String, CableTypeSpec>,
    actuators: BTreeMap<String, ActuatorSpec>,
    interfaces: BTreeMap<String, InterfaceSpec>,
    rules: DesignRules,
    fingerprint: String,
}

impl ParameterSet {
    /// Look up a parameter by its dotted key.
    pub fn get(&self, key: &str) -> Result<&Parameter, ConfigError> {
        self.values
            .get(key)
            .ok_or_else(|| ConfigError::UnknownParameter(key.to_string()))
    }

    /// Numeric value of a parameter in canonical units.
    pub fn number(&self, key: &str) -> Result<f64, ConfigError> {
        match &self.get(key)?.value {
            ParamValue::Number(v) => Ok(*v),
            ParamValue::Choice(_) => Err(ConfigError::WrongKind {
                key: key.to_string(),
                expected: "number",
            }),
        }
    }

    /// Selected option of an enumerated parameter.
    pub fn text(&self, key: &str) -> Result<&str, ConfigError> {
        match &self.get(key)?.value {
            ParamValue::Choice(c) => Ok(c),
            ParamValue::Number(_) => Err(ConfigError::WrongKind {
                key: key.to_string(),
                expected: "choice",
            }),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All parameter keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn material(&self, name: &str) -> Result<&Material, ConfigError> {
        self.materials
            .get(name)
            .ok_or_else(|| ConfigError::UnknownMaterial(name.to_string()))
    }

    pub fn cable_type(&self, name: &str) -> Result<&CableTypeSpec, ConfigError> {
        self.cable_types
            .get(name)
            .ok_or_else(|| ConfigError::UnknownCableType(name.to_string()))
    }

    pub fn actuator(&self, name: &str) -> Result<&ActuatorSpec, ConfigError> {
        self.actuators
            .get(name)
            .ok_or_else(|| ConfigError::UnknownActuator(name.to_string()))
    }

    pub fn interfaces(&self) -> &BTreeMap<String, InterfaceSpec> {
        &self.interfaces
    }

    pub fn rules(&self) -> &DesignRules {
        &self.rules
    }

    /// SHA-256 of the source layers this snapshot was resolved from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ParameterStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Layer {
    name: String,
    document: ParameterDocument,
}

/// Ordered stack of parameter documents.
#[derive(Debug, Clone, Default)]
pub struct ParameterStore {
    layers: Vec<Layer>,
}

#[derive(Debug, Clone)]
enum MergedLeaf {
    Scalar(ScalarRecord),
    Choice(ChoiceRecord),
}

impl ParameterStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer on top of the existing ones.
    pub fn add_layer(&mut self, name: impl Into<String>, document: ParameterDocument) {
        let name = name.into();
        debug!(layer = %name, "parameter layer added");
        self.layers.push(Layer { name, document });
    }

    /// Parse `text` as TOML and append it as a layer.
    pub fn add_toml(&mut self, name: &str, text: &str) -> Result<(), ConfigError> {
        let document = ParameterDocument::from_toml_str(name, text)?;
        self.add_layer(name, document);
        Ok(())
    }

    /// Read a TOML document from disk and append it as a layer named after
    /// the path.
    pub fn add_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_toml(&path.display().to_string(), &text)
    }

    /// Replace the layer called `name`, or append it when absent.  Returns
    /// `true` when an existing layer was replaced.
    ///
    /// Snapshots resolved before the replacement are no longer
    /// [current](Self::is_current).
    pub fn replace_layer(&mut self, name: &str, document: ParameterDocument) -> bool {
        if let Some(layer) = self.layers.iter_mut().find(|l| l.name == name) {
            layer.document = document;
            debug!(layer = %name, "parameter layer replaced");
            true
        } else {
            self.add_layer(name, document);
            false
        }
    }

    /// SHA-256 over the layer names and documents, hex encoded.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for layer in &self.layers {
            hasher.update(layer.name.as_bytes());
            hasher.update([0u8]);
            hasher.update(serde_json::to_vec(&layer.document).unwrap_or_default());
            hasher.update([0u8]);
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    /// True when `set` was resolved from the store's current layers.
    pub fn is_current(&self, set: &ParameterSet) -> bool {
        set.fingerprint == self.fingerprint()
    }

    /// Resolve a single key against the layers, topmost layer first.
    ///
    /// Keys are `dimensions.*`, `tolerances.*` or `design-rules.*`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownParameter`] when no layer declares the key, or
    /// [`ConfigError::Validation`] when its unit is not recognised.
    pub fn resolve(&self, key: &str) -> Result<ParamValue, ConfigError> {
        for layer in self.layers.iter().rev() {
            if let Some(rule) = key.strip_prefix("design-rules.") {
                match layer.document.design_rules.get(rule) {
                    Some(RuleRecord::Bare(v)) => return Ok(ParamValue::Number(*v)),
                    Some(RuleRecord::Scalar(s)) => return scalar_value(key, s),
                    None => continue,
                }
            }
            match layer.document.leaves().get(key) {
                Some(Leaf::Scalar(s)) => return scalar_value(key, s),
                Some(Leaf::Choice(c)) => return Ok(ParamValue::Choice(c.choice.clone())),
                None => {}
            }
        }
        Err(ConfigError::UnknownParameter(key.to_string()))
    }

    /// Merge and validate every layer into an immutable [`ParameterSet`].
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DuplicateInterface`] – an interface is redefined.
    /// - [`ConfigError::Validation`] – every range, unit, material and
    ///   record problem found, collected into one error.
    pub fn resolve_all(&self) -> Result<ParameterSet, ConfigError> {
        let mut issues: Vec<String> = Vec::new();

        let mut leaves: BTreeMap<String, (MergedLeaf, String)> = BTreeMap::new();
        let mut materials: BTreeMap<String, MaterialRecord> = BTreeMap::new();
        let mut cable_types: BTreeMap<String, CableTypeRecord> = BTreeMap::new();
        let mut actuators: BTreeMap<String, ActuatorRecord> = BTreeMap::new();
        let mut rule_records: BTreeMap<String, RuleRecord> = BTreeMap::new();
        let mut registry = InterfaceRegistry::new();

        for layer in &self.layers {
            for (key, leaf) in layer.document.leaves() {
                let merged = match leaf {
                    Leaf::Scalar(s) => MergedLeaf::Scalar(s.clone()),
                    Leaf::Choice(c) => MergedLeaf::Choice(c.clone()),
                };
                if let Some((previous, previous_layer)) = leaves.get(&key)
                    && let Some(issue) = unit_conflict(&key, previous, previous_layer, &merged, &layer.name)
                {
                    issues.push(issue);
                }
                leaves.insert(key, (merged, layer.name.clone()));
            }
            materials.extend(layer.document.materials.clone());
            cable_types.extend(layer.document.cable_types.clone());
            actuators.extend(layer.document.actuators.clone());
            rule_records.extend(layer.document.design_rules.clone());
            for (name, kind) in &layer.document.interfaces {
                registry.register(InterfaceSpec::new(name.clone(), kind.clone()))?;
            }
        }

        let materials: BTreeMap<String, Material> = materials
            .into_iter()
            .map(|(name, m)| {
                lint_material(&name, &m, &mut issues);
                let material = Material {
                    name: name.clone(),
                    density: m.density,
                    yield_strength: m.yield_strength,
                    elastic_modulus: m.elastic_modulus,
                    thermal_conductivity: m.thermal_conductivity,
                    max_service_temperature: m.max_service_temperature,
                    min_thickness: m.min_thickness,
                };
                (name, material)
            })
            .collect();

        let mut values = BTreeMap::new();
        for (key, (leaf, layer)) in &leaves {
            if let Some(parameter) = resolve_leaf(key, leaf, layer, &materials, &mut issues) {
                values.insert(key.clone(), parameter);
            }
        }

        let cable_types: BTreeMap<String, CableTypeSpec> = cable_types
            .into_iter()
            .map(|(name, c)| {
                lint_cable_type(&name, &c, &mut issues);
                let spec = CableTypeSpec {
                    name: name.clone(),
                    gauge_awg: c.gauge_awg,
                    insulation: c.insulation,
                    min_bend_radius: c.min_bend_radius,
                    max_current: c.max_current,
                };
                (name, spec)
            })
            .collect();

        let actuators: BTreeMap<String, ActuatorSpec> = actuators
            .into_iter()
            .map(|(name, a)| {
                lint_actuator(&name, &a, &mut issues);
                let spec = ActuatorSpec {
                    name: name.clone(),
                    rated_peak_torque: a.rated_peak_torque,
                    max_winding_temperature: a.max_winding_temperature,
                    thermal_resistance: a.thermal_resistance,
                    duty_speed: a.duty_speed,
                    peak_current: a.peak_current,
                    efficiency_curve: a.efficiency_curve.iter().map(|p| (p[0], p[1])).collect(),
                };
                (name, spec)
            })
            .collect();

        let interfaces: BTreeMap<String, InterfaceSpec> = registry
            .iter()
            .map(|spec| {
                issues.extend(spec.lint());
                (spec.name.clone(), spec.clone())
            })
            .collect();

        let rules = DesignRules::from_records(&rule_records, &mut issues);

        if !issues.is_empty() {
            return Err(ConfigError::Validation { issues });
        }

        let fingerprint = self.fingerprint();
        info!(
            layers = self.layers.len(),
            parameters = values.len(),
            interfaces = interfaces.len(),
            fingerprint = %fingerprint,
            "parameter set resolved"
        );

        Ok(ParameterSet {
            values,
            materials,
            cable_types,
            actuators,
            interfaces,
            rules,
            fingerprint,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

fn scalar_value(key: &str, s: &ScalarRecord) -> Result<ParamValue, ConfigError> {
    match Unit::parse(&s.unit) {
        Some(unit) => Ok(ParamValue::Number(unit.to_canonical(s.value))),
        None => Err(ConfigError::Validation {
            issues: vec![format!("{key}: unknown unit '{}'", s.unit)],
        }),
    }
}

fn leaf_dimension(leaf: &MergedLeaf) -> Option<Dimension> {
    match leaf {
        MergedLeaf::Scalar(s) => Unit::parse(&s.unit).map(Unit::dimension),
        MergedLeaf::Choice(_) => None,
    }
}

/// Describe a dimension change of `key` between two layers.
fn unit_conflict(
    key: &str,
    previous: &MergedLeaf,
    previous_layer: &str,
    next: &MergedLeaf,
    next_layer: &str,
) -> Option<String> {
    let describe = |leaf: &MergedLeaf| match leaf_dimension(leaf) {
        Some(d) => d.to_string(),
        None => "choice".to_string(),
    };
    let (a, b) = (describe(previous), describe(next));
    // Unknown units are reported separately; only compare recognised ones.
    let recognised =
        |leaf: &MergedLeaf| matches!(leaf, MergedLeaf::Choice(_)) || leaf_dimension(leaf).is_some();
    if recognised(previous) && recognised(next) && a != b {
        Some(format!(
            "{key}: units inconsistent, declared as {a} in layer '{previous_layer}' and {b} in layer '{next_layer}'"
        ))
    } else {
        None
    }
}

fn allowed_dimensions(key: &str) -> &'static [Dimension] {
    if key.starts_with("tolerances.") {
        &[Dimension::Length, Dimension::Angle, Dimension::Ratio, Dimension::Volume]
    } else {
        &[
            Dimension::Length,
            Dimension::Angle,
            Dimension::Count,
            Dimension::Mass,
            Dimension::Volume,
            Dimension::Ratio,
        ]
    }
}

fn resolve_leaf(
    key: &str,
    leaf: &MergedLeaf,
    layer: &str,
    materials: &BTreeMap<String, Material>,
    issues: &mut Vec<String>,
) -> Option<Parameter> {
    match leaf {
        MergedLeaf::Choice(c) => {
            if !c.options.contains(&c.choice) {
                issues.push(format!(
                    "{key}: '{}' is not one of [{}]",
                    c.choice,
                    c.options.join(", ")
                ));
                return None;
            }
            Some(Parameter {
                value: ParamValue::Choice(c.choice.clone()),
                unit: None,
                range: None,
                layer: layer.to_string(),
            })
        }
        MergedLeaf::Scalar(s) => {
            let Some(unit) = Unit::parse(&s.unit) else {
                issues.push(format!("{key}: unknown unit '{}'", s.unit));
                return None;
            };
            let dimension = unit.dimension();
            if !allowed_dimensions(key).contains(&dimension) {
                issues.push(format!("{key}: a {dimension} is not allowed in this section"));
                return None;
            }
            let value = unit.to_canonical(s.value);
            let range = match (s.min, s.max) {
                (None, None) => None,
                (min, max) => Some(Range::new(
                    min.map_or(f64::NEG_INFINITY, |m| unit.to_canonical(m)),
                    max.map_or(f64::INFINITY, |m| unit.to_canonical(m)),
                )),
            };
            if let Some(r) = range
                && !r.contains(value)
            {
                issues.push(format!("{key}: {value} outside declared range {r}"));
            }
            if let Some(material) = &s.material {
                match materials.get(material) {
                    None => issues.push(format!("{key}: unknown material '{material}'")),
                    Some(m) => {
                        if let Some(min) = m.min_thickness
                            && value < min
                        {
                            issues.push(format!(
                                "{key}: thickness {value} mm below material minimum {min} mm for '{material}'"
                            ));
                        }
                    }
                }
            }
            Some(Parameter {
                value: ParamValue::Number(value),
                unit: Some(dimension.canonical_unit()),
                range,
                layer: layer.to_string(),
            })
        }
    }
}

fn lint_material(name: &str, m: &MaterialRecord, issues: &mut Vec<String>) {
    for (field, v) in [
        ("density", m.density),
        ("yield_strength", m.yield_strength),
        ("elastic_modulus", m.elastic_modulus),
        ("thermal_conductivity", m.thermal_conductivity),
    ] {
        if v <= 0.0 {
            issues.push(format!("materials.{name}.{field}: must be positive, got {v}"));
        }
    }
    if let Some(t) = m.min_thickness
        && t < 0.0
    {
        issues.push(format!("materials.{name}.min_thickness: must not be negative"));
    }
}

fn lint_cable_type(name: &str, c: &CableTypeRecord, issues: &mut Vec<String>) {
    if c.gauge_awg > 40 {
        issues.push(format!("cable-types.{name}.gauge_awg: {} is outside 0..=40", c.gauge_awg));
    }
    if c.insulation < 0.0 {
        issues.push(format!("cable-types.{name}.insulation: must not be negative"));
    }
    if c.min_bend_radius <= 0.0 {
        issues.push(format!("cable-types.{name}.min_bend_radius: must be positive"));
    }
    if c.max_current <= 0.0 {
        issues.push(format!("cable-types.{name}.max_current: must be positive"));
    }
}

fn lint_actuator(name: &str, a: &ActuatorRecord, issues: &mut Vec<String>) {
    if a.rated_peak_torque <= 0.0 {
        issues.push(format!("actuators.{name}.rated_peak_torque: must be positive"));
    }
    if a.thermal_resistance <= 0.0 {
        issues.push(format!("actuators.{name}.thermal_resistance: must be positive"));
    }
    if a.duty_speed < 0.0 {
        issues.push(format!("actuators.{name}.duty_speed: must not be negative"));
    }
    if a.efficiency_curve.is_empty() {
        issues.push(format!("actuators.{name}.efficiency_curve: must not be empty"));
    }
    if a.efficiency_curve.windows(2).any(|w| w[1][0] <= w[0][0]) {
        issues.push(format!(
            "actuators.{name}.efficiency_curve: load points must be strictly increasing"
        ));
    }
    if a.efficiency_curve.iter().any(|p| p[1] <= 0.0 || p[1] > 1.0) {
        issues.push(format!(
            "actuators.{name}.efficiency_curve: efficiencies must be in (0, 1]"
        ));
    }
}
