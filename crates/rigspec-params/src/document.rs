//! Parameter documents – the declarative source of truth.
//!
//! A document is a TOML file with up to seven recognised top-level sections.
//! Unknown sections and unknown keys inside records are rejected at load
//! time.
//!
//! ```toml
//! [dimensions.plate]
//! length = { value = 400.0, unit = "mm", min = 300.0, max = 500.0 }
//! thickness = { value = 6.0, unit = "mm", material = "al6061" }
//! finish = { choice = "anodized", options = ["anodized", "raw"] }
//!
//! [tolerances]
//! bbox = { value = 0.5, unit = "mm" }
//!
//! [materials.al6061]
//! density = 2700.0
//! yield_strength = 276.0
//! elastic_modulus = 68.9
//! thermal_conductivity = 167.0
//! max_service_temperature = 150.0
//! min_thickness = 2.0
//!
//! [design-rules]
//! mass_min = { value = 159.0, unit = "kg" }
//! mass_max = { value = 250.0, unit = "kg" }
//! alignment_tolerance = 0.2
//! ```

use std::collections::BTreeMap;

use rigspec_types::ConfigError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::interface::InterfaceKind;

/// A numeric entry with its declared unit and optional valid range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScalarRecord {
    pub value: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Marks a wall/plate thickness made of this material; the value must
    /// not be below the material's `min_thickness`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

/// An enumerated entry: the selected `choice` must be one of `options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ChoiceRecord {
    pub choice: String,
    pub options: Vec<String>,
}

/// A node of the `dimensions` / `tolerances` trees: either a leaf value or
/// a nested group whose children extend the dotted key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ParamNode {
    Scalar(ScalarRecord),
    Choice(ChoiceRecord),
    Group(BTreeMap<String, ParamNode>),
}

/// A design-rule entry: a bare number in the rule's canonical unit, or a
/// full scalar record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RuleRecord {
    Bare(f64),
    Scalar(ScalarRecord),
}

/// Material properties.  Units are fixed per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MaterialRecord {
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_thickness: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CableTypeRecord {
    pub gauge_awg: u32,
    /// Insulation wall thickness, mm.
    pub insulation: f64,
    /// mm
    pub min_bend_radius: f64,
    /// A
    pub max_current: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ActuatorRecord {
    /// N·m
    pub rated_peak_torque: f64,
    /// °C
    pub max_winding_temperature: f64,
    /// °C/W, winding to ambient.
    pub thermal_resistance: f64,
    /// Representative joint speed while walking, rad/s.
    pub duty_speed: f64,
    /// A
    #[serde(default)]
    pub peak_current: f64,
    /// `[load % of rated peak torque, efficiency (0, 1]]` points.
    pub efficiency_curve: Vec<[f64; 2]>,
}

/// One parameter document (one layer of the store).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ParameterDocument {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dimensions: BTreeMap<String, ParamNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tolerances: BTreeMap<String, ParamNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub materials: BTreeMap<String, MaterialRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub interfaces: BTreeMap<String, InterfaceKind>,
    #[serde(default, rename = "cable-types", skip_serializing_if = "BTreeMap::is_empty")]
    pub cable_types: BTreeMap<String, CableTypeRecord>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actuators: BTreeMap<String, ActuatorRecord>,
    #[serde(default, rename = "design-rules", skip_serializing_if = "BTreeMap::is_empty")]
    pub design_rules: BTreeMap<String, RuleRecord>,
}

/// A flattened leaf of the dimension/tolerance trees.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Leaf<'a> {
    Scalar(&'a ScalarRecord),
    Choice(&'a ChoiceRecord),
}

impl ParameterDocument {
    /// Parse a TOML document.  `source_name` is used in error messages.
    pub fn from_toml_str(source_name: &str, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// JSON Schema describing the document format.
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ParameterDocument)
    }

    /// Every leaf of `dimensions` and `tolerances` keyed by its full dotted
    /// key (`dimensions.plate.length`), in key order.
    pub(crate) fn leaves(&self) -> BTreeMap<String, Leaf<'_>> {
        let mut out = BTreeMap::new();
        flatten("dimensions", &self.dimensions, &mut out);
        flatten("tolerances", &self.tolerances, &mut out);
        out
    }
}

fn flatten<'a>(prefix: &str, nodes: &'a BTreeMap<String, ParamNode>, out: &mut BTreeMap<String, Leaf<'a>>) {
    for (name, node) in nodes {
        let key = format!("{prefix}.{name}");
        match node {
            ParamNode::Scalar(s) => {
                out.insert(key, Leaf::Scalar(s));
            }
            ParamNode::Choice(c) => {
                out.insert(key, Leaf::Choice(c));
            }
            ParamNode::Group(children) => flatten(&key, children, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[dimensions.plate]
length = { value = 400.0, unit = "mm", min = 300.0, max = 500.0 }
thickness = { value = 6.0, unit = "mm", material = "al6061" }
finish = { choice = "anodized", options = ["anodized", "raw"] }

[dimensions.leg.femur]
length = { value = 0.25, unit = "m" }

[tolerances]
bbox = { value = 0.5, unit = "mm" }

[materials.al6061]
density = 2700.0
yield_strength = 276.0
elastic_modulus = 68.9
thermal_conductivity = 167.0
max_service_temperature = 150.0
min_thickness = 2.0

[interfaces.hip_mount]
kind = "bolt-pattern"
fastener = "M5"
hole_diameter = 5.5
pattern = { shape = "rectangular", spacing = [40.0, 40.0] }

[interfaces.hip_frame]
kind = "datum-frame"
parent = "world"
origin = [200.0, 150.0, 0.0]

[cable-types.power_14awg]
gauge_awg = 14
insulation = 0.8
min_bend_radius = 25.0
max_current = 15.0

[design-rules]
alignment_tolerance = 0.2
mass_min = { value = 159.0, unit = "kg" }
"#;

    #[test]
    fn parses_all_sections() {
        let doc = ParameterDocument::from_toml_str("sample", SAMPLE).unwrap();
        assert_eq!(doc.materials.len(), 1);
        assert_eq!(doc.interfaces.len(), 2);
        assert_eq!(doc.cable_types["power_14awg"].gauge_awg, 14);
        assert!(matches!(doc.design_rules["alignment_tolerance"], RuleRecord::Bare(v) if v == 0.2));
        assert!(matches!(doc.design_rules["mass_min"], RuleRecord::Scalar(_)));
    }

    #[test]
    fn leaves_use_dotted_keys() {
        let doc = ParameterDocument::from_toml_str("sample", SAMPLE).unwrap();
        let leaves = doc.leaves();
        let keys: Vec<&str> = leaves.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            [
                "dimensions.leg.femur.length",
                "dimensions.plate.finish",
                "dimensions.plate.length",
                "dimensions.plate.thickness",
                "tolerances.bbox",
            ]
        );
        assert!(matches!(leaves["dimensions.plate.finish"], Leaf::Choice(_)));
    }

    #[test]
    fn unknown_section_is_rejected() {
        let err = ParameterDocument::from_toml_str("bad", "[colors]\nred = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref source_name, .. } if source_name == "bad"));
    }

    #[test]
    fn unknown_material_key_is_rejected() {
        let text = r#"
[materials.steel]
density = 7850.0
yield_strength = 250.0
elastic_modulus = 200.0
thermal_conductivity = 50.0
max_service_temperature = 400.0
colour = "grey"
"#;
        assert!(ParameterDocument::from_toml_str("bad", text).is_err());
    }

    #[test]
    fn unknown_interface_kind_is_rejected() {
        let text = "[interfaces.x]\nkind = \"snap-fit\"\n";
        assert!(ParameterDocument::from_toml_str("bad", text).is_err());
    }

    #[test]
    fn json_schema_names_sections() {
        let schema = serde_json::to_string(&ParameterDocument::json_schema()).unwrap();
        assert!(schema.contains("design-rules"));
        assert!(schema.contains("cable-types"));
    }
}
