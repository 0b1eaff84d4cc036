//! Design rules – the thresholds every invariant is compared against.
//!
//! Each rule has a fixed physical dimension and a default.  A document may
//! override any rule in its `design-rules` section; unknown rule names are
//! rejected.

use std::collections::BTreeMap;

use rigspec_types::Range;
use serde::{Deserialize, Serialize};

use crate::document::RuleRecord;
use crate::units::{Dimension, Unit};

/// Resolved design rules, in canonical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRules {
    /// Hole pattern and cross-part alignment tolerance, mm (exclusive bound).
    pub alignment_tolerance: f64,
    /// Datum-frame mate orientation tolerance, degrees (exclusive bound).
    pub alignment_angle_tolerance: f64,
    /// Relative volume tolerance for parts declaring a nominal volume.
    pub volume_tolerance: f64,
    /// Maximum intersection volume of two non-mating parts, mm³ (exclusive).
    pub collision_allowance: f64,
    /// Minimum inward distance of the centre of mass from the support hull, mm.
    pub stability_margin: f64,
    /// Total mass target band, kg.
    pub mass_min: Option<f64>,
    pub mass_max: Option<f64>,
    pub dynamic_multiplier: f64,
    /// Fraction of the rated winding temperature that may be reached.
    pub thermal_headroom: f64,
    /// °C
    pub ambient_temperature: f64,
    /// m/s²
    pub gravity: f64,
    /// Cable segment to solid safety margin, mm.
    pub cable_clearance: f64,
    pub grommet_fill_max: f64,
    pub step_min_bytes: f64,
    pub stl_max_triangles: f64,
}

impl Default for DesignRules {
    fn default() -> Self {
        Self {
            alignment_tolerance: 0.2,
            alignment_angle_tolerance: 0.5,
            volume_tolerance: 0.20,
            collision_allowance: 1.0,
            stability_margin: 50.0,
            mass_min: None,
            mass_max: None,
            dynamic_multiplier: 2.5,
            thermal_headroom: 0.9,
            ambient_temperature: 25.0,
            gravity: 9.81,
            cable_clearance: 5.0,
            grommet_fill_max: 0.40,
            step_min_bytes: 512.0,
            stl_max_triangles: 200_000.0,
        }
    }
}

/// Rule name → expected dimension.
const RULES: &[(&str, Dimension)] = &[
    ("alignment_tolerance", Dimension::Length),
    ("alignment_angle_tolerance", Dimension::Angle),
    ("volume_tolerance", Dimension::Ratio),
    ("collision_allowance", Dimension::Volume),
    ("stability_margin", Dimension::Length),
    ("mass_min", Dimension::Mass),
    ("mass_max", Dimension::Mass),
    ("dynamic_multiplier", Dimension::Ratio),
    ("thermal_headroom", Dimension::Ratio),
    ("ambient_temperature", Dimension::Temperature),
    ("gravity", Dimension::Acceleration),
    ("cable_clearance", Dimension::Length),
    ("grommet_fill_max", Dimension::Ratio),
    ("step_min_bytes", Dimension::Bytes),
    ("stl_max_triangles", Dimension::Count),
];

impl DesignRules {
    /// Total mass target band, when both bounds are declared.
    pub fn mass_band(&self) -> Option<Range> {
        Some(Range::new(self.mass_min?, self.mass_max?))
    }

    /// Build rules from merged `design-rules` records, appending every
    /// problem to `issues`.
    pub(crate) fn from_records(records: &BTreeMap<String, RuleRecord>, issues: &mut Vec<String>) -> Self {
        let mut rules = Self::default();
        for (name, record) in records {
            let Some((_, dimension)) = RULES.iter().find(|(n, _)| n == name) else {
                issues.push(format!("design-rules.{name}: unknown design rule"));
                continue;
            };
            let value = match record {
                RuleRecord::Bare(v) => *v,
                RuleRecord::Scalar(s) => match Unit::parse(&s.unit) {
                    Some(unit) if unit.dimension() == *dimension => unit.to_canonical(s.value),
                    Some(unit) => {
                        issues.push(format!(
                            "design-rules.{name}: unit '{}' is a {} but the rule expects a {dimension}",
                            s.unit,
                            unit.dimension()
                        ));
                        continue;
                    }
                    None => {
                        issues.push(format!("design-rules.{name}: unknown unit '{}'", s.unit));
                        continue;
                    }
                },
            };
            rules.set(name, value);
        }
        rules.lint(issues);
        rules
    }

    fn set(&mut self, name: &str, value: f64) {
        match name {
            "alignment_tolerance" => self.alignment_tolerance = value,
            "alignment_angle_tolerance" => self.alignment_angle_tolerance = value,
            "volume_tolerance" => self.volume_tolerance = value,
            "collision_allowance" => self.collision_allowance = value,
            "stability_margin" => self.stability_margin = value,
            "mass_min" => self.mass_min = Some(value),
            "mass_max" => self.mass_max = Some(value),
            "dynamic_multiplier" => self.dynamic_multiplier = value,
            "thermal_headroom" => self.thermal_headroom = value,
            "ambient_temperature" => self.ambient_temperature = value,
            "gravity" => self.gravity = value,
            "cable_clearance" => self.cable_clearance = value,
            "grommet_fill_max" => self.grommet_fill_max = value,
            "step_min_bytes" => self.step_min_bytes = value,
            "stl_max_triangles" => self.stl_max_triangles = value,
            _ => {}
        }
    }

    fn lint(&self, issues: &mut Vec<String>) {
        let positive = [
            ("alignment_tolerance", self.alignment_tolerance),
            ("alignment_angle_tolerance", self.alignment_angle_tolerance),
            ("collision_allowance", self.collision_allowance),
            ("gravity", self.gravity),
            ("step_min_bytes", self.step_min_bytes),
            ("stl_max_triangles", self.stl_max_triangles),
        ];
        for (name, v) in positive {
            if v <= 0.0 {
                issues.push(format!("design-rules.{name}: must be positive, got {v}"));
            }
        }
        for (name, v) in [
            ("volume_tolerance", self.volume_tolerance),
            ("stability_margin", self.stability_margin),
            ("cable_clearance", self.cable_clearance),
        ] {
            if v < 0.0 {
                issues.push(format!("design-rules.{name}: must not be negative, got {v}"));
            }
        }
        if self.dynamic_multiplier < 1.0 {
            issues.push(format!(
                "design-rules.dynamic_multiplier: must be at least 1, got {}",
                self.dynamic_multiplier
            ));
        }
        for (name, v) in [
            ("thermal_headroom", self.thermal_headroom),
            ("grommet_fill_max", self.grommet_fill_max),
        ] {
            if v <= 0.0 || v > 1.0 {
                issues.push(format!("design-rules.{name}: must be in (0, 1], got {v}"));
            }
        }
        if let (Some(lo), Some(hi)) = (self.mass_min, self.mass_max)
            && lo > hi
        {
            issues.push(format!("design-rules: mass_min {lo} exceeds mass_max {hi}"));
        }
    }
}
