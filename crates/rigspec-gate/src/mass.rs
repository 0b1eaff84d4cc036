//! Mass properties and the total-mass band.
//!
//! Part mass is realized volume times material density; subsystems sum
//! their parts and the total sums the subsystems.  The assembly centre of
//! mass weights each part's centre by its mass, so two parts of equal
//! volume but different material pull unequally.

use std::collections::BTreeMap;

use nalgebra::{Point3, Vector3};
use rigspec_model::AssemblyModel;
use rigspec_params::ParameterSet;
use rigspec_types::{CheckId, FailureDetail, Verdict, VerdictKind};
use serde::Serialize;

use crate::check::{Check, CheckContext, Measurements, PartState};

/// Check id of the total-mass band.
pub const MASS_CHECK: &str = "mass/total";

const MM3_TO_M3: f64 = 1e-9;

/// Mass of one part.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartMass {
    pub subsystem: String,
    /// kg
    pub mass: f64,
    pub center_of_mass: Point3<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MassReport {
    pub parts: BTreeMap<String, PartMass>,
    /// kg per subsystem tag.
    pub subsystems: BTreeMap<String, f64>,
    /// kg
    pub total: f64,
    pub center_of_mass: Point3<f64>,
}

/// Computes a [`MassReport`] from realized volumes and material densities.
pub struct MassAnalyzer<'a> {
    params: &'a ParameterSet,
}

impl<'a> MassAnalyzer<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self { params }
    }

    /// kg from mm³ and kg/m³.
    pub fn part_mass(volume_mm3: f64, density: f64) -> f64 {
        volume_mm3 * MM3_TO_M3 * density
    }

    /// Aggregate every part.  Fails with a diagnostic when any part has no
    /// geometry, since the totals would silently undercount.
    pub fn analyze(&self, model: &AssemblyModel, measurements: &Measurements) -> Result<MassReport, String> {
        let missing: Vec<&str> = model
            .parts
            .keys()
            .filter(|id| !matches!(measurements.get(*id), Some(PartState::Realized(_))))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(format!("mass undefined: no geometry for {}", missing.join(", ")));
        }

        let mut parts = BTreeMap::new();
        for (id, part) in &model.parts {
            let Some(PartState::Realized(geometry)) = measurements.get(id) else {
                continue;
            };
            let material = self.params.material(&part.material).map_err(|e| e.to_string())?;
            parts.insert(
                id.clone(),
                PartMass {
                    subsystem: part.subsystem.clone(),
                    mass: Self::part_mass(geometry.volume, material.density),
                    center_of_mass: geometry.center_of_mass,
                },
            );
        }
        Ok(Self::aggregate(parts))
    }

    /// Subsystem sums, total and mass-weighted centre of mass.
    pub fn aggregate(parts: BTreeMap<String, PartMass>) -> MassReport {
        let mut subsystems: BTreeMap<String, f64> = BTreeMap::new();
        for p in parts.values() {
            *subsystems.entry(p.subsystem.clone()).or_default() += p.mass;
        }
        let total: f64 = subsystems.values().sum();
        let moment: Vector3<f64> = parts.values().map(|p| p.center_of_mass.coords * p.mass).sum();
        let center_of_mass = if total > 0.0 {
            Point3::from(moment / total)
        } else {
            Point3::origin()
        };
        MassReport {
            parts,
            subsystems,
            total,
            center_of_mass,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// mass/total
// ────────────────────────────────────────────────────────────────────────────

/// Total mass against the `mass_min`/`mass_max` band.
pub struct MassCheck;

impl Check for MassCheck {
    fn name(&self) -> String {
        MASS_CHECK.to_string()
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict> {
        let id = CheckId::from(MASS_CHECK);
        let report = match ctx.mass() {
            Ok(r) => r,
            Err(cause) => return vec![Verdict::undefined(id, cause)],
        };
        let Some(band) = ctx.rules().mass_band() else {
            if ctx.model.parts.is_empty() {
                return vec![Verdict::pass(id, VerdictKind::Invariant).with_diagnostic("no parts")];
            }
            return vec![
                Verdict::fail(id, VerdictKind::Invariant)
                    .with_measured(report.total)
                    .with_diagnostic("no total mass band declared (design-rules.mass_min / mass_max)"),
            ];
        };

        let total = report.total;
        if band.contains(total) {
            return vec![
                Verdict::pass(id, VerdictKind::Invariant)
                    .with_measured(total)
                    .with_diagnostic(format!("total mass {total:.3} kg within {band} kg")),
            ];
        }
        let delta = band.delta(total);
        let bound = if delta < 0.0 { band.min } else { band.max };
        vec![
            Verdict::fail(id, VerdictKind::Invariant)
                .with_measured(total)
                .with_threshold(bound)
                .with_diagnostic(format!("total mass {total:.3} kg outside {band} kg (delta {delta:+.3} kg)"))
                .with_detail(FailureDetail::OutOfRange { axis: None, delta }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn part(subsystem: &str, mass: f64, x: f64) -> PartMass {
        PartMass {
            subsystem: subsystem.into(),
            mass,
            center_of_mass: Point3::new(x, 0.0, 0.0),
        }
    }

    #[test]
    fn part_mass_converts_cubic_millimetres() {
        // 1e7 mm³ of aluminium = 0.01 m³ × 2700 kg/m³.
        assert_relative_eq!(MassAnalyzer::part_mass(1.0e7, 2700.0), 27.0);
    }

    #[test]
    fn total_is_sum_of_subsystems() {
        let report = MassAnalyzer::aggregate(BTreeMap::from([
            ("a".to_string(), part("chassis", 10.0, 0.0)),
            ("b".to_string(), part("chassis", 5.0, 0.0)),
            ("c".to_string(), part("legs", 2.5, 0.0)),
        ]));
        assert_relative_eq!(report.subsystems["chassis"], 15.0);
        assert_relative_eq!(report.subsystems["legs"], 2.5);
        assert_relative_eq!(report.total, report.subsystems.values().sum::<f64>());
    }

    #[test]
    fn center_of_mass_is_mass_weighted() {
        let report = MassAnalyzer::aggregate(BTreeMap::from([
            ("heavy".to_string(), part("x", 3.0, 0.0)),
            ("light".to_string(), part("x", 1.0, 400.0)),
        ]));
        assert_relative_eq!(report.center_of_mass.x, 100.0);
    }

    #[test]
    fn empty_assembly_has_zero_mass_at_origin() {
        let report = MassAnalyzer::aggregate(BTreeMap::new());
        assert_eq!(report.total, 0.0);
        assert_eq!(report.center_of_mass, Point3::origin());
    }
}
