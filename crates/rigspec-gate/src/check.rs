//! The [`Check`] trait and the read-only context every check evaluates
//! against.
//!
//! A check is one independent unit of work.  It reads the finalized model,
//! the parameter snapshot and the per-part measurements taken after
//! realization, and returns its verdicts.  Checks never mutate shared state,
//! so the engine is free to run them on any thread in any order.

use std::collections::BTreeMap;
use std::path::Path;

use nalgebra::Point3;
use rigspec_geometry::{Aabb, GeometryKernel, HoleFeature, SolidHandle};
use rigspec_model::AssemblyModel;
use rigspec_params::{DesignRules, InterfaceRegistry, ParameterSet};
use rigspec_types::{CheckId, GeometryError, Verdict};

use crate::mass::MassReport;

// ────────────────────────────────────────────────────────────────────────────
// Measurements
// ────────────────────────────────────────────────────────────────────────────

/// Kernel-derived measurements of one realized part.
#[derive(Debug, Clone, PartialEq)]
pub struct PartGeometry {
    pub handle: SolidHandle,
    /// mm³
    pub volume: f64,
    /// World-axis bounding box.
    pub bbox: Aabb,
    pub center_of_mass: Point3<f64>,
    pub holes: Vec<HoleFeature>,
    pub solver_errors: Vec<String>,
}

/// Outcome of realizing one part.
#[derive(Debug, Clone, PartialEq)]
pub enum PartState {
    Realized(PartGeometry),
    Failed(GeometryError),
}

impl PartState {
    pub fn geometry(&self) -> Option<&PartGeometry> {
        match self {
            PartState::Realized(g) => Some(g),
            PartState::Failed(_) => None,
        }
    }
}

/// Realization results keyed by part id.
pub type Measurements = BTreeMap<String, PartState>;

// ────────────────────────────────────────────────────────────────────────────
// CheckContext
// ────────────────────────────────────────────────────────────────────────────

/// Everything a [`Check`] may read.  Shared by reference across workers.
pub struct CheckContext<'a> {
    pub kernel: &'a dyn GeometryKernel,
    pub registry: &'a InterfaceRegistry,
    pub model: &'a AssemblyModel,
    pub params: &'a ParameterSet,
    pub measurements: &'a Measurements,
    /// Mass properties, or the reason they could not be computed.
    pub mass: &'a Result<MassReport, String>,
    pub export_dir: &'a Path,
}

impl<'a> CheckContext<'a> {
    pub fn rules(&self) -> &'a DesignRules {
        self.params.rules()
    }

    /// Geometry of a part, or the diagnostic explaining why it is missing.
    pub fn geometry(&self, part: &str) -> Result<&'a PartGeometry, String> {
        match self.measurements.get(part) {
            Some(PartState::Realized(g)) => Ok(g),
            Some(PartState::Failed(e)) => Err(format!("geometry unavailable for '{part}': {e}")),
            None => Err(format!("part '{part}' was not realized")),
        }
    }

    /// Geometry of two parts, failing with the first missing one.
    pub fn geometry_pair(&self, a: &str, b: &str) -> Result<(&'a PartGeometry, &'a PartGeometry), String> {
        Ok((self.geometry(a)?, self.geometry(b)?))
    }

    /// Mass report, or the reason it is undefined.
    pub fn mass(&self) -> Result<&'a MassReport, &'a str> {
        self.mass.as_ref().map_err(String::as_str)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Check trait
// ────────────────────────────────────────────────────────────────────────────

/// One independent unit of invariant evaluation.
///
/// Implementations produce every verdict they own on every run, failing or
/// not; a missing prerequisite becomes a failing verdict, never an early
/// return with nothing.
pub trait Check: Send + Sync {
    /// Short label used in trace output.
    fn name(&self) -> String;

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict>;
}

/// Failing verdicts for `ids`, all sharing the same cause.
pub(crate) fn undefined_all(ids: impl IntoIterator<Item = CheckId>, cause: &str) -> Vec<Verdict> {
    ids.into_iter().map(|id| Verdict::undefined(id, cause)).collect()
}
