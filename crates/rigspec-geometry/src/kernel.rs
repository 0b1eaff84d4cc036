//! The geometric kernel seam.
//!
//! Solid modelling lives outside this workspace.  The invariant gate only
//! needs the measurements below; anything that can realize a part and answer
//! them can sit behind [`GeometryKernel`].  Solids are owned by the kernel
//! and referred to by [`SolidHandle`] until released.
//!
//! Units: millimetres, cubic millimetres, degrees.  Mass properties are per
//! unit density; callers scale by the material density.

use std::path::Path;

use nalgebra::{Isometry3, Matrix3, Point3, Vector3};
use rigspec_params::EnvelopeShape;
use rigspec_types::GeometryError;
use serde::{Deserialize, Serialize};

use crate::aabb::Aabb;
use crate::mesh::Mesh;

/// Opaque reference to a solid owned by a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SolidHandle(pub u64);

/// A realized cylindrical hole, in world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleFeature {
    pub center: Point3<f64>,
    pub axis: Vector3<f64>,
    pub diameter: f64,
}

/// What the kernel needs to realize one part: its identity and where the
/// part frame sits in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct RealizeRequest {
    pub part: String,
    pub placement: Isometry3<f64>,
}

impl RealizeRequest {
    pub fn new(part: impl Into<String>, placement: Isometry3<f64>) -> Self {
        Self {
            part: part.into(),
            placement,
        }
    }
}

/// Capability surface of an external solid modeller.
///
/// Every call is synchronous and may block.  Implementations must be safe
/// to share across the gate's worker threads.
pub trait GeometryKernel: Send + Sync {
    /// Realize a part's solid in world coordinates.
    ///
    /// # Errors
    ///
    /// [`GeometryError::Unsolvable`] or [`GeometryError::Degenerate`] when
    /// the part cannot be built; [`GeometryError::Corrupt`] when the kernel
    /// itself can no longer be trusted.
    fn realize(&self, request: &RealizeRequest) -> Result<SolidHandle, GeometryError>;

    /// Realize a clearance envelope primitive at `placement`.
    fn realize_envelope(
        &self,
        shape: &EnvelopeShape,
        placement: &Isometry3<f64>,
    ) -> Result<SolidHandle, GeometryError>;

    /// Volume in mm³.
    fn volume(&self, solid: SolidHandle) -> Result<f64, GeometryError>;

    /// World-aligned bounding box.
    fn bounding_box(&self, solid: SolidHandle) -> Result<Aabb, GeometryError>;

    /// Centre of mass assuming uniform density.
    fn center_of_mass(&self, solid: SolidHandle) -> Result<Point3<f64>, GeometryError>;

    /// Inertia tensor about the centre of mass, per unit density (mm⁵).
    fn inertia_tensor(&self, solid: SolidHandle) -> Result<Matrix3<f64>, GeometryError>;

    /// Boolean intersection of two solids.
    fn intersect(&self, a: SolidHandle, b: SolidHandle) -> Result<SolidHandle, GeometryError>;

    /// Realized hole features.
    fn holes(&self, solid: SolidHandle) -> Result<Vec<HoleFeature>, GeometryError>;

    /// Constraint-solver messages produced while realizing the solid.
    fn solver_errors(&self, solid: SolidHandle) -> Result<Vec<String>, GeometryError>;

    /// Shortest distance between the segment `a`–`b` and the solid; zero
    /// when the segment touches or enters it.
    fn segment_clearance(
        &self,
        solid: SolidHandle,
        a: &Point3<f64>,
        b: &Point3<f64>,
    ) -> Result<f64, GeometryError>;

    /// Write a STEP file and return the number of bytes written.
    fn export_step(&self, solid: SolidHandle, path: &Path) -> Result<u64, GeometryError>;

    /// Tessellate the solid, write it as STL and return the mesh.
    fn export_mesh(&self, solid: SolidHandle, path: &Path) -> Result<Mesh, GeometryError>;

    /// Drop a solid.  The handle is invalid afterwards and may be reused.
    fn release(&self, solid: SolidHandle) -> Result<(), GeometryError>;
}
