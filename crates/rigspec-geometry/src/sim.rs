//! In-process analytic kernel for tests and CI.
//!
//! [`SimKernel`] stands in for a real solid modeller.  Each part id is mapped
//! to a [`SimBody`]: a union of disjoint axis-aligned boxes with cylindrical
//! holes, described in the part frame.  Realizing a part places the body by
//! the requested isometry; every measurement after that is computed in
//! closed form.
//!
//! Bodies can be told to fail realization, to report constraint-solver
//! messages, or to tessellate into an open mesh, so every error path of the
//! gate can be exercised without a CAD kernel.
//!
//! # Example
//!
//! ```rust
//! use nalgebra::Isometry3;
//! use rigspec_geometry::kernel::{GeometryKernel, RealizeRequest};
//! use rigspec_geometry::sim::{SimBody, SimKernel};
//!
//! let kernel = SimKernel::new().with_body("plate", SimBody::cuboid([500.0, 400.0, 50.0]));
//! let solid = kernel
//!     .realize(&RealizeRequest::new("plate", Isometry3::identity()))
//!     .expect("sim realize must succeed");
//! assert!((kernel.volume(solid).unwrap() - 1.0e7).abs() < 1e-3);
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::RwLock;

use nalgebra::{Isometry3, Matrix3, Point3, UnitQuaternion, Vector3};
use rigspec_params::{BoltPattern, EnvelopeShape};
use rigspec_types::GeometryError;
use tracing::debug;

use crate::aabb::Aabb;
use crate::kernel::{GeometryKernel, HoleFeature, RealizeRequest, SolidHandle};
use crate::mesh::Mesh;

/// Iterations of the ternary search in [`segment_box_distance`].
const LINE_SEARCH_STEPS: usize = 100;

// ────────────────────────────────────────────────────────────────────────────
// Body description
// ────────────────────────────────────────────────────────────────────────────

/// How realization of a body fails.
#[derive(Debug, Clone, PartialEq)]
pub enum SimFailure {
    Unsolvable(String),
    Degenerate(String),
    Corrupt(String),
}

#[derive(Debug, Clone, PartialEq)]
struct SimHole {
    center: Point3<f64>,
    axis: Vector3<f64>,
    diameter: f64,
    depth: f64,
}

impl SimHole {
    fn volume(&self) -> f64 {
        let r = self.diameter / 2.0;
        std::f64::consts::PI * r * r * self.depth
    }

    fn placed(&self, iso: &Isometry3<f64>) -> SimHole {
        SimHole {
            center: iso * self.center,
            axis: iso.rotation * self.axis,
            ..self.clone()
        }
    }

    /// Inertia about the hole's own centre, per unit density.
    fn inertia(&self) -> Matrix3<f64> {
        let m = self.volume();
        let r = self.diameter / 2.0;
        let lateral = m * (3.0 * r * r + self.depth * self.depth) / 12.0;
        let local = Matrix3::from_diagonal(&Vector3::new(lateral, lateral, m * r * r / 2.0));
        let rot = UnitQuaternion::rotation_between(&Vector3::z(), &self.axis)
            .unwrap_or_else(|| UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI))
            .to_rotation_matrix();
        rot.matrix() * local * rot.matrix().transpose()
    }
}

/// Shape and behaviour of one simulated part, in the part frame.
///
/// Boxes must not overlap each other; holes are assumed to lie fully inside
/// the material.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimBody {
    boxes: Vec<Aabb>,
    holes: Vec<SimHole>,
    solver_errors: Vec<String>,
    failure: Option<SimFailure>,
    open_mesh: bool,
}

impl SimBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single box of `size` centred on the part origin.
    pub fn cuboid(size: [f64; 3]) -> Self {
        Self::new().with_centered_box([0.0; 3], size)
    }

    pub fn with_box(mut self, min: [f64; 3], max: [f64; 3]) -> Self {
        self.boxes.push(Aabb::new(min.into(), max.into()));
        self
    }

    pub fn with_centered_box(mut self, center: [f64; 3], size: [f64; 3]) -> Self {
        self.boxes
            .push(Aabb::from_center_size(center.into(), size.into()));
        self
    }

    /// Add a cylindrical hole of `depth` centred on `center` along `axis`.
    pub fn with_hole(mut self, center: [f64; 3], axis: [f64; 3], diameter: f64, depth: f64) -> Self {
        let axis = Vector3::from(axis);
        self.holes.push(SimHole {
            center: center.into(),
            axis: axis.try_normalize(f64::EPSILON).unwrap_or_else(Vector3::z),
            diameter,
            depth,
        });
        self
    }

    /// Drill every hole of a bolt pattern placed at `offset` in the part
    /// frame, along the offset's local Z.
    pub fn with_pattern_holes(mut self, pattern: &BoltPattern, offset: &Isometry3<f64>, depth: f64) -> Self {
        let axis = offset.rotation * Vector3::z();
        for p in pattern.hole_positions() {
            self.holes.push(SimHole {
                center: offset * Point3::from(p),
                axis,
                diameter: pattern.hole_diameter,
                depth,
            });
        }
        self
    }

    /// Report a constraint-solver message when realized.
    pub fn with_solver_error(mut self, message: impl Into<String>) -> Self {
        self.solver_errors.push(message.into());
        self
    }

    /// Make realization fail.
    pub fn failing(mut self, failure: SimFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Drop one triangle from the exported mesh.
    pub fn with_open_mesh(mut self) -> Self {
        self.open_mesh = true;
        self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Realized solids
// ────────────────────────────────────────────────────────────────────────────

/// A placed body.  Boxes and holes stay in the solid's own frame; only
/// results are carried into the world, so a rigid placement never changes
/// volume or mass properties.
#[derive(Debug, Clone)]
struct Solid {
    label: String,
    placement: Isometry3<f64>,
    boxes: Vec<Aabb>,
    holes: Vec<SimHole>,
    solver_errors: Vec<String>,
    open_mesh: bool,
}

impl Solid {
    fn volume(&self) -> f64 {
        self.boxes.iter().map(Aabb::volume).sum::<f64>() - self.holes.iter().map(SimHole::volume).sum::<f64>()
    }

    fn degenerate(&self, cause: &str) -> GeometryError {
        GeometryError::Degenerate {
            part: self.label.clone(),
            cause: cause.to_string(),
        }
    }

    fn local_center_of_mass(&self) -> Result<Point3<f64>, GeometryError> {
        let volume = self.volume();
        if volume <= 0.0 {
            return Err(self.degenerate("solid has no volume"));
        }
        let mut moment = Vector3::zeros();
        for b in &self.boxes {
            moment += b.center().coords * b.volume();
        }
        for h in &self.holes {
            moment -= h.center.coords * h.volume();
        }
        Ok(Point3::from(moment / volume))
    }

    fn center_of_mass(&self) -> Result<Point3<f64>, GeometryError> {
        Ok(self.placement * self.local_center_of_mass()?)
    }

    fn inertia_tensor(&self) -> Result<Matrix3<f64>, GeometryError> {
        let com = self.local_center_of_mass()?;
        let shift = |m: f64, at: &Point3<f64>| {
            let d = at - com;
            (Matrix3::identity() * d.norm_squared() - d * d.transpose()) * m
        };
        let mut local = Matrix3::zeros();
        for b in &self.boxes {
            let m = b.volume();
            let s = b.size();
            let own = Matrix3::from_diagonal(&Vector3::new(
                m * (s.y * s.y + s.z * s.z) / 12.0,
                m * (s.x * s.x + s.z * s.z) / 12.0,
                m * (s.x * s.x + s.y * s.y) / 12.0,
            ));
            local += own + shift(m, &b.center());
        }
        for h in &self.holes {
            local -= h.inertia() + shift(h.volume(), &h.center);
        }
        let rot = self.placement.rotation.to_rotation_matrix();
        Ok(rot.matrix() * local * rot.matrix().transpose())
    }

    fn bounding_box(&self) -> Result<Aabb, GeometryError> {
        self.boxes
            .iter()
            .map(|b| b.transformed(&self.placement))
            .reduce(|a, b| a.union(&b))
            .ok_or_else(|| self.degenerate("solid is empty"))
    }

    fn world_holes(&self) -> impl Iterator<Item = SimHole> + '_ {
        self.holes.iter().map(|h| h.placed(&self.placement))
    }

    fn world_corners(&self, b: &Aabb) -> [Point3<f64>; 8] {
        b.corners().map(|c| self.placement * c)
    }

    fn clearance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        let (a, b) = (
            self.placement.inverse_transform_point(a),
            self.placement.inverse_transform_point(b),
        );
        self.boxes
            .iter()
            .map(|bx| segment_box_distance(bx, &a, &b))
            .fold(f64::INFINITY, f64::min)
    }

    fn mesh(&self) -> Mesh {
        const BOX_FACES: [[u32; 3]; 12] = [
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [2, 3, 7],
            [2, 7, 6],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        let mut mesh = Mesh::default();
        for b in &self.boxes {
            let base = mesh.vertices.len() as u32;
            mesh.vertices.extend(self.world_corners(b));
            mesh.faces
                .extend(BOX_FACES.iter().map(|f| f.map(|i| base + i)));
        }
        if self.open_mesh {
            mesh.faces.pop();
        }
        mesh
    }

    fn step_text(&self, file_name: &str) -> String {
        let mut out = String::new();
        out.push_str("ISO-10303-21;\nHEADER;\n");
        out.push_str("FILE_DESCRIPTION(('rigspec analytic solid'),'2;1');\n");
        let _ = writeln!(
            out,
            "FILE_NAME('{file_name}','',('rigspec'),('rigspec'),'rigspec-geometry','rigspec-sim','');"
        );
        out.push_str("FILE_SCHEMA(('AUTOMOTIVE_DESIGN { 1 0 10303 214 1 1 1 1 }'));\nENDSEC;\nDATA;\n");
        let mut id = 1;
        for (n, b) in self.boxes.iter().enumerate() {
            let first = id;
            for c in self.world_corners(b) {
                let _ = writeln!(out, "#{id}=CARTESIAN_POINT('',({:.6},{:.6},{:.6}));", c.x, c.y, c.z);
                id += 1;
            }
            let refs: Vec<String> = (first..id).map(|i| format!("#{i}")).collect();
            let _ = writeln!(out, "#{id}=CLOSED_SHELL('box {n}',({}));", refs.join(","));
            id += 1;
        }
        for h in self.world_holes() {
            let _ = writeln!(
                out,
                "#{id}=CYLINDRICAL_SURFACE('hole',({:.6},{:.6},{:.6}),({:.6},{:.6},{:.6}),{:.6});",
                h.center.x,
                h.center.y,
                h.center.z,
                h.axis.x,
                h.axis.y,
                h.axis.z,
                h.diameter / 2.0
            );
            id += 1;
        }
        out.push_str("ENDSEC;\nEND-ISO-10303-21;\n");
        out
    }
}

fn segment_box_distance(b: &Aabb, p: &Point3<f64>, q: &Point3<f64>) -> f64 {
    // Distance from a moving point to a convex set is convex in t.
    let dir = q - p;
    let d = |t: f64| b.distance_to_point(&(p + dir * t));
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..LINE_SEARCH_STEPS {
        let m1 = lo + (hi - lo) / 3.0;
        let m2 = hi - (hi - lo) / 3.0;
        if d(m1) <= d(m2) {
            hi = m2;
        } else {
            lo = m1;
        }
    }
    d((lo + hi) / 2.0).min(d(0.0)).min(d(1.0))
}

fn envelope_box(shape: &EnvelopeShape) -> Aabb {
    match shape {
        EnvelopeShape::Box { size } => Aabb::from_center_size(Point3::origin(), (*size).into()),
        EnvelopeShape::Cylinder { radius, height } => Aabb::new(
            Point3::new(-radius, -radius, 0.0),
            Point3::new(*radius, *radius, *height),
        ),
        EnvelopeShape::Sphere { radius } => {
            Aabb::from_center_size(Point3::origin(), Vector3::repeat(2.0 * radius))
        }
    }
}

fn export_error(path: &Path, e: std::io::Error) -> GeometryError {
    GeometryError::Export {
        path: path.to_path_buf(),
        cause: e.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimKernel
// ────────────────────────────────────────────────────────────────────────────

/// Deterministic [`GeometryKernel`] over [`SimBody`] descriptions.
///
/// Cylinders and spheres in clearance envelopes are approximated by their
/// bounding boxes.  Intersections ignore holes; they are exact when the two
/// placements differ by a rotation mapping axes onto axes and conservative
/// otherwise.
#[derive(Debug, Default)]
pub struct SimKernel {
    bodies: BTreeMap<String, SimBody>,
    solids: RwLock<SolidSlots>,
}

/// Live solids by handle, with released slots reused first.
#[derive(Debug, Default)]
struct SolidSlots {
    slots: Vec<Option<Solid>>,
    free: Vec<usize>,
}

impl SimKernel {
    /// Create a kernel with no bodies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the body realized for `part`.
    pub fn with_body(mut self, part: impl Into<String>, body: SimBody) -> Self {
        self.insert_body(part, body);
        self
    }

    pub fn insert_body(&mut self, part: impl Into<String>, body: SimBody) {
        self.bodies.insert(part.into(), body);
    }

    /// Number of solids currently held, intersections included.
    pub fn solid_count(&self) -> usize {
        let solids = self.solids.read().unwrap_or_else(|e| e.into_inner());
        solids.slots.len() - solids.free.len()
    }

    fn alloc(&self, solid: Solid) -> SolidHandle {
        let mut solids = self.solids.write().unwrap_or_else(|e| e.into_inner());
        match solids.free.pop() {
            Some(slot) => {
                solids.slots[slot] = Some(solid);
                SolidHandle(slot as u64)
            }
            None => {
                solids.slots.push(Some(solid));
                SolidHandle(solids.slots.len() as u64 - 1)
            }
        }
    }

    fn with_solid<T>(&self, handle: SolidHandle, f: impl FnOnce(&Solid) -> T) -> Result<T, GeometryError> {
        let solids = self.solids.read().unwrap_or_else(|e| e.into_inner());
        solids
            .slots
            .get(handle.0 as usize)
            .and_then(Option::as_ref)
            .map(f)
            .ok_or(GeometryError::UnknownSolid(handle.0))
    }
}

impl GeometryKernel for SimKernel {
    fn realize(&self, request: &RealizeRequest) -> Result<SolidHandle, GeometryError> {
        let part = request.part.clone();
        let body = self.bodies.get(&part).ok_or_else(|| GeometryError::Unsolvable {
            part: part.clone(),
            cause: "no body registered for part".to_string(),
        })?;
        match &body.failure {
            Some(SimFailure::Unsolvable(cause)) => {
                return Err(GeometryError::Unsolvable { part, cause: cause.clone() });
            }
            Some(SimFailure::Degenerate(cause)) => {
                return Err(GeometryError::Degenerate { part, cause: cause.clone() });
            }
            Some(SimFailure::Corrupt(cause)) => {
                return Err(GeometryError::Corrupt { part, cause: cause.clone() });
            }
            None => {}
        }
        let solid = Solid {
            label: part,
            placement: request.placement,
            boxes: body.boxes.clone(),
            holes: body.holes.clone(),
            solver_errors: body.solver_errors.clone(),
            open_mesh: body.open_mesh,
        };
        let handle = self.alloc(solid);
        debug!(part = %request.part, handle = handle.0, "sim solid realized");
        Ok(handle)
    }

    fn realize_envelope(
        &self,
        shape: &EnvelopeShape,
        placement: &Isometry3<f64>,
    ) -> Result<SolidHandle, GeometryError> {
        Ok(self.alloc(Solid {
            label: "envelope".to_string(),
            placement: *placement,
            boxes: vec![envelope_box(shape)],
            holes: Vec::new(),
            solver_errors: Vec::new(),
            open_mesh: false,
        }))
    }

    fn volume(&self, solid: SolidHandle) -> Result<f64, GeometryError> {
        self.with_solid(solid, Solid::volume)
    }

    fn bounding_box(&self, solid: SolidHandle) -> Result<Aabb, GeometryError> {
        self.with_solid(solid, Solid::bounding_box)?
    }

    fn center_of_mass(&self, solid: SolidHandle) -> Result<Point3<f64>, GeometryError> {
        self.with_solid(solid, Solid::center_of_mass)?
    }

    fn inertia_tensor(&self, solid: SolidHandle) -> Result<Matrix3<f64>, GeometryError> {
        self.with_solid(solid, Solid::inertia_tensor)?
    }

    fn intersect(&self, a: SolidHandle, b: SolidHandle) -> Result<SolidHandle, GeometryError> {
        let (label_a, place_a, boxes_a) = self.with_solid(a, |s| (s.label.clone(), s.placement, s.boxes.clone()))?;
        let (label_b, place_b, boxes_b) = self.with_solid(b, |s| (s.label.clone(), s.placement, s.boxes.clone()))?;
        // Work in a's frame.
        let relative = place_a.inverse() * place_b;
        let boxes_b: Vec<Aabb> = boxes_b.iter().map(|y| y.transformed(&relative)).collect();
        let mut boxes = Vec::new();
        for x in &boxes_a {
            boxes.extend(boxes_b.iter().filter_map(|y| x.intersection(y)));
        }
        Ok(self.alloc(Solid {
            label: format!("{label_a}∩{label_b}"),
            placement: place_a,
            boxes,
            holes: Vec::new(),
            solver_errors: Vec::new(),
            open_mesh: false,
        }))
    }

    fn holes(&self, solid: SolidHandle) -> Result<Vec<HoleFeature>, GeometryError> {
        self.with_solid(solid, |s| {
            s.world_holes()
                .map(|h| HoleFeature {
                    center: h.center,
                    axis: h.axis,
                    diameter: h.diameter,
                })
                .collect()
        })
    }

    fn solver_errors(&self, solid: SolidHandle) -> Result<Vec<String>, GeometryError> {
        self.with_solid(solid, |s| s.solver_errors.clone())
    }

    fn segment_clearance(
        &self,
        solid: SolidHandle,
        a: &Point3<f64>,
        b: &Point3<f64>,
    ) -> Result<f64, GeometryError> {
        self.with_solid(solid, |s| s.clearance(a, b))
    }

    fn export_step(&self, solid: SolidHandle, path: &Path) -> Result<u64, GeometryError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = self.with_solid(solid, |s| s.step_text(&file_name))?;
        std::fs::write(path, &text).map_err(|e| export_error(path, e))?;
        Ok(text.len() as u64)
    }

    fn export_mesh(&self, solid: SolidHandle, path: &Path) -> Result<Mesh, GeometryError> {
        let mesh = self.with_solid(solid, Solid::mesh)?;
        let file = File::create(path).map_err(|e| export_error(path, e))?;
        mesh.write_stl(BufWriter::new(file))
            .map_err(|e| export_error(path, e))?;
        Ok(mesh)
    }

    fn release(&self, solid: SolidHandle) -> Result<(), GeometryError> {
        let mut guard = self.solids.write().unwrap_or_else(|e| e.into_inner());
        let solids = &mut *guard;
        let slot = solid.0 as usize;
        match solids.slots.get_mut(slot) {
            Some(entry @ Some(_)) => {
                *entry = None;
                solids.free.push(slot);
                Ok(())
            }
            _ => Err(GeometryError::UnknownSolid(solid.0)),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Translation3;
    use rigspec_params::PatternShape;

    // ------------------------------------------------------------------ helpers
    fn place(x: f64, y: f64, z: f64) -> Isometry3<f64> {
        Isometry3::translation(x, y, z)
    }

    fn realize(kernel: &SimKernel, part: &str, at: Isometry3<f64>) -> SolidHandle {
        kernel.realize(&RealizeRequest::new(part, at)).unwrap()
    }

    fn m5_square() -> BoltPattern {
        BoltPattern {
            fastener: "M5".into(),
            pattern: PatternShape::Rectangular { spacing: [40.0, 40.0] },
            hole_diameter: 5.5,
            counterbore: None,
            min_edge_distance: 6.0,
        }
    }

    // ------------------------------------------------------------------ mass properties

    #[test]
    fn cuboid_volume_and_bbox() {
        let k = SimKernel::new().with_body("plate", SimBody::cuboid([500.0, 400.0, 50.0]));
        let h = realize(&k, "plate", place(0.0, 0.0, 25.0));
        assert_relative_eq!(k.volume(h).unwrap(), 1.0e7, epsilon = 1e-3);
        let bb = k.bounding_box(h).unwrap();
        assert_relative_eq!(bb.size().x, 500.0);
        assert_relative_eq!(bb.min.z, 0.0);
    }

    #[test]
    fn holes_remove_material() {
        let body = SimBody::cuboid([100.0, 100.0, 10.0]).with_pattern_holes(&m5_square(), &Isometry3::identity(), 10.0);
        let k = SimKernel::new().with_body("bracket", body);
        let h = realize(&k, "bracket", Isometry3::identity());
        let hole = std::f64::consts::PI * 2.75 * 2.75 * 10.0;
        assert_relative_eq!(k.volume(h).unwrap(), 1.0e5 - 4.0 * hole, epsilon = 1e-6);
        // Symmetric holes leave the centre of mass in place.
        assert_relative_eq!(k.center_of_mass(h).unwrap(), Point3::origin(), epsilon = 1e-9);
    }

    #[test]
    fn center_of_mass_weights_boxes_by_volume() {
        let body = SimBody::new()
            .with_box([0.0, 0.0, 0.0], [10.0, 10.0, 10.0])
            .with_box([10.0, 0.0, 0.0], [30.0, 10.0, 10.0]);
        let k = SimKernel::new().with_body("step", body);
        let h = realize(&k, "step", Isometry3::identity());
        // 1000 mm³ at x=5, 2000 mm³ at x=20.
        assert_relative_eq!(k.center_of_mass(h).unwrap().x, 15.0, epsilon = 1e-9);
    }

    #[test]
    fn cube_inertia_is_isotropic() {
        let k = SimKernel::new().with_body("cube", SimBody::cuboid([10.0, 10.0, 10.0]));
        let h = realize(&k, "cube", place(5.0, 5.0, 5.0));
        let i = k.inertia_tensor(h).unwrap();
        let expected = 1000.0 * 200.0 / 12.0;
        assert_relative_eq!(i[(0, 0)], expected, epsilon = 1e-6);
        assert_relative_eq!(i[(1, 1)], expected, epsilon = 1e-6);
        assert_relative_eq!(i[(0, 1)], 0.0, epsilon = 1e-9);
    }

    #[test]
    fn holes_report_world_positions() {
        let body = SimBody::cuboid([100.0, 100.0, 10.0]).with_pattern_holes(&m5_square(), &Isometry3::identity(), 10.0);
        let k = SimKernel::new().with_body("bracket", body);
        let h = realize(&k, "bracket", place(100.0, 0.0, 0.0));
        let holes = k.holes(h).unwrap();
        assert_eq!(holes.len(), 4);
        assert_relative_eq!(holes[0].center, Point3::new(80.0, -20.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(holes[0].diameter, 5.5);
    }

    // ------------------------------------------------------------------ intersections

    #[test]
    fn intersection_volume_is_symmetric() {
        let k = SimKernel::new()
            .with_body("a", SimBody::cuboid([10.0, 10.0, 10.0]))
            .with_body("b", SimBody::cuboid([10.0, 10.0, 10.0]));
        let a = realize(&k, "a", Isometry3::identity());
        let b = realize(&k, "b", place(8.0, 0.0, 0.0));
        let ab = k.intersect(a, b).unwrap();
        let ba = k.intersect(b, a).unwrap();
        assert_relative_eq!(k.volume(ab).unwrap(), 200.0, epsilon = 1e-9);
        assert_relative_eq!(k.volume(ab).unwrap(), k.volume(ba).unwrap());
    }

    #[test]
    fn disjoint_solids_intersect_to_nothing() {
        let k = SimKernel::new()
            .with_body("a", SimBody::cuboid([10.0, 10.0, 10.0]))
            .with_body("b", SimBody::cuboid([10.0, 10.0, 10.0]));
        let a = realize(&k, "a", Isometry3::identity());
        let b = realize(&k, "b", place(50.0, 0.0, 0.0));
        let i = k.intersect(a, b).unwrap();
        assert_eq!(k.volume(i).unwrap(), 0.0);
        assert!(matches!(k.center_of_mass(i), Err(GeometryError::Degenerate { .. })));
    }

    #[test]
    fn envelope_cylinder_uses_bounding_box() {
        let k = SimKernel::new();
        let e = k
            .realize_envelope(&EnvelopeShape::Cylinder { radius: 10.0, height: 30.0 }, &place(0.0, 0.0, 5.0))
            .unwrap();
        let bb = k.bounding_box(e).unwrap();
        assert_relative_eq!(bb.min.z, 5.0);
        assert_relative_eq!(bb.size().x, 20.0);
    }

    // ------------------------------------------------------------------ clearance

    #[test]
    fn segment_clearance_above_a_box() {
        let k = SimKernel::new().with_body("plate", SimBody::cuboid([100.0, 100.0, 10.0]));
        let h = realize(&k, "plate", Isometry3::identity());
        let d = k
            .segment_clearance(h, &Point3::new(-200.0, 0.0, 25.0), &Point3::new(200.0, 0.0, 25.0))
            .unwrap();
        assert_relative_eq!(d, 20.0, epsilon = 1e-6);
    }

    #[test]
    fn segment_through_a_box_has_zero_clearance() {
        let k = SimKernel::new().with_body("plate", SimBody::cuboid([100.0, 100.0, 10.0]));
        let h = realize(&k, "plate", Isometry3::identity());
        let d = k
            .segment_clearance(h, &Point3::new(-200.0, 0.0, 0.0), &Point3::new(200.0, 0.0, 0.0))
            .unwrap();
        assert_relative_eq!(d, 0.0, epsilon = 1e-9);
    }

    // ------------------------------------------------------------------ failure modes

    #[test]
    fn unregistered_part_is_unsolvable() {
        let k = SimKernel::new();
        assert!(matches!(
            k.realize(&RealizeRequest::new("ghost", Isometry3::identity())),
            Err(GeometryError::Unsolvable { ref part, .. }) if part == "ghost"
        ));
    }

    #[test]
    fn configured_failures_surface_as_errors() {
        let k = SimKernel::new()
            .with_body("bad", SimBody::cuboid([1.0; 3]).failing(SimFailure::Unsolvable("over-constrained sketch".into())))
            .with_body("broken", SimBody::cuboid([1.0; 3]).failing(SimFailure::Corrupt("kernel state lost".into())));
        let bad = k.realize(&RealizeRequest::new("bad", Isometry3::identity())).unwrap_err();
        assert!(!bad.is_fatal());
        assert!(bad.to_string().contains("over-constrained sketch"));
        let broken = k.realize(&RealizeRequest::new("broken", Isometry3::identity())).unwrap_err();
        assert!(broken.is_fatal());
    }

    #[test]
    fn solver_errors_are_reported() {
        let k = SimKernel::new().with_body("p", SimBody::cuboid([1.0; 3]).with_solver_error("fillet failed"));
        let h = realize(&k, "p", Isometry3::identity());
        assert_eq!(k.solver_errors(h).unwrap(), ["fillet failed"]);
    }

    #[test]
    fn unknown_handle_is_rejected() {
        let k = SimKernel::new();
        assert!(matches!(k.volume(SolidHandle(7)), Err(GeometryError::UnknownSolid(7))));
    }

    // ------------------------------------------------------------------ exports

    #[test]
    fn step_export_writes_nontrivial_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("plate.step");
        let k = SimKernel::new().with_body("plate", SimBody::cuboid([500.0, 400.0, 50.0]));
        let h = realize(&k, "plate", Isometry3::identity());
        let bytes = k.export_step(h, &path).unwrap();
        assert!(bytes > 512, "only {bytes} bytes");
        assert_eq!(std::fs::metadata(&path).unwrap().len(), bytes);
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("ISO-10303-21;"));
    }

    #[test]
    fn mesh_export_is_watertight_unless_told_otherwise() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let k = SimKernel::new()
            .with_body("good", SimBody::cuboid([10.0; 3]))
            .with_body("open", SimBody::cuboid([10.0; 3]).with_open_mesh());
        let good = realize(&k, "good", Isometry3::identity());
        let open = realize(&k, "open", Isometry3::identity());

        let mesh = k.export_mesh(good, &dir.path().join("good.stl")).unwrap();
        assert!(mesh.is_watertight());
        assert_eq!(mesh.triangle_count(), 12);
        assert_eq!(std::fs::metadata(dir.path().join("good.stl")).unwrap().len(), 84 + 12 * 50);

        let mesh = k.export_mesh(open, &dir.path().join("open.stl")).unwrap();
        assert!(!mesh.is_watertight());
    }

    #[test]
    fn export_into_missing_directory_fails() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let k = SimKernel::new().with_body("p", SimBody::cuboid([1.0; 3]));
        let h = realize(&k, "p", Isometry3::identity());
        let err = k.export_step(h, &dir.path().join("nope").join("p.step")).unwrap_err();
        assert!(matches!(err, GeometryError::Export { .. }));
    }

    #[test]
    fn yawed_placement_keeps_mass_properties() {
        let k = SimKernel::new().with_body("plate", SimBody::cuboid([500.0, 400.0, 50.0]));
        let flat = realize(&k, "plate", place(100.0, 0.0, 0.0));
        let yawed = realize(
            &k,
            "plate",
            Isometry3::from_parts(
                Translation3::new(100.0, 0.0, 0.0),
                UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_4),
            ),
        );
        assert_relative_eq!(k.volume(yawed).unwrap(), k.volume(flat).unwrap(), epsilon = 1e-6);
        assert_relative_eq!(k.center_of_mass(yawed).unwrap(), Point3::new(100.0, 0.0, 0.0), epsilon = 1e-9);

        let (i_flat, i_yawed) = (k.inertia_tensor(flat).unwrap(), k.inertia_tensor(yawed).unwrap());
        assert_relative_eq!(i_yawed.trace(), i_flat.trace(), max_relative = 1e-12);
        assert_relative_eq!(i_yawed[(2, 2)], i_flat[(2, 2)], max_relative = 1e-12);
        // The world-axis box still grows with the yaw.
        assert!(k.bounding_box(yawed).unwrap().size().x > 500.0);
    }

    #[test]
    fn clearance_is_measured_in_the_solid_frame() {
        // A 100 mm cube yawed 45°: its corner reaches 50·√2 along +X.
        let k = SimKernel::new().with_body("cube", SimBody::cuboid([100.0, 100.0, 100.0]));
        let h = realize(
            &k,
            "cube",
            Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_4),
            ),
        );
        let x = 80.0;
        let d = k
            .segment_clearance(h, &Point3::new(x, -10.0, 0.0), &Point3::new(x, 10.0, 0.0))
            .unwrap();
        assert_relative_eq!(d, x - 50.0 * std::f64::consts::SQRT_2, epsilon = 1e-6);
    }

    #[test]
    fn quarter_turn_intersection_is_exact() {
        let k = SimKernel::new()
            .with_body("bar", SimBody::cuboid([100.0, 10.0, 10.0]))
            .with_body("cross", SimBody::cuboid([100.0, 10.0, 10.0]));
        let bar = realize(&k, "bar", Isometry3::identity());
        let cross = realize(
            &k,
            "cross",
            Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
            ),
        );
        let i = k.intersect(bar, cross).unwrap();
        assert_relative_eq!(k.volume(i).unwrap(), 1000.0, epsilon = 1e-6);
    }

    // ------------------------------------------------------------------ handles

    #[test]
    fn released_slots_are_reused() {
        let k = SimKernel::new().with_body("p", SimBody::cuboid([1.0; 3]));
        let a = realize(&k, "p", Isometry3::identity());
        let b = realize(&k, "p", Isometry3::identity());
        assert_eq!(k.solid_count(), 2);

        k.release(a).unwrap();
        assert_eq!(k.solid_count(), 1);
        assert!(matches!(k.volume(a), Err(GeometryError::UnknownSolid(_))));
        assert!(matches!(k.release(a), Err(GeometryError::UnknownSolid(_))));

        let c = realize(&k, "p", Isometry3::identity());
        assert_eq!(c, a);
        assert_ne!(c, b);
        assert_eq!(k.solid_count(), 2);
    }

    #[test]
    fn rotated_placement_moves_holes() {
        let body = SimBody::cuboid([100.0, 100.0, 10.0]).with_hole([30.0, 0.0, 0.0], [0.0, 0.0, 1.0], 5.0, 10.0);
        let k = SimKernel::new().with_body("p", body);
        let iso = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );
        let h = realize(&k, "p", iso);
        let hole = &k.holes(h).unwrap()[0];
        assert_relative_eq!(hole.center, Point3::new(0.0, 30.0, 0.0), epsilon = 1e-9);
    }
}
