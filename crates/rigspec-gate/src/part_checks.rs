//! Per-part checks: bounding box, volume, hole patterns, edge distance,
//! recompute, and export validity.
//!
//! Each family produces its own verdict whether or not the others fail, so
//! a part with the wrong volume still reports its bounding box and holes.

use nalgebra::{Isometry3, Point3, Vector3};
use rigspec_geometry::Aabb;
use rigspec_model::PartModel;
use rigspec_params::BoltPattern;
use rigspec_types::{Axis, CheckId, FailureDetail, Verdict, VerdictKind};
use tracing::debug;

use crate::check::{Check, CheckContext, PartGeometry, undefined_all};
use crate::matching::match_nearest;

/// Capture radius for pairing realized holes with a pattern: half the
/// closest hole spacing, or the hole diameter for a single hole.
pub(crate) fn capture_radius(pattern: &BoltPattern) -> f64 {
    pattern.min_spacing().map_or(pattern.hole_diameter, |s| s / 2.0)
}

/// Planar coordinates of `p` in the interface frame `pose`.  The axial
/// component is dropped: a hole matches wherever its centre sits along the
/// bolt axis.
pub(crate) fn in_plane(pose: &Isometry3<f64>, p: &Point3<f64>) -> Point3<f64> {
    let local = pose.inverse_transform_point(p);
    Point3::new(local.x, local.y, 0.0)
}

fn pattern_points(pattern: &BoltPattern) -> Vec<Point3<f64>> {
    pattern
        .hole_positions()
        .iter()
        .map(|h| Point3::new(h[0], h[1], 0.0))
        .collect()
}

/// Realized holes of `part` that belong to `interface`, in world
/// coordinates, ordered by the pattern hole they match.  Pattern holes with
/// no realized counterpart are absent from the result.
pub(crate) fn interface_holes(
    ctx: &CheckContext<'_>,
    part: &PartModel,
    interface: &str,
    pattern: &BoltPattern,
) -> Result<Vec<Point3<f64>>, String> {
    let geometry = ctx.geometry(&part.id)?;
    let pose = part
        .interface_pose(interface, &ctx.model.frames)
        .map_err(|e| e.to_string())?;
    let local: Vec<Point3<f64>> = geometry.holes.iter().map(|h| in_plane(&pose, &h.center)).collect();
    let m = match_nearest(&pattern_points(pattern), &local, capture_radius(pattern));
    Ok(m.pairs.iter().map(|p| geometry.holes[p.right].center).collect())
}

// ────────────────────────────────────────────────────────────────────────────
// PartCheck
// ────────────────────────────────────────────────────────────────────────────

/// Geometry invariants of one part.
pub struct PartCheck {
    part: String,
}

impl PartCheck {
    pub fn new(part: impl Into<String>) -> Self {
        Self { part: part.into() }
    }

    fn id(&self, tail: &[&str]) -> CheckId {
        CheckId::new(["part", self.part.as_str()].iter().chain(tail))
    }

    /// Bolt patterns bound by the part, in binding order.
    fn patterns<'a>(&self, ctx: &CheckContext<'a>, part: &'a PartModel) -> Vec<(&'a str, &'a BoltPattern)> {
        part.bindings
            .iter()
            .filter_map(|b| {
                let spec = ctx.registry.lookup(&b.interface).ok()?;
                spec.bolt_pattern().map(|p| (b.interface.as_str(), p))
            })
            .collect()
    }

    fn bbox(&self, part: &PartModel, g: &PartGeometry) -> Verdict {
        let id = self.id(&["bbox"]);
        let mut offending = Vec::new();
        for axis in Axis::ALL {
            let Some(range) = part.bbox[axis.index()] else {
                continue;
            };
            let extent = g.bbox.extent(axis);
            if !range.contains(extent) {
                offending.push((axis, extent, range, range.delta(extent)));
            }
        }
        let declared = part.bbox.iter().filter(|r| r.is_some()).count();
        let Some(&(axis, extent, range, delta)) = offending.first() else {
            return Verdict::pass(id, VerdictKind::Invariant)
                .with_diagnostic(format!("{declared} constrained axes within range"));
        };
        let listed: Vec<String> = offending
            .iter()
            .map(|(a, e, r, d)| format!("{a}: {e:.3} mm not in {r} (delta {d:+.3})"))
            .collect();
        Verdict::fail(id, VerdictKind::Invariant)
            .with_measured(extent)
            .with_threshold(if delta < 0.0 { range.min } else { range.max })
            .with_diagnostic(listed.join("; "))
            .with_detail(FailureDetail::OutOfRange {
                axis: Some(axis),
                delta,
            })
    }

    fn volume(&self, part: &PartModel, g: &PartGeometry) -> Verdict {
        let id = self.id(&["volume"]);
        let range = part.volume.range();
        if range.contains(g.volume) {
            return Verdict::pass(id, VerdictKind::Invariant)
                .with_measured(g.volume)
                .with_diagnostic(format!("volume {:.1} mm³ within {range}", g.volume));
        }
        let delta = range.delta(g.volume);
        Verdict::fail(id, VerdictKind::Invariant)
            .with_measured(g.volume)
            .with_threshold(if delta < 0.0 { range.min } else { range.max })
            .with_diagnostic(format!("volume {:.1} mm³ outside {range} (delta {delta:+.1})", g.volume))
            .with_detail(FailureDetail::OutOfRange { axis: None, delta })
    }

    fn holes(
        &self,
        ctx: &CheckContext<'_>,
        part: &PartModel,
        iface: &str,
        pattern: &BoltPattern,
        g: &PartGeometry,
    ) -> Verdict {
        let id = self.id(&["holes", iface]);
        let tol = ctx.rules().alignment_tolerance;
        let pose = match part.interface_pose(iface, &ctx.model.frames) {
            Ok(p) => p,
            Err(e) => return Verdict::undefined(id, e.to_string()),
        };
        let expected = pattern_points(pattern);
        let capture = capture_radius(pattern);
        let realized: Vec<Point3<f64>> = g.holes.iter().map(|h| in_plane(&pose, &h.center)).collect();
        let m = match_nearest(&expected, &realized, capture);

        // Realized holes near the pattern but paired with nothing are extras.
        let extras: Vec<usize> = m
            .unmatched_right
            .iter()
            .copied()
            .filter(|&j| expected.iter().any(|e| (realized[j] - e).norm() <= capture))
            .collect();
        let misaligned = m.pairs.iter().filter(|p| p.distance >= tol).count();
        let wrong_diameter: Vec<String> = m
            .pairs
            .iter()
            .filter(|p| (g.holes[p.right].diameter - pattern.hole_diameter).abs() >= tol)
            .map(|p| format!("hole {} Ø{:.2}", p.left, g.holes[p.right].diameter))
            .collect();

        let found = m.pairs.len() + extras.len();
        let mut verdict = Verdict::new(
            id,
            m.unmatched_left.is_empty() && extras.is_empty() && misaligned == 0 && wrong_diameter.is_empty(),
            VerdictKind::Interface,
        )
        .with_threshold(tol);
        if let Some(max) = m.max_distance() {
            verdict = verdict.with_measured(max);
        }

        let mut notes = vec![format!("{found}/{} holes", pattern.hole_count())];
        if misaligned > 0 {
            notes.push(format!("{misaligned} off position by ≥ {tol} mm"));
        }
        if !wrong_diameter.is_empty() {
            notes.push(format!("expected Ø{:.2}: {}", pattern.hole_diameter, wrong_diameter.join(", ")));
        }
        verdict = verdict.with_diagnostic(notes.join("; "));

        if !m.unmatched_left.is_empty() || !extras.is_empty() {
            verdict.with_detail(FailureDetail::Unmatched {
                left: m.unmatched_left.clone(),
                right: extras,
            })
        } else if misaligned > 0 {
            verdict.with_detail(FailureDetail::Misalignment { pairs: m.pairs })
        } else {
            verdict
        }
    }

    fn edge_distance(
        &self,
        ctx: &CheckContext<'_>,
        part: &PartModel,
        iface: &str,
        pattern: &BoltPattern,
        g: &PartGeometry,
    ) -> Verdict {
        let id = self.id(&["edge-distance", iface]);
        let pose = match part.interface_pose(iface, &ctx.model.frames) {
            Ok(p) => p,
            Err(e) => return Verdict::undefined(id, e.to_string()),
        };
        let in_plane = [pose * Vector3::x(), pose * Vector3::y()];
        let nearest = pattern
            .hole_positions()
            .iter()
            .map(|h| pose * Point3::new(h[0], h[1], h[2]))
            .flat_map(|p| {
                in_plane
                    .iter()
                    .flat_map(move |d| [exit_distance(&g.bbox, &p, d), exit_distance(&g.bbox, &p, &-d)])
            })
            .fold(f64::INFINITY, f64::min);
        if !nearest.is_finite() {
            return Verdict::pass(id, VerdictKind::Interface).with_diagnostic("pattern has no holes");
        }
        Verdict::new(id, nearest >= pattern.min_edge_distance, VerdictKind::Interface)
            .with_measured(nearest)
            .with_threshold(pattern.min_edge_distance)
            .with_diagnostic(format!(
                "closest hole centre {nearest:.2} mm from the part edge (minimum {})",
                pattern.min_edge_distance
            ))
    }

    fn recompute(&self, g: &PartGeometry) -> Verdict {
        let id = self.id(&["recompute"]);
        if g.solver_errors.is_empty() {
            return Verdict::pass(id, VerdictKind::Geometry).with_measured(0.0);
        }
        Verdict::fail(id, VerdictKind::Geometry)
            .with_measured(g.solver_errors.len() as f64)
            .with_threshold(0.0)
            .with_diagnostic(g.solver_errors.join("; "))
    }
}

impl Check for PartCheck {
    fn name(&self) -> String {
        format!("part:{}", self.part)
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict> {
        let Some(part) = ctx.model.part(&self.part) else {
            return vec![Verdict::undefined(self.id(&["bbox"]), format!("unknown part '{}'", self.part))];
        };
        let patterns = self.patterns(ctx, part);
        let edge_checked: Vec<(&str, &BoltPattern)> =
            patterns.iter().copied().filter(|(_, p)| p.min_edge_distance > 0.0).collect();

        let g = match ctx.geometry(&self.part) {
            Ok(g) => g,
            Err(cause) => {
                let mut ids = vec![self.id(&["bbox"]), self.id(&["volume"]), self.id(&["recompute"])];
                ids.extend(patterns.iter().map(|(i, _)| self.id(&["holes", i])));
                ids.extend(edge_checked.iter().map(|(i, _)| self.id(&["edge-distance", i])));
                return undefined_all(ids, &cause);
            }
        };

        let mut out = vec![self.bbox(part, g), self.volume(part, g), self.recompute(g)];
        for (iface, pattern) in &patterns {
            out.push(self.holes(ctx, part, iface, pattern, g));
        }
        for (iface, pattern) in &edge_checked {
            out.push(self.edge_distance(ctx, part, iface, pattern, g));
        }
        debug!(part = %self.part, verdicts = out.len(), "part checks evaluated");
        out
    }
}

/// Distance from `p` along `dir` to where the ray leaves `bbox`.  Negative
/// when `p` is already outside along that direction.
fn exit_distance(bbox: &Aabb, p: &Point3<f64>, dir: &Vector3<f64>) -> f64 {
    let mut t = f64::INFINITY;
    for i in 0..3 {
        if dir[i].abs() < 1e-12 {
            continue;
        }
        let wall = if dir[i] > 0.0 { bbox.max[i] } else { bbox.min[i] };
        t = t.min((wall - p[i]) / dir[i]);
    }
    t
}

// ────────────────────────────────────────────────────────────────────────────
// ExportCheck
// ────────────────────────────────────────────────────────────────────────────

/// STEP and STL export validity of one part.
pub struct ExportCheck {
    part: String,
}

impl ExportCheck {
    pub fn new(part: impl Into<String>) -> Self {
        Self { part: part.into() }
    }
}

impl Check for ExportCheck {
    fn name(&self) -> String {
        format!("export:{}", self.part)
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict> {
        let step_id = CheckId::new(["part", self.part.as_str(), "export", "step"]);
        let stl_id = CheckId::new(["part", self.part.as_str(), "export", "stl"]);
        let g = match ctx.geometry(&self.part) {
            Ok(g) => g,
            Err(cause) => return undefined_all([step_id, stl_id], &cause),
        };
        if let Err(e) = std::fs::create_dir_all(ctx.export_dir) {
            let cause = format!("cannot create export directory '{}': {e}", ctx.export_dir.display());
            return undefined_all([step_id, stl_id], &cause);
        }
        let rules = ctx.rules();

        let step_path = ctx.export_dir.join(format!("{}.step", self.part));
        let step = match ctx.kernel.export_step(g.handle, &step_path) {
            Ok(bytes) => {
                let bytes = bytes as f64;
                Verdict::new(step_id, bytes >= rules.step_min_bytes, VerdictKind::Invariant)
                    .with_measured(bytes)
                    .with_threshold(rules.step_min_bytes)
                    .with_diagnostic(format!("{}.step ({bytes} bytes)", self.part))
            }
            Err(e) => Verdict::undefined(step_id, e.to_string()),
        };

        let stl_path = ctx.export_dir.join(format!("{}.stl", self.part));
        let stl = match ctx.kernel.export_mesh(g.handle, &stl_path) {
            Ok(mesh) => {
                let triangles = mesh.triangle_count() as f64;
                let watertight = mesh.is_watertight();
                let mut problems = Vec::new();
                if !watertight {
                    problems.push(format!("{} open edges", mesh.boundary_edge_count()));
                }
                if triangles > rules.stl_max_triangles {
                    problems.push(format!("{triangles} triangles over budget {}", rules.stl_max_triangles));
                }
                Verdict::new(stl_id, problems.is_empty(), VerdictKind::Invariant)
                    .with_measured(triangles)
                    .with_threshold(rules.stl_max_triangles)
                    .with_diagnostic(if problems.is_empty() {
                        format!("watertight, {triangles} triangles")
                    } else {
                        problems.join("; ")
                    })
            }
            Err(e) => Verdict::undefined(stl_id, e.to_string()),
        };
        vec![step, stl]
    }
}
