//! Mate checks: interface compatibility and cross-part alignment.

use nalgebra::Point3;
use rigspec_model::Mate;
use rigspec_params::InterfaceKind;
use rigspec_types::{CheckId, FailureDetail, Verdict, VerdictKind};

use crate::check::{Check, CheckContext};
use crate::matching::match_nearest;
use crate::part_checks::{capture_radius, in_plane, interface_holes};

/// `interface/<a>.<ia>~<b>.<ib>/{compat,alignment}` for one mate.
pub struct MateCheck {
    mate: Mate,
}

impl MateCheck {
    pub fn new(mate: Mate) -> Self {
        Self { mate }
    }

    fn id(&self, tail: &str) -> CheckId {
        CheckId::new(["interface", self.mate.label().as_str(), tail])
    }

    fn alignment(&self, ctx: &CheckContext<'_>, kind: &InterfaceKind) -> Option<Verdict> {
        let id = self.id("alignment");
        let m = &self.mate;
        let tol = ctx.rules().alignment_tolerance;
        let (Some(a), Some(b)) = (ctx.model.part(&m.a), ctx.model.part(&m.b)) else {
            return Some(Verdict::undefined(id, "mate references an unknown part"));
        };

        match kind {
            InterfaceKind::BoltPattern(pattern) => {
                let Some(other) = ctx.registry.lookup(&m.interface_b).ok().and_then(|s| s.bolt_pattern()) else {
                    return Some(Verdict::undefined(id, format!("'{}' is not a bolt pattern", m.interface_b)));
                };
                let holes = a
                    .interface_pose(&m.interface_a, &ctx.model.frames)
                    .map_err(|e| e.to_string())
                    .and_then(|pose| {
                        let ha = interface_holes(ctx, a, &m.interface_a, pattern)?;
                        let hb = interface_holes(ctx, b, &m.interface_b, other)?;
                        Ok((pose, ha, hb))
                    });
                let (pose, left, right) = match holes {
                    Ok(h) => h,
                    Err(cause) => return Some(Verdict::undefined(id, cause)),
                };
                // Both sides measured in the plane of the left interface.
                let project = |pts: &[Point3<f64>]| -> Vec<Point3<f64>> {
                    pts.iter().map(|p| in_plane(&pose, p)).collect()
                };
                let matching = match_nearest(&project(&left), &project(&right), capture_radius(pattern));
                let mut verdict = Verdict::new(id, false, VerdictKind::Interface).with_threshold(tol);
                if let Some(max) = matching.max_distance() {
                    verdict = verdict.with_measured(max);
                }
                if !matching.is_complete() {
                    let diagnostic = format!(
                        "{} holes on {} and {} on {} have no counterpart",
                        matching.unmatched_left.len(),
                        m.a,
                        matching.unmatched_right.len(),
                        m.b
                    );
                    return Some(verdict.with_diagnostic(diagnostic).with_detail(FailureDetail::Unmatched {
                        left: matching.unmatched_left,
                        right: matching.unmatched_right,
                    }));
                }
                let off: Vec<String> = matching
                    .pairs
                    .iter()
                    .filter(|p| p.distance >= tol)
                    .map(|p| format!("{}↔{}: {:.3} mm", p.left, p.right, p.distance))
                    .collect();
                if off.is_empty() {
                    verdict.passed = true;
                    return Some(verdict.with_diagnostic(format!("{} hole pairs aligned", matching.pairs.len())));
                }
                Some(
                    verdict
                        .with_diagnostic(off.join(", "))
                        .with_detail(FailureDetail::Misalignment { pairs: matching.pairs }),
                )
            }
            InterfaceKind::DatumFrame(_) => {
                let frames = &ctx.model.frames;
                let poses = a
                    .interface_pose(&m.interface_a, frames)
                    .and_then(|pa| Ok((pa, b.interface_pose(&m.interface_b, frames)?)));
                let (pa, pb) = match poses {
                    Ok(p) => p,
                    Err(e) => return Some(Verdict::undefined(id, e.to_string())),
                };
                let distance = (pa.translation.vector - pb.translation.vector).norm();
                let angle = pa.rotation.angle_to(&pb.rotation).to_degrees();
                let angle_tol = ctx.rules().alignment_angle_tolerance;
                // Measured and threshold carry the origin offset; the angle
                // is reported in the diagnostic.
                Some(
                    Verdict::new(id, distance < tol && angle < angle_tol, VerdictKind::Interface)
                        .with_measured(distance)
                        .with_threshold(tol)
                        .with_diagnostic(format!(
                            "datum origins {distance:.3} mm apart, axes {angle:.3}° apart (limit {angle_tol}°)"
                        )),
                )
            }
            InterfaceKind::ClearanceEnvelope(_) => None,
        }
    }
}

impl Check for MateCheck {
    fn name(&self) -> String {
        format!("mate:{}", self.mate.label())
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict> {
        let m = &self.mate;
        if let Err(mismatch) = ctx.registry.check_pair(&m.interface_a, &m.interface_b) {
            let reason = mismatch.to_string();
            return vec![
                Verdict::fail(self.id("compat"), VerdictKind::Interface).with_diagnostic(reason.clone()),
                Verdict::fail(self.id("alignment"), VerdictKind::Interface)
                    .with_diagnostic(format!("not evaluated: {reason}")),
            ];
        }
        let mut out = vec![Verdict::pass(self.id("compat"), VerdictKind::Interface)];
        // Compatible interfaces share a kind; the left side speaks for both.
        if let Ok(spec) = ctx.registry.lookup(&m.interface_a)
            && let Some(v) = self.alignment(ctx, &spec.kind)
        {
            out.push(v);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{Fixture, plate_body};
    use nalgebra::Isometry3;
    use rigspec_geometry::SimBody;

    /// Two stacked plates sharing the hip bolt pattern; `shift` moves the
    /// upper plate's drilled holes along X in its own frame.
    fn stacked(shift: f64) -> Fixture {
        let upper = SimBody::cuboid([500.0, 400.0, 50.0]).with_pattern_holes(
            &Fixture::hip_pattern(),
            &Isometry3::translation(shift, 0.0, 0.0),
            50.0,
        );
        Fixture::single_plate(plate_body())
            .part(Fixture::plate_on("lid", "lid_frame"), upper)
            .with(|a| a.mate("plate", "hip_mount", "lid", "hip_mount"))
    }

    #[test]
    fn coincident_patterns_align() {
        let report = stacked(0.0).run();
        assert!(report.get("interface/plate.hip_mount~lid.hip_mount/compat").unwrap().passed);
        let v = report.get("interface/plate.hip_mount~lid.hip_mount/alignment").unwrap();
        assert!(v.passed, "{}", v.diagnostic);
    }

    #[test]
    fn tenth_of_a_millimetre_passes() {
        let report = stacked(0.1).run();
        assert!(report.get("interface/plate.hip_mount~lid.hip_mount/alignment").unwrap().passed);
    }

    #[test]
    fn half_millimetre_offset_is_misalignment_not_unmatched() {
        let report = stacked(0.5).run();
        let v = report.get("interface/plate.hip_mount~lid.hip_mount/alignment").unwrap();
        assert!(!v.passed);
        let Some(FailureDetail::Misalignment { pairs }) = &v.detail else {
            panic!("expected misalignment, got {:?}", v.detail);
        };
        assert_eq!(pairs.len(), 4);
        for p in pairs {
            assert!((p.distance - 0.5).abs() < 1e-9);
        }
    }

    /// Plate and lid both on the chassis frame, each binding
    /// `battery_mount` at the origin with the given yaw key.
    fn datum_mate(lid_yaw: &str) -> Fixture {
        let zero = "dimensions.plate.zero";
        Fixture::new()
            .layer("[dimensions.mate]\nquarter = { value = 0.3, unit = \"deg\" }\nfive = { value = 5.0, unit = \"deg\" }\n")
            .part(
                Fixture::plate().bind_posed("battery_mount", [zero, zero, zero], zero),
                plate_body(),
            )
            .part(
                Fixture::plate_on("lid", "chassis").bind_posed("battery_mount", [zero, zero, zero], lid_yaw),
                plate_body(),
            )
            .with(|a| a.mate("plate", "battery_mount", "lid", "battery_mount"))
    }

    const DATUM_ALIGNMENT: &str = "interface/plate.battery_mount~lid.battery_mount/alignment";

    #[test]
    fn coincident_datums_align() {
        let v = datum_mate("dimensions.plate.zero").run().get(DATUM_ALIGNMENT).unwrap().clone();
        assert!(v.passed, "{}", v.diagnostic);
        assert_eq!(v.measured, Some(0.0));
    }

    #[test]
    fn small_datum_yaw_is_within_tolerance() {
        let v = datum_mate("dimensions.mate.quarter").run().get(DATUM_ALIGNMENT).unwrap().clone();
        assert!(v.passed, "{}", v.diagnostic);
    }

    #[test]
    fn rotated_datum_with_shared_origin_fails() {
        let v = datum_mate("dimensions.mate.five").run().get(DATUM_ALIGNMENT).unwrap().clone();
        assert!(!v.passed);
        assert!(v.measured.unwrap() < 1e-9);
        assert!(v.diagnostic.contains("axes 5.000°"), "{}", v.diagnostic);
    }

    #[test]
    fn incompatible_interfaces_fail_compat_and_alignment() {
        let report = Fixture::single_plate(plate_body())
            .part(Fixture::plate_on("lid", "lid_frame").bind("m6_mount"), plate_body())
            .with(|a| a.mate("plate", "hip_mount", "lid", "m6_mount"))
            .run();
        let compat = report.get("interface/plate.hip_mount~lid.m6_mount/compat").unwrap();
        assert!(!compat.passed);
        assert!(compat.diagnostic.contains("M5"), "{}", compat.diagnostic);
        assert!(!report.get("interface/plate.hip_mount~lid.m6_mount/alignment").unwrap().passed);
    }
}
