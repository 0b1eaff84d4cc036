//! Cable routing: bend radius, clearance to solids, length, current rating
//! and grommet fill.

use nalgebra::Point3;
use rigspec_model::{CableRun, Grommet};
use rigspec_types::{CableOffender, CheckId, FailureDetail, Verdict, VerdictKind};

use crate::check::{Check, CheckContext};

/// Radius of the circle through `a`, `b`, `c`.  Collinear points bend along
/// an infinite radius, unless the path doubles back on itself.
pub fn circumradius(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let (ab, bc, ca) = (b - a, c - b, a - c);
    let cross = ab.cross(&(c - a)).norm();
    let scale = ab.norm() * bc.norm();
    if cross <= 1e-12 * scale.max(1.0) {
        return if ab.dot(&bc) < 0.0 { 0.0 } else { f64::INFINITY };
    }
    ab.norm() * bc.norm() * ca.norm() / (2.0 * cross)
}

/// Bend radius at every interior waypoint, by waypoint name.
pub fn bend_radii(run: &CableRun) -> Vec<(&str, f64)> {
    run.waypoints
        .windows(3)
        .map(|w| (w[1].name.as_str(), circumradius(&w[0].point, &w[1].point, &w[2].point)))
        .collect()
}

/// Cable runs passing through `grommet`: those it declares plus those whose
/// path routes through it, each once.
pub fn grommet_runs<'a>(grommet: &Grommet, runs: &'a [CableRun]) -> Vec<&'a CableRun> {
    runs.iter()
        .filter(|r| grommet.cables.contains(&r.name) || r.passes_through(&grommet.name))
        .collect()
}

fn cable_verdict(id: CheckId, passed: bool, measured: f64, threshold: f64) -> Verdict {
    Verdict::new(id, passed, VerdictKind::CableFit)
        .with_measured(measured)
        .with_threshold(threshold)
}

fn with_offenders(verdict: Verdict, offenders: Vec<CableOffender>) -> Verdict {
    if verdict.passed {
        return verdict;
    }
    verdict.with_detail(FailureDetail::CableFitFailure { offenders })
}

// ────────────────────────────────────────────────────────────────────────────
// cable/<run>/{bend,clearance,length,current}
// ────────────────────────────────────────────────────────────────────────────

pub struct CableRunCheck {
    run: String,
}

impl CableRunCheck {
    pub fn new(run: impl Into<String>) -> Self {
        Self { run: run.into() }
    }

    fn id(&self, tail: &str) -> CheckId {
        CheckId::new(["cable", self.run.as_str(), tail])
    }

    fn bend(&self, run: &CableRun) -> Verdict {
        let min = run.cable_type.min_bend_radius;
        let radii = bend_radii(run);
        let offenders: Vec<CableOffender> = radii
            .iter()
            .filter(|(_, r)| *r < min)
            .map(|(name, r)| CableOffender {
                location: name.to_string(),
                value: *r,
            })
            .collect();
        let tightest = radii.iter().map(|(_, r)| *r).fold(f64::INFINITY, f64::min);
        let mut verdict = Verdict::new(self.id("bend"), offenders.is_empty(), VerdictKind::CableFit).with_threshold(min);
        if tightest.is_finite() {
            verdict = verdict.with_measured(tightest);
        }
        let diagnostic = if offenders.is_empty() {
            format!("{} bends, none tighter than {min:.1} mm", radii.len())
        } else {
            offenders
                .iter()
                .map(|o| format!("{}: {:.1} mm", o.location, o.value))
                .collect::<Vec<_>>()
                .join(", ")
        };
        with_offenders(verdict.with_diagnostic(diagnostic), offenders)
    }

    fn clearance(&self, ctx: &CheckContext<'_>, run: &CableRun) -> Verdict {
        let id = self.id("clearance");
        let required = ctx.rules().cable_clearance;
        let radius = run.cable_type.outer_diameter() / 2.0;

        let mut offenders = Vec::new();
        let mut closest = f64::INFINITY;
        for (a, b) in run.segments() {
            let hosts = [a.host.as_deref(), b.host.as_deref()];
            for part in ctx.model.parts.keys() {
                if hosts.contains(&Some(part.as_str())) {
                    continue;
                }
                let geometry = match ctx.geometry(part) {
                    Ok(g) => g,
                    Err(cause) => return Verdict::undefined(id, cause),
                };
                let centreline = match ctx.kernel.segment_clearance(geometry.handle, &a.point, &b.point) {
                    Ok(d) => d,
                    Err(e) => return Verdict::undefined(id, e.to_string()),
                };
                let clearance = centreline - radius;
                closest = closest.min(clearance);
                if clearance < required {
                    offenders.push(CableOffender {
                        location: format!("{}→{} / {part}", a.name, b.name),
                        value: clearance,
                    });
                }
            }
        }

        let mut verdict =
            Verdict::new(id, offenders.is_empty(), VerdictKind::CableFit).with_threshold(required);
        if closest.is_finite() {
            verdict = verdict.with_measured(closest);
        }
        let diagnostic = if offenders.is_empty() {
            format!("{} segments clear of every solid", run.segments().count())
        } else {
            offenders
                .iter()
                .map(|o| format!("{}: {:.1} mm", o.location, o.value))
                .collect::<Vec<_>>()
                .join(", ")
        };
        with_offenders(verdict.with_diagnostic(diagnostic), offenders)
    }

    fn length(&self, run: &CableRun) -> Verdict {
        let path = run.path_length();
        let verdict = cable_verdict(self.id("length"), path <= run.estimated_length, path, run.estimated_length)
            .with_diagnostic(format!(
                "routed {path:.1} mm against an estimate of {:.1} mm",
                run.estimated_length
            ));
        with_offenders(
            verdict,
            vec![CableOffender {
                location: run.name.clone(),
                value: path - run.estimated_length,
            }],
        )
    }

    fn current(&self, ctx: &CheckContext<'_>, run: &CableRun, actuator: &str) -> Verdict {
        let id = self.id("current");
        let peak = match ctx.params.actuator(actuator) {
            Ok(a) => a.peak_current,
            Err(e) => return Verdict::fail(id, VerdictKind::CableFit).with_diagnostic(e.to_string()),
        };
        let rating = run.cable_type.max_current;
        let verdict = cable_verdict(id, rating >= peak, peak, rating).with_diagnostic(format!(
            "{} rated {rating:.1} A, '{actuator}' peaks at {peak:.1} A",
            run.cable_type.name
        ));
        with_offenders(
            verdict,
            vec![CableOffender {
                location: actuator.to_string(),
                value: peak,
            }],
        )
    }
}

impl Check for CableRunCheck {
    fn name(&self) -> String {
        format!("cable:{}", self.run)
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict> {
        let Some(run) = ctx.model.cable_run(&self.run) else {
            return Vec::new();
        };
        let mut out = vec![self.bend(run), self.clearance(ctx, run), self.length(run)];
        if let Some(actuator) = &run.feeds {
            out.push(self.current(ctx, run, actuator));
        }
        out
    }
}

// ────────────────────────────────────────────────────────────────────────────
// grommet/<name>/fill
// ────────────────────────────────────────────────────────────────────────────

pub struct GrommetCheck {
    grommet: String,
}

impl GrommetCheck {
    pub fn new(grommet: impl Into<String>) -> Self {
        Self { grommet: grommet.into() }
    }
}

impl Check for GrommetCheck {
    fn name(&self) -> String {
        format!("grommet:{}", self.grommet)
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict> {
        let Some(grommet) = ctx.model.grommet(&self.grommet) else {
            return Vec::new();
        };
        let id = CheckId::new(["grommet", self.grommet.as_str(), "fill"]);
        let max = ctx.rules().grommet_fill_max;
        let runs = grommet_runs(grommet, &ctx.model.cable_runs);
        let used: f64 = runs.iter().map(|r| r.cable_type.cross_section()).sum();
        let fill = used / grommet.area();

        let names: Vec<&str> = runs.iter().map(|r| r.name.as_str()).collect();
        let verdict = cable_verdict(id, fill <= max, fill, max).with_diagnostic(format!(
            "{} cables ({}) fill {:.1}% of Ø{:.1} mm",
            runs.len(),
            names.join(", "),
            fill * 100.0,
            grommet.inner_diameter
        ));
        let offenders = runs
            .iter()
            .map(|r| CableOffender {
                location: r.name.clone(),
                value: r.cable_type.cross_section(),
            })
            .collect();
        vec![with_offenders(verdict, offenders)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rigspec_model::{CableType, Waypoint};

    // ---- helpers

    fn wp(name: &str, x: f64, y: f64) -> Waypoint {
        Waypoint {
            name: name.into(),
            point: Point3::new(x, y, 0.0),
            host: None,
        }
    }

    fn cable() -> CableType {
        CableType {
            name: "power_14awg".into(),
            gauge_awg: 14,
            insulation: 0.8,
            min_bend_radius: 25.0,
            max_current: 15.0,
        }
    }

    fn run(name: &str, waypoints: Vec<Waypoint>) -> CableRun {
        CableRun {
            name: name.into(),
            cable_type: cable(),
            waypoints,
            estimated_length: 1000.0,
            feeds: None,
        }
    }

    fn grommet(diameter: f64, cables: &[&str]) -> Grommet {
        Grommet {
            name: "g1".into(),
            frame: "chassis".into(),
            point: Point3::origin(),
            inner_diameter: diameter,
            cables: cables.iter().map(|c| c.to_string()).collect(),
            host: None,
        }
    }

    // ---- bend

    #[test]
    fn right_angle_corner_radius() {
        // Right triangle: the hypotenuse is the circumdiameter.
        let r = circumradius(&Point3::new(6.0, 0.0, 0.0), &Point3::origin(), &Point3::new(0.0, 8.0, 0.0));
        assert_relative_eq!(r, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn straight_and_reversing_paths() {
        let (a, b) = (Point3::origin(), Point3::new(10.0, 0.0, 0.0));
        assert!(circumradius(&a, &b, &Point3::new(20.0, 0.0, 0.0)).is_infinite());
        assert_eq!(circumradius(&a, &b, &Point3::new(5.0, 0.0, 0.0)), 0.0);
    }

    #[test]
    fn every_interior_waypoint_is_measured() {
        let r = run(
            "main",
            vec![wp("a", 0.0, 0.0), wp("b", 100.0, 0.0), wp("c", 106.0, 6.0), wp("d", 300.0, 6.0), wp("e", 400.0, 6.0)],
        );
        let radii = bend_radii(&r);
        let names: Vec<&str> = radii.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["b", "c", "d"]);
        assert!(radii[2].1.is_infinite());
    }

    #[test]
    fn bend_lists_every_offender() {
        let check = CableRunCheck::new("zigzag");
        let r = run(
            "zigzag",
            vec![wp("a", 0.0, 0.0), wp("b", 10.0, 0.0), wp("c", 10.0, 10.0), wp("d", 20.0, 10.0), wp("e", 200.0, 10.0)],
        );
        let v = check.bend(&r);
        assert!(!v.passed);
        let Some(FailureDetail::CableFitFailure { offenders }) = &v.detail else {
            panic!("expected cable detail, got {:?}", v.detail);
        };
        let at: Vec<&str> = offenders.iter().map(|o| o.location.as_str()).collect();
        assert_eq!(at, ["b", "c"]);
    }

    #[test]
    fn two_waypoints_have_no_bends() {
        let v = CableRunCheck::new("short").bend(&run("short", vec![wp("a", 0.0, 0.0), wp("b", 50.0, 0.0)]));
        assert!(v.passed);
        assert!(v.measured.is_none());
    }

    // ---- length

    #[test]
    fn length_over_estimate_fails() {
        let mut r = run("long", vec![wp("a", 0.0, 0.0), wp("b", 1200.0, 0.0)]);
        let check = CableRunCheck::new("long");
        assert!(!check.length(&r).passed);
        r.estimated_length = 1200.0;
        assert!(check.length(&r).passed);
    }

    // ---- grommet

    #[test]
    fn grommet_counts_declared_and_routed_runs_once() {
        let g = grommet(20.0, &["a", "b"]);
        let runs = vec![
            run("a", vec![wp("x", 0.0, 0.0), wp("g1", 10.0, 0.0)]),
            run("b", vec![wp("x", 0.0, 0.0), wp("y", 10.0, 0.0)]),
            run("c", vec![wp("g1", 0.0, 0.0), wp("y", 10.0, 0.0)]),
            run("d", vec![wp("x", 0.0, 0.0), wp("y", 10.0, 0.0)]),
        ];
        let names: Vec<&str> = grommet_runs(&g, &runs).iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }
}
