//! Static stability: support polygon of the feet in contact and the
//! inward margin of the projected centre of mass.

use nalgebra::{Point2, Vector2};
use rigspec_types::{CheckId, FailureDetail, Verdict, VerdictKind};

use crate::check::{Check, CheckContext};

/// Convex hull of foot contacts projected onto the ground (XY) plane,
/// counter-clockwise.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportPolygon {
    hull: Vec<Point2<f64>>,
}

/// Signed distance from a point to the nearest hull edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margin {
    /// mm, positive inside the hull.
    pub signed: f64,
    /// Index of the nearest edge (`i` → `i + 1`), if the hull has edges.
    pub nearest_edge: Option<usize>,
}

fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn segment_distance(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab: Vector2<f64> = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

impl SupportPolygon {
    /// Monotone-chain hull.  Duplicate and collinear points are dropped.
    pub fn from_points<I: IntoIterator<Item = Point2<f64>>>(points: I) -> Self {
        let mut pts: Vec<Point2<f64>> = points.into_iter().collect();
        pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        pts.dedup();
        if pts.len() < 3 {
            return Self { hull: pts };
        }

        let mut lower: Vec<Point2<f64>> = Vec::new();
        for p in &pts {
            while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0 {
                lower.pop();
            }
            lower.push(*p);
        }
        let mut upper: Vec<Point2<f64>> = Vec::new();
        for p in pts.iter().rev() {
            while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0 {
                upper.pop();
            }
            upper.push(*p);
        }
        lower.pop();
        upper.pop();
        lower.extend(upper);
        Self { hull: lower }
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.hull
    }

    /// Fewer than three non-collinear contacts enclose no area.
    pub fn is_degenerate(&self) -> bool {
        self.hull.len() < 3
    }

    /// Area centroid, or the vertex mean for a degenerate hull.
    pub fn centroid(&self) -> Option<Point2<f64>> {
        if self.hull.is_empty() {
            return None;
        }
        if self.is_degenerate() {
            let sum = self.hull.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
            return Some(Point2::from(sum / self.hull.len() as f64));
        }
        let (mut area, mut cx, mut cy) = (0.0, 0.0, 0.0);
        for (i, a) in self.hull.iter().enumerate() {
            let b = &self.hull[(i + 1) % self.hull.len()];
            let w = a.x * b.y - b.x * a.y;
            area += w;
            cx += (a.x + b.x) * w;
            cy += (a.y + b.y) * w;
        }
        area /= 2.0;
        Some(Point2::new(cx / (6.0 * area), cy / (6.0 * area)))
    }

    /// Signed distance from `p` to the hull boundary.  A degenerate hull has
    /// no inside, so the margin is never positive.
    pub fn signed_margin(&self, p: &Point2<f64>) -> Option<Margin> {
        match self.hull.len() {
            0 => None,
            1 => Some(Margin {
                signed: -(p - self.hull[0]).norm(),
                nearest_edge: None,
            }),
            2 => Some(Margin {
                signed: -segment_distance(p, &self.hull[0], &self.hull[1]),
                nearest_edge: Some(0),
            }),
            n => {
                let mut inside = true;
                let mut best = (f64::INFINITY, 0);
                for i in 0..n {
                    let (a, b) = (&self.hull[i], &self.hull[(i + 1) % n]);
                    if cross(a, b, p) < 0.0 {
                        inside = false;
                    }
                    let d = segment_distance(p, a, b);
                    if d < best.0 {
                        best = (d, i);
                    }
                }
                Some(Margin {
                    signed: if inside { best.0 } else { -best.0 },
                    nearest_edge: Some(best.1),
                })
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// stability/<stance>
// ────────────────────────────────────────────────────────────────────────────

pub struct StabilityCheck {
    stance: String,
}

impl StabilityCheck {
    pub fn new(stance: impl Into<String>) -> Self {
        Self { stance: stance.into() }
    }
}

impl Check for StabilityCheck {
    fn name(&self) -> String {
        format!("stability:{}", self.stance)
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict> {
        let id = CheckId::new(["stability", self.stance.as_str()]);
        let mass = match ctx.mass() {
            Ok(m) => m,
            Err(cause) => return vec![Verdict::undefined(id, cause)],
        };
        let Some(stance) = ctx.model.stance(&self.stance) else {
            return vec![Verdict::undefined(id, format!("unknown stance '{}'", self.stance))];
        };
        let contacts = match ctx.model.foot_contacts(stance) {
            Ok(c) => c,
            Err(e) => return vec![Verdict::undefined(id, e.to_string())],
        };

        let required = ctx.rules().stability_margin;
        let polygon = SupportPolygon::from_points(contacts.iter().map(|(_, p)| Point2::new(p.x, p.y)));
        let com = Point2::new(mass.center_of_mass.x, mass.center_of_mass.y);
        let Some(margin) = polygon.signed_margin(&com) else {
            return vec![
                Verdict::fail(id, VerdictKind::Stability)
                    .with_threshold(required)
                    .with_diagnostic("no feet in contact"),
            ];
        };

        let passed = !polygon.is_degenerate() && margin.signed >= required;
        let diagnostic = format!(
            "centre of mass ({:.1}, {:.1}) is {:+.1} mm from support edge {} ({} contacts)",
            com.x,
            com.y,
            margin.signed,
            margin.nearest_edge.map_or("-".to_string(), |e| e.to_string()),
            contacts.len()
        );
        let verdict = Verdict::new(id, passed, VerdictKind::Stability)
            .with_measured(margin.signed)
            .with_threshold(required)
            .with_diagnostic(diagnostic);
        if passed {
            return vec![verdict];
        }
        vec![verdict.with_detail(FailureDetail::StabilityFailure {
            stance: self.stance.clone(),
            signed_margin: margin.signed,
            nearest_edge: margin.nearest_edge,
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(half: f64) -> SupportPolygon {
        SupportPolygon::from_points([
            Point2::new(-half, -half),
            Point2::new(half, -half),
            Point2::new(half, half),
            Point2::new(-half, half),
        ])
    }

    #[test]
    fn hull_drops_interior_and_collinear_points() {
        let poly = SupportPolygon::from_points([
            Point2::new(0.0, 0.0),
            Point2::new(100.0, 0.0),
            Point2::new(50.0, 0.0),
            Point2::new(100.0, 100.0),
            Point2::new(0.0, 100.0),
            Point2::new(50.0, 50.0),
            Point2::new(0.0, 100.0),
        ]);
        assert_eq!(poly.vertices().len(), 4);
    }

    #[test]
    fn centroid_margin_of_square() {
        let poly = square(150.0);
        let c = poly.centroid().unwrap();
        assert_relative_eq!(c.x, 0.0, epsilon = 1e-9);
        let m = poly.signed_margin(&c).unwrap();
        assert_relative_eq!(m.signed, 150.0);
    }

    #[test]
    fn point_on_edge_has_zero_margin() {
        let m = square(150.0).signed_margin(&Point2::new(150.0, 20.0)).unwrap();
        assert_relative_eq!(m.signed, 0.0);
    }

    #[test]
    fn outside_point_is_negative() {
        let m = square(150.0).signed_margin(&Point2::new(200.0, 0.0)).unwrap();
        assert_relative_eq!(m.signed, -50.0);
    }

    #[test]
    fn triangle_hull() {
        let poly = SupportPolygon::from_points([Point2::new(0.0, 0.0), Point2::new(300.0, 0.0), Point2::new(0.0, 300.0)]);
        assert!(!poly.is_degenerate());
        let m = poly.signed_margin(&Point2::new(50.0, 50.0)).unwrap();
        assert_relative_eq!(m.signed, 50.0);
    }

    #[test]
    fn two_feet_have_no_inside() {
        let poly = SupportPolygon::from_points([Point2::new(0.0, 0.0), Point2::new(100.0, 0.0)]);
        assert!(poly.is_degenerate());
        let m = poly.signed_margin(&Point2::new(50.0, 0.0)).unwrap();
        assert_relative_eq!(m.signed, 0.0);
        assert!(poly.signed_margin(&Point2::new(50.0, 10.0)).unwrap().signed < 0.0);
    }

    #[test]
    fn empty_polygon_has_no_margin() {
        assert!(SupportPolygon::from_points([]).signed_margin(&Point2::origin()).is_none());
    }
}
