//! Mechanical interface contracts.
//!
//! An [`InterfaceSpec`] is a named, immutable contract that parts bind to:
//! a bolt pattern, a datum frame, or a clearance envelope.  Interfaces are
//! declared in the `interfaces` section of a parameter document:
//!
//! ```toml
//! [interfaces.hip_mount]
//! kind = "bolt-pattern"
//! fastener = "M5"
//! hole_diameter = 5.5
//! min_edge_distance = 6.0
//! pattern = { shape = "rectangular", spacing = [40.0, 40.0] }
//! ```
//!
//! All lengths are millimetres, all angles degrees.

use rigspec_types::InterfaceMismatch;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const SHAPE_EPSILON: f64 = 1e-9;

// ────────────────────────────────────────────────────────────────────────────
// Variants
// ────────────────────────────────────────────────────────────────────────────

/// Arrangement of the holes of a bolt pattern, centred on the interface
/// origin in its local XY plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "shape", rename_all = "kebab-case", deny_unknown_fields)]
pub enum PatternShape {
    /// Four holes on the corners of an `x × y` rectangle.
    Rectangular { spacing: [f64; 2] },
    /// `count` holes equally spaced on a circle.
    Circular {
        count: u32,
        pitch_diameter: f64,
        #[serde(default)]
        start_angle: f64,
    },
    /// `count` holes along the local X axis.
    Linear { count: u32, pitch: f64 },
}

impl PatternShape {
    fn name(&self) -> &'static str {
        match self {
            PatternShape::Rectangular { .. } => "rectangular",
            PatternShape::Circular { .. } => "circular",
            PatternShape::Linear { .. } => "linear",
        }
    }

    /// Structural equality with a small absolute tolerance on dimensions.
    fn same_shape(&self, other: &PatternShape) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() < SHAPE_EPSILON;
        match (self, other) {
            (
                PatternShape::Rectangular { spacing: a },
                PatternShape::Rectangular { spacing: b },
            ) => close(a[0], b[0]) && close(a[1], b[1]),
            (
                PatternShape::Circular {
                    count: ca,
                    pitch_diameter: da,
                    start_angle: sa,
                },
                PatternShape::Circular {
                    count: cb,
                    pitch_diameter: db,
                    start_angle: sb,
                },
            ) => ca == cb && close(*da, *db) && close(*sa, *sb),
            (
                PatternShape::Linear { count: ca, pitch: pa },
                PatternShape::Linear { count: cb, pitch: pb },
            ) => ca == cb && close(*pa, *pb),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Counterbore {
    pub diameter: f64,
    pub depth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BoltPattern {
    /// Fastener designation, e.g. `"M5"`.
    pub fastener: String,
    pub pattern: PatternShape,
    pub hole_diameter: f64,
    #[serde(default)]
    pub counterbore: Option<Counterbore>,
    #[serde(default)]
    pub min_edge_distance: f64,
}

impl BoltPattern {
    /// Number of holes the pattern generates.
    pub fn hole_count(&self) -> usize {
        match &self.pattern {
            PatternShape::Rectangular { .. } => 4,
            PatternShape::Circular { count, .. } | PatternShape::Linear { count, .. } => {
                *count as usize
            }
        }
    }

    /// Hole centres in the interface's local frame (z = 0), in a stable
    /// order.
    pub fn hole_positions(&self) -> Vec<[f64; 3]> {
        match &self.pattern {
            PatternShape::Rectangular { spacing } => {
                let (hx, hy) = (spacing[0] / 2.0, spacing[1] / 2.0);
                vec![[-hx, -hy, 0.0], [hx, -hy, 0.0], [hx, hy, 0.0], [-hx, hy, 0.0]]
            }
            PatternShape::Circular {
                count,
                pitch_diameter,
                start_angle,
            } => {
                let r = pitch_diameter / 2.0;
                (0..*count)
                    .map(|i| {
                        let a = (start_angle + 360.0 * f64::from(i) / f64::from(*count)).to_radians();
                        [r * a.cos(), r * a.sin(), 0.0]
                    })
                    .collect()
            }
            PatternShape::Linear { count, pitch } => {
                let offset = pitch * (f64::from(*count) - 1.0) / 2.0;
                (0..*count)
                    .map(|i| [f64::from(i) * pitch - offset, 0.0, 0.0])
                    .collect()
            }
        }
    }

    /// Smallest centre-to-centre distance between two holes of the pattern,
    /// or `None` for single-hole patterns.
    pub fn min_spacing(&self) -> Option<f64> {
        let holes = self.hole_positions();
        let mut best: Option<f64> = None;
        for (i, a) in holes.iter().enumerate() {
            for b in &holes[i + 1..] {
                let d = ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt();
                best = Some(best.map_or(d, |m: f64| m.min(d)));
            }
        }
        best
    }
}

/// A named coordinate frame placed relative to a parent frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DatumFrame {
    pub parent: String,
    pub origin: [f64; 3],
    /// Roll, pitch, yaw in degrees.
    #[serde(default)]
    pub rpy: [f64; 3],
}

/// Primitive shape of a clearance envelope, in the interface's local frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "primitive", rename_all = "kebab-case", deny_unknown_fields)]
pub enum EnvelopeShape {
    /// Box centred on the origin.
    Box { size: [f64; 3] },
    /// Cylinder along local Z, base on the origin.
    Cylinder { radius: f64, height: f64 },
    Sphere { radius: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClearanceEnvelope {
    pub shape: EnvelopeShape,
    #[serde(default = "default_keep_out")]
    pub keep_out: bool,
}

fn default_keep_out() -> bool {
    true
}

/// The contract carried by an interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InterfaceKind {
    BoltPattern(BoltPattern),
    DatumFrame(DatumFrame),
    ClearanceEnvelope(ClearanceEnvelope),
}

impl InterfaceKind {
    pub fn name(&self) -> &'static str {
        match self {
            InterfaceKind::BoltPattern(_) => "bolt-pattern",
            InterfaceKind::DatumFrame(_) => "datum-frame",
            InterfaceKind::ClearanceEnvelope(_) => "clearance-envelope",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// InterfaceSpec
// ────────────────────────────────────────────────────────────────────────────

/// A named interface contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InterfaceSpec {
    pub name: String,
    pub kind: InterfaceKind,
}

impl InterfaceSpec {
    pub fn new(name: impl Into<String>, kind: InterfaceKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn bolt_pattern(&self) -> Option<&BoltPattern> {
        match &self.kind {
            InterfaceKind::BoltPattern(p) => Some(p),
            _ => None,
        }
    }

    pub fn datum_frame(&self) -> Option<&DatumFrame> {
        match &self.kind {
            InterfaceKind::DatumFrame(d) => Some(d),
            _ => None,
        }
    }

    pub fn envelope(&self) -> Option<&ClearanceEnvelope> {
        match &self.kind {
            InterfaceKind::ClearanceEnvelope(e) => Some(e),
            _ => None,
        }
    }

    /// Problems with the contract's own numbers (non-positive diameters or
    /// hole spacing, empty patterns, counterbores narrower than the hole).
    pub fn lint(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let name = &self.name;
        match &self.kind {
            InterfaceKind::BoltPattern(p) => {
                if p.hole_diameter <= 0.0 {
                    issues.push(format!("interface '{name}': hole_diameter must be positive"));
                }
                if p.hole_count() == 0 {
                    issues.push(format!("interface '{name}': pattern has no holes"));
                }
                let spread = match &p.pattern {
                    PatternShape::Rectangular { spacing } => Some(("spacing", spacing[0].min(spacing[1]))),
                    PatternShape::Circular { count, pitch_diameter, .. } if *count > 1 => {
                        Some(("pitch_diameter", *pitch_diameter))
                    }
                    PatternShape::Linear { count, pitch } if *count > 1 => Some(("pitch", *pitch)),
                    _ => None,
                };
                if let Some((field, value)) = spread
                    && (value.is_nan() || value <= 0.0)
                {
                    issues.push(format!("interface '{name}': pattern {field} must be positive"));
                }
                if p.min_edge_distance < 0.0 {
                    issues.push(format!("interface '{name}': min_edge_distance must not be negative"));
                }
                if let Some(cb) = &p.counterbore
                    && (cb.diameter <= p.hole_diameter || cb.depth <= 0.0)
                {
                    issues.push(format!(
                        "interface '{name}': counterbore must be wider than the hole and have positive depth"
                    ));
                }
            }
            InterfaceKind::DatumFrame(d) => {
                if d.parent == *name {
                    issues.push(format!("interface '{name}': datum frame cannot be its own parent"));
                }
            }
            InterfaceKind::ClearanceEnvelope(e) => {
                let positive = match &e.shape {
                    EnvelopeShape::Box { size } => size.iter().all(|s| *s > 0.0),
                    EnvelopeShape::Cylinder { radius, height } => *radius > 0.0 && *height > 0.0,
                    EnvelopeShape::Sphere { radius } => *radius > 0.0,
                };
                if !positive {
                    issues.push(format!("interface '{name}': envelope dimensions must be positive"));
                }
            }
        }
        issues
    }
}

/// Structural compatibility of two interfaces bound across a mate.
///
/// Variants must agree; bolt patterns must additionally use the same
/// fastener size and the same pattern shape.  Hole diameters may differ
/// (clearance hole on one side, tapped hole on the other).
pub fn check_compatible(left: &InterfaceSpec, right: &InterfaceSpec) -> Result<(), InterfaceMismatch> {
    let mismatch = |reason: String| InterfaceMismatch {
        left: left.name.clone(),
        right: right.name.clone(),
        reason,
    };

    match (&left.kind, &right.kind) {
        (InterfaceKind::BoltPattern(a), InterfaceKind::BoltPattern(b)) => {
            if a.fastener != b.fastener {
                return Err(mismatch(format!("fastener {} vs {}", a.fastener, b.fastener)));
            }
            if !a.pattern.same_shape(&b.pattern) {
                return Err(mismatch(format!(
                    "hole pattern {} {:?} vs {} {:?}",
                    a.pattern.name(),
                    a.pattern,
                    b.pattern.name(),
                    b.pattern
                )));
            }
            Ok(())
        }
        (a, b) if a.name() != b.name() => {
            Err(mismatch(format!("variant {} vs {}", a.name(), b.name())))
        }
        _ => Ok(()),
    }
}
