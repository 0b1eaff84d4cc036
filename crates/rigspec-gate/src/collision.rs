//! Interference between parts, and intrusion into keep-out envelopes.

use rigspec_geometry::SolidHandle;
use rigspec_types::{CheckId, Verdict, VerdictKind};
use tracing::warn;

use crate::check::{Check, CheckContext};

/// Intersection volume of two realized solids, mm³.
fn overlap(ctx: &CheckContext<'_>, a: SolidHandle, b: SolidHandle) -> Result<f64, String> {
    let common = ctx.kernel.intersect(a, b).map_err(|e| e.to_string())?;
    let volume = ctx.kernel.volume(common).map_err(|e| e.to_string());
    release(ctx, common);
    volume
}

fn release(ctx: &CheckContext<'_>, solid: SolidHandle) {
    if let Err(e) = ctx.kernel.release(solid) {
        warn!(handle = solid.0, error = %e, "failed to release scratch solid");
    }
}

fn overlap_verdict(id: CheckId, volume: f64, allowance: f64, what: &str) -> Verdict {
    Verdict::new(id, volume < allowance, VerdictKind::Invariant)
        .with_measured(volume)
        .with_threshold(allowance)
        .with_diagnostic(format!("{what} overlap {volume:.3} mm³"))
}

// ────────────────────────────────────────────────────────────────────────────
// collision/<a>~<b>
// ────────────────────────────────────────────────────────────────────────────

/// Interference of two parts not declared as mating.  The pair is stored in
/// id order, so `(a, b)` and `(b, a)` are the same check.
pub struct CollisionCheck {
    a: String,
    b: String,
}

impl CollisionCheck {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b { Self { a, b } } else { Self { a: b, b: a } }
    }

    pub fn id(&self) -> CheckId {
        CheckId::new(["collision", format!("{}~{}", self.a, self.b).as_str()])
    }
}

impl Check for CollisionCheck {
    fn name(&self) -> String {
        self.id().to_string()
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict> {
        let id = self.id();
        let (ga, gb) = match ctx.geometry_pair(&self.a, &self.b) {
            Ok(g) => g,
            Err(cause) => return vec![Verdict::undefined(id, cause)],
        };
        // Disjoint boxes cannot intersect; skip the boolean.
        if !ga.bbox.overlaps(&gb.bbox) {
            return vec![overlap_verdict(id, 0.0, ctx.rules().collision_allowance, "no")];
        }
        match overlap(ctx, ga.handle, gb.handle) {
            Ok(volume) => vec![overlap_verdict(id, volume, ctx.rules().collision_allowance, "solid")],
            Err(cause) => vec![Verdict::undefined(id, cause)],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// envelope/<part>.<iface>/<other>
// ────────────────────────────────────────────────────────────────────────────

/// Keep-out envelope bound on a part, tested against every other part the
/// owner does not mate with.
pub struct EnvelopeCheck {
    part: String,
    interface: String,
}

impl EnvelopeCheck {
    pub fn new(part: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            part: part.into(),
            interface: interface.into(),
        }
    }

    fn id(&self, other: &str) -> CheckId {
        CheckId::new(["envelope", format!("{}.{}", self.part, self.interface).as_str(), other])
    }
}

impl Check for EnvelopeCheck {
    fn name(&self) -> String {
        format!("envelope:{}.{}", self.part, self.interface)
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict> {
        let others: Vec<&str> = ctx
            .model
            .parts
            .keys()
            .map(String::as_str)
            .filter(|o| *o != self.part && !ctx.model.mates(&self.part, o))
            .collect();

        let envelope = ctx
            .registry
            .lookup(&self.interface)
            .map_err(|e| e.to_string())
            .and_then(|spec| {
                spec.envelope()
                    .cloned()
                    .ok_or_else(|| format!("'{}' is not a clearance envelope", self.interface))
            });
        let pose = ctx
            .model
            .part(&self.part)
            .ok_or_else(|| format!("unknown part '{}'", self.part))
            .and_then(|p| p.interface_pose(&self.interface, &ctx.model.frames).map_err(|e| e.to_string()));
        let solid = envelope.and_then(|env| {
            pose.and_then(|pose| ctx.kernel.realize_envelope(&env.shape, &pose).map_err(|e| e.to_string()))
        });
        let solid = match solid {
            Ok(s) => s,
            Err(cause) => {
                return others.iter().map(|o| Verdict::undefined(self.id(o), cause.clone())).collect();
            }
        };

        let allowance = ctx.rules().collision_allowance;
        let verdicts = others
            .iter()
            .map(|other| {
                let id = self.id(other);
                match ctx.geometry(other) {
                    Ok(g) => match overlap(ctx, solid, g.handle) {
                        Ok(volume) => overlap_verdict(id, volume, allowance, "keep-out"),
                        Err(cause) => Verdict::undefined(id, cause),
                    },
                    Err(cause) => Verdict::undefined(id, cause),
                }
            })
            .collect();
        release(ctx, solid);
        verdicts
    }
}
