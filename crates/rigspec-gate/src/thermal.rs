//! Static torque → power → winding temperature, per supporting joint.
//!
//! Each supporting leg carries an equal share of the total weight.  The
//! static torque at a joint is that share times the horizontal arm from the
//! joint axis to the foot, scaled by the dynamic multiplier.  The actuator's
//! efficiency curve turns load into losses, and the thermal resistance turns
//! losses into a steady-state winding temperature.

use rigspec_model::{Joint, JointAngles, Leg};
use rigspec_params::{ActuatorSpec, DesignRules};
use rigspec_types::{CheckId, FailureDetail, Verdict, VerdictKind};

use crate::check::{Check, CheckContext};

/// Piecewise-linear efficiency at `load_pct`, clamped to the first and last
/// points outside the declared range.
pub fn efficiency_at(curve: &[(f64, f64)], load_pct: f64) -> Option<f64> {
    let (first, last) = (curve.first()?, curve.last()?);
    if load_pct <= first.0 {
        return Some(first.1);
    }
    if load_pct >= last.0 {
        return Some(last.1);
    }
    curve.windows(2).find(|w| load_pct <= w[1].0).map(|w| {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        y0 + (y1 - y0) * (load_pct - x0) / (x1 - x0)
    })
}

/// Thermal operating point of one joint.
#[derive(Debug, Clone, PartialEq)]
pub struct JointLoad {
    /// N·m, dynamic multiplier applied.
    pub required_torque: f64,
    /// Percent of rated peak torque.
    pub load_pct: f64,
    pub efficiency: f64,
    /// W
    pub mechanical_power: f64,
    /// W
    pub heat: f64,
    /// °C
    pub winding_temperature: f64,
    /// °C, headroom applied.
    pub limit: f64,
}

impl JointLoad {
    pub fn overruns(&self) -> bool {
        self.winding_temperature > self.limit
    }
}

pub struct ThermalEstimator<'a> {
    rules: &'a DesignRules,
}

impl<'a> ThermalEstimator<'a> {
    pub fn new(rules: &'a DesignRules) -> Self {
        Self { rules }
    }

    /// Operating point for an actuator holding `weight_n` newtons at a
    /// horizontal arm of `arm_mm`.
    pub fn joint_load(&self, actuator: &ActuatorSpec, weight_n: f64, arm_mm: f64) -> Result<JointLoad, String> {
        let required_torque = weight_n * arm_mm / 1000.0 * self.rules.dynamic_multiplier;
        let load_pct = required_torque / actuator.rated_peak_torque * 100.0;
        let efficiency = efficiency_at(&actuator.efficiency_curve, load_pct)
            .ok_or_else(|| format!("actuator '{}' has no efficiency curve", actuator.name))?;
        let mechanical_power = required_torque * actuator.duty_speed;
        let heat = mechanical_power / efficiency - mechanical_power;
        Ok(JointLoad {
            required_torque,
            load_pct,
            efficiency,
            mechanical_power,
            heat,
            winding_temperature: self.rules.ambient_temperature + heat * actuator.thermal_resistance,
            limit: self.rules.thermal_headroom * actuator.max_winding_temperature,
        })
    }

    /// Loads of the three joints of a supporting leg.  The coxa turns about
    /// a vertical axis and carries no gravity torque.
    pub fn leg_loads<'s>(
        &self,
        leg: &Leg,
        angles: &JointAngles,
        weight_n: f64,
        actuator: impl Fn(&str) -> Result<&'s ActuatorSpec, String>,
    ) -> Vec<(Joint, Result<JointLoad, String>)> {
        let arms = leg.joint_moment_arms(angles);
        Joint::ALL
            .into_iter()
            .map(|joint| {
                let arm = if joint.is_vertical() { 0.0 } else { arms[joint.index()] };
                let load = actuator(leg.actuator(joint)).and_then(|a| self.joint_load(a, weight_n, arm));
                (joint, load)
            })
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// thermal/<stance>/<leg>/<joint>
// ────────────────────────────────────────────────────────────────────────────

pub struct ThermalCheck {
    stance: String,
}

impl ThermalCheck {
    pub fn new(stance: impl Into<String>) -> Self {
        Self { stance: stance.into() }
    }

    fn id(&self, leg: &str, joint: Joint) -> CheckId {
        CheckId::new(["thermal", self.stance.as_str(), leg, joint.to_string().as_str()])
    }
}

impl Check for ThermalCheck {
    fn name(&self) -> String {
        format!("thermal:{}", self.stance)
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Vec<Verdict> {
        let Some(stance) = ctx.model.stance(&self.stance) else {
            return Vec::new();
        };
        let supporting: Vec<&Leg> = ctx.model.legs.iter().filter(|l| stance.is_supporting(&l.id)).collect();
        let ids = |leg: &Leg| Joint::ALL.map(|j| self.id(&leg.id, j));

        let total = match ctx.mass() {
            Ok(m) => m.total,
            Err(cause) => {
                return supporting
                    .iter()
                    .copied()
                    .flat_map(|leg| ids(leg).map(|id| Verdict::undefined(id, cause)))
                    .collect();
            }
        };
        let rules = ctx.rules();
        let weight_per_leg = total * rules.gravity / supporting.len().max(1) as f64;
        let estimator = ThermalEstimator::new(rules);
        let actuator = |name: &str| ctx.params.actuator(name).map_err(|e| e.to_string());

        let mut out = Vec::new();
        for leg in supporting {
            let Some(angles) = stance.angles(&leg.id) else {
                let cause = format!("stance '{}' declares no angles for leg '{}'", self.stance, leg.id);
                out.extend(ids(leg).map(|id| Verdict::undefined(id, cause.clone())));
                continue;
            };
            for (joint, load) in estimator.leg_loads(leg, angles, weight_per_leg, &actuator) {
                let id = self.id(&leg.id, joint);
                let load = match load {
                    Ok(l) => l,
                    Err(cause) => {
                        out.push(Verdict::fail(id, VerdictKind::Thermal).with_diagnostic(cause));
                        continue;
                    }
                };
                let diagnostic = format!(
                    "{}: {:.2} N·m ({:.1}% of peak, η {:.2}) → {:.1} °C winding, limit {:.1} °C",
                    leg.actuator(joint),
                    load.required_torque,
                    load.load_pct,
                    load.efficiency,
                    load.winding_temperature,
                    load.limit
                );
                let mut verdict = Verdict::new(id, !load.overruns(), VerdictKind::Thermal)
                    .with_measured(load.winding_temperature)
                    .with_threshold(load.limit)
                    .with_diagnostic(diagnostic);
                if load.overruns() {
                    verdict = verdict.with_detail(FailureDetail::ThermalOverrun {
                        actuator: leg.actuator(joint).to_string(),
                        required_torque_nm: load.required_torque,
                        winding_temperature_c: load.winding_temperature,
                        limit_c: load.limit,
                    });
                }
                out.push(verdict);
            }
        }
        out
    }
}
