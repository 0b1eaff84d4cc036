//! Assembly model: parts, mates, legs, stances and cabling, all resolved
//! against one [`ParameterSet`].

use std::collections::BTreeMap;

use nalgebra::Point3;
use rigspec_geometry::FrameGraph;
use rigspec_params::{InterfaceRegistry, ParameterSet};
use rigspec_types::ConfigError;
use tracing::{debug, info};

use crate::cable::{CableRun, CableRunBuilder, Grommet, GrommetBuilder, Waypoint};
use crate::leg::{Leg, LegBuilder, Stance, StanceBuilder};
use crate::part::{PartBuilder, PartModel};

/// Two parts joined through one interface each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mate {
    pub a: String,
    pub interface_a: String,
    pub b: String,
    pub interface_b: String,
}

impl Mate {
    /// True when this mate joins `x` and `y`, in either order.
    pub fn joins(&self, x: &str, y: &str) -> bool {
        (self.a == x && self.b == y) || (self.a == y && self.b == x)
    }

    /// `a.ia~b.ib`
    pub fn label(&self) -> String {
        format!("{}.{}~{}.{}", self.a, self.interface_a, self.b, self.interface_b)
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyModel {
    pub name: String,
    pub parts: BTreeMap<String, PartModel>,
    pub mates: Vec<Mate>,
    pub legs: Vec<Leg>,
    pub stances: Vec<Stance>,
    pub cable_runs: Vec<CableRun>,
    pub grommets: Vec<Grommet>,
    pub frames: FrameGraph,
}

impl AssemblyModel {
    pub fn part(&self, id: &str) -> Option<&PartModel> {
        self.parts.get(id)
    }

    /// Whether `x` and `y` are declared as mating.  Symmetric.
    pub fn mates(&self, x: &str, y: &str) -> bool {
        self.mates.iter().any(|m| m.joins(x, y))
    }

    pub fn leg(&self, id: &str) -> Option<&Leg> {
        self.legs.iter().find(|l| l.id == id)
    }

    pub fn stance(&self, name: &str) -> Option<&Stance> {
        self.stances.iter().find(|s| s.name == name)
    }

    pub fn grommet(&self, name: &str) -> Option<&Grommet> {
        self.grommets.iter().find(|g| g.name == name)
    }

    pub fn cable_run(&self, name: &str) -> Option<&CableRun> {
        self.cable_runs.iter().find(|r| r.name == name)
    }

    /// Foot contact points of the supporting legs of a stance, in world
    /// coordinates, in leg order.
    pub fn foot_contacts(&self, stance: &Stance) -> Result<Vec<(String, Point3<f64>)>, ConfigError> {
        let mut contacts = Vec::new();
        for leg in &self.legs {
            if !stance.is_supporting(&leg.id) {
                continue;
            }
            let angles = stance.angles(&leg.id).ok_or_else(|| {
                ConfigError::UnknownParameter(format!("dimensions.stance.{}.{}", stance.name, leg.id))
            })?;
            contacts.push((leg.id.clone(), leg.foot_position(angles, &self.frames)?));
        }
        Ok(contacts)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AssemblyBuilder
// ────────────────────────────────────────────────────────────────────────────

/// Collects declarations and resolves them into an [`AssemblyModel`].
#[derive(Debug, Clone, Default)]
pub struct AssemblyBuilder {
    name: String,
    parts: Vec<PartBuilder>,
    mates: Vec<Mate>,
    legs: Vec<LegBuilder>,
    stances: Vec<StanceBuilder>,
    runs: Vec<CableRunBuilder>,
    grommets: Vec<GrommetBuilder>,
}

impl AssemblyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn part(mut self, part: PartBuilder) -> Self {
        self.parts.push(part);
        self
    }

    /// Declare that `a` and `b` mate through `interface_a` / `interface_b`.
    pub fn mate(mut self, a: &str, interface_a: &str, b: &str, interface_b: &str) -> Self {
        self.mates.push(Mate {
            a: a.to_string(),
            interface_a: interface_a.to_string(),
            b: b.to_string(),
            interface_b: interface_b.to_string(),
        });
        self
    }

    pub fn leg(mut self, leg: LegBuilder) -> Self {
        self.legs.push(leg);
        self
    }

    pub fn stance(mut self, stance: StanceBuilder) -> Self {
        self.stances.push(stance);
        self
    }

    pub fn cable_run(mut self, run: CableRunBuilder) -> Self {
        self.runs.push(run);
        self
    }

    pub fn grommet(mut self, grommet: GrommetBuilder) -> Self {
        self.grommets.push(grommet);
        self
    }

    /// Resolve every declaration.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from a part, leg, stance, run or grommet, plus
    /// [`ConfigError::UnknownPart`] for mates and grommets naming a part
    /// that does not exist and [`ConfigError::Validation`] for duplicate
    /// part ids or grommets listing undeclared runs.
    pub fn build(&self, params: &ParameterSet, registry: &InterfaceRegistry) -> Result<AssemblyModel, ConfigError> {
        let frames = FrameGraph::from_parameters(params)?;

        let mut parts = BTreeMap::new();
        for builder in &self.parts {
            let part = builder.build(params, registry, &frames)?;
            if parts.contains_key(&part.id) {
                return Err(ConfigError::Validation {
                    issues: vec![format!("part '{}' is declared twice", part.id)],
                });
            }
            parts.insert(part.id.clone(), part);
        }

        for mate in &self.mates {
            for (part, interface) in [(&mate.a, &mate.interface_a), (&mate.b, &mate.interface_b)] {
                let model = parts
                    .get(part)
                    .ok_or_else(|| ConfigError::UnknownPart(part.clone()))?;
                if model.binding(interface).is_none() {
                    return Err(ConfigError::UnknownInterface(format!("{part}.{interface}")));
                }
            }
        }

        let legs = self
            .legs
            .iter()
            .map(|l| l.build(params, &frames))
            .collect::<Result<Vec<_>, _>>()?;
        let stances = self
            .stances
            .iter()
            .map(|s| s.build(params, &legs))
            .collect::<Result<Vec<_>, _>>()?;

        let grommets = self
            .grommets
            .iter()
            .map(|g| g.build(params, &frames))
            .collect::<Result<Vec<_>, _>>()?;
        for g in &grommets {
            if let Some(host) = &g.host
                && !parts.contains_key(host)
            {
                return Err(ConfigError::UnknownPart(host.clone()));
            }
            let undeclared: Vec<&String> = g
                .cables
                .iter()
                .filter(|c| !self.runs.iter().any(|r| r.name() == c.as_str()))
                .collect();
            if !undeclared.is_empty() {
                return Err(ConfigError::Validation {
                    issues: undeclared
                        .iter()
                        .map(|c| format!("grommet '{}': cable run '{c}' is not declared", g.name))
                        .collect(),
                });
            }
        }

        let resolve = |name: &str| resolve_waypoint(name, &grommets, &parts, &frames);
        let cable_runs = self
            .runs
            .iter()
            .map(|r| r.build(params, resolve))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            assembly = %self.name,
            parts = parts.len(),
            mates = self.mates.len(),
            legs = legs.len(),
            cable_runs = cable_runs.len(),
            "assembly model built"
        );

        Ok(AssemblyModel {
            name: self.name.clone(),
            parts,
            mates: self.mates.clone(),
            legs,
            stances,
            cable_runs,
            grommets,
            frames,
        })
    }
}

/// Locate a waypoint: a grommet, then a part id, then a datum frame.
fn resolve_waypoint(
    name: &str,
    grommets: &[Grommet],
    parts: &BTreeMap<String, PartModel>,
    frames: &FrameGraph,
) -> Option<Waypoint> {
    if let Some(g) = grommets.iter().find(|g| g.name == name) {
        return Some(Waypoint {
            name: name.to_string(),
            point: g.point,
            host: g.host.clone(),
        });
    }
    if let Some(part) = parts.get(name) {
        let point = frames.to_world(&part.frame, Point3::origin()).ok()?;
        return Some(Waypoint {
            name: name.to_string(),
            point,
            host: Some(part.id.clone()),
        });
    }
    if frames.contains(name) {
        let point = frames.to_world(name, Point3::origin()).ok()?;
        let host = parts.values().find(|p| p.frame == name).map(|p| p.id.clone());
        debug!(waypoint = name, host = ?host, "waypoint resolved to datum frame");
        return Some(Waypoint {
            name: name.to_string(),
            point,
            host,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::PartBuilder;
    use approx::assert_relative_eq;
    use rigspec_params::ParameterStore;
    use rigspec_types::Axis;

    // ------------------------------------------------------------------ helpers
    const DOC: &str = r#"
[dimensions.plate]
length = { value = 500.0, unit = "mm" }
vmin = { value = 9.0e6, unit = "mm3" }
vmax = { value = 11.0e6, unit = "mm3" }

[dimensions.leg]
coxa = { value = 50.0, unit = "mm" }
femur = { value = 200.0, unit = "mm" }
tibia = { value = 250.0, unit = "mm" }

[dimensions.stance.stand.fl]
coxa = { value = 0.0, unit = "deg" }
femur = { value = 0.0, unit = "deg" }
tibia = { value = 90.0, unit = "deg" }

[dimensions.cable]
length = { value = 600.0, unit = "mm" }
grommet = { value = 12.0, unit = "mm" }

[tolerances]
bbox = { value = 0.5, unit = "mm" }

[materials.al6061]
density = 2700.0
yield_strength = 276.0
elastic_modulus = 68.9
thermal_conductivity = 167.0
max_service_temperature = 150.0

[interfaces.hip_mount]
kind = "bolt-pattern"
fastener = "M5"
hole_diameter = 5.5
pattern = { shape = "rectangular", spacing = [40.0, 40.0] }

[interfaces.chassis]
kind = "datum-frame"
parent = "world"
origin = [0.0, 0.0, 300.0]

[interfaces.hip_fl]
kind = "datum-frame"
parent = "chassis"
origin = [200.0, 150.0, 0.0]

[interfaces.battery_bay]
kind = "datum-frame"
parent = "chassis"
origin = [-100.0, 0.0, 50.0]

[cable-types.signal]
gauge_awg = 24
insulation = 0.3
min_bend_radius = 10.0
max_current = 1.0

[actuators.servo]
rated_peak_torque = 40.0
max_winding_temperature = 120.0
thermal_resistance = 2.0
duty_speed = 2.0
efficiency_curve = [[0.0, 0.6], [100.0, 0.8]]
"#;

    fn context() -> (ParameterSet, InterfaceRegistry) {
        let mut store = ParameterStore::new();
        store.add_toml("base", DOC).unwrap();
        let params = store.resolve_all().unwrap();
        let registry = InterfaceRegistry::from_parameters(&params).unwrap();
        (params, registry)
    }

    fn part(id: &str) -> PartBuilder {
        PartBuilder::new(id)
            .material("al6061")
            .frame("chassis")
            .bbox(Axis::X, "dimensions.plate.length", "tolerances.bbox")
            .volume_range("dimensions.plate.vmin", "dimensions.plate.vmax")
            .bind("hip_mount")
    }

    fn leg() -> LegBuilder {
        LegBuilder::new("fl", "hip_fl", ["dimensions.leg.coxa", "dimensions.leg.femur", "dimensions.leg.tibia"])
            .actuators(["servo", "servo", "servo"])
    }

    // ------------------------------------------------------------------ build

    #[test]
    fn builds_full_assembly() {
        let (params, registry) = context();
        let model = AssemblyBuilder::new("rig")
            .part(part("plate"))
            .part(part("bracket").frame("battery_bay"))
            .mate("plate", "hip_mount", "bracket", "hip_mount")
            .leg(leg())
            .stance(StanceBuilder::new("stand"))
            .grommet(GrommetBuilder::new("g1", "chassis", "dimensions.cable.grommet").cables(["sig"]).host("plate"))
            .cable_run(CableRunBuilder::new("sig", "signal", "dimensions.cable.length").through(["battery_bay", "g1", "hip_fl"]))
            .build(&params, &registry)
            .unwrap();

        assert_eq!(model.parts.len(), 2);
        assert!(model.mates("plate", "bracket"));
        assert!(model.mates("bracket", "plate"));
        let run = model.cable_run("sig").unwrap();
        assert_eq!(run.waypoints[0].host.as_deref(), Some("bracket"));
        assert_eq!(run.waypoints[1].host.as_deref(), Some("plate"));
        assert_relative_eq!(run.waypoints[2].point.x, 200.0, epsilon = 1e-9);

        let stand = model.stance("stand").unwrap();
        let feet = model.foot_contacts(stand).unwrap();
        assert_eq!(feet.len(), 1);
        // Hip at (200, 150, 300); foot 250 mm out and 250 mm down.
        assert_relative_eq!(feet[0].1.x, 450.0, epsilon = 1e-9);
        assert_relative_eq!(feet[0].1.z, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn mate_with_unknown_part_fails() {
        let (params, registry) = context();
        let err = AssemblyBuilder::new("rig")
            .part(part("plate"))
            .mate("plate", "hip_mount", "ghost", "hip_mount")
            .build(&params, &registry)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPart(ref p) if p == "ghost"));
    }

    #[test]
    fn mate_on_unbound_interface_fails() {
        let (params, registry) = context();
        let err = AssemblyBuilder::new("rig")
            .part(part("plate"))
            .part(part("bracket"))
            .mate("plate", "hip_mount", "bracket", "battery_bay")
            .build(&params, &registry)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownInterface(ref n) if n == "bracket.battery_bay"));
    }

    #[test]
    fn duplicate_part_id_fails() {
        let (params, registry) = context();
        let err = AssemblyBuilder::new("rig")
            .part(part("plate"))
            .part(part("plate"))
            .build(&params, &registry)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn dangling_waypoint_fails() {
        let (params, registry) = context();
        let err = AssemblyBuilder::new("rig")
            .part(part("plate"))
            .cable_run(CableRunBuilder::new("sig", "signal", "dimensions.cable.length").through(["plate", "nowhere"]))
            .build(&params, &registry)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DanglingWaypoint { ref run, ref waypoint } if run == "sig" && waypoint == "nowhere"
        ));
    }

    #[test]
    fn unknown_cable_type_fails() {
        let (params, registry) = context();
        let err = AssemblyBuilder::new("rig")
            .cable_run(CableRunBuilder::new("sig", "coax", "dimensions.cable.length").through(["chassis", "hip_fl"]))
            .build(&params, &registry)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCableType(_)));
    }

    #[test]
    fn grommet_listing_undeclared_run_fails() {
        let (params, registry) = context();
        let err = AssemblyBuilder::new("rig")
            .grommet(GrommetBuilder::new("g1", "chassis", "dimensions.cable.grommet").cables(["power"]))
            .build(&params, &registry)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn supporting_leg_without_angles_fails() {
        let (params, registry) = context();
        let err = AssemblyBuilder::new("rig")
            .leg(leg())
            .stance(StanceBuilder::new("crouch"))
            .build(&params, &registry)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParameter(ref k) if k == "dimensions.stance.crouch.fl.coxa"));
    }

    #[test]
    fn lifted_leg_is_not_a_contact() {
        let (params, registry) = context();
        let model = AssemblyBuilder::new("rig")
            .leg(leg())
            .stance(StanceBuilder::new("step").lift("fl"))
            .build(&params, &registry)
            .unwrap();
        let step = model.stance("step").unwrap();
        assert!(model.foot_contacts(step).unwrap().is_empty());
    }
}
