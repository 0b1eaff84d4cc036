//! Cable runs and grommets.

use nalgebra::Point3;
use rigspec_geometry::FrameGraph;
use rigspec_params::ParameterSet;
use rigspec_types::ConfigError;

pub use rigspec_params::CableTypeSpec as CableType;

/// A resolved point of a cable path.
#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub name: String,
    pub point: Point3<f64>,
    /// Part the waypoint is attached to, if any.
    pub host: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CableRun {
    pub name: String,
    pub cable_type: CableType,
    pub waypoints: Vec<Waypoint>,
    /// mm
    pub estimated_length: f64,
    /// Actuator powered through this run.
    pub feeds: Option<String>,
}

impl CableRun {
    /// Straight segments between consecutive waypoints.
    pub fn segments(&self) -> impl Iterator<Item = (&Waypoint, &Waypoint)> {
        self.waypoints.windows(2).map(|w| (&w[0], &w[1]))
    }

    /// Length of the polyline through every waypoint, mm.
    pub fn path_length(&self) -> f64 {
        self.segments().map(|(a, b)| (b.point - a.point).norm()).sum()
    }

    pub fn passes_through(&self, waypoint: &str) -> bool {
        self.waypoints.iter().any(|w| w.name == waypoint)
    }
}

/// A pass-through in a panel, located relative to a datum frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Grommet {
    pub name: String,
    pub frame: String,
    pub point: Point3<f64>,
    /// mm
    pub inner_diameter: f64,
    /// Cable runs declared to pass through.
    pub cables: Vec<String>,
    pub host: Option<String>,
}

impl Grommet {
    /// Open cross-section, mm².
    pub fn area(&self) -> f64 {
        let r = self.inner_diameter / 2.0;
        std::f64::consts::PI * r * r
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builders
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CableRunBuilder {
    name: String,
    cable_type: String,
    length_key: String,
    waypoints: Vec<String>,
    feeds: Option<String>,
}

impl CableRunBuilder {
    pub fn new(name: impl Into<String>, cable_type: &str, length_key: &str) -> Self {
        Self {
            name: name.into(),
            cable_type: cable_type.to_string(),
            length_key: length_key.to_string(),
            waypoints: Vec::new(),
            feeds: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waypoint names in path order: grommets, part ids or datum frames.
    pub fn through<I, S>(mut self, waypoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.waypoints.extend(waypoints.into_iter().map(Into::into));
        self
    }

    pub fn feeds(mut self, actuator: &str) -> Self {
        self.feeds = Some(actuator.to_string());
        self
    }

    /// Resolve the run.  `resolve` maps a waypoint name to its location.
    pub fn build<F>(&self, params: &ParameterSet, resolve: F) -> Result<CableRun, ConfigError>
    where
        F: Fn(&str) -> Option<Waypoint>,
    {
        let cable_type = params.cable_type(&self.cable_type)?.clone();
        if let Some(actuator) = &self.feeds {
            params.actuator(actuator)?;
        }
        if self.waypoints.len() < 2 {
            return Err(ConfigError::Validation {
                issues: vec![format!("cable run '{}': needs at least two waypoints", self.name)],
            });
        }
        let waypoints = self
            .waypoints
            .iter()
            .map(|w| {
                resolve(w).ok_or_else(|| ConfigError::DanglingWaypoint {
                    run: self.name.clone(),
                    waypoint: w.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CableRun {
            name: self.name.clone(),
            cable_type,
            waypoints,
            estimated_length: params.number(&self.length_key)?,
            feeds: self.feeds.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct GrommetBuilder {
    name: String,
    frame: String,
    diameter_key: String,
    offset: Option<[String; 3]>,
    cables: Vec<String>,
    host: Option<String>,
}

impl GrommetBuilder {
    pub fn new(name: impl Into<String>, frame: &str, diameter_key: &str) -> Self {
        Self {
            name: name.into(),
            frame: frame.to_string(),
            diameter_key: diameter_key.to_string(),
            offset: None,
            cables: Vec::new(),
            host: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset from the frame origin, three length keys.
    pub fn offset(mut self, keys: [&str; 3]) -> Self {
        self.offset = Some(keys.map(str::to_string));
        self
    }

    /// Cable runs declared to pass through.
    pub fn cables<I, S>(mut self, runs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cables.extend(runs.into_iter().map(Into::into));
        self
    }

    /// Part the grommet is fitted in.
    pub fn host(mut self, part: &str) -> Self {
        self.host = Some(part.to_string());
        self
    }

    pub fn build(&self, params: &ParameterSet, frames: &FrameGraph) -> Result<Grommet, ConfigError> {
        let local = match &self.offset {
            Some(k) => Point3::new(params.number(&k[0])?, params.number(&k[1])?, params.number(&k[2])?),
            None => Point3::origin(),
        };
        let inner_diameter = params.number(&self.diameter_key)?;
        if !(inner_diameter.is_finite() && inner_diameter > 0.0) {
            return Err(ConfigError::Validation {
                issues: vec![format!(
                    "grommet '{}': {} must be a positive diameter, got {inner_diameter}",
                    self.name, self.diameter_key
                )],
            });
        }
        Ok(Grommet {
            name: self.name.clone(),
            frame: self.frame.clone(),
            point: frames.to_world(&self.frame, local)?,
            inner_diameter,
            cables: self.cables.clone(),
            host: self.host.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn cable() -> CableType {
        CableType {
            name: "signal".into(),
            gauge_awg: 24,
            insulation: 0.3,
            min_bend_radius: 10.0,
            max_current: 1.0,
        }
    }

    fn wp(name: &str, x: f64, y: f64) -> Waypoint {
        Waypoint {
            name: name.into(),
            point: Point3::new(x, y, 0.0),
            host: None,
        }
    }

    #[test]
    fn path_length_sums_segments() {
        let run = CableRun {
            name: "r".into(),
            cable_type: cable(),
            waypoints: vec![wp("a", 0.0, 0.0), wp("b", 30.0, 40.0), wp("c", 30.0, 100.0)],
            estimated_length: 200.0,
            feeds: None,
        };
        assert_relative_eq!(run.path_length(), 110.0);
        assert_eq!(run.segments().count(), 2);
        assert!(run.passes_through("b"));
        assert!(!run.passes_through("z"));
    }

    fn grommet_params() -> ParameterSet {
        let mut store = rigspec_params::ParameterStore::new();
        store
            .add_toml(
                "grommets",
                r#"
[dimensions.grommet]
bore = { value = 20.0, unit = "mm" }
shut = { value = 0.0, unit = "mm" }
"#,
            )
            .unwrap();
        store.resolve_all().unwrap()
    }

    #[test]
    fn grommet_builds_at_its_frame() {
        let g = GrommetBuilder::new("g_top", "world", "dimensions.grommet.bore")
            .build(&grommet_params(), &FrameGraph::new())
            .unwrap();
        assert_relative_eq!(g.inner_diameter, 20.0);
        assert_eq!(g.point, Point3::origin());
    }

    #[test]
    fn zero_diameter_grommet_is_rejected() {
        let err = GrommetBuilder::new("g_zero", "world", "dimensions.grommet.shut")
            .build(&grommet_params(), &FrameGraph::new())
            .unwrap_err();
        match err {
            ConfigError::Validation { issues } => {
                assert_eq!(issues.len(), 1);
                assert!(issues[0].contains("g_zero"));
                assert!(issues[0].contains("dimensions.grommet.shut"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn grommet_area() {
        let g = Grommet {
            name: "g".into(),
            frame: "world".into(),
            point: Point3::origin(),
            inner_diameter: 20.0,
            cables: Vec::new(),
            host: None,
        };
        assert_relative_eq!(g.area(), std::f64::consts::PI * 100.0);
    }
}
