//! Part models and their builder.
//!
//! A [`PartModel`] is the declared side of one generated solid: identity,
//! material, subsystem tag, placement frame, bound interfaces and the
//! acceptance ranges its realized geometry must fall in.  Every number comes
//! out of the [`ParameterSet`]; [`PartBuilder`] only accepts parameter keys.

use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use rigspec_geometry::{FrameGraph, RealizeRequest};
use rigspec_params::{InterfaceRegistry, ParameterSet};
use rigspec_types::{Axis, ConfigError, Range};

/// Acceptance rule for a part's realized volume (mm³).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VolumeAcceptance {
    /// Explicit `[min, max]`.
    Range { min: f64, max: f64 },
    /// `nominal × (1 ± tolerance)`.
    Relative { nominal: f64, tolerance: f64 },
    /// `nominal ± tolerance` mm³.
    Absolute { nominal: f64, tolerance: f64 },
}

impl VolumeAcceptance {
    pub fn range(&self) -> Range {
        match *self {
            VolumeAcceptance::Range { min, max } => Range::new(min, max),
            VolumeAcceptance::Relative { nominal, tolerance } => Range::around(nominal, nominal * tolerance),
            VolumeAcceptance::Absolute { nominal, tolerance } => Range::around(nominal, tolerance),
        }
    }
}

/// An interface bound by a part, placed relative to the part frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceBinding {
    pub interface: String,
    pub offset: Isometry3<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartModel {
    pub id: String,
    pub material: String,
    pub subsystem: String,
    /// Datum frame the part frame coincides with.
    pub frame: String,
    pub bindings: Vec<InterfaceBinding>,
    /// Accepted extent per axis; `None` leaves the axis unconstrained.
    pub bbox: [Option<Range>; 3],
    pub volume: VolumeAcceptance,
}

impl PartModel {
    pub fn binding(&self, interface: &str) -> Option<&InterfaceBinding> {
        self.bindings.iter().find(|b| b.interface == interface)
    }

    /// World pose of the part frame.
    pub fn placement(&self, frames: &FrameGraph) -> Result<Isometry3<f64>, ConfigError> {
        frames.world_pose(&self.frame)
    }

    /// World pose of one bound interface.
    pub fn interface_pose(&self, interface: &str, frames: &FrameGraph) -> Result<Isometry3<f64>, ConfigError> {
        let binding = self
            .binding(interface)
            .ok_or_else(|| ConfigError::UnknownInterface(format!("{}.{interface}", self.id)))?;
        Ok(self.placement(frames)? * binding.offset)
    }

    /// The kernel request realizing this part at its placement.
    pub fn realize_request(&self, frames: &FrameGraph) -> Result<RealizeRequest, ConfigError> {
        Ok(RealizeRequest::new(self.id.clone(), self.placement(frames)?))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PartBuilder
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum BboxKeys {
    Around { nominal: String, tolerance: String },
    Range { min: String, max: String },
}

#[derive(Debug, Clone)]
enum VolumeKeys {
    Range { min: String, max: String },
    Relative { nominal: String, tolerance: Option<String> },
    Absolute { nominal: String, tolerance: String },
}

#[derive(Debug, Clone)]
enum OffsetKeys {
    None,
    Origin([String; 3]),
    Posed { origin: [String; 3], yaw: String },
    Frame(String),
}

#[derive(Debug, Clone)]
struct BindingKeys {
    interface: String,
    offset: OffsetKeys,
}

/// Declarative part description resolved against a [`ParameterSet`].
///
/// ```
/// use rigspec_model::PartBuilder;
/// use rigspec_types::Axis;
///
/// let plate = PartBuilder::new("base_plate")
///     .material("al6061")
///     .subsystem("chassis")
///     .frame("chassis_origin")
///     .bbox(Axis::X, "dimensions.plate.length", "tolerances.bbox")
///     .volume_range("dimensions.plate.volume_min", "dimensions.plate.volume_max")
///     .bind_at("hip_mount", ["dimensions.hip.x", "dimensions.hip.y", "dimensions.plate.top"]);
/// assert_eq!(plate.id(), "base_plate");
/// ```
#[derive(Debug, Clone)]
pub struct PartBuilder {
    id: String,
    material: Option<String>,
    subsystem: Option<String>,
    frame: Option<String>,
    bbox: [Option<BboxKeys>; 3],
    volume: Option<VolumeKeys>,
    bindings: Vec<BindingKeys>,
}

fn keys3(keys: [&str; 3]) -> [String; 3] {
    keys.map(str::to_string)
}

impl PartBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            material: None,
            subsystem: None,
            frame: None,
            bbox: [None, None, None],
            volume: None,
            bindings: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn material(mut self, name: &str) -> Self {
        self.material = Some(name.to_string());
        self
    }

    /// Subsystem tag used for mass aggregation.  Defaults to the part id.
    pub fn subsystem(mut self, name: &str) -> Self {
        self.subsystem = Some(name.to_string());
        self
    }

    /// Datum frame the part is placed on.  Defaults to `world`.
    pub fn frame(mut self, name: &str) -> Self {
        self.frame = Some(name.to_string());
        self
    }

    /// Accept `nominal ± tolerance` along `axis`.
    pub fn bbox(mut self, axis: Axis, nominal_key: &str, tolerance_key: &str) -> Self {
        self.bbox[axis.index()] = Some(BboxKeys::Around {
            nominal: nominal_key.to_string(),
            tolerance: tolerance_key.to_string(),
        });
        self
    }

    /// Accept `[min, max]` along `axis`.
    pub fn bbox_range(mut self, axis: Axis, min_key: &str, max_key: &str) -> Self {
        self.bbox[axis.index()] = Some(BboxKeys::Range {
            min: min_key.to_string(),
            max: max_key.to_string(),
        });
        self
    }

    pub fn volume_range(mut self, min_key: &str, max_key: &str) -> Self {
        self.volume = Some(VolumeKeys::Range {
            min: min_key.to_string(),
            max: max_key.to_string(),
        });
        self
    }

    /// Nominal volume with the `volume_tolerance` design rule.
    pub fn volume_relative(mut self, nominal_key: &str) -> Self {
        self.volume = Some(VolumeKeys::Relative {
            nominal: nominal_key.to_string(),
            tolerance: None,
        });
        self
    }

    /// Nominal volume with a part-specific relative tolerance (ratio).
    pub fn volume_relative_with(mut self, nominal_key: &str, tolerance_key: &str) -> Self {
        self.volume = Some(VolumeKeys::Relative {
            nominal: nominal_key.to_string(),
            tolerance: Some(tolerance_key.to_string()),
        });
        self
    }

    /// Nominal volume with an absolute tolerance in mm³.
    pub fn volume_absolute(mut self, nominal_key: &str, tolerance_key: &str) -> Self {
        self.volume = Some(VolumeKeys::Absolute {
            nominal: nominal_key.to_string(),
            tolerance: tolerance_key.to_string(),
        });
        self
    }

    /// Bind an interface at the part frame origin.
    pub fn bind(mut self, interface: &str) -> Self {
        self.bindings.push(BindingKeys {
            interface: interface.to_string(),
            offset: OffsetKeys::None,
        });
        self
    }

    /// Bind an interface at an offset read from three length keys.
    pub fn bind_at(mut self, interface: &str, origin_keys: [&str; 3]) -> Self {
        self.bindings.push(BindingKeys {
            interface: interface.to_string(),
            offset: OffsetKeys::Origin(keys3(origin_keys)),
        });
        self
    }

    /// Bind an interface at an offset and a yaw about the part's Z axis.
    pub fn bind_posed(mut self, interface: &str, origin_keys: [&str; 3], yaw_key: &str) -> Self {
        self.bindings.push(BindingKeys {
            interface: interface.to_string(),
            offset: OffsetKeys::Posed {
                origin: keys3(origin_keys),
                yaw: yaw_key.to_string(),
            },
        });
        self
    }

    /// Bind an interface where a datum frame sits relative to the part.
    pub fn bind_on_frame(mut self, interface: &str, frame: &str) -> Self {
        self.bindings.push(BindingKeys {
            interface: interface.to_string(),
            offset: OffsetKeys::Frame(frame.to_string()),
        });
        self
    }

    /// Resolve every key and reference.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnknownParameter`] / [`ConfigError::WrongKind`] for
    ///   a missing or non-numeric key.
    /// - [`ConfigError::UnknownMaterial`], [`ConfigError::UnknownInterface`],
    ///   [`ConfigError::UnknownFrame`] for dangling references.
    /// - [`ConfigError::Validation`] when the part declares no material or
    ///   no volume acceptance.
    pub fn build(
        &self,
        params: &ParameterSet,
        registry: &InterfaceRegistry,
        frames: &FrameGraph,
    ) -> Result<PartModel, ConfigError> {
        let id = &self.id;
        let material = self.material.clone().ok_or_else(|| ConfigError::Validation {
            issues: vec![format!("part '{id}': no material declared")],
        })?;
        params.material(&material)?;

        let frame = self.frame.clone().unwrap_or_else(|| rigspec_geometry::WORLD.to_string());
        if !frames.contains(&frame) {
            return Err(ConfigError::UnknownFrame(frame));
        }

        let mut bbox = [None, None, None];
        for (slot, keys) in bbox.iter_mut().zip(&self.bbox) {
            *slot = match keys {
                None => None,
                Some(BboxKeys::Around { nominal, tolerance }) => {
                    Some(Range::around(params.number(nominal)?, params.number(tolerance)?))
                }
                Some(BboxKeys::Range { min, max }) => Some(Range::new(params.number(min)?, params.number(max)?)),
            };
        }

        let volume = match &self.volume {
            None => {
                return Err(ConfigError::Validation {
                    issues: vec![format!("part '{id}': no volume acceptance declared")],
                });
            }
            Some(VolumeKeys::Range { min, max }) => VolumeAcceptance::Range {
                min: params.number(min)?,
                max: params.number(max)?,
            },
            Some(VolumeKeys::Relative { nominal, tolerance }) => VolumeAcceptance::Relative {
                nominal: params.number(nominal)?,
                tolerance: match tolerance {
                    Some(key) => params.number(key)?,
                    None => params.rules().volume_tolerance,
                },
            },
            Some(VolumeKeys::Absolute { nominal, tolerance }) => VolumeAcceptance::Absolute {
                nominal: params.number(nominal)?,
                tolerance: params.number(tolerance)?,
            },
        };

        let mut bindings = Vec::with_capacity(self.bindings.len());
        for b in &self.bindings {
            registry.lookup(&b.interface)?;
            let offset = match &b.offset {
                OffsetKeys::None => Isometry3::identity(),
                OffsetKeys::Origin(keys) => translation(params, keys)?,
                OffsetKeys::Posed { origin, yaw } => {
                    let t = translation(params, origin)?;
                    let r = UnitQuaternion::from_euler_angles(0.0, 0.0, params.number(yaw)?.to_radians());
                    Isometry3::from_parts(t.translation, r)
                }
                OffsetKeys::Frame(datum) => frames.lookup(&frame, datum)?,
            };
            bindings.push(InterfaceBinding {
                interface: b.interface.clone(),
                offset,
            });
        }

        Ok(PartModel {
            id: id.clone(),
            material,
            subsystem: self.subsystem.clone().unwrap_or_else(|| id.clone()),
            frame,
            bindings,
            bbox,
            volume,
        })
    }
}

fn translation(params: &ParameterSet, keys: &[String; 3]) -> Result<Isometry3<f64>, ConfigError> {
    Ok(Isometry3::from_parts(
        Translation3::new(params.number(&keys[0])?, params.number(&keys[1])?, params.number(&keys[2])?),
        UnitQuaternion::identity(),
    ))
}
