//! Shared fixtures for the check tests: a base parameter document, part
//! builders on it, and a one-call validation run against [`SimKernel`].

use nalgebra::Isometry3;
use rigspec_geometry::{SimBody, SimKernel};
use rigspec_model::{AssemblyBuilder, PartBuilder};
use rigspec_params::{BoltPattern, InterfaceRegistry, ParameterStore};
use rigspec_types::{Axis, RigError, ValidationReport};
use tempfile::TempDir;

use crate::config::ValidationOptions;
use crate::engine::InvariantEngine;

pub const BASE: &str = r#"
[dimensions.plate]
length = { value = 500.0, unit = "mm" }
width = { value = 400.0, unit = "mm" }
thickness = { value = 50.0, unit = "mm" }
top = { value = 25.0, unit = "mm" }
zero = { value = 0.0, unit = "mm" }
volume_min = { value = 9.5e6, unit = "mm3" }
volume_max = { value = 10.5e6, unit = "mm3" }

[dimensions.block]
volume_min = { value = 0.9e6, unit = "mm3" }
volume_max = { value = 1.1e6, unit = "mm3" }

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
min_edge_distance = 10.0
pattern = { shape = "rectangular", spacing = [40.0, 40.0] }

[interfaces.m6_mount]
kind = "bolt-pattern"
fastener = "M6"
hole_diameter = 6.6
pattern = { shape = "rectangular", spacing = [40.0, 40.0] }

[interfaces.chassis]
kind = "datum-frame"
parent = "world"
origin = [0.0, 0.0, 300.0]

[interfaces.lid_frame]
kind = "datum-frame"
parent = "chassis"
origin = [0.0, 0.0, 50.0]

[interfaces.battery_frame]
kind = "datum-frame"
parent = "chassis"
origin = [0.0, 0.0, 50.0]

[interfaces.battery_mount]
kind = "datum-frame"
parent = "chassis"
origin = [0.0, 0.0, 0.0]

[interfaces.motor_sweep]
kind = "clearance-envelope"
shape = { primitive = "box", size = [200.0, 200.0, 200.0] }

[design-rules]
mass_min = 20.0
mass_max = 40.0
"#;

/// One assembly under test: parameter layers, part builders and the
/// simulated bodies that realize them.
pub struct Fixture {
    layers: Vec<String>,
    assembly: AssemblyBuilder,
    kernel: SimKernel,
    options: ValidationOptions,
    _exports: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let exports = tempfile::tempdir().unwrap();
        Self {
            layers: vec![BASE.to_string()],
            assembly: AssemblyBuilder::new("fixture"),
            kernel: SimKernel::new(),
            options: ValidationOptions::sequential().with_export_dir(exports.path()),
            _exports: exports,
        }
    }

    pub fn single_plate(body: SimBody) -> Self {
        Self::new().part(Self::plate(), body)
    }

    pub fn hip_pattern() -> BoltPattern {
        let mut store = ParameterStore::new();
        store.add_toml("base", BASE).unwrap();
        let params = store.resolve_all().unwrap();
        InterfaceRegistry::from_parameters(&params)
            .unwrap()
            .lookup("hip_mount")
            .unwrap()
            .bolt_pattern()
            .unwrap()
            .clone()
    }

    pub fn plate() -> PartBuilder {
        Self::plate_on("plate", "chassis")
    }

    /// 500 × 400 × 50 plate with the hip pattern bound on its top face.
    pub fn plate_on(id: &str, frame: &str) -> PartBuilder {
        PartBuilder::new(id)
            .material("al6061")
            .subsystem("chassis")
            .frame(frame)
            .bbox(Axis::X, "dimensions.plate.length", "tolerances.bbox")
            .bbox(Axis::Y, "dimensions.plate.width", "tolerances.bbox")
            .bbox(Axis::Z, "dimensions.plate.thickness", "tolerances.bbox")
            .volume_range("dimensions.plate.volume_min", "dimensions.plate.volume_max")
            .bind_at(
                "hip_mount",
                ["dimensions.plate.zero", "dimensions.plate.zero", "dimensions.plate.top"],
            )
    }

    /// A part accepting a 100 mm cube.
    pub fn block_on(id: &str, frame: &str) -> PartBuilder {
        PartBuilder::new(id)
            .material("al6061")
            .subsystem("payload")
            .frame(frame)
            .volume_range("dimensions.block.volume_min", "dimensions.block.volume_max")
    }

    pub fn part(mut self, builder: PartBuilder, body: SimBody) -> Self {
        self.kernel.insert_body(builder.id(), body);
        self.assembly = self.assembly.part(builder);
        self
    }

    pub fn with(mut self, f: impl FnOnce(AssemblyBuilder) -> AssemblyBuilder) -> Self {
        self.assembly = f(std::mem::take(&mut self.assembly));
        self
    }

    /// Add a parameter layer on top of [`BASE`].
    pub fn layer(mut self, toml: &str) -> Self {
        self.layers.push(toml.to_string());
        self
    }

    pub fn options(mut self, f: impl FnOnce(ValidationOptions) -> ValidationOptions) -> Self {
        self.options = f(self.options);
        self
    }

    pub fn try_run(&self) -> Result<ValidationReport, RigError> {
        let mut store = ParameterStore::new();
        for (i, text) in self.layers.iter().enumerate() {
            store.add_toml(&format!("layer{i}"), text)?;
        }
        let params = store.resolve_all()?;
        let registry = InterfaceRegistry::from_parameters(&params)?;
        let model = self.assembly.build(&params, &registry)?;
        InvariantEngine::new(&self.kernel, &registry, self.options.clone()).validate(&model, &params)
    }

    /// Solids the kernel still holds.
    pub fn live_solids(&self) -> usize {
        self.kernel.solid_count()
    }

    pub fn run(&self) -> ValidationReport {
        self.try_run().unwrap()
    }
}

/// The fixture plate with the hip pattern drilled through at its origin.
pub fn plate_body() -> SimBody {
    SimBody::cuboid([500.0, 400.0, 50.0]).with_pattern_holes(&Fixture::hip_pattern(), &Isometry3::identity(), 50.0)
}
