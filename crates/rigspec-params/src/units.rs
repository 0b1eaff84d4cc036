//! Units of measure accepted in parameter documents.
//!
//! Every numeric entry declares a unit.  At resolve time values are converted
//! to the canonical unit of their physical dimension (millimetres, degrees,
//! kilograms, …) so downstream code never has to convert again.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Physical dimension of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Length,
    Angle,
    Mass,
    Volume,
    Temperature,
    Ratio,
    Count,
    Torque,
    Current,
    Density,
    Acceleration,
    AngularSpeed,
    ThermalResistance,
    Bytes,
}

/// A recognised unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Millimeter,
    Centimeter,
    Meter,
    Degree,
    Radian,
    Kilogram,
    Gram,
    CubicMillimeter,
    CubicCentimeter,
    Celsius,
    Ratio,
    Percent,
    Count,
    NewtonMeter,
    Ampere,
    KilogramPerCubicMeter,
    MeterPerSecondSquared,
    RadianPerSecond,
    CelsiusPerWatt,
    Bytes,
}

impl Unit {
    /// Parse the unit spelling used in parameter documents.
    pub fn parse(s: &str) -> Option<Unit> {
        let unit = match s.trim() {
            "mm" => Unit::Millimeter,
            "cm" => Unit::Centimeter,
            "m" => Unit::Meter,
            "deg" => Unit::Degree,
            "rad" => Unit::Radian,
            "kg" => Unit::Kilogram,
            "g" => Unit::Gram,
            "mm3" => Unit::CubicMillimeter,
            "cm3" => Unit::CubicCentimeter,
            "C" | "degC" => Unit::Celsius,
            "ratio" => Unit::Ratio,
            "%" => Unit::Percent,
            "count" => Unit::Count,
            "N*m" | "Nm" => Unit::NewtonMeter,
            "A" => Unit::Ampere,
            "kg/m3" => Unit::KilogramPerCubicMeter,
            "m/s2" => Unit::MeterPerSecondSquared,
            "rad/s" => Unit::RadianPerSecond,
            "C/W" => Unit::CelsiusPerWatt,
            "bytes" => Unit::Bytes,
            _ => return None,
        };
        Some(unit)
    }

    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Millimeter | Unit::Centimeter | Unit::Meter => Dimension::Length,
            Unit::Degree | Unit::Radian => Dimension::Angle,
            Unit::Kilogram | Unit::Gram => Dimension::Mass,
            Unit::CubicMillimeter | Unit::CubicCentimeter => Dimension::Volume,
            Unit::Celsius => Dimension::Temperature,
            Unit::Ratio | Unit::Percent => Dimension::Ratio,
            Unit::Count => Dimension::Count,
            Unit::NewtonMeter => Dimension::Torque,
            Unit::Ampere => Dimension::Current,
            Unit::KilogramPerCubicMeter => Dimension::Density,
            Unit::MeterPerSecondSquared => Dimension::Acceleration,
            Unit::RadianPerSecond => Dimension::AngularSpeed,
            Unit::CelsiusPerWatt => Dimension::ThermalResistance,
            Unit::Bytes => Dimension::Bytes,
        }
    }

    /// Convert `value` expressed in this unit to the canonical unit of its
    /// dimension.
    pub fn to_canonical(self, value: f64) -> f64 {
        match self {
            Unit::Centimeter => value * 10.0,
            Unit::Meter => value * 1000.0,
            Unit::Radian => value.to_degrees(),
            Unit::Gram => value / 1000.0,
            Unit::CubicCentimeter => value * 1000.0,
            Unit::Percent => value / 100.0,
            _ => value,
        }
    }
}

impl Dimension {
    /// The unit every value of this dimension is stored in after resolution.
    pub fn canonical_unit(self) -> Unit {
        match self {
            Dimension::Length => Unit::Millimeter,
            Dimension::Angle => Unit::Degree,
            Dimension::Mass => Unit::Kilogram,
            Dimension::Volume => Unit::CubicMillimeter,
            Dimension::Temperature => Unit::Celsius,
            Dimension::Ratio => Unit::Ratio,
            Dimension::Count => Unit::Count,
            Dimension::Torque => Unit::NewtonMeter,
            Dimension::Current => Unit::Ampere,
            Dimension::Density => Unit::KilogramPerCubicMeter,
            Dimension::Acceleration => Unit::MeterPerSecondSquared,
            Dimension::AngularSpeed => Unit::RadianPerSecond,
            Dimension::ThermalResistance => Unit::CelsiusPerWatt,
            Dimension::Bytes => Unit::Bytes,
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Dimension::Length => "length",
            Dimension::Angle => "angle",
            Dimension::Mass => "mass",
            Dimension::Volume => "volume",
            Dimension::Temperature => "temperature",
            Dimension::Ratio => "ratio",
            Dimension::Count => "count",
            Dimension::Torque => "torque",
            Dimension::Current => "current",
            Dimension::Density => "density",
            Dimension::Acceleration => "acceleration",
            Dimension::AngularSpeed => "angular speed",
            Dimension::ThermalResistance => "thermal resistance",
            Dimension::Bytes => "bytes",
        };
        f.write_str(s)
    }
}
