//! `rigspec-geometry` – the geometric kernel seam.
//!
//! # Modules
//!
//! - [`aabb`] – axis-aligned boxes.
//! - [`frames`] – [`FrameGraph`] of datum frames rooted at `world`.
//! - [`kernel`] – the [`GeometryKernel`] capability trait.
//! - [`mesh`] – exported triangle meshes and the watertight test.
//! - [`sim`] – [`SimKernel`], an analytic kernel for headless tests and CI.

pub mod aabb;
pub mod frames;
pub mod kernel;
pub mod mesh;
pub mod sim;

pub use aabb::Aabb;
pub use frames::{FrameGraph, WORLD, isometry_from};
pub use kernel::{GeometryKernel, HoleFeature, RealizeRequest, SolidHandle};
pub use mesh::Mesh;
pub use sim::{SimBody, SimFailure, SimKernel};
