//! Core data structures and traits for progmesh
//!
//! This crate provides the geometry storage boundary used by the reduction
//! engine: point types, vertex and index buffers, meshes with per-submesh
//! LOD face lists, and the read-side traits the engine consumes.

pub mod point;
pub mod buffer;
pub mod mesh;
pub mod traits;
pub mod error;

pub use point::*;
pub use buffer::*;
pub use mesh::*;
pub use traits::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3};
