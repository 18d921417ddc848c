//! Progressive mesh reduction
//!
//! This crate builds chains of progressively coarser index buffers for
//! triangle meshes by greedy edge collapse:
//! - Adjacency graphs over welded vertex positions, one per position buffer
//! - A cost heuristic based on surface curvature and border shape
//! - Collapse surgery keeping seam copies on their own attribute rows
//! - LOD baking into 16- or 32-bit index buffers
//!
//! Vertex buffers are never modified; every level reuses the original
//! vertices and only the triangle lists shrink.

pub(crate) mod graph;
pub(crate) mod cost;
pub(crate) mod collapse;
pub(crate) mod bake;
pub mod config;
pub mod progressive;
pub mod lod;

pub use graph::NEVER_COLLAPSE_COST;
pub use cost::BORDER_INWARD_COST;
pub use config::*;
pub use progressive::*;
pub use lod::*;
